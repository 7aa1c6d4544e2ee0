use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall,
        ChatCompletionRequestMessage,
        ChatCompletionTool,
        ChatCompletionToolChoiceOption,
        ChatCompletionToolType,
        CreateChatCompletionRequestArgs,
        FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use crate::budget::TokenUsage;
use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::{LlmResponse, ToolCall};
use serde_json::Value;
use std::collections::HashMap;

/// Chat-completions caller for OpenAI and any OpenAI-compatible gateway
/// (LiteLLM, Groq, Ollama, …).
pub struct OpenAiCaller {
    client:        Client<OpenAIConfig>,
    default_model: String,
}

impl OpenAiCaller {
    /// Standard OpenAI client using the OPENAI_API_KEY env var
    pub fn new(default_model: impl Into<String>) -> Self {
        Self { client: Client::new(), default_model: default_model.into() }
    }

    /// Custom base URL, e.g. a LiteLLM gateway on `http://localhost:4000`.
    /// Without an explicit key the OPENAI_API_KEY env var is used.
    pub fn with_base_url(
        api_base:      impl Into<String>,
        api_key:       Option<String>,
        default_model: impl Into<String>,
    ) -> Self {
        let mut config = OpenAIConfig::new().with_api_base(api_base);
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        Self { client: Client::with_config(config), default_model: default_model.into() }
    }

    /// Convert our ToolSchema into async-openai's ChatCompletionTool type
    fn build_tools(tools: &ToolRegistry) -> Vec<ChatCompletionTool> {
        tools.schemas().into_iter().map(|schema| {
            ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name:        schema.name,
                    description: Some(schema.description),
                    parameters:  Some(schema.input_schema),
                },
            }
        }).collect()
    }

    /// Parse one tool call. Malformed argument JSON becomes an empty object
    /// so the tool itself reports what is missing back to the model.
    fn parse_tool_call(tc: &ChatCompletionMessageToolCall) -> ToolCall {
        let args = match serde_json::from_str::<HashMap<String, Value>>(&tc.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(
                    tool = %tc.function.name,
                    error = %e,
                    "failed to parse tool arguments, using empty object"
                );
                HashMap::new()
            }
        };
        ToolCall {
            name: tc.function.name.clone(),
            args,
            id: Some(tc.id.clone()),
        }
    }
}

#[async_trait]
impl AsyncLlmCaller for OpenAiCaller {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String> {
        // Serde round-trip from our JSON messages into async-openai's typed enum
        let messages: Vec<ChatCompletionRequestMessage> =
            serde_json::from_value(Value::Array(memory.build_messages()))
                .map_err(|e| format!("Failed to build messages: {}", e))?;

        let model = if model.is_empty() { self.default_model.as_str() } else { model };
        let oai_tools = Self::build_tools(tools);

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(model).messages(messages);

        if !oai_tools.is_empty() {
            request_builder
                .tools(oai_tools)
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let request = request_builder.build()
            .map_err(|e| format!("Failed to build request: {}", e))?;

        tracing::debug!(model, tools = tools.len(), step = memory.step, "sending chat completion");

        let response = self.client.chat()
            .create(request)
            .await
            .map_err(|e| format!("OpenAI API error: {}", e))?;

        let usage = response.usage.map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        let Some(choice) = response.choices.into_iter().next() else {
            return Ok(LlmResponse::Empty { usage });
        };
        let message = choice.message;

        // Tool calls take priority over text content
        if let Some(tool_calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
            let calls = tool_calls.iter().map(Self::parse_tool_call).collect();
            return Ok(LlmResponse::ToolCalls { calls, content: message.content, usage });
        }

        match message.content {
            Some(content) if !content.trim().is_empty() => Ok(LlmResponse::FinalAnswer { content, usage }),
            _ => Ok(LlmResponse::Empty { usage }),
        }
    }
}
