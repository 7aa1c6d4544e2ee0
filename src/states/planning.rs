use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::types::{AgentOutput, LlmResponse, State, ToolCall};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Answer used when the model replies with nothing after tools already ran.
pub const EMPTY_SUMMARY_FALLBACK: &str =
    "Quote processed successfully, but no summary response was generated.";

pub struct PlanningState;

impl PlanningState {
    /// Resolve the model to use for this call.
    ///
    /// Priority:
    ///   1. `memory.config.models[task_type]`
    ///   2. `memory.config.models["default"]`
    ///   3. `""`: the caller's own default
    fn resolve_model<'a>(&self, memory: &'a AgentMemory) -> &'a str {
        let models = &memory.config.models;
        models
            .get(&memory.task_type)
            .or_else(|| models.get("default"))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    fn tools_offered(&self, memory: &AgentMemory) -> bool {
        memory.config.max_tool_rounds.map_or(true, |rounds| memory.step <= rounds)
    }

    fn handle_tool_calls(&self, memory: &mut AgentMemory, calls: Vec<ToolCall>, content: Option<String>) -> Event {
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        memory.log("Planning", "LLM_TOOL_CALL", &format!("tools={:?}", names));
        tracing::info!(step = memory.step, tools = ?names, "model requested tools");

        if let Some(text) = content.filter(|t| !t.trim().is_empty()) {
            memory.step_notes.insert(memory.step, text);
        }
        memory.pending_tool_calls = calls;
        Event::llm_tool_call()
    }

    /// Tool calls on a summary-only step are never executed; whatever text
    /// came with them is the answer.
    fn handle_unrequested_tools(&self, memory: &mut AgentMemory, calls: Vec<ToolCall>, content: Option<String>) -> Event {
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        memory.log("Planning", "TOOLS_IGNORED", &format!("tools={:?}", names));
        tracing::warn!(step = memory.step, tools = ?names, "model requested tools after the last tool round");

        match content.filter(|t| !t.trim().is_empty()) {
            Some(text) => self.handle_final_answer(memory, text),
            None => self.handle_empty(memory),
        }
    }

    fn handle_final_answer(&self, memory: &mut AgentMemory, content: String) -> Event {
        if content.trim().chars().count() < memory.config.min_answer_length {
            memory.log("Planning", "ANSWER_TOO_SHORT", &format!(
                "len={} min={}", content.trim().chars().count(), memory.config.min_answer_length
            ));
            return Event::answer_too_short();
        }

        memory.log("Planning", "LLM_FINAL_ANSWER", &content.chars().take(100).collect::<String>());
        memory.final_answer = Some(content);
        Event::llm_final_answer()
    }

    fn handle_empty(&self, memory: &mut AgentMemory) -> Event {
        if memory.history.is_empty() {
            memory.error = Some("No response received".to_string());
            memory.log("Planning", "LLM_EMPTY", "no choices and no tool history");
            Event::fatal_error()
        } else {
            memory.log("Planning", "LLM_EMPTY", "tools ran, using fallback summary");
            memory.final_answer = Some(EMPTY_SUMMARY_FALLBACK.to_string());
            Event::llm_final_answer()
        }
    }
}

#[async_trait]
impl AgentState for PlanningState {
    fn name(&self) -> &'static str { "Planning" }

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        tools:     &Arc<ToolRegistry>,
        llm:       &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event {
        emit(output_tx, AgentOutput::StateStarted(State::planning()));

        // 1. Guards
        if memory.step >= memory.config.max_steps {
            memory.error = Some(format!("Max steps {} exceeded", memory.config.max_steps));
            memory.log("Planning", "MAX_STEPS", &format!("step={}", memory.step));
            return Event::max_steps();
        }
        if memory.usage.exceeds(memory.config.max_total_tokens) {
            memory.error = Some(format!(
                "Token budget exceeded: {} tokens used", memory.usage.total_tokens
            ));
            memory.log("Planning", "BUDGET_EXCEEDED", &format!("total={}", memory.usage.total_tokens));
            return Event::budget_exceeded();
        }

        // 2. Increment step
        memory.step += 1;
        memory.log("Planning", "STEP_START", &format!("step={}/{}", memory.step, memory.config.max_steps));

        // 3. Resolve model and tool offer
        let model = self.resolve_model(memory).to_string();
        let no_tools = ToolRegistry::new();
        let tool_round = self.tools_offered(memory);
        let offered: &ToolRegistry = if tool_round { tools.as_ref() } else { &no_tools };
        if offered.is_empty() && !tools.is_empty() {
            emit(output_tx, AgentOutput::Action("Requesting final summary".to_string()));
        }

        // 4. Call LLM
        let response = match llm.call_async(memory, offered, &model).await {
            Ok(response) => response,
            Err(err) => {
                memory.log("Planning", "LLM_ERROR", &err);
                memory.error = Some(format!("LLM error: {}", err));
                return Event::fatal_error();
            }
        };

        if let Some(usage) = response.usage() {
            memory.usage.add(usage);
        }

        match response {
            LlmResponse::ToolCalls { calls, .. } if calls.is_empty() => self.handle_empty(memory),
            LlmResponse::ToolCalls { calls, content, .. } if !tool_round => {
                self.handle_unrequested_tools(memory, calls, content)
            }
            LlmResponse::ToolCalls { calls, content, .. } => self.handle_tool_calls(memory, calls, content),
            LlmResponse::FinalAnswer { content, .. } => self.handle_final_answer(memory, content),
            LlmResponse::Empty { .. } => self.handle_empty(memory),
        }
    }
}
