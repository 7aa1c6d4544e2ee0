use std::sync::Mutex;
use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::LlmResponse;
use async_trait::async_trait;
use serde_json::Value;

/// What the mock saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model:    String,
    pub tools:    Vec<String>,
    pub messages: Vec<Value>,
}

/// Replays programmed responses in order. Used by tests, no network.
pub struct MockLlmCaller {
    responses: Mutex<Vec<Result<LlmResponse, String>>>,
    calls:     Mutex<Vec<RecordedCall>>,
}

impl MockLlmCaller {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Program failures as well as responses.
    pub fn with_results(results: Vec<Result<LlmResponse, String>>) -> Self {
        Self {
            responses: Mutex::new(results),
            calls:     Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of times call_async() was invoked
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns the model string passed to the Nth call (0-indexed)
    pub fn model_for_call(&self, n: usize) -> Option<String> {
        self.call(n).map(|c| c.model)
    }

    /// Returns everything recorded for the Nth call (0-indexed)
    pub fn call(&self, n: usize) -> Option<RecordedCall> {
        self.calls.lock().unwrap().get(n).cloned()
    }
}

#[async_trait]
impl AsyncLlmCaller for MockLlmCaller {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String> {
        self.calls.lock().unwrap().push(RecordedCall {
            model:    model.to_string(),
            tools:    tools.names(),
            messages: memory.build_messages(),
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err("MockLlmCaller: no more programmed responses".to_string());
        }
        responses.remove(0)
    }
}
