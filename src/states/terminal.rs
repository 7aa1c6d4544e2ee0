use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::types::{AgentOutput, State};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Handler for `Done`: publishes the final answer.
pub struct DoneState;

/// Handler for `Error`: publishes the failure reason.
pub struct ErrorState;

/// Terminal handlers run exactly once, on entry. The event they return is
/// never looked up since terminal states have no outgoing transitions.
fn finish(memory: &mut AgentMemory, output_tx: Option<&UnboundedSender<AgentOutput>>, failed: bool) -> Event {
    if failed {
        emit(output_tx, AgentOutput::StateStarted(State::error()));
        let reason = memory.error.clone().unwrap_or_else(|| "Unknown error".to_string());
        memory.log("Error", "AGENT_FAILED", &reason);
        tracing::error!(error = %reason, step = memory.step, "quoting run failed");
        emit(output_tx, AgentOutput::Error(reason));
    } else {
        emit(output_tx, AgentOutput::StateStarted(State::done()));
        let answer = memory.final_answer.clone().unwrap_or_else(|| "[No answer]".to_string());
        let preview: String = answer.chars().take(100).collect();
        memory.log("Done", "TASK_COMPLETE", &preview);
        tracing::info!(steps = memory.step, tokens = memory.usage.total_tokens, "quoting run finished");
        emit(output_tx, AgentOutput::FinalAnswer(answer));
    }
    Event::start()
}

#[async_trait]
impl AgentState for DoneState {
    fn name(&self) -> &'static str { "Done" }

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        _tools:    &Arc<ToolRegistry>,
        _llm:      &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event {
        finish(memory, output_tx, false)
    }
}

#[async_trait]
impl AgentState for ErrorState {
    fn name(&self) -> &'static str { "Error" }

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        _tools:    &Arc<ToolRegistry>,
        _llm:      &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event {
        finish(memory, output_tx, true)
    }
}
