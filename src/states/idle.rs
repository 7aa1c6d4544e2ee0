use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::types::{AgentOutput, State};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub struct IdleState;

#[async_trait]
impl AgentState for IdleState {
    fn name(&self) -> &'static str { "Idle" }

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        tools:     &Arc<ToolRegistry>,
        _llm:      &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event {
        emit(output_tx, AgentOutput::StateStarted(State::idle()));
        memory.log("Idle", "AGENT_STARTED", &format!(
            "task='{}' tools={} max_steps={}",
            memory.task, tools.len(), memory.config.max_steps
        ));
        Event::start()
    }
}
