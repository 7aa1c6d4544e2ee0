use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::types::{AgentOutput, HistoryEntry, State};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub struct ObservingState;

#[async_trait]
impl AgentState for ObservingState {
    fn name(&self) -> &'static str { "Observing" }

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        _tools:    &Arc<ToolRegistry>,
        _llm:      &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event {
        emit(output_tx, AgentOutput::StateStarted(State::observing()));

        let results = std::mem::take(&mut memory.tool_results);
        let committed = results.len();
        let step = memory.step;
        memory.history.extend(results.into_iter().map(|res| HistoryEntry {
            step,
            tool:        res.call,
            observation: res.output,
            success:     res.success,
        }));

        memory.log("Observing", "HISTORY_COMMIT", &format!(
            "step={} committed={} history={}", step, committed, memory.history.len()
        ));
        Event::r#continue()
    }
}
