use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::types::AgentOutput;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

mod idle;
mod planning;
mod acting;
mod observing;
mod terminal;

pub use idle::IdleState;
pub use planning::PlanningState;
pub use acting::ActingState;
pub use observing::ObservingState;
pub use terminal::{DoneState, ErrorState};

/// The contract every state must fulfill.
///
/// 1. `handle()` performs the state's work using only `memory`, `tools`, and `llm`.
/// 2. `handle()` MUST return an Event and never panic.
/// 3. Non-fatal failures (tool error, odd LLM output) are recorded in
///    `memory` and reported through an Event. Failure is data.
/// 4. Always call `memory.log()` at least once per handle() call.
#[async_trait]
pub trait AgentState: Send + Sync {
    /// Must match the key used in the engine's handler map.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        tools:     &Arc<ToolRegistry>,
        llm:       &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event;
}

/// Best-effort send; a dropped receiver never stops the agent.
pub(crate) fn emit(output_tx: Option<&UnboundedSender<AgentOutput>>, output: AgentOutput) {
    if let Some(tx) = output_tx {
        let _ = tx.send(output);
    }
}
