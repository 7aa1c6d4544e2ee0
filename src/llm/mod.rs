use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::LlmResponse;
use async_trait::async_trait;

mod openai;
mod mock;
mod retry;
mod probe;

pub use openai::OpenAiCaller;
pub use mock::{MockLlmCaller, RecordedCall};
pub use retry::RetryingLlmCaller;
pub use probe::GatewayProbe;

/// The single interface between the state machine and any LLM provider.
///
/// # Contract
/// - Must be Send + Sync (shared behind `Arc<dyn AsyncLlmCaller>`)
/// - Returns Ok(LlmResponse) on any valid LLM interaction, including an
///   empty reply (`LlmResponse::Empty`)
/// - Returns Err(String) ONLY for failures of the call itself:
///   network, authentication, unparseable payloads
/// - Builds the tools array from `tools.schemas()`; an empty registry means
///   the request is sent without tools
/// - Builds messages from `memory.build_messages()`
#[async_trait]
pub trait AsyncLlmCaller: Send + Sync {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String>;
}
