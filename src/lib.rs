pub mod types;
pub mod memory;
pub mod events;
pub mod transitions;
pub mod tools;
pub mod engine;
pub mod trace;
pub mod error;
pub mod builder;
pub mod states;
pub mod llm;
pub mod budget;
pub mod config;
pub mod catalog;
pub mod pricing;
pub mod quotes;
pub mod toolkit;
pub mod agent;
pub mod doctor;
pub mod web;

// Convenience re-exports at crate root
pub use builder::AgentBuilder;
pub use engine::AgentEngine;
pub use memory::AgentMemory;
pub use types::{State, LlmResponse, ToolCall, ToolResult, HistoryEntry, AgentConfig, AgentOutput};
pub use events::Event;
pub use tools::{ToolRegistry, ToolFn, ToolSchema};
pub use llm::{AsyncLlmCaller, MockLlmCaller, OpenAiCaller, RetryingLlmCaller};
pub use trace::{TraceEntry, Trace};
pub use budget::TokenUsage;
pub use error::{AgentError, QuoteError};
pub use config::{AppConfig, ConfigError, DataPaths};
pub use agent::{QuoteOutcome, QuotingAgent};
