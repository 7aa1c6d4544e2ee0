use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use crate::budget::TokenUsage;

/// A named state in the agent's state machine.
///
/// States are identified by their string name. The library ships with
/// well-known constructors (`State::idle()`, `State::planning()`, …).
///
/// ```
/// use smartquote::State;
/// assert_eq!(State::planning().as_str(), "Planning");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State(pub String);

impl State {
    /// Create a new state with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the string name of this state.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `"Done"` and `"Error"`.
    pub fn is_terminal(&self) -> bool {
        self.0 == "Done" || self.0 == "Error"
    }

    // ── Well-known built-in state constructors ──────────────────────────
    pub fn idle()      -> Self { Self::new("Idle") }
    pub fn planning()  -> Self { Self::new("Planning") }
    pub fn acting()    -> Self { Self::new("Acting") }
    pub fn observing() -> Self { Self::new("Observing") }
    pub fn done()      -> Self { Self::new("Done") }
    pub fn error()     -> Self { Self::new("Error") }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: HashMap<String, Value>,
    pub id:   Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: HashMap<String, Value>) -> Self {
        Self { name: name.into(), args, id: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Result of a single tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call:       ToolCall,
    /// JSON text handed back to the model as the `tool` message content.
    pub output:     String,
    pub success:    bool,
    pub latency_ms: u64,
}

impl ToolResult {
    pub fn success(call: ToolCall, output: String, latency_ms: u64) -> Self {
        Self { call, output, success: true, latency_ms }
    }

    /// Failures are wrapped as `{"error": "..."}` so the model can read them.
    pub fn failure(call: ToolCall, error: &str, latency_ms: u64) -> Self {
        let output = serde_json::json!({ "error": error }).to_string();
        Self { call, output, success: false, latency_ms }
    }
}

/// A completed tool invocation stored in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step:        usize,
    pub tool:        ToolCall,
    pub observation: String,
    pub success:     bool,
}

/// What the LLM can return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmResponse {
    /// LLM wants to invoke one or more tools. `content` is any text the
    /// assistant sent alongside the calls.
    ToolCalls {
        calls:   Vec<ToolCall>,
        content: Option<String>,
        usage:   Option<TokenUsage>,
    },
    /// LLM produced a final answer; the task is complete
    FinalAnswer {
        content: String,
        usage:   Option<TokenUsage>,
    },
    /// The gateway answered without choices or without content.
    Empty {
        usage: Option<TokenUsage>,
    },
}

impl LlmResponse {
    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            Self::ToolCalls { usage, .. }
            | Self::FinalAnswer { usage, .. }
            | Self::Empty { usage } => *usage,
        }
    }
}

/// High-level events emitted by the agent during streaming execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentOutput {
    /// A new state has started execution
    StateStarted(State),
    /// A tool call is being initiated
    ToolCallStarted {
        name: String,
        args: HashMap<String, Value>,
    },
    /// A tool call has completed
    ToolCallFinished {
        name:    String,
        result:  String,
        success: bool,
    },
    /// A generic progress message
    Action(String),
    /// The agent has produced a final answer
    FinalAnswer(String),
    /// The run failed
    Error(String),
}

/// Configuration for the agent's planning behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on number of planning cycles (LLM calls)
    pub max_steps: usize,

    /// Number of planning cycles in which tools are offered to the model.
    /// `None` offers them on every call; `Some(1)` sends the follow-up
    /// request without tools, forcing a summary after one tool round.
    pub max_tool_rounds: Option<usize>,

    /// Minimum answer length in characters
    pub min_answer_length: usize,

    /// Whether multiple tool calls from one reply run concurrently
    pub parallel_tools: bool,

    /// Abort once the session has consumed this many tokens
    pub max_total_tokens: Option<u32>,

    /// Model selection map: task_type → model name string.
    /// The key `"default"` is used as the fallback.
    pub models: HashMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps:         8,
            max_tool_rounds:   None,
            min_answer_length: 1,
            parallel_tools:    true,
            max_total_tokens:  None,
            models:            HashMap::new(),
        }
    }
}
