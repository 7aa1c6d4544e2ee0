use crate::budget::TokenUsage;
use crate::types::{ToolCall, HistoryEntry, AgentConfig, ToolResult};
use crate::trace::{TraceEntry, Trace};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct AgentMemory {
    // ── Task definition ──────────────────────────────────
    /// The user's request
    pub task:               String,
    /// Classifies the task for model selection
    pub task_type:          String,
    /// The system prompt to prepend to every LLM call
    pub system_prompt:      String,

    // ── Execution state ──────────────────────────────────
    /// Current step number (incremented at start of each Planning cycle)
    pub step:               usize,
    /// Token usage accumulated over every LLM call of this run
    pub usage:              TokenUsage,

    // ── Tool call lifecycle ──────────────────────────────
    /// Set by PlanningState when the LLM requests tools, consumed by ActingState
    pub pending_tool_calls: Vec<ToolCall>,
    /// Set by ActingState, consumed by ObservingState
    pub tool_results:       Vec<ToolResult>,
    /// Assistant text that accompanied the tool calls of a step
    pub step_notes:         BTreeMap<usize, String>,

    // ── History and results ──────────────────────────────
    /// Ordered list of completed tool calls and their observations
    pub history:            Vec<HistoryEntry>,
    /// Set when LLM produces a final answer
    pub final_answer:       Option<String>,
    /// Set when agent encounters an unrecoverable error
    pub error:              Option<String>,

    // ── Configuration ────────────────────────────────────
    pub config:             AgentConfig,

    // ── Observability ────────────────────────────────────
    pub trace:              Trace,
}

impl AgentMemory {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task:               task.into(),
            task_type:          "default".to_string(),
            system_prompt:      String::new(),
            step:               0,
            usage:              TokenUsage::default(),
            pending_tool_calls: Vec::new(),
            tool_results:       Vec::new(),
            step_notes:         BTreeMap::new(),
            history:            Vec::new(),
            final_answer:       None,
            error:              None,
            config:             AgentConfig::default(),
            trace:              Trace::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Records an event into the trace log. Called by all state handlers.
    pub fn log(&mut self, state: &str, event: &str, data: &str) {
        tracing::debug!(state, event, data, step = self.step, "agent trace");
        self.trace.record(TraceEntry {
            step:      self.step,
            state:     state.to_string(),
            event:     event.to_string(),
            data:      data.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Builds the chat messages array for the next LLM call.
    ///
    /// Tool calls of the same step are grouped into one assistant message,
    /// followed by one `tool` message per result, as the chat-completions
    /// protocol requires.
    pub fn build_messages(&self) -> Vec<Value> {
        let mut messages = Vec::new();

        if !self.system_prompt.is_empty() {
            messages.push(json!({
                "role": "system",
                "content": self.system_prompt
            }));
        }

        messages.push(json!({
            "role": "user",
            "content": &self.task
        }));

        let mut steps: Vec<Vec<(usize, &HistoryEntry)>> = Vec::new();
        for (index, entry) in self.history.iter().enumerate() {
            if let Some(last_step) = steps.last_mut() {
                if last_step[0].1.step == entry.step {
                    last_step.push((index, entry));
                    continue;
                }
            }
            steps.push(vec![(index, entry)]);
        }

        for step_entries in steps {
            let step = step_entries[0].1.step;
            let mut tool_calls = Vec::new();
            let mut tool_results = Vec::new();

            for (index, entry) in step_entries {
                let tool_id = entry.tool.id.clone()
                    .unwrap_or_else(|| format!("call_{}_{}", entry.step, index));

                tool_calls.push(json!({
                    "id": tool_id,
                    "type": "function",
                    "function": {
                        "name": entry.tool.name,
                        "arguments": serde_json::to_string(&entry.tool.args).unwrap_or_else(|_| "{}".to_string())
                    }
                }));

                tool_results.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_id,
                    "content": entry.observation
                }));
            }

            messages.push(json!({
                "role": "assistant",
                "content": self.step_notes.get(&step),
                "tool_calls": tool_calls
            }));
            messages.extend(tool_results);
        }

        messages
    }

    /// Observations of every successful call to `tool`, oldest first.
    pub fn successful_observations(&self, tool: &str) -> Vec<&str> {
        self.history.iter()
            .filter(|e| e.success && e.tool.name == tool)
            .map(|e| e.observation.as_str())
            .collect()
    }
}
