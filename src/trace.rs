use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recorded step of an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step:      usize,
    pub state:     String,
    pub event:     String,
    pub data:      String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of everything a single quoting run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_state(&self, state: &str) -> Vec<&TraceEntry> {
        self.entries.iter().filter(|e| e.state == state).collect()
    }

    /// Number of entries carrying the given event tag (e.g. `"TOOL_SUCCESS"`).
    pub fn count_event(&self, event: &str) -> usize {
        self.entries.iter().filter(|e| e.event == event).count()
    }

    /// (succeeded, failed) tool executions over the whole run.
    pub fn tool_outcomes(&self) -> (usize, usize) {
        (self.count_event("TOOL_SUCCESS"), self.count_event("TOOL_FAILURE"))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Prints the table form to stdout.
    pub fn print(&self) {
        print!("{}", self);
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{:<5} {:<10} {:<18} data", "step", "state", "event")?;
        writeln!(f, "{}", "─".repeat(78))?;
        for e in &self.entries {
            let data: String = e.data.chars().take(44).collect();
            writeln!(f, "{:<5} {:<10} {:<18} {}", e.step, e.state, e.event, data)?;
        }
        let (ok, failed) = self.tool_outcomes();
        writeln!(f, "{} entries, {} tool call(s) ok, {} failed", self.len(), ok, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: &str, event: &str) -> TraceEntry {
        TraceEntry {
            step: 1,
            state: state.to_string(),
            event: event.to_string(),
            data: "x".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn tool_outcomes_and_rendering() {
        let mut trace = Trace::new();
        trace.record(entry("Acting", "TOOL_SUCCESS"));
        trace.record(entry("Acting", "TOOL_SUCCESS"));
        trace.record(entry("Acting", "TOOL_FAILURE"));
        trace.record(entry("Planning", "STEP_START"));

        assert_eq!(trace.tool_outcomes(), (2, 1));
        assert_eq!(trace.for_state("Acting").len(), 3);
        assert!(trace.to_string().ends_with("4 entries, 2 tool call(s) ok, 1 failed\n"));

        let json: serde_json::Value = serde_json::from_str(&trace.to_json().unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(4));
    }
}
