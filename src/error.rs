use std::path::PathBuf;
use thiserror::Error;
use crate::types::State;
use crate::events::Event;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent failed: {0}")]
    AgentFailed(String),

    #[error("Invalid transition: {from} + {event} not in transition table")]
    InvalidTransition { from: State, event: Event },

    #[error("No handler registered for state: {0}")]
    NoHandlerForState(String),

    #[error("Safety cap exceeded after {0} iterations")]
    SafetyCapExceeded(usize),

    #[error("Build error: {0}")]
    BuildError(String),
}

/// Failures of the quoting data layer: catalog, history, quote files.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("could not access `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("could not read or write CSV `{path}`: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("invalid quote JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid quote: {0}")]
    Invalid(String),

    #[error("invalid quote id `{0}`")]
    InvalidQuoteId(String),

    #[error("quote `{0}` not found")]
    QuoteNotFound(String),
}

impl QuoteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv { path: path.into(), source }
    }
}
