use std::collections::HashMap;
use std::sync::Arc;
use crate::states::AgentState;
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::transitions::TransitionTable;
use crate::trace::Trace;
use crate::types::{State, AgentOutput};
use crate::error::AgentError;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

pub struct AgentEngine {
    pub memory:  AgentMemory,
    pub tools:   Arc<ToolRegistry>,
    pub llm:     Arc<dyn AsyncLlmCaller>,
    state:       State,
    transitions: TransitionTable,
    handlers:    HashMap<String, Box<dyn AgentState>>,
}

impl AgentEngine {
    /// Creates a new engine. Prefer using AgentBuilder for ergonomic construction.
    pub fn new(
        memory:      AgentMemory,
        tools:       Arc<ToolRegistry>,
        llm:         Arc<dyn AsyncLlmCaller>,
        transitions: TransitionTable,
        handlers:    HashMap<String, Box<dyn AgentState>>,
    ) -> Self {
        Self {
            memory,
            tools,
            llm,
            state: State::idle(),
            transitions,
            handlers,
        }
    }

    /// Run the agent to completion.
    /// Returns Ok(final_answer) or Err(AgentError).
    pub async fn run(&mut self) -> Result<String, AgentError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let safety_cap = self.memory.config.max_steps * 3 + 3;
        let mut iterations = 0;

        while !self.state.is_terminal() {
            iterations += 1;
            if iterations > safety_cap {
                return Err(AgentError::SafetyCapExceeded(iterations));
            }
            self.step(&tx).await?;
        }

        self.outcome()
    }

    /// The result of a finished run; `AgentFailed` while still running.
    pub fn outcome(&self) -> Result<String, AgentError> {
        if self.state == State::done() {
            Ok(self.memory.final_answer.clone()
                .unwrap_or_else(|| "[No answer produced]".to_string()))
        } else if self.state == State::error() {
            Err(AgentError::AgentFailed(
                self.memory.error.clone()
                    .unwrap_or_else(|| "Unknown error".to_string())
            ))
        } else {
            Err(AgentError::AgentFailed(format!("Run stopped in state: {}", self.state)))
        }
    }

    async fn dispatch(&mut self, tx: &mpsc::UnboundedSender<AgentOutput>) -> Result<Event, AgentError> {
        let state_name = self.state.as_str();
        let handler = self.handlers.get(state_name)
            .ok_or_else(|| AgentError::NoHandlerForState(state_name.to_string()))?;

        Ok(handler.handle(&mut self.memory, &self.tools, self.llm.as_ref(), Some(tx)).await)
    }

    /// Executes a single state and applies the resulting transition.
    /// Entering a terminal state runs its handler once, emitting the final output.
    pub async fn step(&mut self, tx: &mpsc::UnboundedSender<AgentOutput>) -> Result<(), AgentError> {
        tracing::debug!(state = %self.state, "agent step");

        let event = self.dispatch(tx).await?;

        let key = (self.state.clone(), event.clone());
        let next_state = self.transitions.get(&key)
            .cloned()
            .ok_or_else(|| AgentError::InvalidTransition {
                from:  self.state.clone(),
                event: event.clone(),
            })?;

        tracing::info!(from = %self.state, event = %event, to = %next_state, "transition");
        self.state = next_state;

        if self.state.is_terminal() {
            self.dispatch(tx).await?;
        }
        Ok(())
    }

    /// Run the agent and return a stream of AgentOutput events.
    /// The stream ends once a terminal state has been reached and drained.
    pub fn run_streaming(&mut self) -> BoxStream<'_, AgentOutput> {
        use futures::stream;
        use futures::StreamExt;

        let (tx, rx) = mpsc::unbounded_channel();

        stream::unfold((self, rx, tx, false), |(engine, mut rx, tx, mut finished)| async move {
            loop {
                if let Ok(msg) = rx.try_recv() {
                    return Some((msg, (engine, rx, tx, finished)));
                }
                if finished {
                    return None;
                }
                if engine.state.is_terminal() {
                    finished = true;
                    continue;
                }
                if let Err(e) = engine.step(&tx).await {
                    return Some((AgentOutput::Error(e.to_string()), (engine, rx, tx, true)));
                }
            }
        }).boxed()
    }

    /// Returns a reference to the full execution trace.
    pub fn trace(&self) -> &Trace {
        &self.memory.trace
    }

    /// Returns the current state (useful for inspection after run).
    pub fn current_state(&self) -> &State {
        &self.state
    }
}
