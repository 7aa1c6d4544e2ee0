use std::collections::HashMap;
use std::sync::Arc;
use crate::engine::AgentEngine;
use crate::error::AgentError;
use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::tools::{ToolRegistry, ToolFn};
use crate::states::{
    AgentState, IdleState, PlanningState, ActingState,
    ObservingState, DoneState, ErrorState,
};
use crate::transitions::build_transition_table;
use crate::types::AgentConfig;

pub struct AgentBuilder {
    memory: AgentMemory,
    tools:  ToolRegistry,
    llm:    Option<Arc<dyn AsyncLlmCaller>>,
    config: Option<AgentConfig>,
}

impl AgentBuilder {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            memory: AgentMemory::new(task),
            tools:  ToolRegistry::new(),
            llm:    None,
            config: None,
        }
    }

    pub fn task_type(mut self, t: impl Into<String>) -> Self {
        self.memory.task_type = t.into(); self
    }

    pub fn system_prompt(mut self, p: impl Into<String>) -> Self {
        self.memory.system_prompt = p.into(); self
    }

    pub fn llm(mut self, llm: Arc<dyn AsyncLlmCaller>) -> Self {
        self.llm = Some(llm); self
    }

    /// Replaces the whole config at build time, overriding the per-field
    /// setters below. Models set with `.model()` survive when the config has none.
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config); self
    }

    pub fn max_steps(mut self, n: usize) -> Self {
        self.memory.config.max_steps = n; self
    }

    pub fn max_tool_rounds(mut self, n: usize) -> Self {
        self.memory.config.max_tool_rounds = Some(n); self
    }

    pub fn parallel_tools(mut self, enabled: bool) -> Self {
        self.memory.config.parallel_tools = enabled; self
    }

    pub fn token_budget(mut self, max_total: u32) -> Self {
        self.memory.config.max_total_tokens = Some(max_total); self
    }

    /// Set the model used for all planning steps (the `"default"` entry).
    ///
    /// ```no_run
    /// # use smartquote::AgentBuilder;
    /// AgentBuilder::new("Quote 5 chairs").model("gemini-2.5-flash");
    /// ```
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.memory.config.models.insert("default".to_string(), model.into());
        self
    }

    /// Set the model for a specific task type.
    pub fn model_for(mut self, task_type: impl Into<String>, model: impl Into<String>) -> Self {
        self.memory.config.models.insert(task_type.into(), model.into());
        self
    }

    pub fn tool(
        mut self,
        name:        impl Into<String>,
        description: impl Into<String>,
        schema:      serde_json::Value,
        func:        ToolFn,
    ) -> Self {
        self.tools.register(name, description, schema, func);
        self
    }

    /// Use a prepared registry; tools added with `.tool()` afterwards extend it.
    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.tools = registry; self
    }

    fn default_handlers() -> HashMap<String, Box<dyn AgentState>> {
        let handlers: Vec<Box<dyn AgentState>> = vec![
            Box::new(IdleState),
            Box::new(PlanningState),
            Box::new(ActingState),
            Box::new(ObservingState),
            Box::new(DoneState),
            Box::new(ErrorState),
        ];
        handlers.into_iter().map(|h| (h.name().to_string(), h)).collect()
    }

    /// Builds the AgentEngine with the default state handlers.
    pub fn build(self) -> Result<AgentEngine, AgentError> {
        self.build_with_handlers(HashMap::new())
    }

    /// Builds with custom state handlers. Any entry in `extra_handlers`
    /// replaces the default handler for that state name.
    pub fn build_with_handlers(
        mut self,
        extra_handlers: HashMap<String, Box<dyn AgentState>>,
    ) -> Result<AgentEngine, AgentError> {
        let llm = self.llm
            .ok_or_else(|| AgentError::BuildError("LLM caller is required".to_string()))?;

        if let Some(config) = self.config {
            // Keep models set through .model()/.model_for() unless the config names its own.
            let models = std::mem::take(&mut self.memory.config.models);
            self.memory.config = config;
            if self.memory.config.models.is_empty() {
                self.memory.config.models = models;
            }
        }

        if self.memory.config.max_steps == 0 {
            return Err(AgentError::BuildError("max_steps must be at least 1".to_string()));
        }

        let mut handlers = Self::default_handlers();
        handlers.extend(extra_handlers);

        Ok(AgentEngine::new(
            self.memory,
            Arc::new(self.tools),
            llm,
            build_transition_table(),
            handlers,
        ))
    }
}
