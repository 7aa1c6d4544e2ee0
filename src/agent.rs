use serde::Serialize;
use std::sync::Arc;
use crate::budget::TokenUsage;
use crate::builder::AgentBuilder;
use crate::catalog::{ensure_data, Catalog};
use crate::config::{AppConfig, DataPaths};
use crate::engine::AgentEngine;
use crate::error::{AgentError, QuoteError};
use crate::llm::AsyncLlmCaller;
use crate::quotes::QuoteStore;
use crate::toolkit::{quoting_tools, QUOTE_GENERATOR};
use crate::tools::ToolRegistry;
use crate::trace::Trace;
use crate::types::AgentConfig;

pub const SYSTEM_PROMPT: &str = "\
You are a Smart Quoting Agent. Your job is to help create professional quotes using the available tools.

Available tools:
- price_lookup(product_name): Get product info and pricing
- discount_calculator(unit_price, qty, customer_type): Calculate discounts
- historical_match(product_name, top_k): Find past quotes for the same product
- quote_generator(customer, items, terms): Create and save quote

WORKFLOW for quote requests:
1. ALWAYS use price_lookup first to get product information
2. ALWAYS use discount_calculator to calculate pricing with discounts
3. ALWAYS use quote_generator to create the final quote

Pass the discounted line total as each item's `total` when generating the quote.
Be helpful and conversational, but ALWAYS use the tools for quotes. Never make up prices.";

/// Requests used by `demo` and offered as shortcuts in the web UI.
pub const SAMPLE_REQUESTS: &[&str] = &[
    "Create a quote for 120 Office Chairs for ABC Corp, preferred customer",
    "I need 50 Conference Tables for XYZ Ltd, regular customer",
    "Quote for 25 Developer Desks for TechStart Inc",
    "Need 100 Visitor Stools for MegaCorp, preferred customer",
];

/// Everything a finished quoting run produced.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteOutcome {
    pub answer:    String,
    /// Ids of the quotes written during this run, in order.
    pub quote_ids: Vec<String>,
    pub usage:     TokenUsage,
    pub steps:     usize,
    #[serde(skip)]
    pub trace:     Trace,
}

impl QuoteOutcome {
    /// Collects the outcome of an engine that has reached a terminal state.
    pub fn from_engine(engine: &AgentEngine) -> Result<Self, AgentError> {
        let answer = engine.outcome()?;
        let memory = &engine.memory;
        let quote_ids = memory.successful_observations(QUOTE_GENERATOR)
            .into_iter()
            .filter_map(|obs| serde_json::from_str::<serde_json::Value>(obs).ok())
            .filter_map(|quote| quote.get("quote_id").and_then(|id| id.as_str()).map(str::to_string))
            .collect();

        Ok(Self {
            answer,
            quote_ids,
            usage: memory.usage,
            steps: memory.step,
            trace: memory.trace.clone(),
        })
    }
}

/// The quoting workflow: tools bound to the data directories, a model, and
/// the fixed system prompt. Every request runs on a fresh engine.
#[derive(Clone)]
pub struct QuotingAgent {
    llm:    Arc<dyn AsyncLlmCaller>,
    tools:  ToolRegistry,
    paths:  DataPaths,
    store:  QuoteStore,
    config: AgentConfig,
    model:  String,
}

impl QuotingAgent {
    /// Seeds the mock data if needed and registers the tools.
    pub fn new(config: &AppConfig, llm: Arc<dyn AsyncLlmCaller>) -> Result<Self, QuoteError> {
        let report = ensure_data(&config.paths)?;
        if report.products_created || report.history_created {
            tracing::info!(data_dir = %config.paths.data_dir.display(), "mock data ready");
        }

        Ok(Self {
            llm,
            tools:  quoting_tools(&config.paths),
            paths:  config.paths.clone(),
            store:  QuoteStore::new(&config.paths),
            config: config.agent.clone(),
            model:  config.gateway.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn catalog(&self) -> Result<Catalog, QuoteError> {
        Catalog::load(&self.paths.products_csv())
    }

    /// A ready-to-run engine for one request.
    pub fn engine(&self, request: &str) -> Result<AgentEngine, AgentError> {
        AgentBuilder::new(request)
            .task_type("quote")
            .system_prompt(SYSTEM_PROMPT)
            .config(self.config.clone())
            .model(self.model.clone())
            .registry(self.tools.clone())
            .llm(Arc::clone(&self.llm))
            .build()
    }

    pub async fn ask(&self, request: &str) -> Result<QuoteOutcome, AgentError> {
        let mut engine = self.engine(request)?;
        tracing::info!(model = %self.model, request, "processing quote request");
        engine.run().await?;
        let outcome = QuoteOutcome::from_engine(&engine)?;
        tracing::info!(
            steps = outcome.steps,
            quotes = outcome.quote_ids.len(),
            tokens = outcome.usage.total_tokens,
            "request finished"
        );
        Ok(outcome)
    }
}
