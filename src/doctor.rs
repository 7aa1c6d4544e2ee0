//! Checks that run without the full quoting workflow: a one-tool round trip
//! against the gateway and a direct quote write.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use crate::builder::AgentBuilder;
use crate::catalog::ensure_data;
use crate::config::DataPaths;
use crate::error::{AgentError, QuoteError};
use crate::llm::AsyncLlmCaller;
use crate::quotes::{Quote, QuoteStore};
use crate::toolkit::{quoting_tools, QUOTE_GENERATOR};
use crate::tools::ToolRegistry;

pub const GREET_TOOL: &str = "test_function";

const SMOKE_PROMPT: &str =
    "You are a helpful assistant with access to tools. Always use the test_function when greeting someone.";
const SMOKE_REQUEST: &str = "Please greet John using your tool";

/// What the tool-call smoke test observed.
#[derive(Debug, Clone)]
pub struct SmokeReport {
    pub tool_called: bool,
    pub tool_output: Option<String>,
    pub answer:      String,
}

pub fn greet_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(
        GREET_TOOL,
        "A simple test function",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Name to greet" }
            },
            "required": ["name"]
        }),
        Arc::new(|args: &HashMap<String, Value>| {
            let name = args.get("name").and_then(Value::as_str).ok_or("missing `name`")?;
            Ok(json!(format!("Hello {}! This is a test response.", name)).to_string())
        }),
    );
    registry
}

/// One tool round followed by a tool-less summary call.
pub async fn tool_call_smoke_test(llm: Arc<dyn AsyncLlmCaller>, model: &str) -> Result<SmokeReport, AgentError> {
    let mut engine = AgentBuilder::new(SMOKE_REQUEST)
        .system_prompt(SMOKE_PROMPT)
        .model(model)
        .max_steps(3)
        .max_tool_rounds(1)
        .registry(greet_registry())
        .llm(llm)
        .build()?;

    let answer = engine.run().await?;
    let tool_output = engine.memory.successful_observations(GREET_TOOL).first().map(|s| s.to_string());
    Ok(SmokeReport {
        tool_called: engine.memory.history.iter().any(|e| e.tool.name == GREET_TOOL),
        tool_output,
        answer,
    })
}

/// Writes a quote through the `quote_generator` tool without any model and
/// reads it back from disk.
pub fn quote_self_check(paths: &DataPaths) -> Result<Quote, QuoteError> {
    ensure_data(paths)?;
    let tools = quoting_tools(paths);
    let args: HashMap<String, Value> = HashMap::from([
        ("customer".to_string(), json!("Self-check Ltd")),
        ("items".to_string(), json!([{ "name": "Office Chair", "qty": 2, "unit_price": 1500, "total": 3000 }])),
        ("terms".to_string(), json!("Self-check, not a real offer.")),
    ]);

    let output = tools.execute(QUOTE_GENERATOR, &args).map_err(QuoteError::Invalid)?;
    let written: Quote = serde_json::from_str(&output)?;
    let stored = QuoteStore::new(paths).load(&written.quote_id)?;
    if stored != written {
        return Err(QuoteError::Invalid(format!("quote {} differs on disk", written.quote_id)));
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmCaller;
    use crate::types::{LlmResponse, ToolCall};

    #[tokio::test]
    async fn smoke_test_runs_greet_then_summarises_without_tools() {
        let mock = Arc::new(MockLlmCaller::new(vec![
            LlmResponse::ToolCalls {
                calls: vec![ToolCall::new(GREET_TOOL, HashMap::from([("name".to_string(), json!("John"))])).with_id("g1")],
                content: None,
                usage: None,
            },
            LlmResponse::FinalAnswer { content: "Hello John!".to_string(), usage: None },
        ]));

        let report = tool_call_smoke_test(mock.clone(), "gemini-2.5-flash").await.unwrap();
        assert!(report.tool_called);
        assert_eq!(report.tool_output.as_deref(), Some("\"Hello John! This is a test response.\""));
        assert_eq!(report.answer, "Hello John!");
        assert_eq!(mock.call(0).unwrap().tools, vec![GREET_TOOL.to_string()]);
        assert!(mock.call(1).unwrap().tools.is_empty());
    }

    #[tokio::test]
    async fn smoke_test_never_runs_tools_from_the_summary_call() {
        let greet = || ToolCall::new(GREET_TOOL, HashMap::from([("name".to_string(), json!("John"))]));
        let mock = Arc::new(MockLlmCaller::new(vec![
            LlmResponse::ToolCalls { calls: vec![greet().with_id("g1")], content: None, usage: None },
            LlmResponse::ToolCalls { calls: vec![greet().with_id("g2")], content: Some("Hi John".to_string()), usage: None },
            LlmResponse::FinalAnswer { content: "third call".to_string(), usage: None },
        ]));

        let report = tool_call_smoke_test(mock.clone(), "gemini-2.5-flash").await.unwrap();
        assert_eq!(report.answer, "Hi John");
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn self_check_writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::under(dir.path());
        let quote = quote_self_check(&paths).unwrap();
        assert_eq!(quote.total, 3000.0);
        assert_eq!(quote.customer, "Self-check Ltd");
        assert!(paths.log_csv().exists());
    }
}
