use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::llm::AsyncLlmCaller;
use crate::types::{AgentOutput, State, ToolCall, ToolResult};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

pub struct ActingState;

/// Runs one tool call and reports it on the output channel.
fn run_tool(tools: &ToolRegistry, call: ToolCall, output_tx: Option<&UnboundedSender<AgentOutput>>) -> ToolResult {
    emit(output_tx, AgentOutput::ToolCallStarted {
        name: call.name.clone(),
        args: call.args.clone(),
    });

    let start = Instant::now();
    let result = tools.execute(&call.name, &call.args);
    let latency = start.elapsed().as_millis() as u64;

    let (output, success) = match &result {
        Ok(out)  => (out.clone(), true),
        Err(err) => (err.clone(), false),
    };
    emit(output_tx, AgentOutput::ToolCallFinished {
        name: call.name.clone(),
        result: output.clone(),
        success,
    });

    match result {
        Ok(_)  => ToolResult::success(call, output, latency),
        Err(_) => ToolResult::failure(call, &output, latency),
    }
}

#[async_trait]
impl AgentState for ActingState {
    fn name(&self) -> &'static str { "Acting" }

    async fn handle(
        &self,
        memory:    &mut AgentMemory,
        tools:     &Arc<ToolRegistry>,
        _llm:      &dyn AsyncLlmCaller,
        output_tx: Option<&UnboundedSender<AgentOutput>>,
    ) -> Event {
        emit(output_tx, AgentOutput::StateStarted(State::acting()));

        let pending = std::mem::take(&mut memory.pending_tool_calls);
        if pending.is_empty() {
            memory.error = Some("ActingState called with no pending tool calls".to_string());
            memory.log("Acting", "FATAL_ERROR", "No pending tool calls");
            return Event::fatal_error();
        }

        let count = pending.len();
        memory.log("Acting", "TOOL_EXECUTE", &format!(
            "count={} tools={:?}", count, pending.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        ));

        let results: Vec<ToolResult> = if memory.config.parallel_tools && count > 1 {
            // Tool functions do blocking file I/O; run them on the blocking pool.
            let tasks = pending.into_iter().map(|call| {
                let tools = Arc::clone(tools);
                let tx = output_tx.cloned();
                let name = call.name.clone();
                let fallback = call.clone();
                let handle = tokio::task::spawn_blocking(move || run_tool(&tools, call, tx.as_ref()));
                async move {
                    handle.await.unwrap_or_else(|e| {
                        ToolResult::failure(fallback, &format!("Tool '{}' panicked: {}", name, e), 0)
                    })
                }
            });
            join_all(tasks).await
        } else {
            pending.into_iter().map(|call| run_tool(tools, call, output_tx)).collect()
        };

        let success_count = results.iter().filter(|r| r.success).count();
        for result in &results {
            let event = if result.success { "TOOL_SUCCESS" } else { "TOOL_FAILURE" };
            let data: String = format!("{} -> {}", result.call.name, result.output).chars().take(120).collect();
            memory.log("Acting", event, &data);
        }
        tracing::info!(success = success_count, total = count, "tools executed");

        memory.tool_results = results;

        if success_count > 0 {
            Event::tool_success()
        } else {
            Event::tool_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmCaller;
    use std::collections::HashMap;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register("t1", "t1", serde_json::json!({}), Arc::new(|_: &HashMap<String, serde_json::Value>| Ok("{\"r\":1}".to_string())));
        registry.register("t2", "t2", serde_json::json!({}), Arc::new(|_: &HashMap<String, serde_json::Value>| Err("e2".to_string())));
        Arc::new(registry)
    }

    fn call(name: &str, id: &str) -> ToolCall {
        ToolCall { name: name.to_string(), args: HashMap::new(), id: Some(id.to_string()) }
    }

    #[tokio::test]
    async fn results_keep_request_order_when_parallel() {
        let mut memory = AgentMemory::new("test");
        memory.pending_tool_calls = vec![call("t2", "a"), call("t1", "b"), call("nope", "c")];

        let event = ActingState.handle(&mut memory, &registry(), &MockLlmCaller::new(vec![]), None).await;

        assert_eq!(event, Event::tool_success()); // at least one succeeded
        let ids: Vec<_> = memory.tool_results.iter().map(|r| r.call.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(memory.tool_results[0].output, "{\"error\":\"e2\"}");
        assert!(memory.tool_results[2].output.contains("Unknown tool: nope"));
        assert!(memory.pending_tool_calls.is_empty());
    }

    #[tokio::test]
    async fn all_failures_report_tool_failure() {
        let mut memory = AgentMemory::new("test");
        memory.config.parallel_tools = false;
        memory.pending_tool_calls = vec![call("t2", "a")];

        let event = ActingState.handle(&mut memory, &registry(), &MockLlmCaller::new(vec![]), None).await;
        assert_eq!(event, Event::tool_failure());
    }

    #[tokio::test]
    async fn nothing_pending_is_fatal() {
        let mut memory = AgentMemory::new("test");
        let event = ActingState.handle(&mut memory, &registry(), &MockLlmCaller::new(vec![]), None).await;
        assert_eq!(event, Event::fatal_error());
        assert!(memory.error.is_some());
    }
}
