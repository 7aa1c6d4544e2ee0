use smartquote::AgentBuilder;
use smartquote::llm::MockLlmCaller;
use smartquote::types::{LlmResponse, ToolCall};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

fn two_calls() -> Vec<LlmResponse> {
    vec![
        LlmResponse::ToolCalls {
            calls: vec![
                ToolCall::new("tool_a", HashMap::new()).with_id("id_a"),
                ToolCall::new("tool_b", HashMap::new()).with_id("id_b"),
            ],
            content: Some("Running both.".to_string()),
            usage:   None,
        },
        LlmResponse::FinalAnswer {
            content: "Both tools finished.".to_string(),
            usage:   None,
        },
    ]
}

fn slow_tool(output: &'static str) -> smartquote::ToolFn {
    Arc::new(move |_: &HashMap<String, Value>| {
        std::thread::sleep(std::time::Duration::from_millis(100));
        Ok(format!("\"{}\"", output))
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parallel_tool_execution() {
    let mock = Arc::new(MockLlmCaller::new(two_calls()));
    let mut agent = AgentBuilder::new("Run two tools")
        .llm(mock.clone())
        .tool("tool_a", "desc", serde_json::json!({}), slow_tool("A done"))
        .tool("tool_b", "desc", serde_json::json!({}), slow_tool("B done"))
        .parallel_tools(true)
        .build()
        .unwrap();

    let start = std::time::Instant::now();
    let answer = agent.run().await.unwrap();
    let duration = start.elapsed();

    assert_eq!(answer, "Both tools finished.");
    // Parallel should take ~100ms, sequential would take ~200ms
    assert!(duration.as_millis() < 180, "Parallel execution seems too slow: {}ms", duration.as_millis());

    // Both results come back in request order under one assistant message.
    let messages = mock.call(1).unwrap().messages;
    assert_eq!(messages[1]["content"], "Running both.");
    assert_eq!(messages[2]["tool_call_id"], "id_a");
    assert_eq!(messages[2]["content"], "\"A done\"");
    assert_eq!(messages[3]["tool_call_id"], "id_b");
}

#[tokio::test]
async fn test_sequential_tool_execution_keeps_order() {
    let mock = Arc::new(MockLlmCaller::new(two_calls()));
    let mut agent = AgentBuilder::new("Run two tools")
        .llm(mock.clone())
        .tool("tool_a", "desc", serde_json::json!({}), Arc::new(|_: &HashMap<String, Value>| Ok("1".to_string())))
        .tool("tool_b", "desc", serde_json::json!({}), Arc::new(|_: &HashMap<String, Value>| Err("boom".to_string())))
        .parallel_tools(false)
        .build()
        .unwrap();

    agent.run().await.unwrap();

    let history = &agent.memory.history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tool.name, "tool_a");
    assert!(history[0].success);
    assert_eq!(history[1].observation, "{\"error\":\"boom\"}");
    assert!(!history[1].success);
}
