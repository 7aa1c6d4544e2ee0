//! Integration tests for the agent state machine.
//!
//! All tests use `MockLlmCaller`; no network calls are made.
//! Run with: `cargo test`

use smartquote::{
    AgentBuilder, AgentConfig, AgentEngine, AgentError, AgentOutput,
    Event, LlmResponse, State, ToolCall, ToolRegistry,
};
use smartquote::llm::MockLlmCaller;
use smartquote::memory::AgentMemory;
use smartquote::states::{AgentState, IdleState, PlanningState, ActingState, ObservingState};
use smartquote::transitions::build_transition_table;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Test helpers
// ─────────────────────────────────────────────────────────────────────────────

fn test_memory() -> AgentMemory {
    AgentMemory::new("test task")
}

fn test_tools() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new())
}

fn tool_call(name: &str, id: &str) -> ToolCall {
    ToolCall::new(name, HashMap::new()).with_id(id)
}

fn make_tool_call_response(name: &str, id: &str) -> LlmResponse {
    LlmResponse::ToolCalls { calls: vec![tool_call(name, id)], content: None, usage: None }
}

fn make_final_answer(content: &str) -> LlmResponse {
    LlmResponse::FinalAnswer { content: content.to_string(), usage: None }
}

/// Build a full engine from a shared mock. Registers a "dummy" tool.
fn make_engine_with_mock(mock: Arc<MockLlmCaller>) -> AgentEngine {
    AgentBuilder::new("test task")
        .llm(mock)
        .model("test-model")
        .tool(
            "dummy",
            "A dummy tool for testing",
            json!({ "type": "object", "properties": {} }),
            Arc::new(|_args: &HashMap<String, Value>| Ok("{\"result\":\"dummy\"}".to_string())),
        )
        .build()
        .expect("builder should succeed")
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: IdleState produces Start → Planning
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_idle_to_planning_transition() {
    let mut memory = test_memory();
    let llm = MockLlmCaller::new(vec![]);

    let event = IdleState.handle(&mut memory, &test_tools(), &llm, None).await;
    assert_eq!(event, Event::start(), "IdleState must emit Start");

    let table = build_transition_table();
    assert_eq!(table.get(&(State::idle(), Event::start())), Some(&State::planning()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: PlanningState max-steps guard
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_planning_max_steps_guard() {
    let mut memory = test_memory();
    memory.config.max_steps = 3;
    memory.step = 3;

    let llm = MockLlmCaller::new(vec![]); // never called
    let event = PlanningState.handle(&mut memory, &test_tools(), &llm, None).await;

    assert_eq!(event, Event::max_steps());
    assert_eq!(llm.call_count(), 0);
    assert!(
        memory.error.as_ref().map_or(false, |e| e.contains("Max steps")),
        "memory.error should mention max steps, got: {:?}", memory.error
    );

    let table = build_transition_table();
    assert_eq!(table.get(&(State::planning(), Event::max_steps())), Some(&State::error()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: ActingState treats an unknown tool as ToolFailure, not a crash
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_acting_unknown_tool_is_failure_not_crash() {
    let mut memory = test_memory();
    memory.pending_tool_calls = vec![tool_call("nonexistent_tool", "x1")];

    let llm = MockLlmCaller::new(vec![]);
    let event = ActingState.handle(&mut memory, &test_tools(), &llm, None).await;

    assert_eq!(event, Event::tool_failure());
    let output: Value = serde_json::from_str(&memory.tool_results[0].output).unwrap();
    assert_eq!(output["error"], "Unknown tool: nonexistent_tool");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: ObservingState commits results to history
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_observing_commits_to_history() {
    let mut memory = test_memory();
    memory.step = 1;
    memory.pending_tool_calls = vec![tool_call("search", "s1")];

    let mut registry = ToolRegistry::new();
    registry.register("search", "search", json!({}), Arc::new(|_: &HashMap<String, Value>| Ok("\"found\"".to_string())));
    let tools = Arc::new(registry);
    let llm = MockLlmCaller::new(vec![]);

    ActingState.handle(&mut memory, &tools, &llm, None).await;
    let event = ObservingState.handle(&mut memory, &tools, &llm, None).await;

    assert_eq!(event, Event::r#continue());
    assert_eq!(memory.history.len(), 1);
    assert_eq!(memory.history[0].tool.name, "search");
    assert_eq!(memory.history[0].step, 1);
    assert!(memory.history[0].success);
    assert!(memory.tool_results.is_empty(), "tool_results must be drained");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: Full run: tool call, then final answer
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_run_with_mock_llm() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        make_final_answer("Based on the dummy tool result, the answer is 42."),
    ]));

    let mut engine = make_engine_with_mock(mock.clone());
    let answer = engine.run().await.expect("agent should complete");

    assert!(answer.contains("42"));
    assert_eq!(engine.current_state(), &State::done());
    assert_eq!(mock.call_count(), 2);
    assert_eq!(mock.model_for_call(1).as_deref(), Some("test-model"));

    // Second call carries the assistant tool call and its tool message.
    let messages = mock.call(1).unwrap().messages;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["tool_calls"][0]["id"], "d1");
    assert_eq!(messages[2]["role"], "tool");
    assert_eq!(messages[2]["tool_call_id"], "d1");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: Direct answer without tools
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_direct_answer_skips_acting() {
    let mock = Arc::new(MockLlmCaller::new(vec![make_final_answer("Hello! How can I help with a quote?")]));
    let mut engine = make_engine_with_mock(mock.clone());

    engine.run().await.expect("agent should complete");
    assert!(engine.trace().for_state("Acting").is_empty());
    assert_eq!(mock.call(0).unwrap().tools, vec!["dummy".to_string()]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 7: Empty reply after tools → fallback summary; with no tools → error
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_reply_after_tools_uses_fallback() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        LlmResponse::Empty { usage: None },
    ]));
    let mut engine = make_engine_with_mock(mock);

    let answer = engine.run().await.unwrap();
    assert_eq!(answer, "Quote processed successfully, but no summary response was generated.");
}

#[tokio::test]
async fn test_empty_reply_without_tools_fails() {
    let mock = Arc::new(MockLlmCaller::new(vec![LlmResponse::Empty { usage: None }]));
    let mut engine = make_engine_with_mock(mock);

    match engine.run().await {
        Err(AgentError::AgentFailed(msg)) => assert_eq!(msg, "No response received"),
        other => panic!("expected AgentFailed, got {:?}", other),
    }
    assert_eq!(engine.current_state(), &State::error());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 8: max_tool_rounds = 1 sends the follow-up without tools
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_tool_round_forces_summary() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        make_final_answer("Summary after one round."),
    ]));
    let mut engine = AgentBuilder::new("task")
        .llm(mock.clone())
        .max_tool_rounds(1)
        .tool("dummy", "d", json!({}), Arc::new(|_: &HashMap<String, Value>| Ok("1".to_string())))
        .build()
        .unwrap();

    engine.run().await.unwrap();
    assert_eq!(mock.call(0).unwrap().tools.len(), 1);
    assert!(mock.call(1).unwrap().tools.is_empty());
}

#[tokio::test]
async fn test_tool_calls_after_last_round_are_not_executed() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        LlmResponse::ToolCalls {
            calls:   vec![tool_call("dummy", "d2")],
            content: Some("Hello from the summary step.".to_string()),
            usage:   None,
        },
        make_final_answer("should never be requested"),
    ]));
    let mut engine = AgentBuilder::new("task")
        .llm(mock.clone())
        .max_tool_rounds(1)
        .tool("dummy", "d", json!({}), Arc::new(|_: &HashMap<String, Value>| Ok("1".to_string())))
        .build()
        .unwrap();

    let answer = engine.run().await.unwrap();
    assert_eq!(answer, "Hello from the summary step.");
    assert_eq!(mock.call_count(), 2);
    assert_eq!(engine.memory.history.len(), 1, "the second round's call must not run");
}

#[tokio::test]
async fn test_bare_tool_calls_after_last_round_use_fallback_summary() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        make_tool_call_response("dummy", "d2"),
    ]));
    let mut engine = AgentBuilder::new("task")
        .llm(mock.clone())
        .max_tool_rounds(1)
        .tool("dummy", "d", json!({}), Arc::new(|_: &HashMap<String, Value>| Ok("1".to_string())))
        .build()
        .unwrap();

    let answer = engine.run().await.unwrap();
    assert_eq!(answer, "Quote processed successfully, but no summary response was generated.");
    assert_eq!(mock.call_count(), 2);
    assert_eq!(engine.trace().count_event("TOOLS_IGNORED"), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 9: Looping tool calls stop at max_steps
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_runaway_tool_loop_hits_max_steps() {
    let responses = (0..5).map(|i| make_tool_call_response("dummy", &format!("d{}", i))).collect();
    let mock = Arc::new(MockLlmCaller::new(responses));
    let mut engine = AgentBuilder::new("task")
        .llm(mock.clone())
        .max_steps(3)
        .tool("dummy", "d", json!({}), Arc::new(|_: &HashMap<String, Value>| Ok("1".to_string())))
        .build()
        .unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(err.to_string().contains("Max steps 3 exceeded"), "got: {}", err);
    assert_eq!(mock.call_count(), 3);
    assert_eq!(engine.memory.history.len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 10: Trace records every state
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_trace_records_all_steps() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        make_tool_call_response("dummy", "d2"),
        make_final_answer("Trace test complete answer value here."),
    ]));

    let mut engine = make_engine_with_mock(mock);
    engine.run().await.expect("agent should complete");

    let trace = engine.trace();
    for state in ["Idle", "Planning", "Acting", "Observing", "Done"] {
        assert!(!trace.for_state(state).is_empty(), "trace must contain {} entries", state);
    }
    assert_eq!(trace.count_event("STEP_START"), 3);
    assert_eq!(engine.memory.history.len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 11: Streaming yields tool activity and the final answer
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_streaming_reports_tools_and_answer() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_tool_call_response("dummy", "d1"),
        make_final_answer("Streaming done."),
    ]));
    let mut engine = make_engine_with_mock(mock);

    let outputs: Vec<AgentOutput> = engine.run_streaming().collect().await;

    assert!(outputs.iter().any(|o| matches!(o, AgentOutput::ToolCallStarted { name, .. } if name == "dummy")));
    assert!(outputs.iter().any(|o| matches!(o, AgentOutput::ToolCallFinished { success: true, .. })));
    assert!(matches!(outputs.last(), Some(AgentOutput::FinalAnswer(a)) if a == "Streaming done."));
    assert_eq!(engine.current_state(), &State::done());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 12: LLM failure ends in Error with the message preserved
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_llm_error_is_fatal() {
    let mock = Arc::new(MockLlmCaller::with_results(vec![Err("gateway timeout".to_string())]));
    let mut engine = make_engine_with_mock(mock);

    let err = engine.run().await.unwrap_err();
    assert!(err.to_string().contains("LLM error: gateway timeout"), "got: {}", err);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 13: AgentBuilder requires an LLM caller
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_builder_requires_llm() {
    let result = AgentBuilder::new("test no llm").build();

    // err().unwrap() avoids requiring AgentEngine: Debug
    match result.err().unwrap() {
        AgentError::BuildError(msg) => assert!(msg.to_lowercase().contains("llm"), "got: {}", msg),
        other => panic!("Expected BuildError, got: {:?}", other),
    }
}

#[test]
fn test_builder_rejects_zero_max_steps() {
    let result = AgentBuilder::new("task")
        .llm(Arc::new(MockLlmCaller::new(vec![])))
        .max_steps(0)
        .build();
    assert!(matches!(result.err(), Some(AgentError::BuildError(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 14: Too-short answers send the agent back to Planning
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_short_answer_triggers_replan() {
    let mock = Arc::new(MockLlmCaller::new(vec![
        make_final_answer("ok"),
        make_final_answer("Quote Q-1A2B3C saved for ABC Corp."),
    ]));
    let mut engine = AgentBuilder::new("task")
        .llm(mock.clone())
        .config(AgentConfig { min_answer_length: 10, ..AgentConfig::default() })
        .build()
        .unwrap();

    let answer = engine.run().await.unwrap();
    assert_eq!(answer, "Quote Q-1A2B3C saved for ABC Corp.");
    assert_eq!(mock.call_count(), 2);
    assert_eq!(engine.trace().count_event("ANSWER_TOO_SHORT"), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 15: An event with no edge from the current state is rejected
// ─────────────────────────────────────────────────────────────────────────────

struct StrayEventIdle;

#[async_trait]
impl AgentState for StrayEventIdle {
    fn name(&self) -> &'static str { "Idle" }

    async fn handle(
        &self,
        memory:     &mut AgentMemory,
        _tools:     &Arc<ToolRegistry>,
        _llm:       &dyn smartquote::AsyncLlmCaller,
        _output_tx: Option<&tokio::sync::mpsc::UnboundedSender<AgentOutput>>,
    ) -> Event {
        memory.log("Idle", "STRAY", "emitting an unmapped event");
        Event::new("Teleport")
    }
}

#[tokio::test]
async fn test_unmapped_event_is_invalid_transition() {
    let handlers: HashMap<String, Box<dyn AgentState>> =
        HashMap::from([("Idle".to_string(), Box::new(StrayEventIdle) as Box<dyn AgentState>)]);
    let mut engine = AgentBuilder::new("task")
        .llm(Arc::new(MockLlmCaller::new(vec![])))
        .build_with_handlers(handlers)
        .unwrap();

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    match engine.step(&tx).await {
        Err(AgentError::InvalidTransition { from, event }) => {
            assert_eq!(from, State::idle());
            assert_eq!(event, Event::new("Teleport"));
        }
        other => panic!("Expected InvalidTransition, got: {:?}", other.err()),
    }
    assert_eq!(engine.current_state(), &State::idle());
}
