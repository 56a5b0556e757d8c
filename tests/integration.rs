//! Integration tests for agentharness
//!
//! These drive the public API end to end with a scripted model: the turn
//! loop, built-in tools, context truncation, nested agents and the event
//! pipeline down to the JSONL store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;

use agentharness::agent::{Agent, CompletionPolicy, RunInput, RunOutcome};
use agentharness::context::{ContextManager, DropOldestContextManager, OMISSION_MARKER};
use agentharness::events::{
    ChannelTransport, EventConsumer, EventQueue, EventType, JsonlEventStore,
};
use agentharness::history::{validate_turns, Role};
use agentharness::providers::{LLMResponse, ScriptedClient};
use agentharness::tools::filesystem::ListDirTool;
use agentharness::tools::message::ReturnControlTool;
use agentharness::tools::shell::ShellExecTool;
use agentharness::tools::{AgentTool, EchoTool};
use agentharness::HarnessError;

// ============================================================================
// Turn Loop Scenarios
// ============================================================================

#[tokio::test]
async fn test_happy_path_list_files() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

    let client = ScriptedClient::new();
    client.push_tool_call("call_1", "list_dir", json!({"path": "."}));
    client.push_text("done");

    let mut agent = Agent::builder(Box::new(client.clone()))
        .tool(Box::new(ListDirTool))
        .workspace(dir.path())
        .build();

    let outcome = agent.run("list files", false).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed("done".into()));

    let turns = agent.history().turns();
    assert_eq!(turns.len(), 4);
    let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    let result = turns[2].tool_results().next().unwrap();
    assert!(!result.is_error);
    assert!(result.output.contains("notes.txt"));
}

#[tokio::test]
async fn test_unknown_tool_is_fed_back() {
    let client = ScriptedClient::new();
    client.push_tool_call("call_1", "teleport", json!({}));
    client.push_text("sorry, I cannot do that");

    let mut agent = Agent::builder(Box::new(client.clone()))
        .tool(Box::new(EchoTool))
        .build();

    let outcome = agent.run("go somewhere", false).await.unwrap();
    assert!(outcome.is_completed());

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    let result = requests[1].messages[2].tool_results().next().unwrap();
    assert!(result.is_error);
    assert!(result.output.contains("Unknown tool: teleport"));
}

#[tokio::test]
async fn test_structured_task_is_templated() {
    let client = ScriptedClient::with_responses(vec![LLMResponse::text("ok")]);
    let mut agent = Agent::builder(Box::new(client.clone()))
        .workspace("/srv/repo")
        .build();

    let input = RunInput::Task {
        task: "fix the failing test".into(),
        workspace: None,
    };
    agent.run(input, false).await.unwrap();

    let first = client.requests()[0].messages[0].text();
    assert!(first.contains("fix the failing test"));
    assert!(first.contains("/srv/repo"));
}

#[tokio::test]
async fn test_budget_exhaustion_is_reported() {
    let client = ScriptedClient::new().with_fallback(LLMResponse::text("never reached"));
    client.push_tool_call("call_1", "echo", json!({"message": "again"}));

    let mut agent = Agent::builder(Box::new(client.clone()))
        .name("looper")
        .tool(Box::new(EchoTool))
        .max_turns(1)
        .build();

    match agent.run("spin", false).await.unwrap() {
        RunOutcome::BudgetExhausted(payload) => {
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["error"], "looper did not complete within maximum turns");
        }
        other => panic!("expected budget exhaustion, got {:?}", other),
    }
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_cancel_during_tool_stops_before_next_generation() {
    let dir = tempdir().unwrap();
    let client = ScriptedClient::new().with_fallback(LLMResponse::text("resumed"));
    client.push_tool_call("call_1", "shell_exec", json!({"command": "sleep 5"}));

    let mut agent = Agent::builder(Box::new(client.clone()))
        .tool(Box::new(ShellExecTool::default()))
        .workspace(dir.path())
        .build();

    let cancel = agent.cancel_handle();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(4), agent.run("wait", false))
        .await
        .expect("cancelled run must not wait for the command")
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Interrupted("Agent interrupted by user".into())
    );
    assert_eq!(client.call_count(), 1);

    // the history ends on the tool result, so the run can be resumed
    assert!(agent.can_resume());
    let outcome = agent.run("", true).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed("resumed".into()));
}

#[tokio::test]
async fn test_resume_after_completion_is_rejected() {
    let client = ScriptedClient::with_responses(vec![LLMResponse::text("finished")]);
    let mut agent = Agent::builder(Box::new(client)).build();
    agent.run("task", false).await.unwrap();

    let err = agent.run("more", true).await.unwrap_err();
    assert!(matches!(err, HarnessError::Precondition(_)));
}

#[tokio::test]
async fn test_termination_tool_returns_message() {
    let client = ScriptedClient::new();
    client.push_tool_call(
        "call_1",
        "return_control_to_user",
        json!({"message": "All tests pass."}),
    );

    let mut agent = Agent::builder(Box::new(client))
        .tool(Box::new(ReturnControlTool))
        .build();

    let outcome = agent.run("run the tests", false).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed("All tests pass.".into()));
}

// ============================================================================
// Context Budget
// ============================================================================

#[tokio::test]
async fn test_long_run_stays_within_context_budget() {
    const BUDGET: usize = 600;
    let client = ScriptedClient::new();
    for i in 0..6 {
        client.push_tool_call(
            &format!("call_{}", i),
            "echo",
            json!({"message": "x".repeat(400)}),
        );
    }
    client.push_text("done");

    let mut agent = Agent::builder(Box::new(client.clone()))
        .tool(Box::new(EchoTool))
        .context_manager(Box::new(DropOldestContextManager::new(BUDGET)))
        .build();

    let outcome = agent.run("echo a lot", false).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed("done".into()));

    let counter = DropOldestContextManager::new(BUDGET);
    let requests = client.requests();
    assert_eq!(requests.len(), 7);
    for request in &requests {
        validate_turns(&request.messages).unwrap();
        assert!(counter.count_tokens(&request.messages) <= BUDGET);
        assert!(request.messages[0].text().contains("echo a lot"));
    }
    let last = &requests[6].messages;
    assert!(last.len() < 13);
    assert!(last[0].text().contains(OMISSION_MARKER));
}

// ============================================================================
// Nested Agents
// ============================================================================

#[tokio::test]
async fn test_reviewer_agent_as_tool() {
    let reviewer_client = ScriptedClient::new();
    reviewer_client.push_text("Looks reasonable.");
    reviewer_client.push_text("```json\n{\"approved\": true}\n```");
    let reviewer = Agent::builder(Box::new(reviewer_client.clone()))
        .name("reviewer")
        .completion(CompletionPolicy::StructuredJson {
            reminder: "Reply with a ```json block".into(),
        })
        .build();

    let client = ScriptedClient::new();
    client.push_tool_call("call_1", "review", json!({"task": "review my patch"}));
    client.push_tool_call(
        "call_2",
        "return_control_to_user",
        json!({"message": "Patch approved"}),
    );

    let mut lead = Agent::builder(Box::new(client.clone()))
        .name("lead")
        .tool(Box::new(AgentTool::new("review", "Ask the reviewer", reviewer)))
        .tool(Box::new(ReturnControlTool))
        .build();

    let outcome = lead.run("ship the patch", false).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed("Patch approved".into()));

    // the reviewer's JSON verdict went back to the lead model
    let review = client.requests()[1].messages[2]
        .tool_results()
        .next()
        .unwrap()
        .clone();
    assert_eq!(review.output, "{\"approved\": true}");
    assert_eq!(reviewer_client.call_count(), 2);
    // the lead's own history never saw the reviewer's turns
    assert_eq!(lead.history().len(), 5);
}

// ============================================================================
// Event Pipeline
// ============================================================================

#[tokio::test]
async fn test_events_are_persisted_and_forwarded() {
    let dir = tempdir().unwrap();
    let store = JsonlEventStore::new(dir.path()).unwrap();
    let (queue, rx) = EventQueue::channel();
    let (transport, mut live) = ChannelTransport::channel();
    let consumer = EventConsumer::new()
        .with_store(Box::new(store.clone()))
        .with_transport(Box::new(transport))
        .spawn(rx);

    let client = ScriptedClient::new();
    client.push_tool_call("call_1", "echo", json!({"message": "hello"}));
    client.push_text("said hello");

    let mut agent = Agent::builder(Box::new(client))
        .name("greeter")
        .session_id("session-it")
        .tool(Box::new(EchoTool))
        .event_sink(Arc::new(queue))
        .build();
    agent.run("say hello", false).await.unwrap();
    drop(agent);

    let stats = consumer.await.unwrap();
    assert_eq!(stats.received, 4);
    assert_eq!(stats.persisted, 4);
    assert_eq!(stats.forwarded, 3);
    assert!(!stats.transport_detached);

    let events = store.load_session("session-it").await.unwrap();
    let kinds: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::UserMessage,
            EventType::ToolCall,
            EventType::ToolResult,
            EventType::AgentResponse
        ]
    );
    assert_eq!(events[1].payload["tool_name"], "echo");
    assert_eq!(events[1].payload["tool_input"]["message"], "hello");
    assert_eq!(events[2].payload["result"], "hello");
    assert_eq!(events[3].payload["agent_name"], "greeter");
    assert_eq!(events[3].payload["content"], "said hello");

    let first_live = live.recv().await.unwrap();
    assert_eq!(first_live.event_type, EventType::ToolCall);

    let sessions = store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "session-it");
    assert_eq!(sessions[0].first_user_message.as_deref(), Some("say hello"));
    assert_eq!(sessions[0].event_count, 4);
}

#[tokio::test]
async fn test_dead_transport_never_blocks_the_agent() {
    let (queue, rx) = EventQueue::channel();
    let (transport, live) = ChannelTransport::channel();
    drop(live);
    let consumer = EventConsumer::new()
        .with_transport(Box::new(transport))
        .spawn(rx);

    let client = ScriptedClient::with_responses(vec![LLMResponse::text("fine")]);
    let mut agent = Agent::builder(Box::new(client))
        .event_sink(Arc::new(queue))
        .build();
    let outcome = agent.run("hello", false).await.unwrap();
    assert!(outcome.is_completed());
    drop(agent);

    let stats = consumer.await.unwrap();
    assert!(stats.transport_detached);
    assert_eq!(stats.forwarded, 0);
}
