//! Expose a whole agent as a tool.
//!
//! The wrapped agent keeps its own history and tool manager. Each call runs
//! it from scratch on the given task and hands its final answer back to the
//! calling agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agent::{Agent, RunOutcome};
use crate::error::{HarnessError, Result};
use crate::history::MessageHistory;

use super::{Tool, ToolContext, ToolOutput};

/// Runs an inner [`Agent`] (e.g. a reviewer) as a single tool call.
///
/// The inner run shares the caller's cancel flag, so cancelling the outer
/// run stops the inner one at its next checkpoint.
pub struct AgentTool {
    name: String,
    description: String,
    agent: Arc<Mutex<Agent>>,
}

impl AgentTool {
    pub fn new(name: &str, description: &str, agent: Agent) -> Self {
        Self::shared(name, description, Arc::new(Mutex::new(agent)))
    }

    /// Wrap an agent the caller keeps a handle to (to inspect its history).
    pub fn shared(name: &str, description: &str, agent: Arc<Mutex<Agent>>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            agent,
        }
    }

    pub fn agent(&self) -> Arc<Mutex<Agent>> {
        Arc::clone(&self.agent)
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Complete, self-contained instructions for the agent"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let task = input
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| HarnessError::Tool("Missing 'task' argument".into()))?;

        if ctx.cancel.is_cancelled() {
            return Ok(ToolOutput::error("Agent not started: run was cancelled"));
        }

        let mut agent = self.agent.lock().await;
        // the outer run may have been cancelled while waiting for the lock
        if ctx.cancel.is_cancelled() {
            return Ok(ToolOutput::error("Agent not started: run was cancelled"));
        }
        info!(tool = %self.name, inner_agent = %agent.name(), "Delegating to inner agent");

        // the inner run stops on the outer run's flag
        let result = agent
            .run_with_cancel(task, false, ctx.cancel.clone())
            .await;

        match result {
            Ok(RunOutcome::Completed(answer)) => Ok(ToolOutput::llm_only(answer)),
            Ok(RunOutcome::Interrupted(reason)) => {
                Ok(ToolOutput::error(format!("Agent interrupted: {}", reason)))
            }
            Ok(RunOutcome::BudgetExhausted(payload)) => {
                warn!(tool = %self.name, "Inner agent exhausted its turn budget");
                Ok(ToolOutput::error(payload))
            }
            Err(e) => Err(HarnessError::Tool(format!("{} failed: {}", self.name, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::CancelFlag;
    use crate::history::ToolCall;
    use crate::providers::{LLMResponse, ScriptedClient};
    use crate::tools::{EchoTool, ToolManager};

    fn reviewer(client: &ScriptedClient) -> Agent {
        Agent::builder(Box::new(client.clone()))
            .name("reviewer")
            .tool(Box::new(EchoTool))
            .build()
    }

    #[tokio::test]
    async fn test_returns_inner_answer() {
        let client = ScriptedClient::with_responses(vec![LLMResponse::text("LGTM")]);
        let tool = AgentTool::new("review", "Review a change", reviewer(&client));
        let out = tool
            .execute(
                json!({"task": "review this"}),
                &MessageHistory::new(),
                &ToolContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.for_llm, "LGTM");
        assert!(!out.is_error);
        assert_eq!(client.requests()[0].messages[0].text(), "review this");
    }

    #[tokio::test]
    async fn test_inner_history_is_separate() {
        let client = ScriptedClient::new();
        client.push_tool_call("r1", "echo", json!({"message": "checking"}));
        client.push_text("no issues");
        let shared = Arc::new(Mutex::new(reviewer(&client)));
        let tool = AgentTool::shared("review", "Review", Arc::clone(&shared));

        let mut manager = ToolManager::new();
        manager.register(Box::new(tool));
        let outer = MessageHistory::new();
        let call = ToolCall::new("outer-1", "review", json!({"task": "look"}));
        let result = manager.run_tool(&call, &outer, &ToolContext::new()).await;

        assert!(!result.is_error);
        assert_eq!(result.output, "no issues");
        assert_eq!(shared.lock().await.history().len(), 4);
        assert!(outer.is_empty());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_error_output() {
        let client = ScriptedClient::new().with_fallback(LLMResponse::text("unused"));
        client.push_tool_call("r1", "echo", json!({"message": "x"}));
        let agent = Agent::builder(Box::new(client))
            .name("reviewer")
            .tool(Box::new(EchoTool))
            .max_turns(1)
            .build();
        let tool = AgentTool::new("review", "Review", agent);

        let out = tool
            .execute(json!({"task": "t"}), &MessageHistory::new(), &ToolContext::new())
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.for_llm.contains("reviewer did not complete"));
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_run() {
        let client = ScriptedClient::new();
        let tool = AgentTool::new("review", "Review", reviewer(&client));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let ctx = ToolContext::new().with_cancel(cancel);

        let out = tool
            .execute(json!({"task": "t"}), &MessageHistory::new(), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_agent_lock() {
        let client = ScriptedClient::with_responses(vec![LLMResponse::text("inner ran")]);
        let shared = Arc::new(Mutex::new(reviewer(&client)));
        let tool = Arc::new(AgentTool::shared("review", "Review", Arc::clone(&shared)));
        let cancel = CancelFlag::new();
        let ctx = ToolContext::new().with_cancel(cancel.clone());

        let guard = shared.lock().await;
        let handle = {
            let tool = Arc::clone(&tool);
            tokio::spawn(async move {
                tool.execute(json!({"task": "t"}), &MessageHistory::new(), &ctx)
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        drop(guard);

        let out = handle.await.unwrap().unwrap();
        assert!(out.is_error);
        assert_eq!(client.call_count(), 0);
    }

    struct CancelOuter;

    #[async_trait]
    impl Tool for CancelOuter {
        fn name(&self) -> &str {
            "cancel_outer"
        }

        fn description(&self) -> &str {
            "Cancels the run it is part of"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _input: Value,
            _history: &MessageHistory,
            ctx: &ToolContext,
        ) -> Result<ToolOutput> {
            ctx.cancel.cancel();
            Ok(ToolOutput::llm_only("cancelled"))
        }
    }

    #[tokio::test]
    async fn test_cancel_during_inner_run_interrupts_it() {
        let client = ScriptedClient::new().with_fallback(LLMResponse::text("should not run"));
        client.push_tool_call("r1", "cancel_outer", json!({}));
        let inner = Agent::builder(Box::new(client.clone()))
            .name("reviewer")
            .tool(Box::new(CancelOuter))
            .build();
        let tool = AgentTool::new("review", "Review", inner);
        let cancel = CancelFlag::new();
        let ctx = ToolContext::new().with_cancel(cancel.clone());

        let out = tool
            .execute(json!({"task": "t"}), &MessageHistory::new(), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.for_llm.starts_with("Agent interrupted"));
        assert_eq!(client.call_count(), 1);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_inner_error_becomes_tool_error() {
        let client = ScriptedClient::new();
        let tool = AgentTool::new("review", "Review", reviewer(&client));
        let err = tool
            .execute(json!({"task": "t"}), &MessageHistory::new(), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Tool(ref m) if m.contains("no responses left")));
    }
}
