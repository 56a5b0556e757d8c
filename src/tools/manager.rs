//! Tool manager: the registered tool set of one agent.
//!
//! Dispatch never fails from the loop's point of view. Unknown tools, bad
//! input, tool errors and tool panics all come back as error-flagged
//! [`ToolResult`]s the model can react to.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::error::{HarnessError, Result};
use crate::history::{MessageHistory, ToolCall, ToolResult};
use crate::utils::string::one_line;

use super::schema::validate_input;
use super::{Tool, ToolContext, ToolDescriptor};

/// Owns the tools of one agent instance, in registration order.
#[derive(Default)]
pub struct ToolManager {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from a list of tools.
    pub fn with_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        let mut manager = Self::new();
        for tool in tools {
            manager.register(tool);
        }
        manager
    }

    /// Add a tool. Name clashes are not rejected here; they are caught by
    /// [`validate_unique_names`](Self::validate_unique_names) before the next
    /// generation.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        info!(tool = %tool.name(), "Registering tool");
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Descriptors in registration order.
    pub fn get_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Fail with a protocol violation if two tools share a name.
    pub fn validate_unique_names(&self) -> Result<()> {
        let mut names = self.names();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(HarnessError::Protocol(format!(
                    "Tool {} is duplicated",
                    pair[0]
                )));
            }
        }
        Ok(())
    }

    /// Execute `call` against the matching tool.
    pub async fn run_tool(
        &self,
        call: &ToolCall,
        history: &MessageHistory,
        ctx: &ToolContext,
    ) -> ToolResult {
        let name = call.tool_name.as_str();
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, id = %call.tool_call_id, "Unknown tool requested");
            return ToolResult::error(call, format!("Unknown tool: {}", name));
        };

        if let Err(reason) = validate_input(&tool.input_schema(), &call.tool_input) {
            warn!(tool = %name, reason = %reason, "Rejected tool input");
            return ToolResult::error(call, format!("Invalid input for {}: {}", name, reason));
        }

        info!(tool = %name, id = %call.tool_call_id, "Executing tool");
        let start = Instant::now();
        let outcome = AssertUnwindSafe(tool.execute(call.tool_input.clone(), history, ctx))
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(output)) => {
                if let Some(message) = &output.for_user {
                    info!(tool = %name, message = %one_line(message, 200), "Tool message for user");
                }
                info!(tool = %name, duration_ms, is_error = output.is_error, "Tool finished");
                ToolResult {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    output: output.for_llm,
                    is_error: output.is_error,
                }
            }
            Ok(Err(e)) => {
                error!(tool = %name, error = %e, duration_ms, "Tool execution failed");
                ToolResult::error(call, format!("Error: {}", e))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(tool = %name, reason = %reason, duration_ms, "Tool panicked");
                ToolResult::error(call, format!("Tool {} crashed: {}", name, reason))
            }
        }
    }

    /// Clear per-run state of every tool.
    pub fn reset(&self) {
        for tool in &self.tools {
            tool.reset();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, ToolOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _input: Value,
            _history: &MessageHistory,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput> {
            Err(HarnessError::Tool("disk on fire".into()))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "Panics"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _input: Value,
            _history: &MessageHistory,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput> {
            panic!("unexpected state")
        }
    }

    struct CountingTool {
        resets: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "count"
        }
        fn description(&self) -> &str {
            "Counts resets"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _input: Value,
            history: &MessageHistory,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput> {
            Ok(ToolOutput::llm_only(format!("{} turns", history.len())))
        }
        fn reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall::new("call_1", name, input)
    }

    #[test]
    fn test_get_tools_keeps_registration_order() {
        let mut manager = ToolManager::new();
        manager.register(Box::new(FailingTool));
        manager.register(Box::new(EchoTool));
        manager.register(Box::new(PanickingTool));

        let names: Vec<_> = manager.get_tools().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["fail", "echo", "boom"]);
        assert!(manager.has("echo"));
        assert!(!manager.has("nope"));
    }

    #[test]
    fn test_validate_unique_names() {
        let mut manager = ToolManager::with_tools(vec![Box::new(EchoTool), Box::new(FailingTool)]);
        manager.validate_unique_names().unwrap();

        manager.register(Box::new(EchoTool));
        let err = manager.validate_unique_names().unwrap_err();
        assert!(matches!(err, HarnessError::Protocol(ref m) if m == "Tool echo is duplicated"));
    }

    #[tokio::test]
    async fn test_run_tool_success() {
        let manager = ToolManager::with_tools(vec![Box::new(EchoTool)]);
        let result = manager
            .run_tool(
                &call("echo", json!({"message": "hello"})),
                &MessageHistory::new(),
                &ToolContext::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.output, "hello");
        assert_eq!(result.tool_call_id, "call_1");
    }

    #[tokio::test]
    async fn test_run_unknown_tool() {
        let manager = ToolManager::new();
        let result = manager
            .run_tool(&call("teleport", json!({})), &MessageHistory::new(), &ToolContext::new())
            .await;
        assert!(result.is_error);
        assert_eq!(result.output, "Unknown tool: teleport");
        assert_eq!(result.tool_name, "teleport");
    }

    #[tokio::test]
    async fn test_run_tool_with_invalid_input() {
        let manager = ToolManager::with_tools(vec![Box::new(EchoTool)]);
        let result = manager
            .run_tool(&call("echo", json!({"message": 5})), &MessageHistory::new(), &ToolContext::new())
            .await;
        assert!(result.is_error);
        assert!(result.output.starts_with("Invalid input for echo"));
    }

    #[tokio::test]
    async fn test_tool_error_becomes_result() {
        let manager = ToolManager::with_tools(vec![Box::new(FailingTool)]);
        let result = manager
            .run_tool(&call("fail", json!({})), &MessageHistory::new(), &ToolContext::new())
            .await;
        assert!(result.is_error);
        assert_eq!(result.output, "Error: Tool error: disk on fire");
    }

    #[tokio::test]
    async fn test_tool_panic_becomes_result() {
        let manager = ToolManager::with_tools(vec![Box::new(PanickingTool)]);
        let result = manager
            .run_tool(&call("boom", json!({})), &MessageHistory::new(), &ToolContext::new())
            .await;
        assert!(result.is_error);
        assert_eq!(result.output, "Tool boom crashed: unexpected state");
    }

    #[tokio::test]
    async fn test_tool_sees_history_and_reset_reaches_tools() {
        let resets = Arc::new(AtomicUsize::new(0));
        let manager = ToolManager::with_tools(vec![Box::new(CountingTool {
            resets: resets.clone(),
        })]);

        let mut history = MessageHistory::new();
        history.add_user_prompt("hi");
        let result = manager
            .run_tool(&call("count", json!({})), &history, &ToolContext::new())
            .await;
        assert_eq!(result.output, "1 turns");

        manager.reset();
        manager.reset();
        assert_eq!(resets.load(Ordering::SeqCst), 2);
    }
}
