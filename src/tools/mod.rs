//! Tools module - capabilities the model can invoke
//!
//! # Overview
//!
//! - [`Tool`]: the interface every tool implements
//! - [`ToolContext`]: workspace, session and cancel flag for one call
//! - [`ToolManager`]: the per-agent tool set and its dispatch boundary
//!
//! # Built-in Tools
//!
//! - `EchoTool`: echoes its input, for testing
//! - `ListDirTool`, `ReadFileTool`, `WriteFileTool`, `StrReplaceTool`:
//!   workspace-confined filesystem access
//! - `ShellExecTool`: subprocess execution with its own timeout
//! - `MessageUserTool`: progress messages to the human
//! - `ReturnControlTool`: the default termination tool
//! - `AgentTool`: a whole agent exposed as a tool
//!
//! # Example
//!
//! ```rust
//! use agentharness::history::{MessageHistory, ToolCall};
//! use agentharness::tools::{EchoTool, ToolContext, ToolManager};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let manager = ToolManager::with_tools(vec![Box::new(EchoTool)]);
//! let call = ToolCall::new("call_1", "echo", json!({"message": "Hello!"}));
//! let result = manager
//!     .run_tool(&call, &MessageHistory::new(), &ToolContext::new())
//!     .await;
//! assert_eq!(result.output, "Hello!");
//! # });
//! ```

pub mod agent_tool;
pub mod filesystem;
mod manager;
pub mod message;
pub mod schema;
pub mod shell;
mod types;

pub use agent_tool::AgentTool;
pub use manager::ToolManager;
pub use types::{Tool, ToolContext, ToolDescriptor, ToolOutput};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::history::MessageHistory;

use filesystem::{ListDirTool, ReadFileTool, StrReplaceTool, WriteFileTool};
use message::{MessageUserTool, ReturnControlTool};
use shell::ShellExecTool;

/// Echoes back its `message` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let message = input
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(ToolOutput::llm_only(message))
    }
}

/// The standard tool set for a coding agent, configured from `config.tools`.
///
/// The termination tool is only included when `agent.termination_tool` is
/// left at its default name.
pub fn builtin_tools(config: &Config) -> Vec<Box<dyn Tool>> {
    let mut tools: Vec<Box<dyn Tool>> = vec![
        Box::new(ListDirTool),
        Box::new(ReadFileTool::new(config.tools.max_read_bytes)),
        Box::new(WriteFileTool),
        Box::new(StrReplaceTool),
        Box::new(ShellExecTool::new(Duration::from_secs(
            config.tools.shell_timeout_secs,
        ))),
        Box::new(MessageUserTool),
    ];
    if config.agent.termination_tool.as_deref() == Some(crate::config::DEFAULT_TERMINATION_TOOL) {
        tools.push(Box::new(ReturnControlTool));
    }
    tools
}
