//! User-facing message tools.
//!
//! `message_user` surfaces a status line to the human while the run keeps
//! going. `return_control_to_user` is the default termination tool: when the
//! model calls it, the run completes with the tool's output.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::DEFAULT_TERMINATION_TOOL;
use crate::error::{HarnessError, Result};
use crate::history::MessageHistory;

use super::{Tool, ToolContext, ToolOutput};

/// Send a progress message to the user without ending the run.
pub struct MessageUserTool;

#[async_trait]
impl Tool for MessageUserTool {
    fn name(&self) -> &str {
        "message_user"
    }

    fn description(&self) -> &str {
        "Send a short message to the user, for example a progress update or a question. \
         The run continues after the message is delivered."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Message to show to the user"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let text = input
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HarnessError::Tool("Missing 'text' argument".into()))?;
        if text.trim().is_empty() {
            return Ok(ToolOutput::error("Message text must not be empty"));
        }
        Ok(ToolOutput::split("Sent message to user", text))
    }
}

/// End the run and hand control back to the user.
pub struct ReturnControlTool;

#[async_trait]
impl Tool for ReturnControlTool {
    fn name(&self) -> &str {
        DEFAULT_TERMINATION_TOOL
    }

    fn description(&self) -> &str {
        "Finish the task and return control to the user. Put the final answer or a \
         summary of what was done in 'message'."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Final answer or summary for the user"
                }
            }
        })
    }

    async fn execute(
        &self,
        input: Value,
        history: &MessageHistory,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        // Fall back to whatever the model said alongside the call.
        let message = input
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|m| !m.trim().is_empty())
            .or_else(|| history.last_assistant_text())
            .unwrap_or_else(|| "Task completed".to_string());
        Ok(ToolOutput::user_visible(message))
    }
}
