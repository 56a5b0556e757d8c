//! Tool contract
//!
//! Every capability the model can invoke implements [`Tool`]. Tools receive
//! their JSON input, read-only access to the conversation, and a
//! [`ToolContext`] with the workspace and the run's cancel flag.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::CancelFlag;
use crate::error::Result;
use crate::history::MessageHistory;

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the input object
    pub input_schema: Value,
}

/// Result of a tool execution.
///
/// `for_llm` goes back into the conversation; `for_user` is an optional
/// human-facing message (status lines, final answers).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub for_llm: String,
    pub for_user: Option<String>,
    pub is_error: bool,
}

impl ToolOutput {
    /// Output only the model sees.
    pub fn llm_only(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            for_user: None,
            is_error: false,
        }
    }

    /// Same text for the model and the user.
    pub fn user_visible(content: impl Into<String>) -> Self {
        let s = content.into();
        Self {
            for_llm: s.clone(),
            for_user: Some(s),
            is_error: false,
        }
    }

    /// Different text for the model and the user.
    pub fn split(for_llm: impl Into<String>, for_user: impl Into<String>) -> Self {
        Self {
            for_llm: for_llm.into(),
            for_user: Some(for_user.into()),
            is_error: false,
        }
    }

    /// A recoverable failure the model should see and correct.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            for_user: None,
            is_error: true,
        }
    }
}

/// A named, schema-described capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a tool manager.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the input object.
    fn input_schema(&self) -> Value;

    /// Run the tool.
    ///
    /// Return `Ok(ToolOutput::error(..))` for failures the model should see.
    /// An `Err` is also converted to an error result by the tool manager.
    async fn execute(
        &self,
        input: Value,
        history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput>;

    /// Clear per-run state before a new, unrelated run.
    fn reset(&self) {}

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Execution context handed to every tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Directory filesystem and shell tools are confined to
    pub workspace: Option<PathBuf>,
    pub session_id: Option<String>,
    /// Set when the run has been asked to stop; long-running tools may poll it
    pub cancel: CancelFlag,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}
