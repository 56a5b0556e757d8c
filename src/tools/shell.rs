//! Shell execution tool
//!
//! Runs a command through `sh -c` inside the workspace. The tool owns its
//! timeout: on expiry, or when the run is cancelled, the subprocess is killed.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::history::MessageHistory;

use super::{Tool, ToolContext, ToolOutput};

/// Cap on captured output per stream.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

pub struct ShellExecTool {
    default_timeout: Duration,
}

impl ShellExecTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for ShellExecTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn clip(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n...[output truncated]", &text[..cut])
}

fn format_output(stdout: &[u8], stderr: &[u8], code: Option<i32>) -> String {
    let mut out = String::new();
    let stdout = clip(stdout);
    let stderr = clip(stderr);
    if !stdout.is_empty() {
        out.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("[stderr]\n");
        out.push_str(&stderr);
    }
    match code {
        Some(0) if out.is_empty() => out.push_str("(no output)"),
        Some(0) => {}
        Some(code) => {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("[exit code: {}]", code));
        }
        None => out.push_str("\n[terminated by signal]"),
    }
    out
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace and return its output"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line passed to sh -c"},
                "exec_dir": {"type": "string", "description": "Working directory relative to the workspace"},
                "timeout": {"type": "integer", "description": "Timeout in seconds"}
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let command = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HarnessError::Tool("Missing 'command' argument".into()))?;
        let timeout = input
            .get("timeout")
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if ctx.workspace.is_some() {
            let dir = input.get("exec_dir").and_then(|v| v.as_str()).unwrap_or(".");
            cmd.current_dir(super::filesystem::resolve_in_workspace(dir, ctx)?);
        }

        debug!(command = %command, timeout_secs = timeout.as_secs(), "Spawning shell command");
        let child = cmd
            .spawn()
            .map_err(|e| HarnessError::Tool(format!("Failed to spawn command: {}", e)))?;

        // dropping the wait future kills the child (kill_on_drop)
        tokio::select! {
            result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => {
                    let text = format_output(&output.stdout, &output.stderr, output.status.code());
                    if output.status.success() {
                        Ok(ToolOutput::llm_only(text))
                    } else {
                        Ok(ToolOutput::error(text))
                    }
                }
                Ok(Err(e)) => Err(HarnessError::Tool(format!("Failed to wait for command: {}", e))),
                Err(_) => {
                    warn!(command = %command, timeout_secs = timeout.as_secs(), "Shell command timed out");
                    Ok(ToolOutput::error(format!(
                        "Command timed out after {} seconds and was killed",
                        timeout.as_secs()
                    )))
                }
            },
            _ = ctx.cancel.cancelled() => {
                warn!(command = %command, "Shell command cancelled");
                Ok(ToolOutput::error("Command cancelled"))
            }
        }
    }
}
