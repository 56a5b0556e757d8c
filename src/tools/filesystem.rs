//! Filesystem tools
//!
//! `list_dir`, `read_file`, `write_file` and `str_replace`. Paths may be
//! absolute or relative to the workspace, but must resolve inside it.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{HarnessError, Result};
use crate::history::MessageHistory;
use crate::utils::string::preview;

use super::{Tool, ToolContext, ToolOutput};

/// Lexically normalize `path`, resolving `.` and `..` without touching disk.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
///
/// Fails on a dangling symlink, whose target cannot be checked.
fn resolve_existing_prefix(path: &Path) -> std::result::Result<PathBuf, PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match current.canonicalize() {
            Ok(mut real) => {
                for name in missing.iter().rev() {
                    real.push(name);
                }
                return Ok(real);
            }
            Err(_) if current.symlink_metadata().is_ok() => return Err(current.to_path_buf()),
            Err(_) => {}
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return Ok(path.to_path_buf()),
        }
    }
}

/// Resolve `path` against the workspace and reject anything outside it.
///
/// The deepest existing ancestor is canonicalized, so symlinks cannot escape
/// the workspace even for files that do not exist yet.
pub fn resolve_in_workspace(path: &str, ctx: &ToolContext) -> Result<PathBuf> {
    let workspace = ctx.workspace.as_ref().ok_or_else(|| {
        HarnessError::Tool("No workspace configured for filesystem tools".to_string())
    })?;
    let root = workspace
        .canonicalize()
        .unwrap_or_else(|_| normalize(workspace));

    let requested = Path::new(path);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };
    let resolved = match joined.canonicalize() {
        Ok(real) => real,
        Err(_) => resolve_existing_prefix(&normalize(&joined)).map_err(|link| {
            HarnessError::Tool(format!(
                "Path '{}' goes through a broken symlink at {}",
                path,
                link.display()
            ))
        })?,
    };

    if !resolved.starts_with(&root) {
        return Err(HarnessError::Tool(format!(
            "Path '{}' is outside the workspace",
            path
        )));
    }
    Ok(resolved)
}

fn str_arg<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HarnessError::Tool(format!("Missing '{}' argument", key)))
}

// ============================================================================
// list_dir
// ============================================================================

/// Lists a directory, one entry per line, directories suffixed with `/`.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory in the workspace"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let path = str_arg(&input, "path")?;
        let full_path = resolve_in_workspace(path, ctx)?;

        let mut entries = tokio::fs::read_dir(&full_path).await.map_err(|e| {
            HarnessError::Tool(format!("Failed to read directory '{}': {}", path, e))
        })?;

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let suffix = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => "/",
                Ok(ft) if ft.is_symlink() => "@",
                _ => "",
            };
            items.push(format!("{}{}", name, suffix));
        }

        if items.is_empty() {
            return Ok(ToolOutput::llm_only("(empty directory)"));
        }
        items.sort();
        Ok(ToolOutput::llm_only(items.join("\n")))
    }
}

// ============================================================================
// read_file
// ============================================================================

/// Reads a UTF-8 file, capped at `max_bytes`.
pub struct ReadFileTool {
    max_bytes: usize,
}

impl ReadFileTool {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new(200_000)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to read, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let path = str_arg(&input, "path")?;
        let full_path = resolve_in_workspace(path, ctx)?;

        let bytes = tokio::fs::read(&full_path)
            .await
            .map_err(|e| HarnessError::Tool(format!("Failed to read file '{}': {}", path, e)))?;
        let total = bytes.len();
        let mut content = String::from_utf8_lossy(&bytes[..total.min(self.max_bytes)]).into_owned();
        if total > self.max_bytes {
            content.push_str(&format!("\n...[file truncated, {} of {} bytes shown]", self.max_bytes, total));
        }
        Ok(ToolOutput::llm_only(content))
    }
}

// ============================================================================
// write_file
// ============================================================================

/// Writes a file, creating parent directories.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file in the workspace"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to write"},
                "content": {"type": "string", "description": "Full file content"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let path = str_arg(&input, "path")?;
        let content = str_arg(&input, "content")?;
        let full_path = resolve_in_workspace(path, ctx)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, content)
            .await
            .map_err(|e| HarnessError::Tool(format!("Failed to write file '{}': {}", path, e)))?;

        Ok(ToolOutput::llm_only(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path
        )))
    }
}

// ============================================================================
// str_replace
// ============================================================================

/// Replaces exactly one occurrence of `old_str` in a file.
pub struct StrReplaceTool;

#[async_trait]
impl Tool for StrReplaceTool {
    fn name(&self) -> &str {
        "str_replace"
    }

    fn description(&self) -> &str {
        "Replace a unique snippet of text in a workspace file"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "old_str": {"type": "string", "description": "Exact text to replace; must occur once"},
                "new_str": {"type": "string", "description": "Replacement text"}
            },
            "required": ["path", "old_str", "new_str"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        _history: &MessageHistory,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let path = str_arg(&input, "path")?;
        let old_str = str_arg(&input, "old_str")?;
        let new_str = str_arg(&input, "new_str")?;
        if old_str.is_empty() {
            return Ok(ToolOutput::error("old_str must not be empty"));
        }
        let full_path = resolve_in_workspace(path, ctx)?;

        let content = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| HarnessError::Tool(format!("Failed to read file '{}': {}", path, e)))?;

        match content.matches(old_str).count() {
            0 => Ok(ToolOutput::error(format!(
                "Text '{}' not found in {}",
                preview(old_str, 50),
                path
            ))),
            1 => {
                let updated = content.replacen(old_str, new_str, 1);
                tokio::fs::write(&full_path, updated).await?;
                Ok(ToolOutput::llm_only(format!("Edited {}", path)))
            }
            n => Ok(ToolOutput::error(format!(
                "Text occurs {} times in {}; include more context to make it unique",
                n, path
            ))),
        }
    }
}
