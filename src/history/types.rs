//! Conversation data types
//!
//! A conversation is a list of [`Turn`]s alternating user/assistant, each
//! holding typed [`ContentBlock`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of the conversation authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// The role expected at `index` in a well-formed turn list.
    pub fn at_position(index: usize) -> Self {
        if index % 2 == 0 {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A model-requested tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within a conversation
    pub tool_call_id: String,
    pub tool_name: String,
    pub tool_input: Value,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use agentharness::history::ToolCall;
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_1", "list_dir", json!({"path": "."}));
    /// assert_eq!(call.tool_name, "list_dir");
    /// ```
    pub fn new(id: &str, name: &str, input: Value) -> Self {
        Self {
            tool_call_id: id.to_string(),
            tool_name: name.to_string(),
            tool_input: input,
        }
    }
}

/// The outcome of one tool call, correlated by `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result for `call`.
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            output: output.into(),
            is_error: false,
        }
    }

    /// An error-flagged result for `call`.
    pub fn error(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::success(call, output)
        }
    }
}

/// Binary image content carried by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Smallest unit of conversational data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// User-authored text
    TextPrompt { text: String },
    /// Model-authored text
    TextResult { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    Image(ImageBlock),
}

impl ContentBlock {
    pub fn prompt(text: impl Into<String>) -> Self {
        ContentBlock::TextPrompt { text: text.into() }
    }

    pub fn result(text: impl Into<String>) -> Self {
        ContentBlock::TextResult { text: text.into() }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            ContentBlock::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    /// Whether this block may appear in a turn authored by `role`.
    pub fn allowed_for(&self, role: Role) -> bool {
        match self {
            ContentBlock::TextPrompt { .. }
            | ContentBlock::ToolResult(_)
            | ContentBlock::Image(_) => role == Role::User,
            ContentBlock::TextResult { .. } | ContentBlock::ToolCall(_) => {
                role == Role::Assistant
            }
        }
    }
}

/// One alternating unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl Turn {
    pub fn user(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks,
        }
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    /// Tool calls in emission order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.blocks.iter().filter_map(ContentBlock::as_tool_call)
    }

    /// Tool results in order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.blocks.iter().filter_map(ContentBlock::as_tool_result)
    }

    /// Concatenated text of every text block, newline separated.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::TextPrompt { text } | ContentBlock::TextResult { text } => {
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_at_position() {
        assert_eq!(Role::at_position(0), Role::User);
        assert_eq!(Role::at_position(1), Role::Assistant);
        assert_eq!(Role::at_position(6), Role::User);
    }

    #[test]
    fn test_content_block_tagging() {
        let block = ContentBlock::ToolCall(ToolCall::new("c1", "shell_exec", json!({"command": "ls"})));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["tool_name"], "shell_exec");
        assert_eq!(value["tool_input"]["command"], "ls");
    }

    #[test]
    fn test_image_bytes_serialize_as_base64() {
        let block = ContentBlock::Image(ImageBlock {
            data: vec![0xde, 0xad, 0xbe, 0xef],
            mime_type: "image/png".into(),
        });
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["data"], "3q2+7w==");

        let back: ContentBlock = serde_json::from_value(value).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_tool_result_constructors() {
        let call = ToolCall::new("c1", "read_file", json!({}));
        let ok = ToolResult::success(&call, "contents");
        assert!(!ok.is_error);
        assert_eq!(ok.tool_call_id, "c1");

        let err = ToolResult::error(&call, "missing");
        assert!(err.is_error);
        assert_eq!(err.tool_name, "read_file");
    }

    #[test]
    fn test_blocks_allowed_for_role() {
        assert!(ContentBlock::prompt("hi").allowed_for(Role::User));
        assert!(!ContentBlock::prompt("hi").allowed_for(Role::Assistant));
        assert!(ContentBlock::result("done").allowed_for(Role::Assistant));
        let call = ToolCall::new("c1", "x", json!({}));
        assert!(!ContentBlock::ToolCall(call.clone()).allowed_for(Role::User));
        assert!(ContentBlock::ToolResult(ToolResult::success(&call, "")).allowed_for(Role::User));
    }

    #[test]
    fn test_turn_text_skips_non_text_blocks() {
        let turn = Turn::assistant(vec![
            ContentBlock::result("first"),
            ContentBlock::ToolCall(ToolCall::new("c1", "x", json!({}))),
            ContentBlock::result("second"),
        ]);
        assert_eq!(turn.text(), "first\nsecond");
        assert_eq!(turn.tool_calls().count(), 1);
    }
}
