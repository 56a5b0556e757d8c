//! Content-level compaction helpers.
//!
//! Turn-level dropping lives in the context managers; these helpers shrink
//! content inside turns and render dropped turns into a summary digest.

use crate::history::{ContentBlock, Role, Turn};
use crate::utils::string::preview;

use super::SUMMARY_CONTINUATION;

/// Label that opens every synthetic summary turn.
pub const SUMMARY_LABEL: &str = "[Conversation Summary]";

/// Upper bound on the rendered digest, in characters.
const MAX_DIGEST_CHARS: usize = 4_000;

/// Characters kept from each text or tool output in the digest.
const DIGEST_ITEM_CHARS: usize = 200;

/// Truncate every tool-result output longer than `max_bytes`.
///
/// Cuts on a char boundary and appends a note with the original size.
///
/// # Returns
/// The rewritten turns and how many results were shrunk.
///
/// # Example
/// ```
/// use agentharness::context::compaction::shrink_tool_results;
/// use agentharness::history::{ContentBlock, ToolCall, ToolResult, Turn};
/// use serde_json::json;
///
/// let call = ToolCall::new("c1", "read_file", json!({}));
/// let turns = vec![Turn::user(vec![ContentBlock::ToolResult(
///     ToolResult::success(&call, "x".repeat(100)),
/// )])];
/// let (turns, shrunk) = shrink_tool_results(turns, 10);
/// assert_eq!(shrunk, 1);
/// assert!(turns[0].tool_results().next().unwrap().output.starts_with("xxxxxxxxxx\n"));
/// ```
pub fn shrink_tool_results(turns: Vec<Turn>, max_bytes: usize) -> (Vec<Turn>, usize) {
    let mut shrunk = 0;
    let turns = turns
        .into_iter()
        .map(|mut turn| {
            for block in turn.blocks.iter_mut() {
                if let ContentBlock::ToolResult(result) = block {
                    if result.output.len() > max_bytes {
                        let original_len = result.output.len();
                        let mut cut = max_bytes;
                        while !result.output.is_char_boundary(cut) {
                            cut -= 1;
                        }
                        result.output.truncate(cut);
                        result.output.push_str(&format!(
                            "\n...[truncated from {} to {} bytes]",
                            original_len, cut
                        ));
                        shrunk += 1;
                    }
                }
            }
            turn
        })
        .collect();
    (turns, shrunk)
}

/// Render dropped turns into a compact, extractive digest.
///
/// An earlier summary pair found among `dropped` is carried over verbatim
/// (its continuation prompt is skipped) so repeated summarization folds into
/// one running summary.
pub fn build_summary_digest(dropped: &[Turn]) -> String {
    let mut lines = Vec::new();

    for turn in dropped {
        for block in &turn.blocks {
            let line = match block {
                ContentBlock::TextResult { text } if text.starts_with(SUMMARY_LABEL) => text
                    .trim_start_matches(SUMMARY_LABEL)
                    .trim()
                    .to_string(),
                ContentBlock::TextPrompt { text } if text == SUMMARY_CONTINUATION => continue,
                ContentBlock::TextPrompt { text } => {
                    format!("user: {}", preview(text, DIGEST_ITEM_CHARS))
                }
                ContentBlock::TextResult { text } => {
                    format!("assistant: {}", preview(text, DIGEST_ITEM_CHARS))
                }
                ContentBlock::ToolCall(call) => format!(
                    "assistant called {}({})",
                    call.tool_name,
                    preview(&call.tool_input.to_string(), DIGEST_ITEM_CHARS / 2)
                ),
                ContentBlock::ToolResult(result) => format!(
                    "{} {}: {}",
                    result.tool_name,
                    if result.is_error { "failed" } else { "returned" },
                    preview(&result.output, DIGEST_ITEM_CHARS)
                ),
                ContentBlock::Image(image) => {
                    let who = if turn.role == Role::User { "user" } else { "assistant" };
                    format!("{} sent an image ({})", who, image.mime_type)
                }
            };
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }

    preview(&lines.join("\n"), MAX_DIGEST_CHARS)
}
