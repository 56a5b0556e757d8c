//! Token estimation for context budgeting.

use crate::history::{ContentBlock, Turn};

/// Cheap, deterministic token estimate.
///
/// Roughly 4 bytes per token plus fixed overheads for turn framing and tool
/// blocks. Monotonic in content length, which is all truncation needs.
pub struct TokenEstimator;

impl TokenEstimator {
    const CHARS_PER_TOKEN: usize = 4;

    /// Role and framing per turn.
    const MESSAGE_OVERHEAD: usize = 4;

    /// Id, name and framing of a tool call.
    const TOOL_CALL_OVERHEAD: usize = 20;

    /// Id and framing of a tool result.
    const TOOL_RESULT_OVERHEAD: usize = 10;

    /// Flat charge per image, independent of its size.
    const IMAGE_TOKENS: usize = 1_600;

    #[must_use]
    pub const fn estimate_text(text: &str) -> usize {
        text.len().div_ceil(Self::CHARS_PER_TOKEN)
    }

    #[must_use]
    pub fn estimate_block(block: &ContentBlock) -> usize {
        match block {
            ContentBlock::TextPrompt { text } | ContentBlock::TextResult { text } => {
                Self::estimate_text(text)
            }
            ContentBlock::ToolCall(call) => {
                let input = serde_json::to_string(&call.tool_input).unwrap_or_default();
                Self::estimate_text(&call.tool_name)
                    + Self::estimate_text(&input)
                    + Self::TOOL_CALL_OVERHEAD
            }
            ContentBlock::ToolResult(result) => {
                Self::estimate_text(&result.output) + Self::TOOL_RESULT_OVERHEAD
            }
            ContentBlock::Image(_) => Self::IMAGE_TOKENS,
        }
    }

    #[must_use]
    pub fn estimate_turn(turn: &Turn) -> usize {
        turn.blocks.iter().map(Self::estimate_block).sum::<usize>() + Self::MESSAGE_OVERHEAD
    }

    #[must_use]
    pub fn estimate_turns(turns: &[Turn]) -> usize {
        turns.iter().map(Self::estimate_turn).sum()
    }
}
