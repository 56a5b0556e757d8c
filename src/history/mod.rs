//! Message history for the agent turn loop
//!
//! [`MessageHistory`] owns the conversation by value. Every mutating
//! operation checks the two structural invariants before touching state:
//!
//! - turns alternate user/assistant, starting with user
//! - every tool call gets exactly one result in the immediately following turn
//!
//! A rejected operation returns [`HarnessError::HistoryViolation`] and leaves
//! the history unchanged.

pub mod types;

pub use types::{ContentBlock, ImageBlock, Role, ToolCall, ToolResult, Turn};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Result text recorded for a tool call the conversation moved past.
pub const SKIPPED_TOOL_CALL: &str = "Tool call was not executed";

/// Ordered conversation log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHistory {
    turns: Vec<Turn>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from existing turns, validating them first.
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self> {
        validate_turns(&turns)?;
        Ok(Self { turns })
    }

    /// Append user text.
    ///
    /// Always legal. When the history already ends on a user turn (for
    /// example a tool result left behind by an interrupted run) the prompt is
    /// added to that turn so alternation is preserved.
    ///
    /// # Example
    /// ```
    /// use agentharness::history::MessageHistory;
    ///
    /// let mut history = MessageHistory::new();
    /// history.add_user_prompt("list files");
    /// history.add_user_prompt("and be quick");
    /// assert_eq!(history.len(), 1);
    /// assert_eq!(history.turns()[0].blocks.len(), 2);
    /// ```
    pub fn add_user_prompt(&mut self, text: impl Into<String>) {
        self.push_user_blocks(vec![ContentBlock::prompt(text)]);
    }

    /// Append user blocks (text and images) with the same merge rule as
    /// [`add_user_prompt`](Self::add_user_prompt).
    pub fn add_user_turn(&mut self, blocks: Vec<ContentBlock>) -> Result<()> {
        if blocks.is_empty() {
            return Err(HarnessError::HistoryViolation(
                "user turn must contain at least one block".into(),
            ));
        }
        if let Some(block) = blocks
            .iter()
            .find(|b| !b.allowed_for(Role::User) || b.as_tool_result().is_some())
        {
            return Err(HarnessError::HistoryViolation(format!(
                "block {:?} cannot be added as a user prompt",
                block_kind(block)
            )));
        }
        self.push_user_blocks(blocks);
        Ok(())
    }

    fn push_user_blocks(&mut self, blocks: Vec<ContentBlock>) {
        if self.ends_on_user_turn() {
            if let Some(last) = self.turns.last_mut() {
                last.blocks.extend(blocks);
            }
            return;
        }

        // unanswered calls get a skipped result so pairing still holds
        let mut turn_blocks: Vec<ContentBlock> = self
            .get_pending_tool_calls()
            .iter()
            .map(|c| ContentBlock::ToolResult(ToolResult::error(c, SKIPPED_TOOL_CALL)))
            .collect();
        turn_blocks.extend(blocks);
        self.turns.push(Turn::user(turn_blocks));
    }

    /// Append an assistant turn. Only legal directly after a user turn.
    pub fn add_assistant_turn(&mut self, blocks: Vec<ContentBlock>) -> Result<()> {
        if !self.ends_on_user_turn() {
            return Err(HarnessError::HistoryViolation(
                "assistant turn must follow a user turn".into(),
            ));
        }
        if blocks.is_empty() {
            return Err(HarnessError::HistoryViolation(
                "assistant turn must contain at least one block".into(),
            ));
        }
        if let Some(block) = blocks.iter().find(|b| !b.allowed_for(Role::Assistant)) {
            return Err(HarnessError::HistoryViolation(format!(
                "{} block not allowed in assistant turn",
                block_kind(block)
            )));
        }

        let mut seen = self.tool_call_ids();
        for call in blocks.iter().filter_map(ContentBlock::as_tool_call) {
            if !seen.insert(call.tool_call_id.clone()) {
                return Err(HarnessError::HistoryViolation(format!(
                    "tool_call_id {} is not unique",
                    call.tool_call_id
                )));
            }
        }

        self.turns.push(Turn::assistant(blocks));
        Ok(())
    }

    /// Record the result of a single tool call.
    pub fn add_tool_call_result(&mut self, result: ToolResult) -> Result<()> {
        self.add_tool_call_results(vec![result])
    }

    /// Record results for every pending tool call of the last assistant turn
    /// as one new user turn.
    pub fn add_tool_call_results(&mut self, results: Vec<ToolResult>) -> Result<()> {
        let pending = self.get_pending_tool_calls();
        if pending.is_empty() {
            return Err(HarnessError::HistoryViolation(
                "no pending tool calls to attach results to".into(),
            ));
        }

        let mut remaining: HashSet<&str> =
            pending.iter().map(|c| c.tool_call_id.as_str()).collect();
        for result in &results {
            if !remaining.remove(result.tool_call_id.as_str()) {
                return Err(HarnessError::HistoryViolation(format!(
                    "result for {} does not match a pending tool call",
                    result.tool_call_id
                )));
            }
        }
        if !remaining.is_empty() {
            let mut missing: Vec<_> = remaining.into_iter().collect();
            missing.sort_unstable();
            return Err(HarnessError::HistoryViolation(format!(
                "missing results for tool calls: {}",
                missing.join(", ")
            )));
        }

        self.turns.push(Turn::user(
            results.into_iter().map(ContentBlock::ToolResult).collect(),
        ));
        Ok(())
    }

    /// Tool calls in the last turn that have no result yet, in emission order.
    ///
    /// Only the last turn is inspected: once a following turn exists the
    /// calls have been answered (enforced on insertion).
    pub fn get_pending_tool_calls(&self) -> Vec<ToolCall> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::Assistant => turn.tool_calls().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Replace the whole turn list. Used by context truncation.
    pub fn set_message_list(&mut self, turns: Vec<Turn>) -> Result<()> {
        validate_turns(&turns)?;
        self.turns = turns;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Owned copy of the turns, as handed to the LLM client.
    pub fn get_messages_for_llm(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether the next appended turn will be a user turn.
    pub fn is_next_turn_user(&self) -> bool {
        self.turns.len() % 2 == 0
    }

    /// Whether the last turn is a user turn, i.e. a generation call may
    /// follow. This is the precondition for resuming a run.
    pub fn ends_on_user_turn(&self) -> bool {
        matches!(self.turns.last(), Some(t) if t.role == Role::User)
    }

    /// Text of the final assistant turn, if the history ends on one.
    pub fn last_assistant_text(&self) -> Option<String> {
        let turn = self.turns.last().filter(|t| t.role == Role::Assistant)?;
        let text = turn.text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn tool_call_ids(&self) -> HashSet<String> {
        self.turns
            .iter()
            .flat_map(Turn::tool_calls)
            .map(|c| c.tool_call_id.clone())
            .collect()
    }
}

fn block_kind(block: &ContentBlock) -> &'static str {
    match block {
        ContentBlock::TextPrompt { .. } => "text_prompt",
        ContentBlock::TextResult { .. } => "text_result",
        ContentBlock::ToolCall(_) => "tool_call",
        ContentBlock::ToolResult(_) => "tool_result",
        ContentBlock::Image(_) => "image",
    }
}

/// Check alternation, block placement, tool-call id uniqueness and
/// call/result pairing for a turn list.
///
/// Tool calls in a trailing assistant turn are allowed to be unanswered.
pub fn validate_turns(turns: &[Turn]) -> Result<()> {
    let mut call_ids = HashSet::new();

    for (i, turn) in turns.iter().enumerate() {
        let expected = Role::at_position(i);
        if turn.role != expected {
            return Err(HarnessError::HistoryViolation(format!(
                "turn {} has role {}, expected {}",
                i, turn.role, expected
            )));
        }
        if turn.blocks.is_empty() {
            return Err(HarnessError::HistoryViolation(format!("turn {} is empty", i)));
        }
        if let Some(block) = turn.blocks.iter().find(|b| !b.allowed_for(turn.role)) {
            return Err(HarnessError::HistoryViolation(format!(
                "turn {} ({}) contains a {} block",
                i,
                turn.role,
                block_kind(block)
            )));
        }

        match turn.role {
            Role::Assistant => {
                for call in turn.tool_calls() {
                    if !call_ids.insert(call.tool_call_id.as_str()) {
                        return Err(HarnessError::HistoryViolation(format!(
                            "tool_call_id {} is not unique",
                            call.tool_call_id
                        )));
                    }
                }
            }
            Role::User => {
                let calls: Vec<&str> = match i.checked_sub(1) {
                    Some(prev) => turns[prev]
                        .tool_calls()
                        .map(|c| c.tool_call_id.as_str())
                        .collect(),
                    None => Vec::new(),
                };
                let mut answered = HashSet::new();
                for result in turn.tool_results() {
                    let id = result.tool_call_id.as_str();
                    if !calls.contains(&id) {
                        return Err(HarnessError::HistoryViolation(format!(
                            "turn {} has a result for {} without a matching call",
                            i, id
                        )));
                    }
                    if !answered.insert(id) {
                        return Err(HarnessError::HistoryViolation(format!(
                            "tool call {} has more than one result",
                            id
                        )));
                    }
                }
                if let Some(missing) = calls.iter().find(|id| !answered.contains(*id)) {
                    return Err(HarnessError::HistoryViolation(format!(
                        "tool call {} has no result in turn {}",
                        missing, i
                    )));
                }
            }
        }
    }

    Ok(())
}
