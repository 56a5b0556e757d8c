//! Context window management
//!
//! A [`ContextManager`] decides which part of the history is sent to the
//! model. It is pure: it takes turns and returns turns, never touching the
//! [`MessageHistory`](crate::history::MessageHistory) itself.
//!
//! Both policies pin the first user turn (the task) and remove the oldest
//! (assistant, user) pairs that follow it. Because a tool call and its
//! result always sit in such a pair, a cut never separates them, and the
//! remaining turns keep alternating.
//!
//! ```text
//!   [u0] [a1 u2] [a3 u4] [a5 u6]      over budget
//!   [u0*]        [a3 u4] [a5 u6]      drop_oldest  (u0 annotated)
//!   [u0] [S  C]  [a3 u4] [a5 u6]      summarize    (S = summary, C = continue)
//! ```

pub mod compaction;
pub mod estimator;

pub use estimator::TokenEstimator;

use tracing::debug;

use crate::config::{ContextConfig, ContextStrategy};
use crate::history::{ContentBlock, Role, Turn};

use compaction::{build_summary_digest, SUMMARY_LABEL};

/// Prefix of the note added to the pinned turn by [`DropOldestContextManager`].
pub const OMISSION_MARKER: &str = "[Context truncated:";

/// Prompt that follows a synthetic summary turn.
pub const SUMMARY_CONTINUATION: &str =
    "Continue working on the task from where the summary above leaves off.";

/// Output of [`ContextManager::apply_truncation_if_needed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Truncation {
    pub turns: Vec<Turn>,
    /// Original turns removed (not counting synthetic ones added)
    pub dropped_turns: usize,
    /// The result still exceeds the budget and nothing more can be dropped.
    /// The caller has to shrink content itself.
    pub oversized: bool,
}

impl Truncation {
    fn unchanged(turns: Vec<Turn>, oversized: bool) -> Self {
        Self {
            turns,
            dropped_turns: 0,
            oversized,
        }
    }

    pub fn changed(&self) -> bool {
        self.dropped_turns > 0
    }
}

/// Fits a conversation into the model's context budget.
pub trait ContextManager: Send + Sync {
    /// Token budget the output of truncation must fit.
    fn budget(&self) -> usize;

    fn count_tokens(&self, turns: &[Turn]) -> usize {
        TokenEstimator::estimate_turns(turns)
    }

    /// Returns `turns` unchanged when within budget, otherwise a shorter,
    /// still well-formed conversation.
    fn apply_truncation_if_needed(&self, turns: Vec<Turn>) -> Truncation;
}

/// Build the manager selected by config.
pub fn from_config(config: &ContextConfig) -> Box<dyn ContextManager> {
    let budget = config.budget();
    match config.strategy {
        ContextStrategy::DropOldest => Box::new(DropOldestContextManager::new(budget)),
        ContextStrategy::Summarize => Box::new(SummarizingContextManager::new(budget)),
    }
}

/// Largest number of (assistant, user) pairs that can go while keeping the
/// pinned first turn and the most recent exchange.
fn max_droppable_pairs(turns: &[Turn]) -> usize {
    if turns.len() < 3 || turns[0].role != Role::User {
        return 0;
    }
    (turns.len() - 2) / 2
}

/// Try dropping 1..=max pairs, returning the first candidate that fits.
fn fit_by_dropping<F>(manager: &dyn ContextManager, turns: Vec<Turn>, build: F) -> Truncation
where
    F: Fn(&[Turn], usize) -> Vec<Turn>,
{
    let budget = manager.budget();
    let estimated = manager.count_tokens(&turns);
    if estimated <= budget {
        return Truncation::unchanged(turns, false);
    }

    let max_pairs = max_droppable_pairs(&turns);
    if max_pairs == 0 {
        return Truncation::unchanged(turns, true);
    }

    let mut candidate = Vec::new();
    let mut size = estimated;
    for pairs in 1..=max_pairs {
        candidate = build(&turns, pairs);
        size = manager.count_tokens(&candidate);
        if size <= budget {
            debug!(
                before = estimated,
                after = size,
                budget,
                dropped_turns = pairs * 2,
                "Truncated context"
            );
            return Truncation {
                turns: candidate,
                dropped_turns: pairs * 2,
                oversized: false,
            };
        }
    }

    // synthetic turns can outweigh the small pairs they replace
    if size >= estimated {
        debug!(before = estimated, after = size, budget, "Dropping turns does not shrink context");
        return Truncation::unchanged(turns, true);
    }

    Truncation {
        turns: candidate,
        dropped_turns: max_pairs * 2,
        oversized: true,
    }
}

// ============================================================================
// Drop oldest
// ============================================================================

/// Drops the oldest exchanges and notes the omission on the task turn.
#[derive(Debug, Clone)]
pub struct DropOldestContextManager {
    budget: usize,
}

impl DropOldestContextManager {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// Copy of the pinned turn with a single omission note covering
    /// `newly_dropped` plus anything an earlier note already recorded.
    fn annotate(pinned: &Turn, newly_dropped: usize) -> Turn {
        let mut total = newly_dropped;
        let mut blocks = Vec::with_capacity(pinned.blocks.len() + 1);
        for block in &pinned.blocks {
            match block {
                ContentBlock::TextPrompt { text } if text.starts_with(OMISSION_MARKER) => {
                    total += parse_omitted_count(text);
                }
                other => blocks.push(other.clone()),
            }
        }
        blocks.push(ContentBlock::prompt(format!(
            "{} {} earlier turns omitted]",
            OMISSION_MARKER, total
        )));
        Turn::user(blocks)
    }
}

fn parse_omitted_count(marker: &str) -> usize {
    marker
        .trim_start_matches(OMISSION_MARKER)
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

impl ContextManager for DropOldestContextManager {
    fn budget(&self) -> usize {
        self.budget
    }

    fn apply_truncation_if_needed(&self, turns: Vec<Turn>) -> Truncation {
        fit_by_dropping(self, turns, |turns, pairs| {
            let mut out = Vec::with_capacity(turns.len() - pairs * 2);
            out.push(Self::annotate(&turns[0], pairs * 2));
            out.extend_from_slice(&turns[1 + pairs * 2..]);
            out
        })
    }
}

// ============================================================================
// Summarize
// ============================================================================

/// Folds the oldest exchanges into a labeled summary pair placed right after
/// the task turn.
#[derive(Debug, Clone)]
pub struct SummarizingContextManager {
    budget: usize,
}

impl SummarizingContextManager {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn summary_turns(dropped: &[Turn]) -> [Turn; 2] {
        let digest = build_summary_digest(dropped);
        [
            Turn::assistant(vec![ContentBlock::result(format!(
                "{}\n{}",
                SUMMARY_LABEL, digest
            ))]),
            Turn::user(vec![ContentBlock::prompt(SUMMARY_CONTINUATION)]),
        ]
    }
}

impl ContextManager for SummarizingContextManager {
    fn budget(&self) -> usize {
        self.budget
    }

    fn apply_truncation_if_needed(&self, turns: Vec<Turn>) -> Truncation {
        let truncation = fit_by_dropping(self, turns, |turns, pairs| {
            let cut = 1 + pairs * 2;
            let mut out = Vec::with_capacity(turns.len() - cut + 3);
            out.push(turns[0].clone());
            out.extend(Self::summary_turns(&turns[1..cut]));
            out.extend_from_slice(&turns[cut..]);
            out
        });
        if truncation.changed() {
            debug!(dropped_turns = truncation.dropped_turns, "Summarized context");
        }
        truncation
    }
}
