//! Per-run state: cancellation flag and turn budget.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared, cloneable cancellation flag.
///
/// Cancellation is cooperative: the turn loop checks the flag before each
/// generation and before each tool dispatch. Long-running tools await
/// [`cancelled`](Self::cancelled), which wakes as soon as the flag is set.
#[derive(Debug, Clone)]
pub struct CancelFlag(Arc<watch::Sender<bool>>);

impl Default for CancelFlag {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    pub(crate) fn reset(&self) {
        self.0.send_replace(false);
    }

    /// Resolves once the flag is set.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // the sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// State scoped to a single `run` call.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub cancel: CancelFlag,
    remaining_turns: u32,
    turns_taken: u32,
}

impl RunContext {
    pub fn new(cancel: CancelFlag, max_turns: u32) -> Self {
        Self {
            cancel,
            remaining_turns: max_turns,
            turns_taken: 0,
        }
    }

    /// Consume one turn of budget. Returns `false` once the budget is spent.
    pub fn take_turn(&mut self) -> bool {
        if self.remaining_turns == 0 {
            return false;
        }
        self.remaining_turns -= 1;
        self.turns_taken += 1;
        true
    }

    pub fn remaining_turns(&self) -> u32 {
        self.remaining_turns
    }

    /// 1-based index of the current turn.
    pub fn turn(&self) -> u32 {
        self.turns_taken
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
