//! The run's API-call budget: a single logically-atomic counter,
//! decremented via compare-and-swap before each HTTP call (spec.md §5).

use std::sync::atomic::{AtomicI64, Ordering};

/// Atomic call-budget gate for one run. `daily_api_budget` calls are
/// available in total; `try_consume` is the only way to spend them.
#[derive(Debug)]
pub struct Budget {
    remaining: AtomicI64,
}

impl Budget {
    #[must_use]
    pub fn new(daily_api_budget: u64) -> Self {
        Self {
            remaining: AtomicI64::new(daily_api_budget as i64),
        }
    }

    /// Attempt to charge `n` calls against the budget. Refuses (returns
    /// `false`) if the decrement would underflow below zero; never leaves
    /// the counter negative.
    pub fn try_consume(&self, n: u64) -> bool {
        let n = n as i64;
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current >= n).then_some(current - n)
            })
            .is_ok()
    }

    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Whether the remaining budget has fallen below `floor` (the Phase 5
    /// reserve).
    #[must_use]
    pub fn below(&self, floor: u64) -> bool {
        self.remaining() < floor as i64
    }
}
