//! Budgeted sequential loop shared by every stage.
//!
//! Before each item the loop checks the item cap and then the wall-clock
//! budget. An item that has started always runs to completion. Items that
//! are never pulled from the iterator are never touched.

use super::clock::{Clock, Deadline};

/// Result of processing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    Failed,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No items left.
    Exhausted,
    /// Wall-clock budget reached.
    Budget,
    /// Per-invocation item cap reached.
    ItemLimit,
}

/// Per-invocation item cap and what it counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLimit {
    /// Every attempted item counts.
    Processed(usize),
    /// Only successes count, so items that keep failing cannot use up the
    /// cap ahead of items that were never tried.
    Succeeded(usize),
}

impl ItemLimit {
    fn is_reached(&self, outcome: &BatchOutcome) -> bool {
        match *self {
            Self::Processed(max) => outcome.processed >= max,
            Self::Succeeded(max) => outcome.succeeded >= max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stop: StopReason,
}

/// Process items one at a time until they run out, the budget is spent, or
/// the item cap is reached.
///
/// `process` returning `Err` aborts the loop and propagates the error. Use
/// `Ok(ItemOutcome::Failed)` for per-item failures that must not stop the batch.
pub fn run_until<I, T, E, F>(
    clock: &dyn Clock,
    deadline: &Deadline,
    limit: Option<ItemLimit>,
    items: I,
    mut process: F,
) -> Result<BatchOutcome, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<ItemOutcome, E>,
{
    let mut items = items.into_iter();
    let mut outcome = BatchOutcome {
        processed: 0,
        succeeded: 0,
        failed: 0,
        stop: StopReason::Exhausted,
    };

    loop {
        if limit.is_some_and(|limit| limit.is_reached(&outcome)) {
            outcome.stop = StopReason::ItemLimit;
            break;
        }
        if deadline.is_expired(clock) {
            outcome.stop = StopReason::Budget;
            tracing::info!(
                processed = outcome.processed,
                elapsed_ms = deadline.elapsed_ms(clock),
                "Time budget reached, stopping before next item"
            );
            break;
        }
        let Some(item) = items.next() else {
            outcome.stop = StopReason::Exhausted;
            break;
        };

        match process(item)? {
            ItemOutcome::Succeeded => outcome.succeeded += 1,
            ItemOutcome::Failed => outcome.failed += 1,
        }
        outcome.processed += 1;
    }

    Ok(outcome)
}
