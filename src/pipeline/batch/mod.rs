//! Shared batch runtime: clock and deadline, the budgeted runner, and the
//! per-stage advisory lock.

pub mod clock;
pub mod lock;
pub mod runner;

pub use clock::{Clock, Deadline, ManualClock, SystemClock};
pub use lock::{LockError, LockInfo, StageLock};
pub use runner::{run_until, BatchOutcome, ItemLimit, ItemOutcome, StopReason};
