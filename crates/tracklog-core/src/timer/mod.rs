//! Wall-clock timer engines.
//!
//! Both engines share one design: no internal threads, elapsed time computed
//! from timestamp deltas on each `tick()`, snapshot persisted through a
//! [`SnapshotStore`](crate::store::SnapshotStore) on every state change, and
//! a gap-folding recovery step at construction so a timer that was running
//! when the process died is still correct after reload.

mod clock;
mod interval;
mod stopwatch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use interval::{IntervalConfig, IntervalDisplay, IntervalSnapshot, IntervalTimer};
pub use stopwatch::{Stopwatch, StopwatchDisplay, StopwatchSnapshot};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::events::WorkSegment;

/// Top-level engine status.
///
/// The interval engine layers an `is_break` mode flag on top of this; a
/// break is not a separate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

pub(crate) const MS_PER_MIN: u64 = 60_000;

/// Work segments shorter than this are silently discarded, never logged.
pub const MIN_LOGGABLE_MS: u64 = MS_PER_MIN;

/// Receives completed work segments (the session-logging side effect).
///
/// Called at most once per work segment that reaches [`MIN_LOGGABLE_MS`],
/// and never for break phases. A failing sink is logged at warn level and
/// does not block the engine's own transition.
pub trait SegmentSink {
    fn log_segment(&mut self, segment: &WorkSegment) -> Result<(), CoreError>;
}
