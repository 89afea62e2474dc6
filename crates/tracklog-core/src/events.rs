use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finished stretch of work eligible for session logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSegment {
    /// Whole minutes of work, always >= 1.
    pub duration_min: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Every engine state change produces an Event.
/// Commands return `None` when the requested transition is invalid for the
/// current state; callers are expected to gate the operations they offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Started {
        at: DateTime<Utc>,
    },
    Paused {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    Resumed {
        at: DateTime<Utc>,
    },
    /// Manual stop. `segment` is present only when the work phase crossed
    /// the one-minute logging threshold.
    Stopped {
        segment: Option<WorkSegment>,
        at: DateTime<Utc>,
    },
    /// A work phase reached its target and rolled into a break.
    WorkCompleted {
        segment: WorkSegment,
        long_break: bool,
        at: DateTime<Utc>,
    },
    /// A break phase reached its target; the engine is idle again.
    BreakCompleted {
        at: DateTime<Utc>,
    },
    BreakSkipped {
        at: DateTime<Utc>,
    },
    Reset {
        at: DateTime<Utc>,
    },
}
