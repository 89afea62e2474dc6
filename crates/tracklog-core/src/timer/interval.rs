//! Interval timer engine: countdown cycling between work and break phases.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running(work) <-> Paused
//!           |
//!           v  (work target crossed: log segment, bump cycle count)
//!         Running(break) -> Idle    (break target crossed)
//! ```
//!
//! The phase edge is detected inside `tick()`: the tick that carries the
//! elapsed candidate across the target fires the transition synchronously
//! and resets the accumulator, so the same crossing can never fire twice.
//! Which post-crossing transition applies is decided by the `is_break` mode
//! flag alone.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::{SegmentSink, TimerStatus, MIN_LOGGABLE_MS, MS_PER_MIN};
use crate::events::{TimerEvent, WorkSegment};
use crate::store::{self, SnapshotStore};

/// Interval timer configuration.
///
/// Changing values mid-run never alters a phase already in progress; they
/// take effect on the next `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    pub work_minutes: u64,
    pub break_minutes: u64,
    pub long_break_minutes: u64,
    /// Every Nth completed work phase is followed by the long break.
    pub cycles_before_long_break: u32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            cycles_before_long_break: 4,
        }
    }
}

impl IntervalConfig {
    fn work_ms(&self) -> u64 {
        self.work_minutes.saturating_mul(MS_PER_MIN)
    }

    fn break_ms(&self) -> u64 {
        self.break_minutes.saturating_mul(MS_PER_MIN)
    }

    fn long_break_ms(&self) -> u64 {
        self.long_break_minutes.saturating_mul(MS_PER_MIN)
    }
}

/// Persisted interval timer state.
///
/// `is_break` and the phase durations are part of the snapshot and are
/// restored verbatim on reload, never recomputed from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSnapshot {
    pub status: TimerStatus,
    pub is_break: bool,
    /// Wall-clock anchor (epoch ms) of the last elapsed-time sync.
    pub reference_epoch_ms: Option<u64>,
    pub accumulated_ms: u64,
    pub work_duration_ms: u64,
    /// Target for the current/next break; swapped between the short and
    /// long values at the moment a break begins.
    pub break_duration_ms: u64,
    /// Work phases finished since the last full reset.
    pub cycles_completed: u32,
    #[serde(default)]
    pub work_started_at: Option<DateTime<Utc>>,
}

impl IntervalSnapshot {
    fn idle(config: &IntervalConfig) -> Self {
        Self {
            status: TimerStatus::Idle,
            is_break: false,
            reference_epoch_ms: None,
            accumulated_ms: 0,
            work_duration_ms: config.work_ms(),
            break_duration_ms: config.break_ms(),
            cycles_completed: 0,
            work_started_at: None,
        }
    }
}

/// Formatted display fields derived from remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalDisplay {
    pub minutes: u64,
    pub seconds: u64,
    pub remaining_ms: u64,
    pub elapsed_ms: u64,
    pub progress_pct: f64,
}

/// Work/break cycling countdown engine.
///
/// Same persistence and drift-correction contract as
/// [`Stopwatch`](super::Stopwatch), plus cycle bookkeeping and the
/// phase-completion edge in `tick()`.
pub struct IntervalTimer<S> {
    key: String,
    store: S,
    clock: Box<dyn Clock>,
    config: IntervalConfig,
    snapshot: IntervalSnapshot,
    sink: Option<Box<dyn SegmentSink>>,
    break_observer: Option<Box<dyn FnMut()>>,
}

impl<S: SnapshotStore> IntervalTimer<S> {
    /// Create an engine on the system clock, recovering any persisted state.
    pub fn new(store: S, key: impl Into<String>, config: IntervalConfig) -> Self {
        Self::with_clock(store, key, config, Box::new(SystemClock))
    }

    /// Create an engine on an explicit clock.
    pub fn with_clock(
        store: S,
        key: impl Into<String>,
        config: IntervalConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        let key = key.into();
        let snapshot =
            store::load_snapshot(&store, &key).unwrap_or_else(|| IntervalSnapshot::idle(&config));
        let mut timer = Self {
            key,
            store,
            clock,
            config,
            snapshot,
            sink: None,
            break_observer: None,
        };
        timer.recover();
        timer
    }

    /// Attach the session-logging sink invoked on qualifying work segments.
    pub fn with_sink(mut self, sink: impl SegmentSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Attach a fire-and-forget observer called when a break runs to
    /// completion. Skipped breaks do not notify.
    pub fn on_break_complete(mut self, observer: impl FnMut() + 'static) -> Self {
        self.break_observer = Some(Box::new(observer));
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.snapshot.status
    }

    pub fn is_break(&self) -> bool {
        self.snapshot.is_break
    }

    pub fn cycles_completed(&self) -> u32 {
        self.snapshot.cycles_completed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.snapshot.accumulated_ms
    }

    pub fn config(&self) -> IntervalConfig {
        self.config
    }

    pub fn snapshot(&self) -> &IntervalSnapshot {
        &self.snapshot
    }

    /// Target duration of the active phase.
    pub fn target_ms(&self) -> u64 {
        if self.snapshot.is_break {
            self.snapshot.break_duration_ms
        } else {
            self.snapshot.work_duration_ms
        }
    }

    pub fn display(&self) -> IntervalDisplay {
        let target = self.target_ms();
        let remaining = target.saturating_sub(self.snapshot.accumulated_ms);
        IntervalDisplay {
            minutes: remaining / MS_PER_MIN,
            seconds: (remaining / 1_000) % 60,
            remaining_ms: remaining,
            elapsed_ms: self.snapshot.accumulated_ms,
            progress_pct: if target == 0 {
                0.0
            } else {
                self.snapshot.accumulated_ms as f64 / target as f64 * 100.0
            },
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a work phase with the current configuration. No-op unless idle.
    pub fn start(&mut self) -> Option<TimerEvent> {
        if self.snapshot.status != TimerStatus::Idle {
            return None;
        }
        let now = self.clock.now_ms();
        self.snapshot.work_duration_ms = self.config.work_ms();
        self.snapshot.break_duration_ms = self.config.break_ms();
        self.snapshot.is_break = false;
        self.snapshot.accumulated_ms = 0;
        self.snapshot.reference_epoch_ms = Some(now);
        self.snapshot.work_started_at = Some(self.clock.now_utc());
        self.snapshot.status = TimerStatus::Running;
        self.persist();
        Some(TimerEvent::Started {
            at: self.clock.now_utc(),
        })
    }

    /// Freeze the active phase, whichever it is. No-op unless running.
    pub fn pause(&mut self) -> Option<TimerEvent> {
        if self.snapshot.status != TimerStatus::Running {
            return None;
        }
        self.flush_elapsed();
        self.snapshot.status = TimerStatus::Paused;
        self.persist();
        Some(TimerEvent::Paused {
            elapsed_ms: self.snapshot.accumulated_ms,
            at: self.clock.now_utc(),
        })
    }

    /// Continue the frozen phase with a fresh reference instant.
    pub fn resume(&mut self) -> Option<TimerEvent> {
        if self.snapshot.status != TimerStatus::Paused {
            return None;
        }
        self.snapshot.status = TimerStatus::Running;
        self.snapshot.reference_epoch_ms = Some(self.clock.now_ms());
        self.persist();
        Some(TimerEvent::Resumed {
            at: self.clock.now_utc(),
        })
    }

    /// End the run and return to idle, resetting the cycle count and
    /// clearing the persisted snapshot. A work phase of at least one minute
    /// is logged; break phases never are. No-op while idle.
    pub fn stop(&mut self) -> Option<TimerEvent> {
        match self.snapshot.status {
            TimerStatus::Running => self.flush_elapsed(),
            TimerStatus::Paused => {}
            TimerStatus::Idle => return None,
        }
        let ended_at = self.clock.now_utc();
        let elapsed = self.snapshot.accumulated_ms;
        let segment = if !self.snapshot.is_break && elapsed >= MIN_LOGGABLE_MS {
            let started_at = self
                .snapshot
                .work_started_at
                .unwrap_or_else(|| ended_at - Duration::milliseconds(elapsed as i64));
            let segment = WorkSegment {
                duration_min: elapsed / MS_PER_MIN,
                started_at,
                ended_at,
            };
            self.emit_segment(&segment);
            Some(segment)
        } else {
            None
        };
        self.snapshot = IntervalSnapshot::idle(&self.config);
        self.clear_store();
        Some(TimerEvent::Stopped {
            segment,
            at: ended_at,
        })
    }

    /// End the current break early, back to idle and ready for a fresh
    /// `start()`. Invokes no completion callback and leaves the cycle count
    /// untouched. No-op unless running a break.
    pub fn skip_break(&mut self) -> Option<TimerEvent> {
        if self.snapshot.status != TimerStatus::Running || !self.snapshot.is_break {
            return None;
        }
        self.snapshot.status = TimerStatus::Idle;
        self.snapshot.is_break = false;
        self.snapshot.accumulated_ms = 0;
        self.snapshot.reference_epoch_ms = None;
        self.persist();
        Some(TimerEvent::BreakSkipped {
            at: self.clock.now_utc(),
        })
    }

    /// Reset everything to idle defaults and clear the persisted snapshot.
    pub fn reset(&mut self) -> Option<TimerEvent> {
        self.snapshot = IntervalSnapshot::idle(&self.config);
        self.clear_store();
        Some(TimerEvent::Reset {
            at: self.clock.now_utc(),
        })
    }

    /// Replace the configuration. Applies on the next `start()`.
    pub fn set_config(&mut self, config: IntervalConfig) {
        self.config = config;
    }

    /// Drift-corrected update plus phase-edge detection. Call periodically
    /// while running; a no-op in any other state.
    ///
    /// Returns `Some` exactly once per crossing: a work phase logs its
    /// segment and rolls straight into the break with no idle gap, a break
    /// notifies its observer and returns the engine to idle.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.snapshot.status != TimerStatus::Running {
            return None;
        }
        let now = self.clock.now_ms();
        let reference = self.snapshot.reference_epoch_ms.unwrap_or(now);
        let candidate = self
            .snapshot
            .accumulated_ms
            .saturating_add(now.saturating_sub(reference));
        let target = self.target_ms();

        if candidate < target {
            self.snapshot.accumulated_ms = candidate;
            self.snapshot.reference_epoch_ms = Some(now);
            self.persist();
            return None;
        }

        if self.snapshot.is_break {
            self.notify_break_complete();
            self.snapshot.status = TimerStatus::Idle;
            self.snapshot.is_break = false;
            self.snapshot.accumulated_ms = 0;
            self.snapshot.reference_epoch_ms = None;
            self.persist();
            return Some(TimerEvent::BreakCompleted {
                at: self.clock.now_utc(),
            });
        }

        // Work target crossed: log the segment, count the cycle, pick the
        // break length, and begin the break on the same tick.
        let ended_at = self.clock.now_utc();
        let started_at = self
            .snapshot
            .work_started_at
            .unwrap_or_else(|| ended_at - Duration::milliseconds(candidate as i64));
        let segment = WorkSegment {
            duration_min: candidate / MS_PER_MIN,
            started_at,
            ended_at,
        };
        self.emit_segment(&segment);

        self.snapshot.cycles_completed += 1;
        let long_break = self.config.cycles_before_long_break > 0
            && self.snapshot.cycles_completed % self.config.cycles_before_long_break == 0;
        self.snapshot.break_duration_ms = if long_break {
            self.config.long_break_ms()
        } else {
            self.config.break_ms()
        };
        self.snapshot.is_break = true;
        self.snapshot.accumulated_ms = 0;
        self.snapshot.reference_epoch_ms = Some(now);
        self.persist();
        Some(TimerEvent::WorkCompleted {
            segment,
            long_break,
            at: ended_at,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_elapsed(&mut self) {
        if let Some(reference) = self.snapshot.reference_epoch_ms {
            let now = self.clock.now_ms();
            self.snapshot.accumulated_ms = self
                .snapshot
                .accumulated_ms
                .saturating_add(now.saturating_sub(reference));
            self.snapshot.reference_epoch_ms = Some(now);
        }
    }

    /// Same gap-folding as the stopwatch; `is_break` and both durations come
    /// from the snapshot verbatim. The phase edge, if the gap crossed one,
    /// fires on the first `tick()` after recovery.
    fn recover(&mut self) {
        if self.snapshot.status != TimerStatus::Running {
            return;
        }
        self.flush_elapsed();
        self.snapshot.reference_epoch_ms = Some(self.clock.now_ms());
        self.persist();
    }

    fn emit_segment(&mut self, segment: &WorkSegment) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.log_segment(segment) {
                log::warn!("segment sink failed for '{}': {e}", self.key);
            }
        }
    }

    fn notify_break_complete(&mut self) {
        if let Some(observer) = self.break_observer.as_mut() {
            observer();
        }
    }

    fn persist(&self) {
        match serde_json::to_string(&self.snapshot) {
            Ok(raw) => {
                if let Err(e) = self.store.save(&self.key, &raw) {
                    log::warn!("failed to persist interval timer '{}': {e}", self.key);
                }
            }
            Err(e) => log::warn!("failed to serialize interval timer '{}': {e}", self.key),
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear(&self.key) {
            log::warn!("failed to clear interval timer '{}': {e}", self.key);
        }
    }
}
