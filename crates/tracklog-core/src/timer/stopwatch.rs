//! Stopwatch engine: open-ended elapsed-time accumulator.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Idle
//! ```
//!
//! Stop always returns to Idle and clears the persisted snapshot. Sessions
//! of at least one minute are reported to the segment sink on stop; shorter
//! ones are discarded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::{SegmentSink, TimerStatus, MIN_LOGGABLE_MS, MS_PER_MIN};
use crate::events::{TimerEvent, WorkSegment};
use crate::store::{self, SnapshotStore};

/// Cosmetic cap for the progress percentage, in minutes.
const PROGRESS_CAP_MIN: u64 = 240;

/// Persisted stopwatch state.
///
/// Mutated only by the engine's own transitions; the store holds an opaque
/// serialized copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopwatchSnapshot {
    pub status: TimerStatus,
    /// Wall-clock anchor (epoch ms) of the last elapsed-time sync.
    /// `None` while idle; kept stale across a pause for resume semantics.
    pub reference_epoch_ms: Option<u64>,
    /// Milliseconds already banked before `reference_epoch_ms`.
    pub accumulated_ms: u64,
    /// When the current session began, reported to the sink on stop.
    #[serde(default)]
    pub work_started_at: Option<DateTime<Utc>>,
}

/// Formatted display fields derived from elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StopwatchDisplay {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub elapsed_ms: u64,
    pub progress_pct: f64,
}

/// Open-ended elapsed-time engine.
///
/// Loads its snapshot from the store at construction, folding in the gap if
/// it was persisted while running, and writes the snapshot back on every
/// state change.
pub struct Stopwatch<S> {
    key: String,
    store: S,
    clock: Box<dyn Clock>,
    snapshot: StopwatchSnapshot,
    sink: Option<Box<dyn SegmentSink>>,
}

impl<S: SnapshotStore> Stopwatch<S> {
    /// Create an engine on the system clock, recovering any persisted state.
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self::with_clock(store, key, Box::new(SystemClock))
    }

    /// Create an engine on an explicit clock.
    pub fn with_clock(store: S, key: impl Into<String>, clock: Box<dyn Clock>) -> Self {
        let key = key.into();
        let snapshot = store::load_snapshot(&store, &key).unwrap_or_default();
        let mut sw = Self {
            key,
            store,
            clock,
            snapshot,
            sink: None,
        };
        sw.recover();
        sw
    }

    /// Attach the session-logging sink invoked on qualifying stops.
    pub fn with_sink(mut self, sink: impl SegmentSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.snapshot.status
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.snapshot.accumulated_ms
    }

    pub fn work_started_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.work_started_at
    }

    pub fn snapshot(&self) -> &StopwatchSnapshot {
        &self.snapshot
    }

    pub fn display(&self) -> StopwatchDisplay {
        let ms = self.snapshot.accumulated_ms;
        let elapsed_min = ms / MS_PER_MIN;
        StopwatchDisplay {
            hours: ms / 3_600_000,
            minutes: (ms / MS_PER_MIN) % 60,
            seconds: (ms / 1_000) % 60,
            elapsed_ms: ms,
            progress_pct: (elapsed_min as f64 / PROGRESS_CAP_MIN as f64 * 100.0).min(100.0),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new session. No-op unless idle.
    pub fn start(&mut self) -> Option<TimerEvent> {
        if self.snapshot.status != TimerStatus::Idle {
            return None;
        }
        let now = self.clock.now_ms();
        self.snapshot.status = TimerStatus::Running;
        self.snapshot.reference_epoch_ms = Some(now);
        self.snapshot.accumulated_ms = 0;
        self.snapshot.work_started_at = Some(self.clock.now_utc());
        self.persist();
        Some(TimerEvent::Started {
            at: self.clock.now_utc(),
        })
    }

    /// Freeze elapsed time. No-op unless running.
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

    /// Continue from a pause with a fresh reference instant.
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

    /// End the session, logging it if it reached one minute, and return to
    /// idle. Calling stop while already idle is a no-op.
    pub fn stop(&mut self) -> Option<TimerEvent> {
        match self.snapshot.status {
            TimerStatus::Running => self.flush_elapsed(),
            TimerStatus::Paused => {}
            TimerStatus::Idle => return None,
        }
        let ended_at = self.clock.now_utc();
        let elapsed = self.snapshot.accumulated_ms;
        let segment = if elapsed >= MIN_LOGGABLE_MS {
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
        self.snapshot = StopwatchSnapshot::default();
        self.clear_store();
        Some(TimerEvent::Stopped {
            segment,
            at: ended_at,
        })
    }

    /// Discard the session without logging.
    pub fn reset(&mut self) -> Option<TimerEvent> {
        self.snapshot = StopwatchSnapshot::default();
        self.clear_store();
        Some(TimerEvent::Reset {
            at: self.clock.now_utc(),
        })
    }

    /// Drift-correcting update. Call periodically while running; a no-op in
    /// any other state, so a stale scheduled tick cannot mutate a dead
    /// snapshot.
    pub fn tick(&mut self) {
        if self.snapshot.status != TimerStatus::Running {
            return;
        }
        self.flush_elapsed();
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Fold the time since the reference instant into the accumulator and
    /// re-anchor the reference at now.
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

    /// A snapshot persisted while running accounts the whole downtime as
    /// elapsed, then re-anchors. Writes back immediately so a crash right
    /// after load cannot fold the same gap twice.
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

    fn persist(&self) {
        match serde_json::to_string(&self.snapshot) {
            Ok(raw) => {
                if let Err(e) = self.store.save(&self.key, &raw) {
                    log::warn!("failed to persist stopwatch '{}': {e}", self.key);
                }
            }
            Err(e) => log::warn!("failed to serialize stopwatch '{}': {e}", self.key),
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear(&self.key) {
            log::warn!("failed to clear stopwatch '{}': {e}", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::super::ManualClock;
    use super::*;
    use crate::store::MemoryStore;

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<WorkSegment>>>);

    impl SegmentSink for RecordingSink {
        fn log_segment(&mut self, segment: &WorkSegment) -> Result<(), crate::error::CoreError> {
            self.0.borrow_mut().push(segment.clone());
            Ok(())
        }
    }

    fn engine(
        store: &MemoryStore,
        clock: &ManualClock,
        sink: &RecordingSink,
    ) -> Stopwatch<MemoryStore> {
        Stopwatch::with_clock(store.clone(), "sw", Box::new(clock.clone())).with_sink(sink.clone())
    }

    #[test]
    fn start_pause_resume_stop_accounts_running_time_only() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000_000);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(50_000);
        sw.pause().unwrap();
        clock.advance(600_000); // paused time must not count
        sw.resume().unwrap();
        clock.advance(40_000);
        sw.pause().unwrap();
        clock.advance(5_000);
        sw.resume().unwrap();
        clock.advance(35_000);

        let event = sw.stop().unwrap();
        match event {
            TimerEvent::Stopped { segment, .. } => {
                let segment = segment.expect("2+ minutes should be logged");
                // 50s + 40s + 35s running = 125s -> floor to 2 minutes.
                assert_eq!(segment.duration_min, 2);
            }
            other => panic!("expected Stopped, got {other:?}"),
        }
        assert_eq!(sink.0.borrow().len(), 1);
        assert_eq!(sw.status(), TimerStatus::Idle);
    }

    #[test]
    fn sub_minute_stop_is_discarded() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(59_999);
        match sw.stop().unwrap() {
            TimerEvent::Stopped { segment, .. } => assert!(segment.is_none()),
            other => panic!("expected Stopped, got {other:?}"),
        }
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn exactly_one_minute_logs_one_minute() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(60_000);
        sw.stop().unwrap();
        let segments = sink.0.borrow();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration_min, 1);
    }

    #[test]
    fn segment_reports_wall_clock_bounds() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(500_000);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(120_000);
        sw.stop().unwrap();
        let segments = sink.0.borrow();
        assert_eq!(segments[0].started_at.timestamp_millis(), 500_000);
        assert_eq!(segments[0].ended_at.timestamp_millis(), 620_000);
    }

    #[test]
    fn invalid_transitions_are_noops() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        assert!(sw.pause().is_none());
        assert!(sw.resume().is_none());
        assert!(sw.stop().is_none());

        sw.start().unwrap();
        assert!(sw.start().is_none());
        assert!(sw.resume().is_none());

        sw.pause().unwrap();
        assert!(sw.pause().is_none());
        assert!(sw.start().is_none());
    }

    #[test]
    fn stop_while_idle_never_double_logs() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(90_000);
        sw.stop().unwrap();
        assert!(sw.stop().is_none());
        assert_eq!(sink.0.borrow().len(), 1);
    }

    #[test]
    fn tick_is_drift_corrected_not_counted() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        // One late tick covers the whole gap.
        clock.advance(10_000);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 10_000);
        clock.advance(250);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 10_250);
    }

    #[test]
    fn tick_while_not_running_is_noop() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.tick();
        assert_eq!(sw.elapsed_ms(), 0);

        sw.start().unwrap();
        clock.advance(1_000);
        sw.pause().unwrap();
        clock.advance(5_000);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 1_000);
    }

    #[test]
    fn display_floor_divides_fields() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(3_725_000); // 1h 2m 5s
        sw.tick();
        let display = sw.display();
        assert_eq!(display.hours, 1);
        assert_eq!(display.minutes, 2);
        assert_eq!(display.seconds, 5);
    }

    #[test]
    fn progress_is_capped_at_100() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(300 * 60_000); // past the 240-minute cap
        sw.tick();
        assert_eq!(sw.display().progress_pct, 100.0);
    }

    #[test]
    fn reset_discards_without_logging() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        clock.advance(120_000);
        sw.reset().unwrap();
        assert!(sink.0.borrow().is_empty());
        assert_eq!(sw.status(), TimerStatus::Idle);
        assert!(store.load("sw").unwrap().is_none());
    }

    #[test]
    fn stop_clears_persisted_snapshot() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let mut sw = engine(&store, &clock, &sink);

        sw.start().unwrap();
        assert!(store.load("sw").unwrap().is_some());
        clock.advance(1_000);
        sw.stop().unwrap();
        assert!(store.load("sw").unwrap().is_none());
    }

    #[test]
    fn sink_failure_does_not_block_reset_to_idle() {
        struct FailingSink;
        impl SegmentSink for FailingSink {
            fn log_segment(
                &mut self,
                _segment: &WorkSegment,
            ) -> Result<(), crate::error::CoreError> {
                Err(crate::error::CoreError::Custom("sink down".into()))
            }
        }

        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut sw = Stopwatch::with_clock(store.clone(), "sw", Box::new(clock.clone()))
            .with_sink(FailingSink);

        sw.start().unwrap();
        clock.advance(90_000);
        sw.stop().unwrap();
        assert_eq!(sw.status(), TimerStatus::Idle);
        assert!(store.load("sw").unwrap().is_none());
    }
}
