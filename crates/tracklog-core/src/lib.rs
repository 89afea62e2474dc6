//! # Tracklog Core Library
//!
//! Core business logic for tracklog, a personal self-tracking tool built
//! around timed work sessions. The CLI binary is a thin layer over this
//! library; any other front end drives the same engines.
//!
//! ## Architecture
//!
//! - **Timer Engines**: wall-clock-based state machines. The caller is
//!   responsible for calling `tick()` periodically; elapsed time is computed
//!   from timestamp deltas, so a suspended process folds the whole gap in on
//!   the next tick or on reload.
//! - **Snapshot Store**: opaque key/value persistence the engines read at
//!   construction and write on every state change.
//! - **Storage**: SQLite-based session storage and TOML-based configuration.
//!
//! ## Key Components
//!
//! - [`Stopwatch`]: open-ended elapsed-time accumulator
//! - [`IntervalTimer`]: work/break cycling countdown engine
//! - [`Database`]: session and snapshot persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod storage;
pub mod store;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, StoreError};
pub use events::{TimerEvent, WorkSegment};
pub use storage::{Config, Database, SessionRecord, Stats};
pub use store::{MemoryStore, SnapshotStore};
pub use timer::{
    Clock, IntervalConfig, IntervalTimer, ManualClock, SegmentSink, Stopwatch, SystemClock,
    TimerStatus,
};
