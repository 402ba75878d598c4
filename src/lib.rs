//! Coordination engine for a macOS notch heads-up surface.
//!
//! The engine polls player backends, watches a calendar event store and
//! folds both signals, plus a debounced hover signal, into one published
//! [`NotchSnapshot`]. The presentation layer is a consumer only: it renders
//! whatever the coordinator publishes and feeds raw hover events back in.

pub mod calendar;
mod config;
pub mod coordinator;
mod engine;
pub mod playback;
mod utils;

pub use calendar::{
    day_rows, detect_conflicts, evaluate_upcoming, AlertTier, CalendarEvent, CalendarEventStore,
    ConflictPair, DayConflicts, EventStatus, RowItem, UpcomingAlert,
};
pub use config::EngineConfig;
pub use coordinator::{ActivityKind, CoordinatorInput, NotchSnapshot, NotchState};
pub use engine::NotchEngine;
pub use playback::{
    PlaybackSnapshot, PlaybackUpdate, PlayerBackend, ProcessWatcher, SourceId,
};

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
