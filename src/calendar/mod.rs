mod conflicts;
mod monitor;

pub use conflicts::{day_rows, detect_conflicts, ConflictPair, DayConflicts, RowItem};
pub(crate) use monitor::calendar_loop;
pub use monitor::{evaluate_upcoming, AlertTier, UpcomingAlert};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventStatus {
    None,
    Confirmed,
    Tentative,
    Canceled,
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::None
    }
}

/// One calendar occurrence, an immutable snapshot per store fetch.
///
/// `start_time <= end_time` for timed events; all-day events carry the
/// day bounds their store reports and are excluded from conflict and
/// alert math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_all_day: bool,
    pub status: EventStatus,
    pub attendees: Vec<String>,
}

/// Capability interface to the calendar database.
///
/// Treated as untrusted, possibly slow I/O: the engine pulls snapshots on
/// its own cadence under a timeout and never assumes freshness. A denied
/// or undetermined authorization is expected to surface as an empty event
/// list, not an error.
pub trait CalendarEventStore: Send + Sync {
    fn events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CalendarEvent>>;

    fn authorization_granted(&self) -> bool;

    /// Change signal: the watched value bumps on authorization changes and
    /// external data mutations, prompting an immediate re-evaluation.
    fn changed(&self) -> watch::Receiver<u64>;
}
