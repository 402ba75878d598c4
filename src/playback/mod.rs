mod arbiter;
mod poller;
mod process;

pub use arbiter::{arbitrate, ArbiterState, BackendObservation};
pub(crate) use poller::playback_loop;
pub use process::ProcessWatcher;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Stable identifier for one player backend (e.g. "spotify", "music").
///
/// Ids are assigned by whoever registers the backend; the engine only ever
/// compares them and looks them up in the configured priority list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Now-playing state of one backend at poll time.
///
/// Superseded wholesale on the next tick, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Track length in seconds, when the backend reports one.
    pub duration_sec: Option<f64>,
    pub elapsed_sec: f64,
    pub is_playing: bool,
    pub is_running: bool,
    pub source: SourceId,
}

/// Capability interface to one external media application.
///
/// Methods are synchronous and may block on inter-process calls; the engine
/// always invokes them on a blocking worker under a timeout. Implementations
/// must never panic because the backing app is absent: queries report
/// "not running"/"nothing playing" and control calls silently no-op.
pub trait PlayerBackend: Send + Sync {
    fn id(&self) -> SourceId;

    /// Whether the backing application process is currently running.
    /// Expected to be cheap (process-table lookup, see [`ProcessWatcher`]).
    fn is_app_running(&self) -> bool;

    fn is_playing(&self) -> Result<bool>;

    /// Current track, or `None` when the app is not running or has no track.
    fn now_playing(&self) -> Result<Option<PlaybackSnapshot>>;

    // Control surface. Best-effort: callers drop errors after logging.
    fn play_pause(&self) -> Result<()>;
    fn next_track(&self) -> Result<()>;
    fn previous_track(&self) -> Result<()>;
    fn seek(&self, seconds: f64) -> Result<()>;
    fn set_volume(&self, percent: u8) -> Result<()>;
}

/// Result of one playback poll tick, as consumed by the coordinator.
///
/// `source` can be present with `is_playing == false` (sticky fallback) and
/// with `snapshot == None` (the now-playing query failed for this tick).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackUpdate {
    pub source: Option<SourceId>,
    pub is_playing: bool,
    pub snapshot: Option<PlaybackSnapshot>,
}
