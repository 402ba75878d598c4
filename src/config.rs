use std::time::Duration;

use crate::playback::SourceId;

/// Tuning knobs for the coordination engine.
///
/// Defaults match the cadences the notch surface was designed around:
/// playback polled every 2s, calendar re-evaluated every second, and every
/// outbound call to a collaborator process bounded by a timeout so a hung
/// app can never stall a tick.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often all player backends are polled.
    pub playback_poll_interval: Duration,
    /// Upper bound on any single backend query within a poll tick.
    /// A timed-out backend counts as "not running" for that tick only.
    pub backend_timeout: Duration,
    /// How often the upcoming-event monitor re-evaluates.
    pub calendar_tick_interval: Duration,
    /// Upper bound on a calendar store query. A slow store degrades that
    /// tick to "no alert" instead of blocking.
    pub store_timeout: Duration,
    /// Only events starting within this window are considered alert
    /// candidates. The visible countdown still begins at 15 minutes; the
    /// horizon just bounds the search cheaply.
    pub alert_horizon: Duration,
    /// Raw hover enter/exit events within this window collapse into a
    /// single effective transition.
    pub hover_debounce: Duration,
    /// Static tie-break order when several backends play at once and the
    /// incumbent is not among them. Earlier entries win.
    pub source_priority: Vec<SourceId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let debug_mode = std::env::var("OVERHANG_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            playback_poll_interval: if debug_mode {
                Duration::from_millis(500)
            } else {
                Duration::from_secs(2)
            },
            backend_timeout: Duration::from_secs(2),
            calendar_tick_interval: Duration::from_secs(1),
            store_timeout: Duration::from_secs(2),
            alert_horizon: Duration::from_secs(90 * 60),
            hover_debounce: Duration::from_millis(100),
            source_priority: Vec::new(),
        }
    }
}
