use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::coordinator::CoordinatorInput;

use super::{CalendarEvent, CalendarEventStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// The countdown only becomes visible inside the last 15 minutes.
const VISIBLE_WINDOW_SECS: i64 = 900;
const FIVE_MINUTE_TIER_SECS: i64 = 300;
const SECONDS_TIER_SECS: i64 = 60;

/// Discrete countdown bucket, coarse above one minute so the surface does
/// not repaint every second until it has to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum AlertTier {
    /// Exact integer seconds, only within the last minute.
    Seconds(u32),
    FiveMinutes,
    FifteenMinutes,
}

/// The single most imminent qualifying event, recomputed every tick and
/// replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAlert {
    pub event_id: String,
    pub title: String,
    pub seconds_remaining: i64,
    pub tier: AlertTier,
}

/// Pick the next imminent event and derive its countdown tier.
///
/// Candidates are timed events starting today (local calendar day), after
/// `now`, within `horizon`. The earliest start wins; simultaneous starts
/// keep source order. An event further out than 15 minutes yields no alert
/// even though it already sits inside the horizon.
pub fn evaluate_upcoming(
    events: &[CalendarEvent],
    now: DateTime<Utc>,
    horizon: chrono::Duration,
) -> Option<UpcomingAlert> {
    let today = now.with_timezone(&Local).date_naive();
    let cutoff = now + horizon;

    let mut candidates: Vec<&CalendarEvent> = events
        .iter()
        .filter(|event| !event.is_all_day)
        .filter(|event| event.start_time > now && event.start_time <= cutoff)
        .filter(|event| event.start_time.with_timezone(&Local).date_naive() == today)
        .collect();
    candidates.sort_by_key(|event| event.start_time);

    let next = candidates.first()?;
    let remaining = (next.start_time - now).num_seconds();

    let tier = if remaining > VISIBLE_WINDOW_SECS {
        return None;
    } else if remaining > FIVE_MINUTE_TIER_SECS {
        AlertTier::FifteenMinutes
    } else if remaining > SECONDS_TIER_SECS {
        AlertTier::FiveMinutes
    } else {
        AlertTier::Seconds(remaining.max(0) as u32)
    };

    Some(UpcomingAlert {
        event_id: next.id.clone(),
        title: next.title.clone(),
        seconds_remaining: remaining,
        tier,
    })
}

/// Re-evaluates the upcoming alert on a fixed tick and whenever the store
/// signals a change. A slow or failing store degrades the tick to "no
/// alert"; it never aborts the loop.
pub(crate) async fn calendar_loop(
    store: Arc<dyn CalendarEventStore>,
    tick_interval: Duration,
    store_timeout: Duration,
    horizon: Duration,
    tx: mpsc::Sender<CoordinatorInput>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut changed_rx = store.changed();
    let mut listen_for_changes = true;

    let horizon = chrono::Duration::from_std(horizon).unwrap_or_else(|_| chrono::Duration::minutes(90));
    let mut last_alert: Option<UpcomingAlert> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = changed_rx.changed(), if listen_for_changes => {
                if changed.is_err() {
                    // Store dropped its sender; fall back to the tick alone.
                    listen_for_changes = false;
                    continue;
                }
                log_debug!("calendar store signalled a change; re-evaluating");
            }
            _ = cancel_token.cancelled() => {
                log_info!("calendar monitor shutting down");
                break;
            }
        }

        let alert = evaluate_tick(&store, store_timeout, horizon).await;

        if alert_transition(&last_alert, &alert) {
            log_info!(
                "upcoming alert changed: {:?} -> {:?}",
                last_alert.as_ref().map(|a| a.event_id.as_str()),
                alert.as_ref().map(|a| a.event_id.as_str()),
            );
        }
        last_alert = alert.clone();

        if tx.send(CoordinatorInput::Calendar(alert)).await.is_err() {
            break;
        }
    }
}

async fn evaluate_tick(
    store: &Arc<dyn CalendarEventStore>,
    store_timeout: Duration,
    horizon: chrono::Duration,
) -> Option<UpcomingAlert> {
    if !store.authorization_granted() {
        return None;
    }

    let now = Utc::now();
    let events = {
        let store = Arc::clone(store);
        let cutoff = now + horizon;
        let query = tokio::task::spawn_blocking(move || store.events(now, cutoff));
        match tokio::time::timeout(store_timeout, query).await {
            Ok(Ok(Ok(events))) => events,
            Ok(Ok(Err(err))) => {
                log_warn!("calendar store query failed: {err:#}");
                return None;
            }
            Ok(Err(err)) => {
                log_warn!("calendar store query worker failed: {err}");
                return None;
            }
            Err(_) => {
                log_warn!("calendar store query timed out (> {:?})", store_timeout);
                return None;
            }
        }
    };

    evaluate_upcoming(&events, now, horizon)
}

fn alert_transition(last: &Option<UpcomingAlert>, next: &Option<UpcomingAlert>) -> bool {
    match (last, next) {
        (None, None) => false,
        (Some(a), Some(b)) => a.event_id != b.event_id,
        _ => true,
    }
}
