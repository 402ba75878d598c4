use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::coordinator::CoordinatorInput;

use super::{arbitrate, ArbiterState, BackendObservation, PlaybackUpdate, PlayerBackend, SourceId};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Polls every registered backend, arbitrates a single active source and
/// forwards the result to the coordinator.
///
/// Ticks are strictly sequential: a new tick only starts after the previous
/// one committed its result. Each backend query runs on a blocking worker
/// bounded by `backend_timeout`, so one hung player cannot stall the rest.
pub(crate) async fn playback_loop(
    backends: Vec<Arc<dyn PlayerBackend>>,
    priority: Vec<SourceId>,
    poll_interval: Duration,
    backend_timeout: Duration,
    tx: mpsc::Sender<CoordinatorInput>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut state = ArbiterState::new();
    let mut last_source: Option<SourceId> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let update = poll_once(&backends, &priority, backend_timeout, &mut state).await;

                if update.source != last_source {
                    log_info!(
                        "active playback source changed: {:?} -> {:?}",
                        last_source.as_ref().map(|s| s.as_str()),
                        update.source.as_ref().map(|s| s.as_str()),
                    );
                    last_source = update.source.clone();
                }

                if tx.send(CoordinatorInput::Playback(update)).await.is_err() {
                    // Coordinator is gone; nothing left to feed.
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("playback poll loop shutting down");
                break;
            }
        }
    }
}

async fn poll_once(
    backends: &[Arc<dyn PlayerBackend>],
    priority: &[SourceId],
    backend_timeout: Duration,
    state: &mut ArbiterState,
) -> PlaybackUpdate {
    // Observe all backends concurrently so a slow one only costs its own
    // timeout, never the whole tick.
    let handles: Vec<_> = backends
        .iter()
        .map(|backend| {
            let backend = Arc::clone(backend);
            tokio::spawn(observe_backend(backend, backend_timeout))
        })
        .collect();

    let mut observations = Vec::with_capacity(handles.len());
    for (handle, backend) in handles.into_iter().zip(backends) {
        let obs = match handle.await {
            Ok(obs) => obs,
            Err(err) => {
                log_warn!("backend observation task failed for {}: {err}", backend.id());
                BackendObservation {
                    source: backend.id(),
                    running: false,
                    playing: false,
                }
            }
        };
        observations.push(obs);
    }

    let source = arbitrate(&observations, state, priority);

    let Some(source) = source else {
        return PlaybackUpdate::default();
    };

    let is_playing = observations
        .iter()
        .find(|obs| obs.source == source)
        .map(|obs| obs.playing)
        .unwrap_or(false);

    // Fetch the track for the winner. Arbitration already decided; a failed
    // query only degrades the snapshot, never the source.
    let snapshot = backends
        .iter()
        .find(|backend| backend.id() == source)
        .map(|backend| Arc::clone(backend));
    let snapshot = match snapshot {
        Some(backend) => fetch_snapshot(backend, backend_timeout).await,
        None => None,
    };

    PlaybackUpdate {
        source: Some(source),
        is_playing,
        snapshot,
    }
}

/// Query running/playing state for one backend. Any error or timeout makes
/// the backend count as "not running" for this tick only.
async fn observe_backend(
    backend: Arc<dyn PlayerBackend>,
    backend_timeout: Duration,
) -> BackendObservation {
    let source = backend.id();

    let running = {
        let backend = Arc::clone(&backend);
        match bounded_blocking(backend_timeout, move || backend.is_app_running()).await {
            Some(running) => running,
            None => {
                log_warn!("is_app_running timed out for {source}; treating as not running");
                false
            }
        }
    };

    if !running {
        return BackendObservation {
            source,
            running: false,
            playing: false,
        };
    }

    let playing = {
        let backend = Arc::clone(&backend);
        bounded_blocking(backend_timeout, move || backend.is_playing()).await
    };

    match playing {
        Some(Ok(playing)) => BackendObservation {
            source,
            running: true,
            playing,
        },
        Some(Err(err)) => {
            log_debug!("is_playing failed for {source}: {err:#}");
            BackendObservation {
                source,
                running: false,
                playing: false,
            }
        }
        None => {
            log_warn!("is_playing timed out for {source}; treating as not running");
            BackendObservation {
                source,
                running: false,
                playing: false,
            }
        }
    }
}

async fn fetch_snapshot(
    backend: Arc<dyn PlayerBackend>,
    backend_timeout: Duration,
) -> Option<super::PlaybackSnapshot> {
    let source = backend.id();
    match bounded_blocking(backend_timeout, move || backend.now_playing()).await {
        Some(Ok(snapshot)) => snapshot,
        Some(Err(err)) => {
            log_debug!("now_playing failed for {source}: {err:#}");
            None
        }
        None => {
            log_warn!("now_playing timed out for {source}");
            None
        }
    }
}

/// Run a blocking backend call on a worker thread, bounded by a timeout.
/// Returns `None` on timeout or if the worker panicked.
async fn bounded_blocking<T, F>(limit: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(_)) | Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use std::sync::Mutex;

    struct FakeBackend {
        id: &'static str,
        running: bool,
        playing: Mutex<Result<bool>>,
        track: Mutex<Result<Option<super::super::PlaybackSnapshot>>>,
        stall: Option<Duration>,
    }

    impl FakeBackend {
        fn new(id: &'static str, running: bool, playing: Result<bool>) -> Self {
            Self {
                id,
                running,
                playing: Mutex::new(playing),
                track: Mutex::new(Ok(None)),
                stall: None,
            }
        }

        /// A backend whose queries block, as a hung scripting bridge would.
        fn hung(id: &'static str, stall: Duration) -> Self {
            Self {
                stall: Some(stall),
                ..Self::new(id, true, Ok(true))
            }
        }

        fn maybe_stall(&self) {
            if let Some(stall) = self.stall {
                std::thread::sleep(stall);
            }
        }
    }

    impl PlayerBackend for FakeBackend {
        fn id(&self) -> SourceId {
            SourceId::new(self.id)
        }
        fn is_app_running(&self) -> bool {
            self.maybe_stall();
            self.running
        }
        fn is_playing(&self) -> Result<bool> {
            self.maybe_stall();
            match &*self.playing.lock().unwrap() {
                Ok(playing) => Ok(*playing),
                Err(err) => bail!("{err}"),
            }
        }
        fn now_playing(&self) -> Result<Option<super::super::PlaybackSnapshot>> {
            match &*self.track.lock().unwrap() {
                Ok(track) => Ok(track.clone()),
                Err(err) => bail!("{err}"),
            }
        }
        fn play_pause(&self) -> Result<()> {
            Ok(())
        }
        fn next_track(&self) -> Result<()> {
            Ok(())
        }
        fn previous_track(&self) -> Result<()> {
            Ok(())
        }
        fn seek(&self, _seconds: f64) -> Result<()> {
            Ok(())
        }
        fn set_volume(&self, _percent: u8) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_query_degrades_to_not_running_for_the_tick() {
        let healthy: Arc<dyn PlayerBackend> =
            Arc::new(FakeBackend::new("music", true, Ok(true)));
        let broken: Arc<dyn PlayerBackend> =
            Arc::new(FakeBackend::new("spotify", true, bail_result()));

        let mut state = ArbiterState::new();
        let update = poll_once(
            &[broken, healthy],
            &[],
            Duration::from_millis(500),
            &mut state,
        )
        .await;

        // spotify's failure must not abort the evaluation; music still wins.
        assert_eq!(update.source, Some(SourceId::new("music")));
        assert!(update.is_playing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hung_backend_times_out_to_not_running_for_the_tick() {
        let healthy: Arc<dyn PlayerBackend> =
            Arc::new(FakeBackend::new("music", true, Ok(true)));
        let hung: Arc<dyn PlayerBackend> =
            Arc::new(FakeBackend::hung("spotify", Duration::from_millis(400)));

        let mut state = ArbiterState::new();
        let started = std::time::Instant::now();
        let update = poll_once(
            &[hung, healthy],
            &[],
            Duration::from_millis(100),
            &mut state,
        )
        .await;

        // The hung backend counts as not running for this tick; the tick
        // itself completes within the timeout, not the stall.
        assert_eq!(update.source, Some(SourceId::new("music")));
        assert!(update.is_playing);
        assert!(started.elapsed() < Duration::from_millis(350));

        // Next tick, with the stall cleared, spotify is observable again.
        let recovered: Arc<dyn PlayerBackend> =
            Arc::new(FakeBackend::new("spotify", true, Ok(true)));
        let healthy: Arc<dyn PlayerBackend> =
            Arc::new(FakeBackend::new("music", true, Ok(true)));
        let update = poll_once(
            &[recovered, healthy],
            &[],
            Duration::from_millis(100),
            &mut state,
        )
        .await;
        assert_eq!(update.source, Some(SourceId::new("music")));

        // Both playing now: the incumbent from the previous tick wins.
        assert_eq!(state.fallback(), Some(&SourceId::new("music")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_now_playing_keeps_the_source() {
        let backend = FakeBackend::new("music", true, Ok(true));
        *backend.track.lock().unwrap() = bail_result();
        let backend: Arc<dyn PlayerBackend> = Arc::new(backend);

        let mut state = ArbiterState::new();
        let update = poll_once(&[backend], &[], Duration::from_millis(500), &mut state).await;

        assert_eq!(update.source, Some(SourceId::new("music")));
        assert!(update.snapshot.is_none());
    }

    fn bail_result<T>() -> Result<T> {
        Err(anyhow::anyhow!("scripting bridge unreachable"))
    }
}
