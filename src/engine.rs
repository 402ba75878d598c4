use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::calendar::{calendar_loop, CalendarEventStore};
use crate::config::EngineConfig;
use crate::coordinator::{CoordinatorInput, NotchCoordinator, NotchSnapshot};
use crate::playback::{playback_loop, PlayerBackend, SourceId};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// The assembled coordination engine: playback poller, calendar monitor and
/// coordinator wired together behind one lifecycle.
///
/// All collaborators are injected at construction; the engine owns every
/// task it spawns and stops them all on [`shutdown`](Self::shutdown), so
/// repeated show/hide cycles can never accumulate competing monitors.
pub struct NotchEngine {
    input_tx: mpsc::Sender<CoordinatorInput>,
    snapshot_rx: watch::Receiver<NotchSnapshot>,
    backends: Vec<Arc<dyn PlayerBackend>>,
    cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl NotchEngine {
    /// Spawn the engine's tasks. Must be called from within a tokio
    /// runtime.
    pub fn start(
        backends: Vec<Arc<dyn PlayerBackend>>,
        store: Arc<dyn CalendarEventStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let cancel_token = CancellationToken::new();

        let mut coordinator = NotchCoordinator::spawn(config.hover_debounce, cancel_token.clone());
        let input_tx = coordinator.input();
        let snapshot_rx = coordinator.subscribe();

        let mut tasks = Vec::with_capacity(3);
        tasks.extend(coordinator.take_handle());

        tasks.push(tokio::spawn(playback_loop(
            backends.clone(),
            config.source_priority.clone(),
            config.playback_poll_interval,
            config.backend_timeout,
            input_tx.clone(),
            cancel_token.clone(),
        )));

        tasks.push(tokio::spawn(calendar_loop(
            store,
            config.calendar_tick_interval,
            config.store_timeout,
            config.alert_horizon,
            input_tx.clone(),
            cancel_token.clone(),
        )));

        log_info!(
            "engine started with {} backend(s), polling every {:?}",
            backends.len(),
            config.playback_poll_interval
        );

        Ok(Self {
            input_tx,
            snapshot_rx,
            backends,
            cancel_token,
            tasks,
        })
    }

    /// Current published state.
    pub fn snapshot(&self) -> NotchSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch the published state; the presentation layer renders from this.
    pub fn subscribe(&self) -> watch::Receiver<NotchSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Raw hover enter/exit from the notch region. Debounced internally.
    pub async fn set_hover(&self, hovering: bool) {
        self.send(CoordinatorInput::Hover(hovering)).await;
    }

    /// Onboarding override: forces the expanded panel while active.
    pub async fn set_intro(&self, active: bool) {
        self.send(CoordinatorInput::Intro(active)).await;
    }

    /// Freeze state transitions, e.g. around system sleep.
    pub async fn suspend(&self) {
        self.send(CoordinatorInput::Suspend(true)).await;
    }

    /// Re-enable transitions and immediately re-evaluate current inputs.
    pub async fn resume(&self) {
        self.send(CoordinatorInput::Suspend(false)).await;
    }

    // Media controls, routed to the active source. Best-effort: without an
    // active source they are dropped, and backend errors are only logged.

    pub fn play_pause(&self) {
        self.dispatch("play_pause", |backend| backend.play_pause());
    }

    pub fn next_track(&self) {
        self.dispatch("next_track", |backend| backend.next_track());
    }

    pub fn previous_track(&self) {
        self.dispatch("previous_track", |backend| backend.previous_track());
    }

    pub fn seek(&self, seconds: f64) {
        self.dispatch("seek", move |backend| backend.seek(seconds));
    }

    pub fn set_volume(&self, percent: u8) {
        self.dispatch("set_volume", move |backend| backend.set_volume(percent));
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel_token.cancel();
        for task in self.tasks.drain(..) {
            task.await.context("engine task failed to join")?;
        }
        log_info!("engine shut down");
        Ok(())
    }

    async fn send(&self, input: CoordinatorInput) {
        if self.input_tx.send(input).await.is_err() {
            log_warn!("coordinator input dropped; loop already stopped");
        }
    }

    fn active_backend(&self) -> Option<Arc<dyn PlayerBackend>> {
        let source: SourceId = self.snapshot_rx.borrow().active_source.clone()?;
        self.backends
            .iter()
            .find(|backend| backend.id() == source)
            .cloned()
    }

    fn dispatch<F>(&self, name: &'static str, call: F)
    where
        F: FnOnce(&dyn PlayerBackend) -> Result<()> + Send + 'static,
    {
        let Some(backend) = self.active_backend() else {
            log_debug!("{name} ignored: no active playback source");
            return;
        };

        // Fire-and-forget: the caller gets no result by contract.
        tokio::spawn(async move {
            let source = backend.id();
            let outcome =
                tokio::task::spawn_blocking(move || call(backend.as_ref())).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log_debug!("{name} failed for {source}: {err:#}"),
                Err(err) => log_warn!("{name} worker failed for {source}: {err}"),
            }
        });
    }
}
