use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{CoordinatorInput, CoordinatorState, NotchSnapshot};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const INPUT_QUEUE_CAPACITY: usize = 64;

/// Single-writer owner of the notch state.
///
/// Every input (monitor results, hover, lifecycle flags) arrives as a
/// [`CoordinatorInput`] message on one queue; one spawned loop folds them
/// into [`CoordinatorState`] and publishes [`NotchSnapshot`] values over a
/// watch channel. Nothing else ever writes the state.
pub struct NotchCoordinator {
    input_tx: mpsc::Sender<CoordinatorInput>,
    snapshot_rx: watch::Receiver<NotchSnapshot>,
    handle: Option<JoinHandle<()>>,
}

impl NotchCoordinator {
    /// Spawn the fold loop. It runs until `cancel_token` fires or every
    /// input sender is dropped.
    pub fn spawn(hover_debounce: Duration, cancel_token: CancellationToken) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(NotchSnapshot::default());

        let handle = tokio::spawn(coordinator_loop(
            input_rx,
            snapshot_tx,
            hover_debounce,
            cancel_token,
        ));

        Self {
            input_tx,
            snapshot_rx,
            handle: Some(handle),
        }
    }

    pub fn input(&self) -> mpsc::Sender<CoordinatorInput> {
        self.input_tx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotchSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> NotchSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub(crate) fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }
}

async fn coordinator_loop(
    mut input_rx: mpsc::Receiver<CoordinatorInput>,
    snapshot_tx: watch::Sender<NotchSnapshot>,
    hover_debounce: Duration,
    cancel_token: CancellationToken,
) {
    let mut st = CoordinatorState::default();

    // Raw hover flips arm this timer; only the last value inside the
    // window is applied. The select guard keeps a disarmed timer inert.
    let mut pending_hover: Option<bool> = None;
    let hover_timer = tokio::time::sleep(Duration::from_secs(86_400));
    tokio::pin!(hover_timer);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("coordinator shutting down");
                break;
            }
            _ = &mut hover_timer, if pending_hover.is_some() => {
                if let Some(hover) = pending_hover.take() {
                    log_debug!("hover settled: {hover}");
                    st.hover = hover;
                    publish(&mut st, &snapshot_tx);
                }
            }
            msg = input_rx.recv() => {
                let Some(input) = msg else {
                    log_info!("all coordinator inputs dropped; stopping");
                    break;
                };
                match input {
                    CoordinatorInput::Hover(raw) => {
                        // Restart the window on every raw event.
                        pending_hover = Some(raw);
                        hover_timer.as_mut().reset(Instant::now() + hover_debounce);
                    }
                    CoordinatorInput::Playback(update) => {
                        st.playback = update;
                        publish(&mut st, &snapshot_tx);
                    }
                    CoordinatorInput::Calendar(alert) => {
                        st.alert = alert;
                        publish(&mut st, &snapshot_tx);
                    }
                    CoordinatorInput::Intro(active) => {
                        st.intro = active;
                        publish(&mut st, &snapshot_tx);
                    }
                    CoordinatorInput::Suspend(suspended) => {
                        st.suspended = suspended;
                        if suspended {
                            log_info!("coordinator suspended; state frozen");
                        } else {
                            log_info!("coordinator resumed; re-evaluating");
                            publish(&mut st, &snapshot_tx);
                        }
                    }
                }
            }
        }
    }
}

/// Evaluate and publish unless suspended. Inputs recorded while suspended
/// take effect on the first evaluation after resume.
fn publish(st: &mut CoordinatorState, snapshot_tx: &watch::Sender<NotchSnapshot>) {
    if st.suspended {
        return;
    }
    st.evaluate();
    let snapshot = st.snapshot();
    snapshot_tx.send_if_modified(|current| {
        if *current != snapshot {
            *current = snapshot;
            true
        } else {
            false
        }
    });
}
