mod controller;

pub use controller::NotchCoordinator;

use serde::{Deserialize, Serialize};

use crate::calendar::UpcomingAlert;
use crate::playback::{PlaybackSnapshot, PlaybackUpdate, SourceId};

/// Presentation mode of the notch surface. Exactly one at a time, owned
/// exclusively by the coordinator loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotchState {
    Collapsed,
    /// Compact heads-up strip, no interaction focus.
    Activity,
    /// Full interactive panel, driven by hover (or the intro override).
    Expanded,
}

impl Default for NotchState {
    fn default() -> Self {
        NotchState::Collapsed
    }
}

impl NotchState {
    fn rank(self) -> u8 {
        match self {
            NotchState::Collapsed => 0,
            NotchState::Activity => 1,
            NotchState::Expanded => 2,
        }
    }
}

/// Which activity won arbitration for display. Calendar beats media when
/// both are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    None,
    Calendar,
    Media,
}

impl Default for ActivityKind {
    fn default() -> Self {
        ActivityKind::None
    }
}

/// Everything the presentation layer needs, published as one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotchSnapshot {
    pub state: NotchState,
    pub activity: ActivityKind,
    pub intro_active: bool,
    pub active_source: Option<SourceId>,
    pub playback: Option<PlaybackSnapshot>,
    pub alert: Option<UpcomingAlert>,
}

/// Typed messages folded by the coordinator loop. Monitors and the
/// presentation layer only ever enqueue; one loop applies the transitions.
#[derive(Debug, Clone)]
pub enum CoordinatorInput {
    Playback(PlaybackUpdate),
    Calendar(Option<UpcomingAlert>),
    /// Raw hover enter/exit, debounced inside the loop.
    Hover(bool),
    Intro(bool),
    Suspend(bool),
}

/// Latest known value of every input plus the committed state.
///
/// The transition table is a pure function of these fields, so the
/// coordinator stays correct under any interleaving of monitor updates.
#[derive(Debug, Clone, Default)]
pub(crate) struct CoordinatorState {
    pub hover: bool,
    pub intro: bool,
    pub suspended: bool,
    pub playback: PlaybackUpdate,
    pub alert: Option<UpcomingAlert>,
    state: NotchState,
    activity: ActivityKind,
    pending_downgrade: Option<NotchState>,
}

impl CoordinatorState {
    /// The transition table, first matching rule wins:
    /// intro > hover > calendar alert > playing media > collapsed.
    /// (The suspend rule lives in the loop: a suspended coordinator does
    /// not evaluate at all.)
    fn target(&self) -> (NotchState, ActivityKind) {
        let activity = if self.alert.is_some() {
            ActivityKind::Calendar
        } else if self.playback.source.is_some() && self.playback.is_playing {
            ActivityKind::Media
        } else {
            ActivityKind::None
        };

        if self.intro || self.hover {
            (NotchState::Expanded, activity)
        } else if activity != ActivityKind::None {
            (NotchState::Activity, activity)
        } else {
            (NotchState::Collapsed, ActivityKind::None)
        }
    }

    /// Recompute the committed state from the latest inputs.
    ///
    /// Upgrades apply immediately. A downgrade only commits once the same
    /// lower target has been computed in two consecutive evaluations, so a
    /// single missed tick never collapses the surface.
    pub fn evaluate(&mut self) {
        let (target, activity) = self.target();
        self.activity = activity;

        if target.rank() >= self.state.rank() {
            self.state = target;
            self.pending_downgrade = None;
        } else if self.pending_downgrade == Some(target) {
            self.state = target;
            self.pending_downgrade = None;
        } else {
            self.pending_downgrade = Some(target);
        }
    }

    pub fn snapshot(&self) -> NotchSnapshot {
        NotchSnapshot {
            state: self.state,
            activity: self.activity,
            intro_active: self.intro,
            active_source: self.playback.source.clone(),
            playback: self.playback.snapshot.clone(),
            alert: self.alert.clone(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> NotchState {
        self.state
    }
}
