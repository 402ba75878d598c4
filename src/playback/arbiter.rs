use super::SourceId;

/// What one backend reported (or failed to report) during a poll tick.
///
/// A query that errored or timed out is recorded as `running: false`; the
/// arbiter never distinguishes "absent" from "unreachable this tick".
#[derive(Debug, Clone)]
pub struct BackendObservation {
    pub source: SourceId,
    pub running: bool,
    pub playing: bool,
}

/// The arbiter's fallback memory: the last source that won arbitration.
///
/// Written only by the playback poll loop; one evaluation at a time.
#[derive(Debug, Clone, Default)]
pub struct ArbiterState {
    fallback: Option<SourceId>,
}

impl ArbiterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(&self) -> Option<&SourceId> {
        self.fallback.as_ref()
    }
}

/// Decide which backend to surface as "now playing" for this tick.
///
/// Rules, in order:
/// - nothing running: no source, fallback memory cleared
/// - exactly one running: that one, playing or not
/// - one of many playing: that one
/// - none of many playing: the fallback stays sticky while it keeps running
/// - several playing: the incumbent keeps winning if it is among them,
///   otherwise the configured priority order breaks the tie (first match
///   wins; observation order if the priority list names none of them)
pub fn arbitrate(
    observations: &[BackendObservation],
    state: &mut ArbiterState,
    priority: &[SourceId],
) -> Option<SourceId> {
    let running: Vec<&BackendObservation> =
        observations.iter().filter(|obs| obs.running).collect();

    if running.is_empty() {
        state.fallback = None;
        return None;
    }

    if running.len() == 1 {
        let winner = running[0].source.clone();
        state.fallback = Some(winner.clone());
        return Some(winner);
    }

    let playing: Vec<&BackendObservation> =
        running.iter().filter(|obs| obs.playing).copied().collect();

    match playing.len() {
        1 => {
            let winner = playing[0].source.clone();
            state.fallback = Some(winner.clone());
            Some(winner)
        }
        0 => {
            // Sticky: keep the last active source while its app stays open.
            match &state.fallback {
                Some(last) if running.iter().any(|obs| obs.source == *last) => {
                    Some(last.clone())
                }
                _ => None,
            }
        }
        _ => {
            // Ambiguous. The incumbent wins ties; otherwise static priority.
            if let Some(last) = &state.fallback {
                if playing.iter().any(|obs| obs.source == *last) {
                    return Some(last.clone());
                }
            }
            let winner = priority
                .iter()
                .find(|id| playing.iter().any(|obs| obs.source == **id))
                .cloned()
                .unwrap_or_else(|| playing[0].source.clone());
            state.fallback = Some(winner.clone());
            Some(winner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: &str, running: bool, playing: bool) -> BackendObservation {
        BackendObservation {
            source: SourceId::new(id),
            running,
            playing,
        }
    }

    #[test]
    fn nothing_running_clears_fallback() {
        let mut state = ArbiterState::new();
        state.fallback = Some(SourceId::new("spotify"));

        let result = arbitrate(&[obs("spotify", false, false)], &mut state, &[]);

        assert_eq!(result, None);
        assert_eq!(state.fallback(), None);
    }

    #[test]
    fn single_running_app_wins_even_when_paused() {
        let mut state = ArbiterState::new();

        let result = arbitrate(
            &[obs("spotify", false, false), obs("music", true, false)],
            &mut state,
            &[],
        );

        assert_eq!(result, Some(SourceId::new("music")));
        assert_eq!(state.fallback(), Some(&SourceId::new("music")));
    }

    #[test]
    fn unique_playing_app_wins_among_many_running() {
        let mut state = ArbiterState::new();

        let result = arbitrate(
            &[obs("spotify", true, false), obs("music", true, true)],
            &mut state,
            &[],
        );

        assert_eq!(result, Some(SourceId::new("music")));
    }

    #[test]
    fn fallback_is_sticky_while_its_app_keeps_running() {
        let mut state = ArbiterState::new();
        arbitrate(
            &[obs("spotify", true, true), obs("music", true, false)],
            &mut state,
            &[],
        );

        // Everything paused now; spotify should stay on screen.
        let result = arbitrate(
            &[obs("spotify", true, false), obs("music", true, false)],
            &mut state,
            &[],
        );

        assert_eq!(result, Some(SourceId::new("spotify")));
    }

    #[test]
    fn no_fallback_and_nothing_playing_yields_no_source() {
        let mut state = ArbiterState::new();

        let result = arbitrate(
            &[obs("spotify", true, false), obs("music", true, false)],
            &mut state,
            &[],
        );

        assert_eq!(result, None);
    }

    #[test]
    fn incumbent_wins_ambiguous_ties() {
        let mut state = ArbiterState::new();
        arbitrate(&[obs("spotify", true, true)], &mut state, &[]);

        // music starts playing too; spotify keeps playing. Stability bias.
        let result = arbitrate(
            &[obs("spotify", true, true), obs("music", true, true)],
            &mut state,
            &[SourceId::new("music"), SourceId::new("spotify")],
        );

        assert_eq!(result, Some(SourceId::new("spotify")));
        assert_eq!(state.fallback(), Some(&SourceId::new("spotify")));
    }

    #[test]
    fn priority_order_breaks_ties_without_incumbent() {
        let mut state = ArbiterState::new();

        let result = arbitrate(
            &[
                obs("vox", true, true),
                obs("spotify", true, true),
                obs("music", true, true),
            ],
            &mut state,
            &[SourceId::new("music"), SourceId::new("spotify")],
        );

        assert_eq!(result, Some(SourceId::new("music")));
        assert_eq!(state.fallback(), Some(&SourceId::new("music")));
    }

    #[test]
    fn observation_order_breaks_ties_when_priority_names_nobody() {
        let mut state = ArbiterState::new();

        let result = arbitrate(
            &[obs("vox", true, true), obs("doppler", true, true)],
            &mut state,
            &[SourceId::new("music")],
        );

        assert_eq!(result, Some(SourceId::new("vox")));
    }

    #[test]
    fn same_inputs_and_memory_always_produce_the_same_result() {
        let inputs = [
            obs("spotify", true, true),
            obs("music", true, true),
            obs("vox", true, false),
        ];
        let priority = [SourceId::new("music")];

        let mut first = ArbiterState::new();
        first.fallback = Some(SourceId::new("vox"));
        let mut second = first.clone();

        let a = arbitrate(&inputs, &mut first, &priority);
        let b = arbitrate(&inputs, &mut second, &priority);

        assert_eq!(a, b);
        assert_eq!(first.fallback(), second.fallback());
    }
}
