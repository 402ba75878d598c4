use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CalendarEvent;

/// Two timed events whose intervals overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPair {
    pub first_id: String,
    pub second_id: String,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
}

/// Conflicts for one calendar day: the flat id set for row highlighting
/// plus the ordered pairs for inline annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayConflicts {
    pub ids: HashSet<String>,
    pub pairs: Vec<ConflictPair>,
}

/// One row of a day view: either an event or the conflict annotation that
/// sits between two overlapping event rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RowItem {
    Event(CalendarEvent),
    Conflict(ConflictPair),
}

/// Find overlapping event pairs within one day's events.
///
/// All-day events are discarded, the rest sorted by start time (stable, so
/// simultaneous starts keep their source order), then only *adjacent* pairs
/// in sorted order are compared. A triple where A overlaps C but B sits
/// between them in sort order therefore reports A–B and B–C but not A–C.
/// That is the behavior the notch surface has always shown and consumers
/// rely on at most two annotations per event (predecessor and successor),
/// so it is kept as is.
pub fn detect_conflicts(events: &[CalendarEvent]) -> DayConflicts {
    let timed = sorted_timed_events(events);

    let mut conflicts = DayConflicts::default();
    for window in timed.windows(2) {
        let (earlier, later) = (&window[0], &window[1]);
        if earlier.end_time > later.start_time {
            conflicts.ids.insert(earlier.id.clone());
            conflicts.ids.insert(later.id.clone());
            conflicts.pairs.push(ConflictPair {
                first_id: earlier.id.clone(),
                second_id: later.id.clone(),
                overlap_start: earlier.start_time.max(later.start_time),
                overlap_end: earlier.end_time.min(later.end_time),
            });
        }
    }

    conflicts
}

/// Build the mixed row sequence for a day view: all-day events first, then
/// timed events in start order with each conflict annotation interleaved
/// between the two rows it concerns.
pub fn day_rows(events: &[CalendarEvent]) -> Vec<RowItem> {
    let timed = sorted_timed_events(events);
    let conflicts = detect_conflicts(events);

    let mut rows: Vec<RowItem> = events
        .iter()
        .filter(|event| event.is_all_day)
        .cloned()
        .map(RowItem::Event)
        .collect();

    let mut pairs = conflicts.pairs.into_iter().peekable();
    for event in timed {
        let id = event.id.clone();
        rows.push(RowItem::Event(event));
        // Pairs come out of the scan in the same adjacent order as rows.
        if pairs.peek().map(|pair| pair.first_id == id).unwrap_or(false) {
            if let Some(pair) = pairs.next() {
                rows.push(RowItem::Conflict(pair));
            }
        }
    }

    rows
}

fn sorted_timed_events(events: &[CalendarEvent]) -> Vec<CalendarEvent> {
    let mut timed: Vec<CalendarEvent> = events
        .iter()
        .filter(|event| !event.is_all_day)
        .cloned()
        .collect();
    timed.sort_by_key(|event| event.start_time);
    timed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventStatus;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, hour, minute, 0).unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: format!("event {id}"),
            start_time: start,
            end_time: end,
            is_all_day: false,
            status: EventStatus::Confirmed,
            attendees: Vec::new(),
        }
    }

    fn all_day(id: &str) -> CalendarEvent {
        CalendarEvent {
            is_all_day: true,
            ..event(id, at(0, 0), at(23, 59))
        }
    }

    #[test]
    fn adjacent_overlap_is_reported_with_exact_window() {
        let events = [
            event("a", at(9, 0), at(9, 30)),
            event("b", at(9, 15), at(9, 45)),
            event("c", at(10, 0), at(10, 30)),
        ];

        let conflicts = detect_conflicts(&events);

        assert_eq!(
            conflicts.ids,
            HashSet::from(["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            conflicts.pairs,
            vec![ConflictPair {
                first_id: "a".to_string(),
                second_id: "b".to_string(),
                overlap_start: at(9, 15),
                overlap_end: at(9, 30),
            }]
        );
    }

    #[test]
    fn all_day_events_never_conflict() {
        let events = [all_day("holiday"), event("a", at(9, 0), at(10, 0))];

        let conflicts = detect_conflicts(&events);

        assert!(conflicts.pairs.is_empty());
        assert!(conflicts.ids.is_empty());
    }

    #[test]
    fn unsorted_input_is_handled() {
        let events = [
            event("b", at(9, 15), at(9, 45)),
            event("a", at(9, 0), at(9, 30)),
        ];

        let conflicts = detect_conflicts(&events);

        assert_eq!(conflicts.pairs.len(), 1);
        assert_eq!(conflicts.pairs[0].first_id, "a");
        assert_eq!(conflicts.pairs[0].second_id, "b");
    }

    #[test]
    fn non_adjacent_overlaps_are_not_reported() {
        // "a" spans both "b" and "c", but only adjacent pairs in start
        // order are compared: a-b conflicts, b-c does not, and the a-c
        // overlap goes unreported. Pinned on purpose; see detect_conflicts.
        let events = [
            event("a", at(9, 0), at(11, 0)),
            event("b", at(9, 30), at(10, 0)),
            event("c", at(10, 15), at(10, 45)),
        ];

        let conflicts = detect_conflicts(&events);

        assert_eq!(conflicts.pairs.len(), 1);
        assert_eq!(conflicts.pairs[0].first_id, "a");
        assert_eq!(conflicts.pairs[0].second_id, "b");
        assert_eq!(
            conflicts.ids,
            HashSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn an_event_can_appear_in_two_pairs() {
        let events = [
            event("a", at(9, 0), at(9, 40)),
            event("b", at(9, 30), at(10, 10)),
            event("c", at(10, 0), at(10, 30)),
        ];

        let conflicts = detect_conflicts(&events);

        assert_eq!(conflicts.pairs.len(), 2);
        assert_eq!(conflicts.ids.len(), 3);
    }

    #[test]
    fn rows_interleave_conflicts_and_lead_with_all_day_events() {
        let events = [
            event("a", at(9, 0), at(9, 30)),
            all_day("holiday"),
            event("b", at(9, 15), at(9, 45)),
            event("c", at(10, 0), at(10, 30)),
        ];

        let rows = day_rows(&events);

        let kinds: Vec<&str> = rows
            .iter()
            .map(|row| match row {
                RowItem::Event(event) => event.id.as_str(),
                RowItem::Conflict(_) => "conflict",
            })
            .collect();
        assert_eq!(kinds, vec!["holiday", "a", "conflict", "b", "c"]);
    }
}
