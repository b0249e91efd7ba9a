//! Ordering & selection over waiting entries
//!
//! "Call next" picks, among entries in `Waiting`, the highest priority tier
//! with ties broken by earliest check-in. The comparator is a stable,
//! deterministic total order (position is the final tiebreak, and positions
//! are unique), so re-running selection over an unchanged waiting set always
//! yields the same entry. Selection is pure: it returns a candidate, it never
//! mutates anything.

use std::cmp::Ordering;

use crate::entry::{EntryState, QueueEntry};

/// Display/service order comparator: urgent before low, earlier check-in
/// before later within a tier
pub fn compare(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.checked_in_at.cmp(&b.checked_in_at))
        .then_with(|| a.position.cmp(&b.position))
}

/// The next entry to call, or `None` when nobody is waiting
///
/// An empty waiting set is an ordinary outcome, not an error.
pub fn select_next<'a, I>(entries: I) -> Option<&'a QueueEntry>
where
    I: IntoIterator<Item = &'a QueueEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.state == EntryState::Waiting)
        .min_by(|a, b| compare(a, b))
}

/// All waiting entries in service order
///
/// This is how live queue views are built; stored positions are arrival
/// identifiers, never trusted as display slots.
pub fn waiting_order<'a, I>(entries: I) -> Vec<&'a QueueEntry>
where
    I: IntoIterator<Item = &'a QueueEntry>,
{
    let mut waiting: Vec<&QueueEntry> = entries
        .into_iter()
        .filter(|e| e.state == EntryState::Waiting)
        .collect();
    waiting.sort_by(|a, b| compare(a, b));
    waiting
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntrySource, Priority};
    use crate::ids::{CustomerId, EntryId, ServiceId, SessionKey};
    use chrono::{Duration, Utc};

    fn entry(position: u32, priority: Priority, minutes_ago: i64) -> QueueEntry {
        let now = Utc::now();
        QueueEntry {
            id: EntryId::new(),
            session: SessionKey::new("loc-1", now.date_naive()),
            customer: CustomerId::from("cust"),
            service: ServiceId::from("svc"),
            appointment: None,
            staff: None,
            position,
            priority,
            source: EntrySource::WalkIn,
            state: EntryState::Waiting,
            checked_in_at: now - Duration::minutes(minutes_ago),
            called_at: None,
            service_started_at: None,
            service_ended_at: None,
            completed_at: None,
            estimated_wait_minutes: 0,
            estimated_service_minutes: 30,
            actual_wait_minutes: None,
            actual_service_minutes: None,
            estimate_history: Vec::new(),
            position_changes: Vec::new(),
            staff_notes: Vec::new(),
            cancellation: None,
        }
    }

    #[test]
    fn urgent_beats_earlier_normal() {
        let normal = entry(1, Priority::Normal, 60);
        let urgent = entry(2, Priority::Urgent, 1);
        let entries = [normal, urgent];
        let next = select_next(entries.iter()).unwrap();
        assert_eq!(next.position, 2);
    }

    #[test]
    fn earlier_check_in_wins_within_a_tier() {
        let late = entry(2, Priority::Normal, 5);
        let early = entry(1, Priority::Normal, 45);
        let entries = [late, early];
        assert_eq!(select_next(entries.iter()).unwrap().position, 1);
    }

    #[test]
    fn selection_is_idempotent_over_unchanged_set() {
        let entries = [
            entry(1, Priority::Normal, 30),
            entry(2, Priority::High, 20),
            entry(3, Priority::High, 10),
        ];
        let first = select_next(entries.iter()).unwrap().id;
        for _ in 0..5 {
            assert_eq!(select_next(entries.iter()).unwrap().id, first);
        }
    }

    #[test]
    fn non_waiting_entries_are_ignored() {
        let mut serving = entry(1, Priority::Urgent, 90);
        serving.state = EntryState::InService;
        let waiting = entry(2, Priority::Low, 5);
        let entries = [serving, waiting];
        assert_eq!(select_next(entries.iter()).unwrap().position, 2);

        let empty: [QueueEntry; 0] = [];
        assert!(select_next(empty.iter()).is_none());
    }

    #[test]
    fn waiting_order_sorts_by_tier_then_arrival() {
        let entries = [
            entry(1, Priority::Low, 90),
            entry(2, Priority::Urgent, 5),
            entry(3, Priority::Normal, 50),
            entry(4, Priority::Normal, 70),
        ];
        let order: Vec<u32> = waiting_order(entries.iter())
            .iter()
            .map(|e| e.position)
            .collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
    }
}
