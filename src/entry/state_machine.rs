//! Total transition function for the entry lifecycle
//!
//! The transition table is closed: every (state, event) pair either maps to a
//! defined target state or is rejected with `InvalidTransition`. Nothing is
//! silently ignored. The function itself is pure; the session aggregate
//! applies the side effects (staff binding, capacity release, frozen
//! durations) once a transition is accepted.

use crate::error::{QueueError, Result};

use super::types::EntryState;
use super::EntryEvent;

/// Resolve the target state for applying `event` while in `from`
///
/// | From | Event | To |
/// |---|---|---|
/// | waiting | call | called |
/// | called | start | in_service |
/// | in_service | complete | completed |
/// | waiting, called | no_show | no_show |
/// | any non-terminal | cancel | cancelled |
/// | called | skip | skipped |
///
/// Everything else is an `InvalidTransition` error.
pub fn target_state(from: EntryState, event: &EntryEvent) -> Result<EntryState> {
    use EntryState::*;

    let to = match (from, event) {
        (Waiting, EntryEvent::Call { .. }) => Called,
        (Called, EntryEvent::Start { .. }) => InService,
        (InService, EntryEvent::Complete { .. }) => Completed,
        (Waiting, EntryEvent::NoShow) | (Called, EntryEvent::NoShow) => NoShow,
        (Waiting, EntryEvent::Cancel { .. })
        | (Called, EntryEvent::Cancel { .. })
        | (InService, EntryEvent::Cancel { .. }) => Cancelled,
        (Called, EntryEvent::Skip { .. }) => Skipped,
        (from, event) => {
            return Err(QueueError::InvalidTransition {
                from,
                event: event.name(),
            })
        }
    };

    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StaffId;

    fn call() -> EntryEvent {
        EntryEvent::Call {
            staff: StaffId::from("staff-1"),
        }
    }

    fn cancel() -> EntryEvent {
        EntryEvent::Cancel {
            reason: "test".to_string(),
        }
    }

    #[test]
    fn happy_path_is_accepted() {
        assert_eq!(
            target_state(EntryState::Waiting, &call()).unwrap(),
            EntryState::Called
        );
        assert_eq!(
            target_state(EntryState::Called, &EntryEvent::Start { staff: None }).unwrap(),
            EntryState::InService
        );
        assert_eq!(
            target_state(
                EntryState::InService,
                &EntryEvent::Complete {
                    actual_service_minutes: None
                }
            )
            .unwrap(),
            EntryState::Completed
        );
    }

    #[test]
    fn no_show_only_from_waiting_or_called() {
        assert_eq!(
            target_state(EntryState::Waiting, &EntryEvent::NoShow).unwrap(),
            EntryState::NoShow
        );
        assert_eq!(
            target_state(EntryState::Called, &EntryEvent::NoShow).unwrap(),
            EntryState::NoShow
        );
        assert!(target_state(EntryState::InService, &EntryEvent::NoShow).is_err());
    }

    #[test]
    fn cancel_rejected_once_terminal() {
        assert_eq!(
            target_state(EntryState::InService, &cancel()).unwrap(),
            EntryState::Cancelled
        );
        for terminal in [
            EntryState::Completed,
            EntryState::Cancelled,
            EntryState::NoShow,
            EntryState::Skipped,
        ] {
            assert!(matches!(
                target_state(terminal, &cancel()),
                Err(QueueError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn skip_only_from_called() {
        let skip = EntryEvent::Skip {
            reason: "stepped out".to_string(),
        };
        assert_eq!(
            target_state(EntryState::Called, &skip).unwrap(),
            EntryState::Skipped
        );
        assert!(target_state(EntryState::Waiting, &skip).is_err());
        assert!(target_state(EntryState::InService, &skip).is_err());
    }

    #[test]
    fn completing_a_waiting_entry_is_rejected() {
        let complete = EntryEvent::Complete {
            actual_service_minutes: Some(25),
        };
        let err = target_state(EntryState::Waiting, &complete).unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition {
                from: EntryState::Waiting,
                event: "complete"
            }
        ));
    }

    #[test]
    fn every_terminal_state_rejects_every_event() {
        let events = [
            call(),
            EntryEvent::Start { staff: None },
            EntryEvent::Complete {
                actual_service_minutes: None,
            },
            EntryEvent::NoShow,
            cancel(),
            EntryEvent::Skip {
                reason: "x".to_string(),
            },
        ];
        for terminal in [
            EntryState::Completed,
            EntryState::Cancelled,
            EntryState::NoShow,
            EntryState::Skipped,
        ] {
            for event in &events {
                assert!(target_state(terminal, event).is_err());
            }
        }
    }
}
