//! Queue entries and their lifecycle
//!
//! A [`QueueEntry`] is one customer's single pass through a session: admitted
//! in `Waiting`, advanced only through the transitions in
//! [`state_machine::target_state`], and retained forever once terminal.

pub mod state_machine;
pub mod types;

pub use types::{Cancellation, EntrySource, EntryState, EstimateRecord, PositionChange, Priority};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AppointmentId, CustomerId, EntryId, ServiceId, SessionKey, StaffId};

/// Lifecycle event applied to an entry
///
/// Carries the parameters a transition needs; validity against the current
/// state is decided by [`state_machine::target_state`].
#[derive(Debug, Clone)]
pub enum EntryEvent {
    /// Call the customer up, binding a staff member
    Call { staff: StaffId },
    /// Begin service; optionally reassign to a different staff member
    Start { staff: Option<StaffId> },
    /// Finish service; duration is derived from the service-start stamp when
    /// not supplied
    Complete { actual_service_minutes: Option<u32> },
    /// The customer did not show up after being admitted or called
    NoShow,
    /// Cancel the entry with a reason
    Cancel { reason: String },
    /// Skip a called customer who is not ready; the seat stays held
    Skip { reason: String },
}

impl EntryEvent {
    /// Event name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            EntryEvent::Call { .. } => "call",
            EntryEvent::Start { .. } => "start",
            EntryEvent::Complete { .. } => "complete",
            EntryEvent::NoShow => "no_show",
            EntryEvent::Cancel { .. } => "cancel",
            EntryEvent::Skip { .. } => "skip",
        }
    }
}

/// One customer visit attempt in a session
///
/// `position` is a stable arrival-order identifier assigned once at admission
/// and never reused; live ordering for display is always recomputed with the
/// selection comparator, never read off stored positions. The frozen
/// `actual_wait_minutes` / `actual_service_minutes` fields are written exactly
/// once and never recomputed afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub session: SessionKey,
    pub customer: CustomerId,
    pub service: ServiceId,
    /// Originating appointment, when the entry was derived from one
    pub appointment: Option<AppointmentId>,
    /// Currently bound staff member; `Some` iff state is called or in_service
    pub staff: Option<StaffId>,
    /// Monotonic arrival number, unique within the session
    pub position: u32,
    pub priority: Priority,
    pub source: EntrySource,
    pub state: EntryState,

    pub checked_in_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub service_started_at: Option<DateTime<Utc>>,
    pub service_ended_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub estimated_wait_minutes: u32,
    pub estimated_service_minutes: u32,
    /// Frozen when the entry leaves `Waiting`; immutable afterwards
    pub actual_wait_minutes: Option<u32>,
    /// Frozen at completion; immutable afterwards
    pub actual_service_minutes: Option<u32>,

    /// Every estimate the entry has carried, oldest first
    pub estimate_history: Vec<EstimateRecord>,
    /// Audit trail of explicit position reassignments
    pub position_changes: Vec<PositionChange>,
    /// Staff-facing notes, e.g. skip reasons
    pub staff_notes: Vec<String>,
    /// Set when the entry was cancelled
    pub cancellation: Option<Cancellation>,
}

impl QueueEntry {
    /// Minutes the customer has been (or was) waiting
    ///
    /// For entries that already left `Waiting` this is the frozen actual
    /// wait; for live entries it is derived from the check-in stamp.
    pub fn current_wait_minutes(&self, now: DateTime<Utc>) -> u32 {
        if let Some(frozen) = self.actual_wait_minutes {
            return frozen;
        }
        elapsed_minutes(self.checked_in_at, now)
    }

    /// Whether the entry is waiting past its estimate plus the grace buffer
    pub fn is_overdue(&self, now: DateTime<Utc>, buffer_minutes: u32) -> bool {
        self.state == EntryState::Waiting
            && self.current_wait_minutes(now) > self.estimated_wait_minutes + buffer_minutes
    }

    /// Whether the entry still counts toward occupancy
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// Whole minutes between two instants, clamped at zero
pub(crate) fn elapsed_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    (to - from).num_minutes().max(0) as u32
}
