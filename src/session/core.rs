//! The per-(location, day) session aggregate
//!
//! [`QueueSession`] owns everything that must change together: the entries,
//! the staff roster, the seat ledger, the estimator and the daily tallies.
//! It is a plain synchronous value; the engine serializes access to it and
//! handles persistence and broadcasting. Every mutating method either applies
//! completely or returns an error having touched nothing the engine will keep
//! (the engine mutates a working copy and swaps it in on success).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{EstimatorConfig, SessionDefaults};
use crate::entry::state_machine::target_state;
use crate::entry::{
    Cancellation, EntryEvent, EntrySource, EntryState, EstimateRecord, PositionChange, Priority,
    QueueEntry,
};
use crate::entry::elapsed_minutes;
use crate::error::{QueueError, Result};
use crate::estimator::WaitEstimator;
use crate::ids::{AppointmentId, CustomerId, EntryId, ServiceId, SessionKey, StaffId};
use crate::selection;
use crate::staff::{StaffMember, StaffRoster};

use super::capacity::CapacityLedger;

/// Operational state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Open for admissions
    Active,
    /// Admissions blocked; entries already in progress are unaffected
    Paused,
    /// Finished for the day; accepts no further admissions
    Closed,
}

/// Tunable per-session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_capacity: u32,
    pub auto_advance: bool,
    pub buffer_minutes: u32,
    pub max_wait_minutes: u32,
}

impl From<&SessionDefaults> for SessionSettings {
    fn from(defaults: &SessionDefaults) -> Self {
        SessionSettings {
            max_capacity: defaults.max_capacity,
            auto_advance: defaults.auto_advance,
            buffer_minutes: defaults.buffer_minutes,
            max_wait_minutes: defaults.max_wait_minutes,
        }
    }
}

/// Parameters for admitting one customer
#[derive(Debug, Clone)]
pub struct AdmitRequest {
    pub customer: CustomerId,
    pub service: ServiceId,
    pub priority: Priority,
    pub source: EntrySource,
    pub appointment: Option<AppointmentId>,
    pub estimated_service_minutes: Option<u32>,
}

/// One day's queue at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSession {
    pub key: SessionKey,
    pub status: SessionStatus,
    settings: SessionSettings,
    ledger: CapacityLedger,
    entries: Vec<QueueEntry>,
    roster: StaffRoster,
    estimator: WaitEstimator,
    /// Next arrival number to hand out; starts at 1, never reused
    next_position: u32,
    pub total_served: u32,
    pub total_no_shows: u32,
    pub total_cancelled: u32,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    default_service_minutes: u32,
}

impl QueueSession {
    pub fn new(
        key: SessionKey,
        defaults: &SessionDefaults,
        estimator: &EstimatorConfig,
        now: DateTime<Utc>,
    ) -> Self {
        QueueSession {
            key,
            status: SessionStatus::Active,
            settings: SessionSettings::from(defaults),
            ledger: CapacityLedger::new(defaults.max_capacity),
            entries: Vec::new(),
            roster: StaffRoster::new(),
            estimator: WaitEstimator::new(
                estimator.completion_window,
                defaults.default_service_minutes,
            ),
            next_position: 1,
            total_served: 0,
            total_no_shows: 0,
            total_cancelled: 0,
            created_at: now,
            closed_at: None,
            default_service_minutes: defaults.default_service_minutes,
        }
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Admit one customer, returning the new entry's id
    ///
    /// Refused outright when the session is paused, closed, or full; nothing
    /// is ever parked on an overflow list.
    pub fn admit(&mut self, request: AdmitRequest, now: DateTime<Utc>) -> Result<EntryId> {
        match self.status {
            SessionStatus::Active => {}
            SessionStatus::Paused => return Err(QueueError::SessionPaused(self.key.clone())),
            SessionStatus::Closed => return Err(QueueError::SessionClosed(self.key.clone())),
        }
        self.ledger.try_admit()?;

        let position = self.next_position;
        self.next_position += 1;

        // Entries at or above this priority that are still ahead of it.
        let ahead = self
            .entries
            .iter()
            .filter(|e| {
                matches!(e.state, EntryState::Waiting | EntryState::Called)
                    && e.priority >= request.priority
            })
            .count();
        let estimated_wait = self.estimator.estimate(ahead);

        let id = EntryId::new();
        let entry = QueueEntry {
            id,
            session: self.key.clone(),
            customer: request.customer,
            service: request.service,
            appointment: request.appointment,
            staff: None,
            position,
            priority: request.priority,
            source: request.source,
            state: EntryState::Waiting,
            checked_in_at: now,
            called_at: None,
            service_started_at: None,
            service_ended_at: None,
            completed_at: None,
            estimated_wait_minutes: estimated_wait,
            estimated_service_minutes: request
                .estimated_service_minutes
                .unwrap_or(self.default_service_minutes),
            actual_wait_minutes: None,
            actual_service_minutes: None,
            estimate_history: vec![EstimateRecord {
                estimated_wait_minutes: estimated_wait,
                at: now,
            }],
            position_changes: Vec::new(),
            staff_notes: Vec::new(),
            cancellation: None,
        };

        info!(
            "📋 Admitted entry {} to {} at position {} ({} min estimated)",
            id, self.key, position, estimated_wait
        );
        self.entries.push(entry);
        self.refresh_estimates(now);
        Ok(id)
    }

    // ========================================================================
    // Calling and lifecycle transitions
    // ========================================================================

    /// Call the next waiting customer, binding a staff member
    ///
    /// `staff` names a specific member; `None` picks the first free member in
    /// roster order. An empty waiting set returns `Ok(None)` and changes
    /// nothing.
    pub fn call_next(
        &mut self,
        staff: Option<StaffId>,
        now: DateTime<Utc>,
    ) -> Result<Option<EntryId>> {
        // A named staff member must exist regardless of queue depth, so a bad
        // id is reported rather than swallowed by the empty-queue result.
        if let Some(id) = &staff {
            if self.roster.get(id).is_none() {
                return Err(QueueError::StaffNotFound(id.clone()));
            }
        }

        let Some(next) = selection::select_next(self.entries.iter()) else {
            return Ok(None);
        };
        let entry_id = next.id;

        let staff_id = match staff {
            Some(id) => id,
            None => match self.roster.first_free() {
                Some(member) => member.id.clone(),
                None => {
                    return Err(QueueError::staff_busy(
                        "no staff member is free to take the next customer",
                    ))
                }
            },
        };

        self.apply_event(entry_id, EntryEvent::Call { staff: staff_id }, now)?;
        Ok(Some(entry_id))
    }

    /// Apply a lifecycle event to an entry
    ///
    /// Validates the transition first, then performs the side effects in one
    /// pass: staff binding/release, seat release, frozen durations, tallies,
    /// estimator feed. Rejected transitions change nothing.
    pub fn apply_event(
        &mut self,
        entry_id: EntryId,
        event: EntryEvent,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or(QueueError::EntryNotFound(entry_id))?;

        let from = self.entries[index].state;
        let to = target_state(from, &event)?;
        let bound_staff = self.entries[index].staff.clone();
        let checked_in_at = self.entries[index].checked_in_at;
        let service_started_at = self.entries[index].service_started_at;

        match &event {
            EntryEvent::Call { staff } => {
                self.roster.assign(staff, entry_id)?;
                let entry = &mut self.entries[index];
                entry.staff = Some(staff.clone());
                entry.called_at = Some(now);
                if entry.actual_wait_minutes.is_none() {
                    entry.actual_wait_minutes = Some(elapsed_minutes(checked_in_at, now));
                }
                info!("📞 Called entry {} to staff {}", entry_id, staff);
            }
            EntryEvent::Start { staff } => {
                if let Some(new_staff) = staff {
                    if Some(new_staff) != bound_staff.as_ref() {
                        if let Some(old) = &bound_staff {
                            self.roster.release(old, false)?;
                        }
                        self.roster.assign(new_staff, entry_id)?;
                        self.entries[index].staff = Some(new_staff.clone());
                    }
                }
                self.entries[index].service_started_at = Some(now);
                debug!("💈 Service started for entry {}", entry_id);
            }
            EntryEvent::Complete {
                actual_service_minutes,
            } => {
                let service_minutes = actual_service_minutes
                    .or_else(|| service_started_at.map(|start| elapsed_minutes(start, now)))
                    .unwrap_or(0);
                if let Some(staff) = &bound_staff {
                    self.roster.release(staff, true)?;
                }
                self.ledger.release();
                self.total_served += 1;
                self.estimator.record_completion(service_minutes);

                let entry = &mut self.entries[index];
                entry.staff = None;
                entry.service_ended_at = Some(now);
                entry.completed_at = Some(now);
                entry.actual_service_minutes = Some(service_minutes);
                info!(
                    "✅ Completed entry {} ({} min of service)",
                    entry_id, service_minutes
                );
            }
            EntryEvent::NoShow => {
                if let Some(staff) = &bound_staff {
                    self.roster.release(staff, false)?;
                }
                self.ledger.release();
                self.total_no_shows += 1;

                let entry = &mut self.entries[index];
                entry.staff = None;
                entry.completed_at = Some(now);
                if entry.actual_wait_minutes.is_none() {
                    entry.actual_wait_minutes = Some(elapsed_minutes(checked_in_at, now));
                }
                info!("👻 Entry {} marked as a no-show", entry_id);
            }
            EntryEvent::Cancel { reason } => {
                if let Some(staff) = &bound_staff {
                    self.roster.release(staff, false)?;
                }
                self.ledger.release();
                self.total_cancelled += 1;

                let entry = &mut self.entries[index];
                entry.staff = None;
                entry.completed_at = Some(now);
                entry.cancellation = Some(Cancellation {
                    reason: reason.clone(),
                    at: now,
                });
                if entry.actual_wait_minutes.is_none() {
                    entry.actual_wait_minutes = Some(elapsed_minutes(checked_in_at, now));
                }
                info!("🚫 Cancelled entry {}: {}", entry_id, reason);
            }
            EntryEvent::Skip { reason } => {
                // The seat stays held: the customer is still on premises
                // pending a re-queue decision, so no ledger release here.
                if let Some(staff) = &bound_staff {
                    self.roster.release(staff, false)?;
                }
                let entry = &mut self.entries[index];
                entry.staff = None;
                entry.staff_notes.push(format!("skipped: {}", reason));
                info!("⏭️ Skipped entry {}: {}", entry_id, reason);
            }
        }

        self.entries[index].state = to;
        self.refresh_estimates(now);
        Ok(())
    }

    /// Cancel an entry on behalf of a removal request
    ///
    /// Removal never deletes: the entry is cancelled and retained. Asking to
    /// remove an already-finished entry is a distinct error so callers can
    /// tell "gone" apart from "bad transition".
    pub fn remove(&mut self, entry_id: EntryId, reason: String, now: DateTime<Utc>) -> Result<()> {
        let entry = self
            .entry(&entry_id)
            .ok_or(QueueError::EntryNotFound(entry_id))?;
        if entry.state.is_terminal() {
            return Err(QueueError::AlreadyTerminal {
                entry: entry_id,
                state: entry.state,
            });
        }
        self.apply_event(entry_id, EntryEvent::Cancel { reason }, now)
    }

    /// Reassign an entry's position, leaving an audit record
    pub fn update_position(
        &mut self,
        entry_id: EntryId,
        new_position: u32,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or(QueueError::EntryNotFound(entry_id))?;
        if self.entries[index].state.is_terminal() {
            return Err(QueueError::AlreadyTerminal {
                entry: entry_id,
                state: self.entries[index].state,
            });
        }

        let entry = &mut self.entries[index];
        let from_position = entry.position;
        entry.position_changes.push(PositionChange {
            from_position,
            to_position: new_position,
            reason,
            at: now,
        });
        entry.position = new_position;
        debug!(
            "🔀 Moved entry {} from position {} to {}",
            entry_id, from_position, new_position
        );
        self.refresh_estimates(now);
        Ok(())
    }

    // ========================================================================
    // Session administration
    // ========================================================================

    pub fn pause(&mut self) -> Result<()> {
        if self.status == SessionStatus::Closed {
            return Err(QueueError::SessionClosed(self.key.clone()));
        }
        self.status = SessionStatus::Paused;
        info!("⏸️ Paused session {}", self.key);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.status == SessionStatus::Closed {
            return Err(QueueError::SessionClosed(self.key.clone()));
        }
        self.status = SessionStatus::Active;
        info!("▶️ Resumed session {}", self.key);
        Ok(())
    }

    /// Close the session for the day
    ///
    /// Idempotent; entries already in progress can still be driven to their
    /// terminal states afterwards.
    pub fn close(&mut self, now: DateTime<Utc>) {
        if self.status != SessionStatus::Closed {
            self.status = SessionStatus::Closed;
            self.closed_at = Some(now);
            info!("🔚 Closed session {}", self.key);
        }
    }

    /// Replace the tunable settings
    ///
    /// Shrinking capacity below current occupancy only blocks admissions;
    /// nobody is evicted.
    pub fn update_settings(&mut self, settings: SessionSettings) -> Result<()> {
        if !(1..=200).contains(&settings.max_capacity) {
            return Err(QueueError::configuration(format!(
                "max_capacity must be between 1 and 200, got {}",
                settings.max_capacity
            )));
        }
        self.ledger.set_max_capacity(settings.max_capacity);
        self.settings = settings;
        Ok(())
    }

    pub fn add_staff(&mut self, member: StaffMember) -> Result<()> {
        self.roster.add(member)
    }

    pub fn set_staff_availability(&mut self, staff: &StaffId, available: bool) -> Result<()> {
        self.roster.set_availability(staff, available)
    }

    // ========================================================================
    // Projections
    // ========================================================================

    pub fn occupancy(&self) -> u32 {
        self.ledger.occupied()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn roster(&self) -> &StaffRoster {
        &self.roster
    }

    pub fn entry(&self, id: &EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == *id)
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Number of entries the occupancy ledger should agree with
    pub fn active_entry_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active()).count()
    }

    /// Consistent read of the whole session for display
    pub fn snapshot(&self, now: DateTime<Utc>) -> QueueSnapshot {
        let waiting = selection::waiting_order(self.entries.iter());
        let mut in_progress: Vec<&QueueEntry> = self
            .entries
            .iter()
            .filter(|e| matches!(e.state, EntryState::Called | EntryState::InService))
            .collect();
        in_progress.sort_by_key(|e| e.called_at);

        QueueSnapshot {
            key: self.key.clone(),
            status: self.status,
            occupancy: self.ledger.occupied(),
            max_capacity: self.ledger.max_capacity(),
            auto_advance: self.settings.auto_advance,
            in_progress: in_progress.into_iter().cloned().collect(),
            waiting: waiting.into_iter().cloned().collect(),
            staff: self.roster.members().to_vec(),
            stats: self.stats(now),
        }
    }

    /// Daily statistics projection
    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        let waiting = self
            .entries
            .iter()
            .filter(|e| e.state == EntryState::Waiting)
            .count() as u32;
        let in_service = self
            .entries
            .iter()
            .filter(|e| e.state == EntryState::InService)
            .count() as u32;
        let overdue = self
            .entries
            .iter()
            .filter(|e| e.is_overdue(now, self.settings.buffer_minutes))
            .count() as u32;

        let finished = self.total_served + self.total_no_shows + self.total_cancelled;
        let ratio = |part: u32| {
            if finished == 0 {
                0.0
            } else {
                f64::from(part) / f64::from(finished) * 100.0
            }
        };

        let max = self.ledger.max_capacity();
        SessionStats {
            waiting,
            in_service,
            overdue,
            total_served: self.total_served,
            total_no_shows: self.total_no_shows,
            total_cancelled: self.total_cancelled,
            available_spots: max.saturating_sub(self.ledger.occupied()),
            is_full: self.ledger.is_full(),
            utilization_percentage: if max == 0 {
                0.0
            } else {
                f64::from(self.ledger.occupied()) / f64::from(max) * 100.0
            },
            success_rate: ratio(self.total_served),
            no_show_rate: ratio(self.total_no_shows),
            average_service_minutes: self.estimator.average_service_minutes(),
        }
    }

    /// Recompute advisory wait estimates for all waiting entries
    ///
    /// Uses the same counting rule as admission: entries still in waiting or
    /// called at this entry's priority or above, with ties inside a tier
    /// broken by earlier arrival. A changed value appends to the entry's
    /// estimate history; unchanged values leave no record, so the estimate
    /// computed at admission stands until the queue actually moves.
    fn refresh_estimates(&mut self, now: DateTime<Utc>) {
        // (id, entries ahead) for every waiting entry.
        let updates: Vec<(EntryId, usize)> = self
            .entries
            .iter()
            .filter(|e| e.state == EntryState::Waiting)
            .map(|e| {
                let ahead = self
                    .entries
                    .iter()
                    .filter(|other| {
                        other.id != e.id
                            && matches!(other.state, EntryState::Waiting | EntryState::Called)
                            && (other.priority > e.priority
                                || (other.priority == e.priority
                                    && (other.checked_in_at, other.position)
                                        < (e.checked_in_at, e.position)))
                    })
                    .count();
                (e.id, ahead)
            })
            .collect();

        for (id, ahead) in updates {
            let estimate = self.estimator.estimate(ahead);
            let entry = self
                .entries
                .iter_mut()
                .find(|e| e.id == id)
                .expect("entry disappeared during estimate refresh");
            if entry.estimated_wait_minutes != estimate {
                entry.estimated_wait_minutes = estimate;
                entry.estimate_history.push(EstimateRecord {
                    estimated_wait_minutes: estimate,
                    at: now,
                });
            }
        }
    }
}

/// Display-ready view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub key: SessionKey,
    pub status: SessionStatus,
    pub occupancy: u32,
    pub max_capacity: u32,
    pub auto_advance: bool,
    /// Called and in-service entries, oldest call first
    pub in_progress: Vec<QueueEntry>,
    /// Waiting entries in service order
    pub waiting: Vec<QueueEntry>,
    pub staff: Vec<StaffMember>,
    pub stats: SessionStats,
}

/// Daily numbers for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub waiting: u32,
    pub in_service: u32,
    /// Waiting entries past their estimate plus the grace buffer
    pub overdue: u32,
    pub total_served: u32,
    pub total_no_shows: u32,
    pub total_cancelled: u32,
    pub available_spots: u32,
    pub is_full: bool,
    pub utilization_percentage: f64,
    /// Share of finished entries that completed service
    pub success_rate: f64,
    pub no_show_rate: f64,
    pub average_service_minutes: f64,
}
