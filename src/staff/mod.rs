//! Session staff roster
//!
//! Tracks which staff members work a session, whether each is free, which
//! entry each is currently bound to, and a per-day served tally. A staff
//! member serves at most one entry at a time; a second bind attempt is
//! refused with `StaffBusy`, never queued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QueueError, Result};
use crate::ids::{EntryId, StaffId};

/// One rostered staff member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub name: String,
    /// Manually toggled availability; an unavailable member is never
    /// auto-selected and refuses explicit binds
    pub available: bool,
    /// Entry this member is currently serving, if any
    pub current_entry: Option<EntryId>,
    /// Completions credited to this member today
    pub served_today: u32,
    pub rostered_at: DateTime<Utc>,
}

impl StaffMember {
    pub fn new(id: StaffId, name: impl Into<String>, rostered_at: DateTime<Utc>) -> Self {
        StaffMember {
            id,
            name: name.into(),
            available: true,
            current_entry: None,
            served_today: 0,
            rostered_at,
        }
    }

    /// Free to take a customer right now
    pub fn is_free(&self) -> bool {
        self.available && self.current_entry.is_none()
    }
}

/// Ordered roster of a session's staff
///
/// Roster order matters: when no staff member is named explicitly, the first
/// free member in roster order is picked, which keeps auto-assignment
/// deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffRoster {
    members: Vec<StaffMember>,
}

impl StaffRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member to the end of the roster
    pub fn add(&mut self, member: StaffMember) -> Result<()> {
        if self.members.iter().any(|m| m.id == member.id) {
            return Err(QueueError::StaffAlreadyRostered(member.id));
        }
        debug!("👤 Rostered staff member {} ({})", member.id, member.name);
        self.members.push(member);
        Ok(())
    }

    pub fn get(&self, id: &StaffId) -> Option<&StaffMember> {
        self.members.iter().find(|m| &m.id == id)
    }

    fn get_mut(&mut self, id: &StaffId) -> Option<&mut StaffMember> {
        self.members.iter_mut().find(|m| &m.id == id)
    }

    /// Toggle a member's availability flag
    ///
    /// Going unavailable does not unbind a current entry; the member simply
    /// stops being eligible for new binds.
    pub fn set_availability(&mut self, id: &StaffId, available: bool) -> Result<()> {
        let member = self
            .get_mut(id)
            .ok_or_else(|| QueueError::StaffNotFound(id.clone()))?;
        member.available = available;
        Ok(())
    }

    /// Bind a member to an entry
    pub fn assign(&mut self, id: &StaffId, entry: EntryId) -> Result<()> {
        let member = self
            .get_mut(id)
            .ok_or_else(|| QueueError::StaffNotFound(id.clone()))?;
        if let Some(current) = member.current_entry {
            return Err(QueueError::staff_busy(format!(
                "staff member {} is already serving entry {}",
                member.id, current
            )));
        }
        if !member.available {
            return Err(QueueError::staff_busy(format!(
                "staff member {} is marked unavailable",
                member.id
            )));
        }
        member.current_entry = Some(entry);
        debug!("🔒 Bound staff member {} to entry {}", id, entry);
        Ok(())
    }

    /// Unbind a member from their current entry
    ///
    /// `served` credits the member's daily tally, so it is set only when the
    /// release follows a completion.
    pub fn release(&mut self, id: &StaffId, served: bool) -> Result<()> {
        let member = self
            .get_mut(id)
            .ok_or_else(|| QueueError::StaffNotFound(id.clone()))?;
        member.current_entry = None;
        if served {
            member.served_today += 1;
        }
        debug!("🔓 Released staff member {}", id);
        Ok(())
    }

    /// First free member in roster order
    pub fn first_free(&self) -> Option<&StaffMember> {
        self.members.iter().find(|m| m.is_free())
    }

    pub fn members(&self) -> &[StaffMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_of(ids: &[&str]) -> StaffRoster {
        let mut roster = StaffRoster::new();
        for id in ids {
            roster
                .add(StaffMember::new(StaffId::from(*id), *id, Utc::now()))
                .unwrap();
        }
        roster
    }

    #[test]
    fn duplicate_roster_entry_is_refused() {
        let mut roster = roster_of(&["ana"]);
        let err = roster
            .add(StaffMember::new(StaffId::from("ana"), "Ana", Utc::now()))
            .unwrap_err();
        assert!(matches!(err, QueueError::StaffAlreadyRostered(_)));
    }

    #[test]
    fn double_assign_is_refused_with_staff_busy() {
        let mut roster = roster_of(&["ana"]);
        let ana = StaffId::from("ana");
        roster.assign(&ana, EntryId::new()).unwrap();
        let err = roster.assign(&ana, EntryId::new()).unwrap_err();
        assert!(matches!(err, QueueError::StaffBusy(_)));
    }

    #[test]
    fn unavailable_member_refuses_binds_and_auto_selection() {
        let mut roster = roster_of(&["ana", "ben"]);
        roster.set_availability(&StaffId::from("ana"), false).unwrap();
        assert!(matches!(
            roster.assign(&StaffId::from("ana"), EntryId::new()),
            Err(QueueError::StaffBusy(_))
        ));
        assert_eq!(roster.first_free().unwrap().id, StaffId::from("ben"));
    }

    #[test]
    fn release_only_credits_served_on_completion() {
        let mut roster = roster_of(&["ana"]);
        let ana = StaffId::from("ana");

        roster.assign(&ana, EntryId::new()).unwrap();
        roster.release(&ana, false).unwrap();
        assert_eq!(roster.get(&ana).unwrap().served_today, 0);

        roster.assign(&ana, EntryId::new()).unwrap();
        roster.release(&ana, true).unwrap();
        assert_eq!(roster.get(&ana).unwrap().served_today, 1);
        assert!(roster.get(&ana).unwrap().is_free());
    }

    #[test]
    fn first_free_follows_roster_order() {
        let mut roster = roster_of(&["ana", "ben", "cal"]);
        roster.assign(&StaffId::from("ana"), EntryId::new()).unwrap();
        assert_eq!(roster.first_free().unwrap().id, StaffId::from("ben"));
    }
}
