//! Core types for queue entries

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority tier of a queue entry
///
/// Selection always prefers the highest tier; check-in time only breaks ties
/// within a tier. The derived ordering is `Low < Normal < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" | "Low" => Ok(Priority::Low),
            "normal" | "Normal" => Ok(Priority::Normal),
            "high" | "High" => Ok(Priority::High),
            "urgent" | "Urgent" => Ok(Priority::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// How the customer entered the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Walked in off the street
    WalkIn,
    /// Derived from a booked appointment
    Appointment,
    /// Phoned ahead
    Phone,
    /// Booked through the online channel
    Online,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::WalkIn => write!(f, "walk_in"),
            EntrySource::Appointment => write!(f, "appointment"),
            EntrySource::Phone => write!(f, "phone"),
            EntrySource::Online => write!(f, "online"),
        }
    }
}

/// Lifecycle state of a queue entry
///
/// The happy path is `Waiting -> Called -> InService -> Completed`; the
/// failure exits are `NoShow`, `Cancelled` and `Skipped`. Terminal states are
/// retained forever for history, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Waiting,
    Called,
    InService,
    Completed,
    Cancelled,
    NoShow,
    Skipped,
}

impl EntryState {
    /// Whether this state ends the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryState::Completed | EntryState::Cancelled | EntryState::NoShow | EntryState::Skipped
        )
    }

    /// Whether the entry still counts toward session occupancy
    ///
    /// Note that `Skipped` is terminal but keeps its seat: the customer is
    /// still physically present pending the re-queue decision.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EntryState::Waiting | EntryState::Called | EntryState::InService
        )
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Waiting => write!(f, "waiting"),
            EntryState::Called => write!(f, "called"),
            EntryState::InService => write!(f, "in_service"),
            EntryState::Completed => write!(f, "completed"),
            EntryState::Cancelled => write!(f, "cancelled"),
            EntryState::NoShow => write!(f, "no_show"),
            EntryState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Audited record of a position reassignment
///
/// Positions are never overwritten silently; every change appends one of
/// these to the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionChange {
    pub from_position: u32,
    pub to_position: u32,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// One point in an entry's estimated-wait history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub estimated_wait_minutes: u32,
    pub at: DateTime<Utc>,
}

/// Details recorded when an entry is cancelled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub at: DateTime<Utc>,
}
