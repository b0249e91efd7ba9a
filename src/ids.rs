//! Strongly-typed identifiers used throughout the queue engine
//!
//! Customer and service identifiers are opaque to the core: they are carried
//! through snapshots and events but never validated here. Resolving them
//! against real records is the caller's responsibility before admission.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a queue entry (one customer visit attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        EntryId(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a business location operating its own daily queue
    LocationId
}

string_id! {
    /// Opaque customer reference (not validated by the core)
    CustomerId
}

string_id! {
    /// Opaque service reference (not validated by the core)
    ServiceId
}

string_id! {
    /// Identifier of a staff member rostered onto a session
    StaffId
}

string_id! {
    /// Opaque reference to an originating appointment, when an entry was
    /// derived from one
    AppointmentId
}

/// Key of one queue session: a location paired with a calendar day
///
/// All mutating operations against the same key are serialized; operations
/// against different keys proceed independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub location: LocationId,
    pub date: NaiveDate,
}

impl SessionKey {
    pub fn new(location: impl Into<LocationId>, date: NaiveDate) -> Self {
        SessionKey {
            location: location.into(),
            date,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.location, self.date)
    }
}
