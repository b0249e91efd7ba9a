use thiserror::Error;

use crate::entry::EntryState;
use crate::ids::{EntryId, SessionKey, StaffId};

/// Error types for queue engine operations
///
/// Every variant is recoverable at the caller boundary: capacity refusals and
/// assignment conflicts are ordinary user-facing outcomes, invalid transitions
/// are client errors, and storage failures abort the operation with no partial
/// state observable. Nothing here should crash the process, and the engine
/// never retries internally.
///
/// # Examples
///
/// ```
/// use queue_engine::{QueueError, Result};
///
/// fn admit_somewhere() -> Result<()> {
///     Err(QueueError::QueueFull)
/// }
///
/// match admit_somewhere() {
///     Err(QueueError::QueueFull) => println!("come back later"),
///     other => println!("{:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum QueueError {
    /// The session is at maximum capacity; admission is refused, not queued.
    ///
    /// User-facing and retryable once occupancy drops.
    #[error("Queue is at maximum capacity")]
    QueueFull,

    /// No session exists for this (location, date)
    ///
    /// Raised by any mutation other than admit; admission auto-creates the
    /// session instead.
    #[error("No queue session found for {0}")]
    SessionNotFound(SessionKey),

    /// The session has been closed and accepts no further admissions
    #[error("Queue session {0} is closed")]
    SessionClosed(SessionKey),

    /// The session is paused; admissions are temporarily blocked
    ///
    /// Entries already in progress are unaffected.
    #[error("Queue session {0} is paused")]
    SessionPaused(SessionKey),

    /// No entry with this id is known to the engine
    #[error("Queue entry {0} not found")]
    EntryNotFound(EntryId),

    /// The requested state change is not defined for the entry's current state
    ///
    /// This is a caller error, surfaced rather than silently coerced: the
    /// transition function is total over (state, event) and rejects every
    /// undefined combination.
    #[error("Invalid transition: {event} is not allowed from state {from}")]
    InvalidTransition {
        from: EntryState,
        event: &'static str,
    },

    /// The entry already reached a terminal state
    #[error("Queue entry {entry} is already terminal ({state})")]
    AlreadyTerminal { entry: EntryId, state: EntryState },

    /// The staff member is not on this session's roster
    #[error("Staff member {0} not found on the roster")]
    StaffNotFound(StaffId),

    /// The staff member is already bound to an entry
    #[error("Staff busy: {0}")]
    StaffBusy(String),

    /// The staff member is already on the roster
    #[error("Staff member {0} is already on the roster")]
    StaffAlreadyRostered(StaffId),

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The storage port reported a failure; the whole operation was aborted
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected internal errors that indicate a bug
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        // Unexpected errors from lower-level components map to Internal.
        Self::Internal(err.to_string())
    }
}

impl QueueError {
    /// Create a new StaffBusy error with the provided message
    pub fn staff_busy<S: Into<String>>(msg: S) -> Self {
        Self::StaffBusy(msg.into())
    }

    /// Create a new Configuration error with the provided message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Storage error with the provided message
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new Internal error with the provided message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for queue engine operations
pub type Result<T> = std::result::Result<T, QueueError>;
