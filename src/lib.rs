//! # Queue Engine
//!
//! Queue ordering and service lifecycle engine for walk-in and appointment
//! queues at multi-location service businesses.
//!
//! Each location runs one queue session per calendar day. The engine admits
//! customers up to a hard capacity bound, orders them by priority tier and
//! check-in time, binds staff members to at most one customer at a time, and
//! drives every entry through a closed lifecycle state machine. Finished
//! entries are never deleted; they stay in the session as history and feed
//! the daily statistics.
//!
//! ## Architecture
//!
//! - [`QueueEngine`] is the single entry point for commands. Every mutation
//!   against one session is serialized behind that session's own lock, while
//!   different sessions proceed fully in parallel.
//! - A mutation runs on a working copy, is persisted through the
//!   [`SessionStore`](store::SessionStore) port, then replaces the live copy.
//!   A storage failure aborts the whole command with nothing observable.
//! - Exactly one [`QueueEvent`](events::QueueEvent) is broadcast per committed
//!   mutation, strictly after commit. Subscribers can lag or vanish without
//!   affecting the queue.
//! - Time flows through the injectable [`Clock`](clock::Clock) port, so tests
//!   drive waits and session days deterministically.
//!
//! ## Example
//!
//! ```
//! use queue_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = QueueEngine::new(QueueEngineConfig::default())?;
//!
//! engine
//!     .add_staff("downtown", StaffMember::new("ana".into(), "Ana", chrono::Utc::now()))
//!     .await?;
//!
//! let entry = engine
//!     .admit("downtown", AdmitRequest {
//!         customer: "cust-42".into(),
//!         service: "haircut".into(),
//!         priority: Priority::Normal,
//!         source: EntrySource::WalkIn,
//!         appointment: None,
//!         estimated_service_minutes: None,
//!     })
//!     .await?;
//! println!("admitted at position {}", entry.position);
//!
//! if let Some(called) = engine.call_next("downtown", None).await? {
//!     engine
//!         .update_status(called.id, EntryEvent::Start { staff: None })
//!         .await?;
//!     engine
//!         .update_status(called.id, EntryEvent::Complete { actual_service_minutes: None })
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod estimator;
pub mod events;
pub mod ids;
pub mod selection;
pub mod session;
pub mod staff;
pub mod store;

pub use config::QueueEngineConfig;
pub use engine::{EngineStats, QueueEngine};
pub use error::{QueueError, Result};

/// Common imports for working with the queue engine
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::QueueEngineConfig;
    pub use crate::engine::{EngineStats, QueueEngine};
    pub use crate::entry::{
        EntryEvent, EntrySource, EntryState, Priority, QueueEntry,
    };
    pub use crate::error::{QueueError, Result};
    pub use crate::events::{QueueEvent, QueueEventKind};
    pub use crate::ids::{
        AppointmentId, CustomerId, EntryId, LocationId, ServiceId, SessionKey, StaffId,
    };
    pub use crate::session::{
        AdmitRequest, QueueSnapshot, SessionSettings, SessionStats, SessionStatus,
    };
    pub use crate::staff::{StaffMember, StaffRoster};
    pub use crate::store::{InMemoryStore, SessionStore};
}
