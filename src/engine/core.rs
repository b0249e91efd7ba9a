//! Engine orchestration core
//!
//! [`QueueEngine`] is the single entry point for every mutation. Each session
//! sits behind its own async mutex, so commands against one (location, day)
//! are strictly serialized while different sessions proceed fully in
//! parallel. A mutation runs on a working copy of the aggregate, is persisted
//! through the store port, and only then replaces the live copy; the matching
//! broadcast event goes out strictly after the swap.

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::QueueEngineConfig;
use crate::entry::{EntryEvent, QueueEntry};
use crate::error::{QueueError, Result};
use crate::events::{EventBroadcaster, QueueEvent, QueueEventKind};
use crate::ids::{EntryId, LocationId, SessionKey, StaffId};
use crate::session::{
    AdmitRequest, QueueSession, QueueSnapshot, SessionSettings, SessionStats,
};
use crate::staff::StaffMember;
use crate::store::{InMemoryStore, SessionStore};

/// Event details collected inside a mutation, emitted after commit
struct EventSeed {
    kind: QueueEventKind,
    entry: QueueEntry,
}

/// Engine-wide counters
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Sessions currently resident in memory
    pub active_sessions: usize,
    /// Entries known to the id index across all sessions
    pub indexed_entries: usize,
    /// Live event subscribers
    pub subscribers: usize,
}

/// Queue orchestration engine
///
/// # Examples
///
/// ```
/// use queue_engine::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let engine = QueueEngine::new(QueueEngineConfig::default())?;
///
/// engine
///     .add_staff("downtown", StaffMember::new("ana".into(), "Ana", chrono::Utc::now()))
///     .await?;
///
/// let entry = engine
///     .admit("downtown", AdmitRequest {
///         customer: "cust-42".into(),
///         service: "haircut".into(),
///         priority: Priority::Normal,
///         source: EntrySource::WalkIn,
///         appointment: None,
///         estimated_service_minutes: None,
///     })
///     .await?;
///
/// let called = engine.call_next("downtown", None).await?;
/// assert_eq!(called.map(|e| e.id), Some(entry.id));
/// # Ok(())
/// # }
/// ```
pub struct QueueEngine {
    config: QueueEngineConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SessionStore>,
    /// Live sessions, each behind its own writer lock
    sessions: DashMap<SessionKey, Arc<Mutex<QueueSession>>>,
    /// Entry id -> owning session, so entry-keyed commands skip a scan
    entry_index: DashMap<EntryId, SessionKey>,
    events: EventBroadcaster,
}

impl QueueEngine {
    /// Create an engine with the system clock and the in-memory store
    pub fn new(config: QueueEngineConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(InMemoryStore::new()))
    }

    /// Create an engine with explicit clock and store ports
    pub fn with_parts(
        config: QueueEngineConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        config.validate()?;
        let events = EventBroadcaster::new(config.events.channel_capacity);
        info!("🚀 Queue engine ready");
        Ok(QueueEngine {
            config,
            clock,
            store,
            sessions: DashMap::new(),
            entry_index: DashMap::new(),
            events,
        })
    }

    /// Open a subscription to the post-commit event stream
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &QueueEngineConfig {
        &self.config
    }

    // ========================================================================
    // Queue operations
    // ========================================================================

    /// Admit a customer to today's queue at `location`
    ///
    /// The session is created on first admission; every other command
    /// requires it to exist already.
    pub async fn admit(
        &self,
        location: impl Into<LocationId>,
        request: AdmitRequest,
    ) -> Result<QueueEntry> {
        let key = SessionKey::new(location.into(), self.clock.today());
        let now = self.clock.now();

        let entry = self
            .mutate(&key, true, |session| {
                let id = session.admit(request, now)?;
                let entry = session
                    .entry(&id)
                    .cloned()
                    .ok_or_else(|| QueueError::internal("admitted entry missing from session"))?;
                Ok((
                    entry.clone(),
                    Some(EventSeed {
                        kind: QueueEventKind::Admitted,
                        entry,
                    }),
                ))
            })
            .await?;

        self.entry_index.insert(entry.id, key);
        Ok(entry)
    }

    /// Call the next customer in today's queue at `location`
    ///
    /// `Ok(None)` means nobody is waiting.
    pub async fn call_next(
        &self,
        location: impl Into<LocationId>,
        staff: Option<StaffId>,
    ) -> Result<Option<QueueEntry>> {
        let key = SessionKey::new(location.into(), self.clock.today());
        let now = self.clock.now();

        self.mutate(&key, false, |session| {
            match session.call_next(staff, now)? {
                Some(id) => {
                    let entry = session
                        .entry(&id)
                        .cloned()
                        .ok_or_else(|| QueueError::internal("called entry missing from session"))?;
                    Ok((
                        Some(entry.clone()),
                        Some(EventSeed {
                            kind: QueueEventKind::Called,
                            entry,
                        }),
                    ))
                }
                None => Ok((None, None)),
            }
        })
        .await
    }

    /// Apply a lifecycle event to an entry anywhere in the engine
    pub async fn update_status(&self, entry_id: EntryId, event: EntryEvent) -> Result<QueueEntry> {
        let key = self.session_of(&entry_id)?;
        let now = self.clock.now();

        self.mutate(&key, false, |session| {
            session.apply_event(entry_id, event, now)?;
            let entry = session
                .entry(&entry_id)
                .cloned()
                .ok_or(QueueError::EntryNotFound(entry_id))?;
            Ok((
                entry.clone(),
                Some(EventSeed {
                    kind: QueueEventKind::StatusChanged,
                    entry,
                }),
            ))
        })
        .await
    }

    /// Take an entry out of the live queue
    ///
    /// The entry is cancelled and kept for history, never physically deleted.
    pub async fn remove(&self, entry_id: EntryId, reason: impl Into<String>) -> Result<()> {
        let key = self.session_of(&entry_id)?;
        let now = self.clock.now();
        let reason = reason.into();

        self.mutate(&key, false, |session| {
            session.remove(entry_id, reason, now)?;
            let entry = session
                .entry(&entry_id)
                .cloned()
                .ok_or(QueueError::EntryNotFound(entry_id))?;
            Ok((
                (),
                Some(EventSeed {
                    kind: QueueEventKind::Removed,
                    entry,
                }),
            ))
        })
        .await
    }

    /// Reassign an entry's position, leaving an audit record
    pub async fn update_position(
        &self,
        entry_id: EntryId,
        new_position: u32,
        reason: impl Into<String>,
    ) -> Result<QueueEntry> {
        let key = self.session_of(&entry_id)?;
        let now = self.clock.now();
        let reason = reason.into();

        self.mutate(&key, false, |session| {
            session.update_position(entry_id, new_position, reason, now)?;
            let entry = session
                .entry(&entry_id)
                .cloned()
                .ok_or(QueueError::EntryNotFound(entry_id))?;
            Ok((
                entry.clone(),
                Some(EventSeed {
                    kind: QueueEventKind::StatusChanged,
                    entry,
                }),
            ))
        })
        .await
    }

    // ========================================================================
    // Session administration
    // ========================================================================

    /// Pause admissions for today's session at `location`
    pub async fn pause(&self, location: impl Into<LocationId>) -> Result<()> {
        let key = SessionKey::new(location.into(), self.clock.today());
        self.mutate(&key, false, |session| session.pause().map(|_| ((), None)))
            .await
    }

    /// Resume admissions for today's session at `location`
    pub async fn resume(&self, location: impl Into<LocationId>) -> Result<()> {
        let key = SessionKey::new(location.into(), self.clock.today());
        self.mutate(&key, false, |session| session.resume().map(|_| ((), None)))
            .await
    }

    /// Close today's session at `location` for the day
    pub async fn close(&self, location: impl Into<LocationId>) -> Result<()> {
        let key = SessionKey::new(location.into(), self.clock.today());
        let now = self.clock.now();
        self.mutate(&key, false, |session| {
            session.close(now);
            Ok(((), None))
        })
        .await
    }

    /// Replace the tunable settings of today's session at `location`
    pub async fn update_settings(
        &self,
        location: impl Into<LocationId>,
        settings: SessionSettings,
    ) -> Result<()> {
        let key = SessionKey::new(location.into(), self.clock.today());
        self.mutate(&key, false, |session| {
            session.update_settings(settings).map(|_| ((), None))
        })
        .await
    }

    /// Roster a staff member onto today's session at `location`
    ///
    /// Creates the session if needed, so staff can be set up before the
    /// first customer arrives.
    pub async fn add_staff(
        &self,
        location: impl Into<LocationId>,
        member: StaffMember,
    ) -> Result<()> {
        let key = SessionKey::new(location.into(), self.clock.today());
        self.mutate(&key, true, |session| {
            session.add_staff(member).map(|_| ((), None))
        })
        .await
    }

    /// Toggle a rostered staff member's availability
    pub async fn set_staff_availability(
        &self,
        location: impl Into<LocationId>,
        staff: StaffId,
        available: bool,
    ) -> Result<()> {
        let key = SessionKey::new(location.into(), self.clock.today());
        self.mutate(&key, false, |session| {
            session
                .set_staff_availability(&staff, available)
                .map(|_| ((), None))
        })
        .await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Consistent snapshot of one session for display
    ///
    /// Pure read: never persists and never broadcasts.
    pub async fn snapshot(
        &self,
        location: impl Into<LocationId>,
        date: NaiveDate,
    ) -> Result<QueueSnapshot> {
        let key = SessionKey::new(location.into(), date);
        let slot = self.resolve(&key, false).await?;
        let session = slot.lock().await;
        Ok(session.snapshot(self.clock.now()))
    }

    /// Daily statistics for one session
    pub async fn stats(
        &self,
        location: impl Into<LocationId>,
        date: NaiveDate,
    ) -> Result<SessionStats> {
        let key = SessionKey::new(location.into(), date);
        let slot = self.resolve(&key, false).await?;
        let session = slot.lock().await;
        Ok(session.stats(self.clock.now()))
    }

    /// Engine-wide counters
    pub fn engine_stats(&self) -> EngineStats {
        EngineStats {
            active_sessions: self.sessions.len(),
            indexed_entries: self.entry_index.len(),
            subscribers: self.events.subscriber_count(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn session_of(&self, entry_id: &EntryId) -> Result<SessionKey> {
        self.entry_index
            .get(entry_id)
            .map(|key| key.clone())
            .ok_or(QueueError::EntryNotFound(*entry_id))
    }

    /// Find a session's lock slot, optionally creating the session
    ///
    /// A session absent from memory is first sought in the store, so an
    /// engine restarted over a durable store picks up where it left off.
    async fn resolve(
        &self,
        key: &SessionKey,
        create_if_missing: bool,
    ) -> Result<Arc<Mutex<QueueSession>>> {
        if let Some(slot) = self.sessions.get(key) {
            return Ok(slot.clone());
        }

        let session = match self.store.load(key).await? {
            Some(session) => session,
            None if create_if_missing => {
                debug!("🆕 Creating session {}", key);
                QueueSession::new(
                    key.clone(),
                    &self.config.session,
                    &self.config.estimator,
                    self.clock.now(),
                )
            }
            None => return Err(QueueError::SessionNotFound(key.clone())),
        };

        // Two tasks may race to insert; the first one wins and both use it.
        let slot = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone();
        Ok(slot)
    }

    /// Run one serialized mutation against a session
    ///
    /// The closure works on a private copy. Persisting that copy is the
    /// commit point: a store failure drops the copy and the live session is
    /// untouched. The event, if any, goes out only after the swap.
    async fn mutate<T, F>(&self, key: &SessionKey, create_if_missing: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut QueueSession) -> Result<(T, Option<EventSeed>)>,
    {
        let slot = self.resolve(key, create_if_missing).await?;
        let mut live = slot.lock().await;

        let mut working = live.clone();
        let (value, seed) = f(&mut working)?;
        self.store.save(&working).await?;

        let occupancy = working.occupancy();
        *live = working;
        drop(live);

        if let Some(seed) = seed {
            self.events.emit(QueueEvent {
                kind: seed.kind,
                entry: seed.entry,
                occupancy,
                timestamp: self.clock.now(),
            });
        }
        Ok(value)
    }
}
