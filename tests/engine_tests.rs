//! Integration tests for the queue engine
//!
//! Each test builds a fresh engine over a manual clock and an in-memory
//! store, so waits and session days are fully deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serial_test::serial;
use tokio::sync::broadcast::error::TryRecvError;

use queue_engine::prelude::*;

const LOC: &str = "downtown";

fn engine_with_capacity(capacity: u32) -> (QueueEngine, Arc<ManualClock>) {
    let mut config = QueueEngineConfig::default();
    config.session.max_capacity = capacity;
    let start = Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let engine = QueueEngine::with_parts(config, clock.clone(), Arc::new(InMemoryStore::new()))
        .expect("engine should build");
    (engine, clock)
}

fn walk_in(customer: &str, priority: Priority) -> AdmitRequest {
    AdmitRequest {
        customer: customer.into(),
        service: "haircut".into(),
        priority,
        source: EntrySource::WalkIn,
        appointment: None,
        estimated_service_minutes: None,
    }
}

async fn roster(engine: &QueueEngine, clock: &ManualClock, ids: &[&str]) {
    for id in ids {
        engine
            .add_staff(LOC, StaffMember::new((*id).into(), *id, clock.now()))
            .await
            .expect("staff should roster");
    }
}

#[tokio::test]
#[serial]
async fn occupancy_always_matches_active_entries() {
    let (engine, clock) = engine_with_capacity(10);
    roster(&engine, &clock, &["ana"]).await;

    let a = engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    let b = engine.admit(LOC, walk_in("b", Priority::Normal)).await.unwrap();
    engine.admit(LOC, walk_in("c", Priority::Normal)).await.unwrap();

    let check = |snap: &QueueSnapshot| {
        assert_eq!(
            snap.occupancy as usize,
            snap.waiting.len() + snap.in_progress.len()
        );
    };

    let snap = engine.snapshot(LOC, clock.today()).await.unwrap();
    assert_eq!(snap.occupancy, 3);
    check(&snap);

    engine.call_next(LOC, None).await.unwrap();
    check(&engine.snapshot(LOC, clock.today()).await.unwrap());

    engine
        .update_status(a.id, EntryEvent::Start { staff: None })
        .await
        .unwrap();
    engine
        .update_status(
            a.id,
            EntryEvent::Complete {
                actual_service_minutes: Some(20),
            },
        )
        .await
        .unwrap();
    let snap = engine.snapshot(LOC, clock.today()).await.unwrap();
    assert_eq!(snap.occupancy, 2);
    check(&snap);

    engine.remove(b.id, "left").await.unwrap();
    let snap = engine.snapshot(LOC, clock.today()).await.unwrap();
    assert_eq!(snap.occupancy, 1);
    check(&snap);
}

#[tokio::test]
#[serial]
async fn admission_past_capacity_returns_queue_full() {
    let (engine, _clock) = engine_with_capacity(3);

    for i in 0..3 {
        engine
            .admit(LOC, walk_in(&format!("cust-{i}"), Priority::Normal))
            .await
            .unwrap();
    }
    let err = engine
        .admit(LOC, walk_in("overflow", Priority::Normal))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::QueueFull));
}

#[tokio::test]
#[serial]
async fn positions_are_strictly_increasing_and_gapless() {
    let (engine, _clock) = engine_with_capacity(20);

    let mut positions = Vec::new();
    for i in 0..4 {
        let entry = engine
            .admit(LOC, walk_in(&format!("cust-{i}"), Priority::Normal))
            .await
            .unwrap();
        positions.push((entry.id, entry.position));
    }

    // Cancelling frees the seat but never the arrival number.
    engine.remove(positions[1].0, "changed plans").await.unwrap();
    let late = engine.admit(LOC, walk_in("late", Priority::Normal)).await.unwrap();
    positions.push((late.id, late.position));

    let numbers: Vec<u32> = positions.iter().map(|(_, p)| *p).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
#[serial]
async fn urgent_admitted_last_is_called_first() {
    let (engine, clock) = engine_with_capacity(20);
    roster(&engine, &clock, &["ana"]).await;

    for i in 0..10 {
        engine
            .admit(LOC, walk_in(&format!("cust-{i}"), Priority::Normal))
            .await
            .unwrap();
        clock.advance(Duration::minutes(1));
    }
    let urgent = engine.admit(LOC, walk_in("vip", Priority::Urgent)).await.unwrap();

    let called = engine.call_next(LOC, None).await.unwrap().unwrap();
    assert_eq!(called.id, urgent.id);
    assert_eq!(called.state, EntryState::Called);
    assert_eq!(called.staff, Some(StaffId::from("ana")));
}

#[tokio::test]
#[serial]
async fn second_bind_to_a_busy_staff_member_is_refused() {
    let (engine, clock) = engine_with_capacity(10);
    roster(&engine, &clock, &["ana"]).await;

    engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    engine.admit(LOC, walk_in("b", Priority::Normal)).await.unwrap();

    engine
        .call_next(LOC, Some(StaffId::from("ana")))
        .await
        .unwrap()
        .unwrap();
    let err = engine
        .call_next(LOC, Some(StaffId::from("ana")))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::StaffBusy(_)));

    let err = engine
        .call_next(LOC, Some(StaffId::from("nobody")))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::StaffNotFound(_)));
}

#[tokio::test]
#[serial]
async fn actual_wait_is_frozen_at_call_time() {
    let (engine, clock) = engine_with_capacity(10);
    roster(&engine, &clock, &["ana"]).await;

    let entry = engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    assert_eq!(entry.actual_wait_minutes, None);

    clock.advance(Duration::minutes(18));
    let called = engine.call_next(LOC, None).await.unwrap().unwrap();
    assert_eq!(called.actual_wait_minutes, Some(18));

    clock.advance(Duration::hours(2));
    let started = engine
        .update_status(entry.id, EntryEvent::Start { staff: None })
        .await
        .unwrap();
    clock.advance(Duration::minutes(25));
    let completed = engine
        .update_status(
            entry.id,
            EntryEvent::Complete {
                actual_service_minutes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(started.actual_wait_minutes, Some(18));
    assert_eq!(completed.actual_wait_minutes, Some(18));
    assert_eq!(completed.actual_service_minutes, Some(25));
}

#[tokio::test]
#[serial]
async fn full_day_at_capacity_two() {
    let (engine, clock) = engine_with_capacity(2);
    roster(&engine, &clock, &["ana"]).await;

    let _a = engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    let b = engine.admit(LOC, walk_in("b", Priority::Urgent)).await.unwrap();
    assert_eq!(
        engine.snapshot(LOC, clock.today()).await.unwrap().occupancy,
        2
    );

    let err = engine.admit(LOC, walk_in("c", Priority::Normal)).await.unwrap_err();
    assert!(matches!(err, QueueError::QueueFull));

    let called = engine.call_next(LOC, None).await.unwrap().unwrap();
    assert_eq!(called.id, b.id);

    engine
        .update_status(b.id, EntryEvent::Start { staff: None })
        .await
        .unwrap();
    clock.advance(Duration::minutes(30));
    engine
        .update_status(
            b.id,
            EntryEvent::Complete {
                actual_service_minutes: None,
            },
        )
        .await
        .unwrap();

    let stats = engine.stats(LOC, clock.today()).await.unwrap();
    assert_eq!(stats.total_served, 1);

    let snap = engine.snapshot(LOC, clock.today()).await.unwrap();
    assert_eq!(snap.occupancy, 1);
    assert_eq!(snap.staff[0].served_today, 1);

    engine.admit(LOC, walk_in("c", Priority::Normal)).await.unwrap();
}

#[tokio::test]
#[serial]
async fn paused_and_closed_sessions_refuse_admissions() {
    let (engine, _clock) = engine_with_capacity(10);
    engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();

    engine.pause(LOC).await.unwrap();
    assert!(matches!(
        engine.admit(LOC, walk_in("b", Priority::Normal)).await,
        Err(QueueError::SessionPaused(_))
    ));

    engine.resume(LOC).await.unwrap();
    engine.admit(LOC, walk_in("b", Priority::Normal)).await.unwrap();

    engine.close(LOC).await.unwrap();
    assert!(matches!(
        engine.admit(LOC, walk_in("c", Priority::Normal)).await,
        Err(QueueError::SessionClosed(_))
    ));
}

#[tokio::test]
#[serial]
async fn commands_against_a_missing_session_fail_cleanly() {
    let (engine, _clock) = engine_with_capacity(10);

    assert!(matches!(
        engine.call_next(LOC, None).await,
        Err(QueueError::SessionNotFound(_))
    ));
    assert!(matches!(
        engine.pause(LOC).await,
        Err(QueueError::SessionNotFound(_))
    ));
    assert!(matches!(
        engine.update_status(EntryId::new(), EntryEvent::NoShow).await,
        Err(QueueError::EntryNotFound(_))
    ));
}

#[tokio::test]
#[serial]
async fn position_reassignment_is_audited() {
    let (engine, _clock) = engine_with_capacity(10);

    let entry = engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    let moved = engine
        .update_position(entry.id, 9, "front desk correction")
        .await
        .unwrap();

    assert_eq!(moved.position, 9);
    assert_eq!(moved.position_changes.len(), 1);
    assert_eq!(moved.position_changes[0].from_position, 1);
    assert_eq!(moved.position_changes[0].to_position, 9);
    assert_eq!(moved.position_changes[0].reason, "front desk correction");
}

#[tokio::test]
#[serial]
async fn every_committed_mutation_broadcasts_exactly_one_event() {
    let (engine, clock) = engine_with_capacity(10);
    roster(&engine, &clock, &["ana"]).await;
    let mut rx = engine.subscribe();

    let a = engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    engine.call_next(LOC, None).await.unwrap();
    engine
        .update_status(a.id, EntryEvent::Start { staff: None })
        .await
        .unwrap();
    engine
        .update_status(
            a.id,
            EntryEvent::Complete {
                actual_service_minutes: Some(15),
            },
        )
        .await
        .unwrap();

    // Reads and session admin are silent.
    engine.snapshot(LOC, clock.today()).await.unwrap();
    engine.pause(LOC).await.unwrap();

    let kinds: Vec<QueueEventKind> = [
        rx.try_recv().unwrap().kind,
        rx.try_recv().unwrap().kind,
        rx.try_recv().unwrap().kind,
        rx.try_recv().unwrap().kind,
    ]
    .to_vec();
    assert_eq!(
        kinds,
        vec![
            QueueEventKind::Admitted,
            QueueEventKind::Called,
            QueueEventKind::StatusChanged,
            QueueEventKind::StatusChanged,
        ]
    );
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
#[serial]
async fn calling_an_empty_queue_is_not_an_error() {
    let (engine, clock) = engine_with_capacity(10);
    roster(&engine, &clock, &["ana"]).await;
    assert!(engine.call_next(LOC, None).await.unwrap().is_none());

    // A bad staff id is still reported, even with nobody waiting.
    let err = engine
        .call_next(LOC, Some(StaffId::from("nobody")))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::StaffNotFound(_)));
}

#[tokio::test]
#[serial]
async fn overdue_entries_show_up_in_stats() {
    let (engine, clock) = engine_with_capacity(10);

    // Nobody ahead: estimate 0, so the 15-minute buffer is the whole grace.
    engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    clock.advance(Duration::minutes(15));
    assert_eq!(engine.stats(LOC, clock.today()).await.unwrap().overdue, 0);
    clock.advance(Duration::minutes(1));
    assert_eq!(engine.stats(LOC, clock.today()).await.unwrap().overdue, 1);
}

// ============================================================================
// Storage failure atomicity
// ============================================================================

struct FlakyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        FlakyStore {
            inner: InMemoryStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<queue_engine::session::QueueSession>> {
        self.inner.load(key).await
    }

    async fn save(&self, session: &queue_engine::session::QueueSession) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QueueError::storage("disk full"));
        }
        self.inner.save(session).await
    }
}

#[tokio::test]
#[serial]
async fn storage_failure_aborts_the_mutation_with_no_trace() {
    let mut config = QueueEngineConfig::default();
    config.session.max_capacity = 10;
    let start = Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(FlakyStore::new());
    let engine = QueueEngine::with_parts(config, clock.clone(), store.clone()).unwrap();
    let mut rx = engine.subscribe();

    let a = engine.admit(LOC, walk_in("a", Priority::Normal)).await.unwrap();
    rx.try_recv().unwrap();

    store.set_failing(true);
    let err = engine.admit(LOC, walk_in("b", Priority::Normal)).await.unwrap_err();
    assert!(matches!(err, QueueError::Storage(_)));
    let err = engine.remove(a.id, "flaky").await.unwrap_err();
    assert!(matches!(err, QueueError::Storage(_)));

    // Nothing leaked: no event, no entry, no occupancy change.
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    store.set_failing(false);
    let snap = engine.snapshot(LOC, clock.today()).await.unwrap();
    assert_eq!(snap.occupancy, 1);
    assert_eq!(snap.waiting.len(), 1);
    assert_eq!(snap.waiting[0].id, a.id);
    assert_eq!(snap.waiting[0].state, EntryState::Waiting);

    // The engine works normally once storage recovers.
    engine.admit(LOC, walk_in("b", Priority::Normal)).await.unwrap();
    assert_eq!(
        engine.snapshot(LOC, clock.today()).await.unwrap().occupancy,
        2
    );
}

#[tokio::test]
#[serial]
async fn sessions_at_different_locations_are_independent() {
    let (engine, clock) = engine_with_capacity(1);

    engine.admit("north", walk_in("a", Priority::Normal)).await.unwrap();
    assert!(matches!(
        engine.admit("north", walk_in("b", Priority::Normal)).await,
        Err(QueueError::QueueFull)
    ));

    // The other location still has its own seat.
    engine.admit("south", walk_in("b", Priority::Normal)).await.unwrap();

    let north = engine.snapshot("north", clock.today()).await.unwrap();
    let south = engine.snapshot("south", clock.today()).await.unwrap();
    assert_eq!(north.occupancy, 1);
    assert_eq!(south.occupancy, 1);

    let stats = engine.engine_stats();
    assert_eq!(stats.active_sessions, 2);
    assert_eq!(stats.indexed_entries, 2);
}
