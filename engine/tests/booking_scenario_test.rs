//! End-to-end booking scenarios: multi-night atomicity, cancel-and-rebook,
//! holds, expiry and notifications.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use std::time::Duration;

use innkeep_core::environment::{Clock, Notifier};
use innkeep_core::error::ReserveError;
use innkeep_core::ledger::LedgerStore;
use innkeep_core::ids::{HolderId, PropertyId};
use innkeep_core::reservation::{ReservationStatus, ReserveMode};
use innkeep_core::window::TimeWindow;
use innkeep_engine::{
    spawn_hold_sweeper, AvailabilityIndex, MemoryLedger, ReservationCoordinator, ReserveRequest,
    ResourceCatalog,
};
use innkeep_testing::{fixtures, CollectingNotifier, FixedClock};

struct Harness {
    catalog: Arc<ResourceCatalog>,
    coordinator: Arc<ReservationCoordinator>,
    clock: Arc<FixedClock>,
    notifier: Arc<CollectingNotifier>,
}

fn harness() -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let clock = Arc::new(FixedClock::at_now());
    let notifier = Arc::new(CollectingNotifier::new());
    let ledger_dyn: Arc<dyn LedgerStore> = ledger.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let notifier_dyn: Arc<dyn Notifier> = notifier.clone();
    let catalog = Arc::new(ResourceCatalog::new(
        Arc::clone(&ledger_dyn),
        Arc::clone(&clock_dyn),
    ));
    let coordinator = Arc::new(ReservationCoordinator::new(
        Arc::clone(&catalog),
        ledger_dyn,
        Arc::new(AvailabilityIndex::new()),
        clock_dyn,
        notifier_dyn,
    ));
    Harness {
        catalog,
        coordinator,
        clock,
        notifier,
    }
}

fn commit(resource_id: innkeep_core::ids::ResourceId, window: TimeWindow) -> ReserveRequest {
    ReserveRequest {
        resource_id,
        window: Some(window),
        amount: 1,
        holder_id: HolderId::new(),
        mode: ReserveMode::Commit,
    }
}

/// The canonical room-101 scenario: overlapping request conflicts and
/// names the clashing night; after a cancel the same request commits.
#[tokio::test]
async fn room_101_conflict_cancel_rebook() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "room-101"))
        .await
        .unwrap();

    let first = h
        .coordinator
        .reserve(commit(
            room.resource_id,
            fixtures::stay("2024-06-01", "2024-06-03"),
        ))
        .await
        .unwrap();
    assert_eq!(first.status, ReservationStatus::Confirmed);

    let overlap = fixtures::stay("2024-06-02", "2024-06-04");
    let refused = h
        .coordinator
        .reserve(commit(room.resource_id, overlap))
        .await;
    match refused {
        Err(ReserveError::Conflict {
            window: Some(TimeWindow::Nights { check_in, .. }),
            ..
        }) => assert_eq!(check_in.to_string(), "2024-06-02"),
        other => unreachable!("expected a conflict naming 2024-06-02, got {other:?}"),
    }

    h.coordinator
        .cancel(first.reservation_id)
        .await
        .unwrap();

    let rebooked = h
        .coordinator
        .reserve(commit(room.resource_id, overlap))
        .await
        .unwrap();
    assert_eq!(rebooked.status, ReservationStatus::Confirmed);
}

/// A 3-night stay fails entirely when one night is taken: no partial
/// nights may leak into the ledger.
#[tokio::test]
async fn multi_night_stay_is_all_or_nothing() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 305"))
        .await
        .unwrap();

    // The middle night is already booked
    h.coordinator
        .reserve(commit(
            room.resource_id,
            fixtures::stay("2024-06-02", "2024-06-03"),
        ))
        .await
        .unwrap();

    let refused = h
        .coordinator
        .reserve(commit(
            room.resource_id,
            fixtures::stay("2024-06-01", "2024-06-04"),
        ))
        .await;
    assert!(matches!(refused, Err(ReserveError::Conflict { .. })));

    // Zero nights of the refused stay were committed: both edge nights
    // are still individually bookable
    for (check_in, check_out) in [("2024-06-01", "2024-06-02"), ("2024-06-03", "2024-06-04")] {
        h.coordinator
            .reserve(commit(room.resource_id, fixtures::stay(check_in, check_out)))
            .await
            .unwrap();
    }
}

/// A hold past its TTL is expired on read and does not block re-booking,
/// even when no sweeper is running.
#[tokio::test]
async fn expired_hold_frees_the_window_without_a_sweep() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 410"))
        .await
        .unwrap();
    let window = fixtures::stay("2024-06-10", "2024-06-12");

    let hold = h
        .coordinator
        .reserve(ReserveRequest {
            resource_id: room.resource_id,
            window: Some(window),
            amount: 1,
            holder_id: HolderId::new(),
            mode: ReserveMode::Hold { ttl_seconds: 1 },
        })
        .await
        .unwrap();
    assert_eq!(hold.status, ReservationStatus::Pending);

    // While live, the hold blocks the window
    assert!(matches!(
        h.coordinator.reserve(commit(room.resource_id, window)).await,
        Err(ReserveError::Conflict { .. })
    ));

    // Two seconds later it is expired on every read
    h.clock.advance(chrono::Duration::seconds(2));
    let observed = h.coordinator.get_reservation(hold.reservation_id).await.unwrap();
    assert_eq!(observed.status, ReservationStatus::Expired);

    // A confirm is refused and records the expiry
    assert!(matches!(
        h.coordinator.confirm(hold.reservation_id).await,
        Err(ReserveError::InvalidTransition {
            from: ReservationStatus::Expired,
            ..
        })
    ));

    // The window is free again
    h.coordinator
        .reserve(commit(room.resource_id, window))
        .await
        .unwrap();
}

/// A hold confirmed within its TTL becomes a normal confirmed
/// reservation.
#[tokio::test]
async fn hold_confirm_within_ttl() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 2"))
        .await
        .unwrap();

    let hold = h
        .coordinator
        .reserve(ReserveRequest {
            resource_id: room.resource_id,
            window: Some(fixtures::stay("2024-06-20", "2024-06-21")),
            amount: 1,
            holder_id: HolderId::new(),
            mode: ReserveMode::Hold { ttl_seconds: 300 },
        })
        .await
        .unwrap();

    let confirmed = h.coordinator.confirm(hold.reservation_id).await.unwrap();
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.expires_at, None);

    // Confirming twice is an illegal transition
    assert!(matches!(
        h.coordinator.confirm(hold.reservation_id).await,
        Err(ReserveError::InvalidTransition { .. })
    ));
}

/// The sweeper expires overdue holds through the locked path.
#[tokio::test]
async fn sweeper_expires_overdue_holds() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 7"))
        .await
        .unwrap();

    let hold = h
        .coordinator
        .reserve(ReserveRequest {
            resource_id: room.resource_id,
            window: Some(fixtures::stay("2024-07-01", "2024-07-02")),
            amount: 1,
            holder_id: HolderId::new(),
            mode: ReserveMode::Hold { ttl_seconds: 1 },
        })
        .await
        .unwrap();

    let sweeper = spawn_hold_sweeper(Arc::clone(&h.coordinator), Duration::from_millis(20));
    h.clock.advance(chrono::Duration::seconds(5));
    tokio::time::sleep(Duration::from_millis(120)).await;
    sweeper.shutdown().await;

    let observed = h.coordinator.get_reservation(hold.reservation_id).await.unwrap();
    assert_eq!(observed.status, ReservationStatus::Expired);
}

/// Every transition emits exactly one fire-and-forget notice.
#[tokio::test]
async fn transitions_notify_the_collaborator() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 12"))
        .await
        .unwrap();

    let reservation = h
        .coordinator
        .reserve(commit(
            room.resource_id,
            fixtures::stay("2024-08-01", "2024-08-02"),
        ))
        .await
        .unwrap();
    h.coordinator.cancel(reservation.reservation_id).await.unwrap();

    // Notices are dispatched on spawned tasks; give them a beat to land
    tokio::time::sleep(Duration::from_millis(50)).await;

    let statuses: Vec<ReservationStatus> = h
        .notifier
        .notices()
        .iter()
        .filter(|n| n.reservation_id == reservation.reservation_id)
        .map(|n| n.status)
        .collect();
    assert_eq!(
        statuses,
        vec![ReservationStatus::Confirmed, ReservationStatus::Cancelled]
    );
}

/// Cancelling an unknown reservation is a typed not-found, and a
/// released room can be rebooked like a cancelled one.
#[tokio::test]
async fn release_frees_the_window() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 9"))
        .await
        .unwrap();
    let window = fixtures::stay("2024-09-01", "2024-09-05");

    assert!(matches!(
        h.coordinator
            .cancel(innkeep_core::ids::ReservationId::new())
            .await,
        Err(ReserveError::ReservationNotFound(_))
    ));

    let reservation = h
        .coordinator
        .reserve(commit(room.resource_id, window))
        .await
        .unwrap();
    let released = h
        .coordinator
        .release(reservation.reservation_id)
        .await
        .unwrap();
    assert_eq!(released.status, ReservationStatus::Released);

    h.coordinator
        .reserve(commit(room.resource_id, window))
        .await
        .unwrap();
}

/// A retired resource keeps its history but accepts nothing new.
#[tokio::test]
async fn retired_resources_refuse_new_reservations() {
    let h = harness();
    let room = h
        .catalog
        .create(fixtures::room_spec(PropertyId::new(), "Room 99"))
        .await
        .unwrap();
    h.catalog.retire(room.resource_id).await.unwrap();

    let refused = h
        .coordinator
        .reserve(commit(
            room.resource_id,
            fixtures::stay("2024-06-01", "2024-06-02"),
        ))
        .await;
    assert!(matches!(refused, Err(ReserveError::ResourceNotFound(_))));
}
