//! Reservation coordinator: the transactional core.
//!
//! Every mutation of reservation state runs here, as a single serialized
//! unit per resource:
//!
//! 1. acquire the resource's lock (bounded wait, jittered retries)
//! 2. recompute committed load by replaying the ledger, never the
//!    materialized index
//! 3. append the ledger event and fold it into the index
//! 4. release the lock, then fire the notification
//!
//! Requests for different resources share no lock and proceed fully in
//! parallel; requests for one resource serialize in arrival order at its
//! mutex. Ties go to the first committer; a rejected caller re-queries
//! availability and retries against another resource or window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use innkeep_core::environment::{Clock, Notifier, ReservationNotice};
use innkeep_core::error::ReserveError;
use innkeep_core::event::{LedgerEvent, StockMovement};
use innkeep_core::ids::{HolderId, ReservationId, ResourceId};
use innkeep_core::ledger::{LedgerError, LedgerStore};
use innkeep_core::reservation::{Reservation, ReservationStatus, ReserveMode};
use innkeep_core::resource::{CapacityModel, Resource};
use innkeep_core::window::TimeWindow;
use rand::Rng;
use smallvec::{smallvec, SmallVec};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;

use crate::catalog::ResourceCatalog;
use crate::index::{AvailabilityIndex, StockLevels};
use crate::metrics::{
    CONFLICTS_TOTAL, HOLDS_EXPIRED_TOTAL, LOCK_TIMEOUTS_TOTAL, LOCK_WAIT_SECONDS,
    RESERVATIONS_TOTAL,
};
use crate::occupancy::{ResourceLoad, StockSnapshot};

/// Lock acquisition bounds for the per-resource mutex.
#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// Wait per acquisition attempt before backing off
    pub lock_wait: Duration,
    /// Total acquisition attempts before surfacing `LockTimeout`
    pub lock_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_millis(500),
            lock_attempts: 3,
        }
    }
}

/// A reservation request, as accepted by [`ReservationCoordinator::reserve`].
#[derive(Clone, Debug)]
pub struct ReserveRequest {
    /// Resource to commit
    pub resource_id: ResourceId,
    /// Interval requested; `None` for quantity resources
    pub window: Option<TimeWindow>,
    /// Occupants for windowed resources, units for quantity resources
    pub amount: u64,
    /// Party the reservation is held for
    pub holder_id: HolderId,
    /// Immediate commit or a TTL-bounded hold
    pub mode: ReserveMode,
}

/// The transactional core: validates and commits reservations under a
/// per-resource lock.
pub struct ReservationCoordinator {
    catalog: Arc<ResourceCatalog>,
    ledger: Arc<dyn LedgerStore>,
    index: Arc<AvailabilityIndex>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    config: CoordinatorConfig,
    locks: Mutex<HashMap<ResourceId, Arc<Mutex<()>>>>,
    /// Which resource each reservation lives on
    directory: RwLock<HashMap<ReservationId, ResourceId>>,
    /// Live holds and their deadlines, for the sweeper
    holds: RwLock<HashMap<ReservationId, (ResourceId, DateTime<Utc>)>>,
}

impl ReservationCoordinator {
    /// Creates a coordinator with default lock bounds.
    #[must_use]
    pub fn new(
        catalog: Arc<ResourceCatalog>,
        ledger: Arc<dyn LedgerStore>,
        index: Arc<AvailabilityIndex>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_config(
            catalog,
            ledger,
            index,
            clock,
            notifier,
            CoordinatorConfig::default(),
        )
    }

    /// Creates a coordinator with explicit lock bounds.
    #[must_use]
    pub fn with_config(
        catalog: Arc<ResourceCatalog>,
        ledger: Arc<dyn LedgerStore>,
        index: Arc<AvailabilityIndex>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            index,
            clock,
            notifier,
            config,
            locks: Mutex::new(HashMap::new()),
            directory: RwLock::new(HashMap::new()),
            holds: RwLock::new(HashMap::new()),
        }
    }

    /// Acquires the per-resource lock within the configured bounds,
    /// backing off with jitter between attempts.
    async fn lock_resource(
        &self,
        resource_id: ResourceId,
    ) -> Result<OwnedMutexGuard<()>, ReserveError> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(resource_id).or_default())
        };

        let started = std::time::Instant::now();
        for attempt in 0..self.config.lock_attempts {
            if let Ok(guard) = timeout(self.config.lock_wait, Arc::clone(&lock).lock_owned()).await
            {
                metrics::histogram!(LOCK_WAIT_SECONDS).record(started.elapsed().as_secs_f64());
                return Ok(guard);
            }
            if attempt + 1 < self.config.lock_attempts {
                let jitter = rand::thread_rng().gen_range(0..25);
                tokio::time::sleep(Duration::from_millis(5 + jitter)).await;
            }
        }

        metrics::counter!(LOCK_TIMEOUTS_TOTAL).increment(1);
        tracing::warn!(resource_id = %resource_id, "reservation lock wait exhausted");
        Err(ReserveError::LockTimeout { resource_id })
    }

    /// Replays a resource's stream (from its stock snapshot, when one
    /// exists) into authoritative state. Must be called under the
    /// resource's lock.
    async fn load_state(&self, resource_id: ResourceId) -> Result<ResourceLoad, ReserveError> {
        let (mut load, from) = match self.ledger.load_snapshot(resource_id).await? {
            Some((version, bytes)) => {
                let snapshot: StockSnapshot = bincode::deserialize(&bytes)
                    .map_err(|e| LedgerError::Snapshot(e.to_string()))?;
                (
                    ResourceLoad::from_snapshot(version, snapshot),
                    Some(version.next()),
                )
            }
            None => (ResourceLoad::new(), None),
        };
        for recorded in self.ledger.load(resource_id, from).await? {
            load.apply(&recorded);
        }
        Ok(load)
    }

    /// Appends events under the lock and folds them into the index in the
    /// same critical section.
    async fn commit_events(
        &self,
        resource_id: ResourceId,
        load: &ResourceLoad,
        events: SmallVec<[LedgerEvent; 2]>,
    ) -> Result<u64, ReserveError> {
        let version = self
            .ledger
            .append(resource_id, Some(load.version()), events.to_vec())
            .await?;
        for event in &events {
            self.index.apply(event).await;
        }
        Ok(version.value())
    }

    fn dispatch_notice(&self, reservation_id: ReservationId, resource_id: ResourceId, status: ReservationStatus) {
        metrics::counter!(RESERVATIONS_TOTAL, "status" => status.to_string()).increment(1);
        let notifier = Arc::clone(&self.notifier);
        let notice = ReservationNotice {
            reservation_id,
            resource_id,
            status,
        };
        // Fire-and-forget: delivery failure never affects the reservation
        tokio::spawn(async move {
            notifier.notify(notice).await;
        });
    }

    /// Validates capacity for the request against authoritative state.
    /// `Ok(())` means the full window (every night of a stay) fits.
    fn check_capacity(
        resource: &Resource,
        load: &ResourceLoad,
        window: Option<&TimeWindow>,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<(), ReserveError> {
        let conflict = match (&resource.capacity_model, window) {
            // Exclusive: interval overlap, never counters
            (CapacityModel::Exclusive, Some(window)) => load
                .first_exclusive_conflict(window, now)
                .map(|conflicting| (Some(conflicting), 0)),
            // Concurrent: counter sums per night / slot
            (CapacityModel::Concurrent(capacity), Some(window)) => load
                .first_capacity_shortfall(window, amount, u64::from(capacity.value()), now)
                .map(|(conflicting, available)| (Some(conflicting), available)),
            // Quantity: running stock totals
            (CapacityModel::Quantity { .. }, None) => {
                let available = load.stock_available(now);
                (available < amount).then_some((None, available))
            }
            // Granularity mismatches are caught by accepts_window
            _ => {
                return Err(ReserveError::InvalidWindow {
                    reason: "window granularity does not match the resource".to_string(),
                })
            }
        };

        match conflict {
            Some((window, available)) => {
                metrics::counter!(CONFLICTS_TOTAL).increment(1);
                Err(ReserveError::Conflict {
                    resource_id: resource.resource_id,
                    window,
                    requested: amount,
                    available,
                })
            }
            None => Ok(()),
        }
    }

    /// Atomic check-and-commit for one resource/window/amount request.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::Conflict`] when capacity would be exceeded, naming
    ///   the first conflicting night or sub-window
    /// - [`ReserveError::ResourceNotFound`] for unknown or retired
    ///   resources
    /// - [`ReserveError::InvalidWindow`] / [`ReserveError::InvalidAmount`]
    ///   for malformed requests
    /// - [`ReserveError::LockTimeout`] when the per-resource lock wait is
    ///   exhausted
    pub async fn reserve(&self, request: ReserveRequest) -> Result<Reservation, ReserveError> {
        if request.amount == 0 {
            return Err(ReserveError::InvalidAmount);
        }
        let resource = self.catalog.get(request.resource_id).await?;
        if resource.retired {
            return Err(ReserveError::ResourceNotFound(request.resource_id));
        }
        resource.accepts_window(request.window.as_ref())?;
        if let Some(window) = &request.window {
            window.validate()?;
        }

        let guard = self.lock_resource(request.resource_id).await?;
        let now = self.clock.now();
        let load = self.load_state(request.resource_id).await?;

        Self::check_capacity(&resource, &load, request.window.as_ref(), request.amount, now)?;

        let reservation_id = ReservationId::new();
        let (status, expires_at, event) = match request.mode {
            ReserveMode::Commit => (
                ReservationStatus::Confirmed,
                None,
                LedgerEvent::ReservationCommitted {
                    reservation_id,
                    resource_id: request.resource_id,
                    holder_id: request.holder_id,
                    window: request.window,
                    amount: request.amount,
                    committed_at: now,
                },
            ),
            ReserveMode::Hold { ttl_seconds } => {
                let deadline =
                    now + chrono::Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(i64::MAX));
                (
                    ReservationStatus::Pending,
                    Some(deadline),
                    LedgerEvent::ReservationHeld {
                        reservation_id,
                        resource_id: request.resource_id,
                        holder_id: request.holder_id,
                        window: request.window,
                        amount: request.amount,
                        expires_at: deadline,
                        held_at: now,
                    },
                )
            }
        };

        let version = self
            .commit_events(request.resource_id, &load, smallvec![event])
            .await?;
        self.directory
            .write()
            .await
            .insert(reservation_id, request.resource_id);
        if let Some(deadline) = expires_at {
            self.holds
                .write()
                .await
                .insert(reservation_id, (request.resource_id, deadline));
        }
        drop(guard);

        tracing::debug!(
            reservation_id = %reservation_id,
            resource_id = %request.resource_id,
            status = %status,
            "reservation written"
        );
        self.dispatch_notice(reservation_id, request.resource_id, status);

        Ok(Reservation {
            reservation_id,
            resource_id: request.resource_id,
            holder_id: request.holder_id,
            window: request.window,
            amount: request.amount,
            status,
            created_at: now,
            expires_at,
            version,
        })
    }

    /// Finalizes a pending hold.
    ///
    /// A hold past its TTL is treated as expired even if the sweeper has
    /// not recorded it yet: the expiry is appended lazily and the confirm
    /// is refused.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::ReservationNotFound`] for an unknown id
    /// - [`ReserveError::InvalidTransition`] when the hold is no longer
    ///   pending (including lazily-expired holds)
    pub async fn confirm(&self, reservation_id: ReservationId) -> Result<Reservation, ReserveError> {
        self.transition(reservation_id, ReservationStatus::Confirmed)
            .await
    }

    /// Annuls a confirmed reservation; its capacity returns to the pool.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::ReservationNotFound`] for an unknown id
    /// - [`ReserveError::InvalidTransition`] unless the reservation is
    ///   currently confirmed
    pub async fn cancel(&self, reservation_id: ReservationId) -> Result<Reservation, ReserveError> {
        self.transition(reservation_id, ReservationStatus::Cancelled)
            .await
    }

    /// Releases a confirmed reservation (early checkout, full stock
    /// return).
    ///
    /// # Errors
    ///
    /// Same as [`Self::cancel`].
    pub async fn release(&self, reservation_id: ReservationId) -> Result<Reservation, ReserveError> {
        self.transition(reservation_id, ReservationStatus::Released)
            .await
    }

    /// Expires a pending hold. Used by the sweeper; callers use
    /// [`Self::cancel`] / [`Self::release`].
    async fn expire(&self, reservation_id: ReservationId) -> Result<Reservation, ReserveError> {
        self.transition(reservation_id, ReservationStatus::Expired)
            .await
    }

    #[allow(clippy::too_many_lines)] // One locked path for all four transitions
    async fn transition(
        &self,
        reservation_id: ReservationId,
        to: ReservationStatus,
    ) -> Result<Reservation, ReserveError> {
        let resource_id = self
            .directory
            .read()
            .await
            .get(&reservation_id)
            .copied()
            .ok_or(ReserveError::ReservationNotFound(reservation_id))?;

        let guard = self.lock_resource(resource_id).await?;
        let now = self.clock.now();
        let load = self.load_state(resource_id).await?;
        let reservation = load
            .reservation(&reservation_id)
            .ok_or(ReserveError::ReservationNotFound(reservation_id))?
            .clone();

        // Check-on-read: a pending hold past its deadline is expired on
        // this read, before the requested transition is considered. The
        // expiry event is appended here so the ledger catches up with the
        // clock, except when expiry is exactly what was requested.
        let observed = reservation.observed_status(now);
        if observed == ReservationStatus::Expired
            && reservation.status == ReservationStatus::Pending
            && to != ReservationStatus::Expired
        {
            let event = LedgerEvent::ReservationExpired {
                reservation_id,
                expired_at: now,
            };
            self.commit_events(resource_id, &load, smallvec![event])
                .await?;
            self.holds.write().await.remove(&reservation_id);
            drop(guard);
            metrics::counter!(HOLDS_EXPIRED_TOTAL).increment(1);
            self.dispatch_notice(reservation_id, resource_id, ReservationStatus::Expired);
            return Err(ReserveError::InvalidTransition {
                from: ReservationStatus::Expired,
                to,
            });
        }

        if !reservation.status.can_become(to) {
            return Err(ReserveError::InvalidTransition {
                from: observed,
                to,
            });
        }

        let event = match to {
            ReservationStatus::Confirmed => LedgerEvent::ReservationConfirmed {
                reservation_id,
                confirmed_at: now,
            },
            ReservationStatus::Cancelled => LedgerEvent::ReservationCancelled {
                reservation_id,
                cancelled_at: now,
            },
            ReservationStatus::Released => LedgerEvent::ReservationReleased {
                reservation_id,
                released_at: now,
            },
            ReservationStatus::Expired => LedgerEvent::ReservationExpired {
                reservation_id,
                expired_at: now,
            },
            ReservationStatus::Pending => {
                return Err(ReserveError::InvalidTransition {
                    from: reservation.status,
                    to,
                })
            }
        };

        let version = self.commit_events(resource_id, &load, smallvec![event]).await?;
        self.holds.write().await.remove(&reservation_id);
        drop(guard);

        if to == ReservationStatus::Expired {
            metrics::counter!(HOLDS_EXPIRED_TOTAL).increment(1);
        }
        tracing::debug!(
            reservation_id = %reservation_id,
            resource_id = %resource_id,
            from = %reservation.status,
            to = %to,
            "reservation transitioned"
        );
        self.dispatch_notice(reservation_id, resource_id, to);

        Ok(Reservation {
            status: to,
            expires_at: None,
            version,
            ..reservation
        })
    }

    /// Returns part of a holder's reserved stock without closing the
    /// underlying reservations. Refused, with state untouched, when
    /// `amount` exceeds the holder's outstanding total.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::ReleaseExceedsReservation`] when over-releasing
    /// - [`ReserveError::InvalidWindow`] on non-quantity resources
    pub async fn release_stock(
        &self,
        resource_id: ResourceId,
        holder_id: HolderId,
        amount: u64,
    ) -> Result<StockLevels, ReserveError> {
        if amount == 0 {
            return Err(ReserveError::InvalidAmount);
        }
        let resource = self.catalog.get(resource_id).await?;
        if resource.capacity_model.is_windowed() {
            return Err(ReserveError::InvalidWindow {
                reason: format!("resource kind {} holds no stock", resource.kind),
            });
        }

        let guard = self.lock_resource(resource_id).await?;
        let now = self.clock.now();
        let load = self.load_state(resource_id).await?;

        let outstanding = load.holder_outstanding(holder_id, now);
        if amount > outstanding {
            return Err(ReserveError::ReleaseExceedsReservation {
                reserved: outstanding,
                requested: amount,
            });
        }

        let event = LedgerEvent::StockReleased {
            resource_id,
            holder_id,
            amount,
            released_at: now,
        };
        self.commit_events(resource_id, &load, smallvec![event]).await?;
        let levels = StockLevels {
            current_stock: load.stock_on_hand(),
            reserved_stock: load.reserved_stock(now) - amount,
        };
        drop(guard);
        Ok(levels)
    }

    /// Appends a stock movement (load, waste, adjustment) and updates the
    /// running totals in the same locked transaction. Movements that would
    /// push stock on hand below the reserved amount are refused.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::CapacityBelowCommitted`] when stock on hand would
    ///   drop below reserved stock
    /// - [`ReserveError::InvalidWindow`] on non-quantity resources
    pub async fn record_stock(
        &self,
        resource_id: ResourceId,
        movement: StockMovement,
    ) -> Result<StockLevels, ReserveError> {
        let resource = self.catalog.get(resource_id).await?;
        if resource.capacity_model.is_windowed() {
            return Err(ReserveError::InvalidWindow {
                reason: format!("resource kind {} holds no stock", resource.kind),
            });
        }

        let guard = self.lock_resource(resource_id).await?;
        let now = self.clock.now();
        let load = self.load_state(resource_id).await?;

        let on_hand = load.stock_on_hand();
        let next = match movement {
            StockMovement::Load(units) => on_hand.saturating_add(units),
            StockMovement::Waste(units) => on_hand.saturating_sub(units),
            StockMovement::Adjust(delta) => on_hand.saturating_add_signed(delta),
        };
        let reserved = load.reserved_stock(now);
        if next < reserved {
            return Err(ReserveError::CapacityBelowCommitted {
                committed: reserved,
                requested: next,
            });
        }

        let event = LedgerEvent::StockRecorded {
            resource_id,
            movement,
            recorded_at: now,
        };
        self.commit_events(resource_id, &load, smallvec![event]).await?;
        drop(guard);
        Ok(StockLevels {
            current_stock: next,
            reserved_stock: reserved,
        })
    }

    /// Snapshots a quantity resource's running totals so replays start
    /// from the snapshot version instead of the first movement. The stream
    /// itself is kept: it is the audit trail.
    ///
    /// # Errors
    ///
    /// Ledger and snapshot-codec failures.
    pub async fn compact_stock(&self, resource_id: ResourceId) -> Result<(), ReserveError> {
        let guard = self.lock_resource(resource_id).await?;
        let load = self.load_state(resource_id).await?;
        let bytes = bincode::serialize(&load.snapshot())
            .map_err(|e| LedgerError::Snapshot(e.to_string()))?;
        self.ledger
            .save_snapshot(resource_id, load.version(), bytes)
            .await?;
        drop(guard);
        tracing::debug!(resource_id = %resource_id, "stock ledger compacted");
        Ok(())
    }

    /// The reservation as the coordinator sees it right now, with
    /// check-on-read expiry folded in.
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::ReservationNotFound`] for an unknown id.
    pub async fn get_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Reservation, ReserveError> {
        let resource_id = self
            .directory
            .read()
            .await
            .get(&reservation_id)
            .copied()
            .ok_or(ReserveError::ReservationNotFound(reservation_id))?;
        let load = self.load_state(resource_id).await?;
        let mut reservation = load
            .reservation(&reservation_id)
            .ok_or(ReserveError::ReservationNotFound(reservation_id))?
            .clone();
        reservation.status = reservation.observed_status(self.clock.now());
        Ok(reservation)
    }

    /// Expires every hold whose deadline has passed, each through the
    /// locked transition path so expiry can never race a concurrent
    /// confirm. Returns how many holds were expired.
    pub async fn expire_due_holds(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<ReservationId> = self
            .holds
            .read()
            .await
            .iter()
            .filter(|(_, (_, deadline))| now >= *deadline)
            .map(|(id, _)| *id)
            .collect();

        let mut expired = 0;
        for reservation_id in due {
            match self.expire(reservation_id).await {
                Ok(_) => expired += 1,
                // Lost the race with a concurrent confirm/cancel
                Err(error) => {
                    tracing::debug!(
                        reservation_id = %reservation_id,
                        %error,
                        "hold no longer expirable"
                    );
                    self.holds.write().await.remove(&reservation_id);
                }
            }
        }
        expired
    }
}
