//! Background hold sweeper.
//!
//! Expires overdue holds on an interval. Each expiry goes through the
//! coordinator's locked transition path, never a direct row update, so
//! a sweep can lose, but never corrupt, a race with a concurrent confirm.
//! Correctness does not depend on sweep latency: every read applies
//! check-on-read expiry on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::ReservationCoordinator;

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper and waits for the task to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.handle.await;
    }
}

/// Spawns the hold sweeper, expiring overdue holds every `every`.
#[must_use]
pub fn spawn_hold_sweeper(
    coordinator: Arc<ReservationCoordinator>,
    every: Duration,
) -> SweeperHandle {
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a freshly started
        // sweeper waits one full interval
        ticker.tick().await;

        loop {
            tokio::select! {
                () = signal.notified() => break,
                _ = ticker.tick() => {
                    let expired = coordinator.expire_due_holds().await;
                    if expired > 0 {
                        tracing::info!(expired, "expired overdue holds");
                    }
                }
            }
        }
    });

    SweeperHandle { shutdown, handle }
}
