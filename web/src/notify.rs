//! Notification delivery.
//!
//! The engine emits a fire-and-forget notice on every reservation state
//! transition. Real deployments plug a delivery collaborator (email, SMS,
//! webhooks) in behind [`innkeep_core::environment::Notifier`]; this
//! default sink writes the notice to the structured log so transitions
//! remain observable without one.

use futures::future::BoxFuture;
use innkeep_core::environment::{Notifier, ReservationNotice};

/// Notifier that logs every notice at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: ReservationNotice) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tracing::info!(
                reservation_id = %notice.reservation_id,
                resource_id = %notice.resource_id,
                status = %notice.status,
                "reservation transition"
            );
        })
    }
}
