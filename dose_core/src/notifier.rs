//! Delivery of queued reminders.
//!
//! The engine only produces pending entries; a [`Notifier`] is whatever
//! actually reaches the user. [`dispatch_pending`] acks entries once they have
//! been delivered and leaves failed ones for the next round.

use crate::{MedicineId, NotificationQueue, Result};

/// Sink for reminder messages
pub trait Notifier: Send + Sync {
    fn deliver(&self, medicine_id: MedicineId, message: &str) -> Result<()>;
}

/// Notifier that only writes reminders to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, medicine_id: MedicineId, message: &str) -> Result<()> {
        tracing::info!(%medicine_id, "Reminder: {}", message);
        Ok(())
    }
}

/// Deliver every pending entry and ack the ones that succeeded
///
/// Returns the number delivered.
pub fn dispatch_pending(queue: &NotificationQueue, notifier: &dyn Notifier) -> usize {
    let mut pending: Vec<_> = queue.snapshot().into_iter().collect();
    pending.sort_by(|a, b| a.1.cmp(&b.1));

    let mut delivered = 0;
    for (id, message) in pending {
        match notifier.deliver(id, &message) {
            Ok(()) => {
                queue.ack(id);
                delivered += 1;
            }
            Err(e) => {
                tracing::warn!(medicine_id = %id, "Reminder delivery failed, will retry: {}", e);
            }
        }
    }
    delivered
}
