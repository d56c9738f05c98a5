//! Dose adherence for a user.
//!
//! Adherence is the share of today's scheduled doses already marked taken,
//! over the user's active medicines that are in window today. It is read from
//! a point-in-time snapshot without locking against concurrent toggles.

use crate::{Adherence, Clock, Medicine, MedicineStore, Result, UserId};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Count `(total, taken)` doses over the given medicines
pub fn count_doses<'a>(medicines: impl IntoIterator<Item = &'a Medicine>) -> (u32, u32) {
    medicines
        .into_iter()
        .flat_map(Medicine::dose_slots)
        .fold((0, 0), |(total, taken), (_, slot)| {
            (total + 1, taken + u32::from(slot.taken))
        })
}

/// Compute adherence from already-loaded medicines
///
/// With nothing scheduled the user is vacuously fully adherent.
pub fn adherence_of(user_id: UserId, medicines: &[Medicine], now: NaiveDateTime) -> Adherence {
    let today = now.date();
    let (total_doses, taken_doses) =
        count_doses(medicines.iter().filter(|m| m.is_due_on(today)));

    let percentage = if total_doses > 0 {
        f64::from(taken_doses) * 100.0 / f64::from(total_doses)
    } else {
        100.0
    };

    Adherence {
        user_id,
        total_doses,
        taken_doses,
        percentage,
        computed_at: now,
    }
}

/// Computes adherence off the caller's task
#[derive(Clone)]
pub struct AdherenceCalculator {
    store: Arc<dyn MedicineStore>,
    clock: Arc<dyn Clock>,
}

impl AdherenceCalculator {
    pub fn new(store: Arc<dyn MedicineStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Load the user's medicines on a blocking thread and compute adherence
    pub async fn compute_adherence(&self, user_id: UserId) -> Result<Adherence> {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);

        let adherence = tokio::task::spawn_blocking(move || -> Result<Adherence> {
            let medicines = store.load_by_user(user_id)?;
            Ok(adherence_of(user_id, &medicines, clock.now()))
        })
        .await??;

        tracing::info!(
            user_id,
            total = adherence.total_doses,
            taken = adherence.taken_doses,
            "Adherence for user: {:.1}%",
            adherence.percentage
        );
        Ok(adherence)
    }
}
