//! Daily reset of dose-taken flags.
//!
//! Once a day at the configured local time, every active medicine has its
//! slot flags cleared. The date window is deliberately not consulted: an active
//! medicine that has not started yet (or has already ended) is reset too.
//! Records are processed one by one; a failed save is logged and the pass
//! moves on to the next record.

use crate::{Clock, MedicineStore, Result, UserId};
use chrono::NaiveTime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one reset pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub reset: usize,
    pub failed: usize,
}

/// Clear the taken flags of every active medicine
///
/// Fails only if the initial load fails.
pub fn reset_daily(store: &dyn MedicineStore) -> Result<ResetReport> {
    let medicines = store.load_active()?;
    let mut report = ResetReport::default();

    for mut medicine in medicines {
        medicine.clear_taken();
        match store.save(&medicine) {
            Ok(()) => report.reset += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!(medicine_id = %medicine.id, "Failed to reset medicine: {}", e);
            }
        }
    }

    tracing::info!(
        reset = report.reset,
        failed = report.failed,
        "Reset daily medicine tracking"
    );
    Ok(report)
}

/// Clear the flags of all of one user's medicines, active or not
pub fn reset_user(store: &dyn MedicineStore, user_id: UserId) -> Result<usize> {
    let medicines = store.load_by_user(user_id)?;
    let count = medicines.len();
    for mut medicine in medicines {
        medicine.clear_taken();
        store.save(&medicine)?;
    }
    tracing::info!(user_id, count, "Reset daily status for user");
    Ok(count)
}

/// Timer that fires [`reset_daily`] at a fixed local time every day
pub struct DailyResetTask {
    store: Arc<dyn MedicineStore>,
    clock: Arc<dyn Clock>,
    at: NaiveTime,
}

impl DailyResetTask {
    pub fn new(store: Arc<dyn MedicineStore>, clock: Arc<dyn Clock>, at: NaiveTime) -> Self {
        Self { store, clock, at }
    }

    /// Run one reset pass off the async runtime
    pub async fn reset_now(&self) -> Result<ResetReport> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || reset_daily(store.as_ref())).await?
    }

    /// Sleep until the reset time, reset, repeat until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(at = %self.at, "Daily reset task started");
        loop {
            let wait = crate::time::until_next_daily(self.clock.now(), self.at);
            tracing::debug!(secs = wait.as_secs(), "Next daily reset scheduled");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.reset_now().await {
                        tracing::error!("Daily reset skipped: {}", e);
                    }
                }
            }
        }
        tracing::info!("Daily reset task stopped");
    }
}
