//! Periodic due-dose scan.
//!
//! Every cycle loads the active medicines that are in window today and hands
//! one check per medicine to the worker pool. The scan does not wait for the
//! checks; their only effect is on the notification queue. Cycles are not
//! serialized against each other, so a slow cycle may overlap the next one.

use crate::checker::check_medicine;
use crate::{Clock, Medicine, MedicineStore, NotificationQueue, WorkerPool};
use chrono::Duration;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct DueDoseScanner {
    store: Arc<dyn MedicineStore>,
    clock: Arc<dyn Clock>,
    queue: Arc<NotificationQueue>,
    pool: WorkerPool,
    tolerance: Duration,
}

impl DueDoseScanner {
    pub fn new(
        store: Arc<dyn MedicineStore>,
        clock: Arc<dyn Clock>,
        queue: Arc<NotificationQueue>,
        pool: WorkerPool,
        tolerance: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            queue,
            pool,
            tolerance,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run one scan cycle and return the number of checks dispatched
    ///
    /// A store failure is logged and the cycle is skipped; the next tick retries.
    pub async fn scan_due_doses(&self) -> usize {
        let now = self.clock.now();
        let today = now.date();

        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || store.load_active()).await;
        let medicines = match loaded {
            Ok(Ok(medicines)) => medicines,
            Ok(Err(e)) => {
                tracing::error!("Scan skipped, failed to load medicines: {}", e);
                return 0;
            }
            Err(e) => {
                tracing::error!("Scan skipped, load task failed: {}", e);
                return 0;
            }
        };

        let due_today: Vec<Medicine> = medicines
            .into_iter()
            .filter(|m| m.is_due_on(today) && m.is_schedulable())
            .collect();
        let dispatched = due_today.len();

        for medicine in due_today {
            let queue = Arc::clone(&self.queue);
            let tolerance = self.tolerance;
            self.pool.submit(move || {
                check_medicine(&medicine, now, tolerance, &queue);
            });
        }

        tracing::info!(dispatched, at = %now, "Scheduled medicine checks");
        dispatched
    }

    /// Scan on a fixed period until cancelled
    pub async fn run(
        self,
        period: std::time::Duration,
        align_to_minute: bool,
        cancel: CancellationToken,
    ) {
        let start = if align_to_minute {
            Instant::now() + crate::time::until_next_minute(self.clock.now())
        } else {
            Instant::now()
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(period_secs = period.as_secs(), "Due-dose scanner started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.scan_due_doses().await;
                }
            }
        }

        self.pool.wait_idle().await;
        tracing::info!("Due-dose scanner stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, MemoryStore, SlotState};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn medicine(name: &str, time: &str) -> Medicine {
        let mut med = Medicine::new(1, name, "5mg");
        med.slots[0] = SlotState::at(time);
        med
    }

    fn scanner(
        medicines: Vec<Medicine>,
        now: NaiveDateTime,
    ) -> (DueDoseScanner, Arc<NotificationQueue>) {
        let queue = Arc::new(NotificationQueue::new());
        let scanner = DueDoseScanner::new(
            Arc::new(MemoryStore::with_medicines(medicines)),
            Arc::new(ManualClock::new(now)),
            Arc::clone(&queue),
            WorkerPool::new(4),
            Duration::minutes(5),
        );
        (scanner, queue)
    }

    #[tokio::test]
    async fn test_scan_queues_due_medicines() {
        let due = medicine("Atorvastatin", "21:00");
        let later = medicine("Melatonin", "22:30");
        let (scanner, queue) = scanner(vec![due.clone(), later.clone()], at(21, 2));

        assert_eq!(scanner.scan_due_doses().await, 2);
        scanner.pool().wait_idle().await;

        let pending = queue.snapshot();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&due.id], "Time to take Atorvastatin (5mg)");
        assert!(!pending.contains_key(&later.id));
    }

    #[tokio::test]
    async fn test_scan_skips_inactive_and_out_of_window() {
        let mut inactive = medicine("Paused", "08:00");
        inactive.active = false;
        let mut finished = medicine("Finished", "08:00");
        finished.end_date = Some(at(8, 0).date() - Duration::days(1));
        let mut future = medicine("Future", "08:00");
        future.start_date = Some(at(8, 0).date() + Duration::days(1));
        let no_slots = Medicine::new(1, "Unscheduled", "1mg");

        let (scanner, queue) = scanner(vec![inactive, finished, future, no_slots], at(8, 0));

        assert_eq!(scanner.scan_due_doses().await, 0);
        scanner.pool().wait_idle().await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_scan_outside_tolerance_queues_nothing() {
        let med = medicine("Levothyroxine", "06:30");
        let (scanner, queue) = scanner(vec![med], at(6, 36));

        scanner.scan_due_doses().await;
        scanner.pool().wait_idle().await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let med = medicine("Omeprazole", "07:00");
        let (scanner, queue) = scanner(vec![med.clone()], at(7, 0));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scanner.run(
            std::time::Duration::from_secs(60),
            false,
            cancel.clone(),
        ));

        // First tick fires immediately; give the check time to land
        for _ in 0..200 {
            if queue.get(med.id).is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(queue.get(med.id).is_some());

        cancel.cancel();
        handle.await.unwrap();
    }
}
