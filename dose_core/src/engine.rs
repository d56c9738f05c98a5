//! The dose engine: timers, worker pool and notification queue in one place.
//!
//! The engine owns the notification queue and the worker pool. `start`
//! spawns the scan timer and the daily reset timer on the current tokio
//! runtime; `shutdown` cancels both, waits for in-flight checks and clears
//! the queue. Boundary operations are available whether or not the timers
//! are running.

use crate::adherence::AdherenceCalculator;
use crate::config::SchedulerConfig;
use crate::notifier::{dispatch_pending, Notifier};
use crate::reset::{DailyResetTask, ResetReport};
use crate::scanner::DueDoseScanner;
use crate::{
    intake, Adherence, Clock, DoseSlot, Medicine, MedicineId, MedicineStore, NotificationQueue,
    Result, UserId, WorkerPool,
};
use chrono::NaiveTime;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct DoseEngine {
    store: Arc<dyn MedicineStore>,
    clock: Arc<dyn Clock>,
    queue: Arc<NotificationQueue>,
    pool: WorkerPool,
    config: SchedulerConfig,
    reset_at: NaiveTime,
    adherence: AdherenceCalculator,
    cancel: Option<CancellationToken>,
    timers: Vec<JoinHandle<()>>,
}

impl DoseEngine {
    pub fn new(
        store: Arc<dyn MedicineStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let reset_at = config.reset_at()?;

        Ok(Self {
            adherence: AdherenceCalculator::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
            queue: Arc::new(NotificationQueue::new()),
            pool: WorkerPool::new(config.worker_count),
            config,
            reset_at,
            cancel: None,
            timers: Vec::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn MedicineStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<NotificationQueue> {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    fn scanner(&self) -> DueDoseScanner {
        DueDoseScanner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.queue),
            self.pool.clone(),
            self.config.due_tolerance(),
        )
    }

    fn reset_task(&self) -> DailyResetTask {
        DailyResetTask::new(Arc::clone(&self.store), Arc::clone(&self.clock), self.reset_at)
    }

    /// Spawn the scan and reset timers; a second call is a no-op
    pub fn start(&mut self) {
        if self.is_running() {
            tracing::warn!("Dose engine already running");
            return;
        }

        let cancel = CancellationToken::new();
        self.timers.push(tokio::spawn(self.scanner().run(
            self.config.scan_interval(),
            self.config.align_to_minute,
            cancel.child_token(),
        )));
        self.timers
            .push(tokio::spawn(self.reset_task().run(cancel.child_token())));
        self.cancel = Some(cancel);

        tracing::info!(
            workers = self.pool.capacity(),
            scan_interval_secs = self.config.scan_interval_secs,
            reset_at = %self.reset_at,
            "Dose engine started"
        );
    }

    /// Stop both timers, wait for running checks, drop pending notifications
    pub async fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        for timer in self.timers.drain(..) {
            if let Err(e) = timer.await {
                tracing::error!("Timer task ended abnormally: {}", e);
            }
        }
        self.pool.wait_idle().await;
        self.queue.clear();
        tracing::info!("Dose engine stopped");
    }

    /// Run one scan now; returns the number of checks dispatched
    pub async fn scan_due_doses(&self) -> usize {
        self.scanner().scan_due_doses().await
    }

    /// Wait until every dispatched check has finished
    pub async fn wait_idle(&self) {
        self.pool.wait_idle().await;
    }

    /// Run one daily reset pass now
    pub async fn reset_daily(&self) -> Result<ResetReport> {
        self.reset_task().reset_now().await
    }

    pub fn toggle_slot(&self, id: MedicineId, slot: DoseSlot) -> Result<Medicine> {
        intake::toggle_slot(self.store.as_ref(), id, slot, self.clock.now())
    }

    pub async fn compute_adherence(&self, user_id: UserId) -> Result<Adherence> {
        self.adherence.compute_adherence(user_id).await
    }

    pub fn pending_notifications(&self) -> HashMap<MedicineId, String> {
        self.queue.snapshot()
    }

    pub fn ack_notification(&self, id: MedicineId) -> Option<String> {
        self.queue.ack(id)
    }

    /// Hand pending reminders to `notifier`, acking the delivered ones
    pub fn dispatch(&self, notifier: &dyn Notifier) -> usize {
        dispatch_pending(&self.queue, notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, MemoryStore, NewMedicine};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start_of_day() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(7, 58, 0)
            .unwrap()
    }

    fn engine() -> (DoseEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_of_day()));
        let engine = DoseEngine::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            SchedulerConfig::default(),
        )
        .unwrap();
        (engine, clock)
    }

    fn add(engine: &DoseEngine, times: [Option<&str>; 3]) -> Medicine {
        intake::add_medicine(
            engine.store().as_ref(),
            NewMedicine {
                user_id: 1,
                name: "Amlodipine".into(),
                dosage: "5mg".into(),
                times: times.map(|t| t.map(String::from)),
                ..Default::default()
            },
            start_of_day(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SchedulerConfig {
            worker_count: 0,
            ..Default::default()
        };
        let result = DoseEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(crate::SystemClock),
            config,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_day_in_the_life() {
        let (engine, clock) = engine();
        let med = add(&engine, [Some("08:00"), Some("20:00"), None]);

        engine.scan_due_doses().await;
        engine.wait_idle().await;
        assert_eq!(
            engine.pending_notifications().get(&med.id).map(String::as_str),
            Some("Time to take Amlodipine (5mg)")
        );

        // The user takes the morning dose and the reminder is delivered
        engine.toggle_slot(med.id, DoseSlot::First).unwrap();
        assert!(engine.ack_notification(med.id).is_some());

        engine.scan_due_doses().await;
        engine.wait_idle().await;
        assert!(engine.pending_notifications().is_empty());

        let adherence = engine.compute_adherence(1).await.unwrap();
        assert_eq!(adherence.percentage, 50.0);

        // Midnight: flags cleared, everything pending again
        clock.advance(Duration::hours(16) + Duration::minutes(2));
        let report = engine.reset_daily().await.unwrap();
        assert_eq!(report.reset, 1);
        let adherence = engine.compute_adherence(1).await.unwrap();
        assert_eq!(adherence.percentage, 0.0);
    }

    #[tokio::test]
    async fn test_no_reminder_after_midnight_reset() {
        let (engine, clock) = engine();
        let med = add(&engine, [Some("23:58"), None, None]);

        clock.set(start_of_day().date().and_hms_opt(23, 58, 0).unwrap());
        engine.toggle_slot(med.id, DoseSlot::First).unwrap();

        clock.advance(Duration::minutes(2));
        engine.reset_daily().await.unwrap();

        clock.advance(Duration::minutes(2));
        engine.scan_due_doses().await;
        engine.wait_idle().await;
        assert!(engine.pending_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let (mut engine, _clock) = engine();
        let med = add(&engine, [Some("08:00"), None, None]);

        engine.start();
        assert!(engine.is_running());
        engine.start();

        engine.queue().put(med.id, "stale");
        engine.shutdown().await;
        assert!(!engine.is_running());
        assert!(engine.queue().is_empty());
    }
}
