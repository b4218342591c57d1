// ⏰ Scheduler - weekly ingestion trigger
// Idle → Running → Idle, at most one cycle in flight

use crate::pipeline::{CycleReport, Pipeline};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};

/// Sunday 00:00 UTC (sec min hour day-of-month month day-of-week)
pub const DEFAULT_CRON: &str = "0 0 0 * * Sun";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Completed(CycleReport),
    /// A cycle was already running; this trigger was dropped
    Skipped,
}

impl TriggerOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            TriggerOutcome::Completed(report) => Some(report),
            TriggerOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TriggerOutcome::Skipped)
    }
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    cron: String,
    running: AtomicBool,
    last_report: Mutex<Option<CycleReport>>,
}

/// Clears the running flag when the cycle ends, including by panic
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, cron: &str) -> Self {
        Scheduler {
            pipeline,
            cron: cron.to_string(),
            running: AtomicBool::new(false),
            last_report: Mutex::new(None),
        }
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one cycle now, unless one is already in flight
    pub async fn trigger(&self) -> TriggerOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("ingestion cycle still running; skipping this trigger");
            return TriggerOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let report = self.pipeline.run_cycle().await;

        if report.provider_failed() {
            warn!(run_id = %report.run_id, "cycle aborted; next attempt at the next scheduled time");
        }

        *self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());

        TriggerOutcome::Completed(report)
    }

    /// Cron job that calls `trigger` on every tick
    pub fn build_job(self: &Arc<Self>) -> Result<Job, JobSchedulerError> {
        let this = Arc::clone(self);
        Job::new_async(self.cron.as_str(), move |_uuid, _lock| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                this.trigger().await;
            })
        })
    }

    /// Register the cron job and start ticking. The returned JobScheduler
    /// keeps running for as long as the runtime does.
    pub async fn start(self: Arc<Self>) -> Result<JobScheduler, JobSchedulerError> {
        let sched = JobScheduler::new().await?;
        sched.add(self.build_job()?).await?;
        sched.start().await?;

        info!(cron = %self.cron, "ingestion scheduler started");
        Ok(sched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;
    use crate::record::RawStatEntry;
    use crate::store::{RecordStore, SqliteStore};
    use crate::testing::{CountingStore, FailingProvider, GatedProvider};

    #[tokio::test]
    async fn test_trigger_runs_cycle_and_returns_to_idle() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let provider = Arc::new(StaticProvider::new(vec![
            RawStatEntry::new("A", "X").with_metric("points", 10.0),
        ]));
        let scheduler = Scheduler::new(Arc::new(Pipeline::new(provider, store.clone())), DEFAULT_CRON);

        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let outcome = scheduler.trigger().await;

        let report = outcome.report().unwrap();
        assert_eq!(report.persisted, 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.last_report().unwrap().run_id, report.run_id);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let provider = Arc::new(GatedProvider::new(vec![
            RawStatEntry::new("A", "X").with_metric("points", 10.0),
        ]));
        let store = Arc::new(CountingStore::new());
        let pipeline = Arc::new(Pipeline::new(provider.clone(), store.clone()));
        let scheduler = Arc::new(Scheduler::new(pipeline, DEFAULT_CRON));

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.trigger().await }
        });

        // Wait until the first cycle is parked inside the provider
        provider.started.notified().await;
        assert_eq!(scheduler.state(), SchedulerState::Running);

        let second = scheduler.trigger().await;
        assert!(second.is_skipped());

        provider.release.notify_one();
        let first = first.await.unwrap();

        assert_eq!(first.report().unwrap().persisted, 1);
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.insert_calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_scheduler_idle() {
        let store = Arc::new(CountingStore::new());
        let scheduler = Scheduler::new(
            Arc::new(Pipeline::new(Arc::new(FailingProvider), store.clone())),
            DEFAULT_CRON,
        );

        let first = scheduler.trigger().await;
        assert!(first.report().unwrap().provider_failed());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        // Next trigger runs again
        let second = scheduler.trigger().await;
        assert!(!second.is_skipped());
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_last_report_survives_poisoned_lock() {
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(Pipeline::new(
                Arc::new(FailingProvider),
                Arc::new(CountingStore::new()),
            )),
            DEFAULT_CRON,
        ));

        let first = scheduler.trigger().await;

        // Panic while holding the lock
        let poisoner = scheduler.clone();
        let joined = std::thread::spawn(move || {
            let _held = poisoner.last_report.lock().unwrap();
            panic!("poison last_report");
        })
        .join();
        assert!(joined.is_err());
        assert!(scheduler.last_report.is_poisoned());

        assert_eq!(
            scheduler.last_report().unwrap().run_id,
            first.report().unwrap().run_id
        );

        let second = scheduler.trigger().await;
        assert_eq!(
            scheduler.last_report().unwrap().run_id,
            second.report().unwrap().run_id
        );
    }

    #[tokio::test]
    async fn test_cron_expression_is_validated() {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(FailingProvider),
            Arc::new(CountingStore::new()),
        ));

        let weekly = Arc::new(Scheduler::new(pipeline.clone(), DEFAULT_CRON));
        assert!(weekly.build_job().is_ok());

        let broken = Arc::new(Scheduler::new(pipeline, "every sunday please"));
        assert!(broken.build_job().is_err());
    }
}
