//! Job scheduler: owns the registered jobs and one driver task per job.
//!
//! The scheduler is an owned value with an explicit lifecycle: register
//! jobs, `init()` to start the driver tasks, `shutdown()` to cancel them
//! and wait for completion. No global state is involved; dropping the
//! scheduler without `init()` runs nothing.

use super::context::JobContext;
use super::job::BackgroundJob;
use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct JobScheduler {
    jobs: Vec<Arc<dyn BackgroundJob>>,
    cancellation_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    initialized: bool,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            cancellation_token: CancellationToken::new(),
            handles: Vec::new(),
            initialized: false,
        }
    }

    /// Register a job. Only allowed before `init()`.
    pub fn register(&mut self, job: Arc<dyn BackgroundJob>) -> Result<()> {
        if self.initialized {
            bail!("Cannot register job '{}' after init", job.id());
        }
        if self.jobs.iter().any(|j| j.id() == job.id()) {
            bail!("Job '{}' is already registered", job.id());
        }
        self.jobs.push(job);
        Ok(())
    }

    pub fn job_ids(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.id()).collect()
    }

    /// Spawn one driver task per registered job. Calling `init()` on an
    /// already-running scheduler is a no-op.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            tracing::debug!("Scheduler already initialized, ignoring init()");
            return Ok(());
        }
        self.initialized = true;

        for job in &self.jobs {
            let job = job.clone();
            let token = self.cancellation_token.clone();
            tracing::info!("Scheduling job '{}' ({})", job.id(), job.description());
            self.handles.push(tokio::spawn(drive_job(job, token)));
        }
        Ok(())
    }

    /// Cancel all driver tasks and wait for them to finish. The scheduler
    /// returns to its pre-init state; a later `init()` starts the jobs again.
    pub async fn shutdown(&mut self) {
        self.cancellation_token.cancel();
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::error!("Job driver task panicked: {}", err);
            }
        }
        self.cancellation_token = CancellationToken::new();
        self.initialized = false;
        tracing::info!("Job scheduler stopped");
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn drive_job(job: Arc<dyn BackgroundJob>, token: CancellationToken) {
    let ctx = JobContext::new(token.clone());
    loop {
        let next_run = job.schedule().next_run(Utc::now());
        let wait = (next_run - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        tracing::debug!("Job '{}' sleeping until {}", job.id(), next_run);

        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Job '{}' cancelled", job.id());
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let started = Utc::now();
        tracing::info!("Running job '{}'", job.id());
        match job.execute(&ctx).await {
            Ok(()) => {
                tracing::info!(
                    "Job '{}' finished in {}ms",
                    job.id(),
                    (Utc::now() - started).num_milliseconds()
                );
            }
            Err(err) => {
                tracing::error!("Job '{}' failed: {}", job.id(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::job::{JobError, JobSchedule};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        interval: Duration,
    }

    #[async_trait]
    impl BackgroundJob for CountingJob {
        fn id(&self) -> &'static str {
            "counting"
        }

        fn name(&self) -> &'static str {
            "Counting"
        }

        fn description(&self) -> &'static str {
            "Counts executions"
        }

        fn schedule(&self) -> JobSchedule {
            JobSchedule::Interval(self.interval)
        }

        async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_interval_job_runs_repeatedly() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .register(Arc::new(CountingJob {
                runs: runs.clone(),
                interval: Duration::from_millis(10),
            }))
            .unwrap();
        scheduler.init().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        let count = runs.load(Ordering::SeqCst);
        assert!(count >= 2, "expected repeated runs, got {}", count);

        // No further runs after shutdown
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), count);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .register(Arc::new(CountingJob {
                runs: runs.clone(),
                interval: Duration::from_secs(60),
            }))
            .unwrap();
        assert!(scheduler
            .register(Arc::new(CountingJob {
                runs,
                interval: Duration::from_secs(60),
            }))
            .is_err());
    }

    #[tokio::test]
    async fn test_registration_after_init_rejected() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler.init().unwrap();
        assert!(scheduler
            .register(Arc::new(CountingJob {
                runs,
                interval: Duration::from_secs(60),
            }))
            .is_err());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_repeated_init_is_a_noop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .register(Arc::new(CountingJob {
                runs: runs.clone(),
                interval: Duration::from_secs(60),
            }))
            .unwrap();
        scheduler.init().unwrap();
        scheduler.init().unwrap();

        // Only one driver task exists for the job
        assert_eq!(scheduler.handles.len(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_init_after_shutdown_restarts_jobs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler
            .register(Arc::new(CountingJob {
                runs: runs.clone(),
                interval: Duration::from_millis(10),
            }))
            .unwrap();

        scheduler.init().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown().await;
        let after_first_round = runs.load(Ordering::SeqCst);
        assert!(after_first_round > 0);

        scheduler.init().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown().await;
        assert!(runs.load(Ordering::SeqCst) > after_first_round);
    }
}
