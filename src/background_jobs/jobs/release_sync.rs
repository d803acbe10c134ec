//! Hourly release synchronization job.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::releases::ReleaseSynchronizer;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub struct ReleaseSyncJob {
    synchronizer: Arc<ReleaseSynchronizer>,
}

impl ReleaseSyncJob {
    pub fn new(synchronizer: Arc<ReleaseSynchronizer>) -> Self {
        Self { synchronizer }
    }
}

#[async_trait]
impl BackgroundJob for ReleaseSyncJob {
    fn id(&self) -> &'static str {
        "release_sync"
    }

    fn name(&self) -> &'static str {
        "Release Sync"
    }

    fn description(&self) -> &'static str {
        "Sync favorite artists' releases from the catalogs"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(Duration::from_secs(60 * 60))
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let created = self.synchronizer.sync_all().await?;
        tracing::info!("Hourly sync stored {} new release(s)", created);
        Ok(())
    }
}
