//! Notification log cleanup job, Sunday 02:00 UTC.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::tracker_store::TrackerStore;
use async_trait::async_trait;
use chrono::{Months, Utc, Weekday};
use std::sync::Arc;

const RETENTION_MONTHS: u32 = 3;

pub struct NotificationLogCleanupJob {
    store: Arc<dyn TrackerStore>,
}

impl NotificationLogCleanupJob {
    pub fn new(store: Arc<dyn TrackerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BackgroundJob for NotificationLogCleanupJob {
    fn id(&self) -> &'static str {
        "notification_log_cleanup"
    }

    fn name(&self) -> &'static str {
        "Notification Log Cleanup"
    }

    fn description(&self) -> &'static str {
        "Delete notification log entries past the retention period"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Weekly {
            weekday: Weekday::Sun,
            hour: 2,
            minute: 0,
        }
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let cutoff = Utc::now()
            .checked_sub_months(Months::new(RETENTION_MONTHS))
            .ok_or_else(|| JobError::ExecutionFailed("Cutoff out of range".to_string()))?;
        let removed = self.store.delete_notification_logs_before(cutoff)?;
        tracing::info!("Removed {} old notification log entries", removed);
        Ok(())
    }
}
