//! Daily batch notification job, 09:00 UTC.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::notifications::NotificationDispatcher;
use crate::tracker_store::NotificationFrequency;
use async_trait::async_trait;
use std::sync::Arc;

pub struct DailyNotificationsJob {
    dispatcher: Arc<NotificationDispatcher>,
}

impl DailyNotificationsJob {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl BackgroundJob for DailyNotificationsJob {
    fn id(&self) -> &'static str {
        "daily_notifications"
    }

    fn name(&self) -> &'static str {
        "Daily Notifications"
    }

    fn description(&self) -> &'static str {
        "Deliver the day's releases to users on daily frequency"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Daily { hour: 9, minute: 0 }
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.dispatcher
            .send_batch(NotificationFrequency::Daily)
            .await?;
        Ok(())
    }
}
