//! Weekly notification job, Monday 09:00 UTC.
//!
//! Runs the weekly batch for users on weekly frequency, then the weekly
//! digest for everyone opted in to it.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::notifications::{NotificationDispatcher, WeeklyDigest};
use crate::tracker_store::NotificationFrequency;
use async_trait::async_trait;
use chrono::{Utc, Weekday};
use std::sync::Arc;

pub struct WeeklyNotificationsJob {
    dispatcher: Arc<NotificationDispatcher>,
    digest: Arc<WeeklyDigest>,
}

impl WeeklyNotificationsJob {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, digest: Arc<WeeklyDigest>) -> Self {
        Self { dispatcher, digest }
    }
}

#[async_trait]
impl BackgroundJob for WeeklyNotificationsJob {
    fn id(&self) -> &'static str {
        "weekly_notifications"
    }

    fn name(&self) -> &'static str {
        "Weekly Notifications"
    }

    fn description(&self) -> &'static str {
        "Deliver weekly batches and the weekly digest"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Weekly {
            weekday: Weekday::Mon,
            hour: 9,
            minute: 0,
        }
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.dispatcher
            .send_batch(NotificationFrequency::Weekly)
            .await?;
        let stats = self.digest.send_all(Utc::now().date_naive()).await?;
        tracing::info!(
            "Weekly digest delivered {} email(s)",
            stats.emails_sent
        );
        Ok(())
    }
}
