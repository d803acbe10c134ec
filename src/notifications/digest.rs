//! Weekly digest: one email per user listing the week's releases from their
//! favorite artists.

use crate::email::{weekly_summary_email, EmailSender};
use crate::tracker_store::{
    NotificationChannel, NotificationStatus, TrackerStore,
};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use std::sync::Arc;

/// Monday through Sunday of the week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

#[derive(Debug, Default, PartialEq)]
pub struct DigestStats {
    pub users_with_releases: usize,
    pub emails_sent: usize,
}

pub struct WeeklyDigest {
    store: Arc<dyn TrackerStore>,
    email: Arc<dyn EmailSender>,
}

impl WeeklyDigest {
    pub fn new(store: Arc<dyn TrackerStore>, email: Arc<dyn EmailSender>) -> Self {
        Self { store, email }
    }

    /// Send the digest for the week containing `today` to every opted-in
    /// user. Users with no releases this week are skipped entirely.
    pub async fn send_all(&self, today: NaiveDate) -> Result<DigestStats> {
        let (week_start, week_end) = week_bounds(today);
        tracing::info!("Building weekly digests for {} to {}", week_start, week_end);

        let mut stats = DigestStats::default();
        for (user, prefs) in self.store.users_with_email_enabled(None)? {
            if !prefs.weekly_summary {
                continue;
            }

            let releases = self
                .store
                .releases_for_user_between(user.id, week_start, week_end)?;
            if releases.is_empty() {
                tracing::debug!("No releases this week for {}", user.email);
                continue;
            }
            stats.users_with_releases += 1;

            let message = weekly_summary_email(&user, &releases, week_start, week_end);
            if self.email.send(&message).await {
                stats.emails_sent += 1;
                if let Err(err) = self.store.append_notification_log(
                    user.id,
                    None,
                    NotificationChannel::WeeklySummary,
                    NotificationStatus::Sent,
                    Some(serde_json::json!({ "release_count": releases.len() })),
                ) {
                    tracing::error!("Failed to record digest log entry: {}", err);
                }
            } else {
                tracing::error!("Weekly digest delivery failed for {}", user.email);
            }
        }

        tracing::info!(
            "Weekly digests: {}/{} emails sent",
            stats.emails_sent,
            stats.users_with_releases
        );
        Ok(stats)
    }
}
