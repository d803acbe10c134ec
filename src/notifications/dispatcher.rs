//! Per-release notification dispatch.
//!
//! Users with immediate frequency are mailed as soon as a release lands;
//! daily and weekly users accumulate releases that `send_batch` delivers on
//! its schedule. Every attempt is recorded in the notification log.

use crate::email::{batch_notification_email, release_notification_email, EmailSender};
use crate::tracker_store::{
    Artist, NotificationChannel, NotificationFrequency, NotificationPreference,
    NotificationStatus, Release, TrackerStore,
};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

pub struct NotificationDispatcher {
    store: Arc<dyn TrackerStore>,
    email: Arc<dyn EmailSender>,
}

fn wants_release(prefs: &NotificationPreference, release: &Release) -> bool {
    prefs.email_enabled && prefs.allows_type(release.release_type)
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn TrackerStore>, email: Arc<dyn EmailSender>) -> Self {
        Self { store, email }
    }

    /// Notify everyone following the release's artist. Only users with
    /// immediate frequency are mailed here; daily and weekly users are
    /// deliberately skipped and receive the release in their next batch
    /// digest instead, so no release is delivered to the same user twice.
    pub async fn notify_new_release(&self, release: &Release, artist: &Artist) -> Result<()> {
        let listeners = self.store.get_users_favoring_artist(artist.id)?;
        tracing::info!(
            "Dispatching '{}' by {} to {} follower(s)",
            release.name,
            artist.name,
            listeners.len()
        );

        for (user, prefs) in listeners {
            if prefs.frequency != NotificationFrequency::Immediate
                || !wants_release(&prefs, release)
            {
                tracing::debug!("Skipping {} (preferences)", user.email);
                continue;
            }

            let message = release_notification_email(&user, artist, release);
            let sent = self.email.send(&message).await;
            self.log(user.id, Some(release.id), sent);
        }
        Ok(())
    }

    /// Deliver accumulated releases to users on the given batch frequency:
    /// one digest email per user with at least one qualifying release. Daily
    /// covers the trailing 24 hours, weekly the trailing 7 days, both keyed
    /// on when the release row was created. Returns the number of emails
    /// sent.
    pub async fn send_batch(&self, frequency: NotificationFrequency) -> Result<usize> {
        let window = match frequency {
            NotificationFrequency::Daily => Duration::hours(24),
            NotificationFrequency::Weekly => Duration::days(7),
            NotificationFrequency::Immediate => {
                anyhow::bail!("Immediate frequency has no batch window")
            }
        };
        let since = Utc::now() - window;

        let mut emails_sent = 0;
        for (user, prefs) in self.store.users_with_email_enabled(Some(frequency))? {
            let releases: Vec<_> = self
                .store
                .releases_for_user_created_since(user.id, since)?
                .into_iter()
                .filter(|(release, _)| prefs.allows_type(release.release_type))
                .collect();
            if releases.is_empty() {
                continue;
            }

            let message = batch_notification_email(&user, &releases);
            let sent = self.email.send(&message).await;
            if sent {
                emails_sent += 1;
            }
            self.log_batch(user.id, releases.len(), sent);
        }
        tracing::info!(
            "Batch run ({}) delivered {} email(s)",
            frequency.as_str(),
            emails_sent
        );
        Ok(emails_sent)
    }

    // Log writes never fail a dispatch that already happened.
    fn log(&self, user_id: i64, release_id: Option<i64>, sent: bool) {
        self.append_log(user_id, release_id, sent, None);
    }

    fn log_batch(&self, user_id: i64, release_count: usize, sent: bool) {
        let metadata = serde_json::json!({ "release_count": release_count });
        self.append_log(user_id, None, sent, Some(metadata));
    }

    fn append_log(
        &self,
        user_id: i64,
        release_id: Option<i64>,
        sent: bool,
        metadata: Option<serde_json::Value>,
    ) {
        let status = if sent {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        };
        if let Err(err) = self.store.append_notification_log(
            user_id,
            release_id,
            NotificationChannel::Email,
            status,
            metadata,
        ) {
            tracing::error!("Failed to record notification log entry: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::test_support::RecordingSender;
    use crate::tracker_store::{
        NewArtist, NewRelease, ReleaseInsertOutcome, ReleaseType, SqliteTrackerStore,
    };
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<SqliteTrackerStore>,
        sender: Arc<RecordingSender>,
        dispatcher: NotificationDispatcher,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteTrackerStore::in_memory().unwrap());
        let sender = Arc::new(RecordingSender::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), sender.clone());
        Fixture {
            store,
            sender,
            dispatcher,
        }
    }

    fn seed_artist(store: &SqliteTrackerStore) -> Artist {
        store
            .insert_artist(&NewArtist {
                primary_id: "sp1".to_string(),
                secondary_id: None,
                name: "Artist".to_string(),
                genres: vec![],
                image_url: None,
                popularity: 50,
                followers: 1000,
            })
            .unwrap()
    }

    fn seed_release(
        store: &SqliteTrackerStore,
        artist_id: i64,
        primary_id: &str,
        release_type: ReleaseType,
    ) -> Release {
        match store
            .insert_release(&NewRelease {
                primary_id: primary_id.to_string(),
                secondary_id: None,
                name: format!("Release {}", primary_id),
                release_type,
                release_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                image_url: None,
                primary_url: format!("https://catalog.example/{}", primary_id),
                secondary_url: None,
                track_count: None,
                artist_id,
            })
            .unwrap()
        {
            ReleaseInsertOutcome::Created(release) => release,
            ReleaseInsertOutcome::AlreadyExists => panic!("release already seeded"),
        }
    }

    #[tokio::test]
    async fn test_immediate_followers_are_mailed_and_logged() {
        let f = fixture();
        let user_id = f.store.create_user("ada", "ada@example.com").unwrap();
        let artist = seed_artist(&f.store);
        f.store.add_favorite(user_id, artist.id, "default").unwrap();
        let release = seed_release(&f.store, artist.id, "rel1", ReleaseType::Album);

        f.dispatcher
            .notify_new_release(&release, &artist)
            .await
            .unwrap();

        let messages = f.sender.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "ada@example.com");

        let history = f.store.get_notification_history(user_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, NotificationStatus::Sent);
        assert_eq!(history[0].release_id, Some(release.id));
    }

    #[tokio::test]
    async fn test_type_opt_out_blocks_dispatch() {
        let f = fixture();
        let user_id = f.store.create_user("ada", "ada@example.com").unwrap();
        let artist = seed_artist(&f.store);
        f.store.add_favorite(user_id, artist.id, "default").unwrap();

        let mut prefs = f.store.get_preferences(user_id).unwrap().unwrap();
        prefs.new_single = false;
        f.store.update_preferences(&prefs).unwrap();

        let single = seed_release(&f.store, artist.id, "rel-s", ReleaseType::Single);
        let album = seed_release(&f.store, artist.id, "rel-a", ReleaseType::Album);

        f.dispatcher
            .notify_new_release(&single, &artist)
            .await
            .unwrap();
        f.dispatcher
            .notify_new_release(&album, &artist)
            .await
            .unwrap();

        let messages = f.sender.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].subject.contains("Artist"));
        let history = f.store.get_notification_history(user_id, 10).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_non_immediate_users_wait_for_batch() {
        let f = fixture();
        let user_id = f.store.create_user("ada", "ada@example.com").unwrap();
        let artist = seed_artist(&f.store);
        f.store.add_favorite(user_id, artist.id, "default").unwrap();

        let mut prefs = f.store.get_preferences(user_id).unwrap().unwrap();
        prefs.frequency = NotificationFrequency::Daily;
        f.store.update_preferences(&prefs).unwrap();

        let release = seed_release(&f.store, artist.id, "rel1", ReleaseType::Album);
        f.dispatcher
            .notify_new_release(&release, &artist)
            .await
            .unwrap();
        assert!(f.sender.messages().is_empty());

        let sent = f
            .dispatcher
            .send_batch(NotificationFrequency::Daily)
            .await
            .unwrap();
        assert_eq!(sent, 1);
        assert_eq!(f.sender.messages().len(), 1);

        let history = f.store.get_notification_history(user_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].metadata.as_ref().unwrap()["release_count"], 1);
    }

    #[tokio::test]
    async fn test_batch_respects_type_opt_out() {
        let f = fixture();
        let user_id = f.store.create_user("ada", "ada@example.com").unwrap();
        let artist = seed_artist(&f.store);
        f.store.add_favorite(user_id, artist.id, "default").unwrap();

        let mut prefs = f.store.get_preferences(user_id).unwrap().unwrap();
        prefs.frequency = NotificationFrequency::Daily;
        prefs.new_single = false;
        f.store.update_preferences(&prefs).unwrap();

        seed_release(&f.store, artist.id, "rel-s", ReleaseType::Single);
        seed_release(&f.store, artist.id, "rel-a", ReleaseType::Album);

        let sent = f
            .dispatcher
            .send_batch(NotificationFrequency::Daily)
            .await
            .unwrap();
        assert_eq!(sent, 1);

        // One digest mail listing only the album
        let messages = f.sender.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].html_body.contains("Release rel-a"));
        assert!(!messages[0].html_body.contains("Release rel-s"));
    }

    #[tokio::test]
    async fn test_failed_delivery_is_logged_as_failed() {
        let store = Arc::new(SqliteTrackerStore::in_memory().unwrap());
        let sender = Arc::new(RecordingSender::rejecting());
        let dispatcher = NotificationDispatcher::new(store.clone(), sender.clone());

        let user_id = store.create_user("ada", "ada@example.com").unwrap();
        let artist = seed_artist(&store);
        store.add_favorite(user_id, artist.id, "default").unwrap();
        let release = seed_release(&store, artist.id, "rel1", ReleaseType::Album);

        dispatcher
            .notify_new_release(&release, &artist)
            .await
            .unwrap();

        let history = store.get_notification_history(user_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, NotificationStatus::Failed);
    }

    #[tokio::test]
    async fn test_immediate_batch_is_rejected() {
        let f = fixture();
        assert!(f
            .dispatcher
            .send_batch(NotificationFrequency::Immediate)
            .await
            .is_err());
    }
}
