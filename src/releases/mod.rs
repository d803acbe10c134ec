//! Release synchronization from the catalogs into the store.
//!
//! A sync walks a user's favorite artists, pulls each artist's releases
//! from the primary catalog, persists the ones inside the sync window that
//! aren't stored yet, and hands freshly released ones to the dispatcher.

use crate::catalog::{CatalogRelease, PrimaryCatalog, SecondaryCatalog};
use crate::matching;
use crate::notifications::NotificationDispatcher;
use crate::tracker_store::{
    Artist, NewRelease, Release, ReleaseInsertOutcome, ReleaseType, TrackerStore,
};
use anyhow::Result;
use chrono::{Duration, Months, NaiveDate, Utc};
use std::sync::Arc;

const SECONDARY_ALBUM_LOOKUP_LIMIT: usize = 50;

/// Whether a release date falls inside the sync window: six months back
/// through six months ahead of `today`, both ends inclusive.
pub fn within_sync_window(release_date: NaiveDate, today: NaiveDate) -> bool {
    let start = today
        .checked_sub_months(Months::new(6))
        .unwrap_or(NaiveDate::MIN);
    let end = today
        .checked_add_months(Months::new(6))
        .unwrap_or(NaiveDate::MAX);
    release_date >= start && release_date <= end
}

/// Whether a release is fresh enough to notify about: within the trailing
/// seven days, and not in the future. Future-dated pre-releases are stored
/// but notified once their date arrives.
pub fn is_recent(release_date: NaiveDate, today: NaiveDate) -> bool {
    release_date >= today - Duration::days(7) && release_date <= today
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub created: Vec<(Release, Artist)>,
    pub artists_synced: usize,
    pub artists_failed: usize,
}

impl SyncOutcome {
    pub fn summary(&self) -> String {
        format!(
            "{} new release(s) across {} artist(s), {} artist(s) failed",
            self.created.len(),
            self.artists_synced,
            self.artists_failed
        )
    }
}

pub struct ReleaseSynchronizer {
    store: Arc<dyn TrackerStore>,
    primary: Arc<dyn PrimaryCatalog>,
    secondary: Arc<dyn SecondaryCatalog>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ReleaseSynchronizer {
    pub fn new(
        store: Arc<dyn TrackerStore>,
        primary: Arc<dyn PrimaryCatalog>,
        secondary: Arc<dyn SecondaryCatalog>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            primary,
            secondary,
            dispatcher,
        }
    }

    /// Sync releases for one user's favorite artists. A failing artist is
    /// logged and skipped; the remaining artists still sync.
    pub async fn sync_for_user(&self, user_id: i64) -> Result<SyncOutcome> {
        let favorites = self.store.get_user_favorites(user_id)?;
        let today = Utc::now().date_naive();

        let mut outcome = SyncOutcome {
            created: Vec::new(),
            artists_synced: 0,
            artists_failed: 0,
        };
        for (_, artist) in favorites {
            match self.sync_artist(&artist, today).await {
                Ok(mut created) => {
                    outcome.artists_synced += 1;
                    outcome
                        .created
                        .extend(created.drain(..).map(|r| (r, artist.clone())));
                }
                Err(err) => {
                    outcome.artists_failed += 1;
                    tracing::error!("Sync failed for artist '{}': {}", artist.name, err);
                }
            }
        }

        for (release, artist) in &outcome.created {
            if !is_recent(release.release_date, today) {
                continue;
            }
            if let Err(err) = self.dispatcher.notify_new_release(release, artist).await {
                tracing::error!(
                    "Notification dispatch failed for '{}': {}",
                    release.name,
                    err
                );
            }
        }

        tracing::info!("Sync for user {}: {}", user_id, outcome.summary());
        Ok(outcome)
    }

    /// Sync every user. Per-user failures don't stop the run.
    pub async fn sync_all(&self) -> Result<usize> {
        let users = self.store.get_all_users()?;
        let mut total_created = 0;
        for user in users {
            match self.sync_for_user(user.id).await {
                Ok(outcome) => total_created += outcome.created.len(),
                Err(err) => {
                    tracing::error!("Sync failed for user {}: {}", user.id, err);
                }
            }
        }
        Ok(total_created)
    }

    async fn sync_artist(&self, artist: &Artist, today: NaiveDate) -> Result<Vec<Release>> {
        let catalog_releases = self.primary.get_artist_releases(&artist.primary_id).await?;

        let mut created = Vec::new();
        for catalog_release in catalog_releases {
            if !within_sync_window(catalog_release.release_date, today) {
                continue;
            }
            if self
                .store
                .get_release_by_primary_id(&catalog_release.id)?
                .is_some()
            {
                continue;
            }

            let (secondary_id, secondary_url) =
                self.match_secondary_album(artist, &catalog_release).await;

            let new_release = NewRelease {
                primary_id: catalog_release.id,
                secondary_id,
                name: catalog_release.name,
                release_type: ReleaseType::from_primary_catalog(&catalog_release.album_type),
                release_date: catalog_release.release_date,
                image_url: catalog_release.image_url,
                primary_url: catalog_release.url,
                secondary_url,
                track_count: catalog_release.total_tracks,
                artist_id: artist.id,
            };
            match self.store.insert_release(&new_release)? {
                ReleaseInsertOutcome::Created(release) => {
                    tracing::info!("New release '{}' by {}", release.name, artist.name);
                    created.push(release);
                }
                // Raced with a concurrent sync, the release is already in
                ReleaseInsertOutcome::AlreadyExists => {}
            }
        }
        Ok(created)
    }

    /// Best-effort cross-link of a release to the secondary catalog by
    /// normalized name. Failures leave the release unlinked.
    async fn match_secondary_album(
        &self,
        artist: &Artist,
        release: &CatalogRelease,
    ) -> (Option<String>, Option<String>) {
        let Some(secondary_artist_id) = artist.secondary_id.as_deref() else {
            return (None, None);
        };
        match self
            .secondary
            .get_artist_albums(secondary_artist_id, SECONDARY_ALBUM_LOOKUP_LIMIT)
            .await
        {
            Ok(albums) => {
                let matched = albums
                    .into_iter()
                    .find(|album| matching::names_match(&album.name, &release.name));
                match matched {
                    Some(album) => (Some(album.id), album.url),
                    None => (None, None),
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Secondary album lookup failed for '{}': {}",
                    release.name,
                    err
                );
                (None, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogArtist, CatalogError, SecondaryAlbum, SecondaryArtist};
    use crate::email::{EmailMessage, EmailSender};
    use crate::tracker_store::{NewArtist, SqliteTrackerStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakePrimary {
        releases: Mutex<HashMap<String, Vec<CatalogRelease>>>,
        failing_artists: Vec<String>,
    }

    impl FakePrimary {
        fn new() -> Self {
            Self {
                releases: Mutex::new(HashMap::new()),
                failing_artists: Vec::new(),
            }
        }

        fn with_releases(self, artist_id: &str, releases: Vec<CatalogRelease>) -> Self {
            self.releases
                .lock()
                .unwrap()
                .insert(artist_id.to_string(), releases);
            self
        }

        fn failing_for(mut self, artist_id: &str) -> Self {
            self.failing_artists.push(artist_id.to_string());
            self
        }
    }

    #[async_trait]
    impl PrimaryCatalog for FakePrimary {
        async fn search_artists(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<CatalogArtist>, CatalogError> {
            Ok(vec![])
        }

        async fn get_artist(&self, _id: &str) -> Result<CatalogArtist, CatalogError> {
            Err(CatalogError::NotFound)
        }

        async fn get_artist_releases(
            &self,
            id: &str,
        ) -> Result<Vec<CatalogRelease>, CatalogError> {
            if self.failing_artists.iter().any(|a| a == id) {
                return Err(CatalogError::Unavailable("boom".to_string()));
            }
            Ok(self
                .releases
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_default())
        }
    }

    struct FakeSecondary {
        albums: Vec<SecondaryAlbum>,
    }

    #[async_trait]
    impl SecondaryCatalog for FakeSecondary {
        async fn search_artists(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SecondaryArtist>, CatalogError> {
            Ok(vec![])
        }

        async fn get_artist(&self, _id: &str) -> Result<SecondaryArtist, CatalogError> {
            Err(CatalogError::NotFound)
        }

        async fn find_artist_by_name(
            &self,
            _name: &str,
        ) -> Result<Option<SecondaryArtist>, CatalogError> {
            Ok(None)
        }

        async fn get_artist_albums(
            &self,
            _id: &str,
            _limit: usize,
        ) -> Result<Vec<SecondaryAlbum>, CatalogError> {
            Ok(self.albums.clone())
        }
    }

    struct NullSender;

    #[async_trait]
    impl EmailSender for NullSender {
        async fn send(&self, _message: &EmailMessage) -> bool {
            true
        }
    }

    fn catalog_release(id: &str, name: &str, date: NaiveDate) -> CatalogRelease {
        CatalogRelease {
            id: id.to_string(),
            name: name.to_string(),
            album_type: "album".to_string(),
            release_date: date,
            total_tracks: Some(10),
            image_url: None,
            url: format!("https://catalog.example/{}", id),
        }
    }

    fn seed_favorite(
        store: &SqliteTrackerStore,
        user_id: i64,
        primary_id: &str,
        secondary_id: Option<&str>,
    ) -> Artist {
        let artist = store
            .insert_artist(&NewArtist {
                primary_id: primary_id.to_string(),
                secondary_id: secondary_id.map(String::from),
                name: format!("Artist {}", primary_id),
                genres: vec![],
                image_url: None,
                popularity: 0,
                followers: 0,
            })
            .unwrap();
        store.add_favorite(user_id, artist.id, "default").unwrap();
        artist
    }

    fn synchronizer(
        primary: FakePrimary,
        secondary: FakeSecondary,
    ) -> (ReleaseSynchronizer, Arc<SqliteTrackerStore>) {
        let store = Arc::new(SqliteTrackerStore::in_memory().unwrap());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            Arc::new(NullSender),
        ));
        let sync = ReleaseSynchronizer::new(
            store.clone(),
            Arc::new(primary),
            Arc::new(secondary),
            dispatcher,
        );
        (sync, store)
    }

    #[test]
    fn test_sync_window_boundaries() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        // Exactly six months either way is in
        assert!(within_sync_window(
            NaiveDate::from_ymd_opt(2023, 12, 15).unwrap(),
            today
        ));
        assert!(within_sync_window(
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            today
        ));
        // One day beyond is out
        assert!(!within_sync_window(
            NaiveDate::from_ymd_opt(2023, 12, 14).unwrap(),
            today
        ));
        assert!(!within_sync_window(
            NaiveDate::from_ymd_opt(2024, 12, 16).unwrap(),
            today
        ));
        assert!(within_sync_window(today, today));
    }

    #[test]
    fn test_recency_gate() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(is_recent(today, today));
        assert!(is_recent(today - Duration::days(3), today));
        assert!(is_recent(today - Duration::days(7), today));
        assert!(!is_recent(today - Duration::days(10), today));
        // Future-dated pre-releases are not yet notifiable
        assert!(!is_recent(today + Duration::days(1), today));
    }

    #[tokio::test]
    async fn test_sync_persists_new_releases_once() {
        let today = Utc::now().date_naive();
        let primary = FakePrimary::new().with_releases(
            "sp1",
            vec![
                catalog_release("rel1", "First", today - Duration::days(3)),
                catalog_release("rel2", "Second", today - Duration::days(40)),
            ],
        );
        let (sync, store) = synchronizer(primary, FakeSecondary { albums: vec![] });
        let user_id = store.create_user("ada", "ada@example.com").unwrap();
        seed_favorite(&store, user_id, "sp1", None);

        let outcome = sync.sync_for_user(user_id).await.unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.artists_failed, 0);

        // Second run is a no-op
        let outcome = sync.sync_for_user(user_id).await.unwrap();
        assert!(outcome.created.is_empty());
        assert!(store.get_release_by_primary_id("rel1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_skips_releases_outside_window() {
        let today = Utc::now().date_naive();
        let primary = FakePrimary::new().with_releases(
            "sp1",
            vec![
                catalog_release("rel-old", "Old", today - Duration::days(365)),
                catalog_release("rel-far", "Far", today + Duration::days(365)),
                catalog_release("rel-in", "In", today),
            ],
        );
        let (sync, store) = synchronizer(primary, FakeSecondary { albums: vec![] });
        let user_id = store.create_user("ada", "ada@example.com").unwrap();
        seed_favorite(&store, user_id, "sp1", None);

        let outcome = sync.sync_for_user(user_id).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].0.primary_id, "rel-in");
    }

    #[tokio::test]
    async fn test_one_failing_artist_does_not_stop_the_sync() {
        let today = Utc::now().date_naive();
        let primary = FakePrimary::new()
            .with_releases("sp1", vec![catalog_release("rel1", "One", today)])
            .with_releases("sp3", vec![catalog_release("rel3", "Three", today)])
            .failing_for("sp2");
        let (sync, store) = synchronizer(primary, FakeSecondary { albums: vec![] });
        let user_id = store.create_user("ada", "ada@example.com").unwrap();
        seed_favorite(&store, user_id, "sp1", None);
        seed_favorite(&store, user_id, "sp2", None);
        seed_favorite(&store, user_id, "sp3", None);

        let outcome = sync.sync_for_user(user_id).await.unwrap();
        assert_eq!(outcome.artists_failed, 1);
        assert_eq!(outcome.artists_synced, 2);
        let ids: Vec<&str> = outcome
            .created
            .iter()
            .map(|(r, _)| r.primary_id.as_str())
            .collect();
        assert!(ids.contains(&"rel1"));
        assert!(ids.contains(&"rel3"));
    }

    #[tokio::test]
    async fn test_secondary_album_is_cross_linked_by_name() {
        let today = Utc::now().date_naive();
        let primary = FakePrimary::new()
            .with_releases("sp1", vec![catalog_release("rel1", "Utopía", today)]);
        let secondary = FakeSecondary {
            albums: vec![SecondaryAlbum {
                id: "dz9".to_string(),
                name: "Utopia".to_string(),
                url: Some("https://secondary.example/album/dz9".to_string()),
            }],
        };
        let (sync, store) = synchronizer(primary, secondary);
        let user_id = store.create_user("ada", "ada@example.com").unwrap();
        seed_favorite(&store, user_id, "sp1", Some("dz-artist"));

        let outcome = sync.sync_for_user(user_id).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
        let release = &outcome.created[0].0;
        assert_eq!(release.secondary_id.as_deref(), Some("dz9"));
        assert_eq!(
            release.secondary_url.as_deref(),
            Some("https://secondary.example/album/dz9")
        );
    }

    #[tokio::test]
    async fn test_recent_release_triggers_notification() {
        let today = Utc::now().date_naive();
        let primary = FakePrimary::new().with_releases(
            "sp1",
            vec![
                catalog_release("rel-now", "Now", today - Duration::days(3)),
                catalog_release("rel-old", "Old", today - Duration::days(60)),
            ],
        );
        let (sync, store) = synchronizer(primary, FakeSecondary { albums: vec![] });
        let user_id = store.create_user("ada", "ada@example.com").unwrap();
        seed_favorite(&store, user_id, "sp1", None);

        sync.sync_for_user(user_id).await.unwrap();

        // Only the recent release produced a notification log entry
        let history = store.get_notification_history(user_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        let notified = store.get_release(history[0].release_id.unwrap()).unwrap();
        assert_eq!(notified.unwrap().primary_id, "rel-now");
    }

    #[tokio::test]
    async fn test_sync_all_covers_every_user() {
        let today = Utc::now().date_naive();
        let primary = FakePrimary::new()
            .with_releases("sp1", vec![catalog_release("rel1", "One", today)])
            .with_releases("sp2", vec![catalog_release("rel2", "Two", today)]);
        let (sync, store) = synchronizer(primary, FakeSecondary { albums: vec![] });

        let ada = store.create_user("ada", "ada@example.com").unwrap();
        let bob = store.create_user("bob", "bob@example.com").unwrap();
        seed_favorite(&store, ada, "sp1", None);
        seed_favorite(&store, bob, "sp2", None);

        let created = sync.sync_all().await.unwrap();
        assert_eq!(created, 2);
    }
}
