//! TrackerStore trait definition.

use super::models::{
    Artist, Favorite, NewArtist, NewRelease, NotificationFrequency, NotificationLogEntry,
    NotificationPreference, Release, ReleaseInsertOutcome, User,
};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

/// Storage backend for the release tracking pipeline.
///
/// Implementations are synchronous; async services call them directly, as
/// individual operations are short-lived point queries.
pub trait TrackerStore: Send + Sync {
    // =========================================================================
    // Users
    // =========================================================================

    /// Creates a user together with a default notification preference row,
    /// and returns the user id.
    fn create_user(&self, username: &str, email: &str) -> Result<i64>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// All users, in creation order. Used by `sync_all`.
    fn get_all_users(&self) -> Result<Vec<User>>;

    // =========================================================================
    // Artists
    // =========================================================================

    fn get_artist(&self, artist_id: i64) -> Result<Option<Artist>>;

    /// Look up an artist by its primary catalog identity.
    fn get_artist_by_primary_id(&self, primary_id: &str) -> Result<Option<Artist>>;

    /// Insert a new artist with `last_refreshed_at` set to now.
    fn insert_artist(&self, artist: &NewArtist) -> Result<Artist>;

    /// Attach a secondary catalog identity found by enrichment.
    fn set_artist_secondary_id(&self, artist_id: i64, secondary_id: &str) -> Result<()>;

    /// Update the cached popularity/follower snapshot and bump the refresh
    /// timestamp to now.
    fn update_artist_snapshot(&self, artist_id: i64, popularity: i64, followers: i64)
        -> Result<()>;

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Fails if the (user, artist) pair already exists.
    fn add_favorite(&self, user_id: i64, artist_id: i64, category: &str) -> Result<Favorite>;

    /// Returns the number of rows removed (0 when not favorited).
    fn remove_favorite(&self, user_id: i64, artist_id: i64) -> Result<usize>;

    /// The user's favorites with their artists, newest first.
    fn get_user_favorites(&self, user_id: i64) -> Result<Vec<(Favorite, Artist)>>;

    /// Users who favorited the artist, each with their notification
    /// preferences (defaults when the preference row is missing).
    fn get_users_favoring_artist(
        &self,
        artist_id: i64,
    ) -> Result<Vec<(User, NotificationPreference)>>;

    // =========================================================================
    // Releases
    // =========================================================================

    fn get_release(&self, release_id: i64) -> Result<Option<Release>>;

    /// Existence check on the sync idempotency key.
    fn get_release_by_primary_id(&self, primary_id: &str) -> Result<Option<Release>>;

    /// Insert a release; a duplicate primary id resolves to
    /// `ReleaseInsertOutcome::AlreadyExists` instead of an error.
    fn insert_release(&self, release: &NewRelease) -> Result<ReleaseInsertOutcome>;

    /// Releases of the user's favorited artists whose release date falls in
    /// [start, end], ascending by date.
    fn releases_for_user_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(Release, Artist)>>;

    /// Releases of the user's favorited artists created at or after the
    /// given instant (digest batches key on row creation, not release date).
    fn releases_for_user_created_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<(Release, Artist)>>;

    // =========================================================================
    // Notification preferences
    // =========================================================================

    /// Returns Ok(None) if the user has no preference row.
    fn get_preferences(&self, user_id: i64) -> Result<Option<NotificationPreference>>;

    fn update_preferences(&self, prefs: &NotificationPreference) -> Result<()>;

    /// Users whose email notifications are enabled, optionally narrowed to a
    /// delivery frequency.
    fn users_with_email_enabled(
        &self,
        frequency: Option<NotificationFrequency>,
    ) -> Result<Vec<(User, NotificationPreference)>>;

    // =========================================================================
    // Notification log
    // =========================================================================

    /// Append a dispatch outcome. Write-only from the pipeline.
    fn append_notification_log(
        &self,
        user_id: i64,
        release_id: Option<i64>,
        channel: super::models::NotificationChannel,
        status: super::models::NotificationStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Most recent entries for a user, newest first.
    fn get_notification_history(&self, user_id: i64, limit: usize)
        -> Result<Vec<NotificationLogEntry>>;

    /// Delete entries sent before the cutoff; returns the number removed.
    fn delete_notification_logs_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
