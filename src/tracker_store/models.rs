//! Tracker data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release type as persisted and as used for notification gating.
///
/// The primary catalog reports `compilation` for what we store as EP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseType {
    Album,
    Single,
    Ep,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Album => "ALBUM",
            ReleaseType::Single => "SINGLE",
            ReleaseType::Ep => "EP",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ALBUM" => Some(ReleaseType::Album),
            "SINGLE" => Some(ReleaseType::Single),
            "EP" => Some(ReleaseType::Ep),
            _ => None,
        }
    }

    /// Map a primary-catalog album group to a stored release type.
    /// Unknown groups fall back to single.
    pub fn from_primary_catalog(album_type: &str) -> Self {
        match album_type {
            "album" => ReleaseType::Album,
            "single" => ReleaseType::Single,
            "compilation" => ReleaseType::Ep,
            _ => ReleaseType::Single,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub id: i64,
    /// Primary catalog identity, unique per artist.
    pub primary_id: String,
    /// Secondary catalog identity, attached best-effort by enrichment.
    pub secondary_id: Option<String>,
    pub name: String,
    pub genres: Vec<String>,
    pub image_url: Option<String>,
    pub popularity: i64,
    pub followers: i64,
    /// When the popularity/follower snapshot was last refreshed.
    pub last_refreshed_at: DateTime<Utc>,
}

/// Insertable artist row, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewArtist {
    pub primary_id: String,
    pub secondary_id: Option<String>,
    pub name: String,
    pub genres: Vec<String>,
    pub image_url: Option<String>,
    pub popularity: i64,
    pub followers: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub artist_id: i64,
    pub category: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub id: i64,
    /// Primary catalog identity, unique per release. This is the sync
    /// idempotency key: a row existing for this id means "already synced".
    pub primary_id: String,
    pub secondary_id: Option<String>,
    pub name: String,
    pub release_type: ReleaseType,
    pub release_date: chrono::NaiveDate,
    pub image_url: Option<String>,
    pub primary_url: String,
    pub secondary_url: Option<String>,
    pub track_count: Option<i64>,
    pub artist_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRelease {
    pub primary_id: String,
    pub secondary_id: Option<String>,
    pub name: String,
    pub release_type: ReleaseType,
    pub release_date: chrono::NaiveDate,
    pub image_url: Option<String>,
    pub primary_url: String,
    pub secondary_url: Option<String>,
    pub track_count: Option<i64>,
    pub artist_id: i64,
}

/// Outcome of a release insert attempt.
///
/// A duplicate primary id is resolved by the unique constraint and reported
/// here, not as an error: overlapping sync runs are expected to race.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseInsertOutcome {
    Created(Release),
    AlreadyExists,
}

/// How often a user wants release notifications delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFrequency {
    Immediate,
    Daily,
    Weekly,
}

impl NotificationFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationFrequency::Immediate => "immediate",
            NotificationFrequency::Daily => "daily",
            NotificationFrequency::Weekly => "weekly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(NotificationFrequency::Immediate),
            "daily" => Some(NotificationFrequency::Daily),
            "weekly" => Some(NotificationFrequency::Weekly),
            _ => None,
        }
    }
}

/// Per-user notification settings. One row per user, created with defaults
/// when the user is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPreference {
    pub user_id: i64,
    pub email_enabled: bool,
    pub new_album: bool,
    pub new_single: bool,
    pub new_compilation: bool,
    pub frequency: NotificationFrequency,
    pub weekly_summary: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    pub fn defaults(user_id: i64) -> Self {
        Self {
            user_id,
            email_enabled: true,
            new_album: true,
            new_single: true,
            new_compilation: true,
            frequency: NotificationFrequency::Immediate,
            weekly_summary: true,
            updated_at: Utc::now(),
        }
    }

    /// Whether the user opted in to this release type.
    pub fn allows_type(&self, release_type: ReleaseType) -> bool {
        match release_type {
            ReleaseType::Album => self.new_album,
            ReleaseType::Single => self.new_single,
            ReleaseType::Ep => self.new_compilation,
        }
    }
}

/// Delivery channel recorded in the notification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Email,
    WeeklySummary,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::WeeklySummary => "weekly_summary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "email" => Some(NotificationChannel::Email),
            "weekly_summary" => Some(NotificationChannel::WeeklySummary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

/// Append-only record of a dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub release_id: Option<i64>,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    pub sent_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}
