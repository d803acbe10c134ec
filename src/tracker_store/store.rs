use super::models::{
    Artist, Favorite, NewArtist, NewRelease, NotificationChannel, NotificationFrequency,
    NotificationLogEntry, NotificationPreference, NotificationStatus, Release,
    ReleaseInsertOutcome, ReleaseType, User,
};
use super::schema::TRACKER_VERSIONED_SCHEMAS;
use super::trait_def::TrackerStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteTrackerStore {
    connection: Arc<Mutex<Connection>>,
}

const DATE_FMT: &str = "%Y-%m-%d";

fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| anyhow!("Timestamp {} out of range", secs))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).with_context(|| format!("Invalid stored date '{}'", s))
}

fn encode_genres(genres: &[String]) -> Result<String> {
    serde_json::to_string(genres).context("Failed to encode genres")
}

fn decode_genres(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid genres payload '{}'", raw))
}

// Raw row tuples, converted into models outside the rusqlite closures so
// conversion failures surface as anyhow errors rather than sql errors.
type UserRow = (i64, String, String, i64);
type ArtistRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    i64,
    i64,
    i64,
);
type ReleaseRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<i64>,
    i64,
    i64,
);
type PreferenceRow = (i64, i64, i64, i64, i64, String, i64, i64);
type LogRow = (i64, i64, Option<i64>, String, String, i64, Option<String>);

const USER_COLUMNS: &str = "id, username, email, created_at";
const ARTIST_COLUMNS: &str =
    "id, primary_id, secondary_id, name, genres, image_url, popularity, followers, \
     last_refreshed_at";
const RELEASE_COLUMNS: &str =
    "id, primary_id, secondary_id, name, release_type, release_date, image_url, primary_url, \
     secondary_url, track_count, artist_id, created_at";
const PREFERENCE_COLUMNS: &str =
    "user_id, email_enabled, new_album, new_single, new_compilation, frequency, updated_at, \
     weekly_summary";

fn user_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
    ))
}

fn artist_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<ArtistRow> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
        row.get(offset + 4)?,
        row.get(offset + 5)?,
        row.get(offset + 6)?,
        row.get(offset + 7)?,
        row.get(offset + 8)?,
    ))
}

fn release_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<ReleaseRow> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
        row.get(offset + 4)?,
        row.get(offset + 5)?,
        row.get(offset + 6)?,
        row.get(offset + 7)?,
        row.get(offset + 8)?,
        row.get(offset + 9)?,
        row.get(offset + 10)?,
        row.get(offset + 11)?,
    ))
}

fn preference_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<PreferenceRow> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
        row.get(offset + 4)?,
        row.get(offset + 5)?,
        row.get(offset + 6)?,
        row.get(offset + 7)?,
    ))
}

fn user_from(raw: UserRow) -> Result<User> {
    Ok(User {
        id: raw.0,
        username: raw.1,
        email: raw.2,
        created_at: from_unix(raw.3)?,
    })
}

fn artist_from(raw: ArtistRow) -> Result<Artist> {
    Ok(Artist {
        id: raw.0,
        primary_id: raw.1,
        secondary_id: raw.2,
        name: raw.3,
        genres: decode_genres(&raw.4)?,
        image_url: raw.5,
        popularity: raw.6,
        followers: raw.7,
        last_refreshed_at: from_unix(raw.8)?,
    })
}

fn release_from(raw: ReleaseRow) -> Result<Release> {
    Ok(Release {
        id: raw.0,
        primary_id: raw.1,
        secondary_id: raw.2,
        name: raw.3,
        release_type: ReleaseType::from_str(&raw.4)
            .ok_or_else(|| anyhow!("Unknown release type '{}'", raw.4))?,
        release_date: parse_date(&raw.5)?,
        image_url: raw.6,
        primary_url: raw.7,
        secondary_url: raw.8,
        track_count: raw.9,
        artist_id: raw.10,
        created_at: from_unix(raw.11)?,
    })
}

fn preference_from(raw: PreferenceRow) -> Result<NotificationPreference> {
    Ok(NotificationPreference {
        user_id: raw.0,
        email_enabled: raw.1 != 0,
        new_album: raw.2 != 0,
        new_single: raw.3 != 0,
        new_compilation: raw.4 != 0,
        frequency: NotificationFrequency::from_str(&raw.5)
            .ok_or_else(|| anyhow!("Unknown notification frequency '{}'", raw.5))?,
        updated_at: from_unix(raw.6)?,
        weekly_summary: raw.7 != 0,
    })
}

fn log_entry_from(raw: LogRow) -> Result<NotificationLogEntry> {
    Ok(NotificationLogEntry {
        id: raw.0,
        user_id: raw.1,
        release_id: raw.2,
        channel: NotificationChannel::from_str(&raw.3)
            .ok_or_else(|| anyhow!("Unknown notification channel '{}'", raw.3))?,
        status: NotificationStatus::from_str(&raw.4)
            .ok_or_else(|| anyhow!("Unknown notification status '{}'", raw.4))?,
        sent_at: from_unix(raw.5)?,
        metadata: raw
            .6
            .map(|m| serde_json::from_str(&m).with_context(|| format!("Invalid metadata '{}'", m)))
            .transpose()?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                ..
            },
            _,
        )
    )
}

impl SqliteTrackerStore {
    pub fn new(file_path: &Path) -> Result<Self> {
        let connection = Connection::open(file_path)
            .with_context(|| format!("Failed to open database at {:?}", file_path))?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut connection: Connection) -> Result<Self> {
        connection.pragma_update(None, "journal_mode", "WAL")?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        migrate_if_needed(&mut connection, TRACKER_VERSIONED_SCHEMAS)?;
        TRACKER_VERSIONED_SCHEMAS
            .last()
            .expect("at least one schema version")
            .validate(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().expect("tracker store lock poisoned")
    }

    #[cfg(test)]
    pub(crate) fn raw_connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.lock()
    }
}

impl TrackerStore for SqliteTrackerStore {
    fn create_user(&self, username: &str, email: &str) -> Result<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (username, email) VALUES (?1, ?2)",
            params![username, email],
        )
        .with_context(|| format!("Failed to create user '{}'", username))?;
        let user_id = tx.last_insert_rowid();

        let defaults = NotificationPreference::defaults(user_id);
        tx.execute(
            "INSERT INTO notification_preferences
             (user_id, email_enabled, new_album, new_single, new_compilation, frequency,
              weekly_summary, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                defaults.email_enabled as i64,
                defaults.new_album as i64,
                defaults.new_single as i64,
                defaults.new_compilation as i64,
                defaults.frequency.as_str(),
                defaults.weekly_summary as i64,
                defaults.updated_at.timestamp(),
            ],
        )?;
        tx.commit()?;
        Ok(user_id)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![user_id],
                |row| user_row(row, 0),
            )
            .optional()?;
        raw.map(user_from).transpose()
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                |row| user_row(row, 0),
            )
            .optional()?;
        raw.map(user_from).transpose()
    }

    fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let rows: Vec<UserRow> = stmt
            .query_map([], |row| user_row(row, 0))?
            .collect::<Result<_, _>>()?;
        rows.into_iter().map(user_from).collect()
    }

    fn get_artist(&self, artist_id: i64) -> Result<Option<Artist>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM artists WHERE id = ?1", ARTIST_COLUMNS),
                params![artist_id],
                |row| artist_row(row, 0),
            )
            .optional()?;
        raw.map(artist_from).transpose()
    }

    fn get_artist_by_primary_id(&self, primary_id: &str) -> Result<Option<Artist>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM artists WHERE primary_id = ?1",
                    ARTIST_COLUMNS
                ),
                params![primary_id],
                |row| artist_row(row, 0),
            )
            .optional()?;
        raw.map(artist_from).transpose()
    }

    fn insert_artist(&self, artist: &NewArtist) -> Result<Artist> {
        let now = Utc::now();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO artists
             (primary_id, secondary_id, name, genres, image_url, popularity, followers,
              last_refreshed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                artist.primary_id,
                artist.secondary_id,
                artist.name,
                encode_genres(&artist.genres)?,
                artist.image_url,
                artist.popularity,
                artist.followers,
                now.timestamp(),
            ],
        )
        .with_context(|| format!("Failed to insert artist '{}'", artist.name))?;
        Ok(Artist {
            id: conn.last_insert_rowid(),
            primary_id: artist.primary_id.clone(),
            secondary_id: artist.secondary_id.clone(),
            name: artist.name.clone(),
            genres: artist.genres.clone(),
            image_url: artist.image_url.clone(),
            popularity: artist.popularity,
            followers: artist.followers,
            last_refreshed_at: from_unix(now.timestamp())?,
        })
    }

    fn set_artist_secondary_id(&self, artist_id: i64, secondary_id: &str) -> Result<()> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE artists SET secondary_id = ?2 WHERE id = ?1",
            params![artist_id, secondary_id],
        )?;
        if updated == 0 {
            anyhow::bail!("No artist with id {}", artist_id);
        }
        Ok(())
    }

    fn update_artist_snapshot(
        &self,
        artist_id: i64,
        popularity: i64,
        followers: i64,
    ) -> Result<()> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE artists SET popularity = ?2, followers = ?3, last_refreshed_at = ?4
             WHERE id = ?1",
            params![artist_id, popularity, followers, Utc::now().timestamp()],
        )?;
        if updated == 0 {
            anyhow::bail!("No artist with id {}", artist_id);
        }
        Ok(())
    }

    fn add_favorite(&self, user_id: i64, artist_id: i64, category: &str) -> Result<Favorite> {
        let now = Utc::now();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO favorites (user_id, artist_id, category, added_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, artist_id, category, now.timestamp()],
        )
        .with_context(|| {
            format!(
                "Failed to favorite artist {} for user {}",
                artist_id, user_id
            )
        })?;
        Ok(Favorite {
            id: conn.last_insert_rowid(),
            user_id,
            artist_id,
            category: category.to_string(),
            added_at: from_unix(now.timestamp())?,
        })
    }

    fn remove_favorite(&self, user_id: i64, artist_id: i64) -> Result<usize> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND artist_id = ?2",
            params![user_id, artist_id],
        )?;
        Ok(removed)
    }

    fn get_user_favorites(&self, user_id: i64) -> Result<Vec<(Favorite, Artist)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT f.id, f.user_id, f.artist_id, f.category, f.added_at,
                    {}
             FROM favorites f
             JOIN artists a ON a.id = f.artist_id
             WHERE f.user_id = ?1
             ORDER BY f.added_at DESC, f.id DESC",
            prefixed(ARTIST_COLUMNS, "a")
        ))?;
        let rows: Vec<((i64, i64, i64, String, i64), ArtistRow)> = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    (
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ),
                    artist_row(row, 5)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(fav, artist)| {
                Ok((
                    Favorite {
                        id: fav.0,
                        user_id: fav.1,
                        artist_id: fav.2,
                        category: fav.3,
                        added_at: from_unix(fav.4)?,
                    },
                    artist_from(artist)?,
                ))
            })
            .collect()
    }

    fn get_users_favoring_artist(
        &self,
        artist_id: i64,
    ) -> Result<Vec<(User, NotificationPreference)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}
             FROM favorites f
             JOIN users u ON u.id = f.user_id
             LEFT JOIN notification_preferences p ON p.user_id = u.id
             WHERE f.artist_id = ?1
             ORDER BY u.id",
            prefixed(USER_COLUMNS, "u"),
            prefixed(PREFERENCE_COLUMNS, "p")
        ))?;
        let rows: Vec<(UserRow, Option<PreferenceRow>)> = stmt
            .query_map(params![artist_id], |row| {
                let user = user_row(row, 0)?;
                let present: Option<i64> = row.get(4)?;
                let prefs = match present {
                    Some(_) => Some(preference_row(row, 4)?),
                    None => None,
                };
                Ok((user, prefs))
            })?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(user, prefs)| {
                let user = user_from(user)?;
                let prefs = match prefs {
                    Some(raw) => preference_from(raw)?,
                    None => NotificationPreference::defaults(user.id),
                };
                Ok((user, prefs))
            })
            .collect()
    }

    fn get_release(&self, release_id: i64) -> Result<Option<Release>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
                params![release_id],
                |row| release_row(row, 0),
            )
            .optional()?;
        raw.map(release_from).transpose()
    }

    fn get_release_by_primary_id(&self, primary_id: &str) -> Result<Option<Release>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM releases WHERE primary_id = ?1",
                    RELEASE_COLUMNS
                ),
                params![primary_id],
                |row| release_row(row, 0),
            )
            .optional()?;
        raw.map(release_from).transpose()
    }

    fn insert_release(&self, release: &NewRelease) -> Result<ReleaseInsertOutcome> {
        let now = Utc::now();
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT INTO releases
             (primary_id, secondary_id, name, release_type, release_date, image_url,
              primary_url, secondary_url, track_count, artist_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                release.primary_id,
                release.secondary_id,
                release.name,
                release.release_type.as_str(),
                release.release_date.format(DATE_FMT).to_string(),
                release.image_url,
                release.primary_url,
                release.secondary_url,
                release.track_count,
                release.artist_id,
                now.timestamp(),
            ],
        );
        match inserted {
            Ok(_) => Ok(ReleaseInsertOutcome::Created(Release {
                id: conn.last_insert_rowid(),
                primary_id: release.primary_id.clone(),
                secondary_id: release.secondary_id.clone(),
                name: release.name.clone(),
                release_type: release.release_type,
                release_date: release.release_date,
                image_url: release.image_url.clone(),
                primary_url: release.primary_url.clone(),
                secondary_url: release.secondary_url.clone(),
                track_count: release.track_count,
                artist_id: release.artist_id,
                created_at: from_unix(now.timestamp())?,
            })),
            Err(err) if is_constraint_violation(&err) => Ok(ReleaseInsertOutcome::AlreadyExists),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to insert release '{}'", release.name))
            }
        }
    }

    fn releases_for_user_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(Release, Artist)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}
             FROM releases r
             JOIN artists a ON a.id = r.artist_id
             JOIN favorites f ON f.artist_id = r.artist_id
             WHERE f.user_id = ?1 AND r.release_date >= ?2 AND r.release_date <= ?3
             ORDER BY r.release_date ASC, r.id ASC",
            prefixed(RELEASE_COLUMNS, "r"),
            prefixed(ARTIST_COLUMNS, "a")
        ))?;
        let rows: Vec<(ReleaseRow, ArtistRow)> = stmt
            .query_map(
                params![
                    user_id,
                    start.format(DATE_FMT).to_string(),
                    end.format(DATE_FMT).to_string()
                ],
                |row| Ok((release_row(row, 0)?, artist_row(row, 12)?)),
            )?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(release, artist)| Ok((release_from(release)?, artist_from(artist)?)))
            .collect()
    }

    fn releases_for_user_created_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<(Release, Artist)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}
             FROM releases r
             JOIN artists a ON a.id = r.artist_id
             JOIN favorites f ON f.artist_id = r.artist_id
             WHERE f.user_id = ?1 AND r.created_at >= ?2
             ORDER BY r.created_at ASC, r.id ASC",
            prefixed(RELEASE_COLUMNS, "r"),
            prefixed(ARTIST_COLUMNS, "a")
        ))?;
        let rows: Vec<(ReleaseRow, ArtistRow)> = stmt
            .query_map(params![user_id, since.timestamp()], |row| {
                Ok((release_row(row, 0)?, artist_row(row, 12)?))
            })?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(release, artist)| Ok((release_from(release)?, artist_from(artist)?)))
            .collect()
    }

    fn get_preferences(&self, user_id: i64) -> Result<Option<NotificationPreference>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM notification_preferences WHERE user_id = ?1",
                    PREFERENCE_COLUMNS
                ),
                params![user_id],
                |row| preference_row(row, 0),
            )
            .optional()?;
        raw.map(preference_from).transpose()
    }

    fn update_preferences(&self, prefs: &NotificationPreference) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO notification_preferences
             (user_id, email_enabled, new_album, new_single, new_compilation, frequency,
              weekly_summary, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (user_id) DO UPDATE SET
               email_enabled = excluded.email_enabled,
               new_album = excluded.new_album,
               new_single = excluded.new_single,
               new_compilation = excluded.new_compilation,
               frequency = excluded.frequency,
               weekly_summary = excluded.weekly_summary,
               updated_at = excluded.updated_at",
            params![
                prefs.user_id,
                prefs.email_enabled as i64,
                prefs.new_album as i64,
                prefs.new_single as i64,
                prefs.new_compilation as i64,
                prefs.frequency.as_str(),
                prefs.weekly_summary as i64,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    fn users_with_email_enabled(
        &self,
        frequency: Option<NotificationFrequency>,
    ) -> Result<Vec<(User, NotificationPreference)>> {
        let conn = self.lock();
        let mut sql = format!(
            "SELECT {}, {}
             FROM users u
             JOIN notification_preferences p ON p.user_id = u.id
             WHERE p.email_enabled = 1",
            prefixed(USER_COLUMNS, "u"),
            prefixed(PREFERENCE_COLUMNS, "p")
        );
        if frequency.is_some() {
            sql.push_str(" AND p.frequency = ?1");
        }
        sql.push_str(" ORDER BY u.id");

        let mut stmt = conn.prepare(&sql)?;
        let map_row =
            |row: &rusqlite::Row| Ok((user_row(row, 0)?, preference_row(row, 4)?));
        let rows: Vec<(UserRow, PreferenceRow)> = match frequency {
            Some(f) => stmt
                .query_map(params![f.as_str()], map_row)?
                .collect::<Result<_, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<_, _>>()?,
        };

        rows.into_iter()
            .map(|(user, prefs)| Ok((user_from(user)?, preference_from(prefs)?)))
            .collect()
    }

    fn append_notification_log(
        &self,
        user_id: i64,
        release_id: Option<i64>,
        channel: NotificationChannel,
        status: NotificationStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let metadata = metadata
            .map(|m| serde_json::to_string(&m).context("Failed to encode log metadata"))
            .transpose()?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO notification_log (user_id, release_id, channel, status, sent_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                release_id,
                channel.as_str(),
                status.as_str(),
                Utc::now().timestamp(),
                metadata,
            ],
        )?;
        Ok(())
    }

    fn get_notification_history(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<NotificationLogEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, release_id, channel, status, sent_at, metadata
             FROM notification_log
             WHERE user_id = ?1
             ORDER BY sent_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows: Vec<LogRow> = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<_, _>>()?;
        rows.into_iter().map(log_entry_from).collect()
    }

    fn delete_notification_logs_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM notification_log WHERE sent_at < ?1",
            params![cutoff.timestamp()],
        )?;
        Ok(removed)
    }
}

/// Prefix each column of a comma separated list with a table alias.
fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
