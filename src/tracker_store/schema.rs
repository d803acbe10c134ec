//! SQLite schema for the tracker database.
//!
//! Version 1: users, artists, favorites, releases, notification preferences
//! and the notification log.
//! Version 2: weekly_summary opt-in column on notification preferences.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
};

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ARTISTS_TABLE_V1: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "primary_id",
            &SqlType::Text,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("secondary_id", &SqlType::Text),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        // JSON array of genre strings, validated on both read and write
        sqlite_column!("genres", &SqlType::Text, non_null = true),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!("popularity", &SqlType::Integer, non_null = true),
        sqlite_column!("followers", &SqlType::Integer, non_null = true),
        sqlite_column!("last_refreshed_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_artists_primary_id", "primary_id")],
    unique_constraints: &[],
};

const FAVORITES_TABLE_V1: Table = Table {
    name: "favorites",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!(
            "added_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_favorites_user_id", "user_id"),
        ("idx_favorites_artist_id", "artist_id"),
    ],
    // A user favorites a given artist at most once
    unique_constraints: &[&["user_id", "artist_id"]],
};

const RELEASES_TABLE_V1: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        // The sync idempotency key
        sqlite_column!(
            "primary_id",
            &SqlType::Text,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("secondary_id", &SqlType::Text),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("release_type", &SqlType::Text, non_null = true),
        // ISO date, lexicographically ordered
        sqlite_column!("release_date", &SqlType::Text, non_null = true),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!("primary_url", &SqlType::Text, non_null = true),
        sqlite_column!("secondary_url", &SqlType::Text),
        sqlite_column!("track_count", &SqlType::Integer),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_releases_artist_id", "artist_id"),
        ("idx_releases_release_date", "release_date"),
        ("idx_releases_created_at", "created_at"),
    ],
    unique_constraints: &[],
};

const PREFERENCES_TABLE_V1: Table = Table {
    name: "notification_preferences",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("email_enabled", &SqlType::Integer, non_null = true),
        sqlite_column!("new_album", &SqlType::Integer, non_null = true),
        sqlite_column!("new_single", &SqlType::Integer, non_null = true),
        sqlite_column!("new_compilation", &SqlType::Integer, non_null = true),
        sqlite_column!("frequency", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const NOTIFICATION_LOG_TABLE_V1: Table = Table {
    name: "notification_log",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("release_id", &SqlType::Integer),
        sqlite_column!("channel", &SqlType::Text, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("sent_at", &SqlType::Integer, non_null = true),
        // JSON, e.g. {"release_count": 3} for digests
        sqlite_column!("metadata", &SqlType::Text),
    ],
    indices: &[
        ("idx_notification_log_user_id", "user_id"),
        ("idx_notification_log_sent_at", "sent_at"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - weekly summary opt-in
// =============================================================================

// weekly_summary sits last: ALTER TABLE ADD COLUMN appends, and validation
// compares columns positionally, so migrated and freshly created databases
// must agree on the order.
const PREFERENCES_TABLE_V2: Table = Table {
    name: "notification_preferences",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("email_enabled", &SqlType::Integer, non_null = true),
        sqlite_column!("new_album", &SqlType::Integer, non_null = true),
        sqlite_column!("new_single", &SqlType::Integer, non_null = true),
        sqlite_column!("new_compilation", &SqlType::Integer, non_null = true),
        sqlite_column!("frequency", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "weekly_summary",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "ALTER TABLE notification_preferences
         ADD COLUMN weekly_summary INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    Ok(())
}

pub const TRACKER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            USERS_TABLE_V1,
            ARTISTS_TABLE_V1,
            FAVORITES_TABLE_V1,
            RELEASES_TABLE_V1,
            PREFERENCES_TABLE_V1,
            NOTIFICATION_LOG_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            USERS_TABLE_V1,
            ARTISTS_TABLE_V1,
            FAVORITES_TABLE_V1,
            RELEASES_TABLE_V1,
            PREFERENCES_TABLE_V2,
            NOTIFICATION_LOG_TABLE_V1,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::migrate_if_needed;
    use rusqlite::Connection;

    #[test]
    fn test_v1_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &TRACKER_VERSIONED_SCHEMAS[0];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_v2_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &TRACKER_VERSIONED_SCHEMAS[1];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_migration_v1_to_v2() {
        let mut conn = Connection::open_in_memory().unwrap();
        TRACKER_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        migrate_if_needed(&mut conn, TRACKER_VERSIONED_SCHEMAS).unwrap();
        TRACKER_VERSIONED_SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn test_favorite_unique_pair_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        TRACKER_VERSIONED_SCHEMAS[1].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (username, email) VALUES ('ada', 'ada@example.com')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO artists (primary_id, name, genres, popularity, followers, last_refreshed_at)
             VALUES ('sp1', 'Artist', '[]', 0, 0, 0)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO favorites (user_id, artist_id, category) VALUES (1, 1, 'default')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO favorites (user_id, artist_id, category) VALUES (1, 1, 'other')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_release_primary_id_unique() {
        let conn = Connection::open_in_memory().unwrap();
        TRACKER_VERSIONED_SCHEMAS[1].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO artists (primary_id, name, genres, popularity, followers, last_refreshed_at)
             VALUES ('sp1', 'Artist', '[]', 0, 0, 0)",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO releases
             (primary_id, name, release_type, release_date, primary_url, artist_id)
             VALUES ('rel1', 'Album', 'ALBUM', '2024-01-01', 'https://x', 1)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
