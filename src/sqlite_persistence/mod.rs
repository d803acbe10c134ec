//! Declarative SQLite schema definitions with versioning.
//!
//! Tables are described as const data, created from it, and validated
//! against the live database on open so a schema drift fails fast instead
//! of surfacing as a runtime query error.

use anyhow::{bail, Result};
use rusqlite::{params, Connection};

/// Offset added to `PRAGMA user_version` so an untouched database (version 0)
/// is distinguishable from a database at schema version 0.
pub const BASE_DB_VERSION: usize = 90000;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // unused_mut fires when no optional field assignments are passed
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn parse(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("{} {}", column.name, column.sql_type.as_sql()));
            if column.is_primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                sql.push_str(" NOT NULL");
            }
            if column.is_unique {
                sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(fk) = column.foreign_key {
                sql.push_str(&format!(
                    " REFERENCES {}({})",
                    fk.foreign_table, fk.foreign_column
                ));
            }
        }
        for unique in self.unique_constraints {
            sql.push_str(&format!(", UNIQUE ({})", unique.join(", ")));
        }
        sql.push_str(");");
        conn.execute(&sql, params![])?;

        for (index_name, column_names) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_names
                ),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,         // name
                    row.get::<_, String>(2)?,         // type
                    row.get::<_, i32>(3)? == 1,       // notnull
                    row.get::<_, i32>(5)? == 1,       // pk
                ))
            })?
            .collect::<Result<_, _>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {} ({})",
                self.name,
                actual.len(),
                self.columns.len(),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for ((name, sql_type, non_null, is_pk), expected) in
            actual.iter().zip(self.columns.iter())
        {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::parse(sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    sql_type
                );
            }
            if *non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch",
                    self.name,
                    expected.name
                );
            }
            if *is_pk != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch",
                    self.name,
                    expected.name
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }

        for expected_columns in self.unique_constraints {
            if !self.has_unique_index_on(conn, expected_columns)? {
                bail!(
                    "Table {} is missing unique constraint on ({})",
                    self.name,
                    expected_columns.join(", ")
                );
            }
        }

        Ok(())
    }

    /// Unique constraints surface as unique indices in `PRAGMA index_list`;
    /// compare on sorted column sets since declaration order is irrelevant.
    fn has_unique_index_on(&self, conn: &Connection, columns: &[&str]) -> Result<bool> {
        let mut expected: Vec<&str> = columns.to_vec();
        expected.sort_unstable();

        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", self.name))?;
        let unique_indices: Vec<String> = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, i32>(2)?))
            })?
            .filter_map(|r| r.ok())
            .filter(|(_, is_unique)| *is_unique == 1)
            .map(|(name, _)| name)
            .collect();

        for index_name in unique_indices {
            let mut idx_stmt = conn.prepare(&format!("PRAGMA index_info({})", index_name))?;
            let mut cols: Vec<String> = idx_stmt
                .query_map([], |row| row.get::<_, String>(2))?
                .filter_map(|r| r.ok())
                .collect();
            cols.sort_unstable();
            if cols.iter().map(String::as_str).eq(expected.iter().copied()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Create the latest schema on an empty database, or run the pending
/// migrations on an existing one, then bump `user_version`.
pub fn migrate_if_needed(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let latest = schemas
        .last()
        .ok_or_else(|| anyhow::anyhow!("no schema versions defined"))?;

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        latest.create(conn)?;
        return Ok(());
    }

    let mut current = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current >= latest.version {
        return Ok(());
    }

    let pending_from = current;
    let tx = conn.transaction()?;
    for schema in schemas.iter().filter(|s| s.version > pending_from) {
        if let Some(migration_fn) = schema.migration {
            tracing::info!(
                "Migrating database from version {} to {}",
                current,
                schema.version
            );
            migration_fn(&tx)?;
        }
        current = schema.version;
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TABLE: Table = Table {
        name: "things",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("name", &SqlType::Text, non_null = true),
            sqlite_column!("score", &SqlType::Real),
        ],
        indices: &[("idx_things_name", "name")],
        unique_constraints: &[&["name", "score"]],
    };

    const TEST_SCHEMA: VersionedSchema = VersionedSchema {
        version: 1,
        tables: &[TEST_TABLE],
        migration: None,
    };

    #[test]
    fn test_create_then_validate() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();
        TEST_SCHEMA.validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, BASE_DB_VERSION as i64 + 1);
    }

    #[test]
    fn test_validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL, UNIQUE(name, score))",
            [],
        )
        .unwrap();

        let err = TEST_SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_things_name"));
    }

    #[test]
    fn test_validate_detects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let err = TEST_SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("columns"));
    }

    #[test]
    fn test_validate_detects_missing_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_things_name ON things(name)", [])
            .unwrap();

        let err = TEST_SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing unique constraint"));
    }

    #[test]
    fn test_unique_constraint_column_order_independent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL, UNIQUE(score, name))",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_things_name ON things(name)", [])
            .unwrap();

        TEST_SCHEMA.validate(&conn).unwrap();
    }

    #[test]
    fn test_migrate_creates_latest_on_empty_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_if_needed(&mut conn, &[TEST_SCHEMA]).unwrap();
        TEST_SCHEMA.validate(&conn).unwrap();
    }

    #[test]
    fn test_migrate_runs_pending_migrations() {
        const V1_TABLE: Table = Table {
            name: "kv",
            columns: &[
                sqlite_column!("key", &SqlType::Text, is_primary_key = true),
                sqlite_column!("value", &SqlType::Text, non_null = true),
            ],
            indices: &[],
            unique_constraints: &[],
        };
        const V2_TABLE: Table = Table {
            name: "kv",
            columns: &[
                sqlite_column!("key", &SqlType::Text, is_primary_key = true),
                sqlite_column!("value", &SqlType::Text, non_null = true),
                sqlite_column!("updated_at", &SqlType::Integer),
            ],
            indices: &[],
            unique_constraints: &[],
        };
        fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
            conn.execute("ALTER TABLE kv ADD COLUMN updated_at INTEGER", [])?;
            Ok(())
        }
        const SCHEMAS: &[VersionedSchema] = &[
            VersionedSchema {
                version: 1,
                tables: &[V1_TABLE],
                migration: None,
            },
            VersionedSchema {
                version: 2,
                tables: &[V2_TABLE],
                migration: Some(migrate_v1_to_v2),
            },
        ];

        let mut conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();

        migrate_if_needed(&mut conn, SCHEMAS).unwrap();
        SCHEMAS[1].validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, BASE_DB_VERSION as i64 + 2);
    }

    #[test]
    fn test_migrate_chains_multiple_pending_versions() {
        const KV_TABLE: Table = Table {
            name: "kv",
            columns: &[
                sqlite_column!("key", &SqlType::Text, is_primary_key = true),
                sqlite_column!("value", &SqlType::Text, non_null = true),
            ],
            indices: &[],
            unique_constraints: &[],
        };
        fn add_updated_at(conn: &Connection) -> Result<()> {
            conn.execute("ALTER TABLE kv ADD COLUMN updated_at INTEGER", [])?;
            Ok(())
        }
        fn add_deleted(conn: &Connection) -> Result<()> {
            conn.execute("ALTER TABLE kv ADD COLUMN deleted INTEGER", [])?;
            Ok(())
        }
        const MID_TABLE: Table = Table {
            name: "kv",
            columns: &[
                sqlite_column!("key", &SqlType::Text, is_primary_key = true),
                sqlite_column!("value", &SqlType::Text, non_null = true),
                sqlite_column!("updated_at", &SqlType::Integer),
            ],
            indices: &[],
            unique_constraints: &[],
        };
        const FINAL_TABLE: Table = Table {
            name: "kv",
            columns: &[
                sqlite_column!("key", &SqlType::Text, is_primary_key = true),
                sqlite_column!("value", &SqlType::Text, non_null = true),
                sqlite_column!("updated_at", &SqlType::Integer),
                sqlite_column!("deleted", &SqlType::Integer),
            ],
            indices: &[],
            unique_constraints: &[],
        };
        const SCHEMAS: &[VersionedSchema] = &[
            VersionedSchema {
                version: 1,
                tables: &[KV_TABLE],
                migration: None,
            },
            VersionedSchema {
                version: 2,
                tables: &[MID_TABLE],
                migration: Some(add_updated_at),
            },
            VersionedSchema {
                version: 3,
                tables: &[FINAL_TABLE],
                migration: Some(add_deleted),
            },
        ];

        let mut conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();

        // Both pending migrations run in one pass
        migrate_if_needed(&mut conn, SCHEMAS).unwrap();
        SCHEMAS[2].validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, BASE_DB_VERSION as i64 + 3);
    }
}
