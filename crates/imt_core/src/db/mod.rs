use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;

use crate::error::AppError;

/// Ordered, embedded migrations. Each is applied exactly once and recorded by name.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_init.sql",
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../migrations/0001_init.sql"
        )),
    ),
    (
        "0002_priority_justification.sql",
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../migrations/0002_priority_justification.sql"
        )),
    ),
];

fn db_err(code: &str, message: impl Into<String>, cause: rusqlite::Error) -> AppError {
    AppError::new(code, message).with_details(cause.to_string())
}

pub fn open(path: &Path) -> Result<Connection, AppError> {
    Connection::open(path).map_err(|e| {
        AppError::new("DB_OPEN_FAILED", "Failed to open SQLite database")
            .with_details(format!("path={}: {}", path.display(), e))
    })
}

pub fn open_in_memory() -> Result<Connection, AppError> {
    Connection::open_in_memory()
        .map_err(|e| db_err("DB_OPEN_FAILED", "Failed to open in-memory SQLite database", e))
}

/// Names of migrations already recorded in `_migrations`.
pub fn applied_migrations(conn: &Connection) -> Result<HashSet<String>, AppError> {
    let mut stmt = conn
        .prepare("SELECT name FROM _migrations")
        .map_err(|e| db_err("DB_MIGRATIONS_QUERY_FAILED", "Failed to query applied migrations", e))?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| db_err("DB_MIGRATIONS_QUERY_FAILED", "Failed to read applied migrations", e))?
        .collect::<Result<HashSet<_>, _>>()
        .map_err(|e| {
            db_err(
                "DB_MIGRATIONS_QUERY_FAILED",
                "Failed to read applied migration row",
                e,
            )
        })?;
    Ok(names)
}

pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    conn.execute_batch(
        r#"
      PRAGMA foreign_keys = ON;
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(|e| {
        db_err(
            "DB_MIGRATIONS_TABLE_FAILED",
            "Failed to ensure migrations table exists",
            e,
        )
    })?;

    let applied = applied_migrations(conn)?;

    for (name, sql) in MIGRATIONS.iter().filter(|(name, _)| !applied.contains(*name)) {
        let tx = conn
            .transaction()
            .map_err(|e| db_err("DB_TX_FAILED", "Failed to start migration transaction", e))?;

        tx.execute_batch(sql)
            .map_err(|e| db_err("DB_MIGRATION_FAILED", format!("Migration {name} failed"), e))?;

        tx.execute(
            "INSERT INTO _migrations(name, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ','now'))",
            [name],
        )
        .map_err(|e| {
            db_err(
                "DB_MIGRATION_FAILED",
                format!("Failed to record migration {name}"),
                e,
            )
        })?;

        tx.commit()
            .map_err(|e| db_err("DB_TX_FAILED", "Failed to commit migration transaction", e))?;

        tracing::debug!(migration = name, "applied migration");
    }

    Ok(())
}

/// Open (creating if needed) and migrate a database file.
pub fn open_and_migrate(path: &Path) -> Result<Connection, AppError> {
    let mut conn = open(path)?;
    migrate(&mut conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::OptionalExtension;

    #[test]
    fn migrations_create_incidents_table_once() {
        let mut conn = open_in_memory().expect("open");
        migrate(&mut conn).expect("migrate");
        migrate(&mut conn).expect("migrate again is a no-op");

        let name: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='incidents'",
                [],
                |row| row.get(0),
            )
            .optional()
            .unwrap();
        assert_eq!(name.as_deref(), Some("incidents"));

        let applied = applied_migrations(&conn).unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());
    }
}
