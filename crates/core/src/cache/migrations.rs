//! Schema setup for the preview cache.
//!
//! Applied versions are recorded in `_migrations`; anything missing from that
//! table is applied at open time, oldest first.

use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ascending by version.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "previews",
    sql: include_str!("../../migrations/001_previews.sql"),
}];

fn applied_versions(conn: &rusqlite::Connection) -> rusqlite::Result<BTreeSet<i64>> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations")?;
    let versions = stmt.query_map([], |row| row.get(0))?;
    versions.collect()
}

/// Bring the schema up to date.
///
/// Each migration runs in its own transaction together with its
/// `_migrations` row, so a failed batch leaves no partial schema behind.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let applied = applied_versions(conn)?;

        for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
            tracing::debug!(version = migration.version, name = migration.name, "applying cache migration");

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} (v{}): {e}", migration.name, migration.version)))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![migration.version, Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)],
            )?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
