//! Cache store schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch that transforms the schema.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::rusqlite::{Connection, params};

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. All migrations are idempotent
/// using CREATE IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[("1", include_str!("../../migrations/001_cache_entries.sql"))];

/// Run any pending migrations.
///
/// Creates the `_migrations` table if it doesn't exist, checks the current
/// version, and applies any migrations that haven't been run yet.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub fn run(conn: &Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

    for (version, sql) in MIGRATIONS {
        let version_num: i64 = version.parse().map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
        if version_num > current {
            conn.execute_batch(sql).map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version_num, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(version = version_num, "applied cache migration");
        }
    }

    Ok(())
}
