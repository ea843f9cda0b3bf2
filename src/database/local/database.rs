use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

pub struct Db(pub SqlitePool);

/*
 * Initializes the workspace database, the canonical read source for the UI:
 * tasks, documents, journal entries, estate profiles, guidance pages, and
 * the per-estate sync cursors.
 */
pub async fn connect(db_path: &Path) -> Result<Db, String> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create data dir {}: {}", parent.display(), e))?;
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(db_path)
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(3)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            format!(
                "Failed to connect to database at {}: {}",
                db_path.display(),
                e
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| format!("Failed to run workspace migrations: {}", e))?;

    Ok(Db(pool))
}

/// In-memory database with the same schema. A single connection keeps the
/// memory store alive for the pool's lifetime.
pub async fn connect_in_memory() -> Result<Db, String> {
    let connect_options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .map_err(|e| format!("Failed to open in-memory database: {}", e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| format!("Failed to run workspace migrations: {}", e))?;

    Ok(Db(pool))
}

// Instants are stored as RFC 3339 UTC with fixed microsecond precision so
// that SQL string comparison agrees with instant ordering.

pub fn fmt_instant(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp {}: {}", value, e))
}

pub fn fmt_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date {}: {}", value, e))
}

pub fn parse_string_list(value: &str) -> Result<Vec<String>, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON list {}: {}", value, e))
}

pub fn fmt_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}
