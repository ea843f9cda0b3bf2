use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::database::{fmt_instant, parse_instant};
use crate::models::journal::JournalEntryRecord;

#[derive(FromRow)]
struct JournalRow {
    id: String,
    estate_id: String,
    title: String,
    body: String,
    created_at: String,
    updated_at: String,
}

fn row_to_record(row: JournalRow) -> Result<JournalEntryRecord, String> {
    Ok(JournalEntryRecord {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title,
        body: row.body,
        created_at: parse_instant(&row.created_at)?,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

pub async fn get_entry(pool: &SqlitePool, id: &str) -> Result<Option<JournalEntryRecord>, String> {
    let row = sqlx::query_as::<_, JournalRow>(
        "SELECT id, estate_id, title, body, created_at, updated_at
        FROM journal_entries WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch journal entry: {}", e))?;

    row.map(row_to_record).transpose()
}

pub async fn put_entry(pool: &SqlitePool, record: &JournalEntryRecord) -> Result<(), String> {
    sqlx::query(
        "INSERT OR REPLACE INTO journal_entries (id, estate_id, title, body, created_at,
            updated_at)
        VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.estate_id)
    .bind(&record.title)
    .bind(&record.body)
    .bind(fmt_instant(&record.created_at))
    .bind(fmt_instant(&record.updated_at))
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to store journal entry: {}", e))?;
    Ok(())
}

pub async fn delete_entry(pool: &SqlitePool, id: &str) -> Result<u64, String> {
    let result = sqlx::query("DELETE FROM journal_entries WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| format!("Failed to delete journal entry: {}", e))?;
    Ok(result.rows_affected())
}

pub async fn list_entries_for_estate(
    pool: &SqlitePool,
    estate_id: &str,
) -> Result<Vec<JournalEntryRecord>, String> {
    let rows = sqlx::query_as::<_, JournalRow>(
        "SELECT id, estate_id, title, body, created_at, updated_at
        FROM journal_entries WHERE estate_id = ? ORDER BY created_at DESC",
    )
    .bind(estate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to list journal entries: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

pub async fn entries_updated_since(
    pool: &SqlitePool,
    estate_id: &str,
    since: &DateTime<Utc>,
) -> Result<Vec<JournalEntryRecord>, String> {
    let rows = sqlx::query_as::<_, JournalRow>(
        "SELECT id, estate_id, title, body, created_at, updated_at
        FROM journal_entries WHERE estate_id = ? AND updated_at > ? ORDER BY updated_at ASC",
    )
    .bind(estate_id)
    .bind(fmt_instant(since))
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to scan updated journal entries: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

pub async fn replace_estate_entries(
    pool: &SqlitePool,
    estate_id: &str,
    records: &[JournalEntryRecord],
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    sqlx::query("DELETE FROM journal_entries WHERE estate_id = ?")
        .bind(estate_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to clear journal entries: {}", e))?;

    for record in records {
        sqlx::query(
            "INSERT INTO journal_entries (id, estate_id, title, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.estate_id)
        .bind(&record.title)
        .bind(&record.body)
        .bind(fmt_instant(&record.created_at))
        .bind(fmt_instant(&record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to insert journal entry {}: {}", record.id, e))?;
    }

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit journal replace: {}", e))
}
