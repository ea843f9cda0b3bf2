use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::database::{fmt_instant, parse_instant};

/// Read the incremental sync cursor for one (estate, entity) pair.
/// `None` means the pair has never completed a sync.
pub async fn get_cursor(
    pool: &SqlitePool,
    estate_id: &str,
    entity: &str,
) -> Result<Option<DateTime<Utc>>, String> {
    let row = sqlx::query_scalar::<_, String>(
        "SELECT last_synced_at FROM sync_state WHERE estate_id = ? AND entity = ?",
    )
    .bind(estate_id)
    .bind(entity)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to read sync cursor: {}", e))?;

    row.map(|value| parse_instant(&value)).transpose()
}

pub async fn set_cursor(
    pool: &SqlitePool,
    estate_id: &str,
    entity: &str,
    instant: &DateTime<Utc>,
) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO sync_state (estate_id, entity, last_synced_at) VALUES (?, ?, ?)
        ON CONFLICT(estate_id, entity) DO UPDATE SET last_synced_at = excluded.last_synced_at",
    )
    .bind(estate_id)
    .bind(entity)
    .bind(fmt_instant(instant))
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to persist sync cursor: {}", e))?;
    Ok(())
}

/// Drop every cursor, forcing the next pass back to full sync. Called on
/// sign-out.
pub async fn clear_all_cursors(pool: &SqlitePool) -> Result<(), String> {
    sqlx::query("DELETE FROM sync_state")
        .execute(pool)
        .await
        .map_err(|e| format!("Failed to clear sync cursors: {}", e))?;
    Ok(())
}
