use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::database::{fmt_instant, fmt_string_list, parse_instant, parse_string_list};
use crate::models::estates::{GuidancePage, GuidanceStep, GuidanceTemplate};

#[derive(FromRow)]
struct GuidanceRow {
    id: String,
    estate_id: String,
    title: String,
    summary: Option<String>,
    body: Option<String>,
    tags: String,
    notes: String,
    steps: String,
    templates: String,
    seed_version: Option<String>,
    updated_at: String,
}

fn row_to_page(row: GuidanceRow) -> Result<GuidancePage, String> {
    let steps: Vec<GuidanceStep> = serde_json::from_str(&row.steps)
        .map_err(|e| format!("Invalid guidance steps for {}: {}", row.id, e))?;
    let templates: Vec<GuidanceTemplate> = serde_json::from_str(&row.templates)
        .map_err(|e| format!("Invalid guidance templates for {}: {}", row.id, e))?;

    Ok(GuidancePage {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title,
        summary: row.summary,
        body: row.body,
        tags: parse_string_list(&row.tags)?,
        notes: parse_string_list(&row.notes)?,
        steps,
        templates,
        seed_version: row.seed_version,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

async fn insert_page(conn: &mut SqliteConnection, page: &GuidancePage) -> Result<(), String> {
    let steps = serde_json::to_string(&page.steps)
        .map_err(|e| format!("Failed to encode guidance steps: {}", e))?;
    let templates = serde_json::to_string(&page.templates)
        .map_err(|e| format!("Failed to encode guidance templates: {}", e))?;

    sqlx::query(
        "INSERT OR REPLACE INTO guidance (id, estate_id, title, summary, body, tags, notes,
            steps, templates, seed_version, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&page.id)
    .bind(&page.estate_id)
    .bind(&page.title)
    .bind(&page.summary)
    .bind(&page.body)
    .bind(fmt_string_list(&page.tags))
    .bind(fmt_string_list(&page.notes))
    .bind(steps)
    .bind(templates)
    .bind(&page.seed_version)
    .bind(fmt_instant(&page.updated_at))
    .execute(conn)
    .await
    .map_err(|e| format!("Failed to store guidance page {}: {}", page.id, e))?;
    Ok(())
}

pub async fn get_page(pool: &SqlitePool, id: &str) -> Result<Option<GuidancePage>, String> {
    let row = sqlx::query_as::<_, GuidanceRow>(
        "SELECT id, estate_id, title, summary, body, tags, notes, steps, templates,
            seed_version, updated_at
        FROM guidance WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch guidance page: {}", e))?;

    row.map(row_to_page).transpose()
}

pub async fn put_page(pool: &SqlitePool, page: &GuidancePage) -> Result<(), String> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to acquire connection: {}", e))?;
    insert_page(&mut *conn, page).await
}

pub async fn bulk_put_pages(pool: &SqlitePool, pages: &[GuidancePage]) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;
    for page in pages {
        insert_page(&mut *tx, page).await?;
    }
    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit guidance pages: {}", e))
}

pub async fn list_pages_for_estate(
    pool: &SqlitePool,
    estate_id: &str,
) -> Result<Vec<GuidancePage>, String> {
    let rows = sqlx::query_as::<_, GuidanceRow>(
        "SELECT id, estate_id, title, summary, body, tags, notes, steps, templates,
            seed_version, updated_at
        FROM guidance WHERE estate_id = ? ORDER BY updated_at ASC",
    )
    .bind(estate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to list guidance pages: {}", e))?;

    rows.into_iter().map(row_to_page).collect()
}

pub async fn pages_updated_since(
    pool: &SqlitePool,
    estate_id: &str,
    since: &DateTime<Utc>,
) -> Result<Vec<GuidancePage>, String> {
    let rows = sqlx::query_as::<_, GuidanceRow>(
        "SELECT id, estate_id, title, summary, body, tags, notes, steps, templates,
            seed_version, updated_at
        FROM guidance WHERE estate_id = ? AND updated_at > ? ORDER BY updated_at ASC",
    )
    .bind(estate_id)
    .bind(fmt_instant(since))
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to scan updated guidance pages: {}", e))?;

    rows.into_iter().map(row_to_page).collect()
}

pub async fn replace_estate_pages(
    pool: &SqlitePool,
    estate_id: &str,
    pages: &[GuidancePage],
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    sqlx::query("DELETE FROM guidance WHERE estate_id = ?")
        .bind(estate_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to clear guidance pages: {}", e))?;

    for page in pages {
        insert_page(&mut *tx, page).await?;
    }

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit guidance replace: {}", e))
}
