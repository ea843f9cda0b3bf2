use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::database::{fmt_instant, fmt_string_list, parse_instant, parse_string_list};
use crate::models::tasks::{TaskPriority, TaskRecord, TaskStatus};

#[derive(FromRow)]
struct TaskRow {
    id: String,
    estate_id: String,
    title: String,
    description: String,
    due_date: String,
    status: String,
    priority: String,
    tags: String,
    doc_ids: String,
    seed_version: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_record(row: TaskRow) -> Result<TaskRecord, String> {
    Ok(TaskRecord {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title,
        description: row.description,
        due_date: parse_instant(&row.due_date)?,
        status: TaskStatus::parse(&row.status)?,
        priority: TaskPriority::parse(&row.priority)?,
        tags: parse_string_list(&row.tags)?,
        doc_ids: parse_string_list(&row.doc_ids)?,
        seed_version: row.seed_version,
        created_at: parse_instant(&row.created_at)?,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

pub async fn get_task(pool: &SqlitePool, id: &str) -> Result<Option<TaskRecord>, String> {
    let row = sqlx::query_as::<_, TaskRow>(
        "SELECT id, estate_id, title, description, due_date, status, priority, tags, doc_ids,
            seed_version, created_at, updated_at
        FROM tasks WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch task: {}", e))?;

    row.map(row_to_record).transpose()
}

pub async fn put_task(pool: &SqlitePool, record: &TaskRecord) -> Result<(), String> {
    sqlx::query(
        "INSERT OR REPLACE INTO tasks (id, estate_id, title, description, due_date, status,
            priority, tags, doc_ids, seed_version, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.estate_id)
    .bind(&record.title)
    .bind(&record.description)
    .bind(fmt_instant(&record.due_date))
    .bind(record.status.as_str())
    .bind(record.priority.as_str())
    .bind(fmt_string_list(&record.tags))
    .bind(fmt_string_list(&record.doc_ids))
    .bind(&record.seed_version)
    .bind(fmt_instant(&record.created_at))
    .bind(fmt_instant(&record.updated_at))
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to store task: {}", e))?;
    Ok(())
}

pub async fn bulk_put_tasks(pool: &SqlitePool, records: &[TaskRecord]) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    for record in records {
        sqlx::query(
            "INSERT OR REPLACE INTO tasks (id, estate_id, title, description, due_date, status,
                priority, tags, doc_ids, seed_version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.estate_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(fmt_instant(&record.due_date))
        .bind(record.status.as_str())
        .bind(record.priority.as_str())
        .bind(fmt_string_list(&record.tags))
        .bind(fmt_string_list(&record.doc_ids))
        .bind(&record.seed_version)
        .bind(fmt_instant(&record.created_at))
        .bind(fmt_instant(&record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to store task {}: {}", record.id, e))?;
    }

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit tasks: {}", e))
}

/// Delete a task and clear the `task_id` back-reference on any documents it
/// owned. Linked documents are unlinked, never deleted.
pub async fn delete_task(
    pool: &SqlitePool,
    id: &str,
    now: &DateTime<Utc>,
) -> Result<u64, String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    sqlx::query("UPDATE documents SET task_id = NULL, updated_at = ? WHERE task_id = ?")
        .bind(fmt_instant(now))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to unlink documents for task {}: {}", id, e))?;

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to delete task: {}", e))?;

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit task delete: {}", e))?;
    Ok(result.rows_affected())
}

pub async fn list_tasks_for_estate(
    pool: &SqlitePool,
    estate_id: &str,
) -> Result<Vec<TaskRecord>, String> {
    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT id, estate_id, title, description, due_date, status, priority, tags, doc_ids,
            seed_version, created_at, updated_at
        FROM tasks WHERE estate_id = ? ORDER BY due_date ASC",
    )
    .bind(estate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to list tasks: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

/// Tasks whose own `updated_at` is strictly past `since` — the incremental
/// sync push window.
pub async fn tasks_updated_since(
    pool: &SqlitePool,
    estate_id: &str,
    since: &DateTime<Utc>,
) -> Result<Vec<TaskRecord>, String> {
    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT id, estate_id, title, description, due_date, status, priority, tags, doc_ids,
            seed_version, created_at, updated_at
        FROM tasks WHERE estate_id = ? AND updated_at > ? ORDER BY updated_at ASC",
    )
    .bind(estate_id)
    .bind(fmt_instant(since))
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to scan updated tasks: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

/// Replace the estate's whole task collection in one transaction
/// (delete-all-then-bulk-insert). Used by first-contact full sync only.
pub async fn replace_estate_tasks(
    pool: &SqlitePool,
    estate_id: &str,
    records: &[TaskRecord],
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    sqlx::query("DELETE FROM tasks WHERE estate_id = ?")
        .bind(estate_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to clear tasks: {}", e))?;

    for record in records {
        sqlx::query(
            "INSERT INTO tasks (id, estate_id, title, description, due_date, status, priority,
                tags, doc_ids, seed_version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.estate_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(fmt_instant(&record.due_date))
        .bind(record.status.as_str())
        .bind(record.priority.as_str())
        .bind(fmt_string_list(&record.tags))
        .bind(fmt_string_list(&record.doc_ids))
        .bind(&record.seed_version)
        .bind(fmt_instant(&record.created_at))
        .bind(fmt_instant(&record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to insert task {}: {}", record.id, e))?;
    }

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit task replace: {}", e))
}
