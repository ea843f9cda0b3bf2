use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::database::{fmt_instant, fmt_string_list, parse_instant, parse_string_list};
use crate::models::documents::DocumentRecord;

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    estate_id: String,
    title: String,
    tags: String,
    task_id: Option<String>,
    content_type: String,
    size: i64,
    file_name: Option<String>,
    storage_path: Option<String>,
    data: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

fn row_to_record(row: DocumentRow) -> Result<DocumentRecord, String> {
    Ok(DocumentRecord {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title,
        tags: parse_string_list(&row.tags)?,
        task_id: row.task_id,
        content_type: row.content_type,
        size: row.size,
        file_name: row.file_name,
        storage_path: row.storage_path,
        data: row.data,
        created_at: parse_instant(&row.created_at)?,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

async fn insert_document(
    conn: &mut SqliteConnection,
    record: &DocumentRecord,
) -> Result<(), String> {
    sqlx::query(
        "INSERT OR REPLACE INTO documents (id, estate_id, title, tags, task_id, content_type,
            size, file_name, storage_path, data, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.estate_id)
    .bind(&record.title)
    .bind(fmt_string_list(&record.tags))
    .bind(&record.task_id)
    .bind(&record.content_type)
    .bind(record.size)
    .bind(&record.file_name)
    .bind(&record.storage_path)
    .bind(&record.data)
    .bind(fmt_instant(&record.created_at))
    .bind(fmt_instant(&record.updated_at))
    .execute(conn)
    .await
    .map_err(|e| format!("Failed to store document {}: {}", record.id, e))?;
    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<DocumentRecord>, String> {
    let row = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, estate_id, title, tags, task_id, content_type, size, file_name,
            storage_path, data, created_at, updated_at
        FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch document: {}", e))?;

    row.map(row_to_record).transpose()
}

pub async fn put_document(pool: &SqlitePool, record: &DocumentRecord) -> Result<(), String> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to acquire connection: {}", e))?;
    insert_document(&mut *conn, record).await
}

pub async fn bulk_put_documents(
    pool: &SqlitePool,
    records: &[DocumentRecord],
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;
    for record in records {
        insert_document(&mut *tx, record).await?;
    }
    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit documents: {}", e))
}

/// Delete a document and drop its id from the owning task's `doc_ids`, if
/// any, in one transaction.
pub async fn delete_document(
    pool: &SqlitePool,
    id: &str,
    now: &DateTime<Utc>,
) -> Result<u64, String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    let owner = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT task_id FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| format!("Failed to fetch document {}: {}", id, e))?;

    if let Some((Some(task_id),)) = owner {
        remove_doc_from_task(&mut *tx, &task_id, id, now).await?;
    }

    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to delete document: {}", e))?;

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit document delete: {}", e))?;
    Ok(result.rows_affected())
}

pub async fn list_documents_for_estate(
    pool: &SqlitePool,
    estate_id: &str,
) -> Result<Vec<DocumentRecord>, String> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, estate_id, title, tags, task_id, content_type, size, file_name,
            storage_path, data, created_at, updated_at
        FROM documents WHERE estate_id = ? ORDER BY created_at DESC",
    )
    .bind(estate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to list documents: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

/// Documents created offline: blob retained, not yet uploaded.
pub async fn list_local_only_documents(
    pool: &SqlitePool,
) -> Result<Vec<DocumentRecord>, String> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, estate_id, title, tags, task_id, content_type, size, file_name,
            storage_path, data, created_at, updated_at
        FROM documents WHERE storage_path IS NULL AND data IS NOT NULL",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to list local-only documents: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

pub async fn documents_updated_since(
    pool: &SqlitePool,
    estate_id: &str,
    since: &DateTime<Utc>,
) -> Result<Vec<DocumentRecord>, String> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, estate_id, title, tags, task_id, content_type, size, file_name,
            storage_path, data, created_at, updated_at
        FROM documents WHERE estate_id = ? AND updated_at > ? ORDER BY updated_at ASC",
    )
    .bind(estate_id)
    .bind(fmt_instant(since))
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to scan updated documents: {}", e))?;

    rows.into_iter().map(row_to_record).collect()
}

/// Replace the estate's uploaded documents with the remote set in one
/// transaction. Local-only documents (no storage path yet) are invisible to
/// the remote and survive the replace.
pub async fn replace_estate_documents(
    pool: &SqlitePool,
    estate_id: &str,
    records: &[DocumentRecord],
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    sqlx::query("DELETE FROM documents WHERE estate_id = ? AND storage_path IS NOT NULL")
        .bind(estate_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to clear synced documents: {}", e))?;

    for record in records {
        insert_document(&mut *tx, record).await?;
    }

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit document replace: {}", e))
}

async fn remove_doc_from_task(
    conn: &mut SqliteConnection,
    task_id: &str,
    doc_id: &str,
    now: &DateTime<Utc>,
) -> Result<(), String> {
    let row = sqlx::query_as::<_, (String,)>("SELECT doc_ids FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| format!("Failed to fetch task {}: {}", task_id, e))?;

    let Some((doc_ids_json,)) = row else {
        return Ok(());
    };

    let mut doc_ids = parse_string_list(&doc_ids_json)?;
    let before = doc_ids.len();
    doc_ids.retain(|id| id != doc_id);
    if doc_ids.len() == before {
        return Ok(());
    }

    sqlx::query("UPDATE tasks SET doc_ids = ?, updated_at = ? WHERE id = ?")
        .bind(fmt_string_list(&doc_ids))
        .bind(fmt_instant(now))
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| format!("Failed to update task {}: {}", task_id, e))?;
    Ok(())
}

async fn add_doc_to_task(
    conn: &mut SqliteConnection,
    task_id: &str,
    doc_id: &str,
    now: &DateTime<Utc>,
) -> Result<(), String> {
    let row = sqlx::query_as::<_, (String,)>("SELECT doc_ids FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| format!("Failed to fetch task {}: {}", task_id, e))?;

    let Some((doc_ids_json,)) = row else {
        return Err(format!("Task {} not found", task_id));
    };

    let mut doc_ids = parse_string_list(&doc_ids_json)?;
    if doc_ids.iter().any(|id| id == doc_id) {
        return Ok(());
    }
    doc_ids.push(doc_id.to_string());

    sqlx::query("UPDATE tasks SET doc_ids = ?, updated_at = ? WHERE id = ?")
        .bind(fmt_string_list(&doc_ids))
        .bind(fmt_instant(now))
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| format!("Failed to update task {}: {}", task_id, e))?;
    Ok(())
}

/// Link a document to a task. If the document was linked elsewhere it is
/// removed from the previous task's `doc_ids` first; both records change in
/// the same transaction so the back-reference invariant holds.
pub async fn link_document(
    pool: &SqlitePool,
    doc_id: &str,
    task_id: &str,
    now: &DateTime<Utc>,
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    let row = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT task_id FROM documents WHERE id = ?",
    )
    .bind(doc_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| format!("Failed to fetch document {}: {}", doc_id, e))?;

    let Some((previous,)) = row else {
        return Err(format!("Document {} not found", doc_id));
    };

    if let Some(previous_task) = previous.as_deref() {
        if previous_task != task_id {
            remove_doc_from_task(&mut *tx, previous_task, doc_id, now).await?;
        }
    }

    add_doc_to_task(&mut *tx, task_id, doc_id, now).await?;

    sqlx::query("UPDATE documents SET task_id = ?, updated_at = ? WHERE id = ?")
        .bind(task_id)
        .bind(fmt_instant(now))
        .bind(doc_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to update document {}: {}", doc_id, e))?;

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit link: {}", e))
}

/// Clear a document's `task_id` and drop it from its former task's
/// `doc_ids`, if any.
pub async fn unlink_document(
    pool: &SqlitePool,
    doc_id: &str,
    now: &DateTime<Utc>,
) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to begin transaction: {}", e))?;

    let row = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT task_id FROM documents WHERE id = ?",
    )
    .bind(doc_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| format!("Failed to fetch document {}: {}", doc_id, e))?;

    let Some((previous,)) = row else {
        return Err(format!("Document {} not found", doc_id));
    };

    if let Some(previous_task) = previous.as_deref() {
        remove_doc_from_task(&mut *tx, previous_task, doc_id, now).await?;
    }

    sqlx::query("UPDATE documents SET task_id = NULL, updated_at = ? WHERE id = ?")
        .bind(fmt_instant(now))
        .bind(doc_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to update document {}: {}", doc_id, e))?;

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit unlink: {}", e))
}
