use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{
    fmt_instant, parse_instant, CloudContext, RemoteGateway, RowFilter, SyncError,
};
use crate::models::documents::DocumentRecord;

/// Storage bucket holding every uploaded document blob.
pub const DOCUMENTS_BUCKET: &str = "documents";

/// Wire shape of a `documents_meta` row. Blobs never travel through this
/// table; they live in storage under `storage_path`.
#[derive(Deserialize)]
struct DocumentMetaRow {
    id: String,
    estate_id: String,
    title: String,
    file_name: Option<String>,
    storage_path: Option<String>,
    content_type: Option<String>,
    size: Option<i64>,
    tags: Option<Vec<String>>,
    task_id: Option<String>,
    created_at: String,
    updated_at: Option<String>,
}

pub fn row_to_record(value: &Value) -> Result<DocumentRecord, SyncError> {
    let row: DocumentMetaRow = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::ParseError(format!("Invalid document row: {}", e)))?;

    let created_at = parse_instant(&row.created_at)?;
    let updated_at = match row.updated_at.as_deref() {
        Some(value) => parse_instant(value)?,
        None => created_at,
    };

    Ok(DocumentRecord {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title,
        tags: row.tags.unwrap_or_default(),
        task_id: row.task_id,
        content_type: row
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        size: row.size.unwrap_or(0),
        file_name: row.file_name,
        storage_path: row.storage_path,
        data: None,
        created_at,
        updated_at,
    })
}

pub fn record_to_row(record: &DocumentRecord, user_id: &str) -> Value {
    json!({
        "id": record.id,
        "user_id": user_id,
        "estate_id": record.estate_id,
        "title": record.title,
        "file_name": record.file_name,
        "storage_path": record.storage_path,
        "content_type": record.content_type,
        "size": record.size,
        "tags": record.tags,
        "task_id": record.task_id,
        "created_at": fmt_instant(&record.created_at),
        "updated_at": fmt_instant(&record.updated_at),
    })
}

pub async fn select_documents(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    estate_id: &str,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<DocumentRecord>, SyncError> {
    let base = RowFilter::new().eq("estate_id", estate_id);
    let filter = match since {
        Some(cursor) => base
            .gt("updated_at", &fmt_instant(cursor))
            .order_asc("updated_at"),
        None => base.order_desc("created_at"),
    };
    let rows = gateway.select_where(ctx, "documents_meta", &filter).await?;
    rows.iter().map(row_to_record).collect()
}

pub async fn upsert_document(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    record: &DocumentRecord,
) -> Result<DocumentRecord, SyncError> {
    let filter = RowFilter::new().eq("id", &record.id);
    let outcome = gateway
        .upsert_by_match(
            ctx,
            "documents_meta",
            &filter,
            record_to_row(record, &ctx.user_id),
        )
        .await?;

    let row = match outcome.row {
        Some(row) => row,
        None => gateway
            .select_where(ctx, "documents_meta", &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::RowNotFound {
                table: "documents_meta".to_string(),
                id: record.id.clone(),
            })?,
    };
    row_to_record(&row)
}

pub async fn delete_document(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    id: &str,
) -> Result<(), SyncError> {
    gateway
        .delete_where(ctx, "documents_meta", &RowFilter::new().eq("id", id))
        .await
}
