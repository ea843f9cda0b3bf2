use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{
    fmt_instant, parse_instant, CloudContext, RemoteGateway, RowFilter, SyncError,
};
use crate::models::tasks::{TaskPriority, TaskRecord, TaskStatus};

/// Wire shape of a `tasks` row.
#[derive(Deserialize)]
struct TaskRow {
    id: String,
    estate_id: String,
    title: String,
    description: Option<String>,
    due_date: String,
    status: String,
    priority: String,
    tags: Option<Vec<String>>,
    doc_ids: Option<Vec<String>>,
    seed_version: Option<String>,
    created_at: String,
    updated_at: String,
}

pub fn row_to_record(value: &Value) -> Result<TaskRecord, SyncError> {
    let row: TaskRow = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::ParseError(format!("Invalid task row: {}", e)))?;

    Ok(TaskRecord {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title,
        description: row.description.unwrap_or_default(),
        due_date: parse_instant(&row.due_date)?,
        status: TaskStatus::parse(&row.status).map_err(SyncError::ParseError)?,
        priority: TaskPriority::parse(&row.priority).map_err(SyncError::ParseError)?,
        tags: row.tags.unwrap_or_default(),
        doc_ids: row.doc_ids.unwrap_or_default(),
        seed_version: row.seed_version,
        created_at: parse_instant(&row.created_at)?,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

pub fn record_to_row(record: &TaskRecord, user_id: &str) -> Value {
    json!({
        "id": record.id,
        "user_id": user_id,
        "estate_id": record.estate_id,
        "title": record.title,
        "description": record.description,
        "due_date": fmt_instant(&record.due_date),
        "status": record.status.as_str(),
        "priority": record.priority.as_str(),
        "tags": record.tags,
        "doc_ids": record.doc_ids,
        "seed_version": record.seed_version,
        "created_at": fmt_instant(&record.created_at),
        "updated_at": fmt_instant(&record.updated_at),
    })
}

/// Pull tasks for one estate. With `since`, only rows changed after the
/// cursor, oldest change first.
pub async fn select_tasks(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    estate_id: &str,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<TaskRecord>, SyncError> {
    let base = RowFilter::new().eq("estate_id", estate_id);
    let filter = match since {
        Some(cursor) => base
            .gt("updated_at", &fmt_instant(cursor))
            .order_asc("updated_at"),
        None => base.order_asc("due_date"),
    };
    let rows = gateway.select_where(ctx, "tasks", &filter).await?;
    rows.iter().map(row_to_record).collect()
}

/// Upsert one task by id and return the authoritative remote row. When the
/// backend does not echo a representation, re-fetch the row singly.
pub async fn upsert_task(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    record: &TaskRecord,
) -> Result<TaskRecord, SyncError> {
    let filter = RowFilter::new().eq("id", &record.id);
    let outcome = gateway
        .upsert_by_match(ctx, "tasks", &filter, record_to_row(record, &ctx.user_id))
        .await?;

    let row = match outcome.row {
        Some(row) => row,
        None => gateway
            .select_where(ctx, "tasks", &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::RowNotFound {
                table: "tasks".to_string(),
                id: record.id.clone(),
            })?,
    };
    row_to_record(&row)
}

pub async fn delete_task(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    id: &str,
) -> Result<(), SyncError> {
    gateway
        .delete_where(ctx, "tasks", &RowFilter::new().eq("id", id))
        .await
}
