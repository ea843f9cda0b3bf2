use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{
    fmt_instant, parse_instant, CloudContext, RemoteGateway, RowFilter, SyncError,
};
use crate::models::journal::JournalEntryRecord;

#[derive(Deserialize)]
struct JournalRow {
    id: String,
    estate_id: String,
    title: Option<String>,
    body: Option<String>,
    created_at: String,
    updated_at: Option<String>,
}

pub fn row_to_record(value: &Value) -> Result<JournalEntryRecord, SyncError> {
    let row: JournalRow = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::ParseError(format!("Invalid journal row: {}", e)))?;

    let created_at = parse_instant(&row.created_at)?;
    let updated_at = match row.updated_at.as_deref() {
        Some(value) => parse_instant(value)?,
        None => created_at,
    };

    Ok(JournalEntryRecord {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title.unwrap_or_default(),
        body: row.body.unwrap_or_default(),
        created_at,
        updated_at,
    })
}

pub fn record_to_row(record: &JournalEntryRecord, user_id: &str) -> Value {
    json!({
        "id": record.id,
        "user_id": user_id,
        "estate_id": record.estate_id,
        "title": record.title,
        "body": record.body,
        "created_at": fmt_instant(&record.created_at),
        "updated_at": fmt_instant(&record.updated_at),
    })
}

pub async fn select_entries(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    estate_id: &str,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<JournalEntryRecord>, SyncError> {
    let base = RowFilter::new().eq("estate_id", estate_id);
    let filter = match since {
        Some(cursor) => base
            .gt("updated_at", &fmt_instant(cursor))
            .order_asc("updated_at"),
        None => base.order_desc("created_at"),
    };
    let rows = gateway.select_where(ctx, "journal", &filter).await?;
    rows.iter().map(row_to_record).collect()
}

pub async fn upsert_entry(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    record: &JournalEntryRecord,
) -> Result<JournalEntryRecord, SyncError> {
    let filter = RowFilter::new().eq("id", &record.id);
    let outcome = gateway
        .upsert_by_match(ctx, "journal", &filter, record_to_row(record, &ctx.user_id))
        .await?;

    let row = match outcome.row {
        Some(row) => row,
        None => gateway
            .select_where(ctx, "journal", &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::RowNotFound {
                table: "journal".to_string(),
                id: record.id.clone(),
            })?,
    };
    row_to_record(&row)
}

pub async fn delete_entry(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    id: &str,
) -> Result<(), SyncError> {
    gateway
        .delete_where(ctx, "journal", &RowFilter::new().eq("id", id))
        .await
}
