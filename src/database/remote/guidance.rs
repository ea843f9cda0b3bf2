use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{
    fmt_instant, parse_instant, CloudContext, RemoteGateway, RowFilter, SyncError,
};
use crate::models::estates::{GuidancePage, GuidanceStep, GuidanceTemplate};

#[derive(Deserialize)]
struct GuidanceRow {
    id: String,
    estate_id: String,
    title: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    tags: Option<Vec<String>>,
    notes: Option<Vec<String>>,
    steps: Option<Vec<GuidanceStep>>,
    templates: Option<Vec<GuidanceTemplate>>,
    seed_version: Option<String>,
    updated_at: String,
}

pub fn row_to_page(value: &Value) -> Result<GuidancePage, SyncError> {
    let row: GuidanceRow = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::ParseError(format!("Invalid guidance row: {}", e)))?;

    Ok(GuidancePage {
        id: row.id,
        estate_id: row.estate_id,
        title: row.title.unwrap_or_default(),
        summary: row.summary,
        body: row.body,
        tags: row.tags.unwrap_or_default(),
        notes: row.notes.unwrap_or_default(),
        steps: row.steps.unwrap_or_default(),
        templates: row.templates.unwrap_or_default(),
        seed_version: row.seed_version,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

pub fn page_to_row(page: &GuidancePage, user_id: &str) -> Value {
    json!({
        "id": page.id,
        "user_id": user_id,
        "estate_id": page.estate_id,
        "title": page.title,
        "summary": page.summary,
        "body": page.body,
        "tags": page.tags,
        "notes": page.notes,
        "steps": page.steps,
        "templates": page.templates,
        "seed_version": page.seed_version,
        "updated_at": fmt_instant(&page.updated_at),
    })
}

pub async fn select_pages(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    estate_id: &str,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<GuidancePage>, SyncError> {
    let base = RowFilter::new().eq("estate_id", estate_id);
    let filter = match since {
        Some(cursor) => base
            .gt("updated_at", &fmt_instant(cursor))
            .order_asc("updated_at"),
        None => base.order_asc("updated_at"),
    };
    let rows = gateway.select_where(ctx, "guidance", &filter).await?;
    rows.iter().map(row_to_page).collect()
}

pub async fn upsert_page(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    page: &GuidancePage,
) -> Result<GuidancePage, SyncError> {
    let filter = RowFilter::new().eq("id", &page.id);
    let outcome = gateway
        .upsert_by_match(ctx, "guidance", &filter, page_to_row(page, &ctx.user_id))
        .await?;

    let row = match outcome.row {
        Some(row) => row,
        None => gateway
            .select_where(ctx, "guidance", &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::RowNotFound {
                table: "guidance".to_string(),
                id: page.id.clone(),
            })?,
    };
    row_to_page(&row)
}
