use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{
    fmt_instant, parse_date, parse_instant, CloudContext, RemoteGateway, RowFilter, SyncError,
};
use crate::models::estates::EstateProfile;

/// Wire shape of an `estates` row. Date-only fields travel as `YYYY-MM-DD`
/// strings under the `*_iso` names.
#[derive(Deserialize)]
struct EstateRow {
    id: String,
    label: Option<String>,
    county: Option<String>,
    decedent_name: Option<String>,
    dod_iso: Option<String>,
    letters_iso: Option<String>,
    first_publication_iso: Option<String>,
    notes: Option<String>,
    updated_at: Option<String>,
}

fn parse_opt_date(value: Option<&str>) -> Result<Option<chrono::NaiveDate>, SyncError> {
    match value {
        None | Some("") => Ok(None),
        Some(text) => parse_date(text).map(Some),
    }
}

pub fn row_to_profile(value: &Value) -> Result<EstateProfile, SyncError> {
    let row: EstateRow = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::ParseError(format!("Invalid estate row: {}", e)))?;

    // Rows written before profiles carried a timestamp sort below any local
    // edit during resolution.
    let updated_at = match row.updated_at.as_deref() {
        Some(value) => parse_instant(value)?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };

    Ok(EstateProfile {
        id: row.id,
        label: row.label.unwrap_or_default(),
        county: row.county.unwrap_or_default(),
        decedent_name: row.decedent_name.unwrap_or_default(),
        dod_date: parse_opt_date(row.dod_iso.as_deref())?,
        letters_date: parse_opt_date(row.letters_iso.as_deref())?,
        first_publication_date: parse_opt_date(row.first_publication_iso.as_deref())?,
        notes: row.notes,
        updated_at,
    })
}

pub fn profile_to_row(profile: &EstateProfile, user_id: &str) -> Value {
    json!({
        "id": profile.id,
        "user_id": user_id,
        "label": profile.label,
        "county": profile.county,
        "decedent_name": profile.decedent_name,
        "dod_iso": profile.dod_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "letters_iso": profile.letters_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "first_publication_iso": profile
            .first_publication_date
            .map(|d| d.format("%Y-%m-%d").to_string()),
        "notes": profile.notes,
        "updated_at": fmt_instant(&profile.updated_at),
    })
}

/// Fetch one estate profile by id. With `since`, returns `None` when the
/// remote row has not changed past the cursor.
pub async fn select_profile(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    estate_id: &str,
    since: Option<&DateTime<Utc>>,
) -> Result<Option<EstateProfile>, SyncError> {
    let mut filter = RowFilter::new().eq("id", estate_id);
    if let Some(cursor) = since {
        filter = filter.gt("updated_at", &fmt_instant(cursor));
    }
    let rows = gateway.select_where(ctx, "estates", &filter).await?;
    rows.first().map(row_to_profile).transpose()
}

pub async fn upsert_profile(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    profile: &EstateProfile,
) -> Result<EstateProfile, SyncError> {
    let filter = RowFilter::new().eq("id", &profile.id);
    let outcome = gateway
        .upsert_by_match(
            ctx,
            "estates",
            &filter,
            profile_to_row(profile, &ctx.user_id),
        )
        .await?;

    let row = match outcome.row {
        Some(row) => row,
        None => gateway
            .select_where(ctx, "estates", &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::RowNotFound {
                table: "estates".to_string(),
                id: profile.id.clone(),
            })?,
    };
    row_to_profile(&row)
}
