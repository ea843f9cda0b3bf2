use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::database::{fmt_date, fmt_instant, parse_date, parse_instant};
use crate::models::estates::EstateProfile;

#[derive(FromRow)]
struct EstateRow {
    id: String,
    label: String,
    county: String,
    decedent_name: String,
    dod_date: String,
    letters_date: Option<String>,
    first_publication_date: Option<String>,
    notes: Option<String>,
    updated_at: String,
}

fn row_to_profile(row: EstateRow) -> Result<EstateProfile, String> {
    let parse_opt_date = |value: Option<String>| -> Result<Option<chrono::NaiveDate>, String> {
        match value.as_deref() {
            None | Some("") => Ok(None),
            Some(text) => parse_date(text).map(Some),
        }
    };

    Ok(EstateProfile {
        id: row.id,
        label: row.label,
        county: row.county,
        decedent_name: row.decedent_name,
        dod_date: if row.dod_date.is_empty() {
            None
        } else {
            Some(parse_date(&row.dod_date)?)
        },
        letters_date: parse_opt_date(row.letters_date)?,
        first_publication_date: parse_opt_date(row.first_publication_date)?,
        notes: row.notes,
        updated_at: parse_instant(&row.updated_at)?,
    })
}

pub async fn get_profile(pool: &SqlitePool, id: &str) -> Result<Option<EstateProfile>, String> {
    let row = sqlx::query_as::<_, EstateRow>(
        "SELECT id, label, county, decedent_name, dod_date, letters_date,
            first_publication_date, notes, updated_at
        FROM estates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to fetch estate profile: {}", e))?;

    row.map(row_to_profile).transpose()
}

pub async fn put_profile(pool: &SqlitePool, profile: &EstateProfile) -> Result<(), String> {
    sqlx::query(
        "INSERT OR REPLACE INTO estates (id, label, county, decedent_name, dod_date,
            letters_date, first_publication_date, notes, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&profile.id)
    .bind(&profile.label)
    .bind(&profile.county)
    .bind(&profile.decedent_name)
    .bind(profile.dod_date.map(|d| fmt_date(&d)).unwrap_or_default())
    .bind(profile.letters_date.map(|d| fmt_date(&d)))
    .bind(profile.first_publication_date.map(|d| fmt_date(&d)))
    .bind(&profile.notes)
    .bind(fmt_instant(&profile.updated_at))
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to store estate profile: {}", e))?;
    Ok(())
}

pub async fn list_profiles(pool: &SqlitePool) -> Result<Vec<EstateProfile>, String> {
    let rows = sqlx::query_as::<_, EstateRow>(
        "SELECT id, label, county, decedent_name, dod_date, letters_date,
            first_publication_date, notes, updated_at
        FROM estates ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("Failed to list estate profiles: {}", e))?;

    rows.into_iter().map(row_to_profile).collect()
}

pub async fn profile_updated_since(
    pool: &SqlitePool,
    id: &str,
    since: &DateTime<Utc>,
) -> Result<Option<EstateProfile>, String> {
    let row = sqlx::query_as::<_, EstateRow>(
        "SELECT id, label, county, decedent_name, dod_date, letters_date,
            first_publication_date, notes, updated_at
        FROM estates WHERE id = ? AND updated_at > ?",
    )
    .bind(id)
    .bind(fmt_instant(since))
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("Failed to scan estate profile: {}", e))?;

    row.map(row_to_profile).transpose()
}
