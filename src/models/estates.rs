use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-estate profile. Synced field-by-field: a remote row never blanks a
/// field it does not populate, so text fields keep "" as "empty" and date
/// fields use `None`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EstateProfile {
    pub id: String,
    pub label: String,
    pub county: String,
    pub decedent_name: String,
    pub dod_date: Option<NaiveDate>,
    pub letters_date: Option<NaiveDate>,
    pub first_publication_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct GuidanceStep {
    pub title: Option<String>,
    pub detail: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GuidanceTemplate {
    pub id: String,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// An id-keyed guidance page. Sync merges these as a list: remote entries
/// replace same-id local ones, local-only entries are preserved.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GuidancePage {
    pub id: String,
    pub estate_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub tags: Vec<String>,
    pub notes: Vec<String>,
    pub steps: Vec<GuidanceStep>,
    pub templates: Vec<GuidanceTemplate>,
    pub seed_version: Option<String>,
    pub updated_at: DateTime<Utc>,
}
