use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Journal entries have no user-visible update timestamp; `updated_at` only
/// drives the incremental sync window, and conflict resolution compares
/// `created_at`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JournalEntryRecord {
    pub id: String,
    pub estate_id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct JournalEntryInput {
    pub estate_id: String,
    pub title: String,
    pub body: String,
}

#[derive(Clone, Debug, Default)]
pub struct JournalEntryPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl JournalEntryRecord {
    pub fn apply_patch(&self, patch: &JournalEntryPatch, now: DateTime<Utc>) -> JournalEntryRecord {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(body) = &patch.body {
            next.body = body.clone();
        }
        next.updated_at = now;
        next
    }
}
