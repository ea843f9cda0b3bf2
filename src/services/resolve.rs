//! Conflict resolution between local and remote copies of the same record.
//!
//! All functions here are pure: they take both candidates and return the
//! fully-formed record to store locally. The sync engine never writes a
//! partial patch.

use std::collections::HashSet;

use crate::models::documents::DocumentRecord;
use crate::models::estates::{EstateProfile, GuidancePage};
use crate::models::journal::JournalEntryRecord;
use crate::models::tasks::TaskRecord;

/// Last-writer-wins on `updated_at`. Ties keep the remote copy, since the
/// remote is the durable source once reachable.
pub fn resolve_task(local: Option<TaskRecord>, remote: TaskRecord) -> TaskRecord {
    match local {
        Some(local) if local.updated_at > remote.updated_at => local,
        _ => remote,
    }
}

/// Journal entries carry no user-visible update timestamp, so the creation
/// instant decides. Ties keep the remote copy.
pub fn resolve_entry(
    local: Option<JournalEntryRecord>,
    remote: JournalEntryRecord,
) -> JournalEntryRecord {
    match local {
        Some(local) if local.created_at > remote.created_at => local,
        _ => remote,
    }
}

/// Last-writer-wins, with one wrinkle: the remote metadata row never carries
/// the blob, so a retained local blob survives as long as the row has no
/// storage path yet.
pub fn resolve_document(local: Option<DocumentRecord>, remote: DocumentRecord) -> DocumentRecord {
    let Some(local) = local else {
        return remote;
    };
    if local.updated_at > remote.updated_at {
        return local;
    }
    let mut resolved = remote;
    if resolved.storage_path.is_none() && resolved.data.is_none() {
        resolved.data = local.data;
    }
    resolved
}

/// Field-level merge: each non-empty remote field overwrites the local one,
/// and empty or absent remote fields preserve local values. A partially
/// populated remote row never blanks locally-entered data.
pub fn merge_profile(local: Option<EstateProfile>, remote: EstateProfile) -> EstateProfile {
    let Some(local) = local else {
        return remote;
    };

    let text = |remote_value: String, local_value: String| {
        if remote_value.is_empty() {
            local_value
        } else {
            remote_value
        }
    };

    EstateProfile {
        id: local.id,
        label: text(remote.label, local.label),
        county: text(remote.county, local.county),
        decedent_name: text(remote.decedent_name, local.decedent_name),
        dod_date: remote.dod_date.or(local.dod_date),
        letters_date: remote.letters_date.or(local.letters_date),
        first_publication_date: remote.first_publication_date.or(local.first_publication_date),
        notes: match remote.notes {
            Some(notes) if !notes.is_empty() => Some(notes),
            _ => local.notes,
        },
        updated_at: local.updated_at.max(remote.updated_at),
    }
}

/// Id-keyed list merge: remote pages replace same-id local pages, local-only
/// pages are preserved untouched.
pub fn merge_guidance(local: Vec<GuidancePage>, remote: Vec<GuidancePage>) -> Vec<GuidancePage> {
    let remote_ids: HashSet<String> = remote.iter().map(|page| page.id.clone()).collect();
    let mut merged = remote;
    for page in local {
        if !remote_ids.contains(&page.id) {
            merged.push(page);
        }
    }
    merged
}
