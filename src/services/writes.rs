//! Write-through with degrade-to-write-behind: user mutations try the
//! remote first and always land locally, so the user never waits on cloud
//! availability and no write is silently dropped.
//!
//! The degraded case is a value, not an error: `WriteOutcome::Fallback`
//! still carries the record the caller asked for, plus enough context to
//! surface a "saved locally, will sync later" advisory. Local store
//! failures remain hard errors.

use chrono::Utc;
use log::warn;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::local::{documents, estates, journal, tasks};
use crate::database::remote::common::{CloudContext, RemoteGateway, SyncError};
use crate::database::remote::{
    documents as remote_documents, estates as remote_estates, journal as remote_journal,
    tasks as remote_tasks,
};
use crate::models::estates::EstateProfile;
use crate::models::journal::{JournalEntryInput, JournalEntryPatch, JournalEntryRecord};
use crate::models::tasks::{TaskInput, TaskPatch, TaskRecord};
use crate::services::cloud_sync::CloudSyncError;

/// Why a write landed locally instead of remotely.
#[derive(Debug)]
pub struct WriteFallback {
    pub error: SyncError,
    pub estate_id: String,
    pub local_id: String,
}

/// Result of a user-initiated write. `Fallback` is still a success from the
/// user's perspective; the value is durable locally and a later sync pass
/// will push it.
#[derive(Debug)]
pub enum WriteOutcome<T> {
    Ok(T),
    Fallback { value: T, reason: WriteFallback },
}

impl<T> WriteOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            WriteOutcome::Ok(value) => value,
            WriteOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            WriteOutcome::Ok(value) => value,
            WriteOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn fallback(&self) -> Option<&WriteFallback> {
        match self {
            WriteOutcome::Ok(_) => None,
            WriteOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

fn fallback<T>(value: T, error: SyncError, estate_id: &str, local_id: &str) -> WriteOutcome<T> {
    warn!(
        "remote write failed for {} in estate {}, saved locally: {}",
        local_id, estate_id, error
    );
    WriteOutcome::Fallback {
        value,
        reason: WriteFallback {
            error,
            estate_id: estate_id.to_string(),
            local_id: local_id.to_string(),
        },
    }
}

pub async fn create_task(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    input: TaskInput,
) -> Result<WriteOutcome<TaskRecord>, CloudSyncError> {
    let now = Utc::now();
    let record = TaskRecord {
        id: Uuid::new_v4().to_string(),
        estate_id: input.estate_id,
        title: input.title,
        description: input.description,
        due_date: input.due_date,
        status: input.status,
        priority: input.priority,
        tags: input.tags,
        doc_ids: input.doc_ids,
        seed_version: None,
        created_at: now,
        updated_at: now,
    };

    let Some(ctx) = ctx else {
        tasks::put_task(pool, &record).await?;
        let estate_id = record.estate_id.clone();
        let local_id = record.id.clone();
        return Ok(fallback(record, SyncError::NotSignedIn, &estate_id, &local_id));
    };

    match remote_tasks::upsert_task(gateway, ctx, &record).await {
        Ok(authoritative) => {
            tasks::put_task(pool, &authoritative).await?;
            Ok(WriteOutcome::Ok(authoritative))
        }
        Err(error) => {
            tasks::put_task(pool, &record).await?;
            let estate_id = record.estate_id.clone();
            let local_id = record.id.clone();
            Ok(fallback(record, error, &estate_id, &local_id))
        }
    }
}

pub async fn update_task(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    task_id: &str,
    patch: &TaskPatch,
) -> Result<WriteOutcome<TaskRecord>, CloudSyncError> {
    let existing = tasks::get_task(pool, task_id)
        .await?
        .ok_or_else(|| CloudSyncError::LocalDb(format!("Task {} not found", task_id)))?;
    let record = existing.apply_patch(patch, Utc::now());

    let Some(ctx) = ctx else {
        tasks::put_task(pool, &record).await?;
        let estate_id = record.estate_id.clone();
        return Ok(fallback(record, SyncError::NotSignedIn, &estate_id, task_id));
    };

    match remote_tasks::upsert_task(gateway, ctx, &record).await {
        Ok(authoritative) => {
            tasks::put_task(pool, &authoritative).await?;
            Ok(WriteOutcome::Ok(authoritative))
        }
        Err(error) => {
            tasks::put_task(pool, &record).await?;
            let estate_id = record.estate_id.clone();
            Ok(fallback(record, error, &estate_id, task_id))
        }
    }
}

/// Delete a task locally and remotely. Linked documents are unlinked, never
/// deleted (the local cascade clears their back-references).
pub async fn delete_task(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    task_id: &str,
    estate_id: &str,
) -> Result<WriteOutcome<()>, CloudSyncError> {
    let now = Utc::now();

    let Some(ctx) = ctx else {
        tasks::delete_task(pool, task_id, &now).await?;
        return Ok(fallback((), SyncError::NotSignedIn, estate_id, task_id));
    };

    match remote_tasks::delete_task(gateway, ctx, task_id).await {
        Ok(()) => {
            tasks::delete_task(pool, task_id, &now).await?;
            Ok(WriteOutcome::Ok(()))
        }
        Err(error) => {
            tasks::delete_task(pool, task_id, &now).await?;
            Ok(fallback((), error, estate_id, task_id))
        }
    }
}

pub async fn create_journal_entry(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    input: JournalEntryInput,
) -> Result<WriteOutcome<JournalEntryRecord>, CloudSyncError> {
    let now = Utc::now();
    let record = JournalEntryRecord {
        id: Uuid::new_v4().to_string(),
        estate_id: input.estate_id,
        title: input.title,
        body: input.body,
        created_at: now,
        updated_at: now,
    };

    let Some(ctx) = ctx else {
        journal::put_entry(pool, &record).await?;
        let estate_id = record.estate_id.clone();
        let local_id = record.id.clone();
        return Ok(fallback(record, SyncError::NotSignedIn, &estate_id, &local_id));
    };

    match remote_journal::upsert_entry(gateway, ctx, &record).await {
        Ok(authoritative) => {
            journal::put_entry(pool, &authoritative).await?;
            Ok(WriteOutcome::Ok(authoritative))
        }
        Err(error) => {
            journal::put_entry(pool, &record).await?;
            let estate_id = record.estate_id.clone();
            let local_id = record.id.clone();
            Ok(fallback(record, error, &estate_id, &local_id))
        }
    }
}

pub async fn update_journal_entry(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    entry_id: &str,
    patch: &JournalEntryPatch,
) -> Result<WriteOutcome<JournalEntryRecord>, CloudSyncError> {
    let existing = journal::get_entry(pool, entry_id)
        .await?
        .ok_or_else(|| CloudSyncError::LocalDb(format!("Journal entry {} not found", entry_id)))?;
    let record = existing.apply_patch(patch, Utc::now());

    let Some(ctx) = ctx else {
        journal::put_entry(pool, &record).await?;
        let estate_id = record.estate_id.clone();
        return Ok(fallback(record, SyncError::NotSignedIn, &estate_id, entry_id));
    };

    match remote_journal::upsert_entry(gateway, ctx, &record).await {
        Ok(authoritative) => {
            journal::put_entry(pool, &authoritative).await?;
            Ok(WriteOutcome::Ok(authoritative))
        }
        Err(error) => {
            journal::put_entry(pool, &record).await?;
            let estate_id = record.estate_id.clone();
            Ok(fallback(record, error, &estate_id, entry_id))
        }
    }
}

pub async fn delete_journal_entry(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    entry_id: &str,
    estate_id: &str,
) -> Result<WriteOutcome<()>, CloudSyncError> {
    let Some(ctx) = ctx else {
        journal::delete_entry(pool, entry_id).await?;
        return Ok(fallback((), SyncError::NotSignedIn, estate_id, entry_id));
    };

    match remote_journal::delete_entry(gateway, ctx, entry_id).await {
        Ok(()) => {
            journal::delete_entry(pool, entry_id).await?;
            Ok(WriteOutcome::Ok(()))
        }
        Err(error) => {
            journal::delete_entry(pool, entry_id).await?;
            Ok(fallback((), error, estate_id, entry_id))
        }
    }
}

/// Store an edited estate profile, bumping its update timestamp.
pub async fn update_estate_profile(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    profile: EstateProfile,
) -> Result<WriteOutcome<EstateProfile>, CloudSyncError> {
    let mut record = profile;
    record.updated_at = Utc::now();

    let Some(ctx) = ctx else {
        estates::put_profile(pool, &record).await?;
        let estate_id = record.id.clone();
        let local_id = record.id.clone();
        return Ok(fallback(record, SyncError::NotSignedIn, &estate_id, &local_id));
    };

    match remote_estates::upsert_profile(gateway, ctx, &record).await {
        Ok(authoritative) => {
            estates::put_profile(pool, &authoritative).await?;
            Ok(WriteOutcome::Ok(authoritative))
        }
        Err(error) => {
            estates::put_profile(pool, &record).await?;
            let estate_id = record.id.clone();
            let local_id = record.id.clone();
            Ok(fallback(record, error, &estate_id, &local_id))
        }
    }
}

/// Link a document to a task. The two local records change in one
/// transaction; when signed in, the new back-reference and timestamps are
/// mirrored to the remote metadata and task rows.
pub async fn link_document(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    doc_id: &str,
    task_id: &str,
    estate_id: &str,
) -> Result<WriteOutcome<()>, CloudSyncError> {
    let now = Utc::now();
    documents::link_document(pool, doc_id, task_id, &now).await?;

    let Some(ctx) = ctx else {
        return Ok(fallback((), SyncError::NotSignedIn, estate_id, task_id));
    };

    match mirror_link(pool, gateway, ctx, doc_id, task_id).await {
        Ok(()) => Ok(WriteOutcome::Ok(())),
        Err(CloudSyncError::Remote(error)) => Ok(fallback((), error, estate_id, task_id)),
        Err(error) => Err(error),
    }
}

/// Clear a document's task link, mirroring remotely when signed in.
pub async fn unlink_document(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    doc_id: &str,
    estate_id: &str,
) -> Result<WriteOutcome<()>, CloudSyncError> {
    let now = Utc::now();
    let previous_task = documents::get_document(pool, doc_id)
        .await?
        .ok_or_else(|| CloudSyncError::LocalDb(format!("Document {} not found", doc_id)))?
        .task_id;
    documents::unlink_document(pool, doc_id, &now).await?;

    let Some(ctx) = ctx else {
        return Ok(fallback((), SyncError::NotSignedIn, estate_id, doc_id));
    };

    match mirror_unlink(pool, gateway, ctx, doc_id, previous_task.as_deref()).await {
        Ok(()) => Ok(WriteOutcome::Ok(())),
        Err(CloudSyncError::Remote(error)) => Ok(fallback((), error, estate_id, doc_id)),
        Err(error) => Err(error),
    }
}

async fn mirror_link(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    doc_id: &str,
    task_id: &str,
) -> Result<(), CloudSyncError> {
    if let Some(doc) = documents::get_document(pool, doc_id).await? {
        // A local-only document has no remote metadata row to mirror yet;
        // migration will carry the link when it uploads.
        if !doc.is_local_only() {
            remote_documents::upsert_document(gateway, ctx, &doc).await?;
        }
    }
    if let Some(task) = tasks::get_task(pool, task_id).await? {
        remote_tasks::upsert_task(gateway, ctx, &task).await?;
    }
    Ok(())
}

async fn mirror_unlink(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    doc_id: &str,
    previous_task: Option<&str>,
) -> Result<(), CloudSyncError> {
    if let Some(doc) = documents::get_document(pool, doc_id).await? {
        if !doc.is_local_only() {
            remote_documents::upsert_document(gateway, ctx, &doc).await?;
        }
    }
    if let Some(task_id) = previous_task {
        if let Some(task) = tasks::get_task(pool, task_id).await? {
            remote_tasks::upsert_task(gateway, ctx, &task).await?;
        }
    }
    Ok(())
}
