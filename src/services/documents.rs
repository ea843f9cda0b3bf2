//! Document lifecycle: two-phase upload (blob then metadata) with a
//! compensating blob delete, offline creation, and later migration of
//! local-only documents.

use chrono::Utc;
use log::{info, warn};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::local::{documents, tasks};
use crate::database::remote::common::{CloudContext, RemoteGateway, SyncError};
use crate::database::remote::documents::{self as remote_documents, DOCUMENTS_BUCKET};
use crate::database::remote::tasks as remote_tasks;
use crate::models::documents::{DocumentInput, DocumentRecord};
use crate::services::cloud_sync::CloudSyncError;
use crate::services::writes::{WriteFallback, WriteOutcome};

const SIGNED_URL_TTL_SECONDS: u32 = 600;

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "application/json" => "json",
        _ => "bin",
    }
}

/// Make a name safe inside a storage path: keep `[A-Za-z0-9._]`, turn
/// whitespace and dashes into single `-` separators, drop everything else.
pub fn sanitize_file_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            cleaned.push(c);
        } else if (c.is_whitespace() || c == '-') && !cleaned.ends_with('-') {
            cleaned.push('-');
        }
    }
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Append a content-type-derived extension when the name has none.
pub fn ensure_extension(name: &str, content_type: &str) -> String {
    let has_extension = name
        .rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .unwrap_or(false);
    if has_extension {
        name.to_string()
    } else {
        format!("{}.{}", name, extension_for(content_type))
    }
}

fn safe_file_name(record: &DocumentRecord) -> String {
    let raw = record.file_name.as_deref().unwrap_or(&record.title);
    ensure_extension(&sanitize_file_name(raw), &record.content_type)
}

fn storage_path(ctx: &CloudContext, record: &DocumentRecord, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        ctx.user_id, record.estate_id, record.id, file_name
    )
}

fn fallback<T>(value: T, error: SyncError, estate_id: &str, local_id: &str) -> WriteOutcome<T> {
    warn!(
        "document write for {} in estate {} saved locally: {}",
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

/// Upload the blob, then upsert the metadata row. If the metadata write
/// fails after the blob landed, the blob is deleted before the error
/// propagates; when the compensating delete also fails, the metadata error
/// still wins and the orphaned blob is only logged.
async fn upload_and_register(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    record: &DocumentRecord,
) -> Result<DocumentRecord, SyncError> {
    let file_name = safe_file_name(record);
    let path = storage_path(ctx, record, &file_name);
    let data = record
        .data
        .clone()
        .ok_or_else(|| SyncError::MissingField("data".to_string()))?;

    gateway
        .upload_blob(ctx, DOCUMENTS_BUCKET, &path, data, &record.content_type, true)
        .await?;

    let mut uploaded = record.clone();
    uploaded.file_name = Some(file_name);
    uploaded.storage_path = Some(path.clone());
    uploaded.data = None;

    match remote_documents::upsert_document(gateway, ctx, &uploaded).await {
        Ok(authoritative) => Ok(authoritative),
        Err(meta_error) => {
            if let Err(cleanup_error) = gateway
                .remove_blobs(ctx, DOCUMENTS_BUCKET, std::slice::from_ref(&path))
                .await
            {
                warn!(
                    "orphaned blob {} left behind after failed metadata write: {}",
                    path, cleanup_error
                );
            }
            Err(meta_error)
        }
    }
}

async fn store_locally(
    pool: &SqlitePool,
    record: &DocumentRecord,
) -> Result<(), CloudSyncError> {
    documents::put_document(pool, record).await?;
    if let Some(task_id) = &record.task_id {
        documents::link_document(pool, &record.id, task_id, &record.updated_at).await?;
    }
    Ok(())
}

/// Push the owning task's refreshed `doc_ids` so the remote back-reference
/// matches the local link.
async fn mirror_task(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    task_id: &str,
) -> Result<(), CloudSyncError> {
    if let Some(task) = tasks::get_task(pool, task_id).await? {
        remote_tasks::upsert_task(gateway, ctx, &task).await?;
    }
    Ok(())
}

/// Create a document. Signed in, the blob is uploaded and the local record
/// ends with a storage path and no retained blob; offline or on failure the
/// blob stays local until migration.
pub async fn create_document(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    input: DocumentInput,
) -> Result<WriteOutcome<DocumentRecord>, CloudSyncError> {
    let now = Utc::now();
    let record = DocumentRecord {
        id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        estate_id: input.estate_id,
        title: input.title,
        tags: input.tags,
        task_id: input.task_id,
        content_type: input.content_type,
        size: input.data.len() as i64,
        file_name: input.file_name,
        storage_path: None,
        data: Some(input.data),
        created_at: now,
        updated_at: now,
    };

    let Some(ctx) = ctx else {
        store_locally(pool, &record).await?;
        let estate_id = record.estate_id.clone();
        let local_id = record.id.clone();
        return Ok(fallback(record, SyncError::NotSignedIn, &estate_id, &local_id));
    };

    match upload_and_register(gateway, ctx, &record).await {
        Ok(uploaded) => {
            store_locally(pool, &uploaded).await?;
            if let Some(task_id) = uploaded.task_id.clone() {
                match mirror_task(pool, gateway, ctx, &task_id).await {
                    Ok(()) => {}
                    Err(CloudSyncError::Remote(error)) => {
                        let estate_id = uploaded.estate_id.clone();
                        let local_id = uploaded.id.clone();
                        return Ok(fallback(uploaded, error, &estate_id, &local_id));
                    }
                    Err(error) => return Err(error),
                }
            }
            Ok(WriteOutcome::Ok(uploaded))
        }
        Err(error) => {
            store_locally(pool, &record).await?;
            let estate_id = record.estate_id.clone();
            let local_id = record.id.clone();
            Ok(fallback(record, error, &estate_id, &local_id))
        }
    }
}

/// Delete a document locally and remotely, including its stored blob. The
/// local cascade clears the owning task's back-reference.
pub async fn delete_document(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    doc_id: &str,
    estate_id: &str,
) -> Result<WriteOutcome<()>, CloudSyncError> {
    let now = Utc::now();
    let existing = documents::get_document(pool, doc_id).await?;

    let Some(ctx) = ctx else {
        documents::delete_document(pool, doc_id, &now).await?;
        return Ok(fallback((), SyncError::NotSignedIn, estate_id, doc_id));
    };

    let remote_result = remote_delete(gateway, ctx, doc_id, existing.as_ref()).await;
    documents::delete_document(pool, doc_id, &now).await?;
    match remote_result {
        Ok(()) => Ok(WriteOutcome::Ok(())),
        Err(error) => Ok(fallback((), error, estate_id, doc_id)),
    }
}

async fn remote_delete(
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
    doc_id: &str,
    existing: Option<&DocumentRecord>,
) -> Result<(), SyncError> {
    remote_documents::delete_document(gateway, ctx, doc_id).await?;
    if let Some(path) = existing.and_then(|doc| doc.storage_path.clone()) {
        gateway
            .remove_blobs(ctx, DOCUMENTS_BUCKET, &[path])
            .await?;
    }
    Ok(())
}

/// Upload every document created offline, re-linking each to its task so
/// the back-reference invariant survives the metadata round-trip. Returns
/// the number migrated; the first failure aborts the rest.
pub async fn migrate_local_documents(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: &CloudContext,
) -> Result<usize, CloudSyncError> {
    let pending = documents::list_local_only_documents(pool).await?;
    let mut migrated = 0;
    for doc in pending {
        let uploaded = upload_and_register(gateway, ctx, &doc).await?;
        documents::put_document(pool, &uploaded).await?;
        if let Some(task_id) = &uploaded.task_id {
            documents::link_document(pool, &uploaded.id, task_id, &Utc::now()).await?;
            mirror_task(pool, gateway, ctx, task_id).await?;
        }
        migrated += 1;
    }
    if migrated > 0 {
        info!("migrated {} local documents to storage", migrated);
    }
    Ok(migrated)
}

/// The document's bytes: the retained local blob when present, otherwise a
/// signed-URL read from storage.
pub async fn document_blob(
    pool: &SqlitePool,
    gateway: &dyn RemoteGateway,
    ctx: Option<&CloudContext>,
    doc_id: &str,
) -> Result<Vec<u8>, CloudSyncError> {
    let doc = documents::get_document(pool, doc_id)
        .await?
        .ok_or_else(|| CloudSyncError::LocalDb(format!("Document {} not found", doc_id)))?;

    if let Some(data) = doc.data {
        return Ok(data);
    }
    let path = doc
        .storage_path
        .ok_or_else(|| CloudSyncError::LocalDb(format!("Document {} has no content", doc_id)))?;
    let ctx = ctx.ok_or(CloudSyncError::Remote(SyncError::NotSignedIn))?;

    let url = gateway
        .signed_read_url(ctx, DOCUMENTS_BUCKET, &path, SIGNED_URL_TTL_SECONDS)
        .await?;
    Ok(gateway.fetch_url(ctx, &url).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_unsafe_characters_and_collapses_separators() {
        assert_eq!(sanitize_file_name("will & testament.pdf"), "will-testament.pdf");
        assert_eq!(sanitize_file_name("deed(final).PDF"), "deedfinal.PDF");
        assert_eq!(sanitize_file_name("  scan -- copy  .png"), "scan-copy-.png");
        assert_eq!(sanitize_file_name("???"), "document");
    }

    #[test]
    fn extension_appended_when_missing() {
        assert_eq!(ensure_extension("scan", "application/pdf"), "scan.pdf");
        assert_eq!(ensure_extension("scan.pdf", "application/pdf"), "scan.pdf");
        assert_eq!(ensure_extension("notes", "text/plain"), "notes.txt");
        assert_eq!(ensure_extension("blob", "application/unknown"), "blob.bin");
    }

    #[test]
    fn hidden_file_names_get_an_extension() {
        assert_eq!(ensure_extension(".gitignore", "text/plain"), ".gitignore.txt");
    }
}
