//! Sync engine: reconciles the local store with the remote backend, one
//! estate at a time.
//!
//! Per (estate, entity) pair a persisted cursor records the start instant of
//! the last pass that completed. No cursor means first contact: pull
//! everything and replace the local collection wholesale. With a cursor the
//! pass is incremental: pull remote rows changed past the cursor, resolve
//! each against the local copy, then push local rows changed past the cursor
//! that the pull did not already handle. Cursors only advance after every
//! entity type for the estate has succeeded, so a failed pass retries the
//! same window.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::SqlitePool;

use crate::database::local::{documents, estates, guidance, journal, sync_state, tasks};
use crate::database::remote::common::{CloudContext, RemoteGateway, SyncError};
use crate::database::remote::{
    documents as remote_documents, estates as remote_estates, guidance as remote_guidance,
    journal as remote_journal, tasks as remote_tasks,
};
use crate::services::resolve;

/// Entity names used for cursor bookkeeping, in sync order. Profiles come
/// first: other entities' rows are resolved against an estate that must
/// already be current.
const SYNC_ENTITIES: [&str; 5] = ["estates", "guidance", "tasks", "documents", "journal"];

#[derive(Debug)]
pub enum CloudSyncError {
    LocalDb(String),
    Remote(SyncError),
}

impl fmt::Display for CloudSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudSyncError::LocalDb(msg) => write!(f, "Local database error: {}", msg),
            CloudSyncError::Remote(err) => write!(f, "Remote sync error: {}", err),
        }
    }
}

impl std::error::Error for CloudSyncError {}

impl From<String> for CloudSyncError {
    fn from(msg: String) -> Self {
        CloudSyncError::LocalDb(msg)
    }
}

impl From<SyncError> for CloudSyncError {
    fn from(err: SyncError) -> Self {
        CloudSyncError::Remote(err)
    }
}

/// Row counts for one completed pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub pulled: usize,
    pub pushed: usize,
    pub skipped: bool,
}

/// One sync pass over one estate. Callers serialize passes per estate;
/// passes for different estates are independent.
pub struct CloudSync<'a> {
    pool: &'a SqlitePool,
    gateway: &'a dyn RemoteGateway,
    ctx: Option<&'a CloudContext>,
}

impl<'a> CloudSync<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        gateway: &'a dyn RemoteGateway,
        ctx: Option<&'a CloudContext>,
    ) -> Self {
        Self { pool, gateway, ctx }
    }

    /// Sync every entity type for one estate. A no-op when not signed in.
    /// Any failure aborts the pass with cursors unmoved.
    pub async fn sync_estate(&self, estate_id: &str) -> Result<SyncStats, CloudSyncError> {
        let Some(ctx) = self.ctx else {
            debug!("sync skipped for {}: not signed in", estate_id);
            return Ok(SyncStats {
                skipped: true,
                ..SyncStats::default()
            });
        };

        let started_at = Utc::now();
        let mut stats = SyncStats::default();

        self.sync_profile(ctx, estate_id, &mut stats).await?;
        self.sync_guidance(ctx, estate_id, &mut stats).await?;
        self.sync_tasks(ctx, estate_id, &mut stats).await?;
        self.sync_documents(ctx, estate_id, &mut stats).await?;
        self.sync_journal(ctx, estate_id, &mut stats).await?;

        for entity in SYNC_ENTITIES {
            sync_state::set_cursor(self.pool, estate_id, entity, &started_at).await?;
        }

        info!(
            "synced estate {}: {} pulled, {} pushed",
            estate_id, stats.pulled, stats.pushed
        );
        Ok(stats)
    }

    async fn sync_profile(
        &self,
        ctx: &CloudContext,
        estate_id: &str,
        stats: &mut SyncStats,
    ) -> Result<(), CloudSyncError> {
        let cursor = sync_state::get_cursor(self.pool, estate_id, "estates").await?;
        let remote =
            remote_estates::select_profile(self.gateway, ctx, estate_id, cursor.as_ref()).await?;

        let mut handled = false;
        if let Some(remote_profile) = remote {
            let local = estates::get_profile(self.pool, estate_id).await?;
            let merged = resolve::merge_profile(local, remote_profile);
            estates::put_profile(self.pool, &merged).await?;
            stats.pulled += 1;
            handled = true;
        }

        let changed = match &cursor {
            Some(cursor) => estates::profile_updated_since(self.pool, estate_id, cursor).await?,
            None => estates::get_profile(self.pool, estate_id).await?,
        };
        if let Some(profile) = changed {
            if !handled {
                let authoritative =
                    remote_estates::upsert_profile(self.gateway, ctx, &profile).await?;
                estates::put_profile(self.pool, &authoritative).await?;
                stats.pushed += 1;
            }
        }
        Ok(())
    }

    async fn sync_guidance(
        &self,
        ctx: &CloudContext,
        estate_id: &str,
        stats: &mut SyncStats,
    ) -> Result<(), CloudSyncError> {
        let cursor = sync_state::get_cursor(self.pool, estate_id, "guidance").await?;
        let remote_pages =
            remote_guidance::select_pages(self.gateway, ctx, estate_id, cursor.as_ref()).await?;

        let handled: HashSet<String> = remote_pages.iter().map(|page| page.id.clone()).collect();
        if !remote_pages.is_empty() {
            let local_pages = guidance::list_pages_for_estate(self.pool, estate_id).await?;
            stats.pulled += remote_pages.len();
            let merged = resolve::merge_guidance(local_pages, remote_pages);
            guidance::replace_estate_pages(self.pool, estate_id, &merged).await?;
        }

        let changed = match &cursor {
            Some(cursor) => guidance::pages_updated_since(self.pool, estate_id, cursor).await?,
            None => guidance::list_pages_for_estate(self.pool, estate_id).await?,
        };
        for page in changed {
            if handled.contains(&page.id) {
                continue;
            }
            let authoritative = remote_guidance::upsert_page(self.gateway, ctx, &page).await?;
            guidance::put_page(self.pool, &authoritative).await?;
            stats.pushed += 1;
        }
        Ok(())
    }

    async fn sync_tasks(
        &self,
        ctx: &CloudContext,
        estate_id: &str,
        stats: &mut SyncStats,
    ) -> Result<(), CloudSyncError> {
        let cursor = sync_state::get_cursor(self.pool, estate_id, "tasks").await?;
        match cursor {
            None => {
                let remote =
                    remote_tasks::select_tasks(self.gateway, ctx, estate_id, None).await?;
                stats.pulled += remote.len();
                tasks::replace_estate_tasks(self.pool, estate_id, &remote).await?;
            }
            Some(cursor) => {
                let pulled =
                    remote_tasks::select_tasks(self.gateway, ctx, estate_id, Some(&cursor))
                        .await?;
                let mut handled = HashSet::new();
                for remote in pulled {
                    handled.insert(remote.id.clone());
                    let local = tasks::get_task(self.pool, &remote.id).await?;
                    let resolved = resolve::resolve_task(local, remote);
                    tasks::put_task(self.pool, &resolved).await?;
                    stats.pulled += 1;
                }

                for task in tasks::tasks_updated_since(self.pool, estate_id, &cursor).await? {
                    if handled.contains(&task.id) {
                        continue;
                    }
                    let authoritative =
                        remote_tasks::upsert_task(self.gateway, ctx, &task).await?;
                    tasks::put_task(self.pool, &authoritative).await?;
                    stats.pushed += 1;
                }
            }
        }
        Ok(())
    }

    async fn sync_documents(
        &self,
        ctx: &CloudContext,
        estate_id: &str,
        stats: &mut SyncStats,
    ) -> Result<(), CloudSyncError> {
        let cursor = sync_state::get_cursor(self.pool, estate_id, "documents").await?;
        match cursor {
            None => {
                // Local-only documents are invisible to the remote and
                // survive the replace; their upload happens through the
                // migration path, not here.
                let remote =
                    remote_documents::select_documents(self.gateway, ctx, estate_id, None)
                        .await?;
                stats.pulled += remote.len();
                documents::replace_estate_documents(self.pool, estate_id, &remote).await?;
            }
            Some(cursor) => {
                let pulled = remote_documents::select_documents(
                    self.gateway,
                    ctx,
                    estate_id,
                    Some(&cursor),
                )
                .await?;
                let mut handled = HashSet::new();
                for remote in pulled {
                    handled.insert(remote.id.clone());
                    let local = documents::get_document(self.pool, &remote.id).await?;
                    let resolved = resolve::resolve_document(local, remote);
                    documents::put_document(self.pool, &resolved).await?;
                    stats.pulled += 1;
                }

                for doc in
                    documents::documents_updated_since(self.pool, estate_id, &cursor).await?
                {
                    if handled.contains(&doc.id) || doc.is_local_only() {
                        continue;
                    }
                    let authoritative =
                        remote_documents::upsert_document(self.gateway, ctx, &doc).await?;
                    documents::put_document(self.pool, &authoritative).await?;
                    stats.pushed += 1;
                }
            }
        }
        Ok(())
    }

    async fn sync_journal(
        &self,
        ctx: &CloudContext,
        estate_id: &str,
        stats: &mut SyncStats,
    ) -> Result<(), CloudSyncError> {
        let cursor = sync_state::get_cursor(self.pool, estate_id, "journal").await?;
        match cursor {
            None => {
                let remote =
                    remote_journal::select_entries(self.gateway, ctx, estate_id, None).await?;
                stats.pulled += remote.len();
                journal::replace_estate_entries(self.pool, estate_id, &remote).await?;
            }
            Some(cursor) => {
                let pulled =
                    remote_journal::select_entries(self.gateway, ctx, estate_id, Some(&cursor))
                        .await?;
                let mut handled = HashSet::new();
                for remote in pulled {
                    handled.insert(remote.id.clone());
                    let local = journal::get_entry(self.pool, &remote.id).await?;
                    let resolved = resolve::resolve_entry(local, remote);
                    journal::put_entry(self.pool, &resolved).await?;
                    stats.pulled += 1;
                }

                for entry in journal::entries_updated_since(self.pool, estate_id, &cursor).await? {
                    if handled.contains(&entry.id) {
                        continue;
                    }
                    let authoritative =
                        remote_journal::upsert_entry(self.gateway, ctx, &entry).await?;
                    journal::put_entry(self.pool, &authoritative).await?;
                    stats.pushed += 1;
                }
            }
        }
        Ok(())
    }
}

/// Forget every cursor so the next pass runs as first contact. Called on
/// sign-out.
pub async fn clear_sync_state(pool: &SqlitePool) -> Result<(), CloudSyncError> {
    sync_state::clear_all_cursors(pool).await?;
    Ok(())
}
