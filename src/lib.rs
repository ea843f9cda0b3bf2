//! Offline-first sync core for an estate administration workspace.
//!
//! The local SQLite store is the single source of truth for reads; an
//! optional remote backend mirrors it for multi-device access. User writes
//! go remote-first and degrade to local-only ([`services::writes`]), a sync
//! pass reconciles the two stores per estate ([`services::cloud_sync`]),
//! and binary attachments move through a two-phase upload with compensating
//! rollback ([`services::documents`]).

pub mod database;
pub mod models;
pub mod services;

pub use database::local::{connect, connect_in_memory, Db};
pub use database::remote::common::{
    CloudContext, RemoteGateway, RowFilter, SupabaseClient, SyncError, UpsertOutcome, UpsertStatus,
};
pub use services::cloud_sync::{clear_sync_state, CloudSync, CloudSyncError, SyncStats};
pub use services::writes::{WriteFallback, WriteOutcome};
