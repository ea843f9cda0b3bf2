#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use estate_workspace::models::documents::DocumentRecord;
use estate_workspace::models::estates::EstateProfile;
use estate_workspace::models::journal::JournalEntryRecord;
use estate_workspace::models::tasks::{TaskPriority, TaskRecord, TaskStatus};
use estate_workspace::{
    CloudContext, RemoteGateway, RowFilter, SyncError, UpsertOutcome, UpsertStatus,
};

pub fn ctx() -> CloudContext {
    CloudContext {
        user_id: "user-1".to_string(),
        access_token: "token".to_string(),
    }
}

pub fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn task_record(id: &str, estate_id: &str, updated_minutes: i64) -> TaskRecord {
    let base = base_instant();
    TaskRecord {
        id: id.to_string(),
        estate_id: estate_id.to_string(),
        title: format!("Task {}", id),
        description: String::new(),
        due_date: base + Duration::days(7),
        status: TaskStatus::NotStarted,
        priority: TaskPriority::Med,
        tags: Vec::new(),
        doc_ids: Vec::new(),
        seed_version: None,
        created_at: base,
        updated_at: base + Duration::minutes(updated_minutes),
    }
}

pub fn journal_record(id: &str, estate_id: &str, created_minutes: i64) -> JournalEntryRecord {
    let base = base_instant();
    JournalEntryRecord {
        id: id.to_string(),
        estate_id: estate_id.to_string(),
        title: format!("Entry {}", id),
        body: "body".to_string(),
        created_at: base + Duration::minutes(created_minutes),
        updated_at: base + Duration::minutes(created_minutes),
    }
}

pub fn profile_record(estate_id: &str, county: &str, notes: Option<&str>) -> EstateProfile {
    EstateProfile {
        id: estate_id.to_string(),
        label: "Estate".to_string(),
        county: county.to_string(),
        decedent_name: String::new(),
        dod_date: None,
        letters_date: None,
        first_publication_date: None,
        notes: notes.map(str::to_string),
        updated_at: base_instant(),
    }
}

pub fn document_record(id: &str, estate_id: &str, data: Option<Vec<u8>>) -> DocumentRecord {
    let base = base_instant();
    DocumentRecord {
        id: id.to_string(),
        estate_id: estate_id.to_string(),
        title: format!("Document {}", id),
        tags: Vec::new(),
        task_id: None,
        content_type: "application/pdf".to_string(),
        size: data.as_ref().map(|d| d.len() as i64).unwrap_or(0),
        file_name: Some(format!("{}.pdf", id)),
        storage_path: None,
        data,
        created_at: base,
        updated_at: base,
    }
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, Vec<Value>>,
    blobs: HashMap<String, Vec<u8>>,
    failing_tables: HashSet<String>,
    fail_uploads: bool,
    fail_removals: bool,
    echo_upsert_rows: bool,
    upserts: usize,
}

/// In-memory stand-in for the remote backend: JSON rows per table, a blob
/// map keyed by `bucket/path`, and switches to inject failures or suppress
/// the upsert representation (forcing the singly re-fetch path).
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                echo_upsert_rows: true,
                ..MockState::default()
            }),
        }
    }

    pub fn seed_rows(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state.tables.entry(table.to_string()).or_default().extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn blob(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.blobs.get(&format!("{}/{}", bucket, path)).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.state.lock().unwrap().blobs.len()
    }

    pub fn fail_table(&self, table: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_tables
            .insert(table.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_tables.clear();
        state.fail_uploads = false;
        state.fail_removals = false;
    }

    pub fn fail_uploads(&self) {
        self.state.lock().unwrap().fail_uploads = true;
    }

    pub fn fail_removals(&self) {
        self.state.lock().unwrap().fail_removals = true;
    }

    /// Make upserts return no representation, so callers must re-fetch.
    pub fn suppress_upsert_rows(&self) {
        self.state.lock().unwrap().echo_upsert_rows = false;
    }

    pub fn upsert_count(&self) -> usize {
        self.state.lock().unwrap().upserts
    }

    fn check_table(state: &MockState, table: &str) -> Result<(), SyncError> {
        if state.failing_tables.contains(table) {
            return Err(SyncError::ApiError {
                status: 500,
                message: format!("injected failure for {}", table),
            });
        }
        Ok(())
    }

    fn matches(row: &Value, filter: &RowFilter) -> bool {
        for (column, expected) in &filter.eq {
            if row.get(column).and_then(Value::as_str) != Some(expected.as_str()) {
                return false;
            }
        }
        for (column, bound) in &filter.gt {
            match row.get(column).and_then(Value::as_str) {
                Some(value) if value > bound.as_str() => {}
                _ => return false,
            }
        }
        true
    }

    fn apply_order(rows: &mut [Value], filter: &RowFilter) {
        if let Some((column, ascending)) = &filter.order {
            rows.sort_by(|a, b| {
                let left = a.get(column).and_then(Value::as_str).unwrap_or_default();
                let right = b.get(column).and_then(Value::as_str).unwrap_or_default();
                if *ascending {
                    left.cmp(right)
                } else {
                    right.cmp(left)
                }
            });
        }
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn upsert_by_match(
        &self,
        _ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
        row: Value,
    ) -> Result<UpsertOutcome, SyncError> {
        let mut state = self.state.lock().unwrap();
        Self::check_table(&state, table)?;
        state.upserts += 1;
        let echo = state.echo_upsert_rows;

        let rows = state.tables.entry(table.to_string()).or_default();
        let existing = rows.iter_mut().find(|candidate| Self::matches(candidate, filter));
        let status = match existing {
            Some(slot) => {
                *slot = row.clone();
                UpsertStatus::Updated
            }
            None => {
                rows.push(row.clone());
                UpsertStatus::Inserted
            }
        };
        Ok(UpsertOutcome {
            status,
            row: if echo { Some(row) } else { None },
        })
    }

    async fn select_where(
        &self,
        _ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
    ) -> Result<Vec<Value>, SyncError> {
        let state = self.state.lock().unwrap();
        Self::check_table(&state, table)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| Self::matches(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Self::apply_order(&mut rows, filter);
        Ok(rows)
    }

    async fn delete_where(
        &self,
        _ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
    ) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        Self::check_table(&state, table)?;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| !Self::matches(row, filter));
        }
        Ok(())
    }

    async fn upload_blob(
        &self,
        _ctx: &CloudContext,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        _content_type: &str,
        overwrite: bool,
    ) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_uploads {
            return Err(SyncError::ApiError {
                status: 500,
                message: "injected upload failure".to_string(),
            });
        }
        let key = format!("{}/{}", bucket, path);
        if !overwrite && state.blobs.contains_key(&key) {
            return Err(SyncError::ApiError {
                status: 409,
                message: "blob exists".to_string(),
            });
        }
        state.blobs.insert(key, data);
        Ok(())
    }

    async fn remove_blobs(
        &self,
        _ctx: &CloudContext,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_removals {
            return Err(SyncError::ApiError {
                status: 500,
                message: "injected removal failure".to_string(),
            });
        }
        for path in paths {
            state.blobs.remove(&format!("{}/{}", bucket, path));
        }
        Ok(())
    }

    async fn signed_read_url(
        &self,
        _ctx: &CloudContext,
        bucket: &str,
        path: &str,
        _ttl_seconds: u32,
    ) -> Result<String, SyncError> {
        Ok(format!("mock://{}/{}", bucket, path))
    }

    async fn fetch_url(&self, _ctx: &CloudContext, url: &str) -> Result<Vec<u8>, SyncError> {
        let key = url
            .strip_prefix("mock://")
            .ok_or_else(|| SyncError::RequestFailed(format!("unknown url {}", url)))?;
        let state = self.state.lock().unwrap();
        state
            .blobs
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::ApiError {
                status: 404,
                message: format!("no blob at {}", key),
            })
    }
}
