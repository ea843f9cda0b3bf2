// Shared types and transport for remote Supabase operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::fmt;

/// Error type for remote sync operations
#[derive(Debug, Clone)]
pub enum SyncError {
    /// HTTP request failed (network, timeout)
    RequestFailed(String),
    /// Backend returned an error status
    ApiError { status: u16, message: String },
    /// Failed to parse a response or row
    ParseError(String),
    /// Missing required field in a row
    MissingField(String),
    /// A row that must exist remotely could not be resolved
    RowNotFound { table: String, id: String },
    /// No signed-in identity; remote operations cannot be attempted
    NotSignedIn,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            SyncError::ApiError { status, message } => {
                write!(f, "Backend error {}: {}", status, message)
            }
            SyncError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            SyncError::MissingField(field) => write!(f, "Missing required field: {}", field),
            SyncError::RowNotFound { table, id } => {
                write!(f, "{} row {} not found remotely", table, id)
            }
            SyncError::NotSignedIn => write!(f, "Not signed in"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Explicit signed-in identity. The UI resolves this from its auth session
/// and passes it down; `None` at the call sites means "operate local-only".
#[derive(Clone, Debug)]
pub struct CloudContext {
    pub user_id: String,
    pub access_token: String,
}

/// Row filter for select/update/delete, rendered as a PostgREST query
/// string by the Supabase implementation and interpreted structurally by
/// the test gateway.
#[derive(Clone, Debug, Default)]
pub struct RowFilter {
    pub eq: Vec<(String, String)>,
    pub gt: Vec<(String, String)>,
    pub order: Option<(String, bool)>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.eq.push((column.to_string(), value.to_string()));
        self
    }

    pub fn gt(mut self, column: &str, value: &str) -> Self {
        self.gt.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some((column.to_string(), true));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some((column.to_string(), false));
        self
    }

    fn query_string(&self) -> String {
        let mut parts = Vec::new();
        for (column, value) in &self.eq {
            parts.push(format!("{}=eq.{}", column, value));
        }
        for (column, value) in &self.gt {
            parts.push(format!("{}=gt.{}", column, value));
        }
        if let Some((column, ascending)) = &self.order {
            parts.push(format!(
                "order={}.{}",
                column,
                if *ascending { "asc" } else { "desc" }
            ));
        }
        parts.join("&")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

/// Result of an upsert-by-match: whether the row matched-and-updated or was
/// inserted, and the authoritative row when the backend returned one.
#[derive(Clone, Debug)]
pub struct UpsertOutcome {
    pub status: UpsertStatus,
    pub row: Option<Value>,
}

/// Capability surface of the remote backend. The sync engine, write paths
/// and document lifecycle only ever talk through this trait; tests plug in
/// an in-memory implementation.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Update rows matching `filter`; insert `row` when nothing matched.
    async fn upsert_by_match(
        &self,
        ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
        row: Value,
    ) -> Result<UpsertOutcome, SyncError>;

    async fn select_where(
        &self,
        ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
    ) -> Result<Vec<Value>, SyncError>;

    async fn delete_where(
        &self,
        ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
    ) -> Result<(), SyncError>;

    async fn upload_blob(
        &self,
        ctx: &CloudContext,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), SyncError>;

    async fn remove_blobs(
        &self,
        ctx: &CloudContext,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), SyncError>;

    async fn signed_read_url(
        &self,
        ctx: &CloudContext,
        bucket: &str,
        path: &str,
        ttl_seconds: u32,
    ) -> Result<String, SyncError>;

    /// Fetch the contents behind a (signed) URL.
    async fn fetch_url(&self, ctx: &CloudContext, url: &str) -> Result<Vec<u8>, SyncError>;
}

pub(crate) fn fmt_instant(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_date(value: &str) -> Result<chrono::NaiveDate, SyncError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| SyncError::ParseError(format!("Invalid date {}: {}", value, e)))
}

pub(crate) fn parse_instant(value: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| SyncError::ParseError(format!("Invalid timestamp {}: {}", value, e)))
}

/// Supabase client configuration
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            anon_key,
        }
    }

    fn rest_url(&self, table: &str, filter: &RowFilter) -> String {
        let query = filter.query_string();
        if query.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, query)
        }
    }

    fn authed(&self, request: reqwest::RequestBuilder, ctx: &CloudContext) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", ctx.access_token))
    }

    async fn parse_rows(res: reqwest::Response) -> Result<Vec<Value>, SyncError> {
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(SyncError::ApiError {
                status,
                message: text,
            });
        }

        let body = res
            .text()
            .await
            .map_err(|e| SyncError::ParseError(e.to_string()))?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body)
            .map_err(|e| SyncError::ParseError(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl RemoteGateway for SupabaseClient {
    async fn upsert_by_match(
        &self,
        ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
        row: Value,
    ) -> Result<UpsertOutcome, SyncError> {
        // PATCH the matching rows first; PostgREST returns the updated
        // representation, so an empty array means nothing matched.
        let url = self.rest_url(table, filter);
        let res = self
            .authed(self.client.patch(&url), ctx)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        let updated = Self::parse_rows(res).await?;
        if let Some(existing) = updated.into_iter().next() {
            return Ok(UpsertOutcome {
                status: UpsertStatus::Updated,
                row: Some(existing),
            });
        }

        let insert_url = format!("{}/rest/v1/{}", self.base_url, table);
        let res = self
            .authed(self.client.post(&insert_url), ctx)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(&row)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        let inserted = Self::parse_rows(res).await?;
        Ok(UpsertOutcome {
            status: UpsertStatus::Inserted,
            row: inserted.into_iter().next(),
        })
    }

    async fn select_where(
        &self,
        ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
    ) -> Result<Vec<Value>, SyncError> {
        let url = self.rest_url(table, filter);
        let res = self
            .authed(self.client.get(&url), ctx)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;
        Self::parse_rows(res).await
    }

    async fn delete_where(
        &self,
        ctx: &CloudContext,
        table: &str,
        filter: &RowFilter,
    ) -> Result<(), SyncError> {
        let url = self.rest_url(table, filter);
        let res = self
            .authed(self.client.delete(&url), ctx)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(SyncError::ApiError {
                status,
                message: text,
            });
        }
        Ok(())
    }

    async fn upload_blob(
        &self,
        ctx: &CloudContext,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), SyncError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let res = self
            .authed(self.client.post(&url), ctx)
            .header("Content-Type", content_type.to_string())
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(data)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(SyncError::ApiError {
                status,
                message: text,
            });
        }
        Ok(())
    }

    async fn remove_blobs(
        &self,
        ctx: &CloudContext,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), SyncError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket);
        let res = self
            .authed(self.client.delete(&url), ctx)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(SyncError::ApiError {
                status,
                message: text,
            });
        }
        Ok(())
    }

    async fn signed_read_url(
        &self,
        ctx: &CloudContext,
        bucket: &str,
        path: &str,
        ttl_seconds: u32,
    ) -> Result<String, SyncError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, bucket, path
        );
        let res = self
            .authed(self.client.post(&url), ctx)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "expiresIn": ttl_seconds }))
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(SyncError::ApiError {
                status,
                message: text,
            });
        }

        let body: Value = res
            .json()
            .await
            .map_err(|e| SyncError::ParseError(e.to_string()))?;
        let signed = body
            .get("signedURL")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::ParseError("No signed URL in response".to_string()))?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed))
    }

    async fn fetch_url(&self, ctx: &CloudContext, url: &str) -> Result<Vec<u8>, SyncError> {
        let res = self
            .authed(self.client.get(url), ctx)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(SyncError::ApiError {
                status,
                message: text,
            });
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
