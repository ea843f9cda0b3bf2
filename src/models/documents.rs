use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document's binary payload lives in exactly one place: `data` while the
/// document only exists locally, `storage_path` once the blob has been
/// uploaded. Upload success clears `data`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub estate_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub task_id: Option<String>,
    pub content_type: String,
    pub size: i64,
    pub file_name: Option<String>,
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// True for a document created offline whose blob has not been uploaded.
    pub fn is_local_only(&self) -> bool {
        self.storage_path.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct DocumentInput {
    /// Caller-supplied id, or `None` to generate one.
    pub id: Option<String>,
    pub estate_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub task_id: Option<String>,
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}
