use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "not-started" => Ok(TaskStatus::NotStarted),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Med,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Med => "med",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "low" => Ok(TaskPriority::Low),
            "med" => Ok(TaskPriority::Med),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("Unknown task priority: {}", other)),
        }
    }
}

/// A task as stored locally and mirrored remotely. `doc_ids` is the ordered
/// set of linked document ids; a document's `task_id` back-reference must
/// agree with it (maintained by the link/unlink operations).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub estate_id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub doc_ids: Vec<String>,
    pub seed_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a task. Id and timestamps are assigned by
/// the write path.
#[derive(Clone, Debug)]
pub struct TaskInput {
    pub estate_id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub doc_ids: Vec<String>,
}

/// Partial update for a task. `None` leaves the field untouched;
/// `seed_version: Some(None)` clears the provenance marker.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    pub doc_ids: Option<Vec<String>>,
    pub seed_version: Option<Option<String>>,
}

impl TaskRecord {
    /// Apply a patch, bumping `updated_at` to `now`.
    pub fn apply_patch(&self, patch: &TaskPatch, now: DateTime<Utc>) -> TaskRecord {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(description) = &patch.description {
            next.description = description.clone();
        }
        if let Some(due_date) = patch.due_date {
            next.due_date = due_date;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(tags) = &patch.tags {
            next.tags = tags.clone();
        }
        if let Some(doc_ids) = &patch.doc_ids {
            next.doc_ids = doc_ids.clone();
        }
        if let Some(seed_version) = &patch.seed_version {
            next.seed_version = seed_version.clone();
        }
        next.updated_at = now;
        next
    }
}
