mod common;

use chrono::{Duration, Utc};

use common::{ctx, task_record, MockGateway};
use estate_workspace::database::local::{documents, journal, tasks};
use estate_workspace::models::journal::JournalEntryInput;
use estate_workspace::models::tasks::{TaskInput, TaskPatch, TaskPriority, TaskStatus};
use estate_workspace::services::writes;
use estate_workspace::{connect_in_memory, CloudSyncError, SyncError, WriteOutcome};

const ESTATE: &str = "estate-1";

fn task_input() -> TaskInput {
    TaskInput {
        estate_id: ESTATE.to_string(),
        title: "File inventory".to_string(),
        description: String::new(),
        due_date: Utc::now() + Duration::days(30),
        status: TaskStatus::NotStarted,
        priority: TaskPriority::High,
        tags: Vec::new(),
        doc_ids: Vec::new(),
    }
}

#[tokio::test]
async fn create_task_writes_remote_and_local() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    let outcome = writes::create_task(&db.0, &gateway, Some(&identity), task_input())
        .await
        .unwrap();

    let record = match outcome {
        WriteOutcome::Ok(record) => record,
        WriteOutcome::Fallback { .. } => panic!("expected clean remote write"),
    };
    assert!(tasks::get_task(&db.0, &record.id).await.unwrap().is_some());
    assert_eq!(gateway.rows("tasks").len(), 1);
}

#[tokio::test]
async fn remote_failure_tags_fallback_with_estate_and_id() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    gateway.fail_table("tasks");
    let identity = ctx();

    let outcome = writes::create_task(&db.0, &gateway, Some(&identity), task_input())
        .await
        .unwrap();

    let reason = outcome.fallback().expect("expected fallback");
    assert_eq!(reason.estate_id, ESTATE);
    assert_eq!(&reason.local_id, &outcome.value().id);
    assert!(matches!(reason.error, SyncError::ApiError { status: 500, .. }));

    // The user-visible write still succeeded.
    assert!(tasks::get_task(&db.0, &outcome.value().id)
        .await
        .unwrap()
        .is_some());
    assert!(gateway.rows("tasks").is_empty());
}

#[tokio::test]
async fn missing_identity_falls_back_immediately() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();

    let outcome = writes::create_task(&db.0, &gateway, None, task_input())
        .await
        .unwrap();

    let reason = outcome.fallback().expect("expected fallback");
    assert!(matches!(reason.error, SyncError::NotSignedIn));
    assert!(tasks::get_task(&db.0, &outcome.value().id)
        .await
        .unwrap()
        .is_some());
    assert!(gateway.rows("tasks").is_empty());
}

#[tokio::test]
async fn update_task_applies_patch() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::Done),
        ..TaskPatch::default()
    };
    let outcome = writes::update_task(&db.0, &gateway, Some(&identity), "t1", &patch)
        .await
        .unwrap();

    assert_eq!(outcome.value().status, TaskStatus::Done);
    let stored = tasks::get_task(&db.0, "t1").await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Done);
    assert!(stored.updated_at > stored.created_at);
}

#[tokio::test]
async fn update_missing_task_is_a_hard_error() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();

    let result = writes::update_task(&db.0, &gateway, None, "nope", &TaskPatch::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn delete_task_unlinks_documents() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();
    documents::put_document(&db.0, &common::document_record("d1", ESTATE, Some(vec![1])))
        .await
        .unwrap();
    writes::link_document(&db.0, &gateway, None, "d1", "t1", ESTATE)
        .await
        .unwrap();

    writes::delete_task(&db.0, &gateway, Some(&identity), "t1", ESTATE)
        .await
        .unwrap();

    assert!(tasks::get_task(&db.0, "t1").await.unwrap().is_none());
    let doc = documents::get_document(&db.0, "d1").await.unwrap().unwrap();
    assert!(doc.task_id.is_none());
}

#[tokio::test]
async fn relink_moves_document_between_tasks() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();
    tasks::put_task(&db.0, &task_record("t2", ESTATE, 0))
        .await
        .unwrap();
    documents::put_document(&db.0, &common::document_record("d1", ESTATE, Some(vec![1])))
        .await
        .unwrap();

    writes::link_document(&db.0, &gateway, None, "d1", "t1", ESTATE)
        .await
        .unwrap();
    writes::link_document(&db.0, &gateway, None, "d1", "t2", ESTATE)
        .await
        .unwrap();

    let doc = documents::get_document(&db.0, "d1").await.unwrap().unwrap();
    assert_eq!(doc.task_id.as_deref(), Some("t2"));
    let t1 = tasks::get_task(&db.0, "t1").await.unwrap().unwrap();
    let t2 = tasks::get_task(&db.0, "t2").await.unwrap().unwrap();
    assert!(!t1.doc_ids.contains(&"d1".to_string()));
    assert!(t2.doc_ids.contains(&"d1".to_string()));
}

#[tokio::test]
async fn corrupt_task_row_makes_link_a_hard_error() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();
    documents::put_document(&db.0, &common::document_record("d1", ESTATE, Some(vec![1])))
        .await
        .unwrap();
    sqlx::query("UPDATE tasks SET tags = 'not-json' WHERE id = 't1'")
        .execute(&db.0)
        .await
        .unwrap();

    // An unreadable local row is a hard error, not a saved-locally fallback.
    let result = writes::link_document(&db.0, &gateway, Some(&identity), "d1", "t1", ESTATE).await;
    assert!(matches!(result, Err(CloudSyncError::LocalDb(_))));
}

#[tokio::test]
async fn unlink_clears_both_sides() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();
    documents::put_document(&db.0, &common::document_record("d1", ESTATE, Some(vec![1])))
        .await
        .unwrap();
    writes::link_document(&db.0, &gateway, None, "d1", "t1", ESTATE)
        .await
        .unwrap();

    writes::unlink_document(&db.0, &gateway, None, "d1", ESTATE)
        .await
        .unwrap();

    let doc = documents::get_document(&db.0, "d1").await.unwrap().unwrap();
    assert!(doc.task_id.is_none());
    let t1 = tasks::get_task(&db.0, "t1").await.unwrap().unwrap();
    assert!(t1.doc_ids.is_empty());
}

#[tokio::test]
async fn journal_entry_lifecycle() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    let outcome = writes::create_journal_entry(
        &db.0,
        &gateway,
        Some(&identity),
        JournalEntryInput {
            estate_id: ESTATE.to_string(),
            title: "Call with clerk".to_string(),
            body: "notes".to_string(),
        },
    )
    .await
    .unwrap();
    let entry_id = outcome.value().id.clone();
    assert_eq!(gateway.rows("journal").len(), 1);

    writes::delete_journal_entry(&db.0, &gateway, Some(&identity), &entry_id, ESTATE)
        .await
        .unwrap();
    assert!(journal::get_entry(&db.0, &entry_id).await.unwrap().is_none());
    assert!(gateway.rows("journal").is_empty());
}
