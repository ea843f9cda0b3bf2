mod common;

use common::{ctx, task_record, MockGateway};
use estate_workspace::database::local::{documents as local_documents, tasks};
use estate_workspace::models::documents::DocumentInput;
use estate_workspace::services::documents;
use estate_workspace::{connect_in_memory, SyncError, WriteOutcome};

const ESTATE: &str = "estate-1";
const BUCKET: &str = "documents";

fn doc_input(task_id: Option<&str>) -> DocumentInput {
    DocumentInput {
        id: None,
        estate_id: ESTATE.to_string(),
        title: "Deed of Trust".to_string(),
        tags: Vec::new(),
        task_id: task_id.map(str::to_string),
        file_name: Some("deed of trust.pdf".to_string()),
        content_type: "application/pdf".to_string(),
        data: vec![1, 2, 3],
    }
}

#[tokio::test]
async fn upload_stores_blob_and_clears_local_data() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    let outcome = documents::create_document(&db.0, &gateway, Some(&identity), doc_input(None))
        .await
        .unwrap();
    let record = match outcome {
        WriteOutcome::Ok(record) => record,
        WriteOutcome::Fallback { .. } => panic!("expected clean upload"),
    };

    let path = record.storage_path.clone().expect("storage path set");
    assert_eq!(
        path,
        format!("user-1/{}/{}-deed-of-trust.pdf", ESTATE, record.id)
    );
    assert_eq!(gateway.blob(BUCKET, &path), Some(vec![1, 2, 3]));

    let stored = local_documents::get_document(&db.0, &record.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.data.is_none());
    assert_eq!(stored.storage_path.as_deref(), Some(path.as_str()));
    assert_eq!(gateway.rows("documents_meta").len(), 1);
}

#[tokio::test]
async fn upload_with_task_mirrors_doc_ids_to_remote_task() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();

    let outcome = documents::create_document(&db.0, &gateway, Some(&identity), doc_input(Some("t1")))
        .await
        .unwrap();
    let record = match outcome {
        WriteOutcome::Ok(record) => record,
        WriteOutcome::Fallback { .. } => panic!("expected clean upload"),
    };

    let remote_rows = gateway.rows("tasks");
    assert_eq!(remote_rows.len(), 1);
    let doc_ids = remote_rows[0]["doc_ids"].as_array().expect("doc_ids array");
    assert!(doc_ids
        .iter()
        .any(|value| value.as_str() == Some(record.id.as_str())));
}

#[tokio::test]
async fn metadata_failure_rolls_back_the_blob() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    gateway.fail_table("documents_meta");
    let identity = ctx();

    let outcome = documents::create_document(&db.0, &gateway, Some(&identity), doc_input(None))
        .await
        .unwrap();

    let reason = outcome.fallback().expect("expected fallback");
    assert_eq!(reason.estate_id, ESTATE);

    // The just-uploaded blob was compensated away and nothing points at it.
    assert_eq!(gateway.blob_count(), 0);
    assert!(gateway.rows("documents_meta").is_empty());
    let stored = local_documents::get_document(&db.0, &outcome.value().id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_local_only());
    assert_eq!(stored.data, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn failed_blob_cleanup_still_reports_the_metadata_error() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    gateway.fail_table("documents_meta");
    gateway.fail_removals();
    let identity = ctx();

    let outcome = documents::create_document(&db.0, &gateway, Some(&identity), doc_input(None))
        .await
        .unwrap();

    let reason = outcome.fallback().expect("expected fallback");
    match &reason.error {
        SyncError::ApiError { message, .. } => assert!(message.contains("documents_meta")),
        other => panic!("unexpected error: {}", other),
    }

    // The orphaned blob stays behind; the cleanup failure must not mask the
    // metadata error, and the record remains local-only for migration.
    assert_eq!(gateway.blob_count(), 1);
    let stored = local_documents::get_document(&db.0, &outcome.value().id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_local_only());
}

#[tokio::test]
async fn offline_create_retains_blob_and_links_task() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();

    let outcome = documents::create_document(&db.0, &gateway, None, doc_input(Some("t1")))
        .await
        .unwrap();
    assert!(outcome.fallback().is_some());

    let stored = local_documents::get_document(&db.0, &outcome.value().id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_local_only());
    assert_eq!(stored.task_id.as_deref(), Some("t1"));
    let task = tasks::get_task(&db.0, "t1").await.unwrap().unwrap();
    assert!(task.doc_ids.contains(&stored.id));
}

#[tokio::test]
async fn migration_uploads_local_only_documents_and_relinks() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    tasks::put_task(&db.0, &task_record("t1", ESTATE, 0))
        .await
        .unwrap();
    let outcome = documents::create_document(&db.0, &gateway, None, doc_input(Some("t1")))
        .await
        .unwrap();
    let doc_id = outcome.value().id.clone();

    let migrated = documents::migrate_local_documents(&db.0, &gateway, &identity)
        .await
        .unwrap();
    assert_eq!(migrated, 1);

    let stored = local_documents::get_document(&db.0, &doc_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_local_only());
    assert!(stored.data.is_none());
    assert_eq!(stored.task_id.as_deref(), Some("t1"));
    let task = tasks::get_task(&db.0, "t1").await.unwrap().unwrap();
    assert!(task.doc_ids.contains(&doc_id));
    assert_eq!(gateway.blob_count(), 1);

    // The refreshed back-reference reached the remote task row too.
    let remote_rows = gateway.rows("tasks");
    assert_eq!(remote_rows.len(), 1);
    let doc_ids = remote_rows[0]["doc_ids"].as_array().expect("doc_ids array");
    assert!(doc_ids
        .iter()
        .any(|value| value.as_str() == Some(doc_id.as_str())));

    // Nothing left to migrate on a second run.
    let again = documents::migrate_local_documents(&db.0, &gateway, &identity)
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn document_blob_reads_local_then_storage() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    let offline = documents::create_document(&db.0, &gateway, None, doc_input(None))
        .await
        .unwrap();
    let offline_id = offline.value().id.clone();
    let bytes = documents::document_blob(&db.0, &gateway, None, &offline_id)
        .await
        .unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);

    let uploaded = documents::create_document(&db.0, &gateway, Some(&identity), doc_input(None))
        .await
        .unwrap();
    let uploaded_id = uploaded.value().id.clone();
    let bytes = documents::document_blob(&db.0, &gateway, Some(&identity), &uploaded_id)
        .await
        .unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn delete_document_removes_blob_and_metadata() {
    let db = connect_in_memory().await.unwrap();
    let gateway = MockGateway::new();
    let identity = ctx();

    let outcome = documents::create_document(&db.0, &gateway, Some(&identity), doc_input(None))
        .await
        .unwrap();
    let doc_id = outcome.value().id.clone();

    documents::delete_document(&db.0, &gateway, Some(&identity), &doc_id, ESTATE)
        .await
        .unwrap();

    assert!(local_documents::get_document(&db.0, &doc_id)
        .await
        .unwrap()
        .is_none());
    assert!(gateway.rows("documents_meta").is_empty());
    assert_eq!(gateway.blob_count(), 0);
}
