//! End-to-end batch archiving against SQLite and a filesystem object store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use docvault::archive::{ArchiveOptions, ArchiveOrchestrator};
use docvault::dispatch::{BatchDispatcher, BatchError, DispatchPolicy};
use docvault::models::{QueueEntry, QueueStatus, ReplicationOutcome, VersionRecord};
use docvault::object_store::{FilesystemObjectStore, ObjectStore};
use docvault::replication::ReplicationEngine;
use docvault::repository::{DbContext, DieselArchiveRepository, DieselQueueRepository};
use docvault::source::{
    DocumentRef, InMemoryDocumentSource, MetadataRecord, SourceError, VersionDescriptor,
};

const MSA: &str = "https://docs.example.com/acme/contracts_legal/2024/msa.pdf";
const NDA: &str = "https://docs.example.com/acme/contracts_legal/2024/nda.pdf";
const SOW: &str = "https://docs.example.com/acme/contracts_legal/2024/sow.pdf";
const MSA_KEY: &str = "US/acme/legal/2024/msa.pdf";

struct Harness {
    _dir: TempDir,
    dispatcher: BatchDispatcher,
    source: InMemoryDocumentSource,
    objects: FilesystemObjectStore,
    queue: Arc<DieselQueueRepository>,
    archive: DieselArchiveRepository,
}

fn version(id: &str, day: u32) -> (VersionDescriptor, Bytes) {
    (
        VersionDescriptor {
            id: id.to_string(),
            modified_at: Utc.with_ymd_and_hms(2024, 5, day, 9, 30, 0).unwrap(),
            size: None,
        },
        Bytes::from(format!("{} bytes", id)),
    )
}

fn msa() -> DocumentRef {
    DocumentRef::new("acme", "legal", "2024/msa.pdf")
}

fn nda() -> DocumentRef {
    DocumentRef::new("acme", "legal", "2024/nda.pdf")
}

fn sow() -> DocumentRef {
    DocumentRef::new("acme", "legal", "2024/sow.pdf")
}

async fn setup(policy: DispatchPolicy) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("docvault.db"));
    ctx.init_schema().await.unwrap();

    let source = InMemoryDocumentSource::new();
    let objects = FilesystemObjectStore::new(dir.path().join("objects"));
    let queue = Arc::new(ctx.queue());

    let engine = ReplicationEngine::new(
        Arc::new(source.clone()),
        Arc::new(objects.clone()),
        Arc::new(ctx.archive()),
    );
    let orchestrator = Arc::new(ArchiveOrchestrator::new(engine, queue.clone()));
    let dispatcher = BatchDispatcher::new(orchestrator, queue.clone(), policy);

    Harness {
        _dir: dir,
        dispatcher,
        source,
        objects,
        queue,
        archive: ctx.archive(),
    }
}

async fn enqueue(h: &Harness, source_path: &str) -> QueueEntry {
    let entry = QueueEntry::new(source_path, "rule-7");
    h.queue.insert(&entry).await.unwrap();
    entry
}

async fn run(h: &Harness, ids: &[&str], options: ArchiveOptions) -> Vec<ReplicationOutcome> {
    let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    h.dispatcher
        .process_batch(&ids, "us", options, &CancellationToken::new())
        .await
        .unwrap()
}

fn outcome<'a>(outcomes: &'a [ReplicationOutcome], path: &str) -> &'a ReplicationOutcome {
    outcomes
        .iter()
        .find(|o| o.source_path == path)
        .unwrap_or_else(|| panic!("no outcome for {}", path))
}

async fn status_of(h: &Harness, path: &str) -> QueueEntry {
    h.queue.get_by_source_path(path).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_history_is_replicated_oldest_first() {
    let h = setup(DispatchPolicy::default()).await;
    // Source order deliberately differs from modification order.
    h.source
        .add_document(msa(), vec![version("v3", 20), version("v1", 1), version("v2", 10)])
        .await;
    enqueue(&h, MSA).await;

    let outcomes = run(&h, &[MSA], ArchiveOptions::default()).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 200);

    let records = h.archive.list_by_destination(MSA_KEY).await.unwrap();
    let order: Vec<&str> = records.iter().map(|r| r.source_version_id.as_str()).collect();
    assert_eq!(order, vec!["v1", "v2", "v3"]);

    let published: Vec<&VersionRecord> = records.iter().filter(|r| r.is_published).collect();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].source_version_id, "v3");
    assert!(published[0].published_object_id.is_none());
    for record in records.iter().filter(|r| !r.is_published) {
        assert_eq!(
            record.published_object_id.as_deref(),
            Some(published[0].object_id.as_str())
        );
    }

    // Every record points at a distinct stored version holding those bytes.
    let stored = h.objects.list_versions(MSA_KEY).await.unwrap();
    assert_eq!(stored.len(), 3);
    for record in &records {
        let bytes = h
            .objects
            .read_version(MSA_KEY, &record.storage_version_id)
            .await
            .unwrap();
        assert_eq!(record.content_hash, VersionRecord::compute_hash(&bytes));
        assert_eq!(bytes, Bytes::from(format!("{} bytes", record.source_version_id)));
    }

    let entry = status_of(&h, MSA).await;
    assert_eq!(entry.status, QueueStatus::Success);
    assert!(entry.log.is_empty());
}

#[tokio::test]
async fn test_latest_only_writes_one_published_version() {
    let h = setup(DispatchPolicy::default()).await;
    h.source
        .add_document(msa(), vec![version("v1", 1), version("v2", 2)])
        .await;
    enqueue(&h, MSA).await;

    let options = ArchiveOptions {
        replicate_all_versions: false,
        delete_source_after: false,
    };
    let outcomes = run(&h, &[MSA], options).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 200);

    let records = h.archive.list_by_destination(MSA_KEY).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_version_id, "v2");
    assert!(records[0].is_published);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let h = setup(DispatchPolicy::default()).await;
    h.source
        .add_document(msa(), vec![version("v1", 1), version("v2", 2)])
        .await;
    let entry = enqueue(&h, MSA).await;

    run(&h, &[MSA], ArchiveOptions::default()).await;

    // A finished entry short-circuits.
    let outcomes = run(&h, &[MSA], ArchiveOptions::default()).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 201);

    // An explicit reset reaches the engine, which finds the key occupied.
    assert!(h.queue.reset(&entry.id).await.unwrap());
    let outcomes = run(&h, &[MSA], ArchiveOptions::default()).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 201);

    assert_eq!(h.archive.count().await.unwrap(), 2);
    assert_eq!(h.objects.list_versions(MSA_KEY).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_one_failure_does_not_affect_siblings() {
    let h = setup(DispatchPolicy::default()).await;
    h.source.add_document(msa(), vec![version("v1", 1)]).await;
    h.source.add_document(nda(), vec![version("v1", 1)]).await;
    h.source
        .add_document(sow(), vec![version("v1", 1), version("v2", 2)])
        .await;
    h.source
        .fail_downloads(
            &nda(),
            SourceError::UnexpectedStatus {
                status: 500,
                context: "download".to_string(),
            },
        )
        .await;
    enqueue(&h, MSA).await;
    enqueue(&h, NDA).await;
    enqueue(&h, SOW).await;

    let outcomes = run(&h, &[MSA, NDA, SOW], ArchiveOptions::default()).await;
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcome(&outcomes, MSA).return_code, 200);
    assert_eq!(outcome(&outcomes, SOW).return_code, 200);

    let failed = outcome(&outcomes, NDA);
    assert_eq!(failed.return_code, 502);
    assert!(failed.error.is_some());

    assert_eq!(status_of(&h, MSA).await.status, QueueStatus::Success);
    assert_eq!(status_of(&h, SOW).await.status, QueueStatus::Success);
    let nda_entry = status_of(&h, NDA).await;
    assert_eq!(nda_entry.status, QueueStatus::Failed);
    assert_eq!(nda_entry.retry_count, 1);
    assert!(nda_entry.log.contains("500"));

    assert_eq!(
        h.archive
            .list_by_destination("US/acme/legal/2024/sow.pdf")
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(h
        .archive
        .list_by_destination("US/acme/legal/2024/nda.pdf")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_history_points_at_latest_object_id() {
    let h = setup(DispatchPolicy::default()).await;
    h.source
        .add_document(msa(), vec![version("v1", 1), version("v2", 2), version("v3", 3)])
        .await;
    let records = ["v1", "v2", "v3"]
        .iter()
        .map(|id| MetadataRecord {
            object_id: format!("obj-{}", id),
            version_id: Some(id.to_string()),
            ..Default::default()
        })
        .collect();
    h.source.set_metadata(&msa(), records).await;
    enqueue(&h, MSA).await;

    let outcomes = run(&h, &[MSA], ArchiveOptions::default()).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 200);

    let records = h.archive.list_by_destination(MSA_KEY).await.unwrap();
    let lineage: Vec<(&str, bool, Option<&str>)> = records
        .iter()
        .map(|r| {
            (
                r.object_id.as_str(),
                r.is_published,
                r.published_object_id.as_deref(),
            )
        })
        .collect();
    assert_eq!(
        lineage,
        vec![
            ("obj-v1", false, Some("obj-v3")),
            ("obj-v2", false, Some("obj-v3")),
            ("obj-v3", true, None),
        ]
    );
}

#[tokio::test]
async fn test_repeated_identifier_is_archived_once() {
    let h = setup(DispatchPolicy::default()).await;
    h.source
        .add_document(msa(), vec![version("v1", 1), version("v2", 2)])
        .await;
    enqueue(&h, MSA).await;

    let outcomes = run(&h, &[MSA, MSA, MSA], ArchiveOptions::default()).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].return_code, 200);

    assert_eq!(h.archive.count().await.unwrap(), 2);
    assert_eq!(h.objects.list_versions(MSA_KEY).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_restricted_and_unknown_documents() {
    let h = setup(DispatchPolicy::default()).await;
    let exe = "https://docs.example.com/acme/engineering_tools/setup.EXE";
    enqueue(&h, exe).await;

    let missing = "https://docs.example.com/acme/contracts_legal/absent.pdf";
    let outcomes = run(&h, &[exe, missing], ArchiveOptions::default()).await;

    assert_eq!(outcome(&outcomes, exe).return_code, 405);
    assert_eq!(outcome(&outcomes, missing).return_code, 404);
    assert_eq!(status_of(&h, exe).await.status, QueueStatus::Restricted);
    assert!(h.source.calls().await.is_empty());
}

#[tokio::test]
async fn test_missing_source_document_fails_entry() {
    let h = setup(DispatchPolicy::default()).await;
    enqueue(&h, MSA).await;

    let outcomes = run(&h, &[MSA], ArchiveOptions::default()).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 404);
    assert_eq!(status_of(&h, MSA).await.status, QueueStatus::Failed);
}

#[tokio::test]
async fn test_delete_source_after_archiving() {
    let h = setup(DispatchPolicy::default()).await;
    h.source.add_document(msa(), vec![version("v1", 1)]).await;
    enqueue(&h, MSA).await;

    let options = ArchiveOptions {
        replicate_all_versions: true,
        delete_source_after: true,
    };
    let outcomes = run(&h, &[MSA], options).await;
    assert_eq!(outcome(&outcomes, MSA).return_code, 200);
    assert!(!h.source.contains(&msa()).await);
    assert!(h.objects.exists(MSA_KEY).await.unwrap());
}

#[tokio::test]
async fn test_batch_validation() {
    let h = setup(DispatchPolicy {
        max_concurrency: 0,
        ..Default::default()
    })
    .await;
    let cancel = CancellationToken::new();

    let err = h
        .dispatcher
        .process_batch(&[MSA.to_string()], "ZZ", ArchiveOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, BatchError::InvalidCountry("ZZ".to_string()));
    assert_eq!(err.status_code(), 400);

    let err = h
        .dispatcher
        .process_batch(&[], "US", ArchiveOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, BatchError::EmptyBatch);
}

#[tokio::test]
async fn test_cancelled_batch_leaves_entries_new() {
    let h = setup(DispatchPolicy::default()).await;
    h.source.add_document(msa(), vec![version("v1", 1)]).await;
    enqueue(&h, MSA).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcomes = h
        .dispatcher
        .process_batch(&[MSA.to_string()], "US", ArchiveOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome(&outcomes, MSA).return_code, 499);
    let entry = status_of(&h, MSA).await;
    assert_eq!(entry.status, QueueStatus::New);
    assert_eq!(entry.retry_count, 0);
    assert_eq!(h.archive.count().await.unwrap(), 0);
}
