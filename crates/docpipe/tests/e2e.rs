//! End-to-end lifecycle tests: upload through the assembled service, poll
//! the status endpoint until the job settles, and check the reported state.

use std::path::Path;
use std::time::{Duration, Instant};

use docpipe::{
    Config, DocumentService, IngestError, JobStatus, StatusPayload, StoreError, UploadMetadata,
};

fn test_config(root: &Path) -> Config {
    Config {
        spool_directory: root.join("spool"),
        database_path: None,
        worker_count: 2,
        broadcast_capacity: 32,
        ..Config::default()
    }
}

fn meta(filename: &str) -> UploadMetadata {
    UploadMetadata {
        filename: filename.to_string(),
        mime_type: None,
    }
}

fn poll_until_settled(service: &DocumentService, id: &str) -> StatusPayload {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let payload = service.get_status(id).expect("job should exist");
        if matches!(payload.status, JobStatus::Completed | JobStatus::Failed) {
            return payload;
        }
        assert!(
            Instant::now() < deadline,
            "job {id} still {:?} after 10s",
            payload.status
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn upload_processes_to_completion() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();

    let id = service
        .ingest(
            b"This Agreement is entered into by both parties. Each clause is binding.",
            &meta("agreement.txt"),
        )
        .unwrap();

    // The record is visible immediately, before any stage has run.
    let initial = service.get_status(&id).unwrap();
    assert!(initial.progress <= 100);

    let done = poll_until_settled(&service, &id);
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.error.is_none());

    // The categorizer wrote a summary for the job.
    let record = service.store().get(&id).unwrap();
    let result_ref = record.result_ref.expect("completed job has a result");
    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(result_ref).unwrap()).unwrap();
    assert_eq!(summary["category"], "contract");

    service.shutdown();
}

#[test]
fn unreadable_document_fails_with_frozen_progress() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();

    // Valid kind and size, but no extractable text: the second of three
    // stages rejects it.
    let id = service
        .ingest(&[0u8, 1, 2, 3, 4, 5, 6, 7], &meta("scan.pdf"))
        .unwrap();

    let done = poll_until_settled(&service, &id);
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.progress, 33);
    assert_eq!(done.stage, "extract");
    assert_eq!(done.error.as_deref(), Some("unreadable content"));

    // Polling again returns the same frozen state.
    let again = service.get_status(&id).unwrap();
    assert_eq!(again.progress, 33);
    assert_eq!(again.status, JobStatus::Failed);

    service.shutdown();
}

#[test]
fn unknown_document_reports_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();

    let err = service.get_status("ffffffff-0000-0000-0000-000000000000").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    service.shutdown();
}

#[test]
fn empty_upload_fails_synchronously_without_a_record() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();

    let err = service.ingest(b"", &meta("empty.pdf")).unwrap_err();
    assert!(matches!(err, IngestError::EmptyPayload));

    // No orphaned record, and nothing ever enters the pipeline.
    assert!(service.store().all().is_empty());

    service.shutdown();
}

#[test]
fn unsupported_kind_rejected_before_any_record() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();

    let err = service.ingest(b"binary", &meta("malware.exe")).unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedKind(_)));
    assert!(service.store().all().is_empty());

    service.shutdown();
}

#[test]
fn status_events_stream_to_subscribers() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();
    let mut events = service.subscribe();

    let id = service
        .ingest(
            b"The invoice total is due. Payment follows in thirty days.",
            &meta("invoice.txt"),
        )
        .unwrap();
    poll_until_settled(&service, &id);

    // At minimum the claim and the completion were broadcast, in order.
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.job_id, id);
        seen.push(event.status);
    }
    assert_eq!(seen.first(), Some(&JobStatus::Processing));
    assert_eq!(seen.last(), Some(&JobStatus::Completed));

    service.shutdown();
}

#[test]
fn jobs_survive_restart_through_the_database() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.database_path = Some(tmp.path().join("jobs.db"));

    let id = {
        let service = DocumentService::new(config.clone()).unwrap();
        let id = service
            .ingest(
                b"The plaintiff filed in court today. The defendant answered.",
                &meta("filing.txt"),
            )
            .unwrap();
        poll_until_settled(&service, &id);
        service.shutdown();
        id
    };

    // A fresh service over the same database still knows the job.
    let service = DocumentService::new(config).unwrap();
    let payload = service.get_status(&id).unwrap();
    assert_eq!(payload.status, JobStatus::Completed);
    assert_eq!(payload.progress, 100);

    service.shutdown();
}

#[test]
fn interrupted_job_is_swept_to_failed_on_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    let db_path = tmp.path().join("jobs.db");
    config.database_path = Some(db_path.clone());

    // A processing row with no live worker, as left behind by a crash
    // mid-pipeline.
    {
        let db = docpipe::db::Database::open(&db_path).unwrap();
        docpipe::db::job_repo::insert(
            &db,
            &docpipe::db::job_repo::JobRow {
                id: "orphan".to_string(),
                filename: "stuck.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                source_ref: tmp.path().join("spool/incoming/orphan_stuck.pdf").display().to_string(),
                status: "processing".to_string(),
                current_stage: "extract".to_string(),
                progress: 33,
                error: None,
                result_ref: None,
                created_at: "2026-08-01T10:00:00+00:00".to_string(),
                updated_at: "2026-08-01T10:00:05+00:00".to_string(),
            },
        )
        .unwrap();
    }

    let service = DocumentService::new(config).unwrap();

    let payload = service.get_status("orphan").unwrap();
    assert_eq!(payload.status, JobStatus::Failed);
    assert_eq!(payload.progress, 33);
    assert_eq!(payload.stage, "extract");
    assert_eq!(
        payload.error.as_deref(),
        Some("processing interrupted by service restart")
    );

    service.shutdown();
}

#[test]
fn concurrent_uploads_all_settle() {
    let tmp = tempfile::tempdir().unwrap();
    let service = DocumentService::new(test_config(tmp.path())).unwrap();

    let ids: Vec<String> = (0..6)
        .map(|i| {
            service
                .ingest(
                    format!("Document number {i} body. It has two sentences.").as_bytes(),
                    &meta(&format!("doc-{i}.txt")),
                )
                .unwrap()
        })
        .collect();

    for id in &ids {
        let done = poll_until_settled(&service, id);
        assert_eq!(done.status, JobStatus::Completed);
    }

    service.shutdown();
}
