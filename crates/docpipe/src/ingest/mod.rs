//! Document intake: synchronous validation, spooling and job registration,
//! then fire-and-forget hand-off to the worker pool.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use crate::error::IngestError;
use crate::scheduler::WorkerPool;
use crate::storage::ArtifactStore;
use crate::store::{JobRecord, JobStore};

/// Client-supplied description of an upload.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub filename: String,
    /// Declared MIME type; guessed from the filename when absent.
    pub mime_type: Option<String>,
}

/// Accepts uploads and turns them into queued jobs.
pub struct Ingestor {
    store: Arc<JobStore>,
    pool: Arc<WorkerPool>,
    artifacts: ArtifactStore,
    allowed_kinds: Vec<String>,
    max_upload_bytes: u64,
}

impl Ingestor {
    pub fn new(
        store: Arc<JobStore>,
        pool: Arc<WorkerPool>,
        artifacts: ArtifactStore,
        allowed_kinds: Vec<String>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            pool,
            artifacts,
            allowed_kinds,
            max_upload_bytes,
        }
    }

    /// Validates and registers an upload, returning the new job id.
    ///
    /// Validation failures are synchronous and leave no job record behind.
    /// Once the record exists the call succeeds even if queueing hits a
    /// shutdown race; the recovery sweep picks such jobs up on restart.
    pub fn ingest(
        &self,
        payload: &[u8],
        metadata: &UploadMetadata,
    ) -> Result<String, IngestError> {
        if payload.is_empty() {
            return Err(IngestError::EmptyPayload);
        }
        let size = payload.len() as u64;
        if size > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        self.check_kind(&metadata.filename)?;

        let job_id = Uuid::new_v4().to_string();
        let mime_type = metadata.mime_type.clone().or_else(|| {
            mime_guess::from_path(&metadata.filename)
                .first()
                .map(|m| m.essence_str().to_string())
        });

        let source = self
            .artifacts
            .spool(&job_id, &metadata.filename, payload)?;

        let record = JobRecord::new(
            &job_id,
            &metadata.filename,
            mime_type,
            &source.to_string_lossy(),
        );
        if let Err(e) = self.store.create(record) {
            // No partial state: a record that never existed must not leave
            // a spooled payload behind either.
            if let Err(rm) = std::fs::remove_file(&source) {
                warn!("Failed to remove spooled payload {:?}: {}", source, rm);
            }
            return Err(e.into());
        }

        if let Err(e) = self.pool.submit(&job_id) {
            // The record is pending; recovery re-queues it next start.
            warn!("Failed to queue job {}: {}", job_id, e);
        } else {
            info!("Accepted document '{}' as job {}", metadata.filename, job_id);
        }

        Ok(job_id)
    }

    fn check_kind(&self, filename: &str) -> Result<(), IngestError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext {
            Some(ext) if self.allowed_kinds.iter().any(|k| k == &ext) => Ok(()),
            Some(ext) => Err(IngestError::UnsupportedKind(ext)),
            None => Err(IngestError::UnsupportedKind("unknown".to_string())),
        }
    }
}
