//! Read-only status queries against the job store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{JobRecord, JobStatus, JobStore};

/// Snapshot of a job's lifecycle state, shaped for polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub document_id: String,
    pub status: JobStatus,
    /// Percentage of stages completed, 0-100.
    pub progress: u8,
    /// Stage the job is in, or the stage it failed at.
    pub stage: String,
    /// Present only when the job has failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobRecord> for StatusPayload {
    fn from(record: JobRecord) -> Self {
        Self {
            document_id: record.id,
            status: record.status,
            progress: record.progress_percent,
            stage: record.current_stage,
            error: record.error_detail,
        }
    }
}

/// Serves status lookups. Reads are taken from the store's coherent
/// snapshots, so a payload never mixes fields from two different updates.
pub struct StatusService {
    store: Arc<JobStore>,
}

impl StatusService {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Looks up the current state of a document job.
    pub fn get_status(&self, document_id: &str) -> Result<StatusPayload, StoreError> {
        Ok(self.store.snapshot(document_id)?.into())
    }
}
