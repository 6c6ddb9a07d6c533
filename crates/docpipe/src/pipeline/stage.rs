use std::path::{Path, PathBuf};

use crate::error::StageError;

/// Job facts a stage may consult. Stages have no access to the job store.
#[derive(Debug, Clone)]
pub struct JobMetadata {
    pub job_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
}

/// One ordered unit of work in the pipeline.
///
/// A stage receives the prior artifact reference and returns either a
/// successor artifact reference or a typed failure. Stages never mutate
/// the job record directly; only the executor does, after observing a
/// stage's outcome.
pub trait Stage: Send + Sync {
    /// Human-readable stage label, surfaced in status payloads.
    fn name(&self) -> &str;

    fn run(&self, artifact: &Path, meta: &JobMetadata) -> Result<PathBuf, StageError>;
}
