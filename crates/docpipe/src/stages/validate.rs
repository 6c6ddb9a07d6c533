use std::path::{Path, PathBuf};

use crate::error::StageError;
use crate::pipeline::{JobMetadata, Stage};

/// First pipeline stage: checks that the spooled artifact exists, is not
/// empty, stays under the size limit and carries an allowed extension.
pub struct ValidateStage {
    max_bytes: u64,
    allowed_kinds: Vec<String>,
}

impl ValidateStage {
    pub fn new(max_bytes: u64, allowed_kinds: Vec<String>) -> Self {
        Self {
            max_bytes,
            allowed_kinds,
        }
    }

    fn extension_allowed(&self, filename: &str) -> bool {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext {
            Some(ext) => self.allowed_kinds.iter().any(|k| k == &ext),
            None => false,
        }
    }
}

impl Stage for ValidateStage {
    fn name(&self) -> &str {
        "validate"
    }

    fn run(&self, artifact: &Path, meta: &JobMetadata) -> Result<PathBuf, StageError> {
        let len = std::fs::metadata(artifact)
            .map_err(|source| StageError::ReadArtifact {
                path: artifact.to_path_buf(),
                source,
            })?
            .len();

        if len == 0 {
            return Err(StageError::Rejected("document is empty".to_string()));
        }
        if len > self.max_bytes {
            return Err(StageError::Rejected(format!(
                "document exceeds size limit of {} bytes",
                self.max_bytes
            )));
        }
        if !self.extension_allowed(&meta.filename) {
            let kind = Path::new(&meta.filename)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string();
            return Err(StageError::UnsupportedKind(kind));
        }

        Ok(artifact.to_path_buf())
    }
}
