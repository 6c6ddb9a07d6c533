use std::path::{Path, PathBuf};

use crate::error::StageError;
use crate::pipeline::{JobMetadata, Stage};
use crate::storage::ArtifactStore;

/// Minimum length of a printable run before it counts as extracted text.
const MIN_RUN_LEN: usize = 4;

/// Second pipeline stage: pulls plain text out of the spooled artifact and
/// writes it as a `.txt` result. Plain-text documents are decoded as UTF-8;
/// binary formats are scanned for printable runs.
pub struct ExtractStage {
    artifacts: ArtifactStore,
}

impl ExtractStage {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self { artifacts }
    }
}

fn is_plain_text(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// Collects printable ASCII runs of at least [`MIN_RUN_LEN`] characters,
/// joined by single spaces. This is how text is salvaged from binary
/// container formats without a format-specific parser.
fn extract_printable_runs(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut run = String::new();

    for &b in bytes {
        if (0x20..0x7f).contains(&b) {
            run.push(b as char);
        } else {
            if run.trim().len() >= MIN_RUN_LEN {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(run.trim());
            }
            run.clear();
        }
    }
    if run.trim().len() >= MIN_RUN_LEN {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(run.trim());
    }
    out
}

impl Stage for ExtractStage {
    fn name(&self) -> &str {
        "extract"
    }

    fn run(&self, artifact: &Path, meta: &JobMetadata) -> Result<PathBuf, StageError> {
        let bytes = std::fs::read(artifact).map_err(|source| StageError::ReadArtifact {
            path: artifact.to_path_buf(),
            source,
        })?;

        let text = if is_plain_text(&meta.filename) {
            match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => return Err(StageError::Rejected("unreadable content".to_string())),
            }
        } else {
            extract_printable_runs(&bytes)
        };

        if text.trim().is_empty() {
            return Err(StageError::Rejected("unreadable content".to_string()));
        }

        let result = self
            .artifacts
            .write_result(&format!("{}.txt", meta.job_id), text.as_bytes())?;

        Ok(result)
    }
}
