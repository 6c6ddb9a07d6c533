//! Artifact spool: uploaded payloads land under `incoming/`, stage outputs
//! under `results/`.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

#[derive(Clone)]
pub struct ArtifactStore {
    incoming: PathBuf,
    results: PathBuf,
}

impl ArtifactStore {
    /// Creates the spool layout under `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let incoming = root.join("incoming");
        let results = root.join("results");
        ensure_directory(&incoming)?;
        ensure_directory(&results)?;
        Ok(Self { incoming, results })
    }

    /// Writes an uploaded payload to the spool and returns its path.
    /// The job id prefix keeps names unique.
    pub fn spool(&self, job_id: &str, filename: &str, payload: &[u8]) -> Result<PathBuf, StorageError> {
        let name = format!("{}_{}", job_id, safe_filename(filename));
        write_exclusive(&self.incoming.join(name), payload)
    }

    /// Writes a stage output under `results/`.
    pub fn write_result(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        write_exclusive(&self.results.join(safe_filename(filename)), content)
    }

    pub fn results_dir(&self) -> &Path {
        &self.results
    }
}

/// Strips any path components from a client-supplied filename.
fn safe_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
        .unwrap_or_else(|| "upload".to_string())
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Creates the file with O_EXCL semantics to avoid clobbering; appends a
/// numeric suffix on collision.
fn write_exclusive(path: &Path, content: &[u8]) -> Result<PathBuf, StorageError> {
    let write_err = |p: &Path, e: std::io::Error| StorageError::WriteFile {
        path: p.to_path_buf(),
        source: e,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let (base, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (filename[..pos].to_string(), filename[pos..].to_string()),
        _ => (filename.clone(), String::new()),
    };

    for counter in 1..=1000u32 {
        let candidate = if counter == 1 {
            filename.clone()
        } else {
            format!("{}_{}{}", base, counter, ext)
        };
        let try_path = dir.join(candidate);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&try_path)
        {
            Ok(mut file) => {
                file.write_all(content).map_err(|e| write_err(&try_path, e))?;
                return Ok(try_path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(write_err(&try_path, e)),
        }
    }

    Err(write_err(
        path,
        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "too many name collisions"),
    ))
}
