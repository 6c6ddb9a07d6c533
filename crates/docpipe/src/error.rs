use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocpipeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid category rule '{category}': {reason}")]
    InvalidRule { category: String, reason: String },
}

/// Errors reported synchronously to the caller of `ingest`.
/// None of these leave a job record behind.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("empty payload")]
    EmptyPayload,

    #[error("unsupported document kind: {0}")]
    UnsupportedKind(String),

    #[error("payload exceeds maximum size ({size} > {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
}

/// Typed failure returned by a pipeline stage. Stage errors are captured by
/// the executor and recorded on the job record; they never surface as
/// transport-level failures to pollers.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("unsupported document kind: {0}")]
    UnsupportedKind(String),

    /// Business-level rejection with a client-safe message.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to read artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write stage result: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no job found for id '{0}'")]
    NotFound(String),

    #[error("job id '{0}' already exists")]
    DuplicateId(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Cannot submit unknown job '{0}'")]
    UnknownJob(String),
}

pub type Result<T> = std::result::Result<T, DocpipeError>;
