pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod service;
pub mod stages;
pub mod status;
pub mod storage;
pub mod store;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, CategoryRule, Config};
pub use error::{
    ConfigError, DocpipeError, IngestError, Result, StageError, StorageError, StoreError,
    WorkerError,
};
pub use ingest::{Ingestor, UploadMetadata};
pub use pipeline::{JobMetadata, Pipeline, ProgressEvent, ProgressReporter, Stage};
pub use scheduler::{recover_jobs, WorkerPool};
pub use service::DocumentService;
pub use status::{StatusPayload, StatusService};
pub use store::{JobRecord, JobStatus, JobStore};
