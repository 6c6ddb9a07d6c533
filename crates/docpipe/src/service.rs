//! Top-level service wiring: store, database, pipeline, workers, ingestion
//! and status queries assembled from a [`Config`].

use std::sync::Arc;

use log::info;
use tokio::sync::broadcast;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::loader::validate_config;
use crate::config::Config;
use crate::db::Database;
use crate::error::{IngestError, Result, StoreError};
use crate::ingest::{Ingestor, UploadMetadata};
use crate::pipeline::Pipeline;
use crate::scheduler::{recover_jobs, WorkerPool};
use crate::stages;
use crate::status::{StatusPayload, StatusService};
use crate::storage::ArtifactStore;
use crate::store::JobStore;

/// The assembled document processing service.
///
/// Holds the worker pool alive; dropping the service without calling
/// [`shutdown`](Self::shutdown) leaves in-flight jobs to the recovery sweep
/// of the next start.
pub struct DocumentService {
    store: Arc<JobStore>,
    pool: Arc<WorkerPool>,
    ingestor: Ingestor,
    status: StatusService,
    broadcaster: JobProgressBroadcaster,
}

impl DocumentService {
    /// Builds the full service from a validated configuration. Reloads
    /// persisted jobs and recovers any left unfinished by a previous run.
    pub fn new(config: Config) -> Result<Self> {
        validate_config(&config)?;

        let artifacts = ArtifactStore::new(&config.spool_directory)?;

        let store = Arc::new(JobStore::new());
        if let Some(path) = &config.database_path {
            let db = Database::open(path)?;
            store.set_database(db);
            store.load_from_database();
        }

        let broadcaster = JobProgressBroadcaster::new(config.broadcast_capacity);
        let pipeline = Arc::new(Pipeline::new(stages::standard(&config, &artifacts)));
        let pool = Arc::new(WorkerPool::new(
            Arc::clone(&store),
            pipeline,
            broadcaster.clone(),
            config.worker_count,
        ));

        let recovered = recover_jobs(&store, &pool);
        if recovered > 0 {
            info!("Startup recovery touched {} jobs", recovered);
        }

        let ingestor = Ingestor::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            artifacts,
            config.allowed_kinds.clone(),
            config.max_upload_bytes,
        );
        let status = StatusService::new(Arc::clone(&store));

        Ok(Self {
            store,
            pool,
            ingestor,
            status,
            broadcaster,
        })
    }

    /// Accepts a document for processing. See [`Ingestor::ingest`].
    pub fn ingest(&self, payload: &[u8], metadata: &UploadMetadata) -> std::result::Result<String, IngestError> {
        self.ingestor.ingest(payload, metadata)
    }

    /// Returns the current lifecycle state of a document job.
    pub fn get_status(&self, document_id: &str) -> std::result::Result<StatusPayload, StoreError> {
        self.status.get_status(document_id)
    }

    /// Subscribes to live job progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Stops accepting work and joins all workers.
    pub fn shutdown(&self) {
        self.pool.wait();
    }
}
