use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::error::WorkerError;
use crate::pipeline::{
    progress_for, JobMetadata, Pipeline, ProgressEvent, ProgressReporter,
};
use crate::store::{JobStatus, JobStore};

/// A queued unit of work. The record itself lives in the store; workers only
/// carry the id so a submit never races a concurrent update.
#[derive(Debug, Clone)]
struct WorkItem {
    job_id: String,
}

/// Pool of worker threads draining the job queue. Each worker runs one job's
/// pipeline end to end, so stages within a job are strictly sequential while
/// distinct jobs proceed concurrently.
pub struct WorkerPool {
    job_sender: Sender<WorkItem>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    store: Arc<JobStore>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers draining the queue.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        store: Arc<JobStore>,
        pipeline: Arc<Pipeline>,
        broadcaster: JobProgressBroadcaster,
        worker_count: usize,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        // Unbounded so ingestion never blocks on queue capacity.
        let (job_sender, job_receiver) = unbounded::<WorkItem>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_store = Arc::clone(&store);
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_broadcaster = broadcaster.clone();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    shutdown_flag,
                    worker_store,
                    worker_pipeline,
                    worker_broadcaster,
                );
            });
            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            workers: Mutex::new(workers),
            shutdown,
            store,
        }
    }

    /// Queues a job for processing. Idempotent: a job that is already
    /// processing or finished is left untouched, so a duplicate submit can
    /// never restart a pipeline.
    pub fn submit(&self, job_id: &str) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        let record = self
            .store
            .get(job_id)
            .map_err(|_| WorkerError::UnknownJob(job_id.to_string()))?;
        if record.status != JobStatus::Pending {
            debug!(
                "Ignoring submit for job {} already in state {:?}",
                job_id, record.status
            );
            return Ok(());
        }

        self.job_sender
            .send(WorkItem {
                job_id: job_id.to_string(),
            })
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Signals shutdown and joins all workers.
    pub fn wait(&self) {
        self.shutdown();

        let handles = {
            let mut guard = match self.workers.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };

        for (i, worker) in handles.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Reporter that applies pipeline events to the job record. Updates happen
/// inside `report`, which the runner calls synchronously, so every stage's
/// record change lands before the next stage starts.
struct StoreProgress {
    store: Arc<JobStore>,
    broadcaster: JobProgressBroadcaster,
    job_id: String,
}

impl StoreProgress {
    fn apply<F>(&self, mutator: F)
    where
        F: FnOnce(&mut crate::store::JobRecord),
    {
        match self.store.update(&self.job_id, mutator) {
            Ok(record) => self
                .broadcaster
                .send(JobProgressEvent::from_record(&record)),
            Err(e) => error!("Failed to update job {}: {}", self.job_id, e),
        }
    }
}

impl ProgressReporter for StoreProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::StageStarted {
                stage,
                completed,
                total,
            } => {
                // The claim already recorded the first stage.
                if completed == 0 {
                    return;
                }
                let progress = progress_for(completed, total);
                self.apply(|record| record.advance_stage(&stage, progress));
            }
            ProgressEvent::Completed { result_ref } => {
                self.apply(|record| record.complete(&result_ref.to_string_lossy()));
            }
            ProgressEvent::Failed { stage, error } => {
                warn!("Job {} failed at stage {}: {}", self.job_id, stage, error);
                self.apply(|record| record.fail(&error));
            }
        }
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<WorkItem>,
    shutdown: Arc<AtomicBool>,
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    broadcaster: JobProgressBroadcaster,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(item) => {
                process_item(&item, &store, &pipeline, &broadcaster);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn process_item(
    item: &WorkItem,
    store: &Arc<JobStore>,
    pipeline: &Arc<Pipeline>,
    broadcaster: &JobProgressBroadcaster,
) {
    // Claim the job. Only a pending record transitions to processing, so a
    // duplicate queue entry for the same job becomes a no-op here.
    let mut claimed = false;
    let record = match store.update(&item.job_id, |record| {
        claimed = record.begin_processing(pipeline.first_stage_name());
    }) {
        Ok(record) => record,
        Err(e) => {
            warn!("Dropping queued job {}: {}", item.job_id, e);
            return;
        }
    };
    if !claimed {
        debug!(
            "Job {} already claimed (state {:?}), skipping",
            item.job_id, record.status
        );
        return;
    }
    broadcaster.send(JobProgressEvent::from_record(&record));

    let meta = JobMetadata {
        job_id: record.id.clone(),
        filename: record.filename.clone(),
        mime_type: record.mime_type.clone(),
    };
    let artifact = PathBuf::from(&record.source_ref);

    let reporter = StoreProgress {
        store: Arc::clone(store),
        broadcaster: broadcaster.clone(),
        job_id: record.id.clone(),
    };

    // The reporter has already written the terminal record state by the
    // time run returns, so the result only matters for logging.
    match pipeline.run(artifact, &meta, &reporter) {
        Ok(result) => debug!("Job {} completed, result at {:?}", meta.job_id, result),
        Err(failure) => debug!(
            "Job {} failed at stage {}: {}",
            meta.job_id, failure.stage, failure.error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use crate::error::StageError;
    use crate::pipeline::Stage;
    use crate::store::JobRecord;

    struct PassStage(&'static str);

    impl Stage for PassStage {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self, artifact: &Path, _meta: &JobMetadata) -> Result<PathBuf, StageError> {
            Ok(artifact.to_path_buf())
        }
    }

    struct FailStage(&'static str);

    impl Stage for FailStage {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self, _artifact: &Path, _meta: &JobMetadata) -> Result<PathBuf, StageError> {
            Err(StageError::Rejected("unreadable content".to_string()))
        }
    }

    fn pool_with(stages: Vec<Box<dyn Stage>>) -> (Arc<JobStore>, WorkerPool) {
        let store = Arc::new(JobStore::new());
        let pipeline = Arc::new(Pipeline::new(stages));
        let pool = WorkerPool::new(
            Arc::clone(&store),
            pipeline,
            JobProgressBroadcaster::new(64),
            2,
        );
        (store, pool)
    }

    fn wait_until_finished(store: &JobStore, id: &str) -> JobRecord {
        for _ in 0..200 {
            let record = store.get(id).unwrap();
            if record.is_finished() {
                return record;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("job {id} never reached a terminal state");
    }

    fn seed_job(store: &JobStore, id: &str) {
        store
            .create(JobRecord::new(id, "doc.txt", None, "unused.txt"))
            .unwrap();
    }

    #[test]
    fn test_job_runs_to_completion() {
        let (store, pool) = pool_with(vec![
            Box::new(PassStage("a")),
            Box::new(PassStage("b")),
            Box::new(PassStage("c")),
        ]);
        seed_job(&store, "job-1");

        pool.submit("job-1").unwrap();
        let record = wait_until_finished(&store, "job-1");

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress_percent, 100);
        assert!(record.error_detail.is_none());
        pool.wait();
    }

    #[test]
    fn test_failure_freezes_progress() {
        let (store, pool) = pool_with(vec![
            Box::new(PassStage("a")),
            Box::new(FailStage("b")),
            Box::new(PassStage("c")),
        ]);
        seed_job(&store, "job-1");

        pool.submit("job-1").unwrap();
        let record = wait_until_finished(&store, "job-1");

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.progress_percent, 33);
        assert_eq!(record.current_stage, "b");
        assert_eq!(record.error_detail.as_deref(), Some("unreadable content"));
        pool.wait();
    }

    #[test]
    fn test_submit_unknown_job_is_error() {
        let (_store, pool) = pool_with(vec![Box::new(PassStage("a"))]);

        let err = pool.submit("no-such-job").unwrap_err();
        assert!(matches!(err, WorkerError::UnknownJob(_)));
        pool.wait();
    }

    #[test]
    fn test_duplicate_submit_runs_pipeline_once() {
        let (store, pool) = pool_with(vec![Box::new(PassStage("a"))]);
        seed_job(&store, "job-1");

        pool.submit("job-1").unwrap();
        pool.submit("job-1").unwrap();
        pool.submit("job-1").unwrap();

        let record = wait_until_finished(&store, "job-1");
        assert_eq!(record.status, JobStatus::Completed);
        // A second run would have tried an illegal Completed -> Processing
        // transition and logged; the record stays terminal.
        std::thread::sleep(Duration::from_millis(50));
        let record = store.get("job-1").unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let (store, pool) = pool_with(vec![Box::new(PassStage("a"))]);
        seed_job(&store, "job-1");

        pool.wait();
        let err = pool.submit("job-1").unwrap_err();
        assert!(matches!(err, WorkerError::ChannelClosed));
    }

    #[test]
    fn test_concurrent_jobs_all_finish() {
        let (store, pool) = pool_with(vec![
            Box::new(PassStage("a")),
            Box::new(PassStage("b")),
        ]);
        for i in 0..8 {
            let id = format!("job-{i}");
            seed_job(&store, &id);
            pool.submit(&id).unwrap();
        }

        for i in 0..8 {
            let record = wait_until_finished(&store, &format!("job-{i}"));
            assert_eq!(record.status, JobStatus::Completed);
        }
        pool.wait();
    }
}
