//! Job scheduling: the worker pool that drives pipelines and the startup
//! recovery sweep for jobs left behind by an earlier run.

pub mod pool;

pub use pool::WorkerPool;

use log::{info, warn};

use crate::store::{JobStatus, JobStore};

/// Sweeps the store for jobs orphaned by a previous run. Jobs found in
/// `Processing` were interrupted mid-pipeline and are marked failed; jobs
/// still `Pending` are re-queued. Returns the number of records touched.
pub fn recover_jobs(store: &JobStore, pool: &WorkerPool) -> usize {
    let mut recovered = 0;

    for record in store.all() {
        match record.status {
            JobStatus::Processing => {
                match store.update(&record.id, |r| {
                    r.fail("processing interrupted by service restart")
                }) {
                    Ok(_) => {
                        warn!("Marked interrupted job {} as failed", record.id);
                        recovered += 1;
                    }
                    Err(e) => warn!("Failed to recover job {}: {}", record.id, e),
                }
            }
            JobStatus::Pending => match pool.submit(&record.id) {
                Ok(()) => {
                    info!("Re-queued pending job {}", record.id);
                    recovered += 1;
                }
                Err(e) => warn!("Failed to re-queue job {}: {}", record.id, e),
            },
            JobStatus::Completed | JobStatus::Failed => {}
        }
    }

    if recovered > 0 {
        info!("Recovered {} jobs from previous run", recovered);
    }
    recovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::broadcast::JobProgressBroadcaster;
    use crate::error::StageError;
    use crate::pipeline::{JobMetadata, Pipeline, Stage};
    use crate::store::JobRecord;

    struct PassStage;

    impl Stage for PassStage {
        fn name(&self) -> &str {
            "pass"
        }
        fn run(&self, artifact: &Path, _meta: &JobMetadata) -> Result<PathBuf, StageError> {
            Ok(artifact.to_path_buf())
        }
    }

    fn make_pool(store: &Arc<JobStore>) -> WorkerPool {
        WorkerPool::new(
            Arc::clone(store),
            Arc::new(Pipeline::new(vec![Box::new(PassStage)])),
            JobProgressBroadcaster::new(16),
            1,
        )
    }

    #[test]
    fn test_interrupted_job_marked_failed() {
        let store = Arc::new(JobStore::new());
        let mut record = JobRecord::new("stuck", "a.txt", None, "a.txt");
        record.begin_processing("pass");
        store.create(record).unwrap();
        let pool = make_pool(&store);

        let recovered = recover_jobs(&store, &pool);

        assert_eq!(recovered, 1);
        let record = store.get("stuck").unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(
            record.error_detail.as_deref(),
            Some("processing interrupted by service restart")
        );
        pool.wait();
    }

    #[test]
    fn test_pending_job_requeued_and_runs() {
        let store = Arc::new(JobStore::new());
        store
            .create(JobRecord::new("queued", "a.txt", None, "a.txt"))
            .unwrap();
        let pool = make_pool(&store);

        let recovered = recover_jobs(&store, &pool);
        assert_eq!(recovered, 1);

        for _ in 0..200 {
            if store.get("queued").unwrap().is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(store.get("queued").unwrap().status, JobStatus::Completed);
        pool.wait();
    }

    #[test]
    fn test_terminal_jobs_left_alone() {
        let store = Arc::new(JobStore::new());
        let mut record = JobRecord::new("done", "a.txt", None, "a.txt");
        record.begin_processing("pass");
        record.complete("results/done.json");
        store.create(record).unwrap();
        let pool = make_pool(&store);

        assert_eq!(recover_jobs(&store, &pool), 0);
        assert_eq!(store.get("done").unwrap().status, JobStatus::Completed);
        pool.wait();
    }
}
