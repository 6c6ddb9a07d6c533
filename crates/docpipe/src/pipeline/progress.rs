use std::path::PathBuf;

/// Events emitted by the pipeline runner while driving a job.
///
/// The executor's reporter turns these into job record transitions; the
/// record update completes before the runner starts the next stage, so a
/// stage never runs before its predecessor's update is visible.
pub enum ProgressEvent {
    /// Stage `completed + 1` of `total` is about to run.
    StageStarted {
        stage: String,
        completed: usize,
        total: usize,
    },
    /// The final stage succeeded.
    Completed { result_ref: PathBuf },
    /// A stage failed; the job is terminally failed.
    Failed { stage: String, error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}
