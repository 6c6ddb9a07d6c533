pub mod progress;
pub mod runner;
pub mod stage;

pub use progress::{NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{Pipeline, StageFailure};
pub use stage::{JobMetadata, Stage};

/// Integer rounding of `100 * completed / total`.
pub(crate) fn progress_for(completed: usize, total: usize) -> u8 {
    debug_assert!(total > 0);
    ((200 * completed + total) / (2 * total)).min(100) as u8
}
