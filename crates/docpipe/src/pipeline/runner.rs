use std::path::PathBuf;

use tracing::{debug, info_span};

use crate::error::StageError;

use super::progress::{ProgressEvent, ProgressReporter};
use super::stage::{JobMetadata, Stage};

/// A stage failure with the name of the stage that raised it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: String,
    pub error: StageError,
}

/// Ordered list of stages, executed strictly in declared order.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// # Panics
    /// Panics if `stages` is empty.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        assert!(!stages.is_empty(), "pipeline needs at least one stage");
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn first_stage_name(&self) -> &str {
        self.stages[0].name()
    }

    /// Runs all stages against the artifact. Stops at the first failure.
    ///
    /// Reports `StageStarted` before each stage and exactly one terminal
    /// event; the reporter is invoked synchronously, so record updates it
    /// performs are visible before the next stage begins.
    pub fn run(
        &self,
        artifact: PathBuf,
        meta: &JobMetadata,
        progress: &dyn ProgressReporter,
    ) -> Result<PathBuf, StageFailure> {
        let total = self.stages.len();
        let _pipeline_span = info_span!("pipeline",
            job_id = %meta.job_id,
            filename = %meta.filename,
        )
        .entered();

        let mut current = artifact;

        for (completed, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            let _stage_span = info_span!("stage", name = %name).entered();

            progress.report(ProgressEvent::StageStarted {
                stage: name.to_string(),
                completed,
                total,
            });

            match stage.run(&current, meta) {
                Ok(next) => {
                    debug!("Stage {} produced {}", name, next.display());
                    current = next;
                }
                Err(error) => {
                    progress.report(ProgressEvent::Failed {
                        stage: name.to_string(),
                        error: error.to_string(),
                    });
                    return Err(StageFailure {
                        stage: name.to_string(),
                        error,
                    });
                }
            }
        }

        progress.report(ProgressEvent::Completed {
            result_ref: current.clone(),
        });
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    struct PassStage {
        name: String,
    }

    impl Stage for PassStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&self, artifact: &Path, _meta: &JobMetadata) -> Result<PathBuf, StageError> {
            Ok(artifact.with_extension(&self.name))
        }
    }

    struct FailStage;

    impl Stage for FailStage {
        fn name(&self) -> &str {
            "fail"
        }

        fn run(&self, _artifact: &Path, _meta: &JobMetadata) -> Result<PathBuf, StageError> {
            Err(StageError::Rejected("unreadable content".to_string()))
        }
    }

    /// Records every event for assertions.
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        fn take(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            let line = match event {
                ProgressEvent::StageStarted {
                    stage,
                    completed,
                    total,
                } => format!("start {} {}/{}", stage, completed, total),
                ProgressEvent::Completed { result_ref } => {
                    format!("completed {}", result_ref.display())
                }
                ProgressEvent::Failed { stage, error } => format!("failed {} {}", stage, error),
            };
            self.events.lock().unwrap().push(line);
        }
    }

    fn meta() -> JobMetadata {
        JobMetadata {
            job_id: "test-job".to_string(),
            filename: "doc.txt".to_string(),
            mime_type: Some("text/plain".to_string()),
        }
    }

    fn pass(name: &str) -> Box<dyn Stage> {
        Box::new(PassStage {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_all_stages_run_in_order() {
        let pipeline = Pipeline::new(vec![pass("a"), pass("b"), pass("c")]);
        let progress = RecordingProgress::new();

        let result = pipeline.run(PathBuf::from("/tmp/doc.txt"), &meta(), &progress);

        let out = result.unwrap();
        assert_eq!(out, PathBuf::from("/tmp/doc.c"));
        assert_eq!(
            progress.take(),
            vec![
                "start a 0/3",
                "start b 1/3",
                "start c 2/3",
                "completed /tmp/doc.c",
            ]
        );
    }

    #[test]
    fn test_failure_stops_pipeline() {
        let pipeline = Pipeline::new(vec![pass("a"), Box::new(FailStage), pass("c")]);
        let progress = RecordingProgress::new();

        let result = pipeline.run(PathBuf::from("/tmp/doc.txt"), &meta(), &progress);

        let failure = result.unwrap_err();
        assert_eq!(failure.stage, "fail");
        assert_eq!(failure.error.to_string(), "unreadable content");
        // Third stage never started; exactly one terminal event.
        assert_eq!(
            progress.take(),
            vec![
                "start a 0/3",
                "start fail 1/3",
                "failed fail unreadable content",
            ]
        );
    }

    #[test]
    fn test_first_stage_name() {
        let pipeline = Pipeline::new(vec![pass("validate"), pass("extract")]);
        assert_eq!(pipeline.first_stage_name(), "validate");
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    #[should_panic(expected = "at least one stage")]
    fn test_empty_pipeline_panics() {
        Pipeline::new(vec![]);
    }
}
