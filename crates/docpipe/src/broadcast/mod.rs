//! Fan-out of job progress updates to interested subscribers (UIs, log
//! sinks). Built on `tokio::sync::broadcast` so slow consumers never block
//! the workers.

pub mod job_progress;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
