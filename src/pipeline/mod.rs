//! Client-side view of a remote processing job.

pub mod driver;
pub mod stage;
pub mod tracker;

pub use driver::PipelineDriver;
pub use stage::{Stage, PIPELINE};
pub use tracker::{
    ProcessingJob, ProcessingPipelineTracker, SourceKind, Submission, TrackerEvent,
};

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The service rejected the submission; nothing moved past uploading.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The service reported failure; the job is terminal.
    #[error("Processing failed: {0}")]
    JobFailed(String),

    #[error("Job is already {0}")]
    Terminal(Stage),

    #[error("No job has been submitted")]
    NotSubmitted,

    #[error("Already tracking job {0}")]
    AlreadySubmitted(String),

    #[error("Tracker has been torn down")]
    TornDown,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("{0}")]
    InvalidRequest(String),
}
