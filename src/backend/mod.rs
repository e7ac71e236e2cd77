//! The processing service, seen from the client.
//!
//! Transcription, diarization, summarization, and retrieval all happen
//! remotely; this module only describes the request/response contract.

pub mod client;
pub mod upload;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::AudioArtifact;
use crate::meeting::{MeetingResult, QaRequest, QaResponse};
use crate::pipeline::{PipelineError, Stage};

pub use client::HttpBackend;
pub use upload::{mime_type_for_extension, validate_upload, UploadError, UploadInfo};

pub const MIN_SPEAKERS: u8 = 1;
pub const MAX_SPEAKERS: u8 = 20;

/// Extra information sent with a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmissionMetadata {
    pub num_speakers: u8,
}

impl SubmissionMetadata {
    pub fn new(num_speakers: u8) -> Result<Self, PipelineError> {
        if !(MIN_SPEAKERS..=MAX_SPEAKERS).contains(&num_speakers) {
            return Err(PipelineError::InvalidRequest(format!(
                "Number of speakers must be between {MIN_SPEAKERS} and {MAX_SPEAKERS}, got {num_speakers}"
            )));
        }
        Ok(Self { num_speakers })
    }
}

/// Authoritative job status as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub stage: Stage,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    /// Hand a finished recording to the service; returns the job id.
    async fn submit_recording(
        &self,
        artifact: &AudioArtifact,
        metadata: &SubmissionMetadata,
    ) -> Result<String>;

    /// Hand a file from disk to the service; returns the job id.
    async fn submit_upload(&self, file: &Path, metadata: &SubmissionMetadata) -> Result<String>;

    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus>;

    /// Only meaningful once the job is `completed`.
    async fn get_meeting_result(&self, job_id: &str) -> Result<MeetingResult>;

    async fn ask(&self, job_id: &str, request: &QaRequest) -> Result<QaResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_count_bounds() {
        assert!(matches!(
            SubmissionMetadata::new(0),
            Err(PipelineError::InvalidRequest(_))
        ));
        let err = SubmissionMetadata::new(21).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Number of speakers must be between 1 and 20, got 21"
        );
        assert_eq!(SubmissionMetadata::new(1).unwrap().num_speakers, 1);
        assert_eq!(SubmissionMetadata::new(20).unwrap().num_speakers, 20);
    }

    #[test]
    fn test_job_status_defaults() {
        let status: JobStatus = serde_json::from_str(r#"{"stage": "diarizing"}"#).unwrap();
        assert_eq!(status.stage, Stage::Diarizing);
        assert_eq!(status.progress_percent, 0);
        assert!(status.error_message.is_none());

        let failed: JobStatus = serde_json::from_str(
            r#"{"stage": "failed", "progress_percent": 40, "error_message": "ASR crashed"}"#,
        )
        .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("ASR crashed"));
    }
}
