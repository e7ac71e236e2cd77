//! HTTP client for the meeting processing API.
//!
//! Provides methods for submitting recordings and uploads, polling job status,
//! retrieving results, and asking questions about a processed meeting.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use super::{mime_type_for_extension, JobStatus, ProcessingBackend, SubmissionMetadata, SubmitResponse};
use crate::audio::AudioArtifact;
use crate::config::ApiConfig;
use crate::meeting::{MeetingResult, QaRequest, QaResponse};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a new client with the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn submit(
        &self,
        file_name: String,
        mime_type: &str,
        data: Vec<u8>,
        source: &str,
        metadata: &SubmissionMetadata,
    ) -> Result<String> {
        let form = Form::new()
            .part(
                "file",
                Part::bytes(data).file_name(file_name).mime_str(mime_type)?,
            )
            .text("source", source.to_string())
            .text("num_speakers", metadata.num_speakers.to_string());

        let response = self
            .client
            .post(self.url("meetings/process"))
            .multipart(form)
            .send()
            .await
            .context("Failed to connect to the processing service")?;

        let result: SubmitResponse = read_json(response, "Job submission").await?;
        info!("Submitted {} for processing: job {}", source, result.job_id);
        Ok(result.job_id)
    }
}

/// Fail on non-2xx with the body attached, otherwise parse JSON.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(anyhow!("{} failed ({}): {}", what, status, body));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse {what} response"))
}

#[async_trait]
impl ProcessingBackend for HttpBackend {
    async fn submit_recording(
        &self,
        artifact: &AudioArtifact,
        metadata: &SubmissionMetadata,
    ) -> Result<String> {
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
        self.submit(
            format!("recording_{timestamp}.wav"),
            artifact.mime_type(),
            artifact.bytes().to_vec(),
            "recording",
            metadata,
        )
        .await
    }

    async fn submit_upload(&self, file: &Path, metadata: &SubmissionMetadata) -> Result<String> {
        let data = fs::read(file).await.context("Failed to read file")?;

        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        let mime_type = file
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_type_for_extension)
            .unwrap_or("application/octet-stream");

        self.submit(file_name, mime_type, data, "upload", metadata)
            .await
    }

    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(self.url(&format!("meetings/{job_id}/status")))
            .send()
            .await
            .context("Failed to get job status")?;

        let status: JobStatus = read_json(response, "Status request").await?;
        debug!("Job {} reported {} ({}%)", job_id, status.stage, status.progress_percent);
        Ok(status)
    }

    async fn get_meeting_result(&self, job_id: &str) -> Result<MeetingResult> {
        let response = self
            .client
            .get(self.url(&format!("meetings/{job_id}")))
            .send()
            .await
            .context("Failed to get meeting")?;

        read_json(response, "Meeting request").await
    }

    async fn ask(&self, job_id: &str, request: &QaRequest) -> Result<QaResponse> {
        let response = self
            .client
            .post(self.url(&format!("meetings/{job_id}/qa")))
            .json(request)
            .send()
            .await
            .context("Failed to send question")?;

        read_json(response, "Question").await
    }
}
