//! CLI handler for submitting an existing audio file.

use anyhow::Result;
use std::sync::Arc;

use crate::backend::{validate_upload, HttpBackend, SubmissionMetadata};
use crate::cli::args::UploadCliArgs;
use crate::cli::track::{follow_job, ProgressView};
use crate::config::Config;
use crate::pipeline::{ProcessingPipelineTracker, Submission};

/// Handle the upload CLI command.
pub async fn handle_upload_command(args: UploadCliArgs, config: Config) -> Result<()> {
    let info = validate_upload(&args.file, &config.upload)?;
    let speakers = args.speakers.unwrap_or(config.meeting.default_num_speakers);
    let metadata = SubmissionMetadata::new(speakers)?;

    eprintln!(
        "Uploading {} ({:.1}MB, {} speakers)",
        info.file_name,
        info.size_bytes as f64 / 1_000_000.0,
        metadata.num_speakers
    );

    let backend = Arc::new(HttpBackend::from_config(&config.api)?);
    let mut tracker = ProcessingPipelineTracker::new(backend, config.pipeline.completion_delay());
    let view = ProgressView::attach(&tracker)?;

    if let Err(e) = tracker
        .submit(Submission::Upload(&info.path), &metadata)
        .await
    {
        view.abandon("Upload failed");
        return Err(e.into());
    }

    follow_job(tracker, view, &config).await
}
