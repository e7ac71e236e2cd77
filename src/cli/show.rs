//! Reading results of a processed meeting.

use anyhow::{Context, Result};
use tracing::debug;

use crate::backend::{HttpBackend, ProcessingBackend};
use crate::cli::args::{AskCliArgs, ShowCliArgs};
use crate::config::Config;
use crate::meeting::{render_answer, render_meeting, QaRequest};

pub async fn handle_show_command(args: ShowCliArgs, config: Config) -> Result<()> {
    let backend = HttpBackend::from_config(&config.api)?;
    let result = backend
        .get_meeting_result(&args.job_id)
        .await
        .with_context(|| format!("Failed to load meeting {}", args.job_id))?;

    println!("{}", render_meeting(&result));
    Ok(())
}

pub async fn handle_ask_command(args: AskCliArgs, config: Config) -> Result<()> {
    let request = QaRequest::new(&args.question, args.top_k)?;
    let backend = HttpBackend::from_config(&config.api)?;

    // Speaker numbering in the sources follows the meeting's speaker list
    let speakers = match backend.get_meeting_result(&args.job_id).await {
        Ok(result) => result.transcript.speakers,
        Err(e) => {
            debug!("Speaker list unavailable for {}: {:#}", args.job_id, e);
            Vec::new()
        }
    };

    let response = backend
        .ask(&args.job_id, &request)
        .await
        .context("Failed to get an answer")?;

    println!("Q: {}\n", response.question);
    println!("{}", render_answer(&response, &speakers));
    if let Some(confidence) = &response.confidence {
        println!("\nConfidence: {confidence}");
    }
    Ok(())
}
