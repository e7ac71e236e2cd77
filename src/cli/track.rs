//! Following a processing job in the terminal.

use anyhow::{anyhow, bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::HttpBackend;
use crate::cli::args::TrackCliArgs;
use crate::config::Config;
use crate::meeting::render_meeting;
use crate::pipeline::{
    PipelineDriver, PipelineError, ProcessingPipelineTracker, SourceKind, Stage, TrackerEvent,
};

/// Progress bar fed by a tracker's events.
pub struct ProgressView {
    pb: ProgressBar,
    render: JoinHandle<()>,
}

impl ProgressView {
    /// Subscribe before submitting so the first stage is shown too.
    pub fn attach(tracker: &ProcessingPipelineTracker) -> Result<Self> {
        let pb = create_progress_bar()?;
        pb.set_message(describe(Stage::Uploading));
        let render = tokio::spawn(render_progress(tracker.subscribe(), pb.clone()));
        Ok(Self { pb, render })
    }

    pub fn abandon(self, message: &str) {
        self.render.abort();
        self.pb.abandon_with_message(message.to_string());
    }
}

/// Handle the track CLI command.
pub async fn handle_track_command(args: TrackCliArgs, config: Config) -> Result<()> {
    let backend = Arc::new(HttpBackend::from_config(&config.api)?);
    let mut tracker = ProcessingPipelineTracker::new(backend, config.pipeline.completion_delay());
    let view = ProgressView::attach(&tracker)?;

    let source = if args.recording {
        SourceKind::Recording
    } else {
        SourceKind::Upload
    };
    tracker.attach(args.job_id, source)?;

    follow_job(tracker, view, &config).await
}

/// Drive the tracker to a terminal stage, then print the meeting once
/// completion has been acknowledged.
pub async fn follow_job(
    mut tracker: ProcessingPipelineTracker,
    view: ProgressView,
    config: &Config,
) -> Result<()> {
    let driver = PipelineDriver::from_config(&config.pipeline);

    let outcome = tokio::select! {
        outcome = driver.run(&mut tracker) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(outcome) = outcome else {
        tracker.teardown();
        view.abandon("Cancelled");
        bail!("Tracking cancelled");
    };

    match outcome {
        Ok(Stage::Completed) => {}
        Ok(stage) => {
            view.abandon(stage.description());
            bail!("Processing stopped at {}", stage);
        }
        Err(PipelineError::JobFailed(message)) => {
            view.abandon("Failed");
            bail!("Processing failed: {}", message);
        }
        Err(e) => {
            view.abandon("Failed");
            return Err(e.into());
        }
    }

    // The render task ends on the navigation event.
    if let Err(e) = view.render.await {
        debug!("Progress renderer ended early: {}", e);
    }
    if !tracker.is_acknowledged() {
        return Err(anyhow!("Processing finished without acknowledgement"));
    }

    let job_id = tracker.job().map(|j| j.id.clone()).unwrap_or_default();
    info!("Fetching results for job {}", job_id);
    let result = tracker.fetch_result().await?;
    tracker.teardown();

    println!("{}", render_meeting(&result));
    eprintln!("\nJob ID: {job_id} (use `meetcap ask {job_id} \"...\"` for questions)");
    Ok(())
}

async fn render_progress(mut events: broadcast::Receiver<TrackerEvent>, pb: ProgressBar) {
    loop {
        match events.recv().await {
            Ok(TrackerEvent::Progress(job)) => {
                pb.set_position(job.progress_percent as u64);
                match job.stage {
                    Stage::Completed => pb.finish_with_message(describe(Stage::Completed)),
                    Stage::Failed => {
                        let message = job.error_message.unwrap_or_default();
                        pb.abandon_with_message(format!("Failed: {message}"));
                        return;
                    }
                    stage => pb.set_message(describe(stage)),
                }
            }
            Ok(TrackerEvent::Navigate { .. }) => return,
            Err(RecvError::Lagged(skipped)) => {
                debug!("Progress renderer skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return,
        }
    }
}

fn describe(stage: Stage) -> String {
    format!("{}: {}", stage.label(), stage.description())
}

/// Create a styled progress bar.
fn create_progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
