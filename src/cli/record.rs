//! CLI handler for recording a meeting from the microphone.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audio::{AudioArtifact, AudioCaptureSession, MicInput, RecordingState};
use crate::backend::{HttpBackend, SubmissionMetadata};
use crate::cli::args::RecordCliArgs;
use crate::cli::play::{command_lines, preview, CommandLines};
use crate::cli::track::{follow_job, ProgressView};
use crate::config::Config;
use crate::global;
use crate::meeting::display::format_timestamp;
use crate::pipeline::{ProcessingPipelineTracker, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    TogglePause,
    Stop,
    Discard,
}

pub fn parse_recorder_command(line: &str) -> Option<RecorderCommand> {
    match line.trim().to_lowercase().as_str() {
        "p" | "pause" | "resume" => Some(RecorderCommand::TogglePause),
        "s" | "stop" => Some(RecorderCommand::Stop),
        "q" | "discard" => Some(RecorderCommand::Discard),
        _ => None,
    }
}

/// Handle the record CLI command.
pub async fn handle_record_command(args: RecordCliArgs, config: Config) -> Result<()> {
    let speakers = args.speakers.unwrap_or(config.meeting.default_num_speakers);
    let metadata = SubmissionMetadata::new(speakers)?;

    let input = Arc::new(MicInput::new(
        config.capture.sample_rate,
        config.capture.channels,
    ));
    let mut session = AudioCaptureSession::new(input);
    session.start().await?;

    println!("Recording. [p] pause/resume, [s] stop, [q] discard");
    let mut lines = command_lines();

    let Some(artifact) = control_recording(&mut session, &mut lines).await? else {
        println!("Recording discarded.");
        return Ok(());
    };

    println!(
        "Recorded {} ({} bytes)",
        format_timestamp(artifact.duration_seconds() as f64),
        artifact.bytes().len()
    );

    if let Some(dir) = &args.save {
        let dir = match dir {
            Some(dir) => dir.clone(),
            None => global::recordings_dir()?,
        };
        let path = artifact.save_to(&dir)?;
        println!("Saved recording to {}", path.display());
    }

    let theme = ColorfulTheme::default();
    let listen = Confirm::with_theme(&theme)
        .with_prompt("Play back the recording?")
        .default(false)
        .interact()?;
    if listen {
        if let Err(e) = preview(&artifact, &mut lines).await {
            warn!("Playback unavailable: {:#}", e);
        }
    }

    if args.no_submit {
        session.discard()?;
        return Ok(());
    }

    let submit = Confirm::with_theme(&theme)
        .with_prompt(format!("Submit this recording for processing ({speakers} speakers)?"))
        .default(true)
        .interact()?;
    if !submit {
        session.discard()?;
        println!("Recording discarded.");
        return Ok(());
    }

    let result = submit_recording(&artifact, &metadata, &config).await;
    session.discard()?;
    result
}

async fn submit_recording(
    artifact: &AudioArtifact,
    metadata: &SubmissionMetadata,
    config: &Config,
) -> Result<()> {
    let backend = Arc::new(HttpBackend::from_config(&config.api)?);
    let mut tracker = ProcessingPipelineTracker::new(backend, config.pipeline.completion_delay());
    let view = ProgressView::attach(&tracker)?;

    if let Err(e) = tracker
        .submit(Submission::Recording(artifact), metadata)
        .await
    {
        view.abandon("Upload failed");
        return Err(e.into());
    }

    follow_job(tracker, view, config).await
}

/// Apply stdin commands until the recording is stopped or discarded.
/// End of input stops the recording.
async fn control_recording(
    session: &mut AudioCaptureSession,
    lines: &mut CommandLines,
) -> Result<Option<Arc<AudioArtifact>>> {
    let mut elapsed = session.watch_elapsed();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed, stopping recording");
                    println!();
                    return Ok(Some(session.stop()?));
                };

                match parse_recorder_command(&line) {
                    Some(RecorderCommand::TogglePause) => match session.state() {
                        RecordingState::Recording => {
                            session.pause()?;
                            println!("Paused at {}", format_timestamp(session.elapsed_seconds() as f64));
                        }
                        RecordingState::Paused => {
                            session.resume()?;
                            println!("Resumed");
                        }
                        _ => {}
                    },
                    Some(RecorderCommand::Stop) => {
                        return Ok(Some(session.stop()?));
                    }
                    Some(RecorderCommand::Discard) => {
                        session.stop()?;
                        session.discard()?;
                        return Ok(None);
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command '{}'", line.trim()),
                }
            }
            changed = elapsed.changed() => {
                if changed.is_ok() {
                    print!("\r{} ", format_timestamp(session.elapsed_seconds() as f64));
                    let _ = std::io::stdout().flush();
                }
            }
        }
    }
}
