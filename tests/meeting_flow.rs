//! End-to-end flow with test doubles: record, review, submit, track.
//!
//! The service-backed test is ignored by default.
//! Run with: cargo test --test meeting_flow -- --ignored

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use meetcap::audio::{
    AudioCaptureSession, AudioEncoding, AudioInput, CaptureError, ChunkSink, RecordingState,
};
use meetcap::backend::{JobStatus, ProcessingBackend, SubmissionMetadata};
use meetcap::meeting::{
    render_meeting, MeetingResult, MeetingTranscript, QaRequest, QaResponse, SummaryResponse,
    TranscriptSegment,
};
use meetcap::pipeline::{
    PipelineDriver, ProcessingPipelineTracker, SourceKind, Stage, Submission, TrackerEvent,
};
use meetcap::playback::{PlaybackController, PlaybackEngine, PlaybackError};
use meetcap::resources::{Releasable, ResourceKind};
use std::cell::RefCell;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

struct ScriptedMic {
    sink: RefCell<Option<ChunkSink>>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedMic {
    fn new() -> Self {
        Self {
            sink: RefCell::new(None),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn speak(&self, data: &[u8]) {
        if let Some(sink) = self.sink.borrow().as_ref() {
            sink.push(data.to_vec());
        }
    }
}

struct MicStream {
    releases: Arc<AtomicUsize>,
    open: bool,
}

impl Releasable for MicStream {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DeviceStream
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.open) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait(?Send)]
impl AudioInput for ScriptedMic {
    fn encoding(&self) -> AudioEncoding {
        AudioEncoding::new(8, 1)
    }

    async fn open(&self, sink: ChunkSink) -> Result<Box<dyn Releasable>, CaptureError> {
        *self.sink.borrow_mut() = Some(sink);
        Ok(Box::new(MicStream {
            releases: self.releases.clone(),
            open: true,
        }))
    }
}

/// Engine that moves only when told to.
#[derive(Default)]
struct SilentEngine {
    duration: Option<f64>,
    position: f64,
    playing: bool,
}

impl PlaybackEngine for SilentEngine {
    fn play_from(&mut self, position: f64) -> Result<(), PlaybackError> {
        self.position = position;
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, position: f64) -> Result<(), PlaybackError> {
        self.position = position;
        Ok(())
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn media_duration(&self) -> Option<f64> {
        self.duration
    }
}

struct FakeService {
    statuses: Mutex<Vec<Stage>>,
    submitted_bytes: Mutex<usize>,
}

impl FakeService {
    fn new(stages: &[Stage]) -> Self {
        let mut statuses = stages.to_vec();
        statuses.reverse();
        Self {
            statuses: Mutex::new(statuses),
            submitted_bytes: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ProcessingBackend for FakeService {
    async fn submit_recording(
        &self,
        artifact: &meetcap::audio::AudioArtifact,
        _metadata: &SubmissionMetadata,
    ) -> Result<String> {
        *self.submitted_bytes.lock().unwrap() = artifact.bytes().len();
        Ok("meeting_42".to_string())
    }

    async fn submit_upload(&self, _file: &Path, _metadata: &SubmissionMetadata) -> Result<String> {
        Err(anyhow!("uploads are not scripted"))
    }

    async fn get_job_status(&self, _job_id: &str) -> Result<JobStatus> {
        let mut statuses = self.statuses.lock().unwrap();
        let stage = if statuses.len() > 1 {
            statuses.pop()
        } else {
            statuses.last().copied()
        }
        .ok_or_else(|| anyhow!("no status"))?;
        Ok(JobStatus {
            stage,
            progress_percent: stage.progress_percent().unwrap_or(0),
            error_message: None,
        })
    }

    async fn get_meeting_result(&self, job_id: &str) -> Result<MeetingResult> {
        Ok(MeetingResult {
            meeting_id: job_id.to_string(),
            transcript: MeetingTranscript {
                meeting_id: job_id.to_string(),
                chunks: vec![TranscriptSegment {
                    chunk_id: None,
                    speaker_label: "SPEAKER_00".to_string(),
                    start_time: 1.0,
                    end_time: 3.0,
                    text: "Let's ship it.".to_string(),
                    language: None,
                    confidence: None,
                }],
                speakers: vec!["SPEAKER_00".to_string()],
                duration: 5.0,
                created_at: "2026-10-19T09:00:00".to_string(),
            },
            summary: SummaryResponse {
                summary: "Release approved.".to_string(),
                ..SummaryResponse::default()
            },
            processed_at: "2026-10-19T09:05:00".to_string(),
        })
    }

    async fn ask(&self, _job_id: &str, request: &QaRequest) -> Result<QaResponse> {
        Ok(QaResponse {
            question: request.question.clone(),
            answer: "Ship it".to_string(),
            context_chunks: Vec::new(),
            confidence: None,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_record_review_submit_and_track() {
    let mic = Arc::new(ScriptedMic::new());
    let mut session = AudioCaptureSession::new(mic.clone());

    session.start().await.unwrap();
    mic.speak(&[1, 0, 2, 0]);
    sleep(Duration::from_millis(3500)).await;
    session.pause().unwrap();
    mic.speak(&[9, 9]);
    sleep(Duration::from_secs(2)).await;
    session.resume().unwrap();
    mic.speak(&[3, 0]);
    sleep(Duration::from_millis(2500)).await;

    let artifact = session.stop().unwrap();
    assert_eq!(session.state(), RecordingState::Stopped);
    assert_eq!(artifact.duration_seconds(), 5);
    assert_eq!(mic.releases.load(Ordering::SeqCst), 1);
    assert!(!session.is_device_live());
    let handle = artifact.handle().unwrap().to_path_buf();
    assert!(handle.exists());

    // Review: the player sees the artifact's media length and clamps seeks to it.
    let mut player = PlaybackController::new(SilentEngine {
        duration: Some(artifact.media_duration_seconds()),
        ..SilentEngine::default()
    });
    player.poll_engine();
    assert!(player.toggle_play().unwrap());
    assert_eq!(player.seek(60.0), artifact.media_duration_seconds());
    assert!(!player.toggle_play().unwrap());

    // Submit and track to completion.
    let service = Arc::new(FakeService::new(&[
        Stage::Uploading,
        Stage::Transcribing,
        Stage::Summarizing,
        Stage::Completed,
    ]));
    let mut tracker = ProcessingPipelineTracker::new(service.clone(), Duration::from_secs(2));
    let mut events = tracker.subscribe();

    let metadata = SubmissionMetadata::new(2).unwrap();
    let job = tracker
        .submit(Submission::Recording(&artifact), &metadata)
        .await
        .unwrap();
    assert_eq!(job.source_kind, SourceKind::Recording);
    assert_eq!(*service.submitted_bytes.lock().unwrap(), artifact.bytes().len());

    let driver = PipelineDriver::new(
        Duration::from_secs(1),
        Duration::from_secs(2),
        Duration::from_secs(600),
    );
    assert_eq!(driver.run(&mut tracker).await.unwrap(), Stage::Completed);

    sleep(Duration::from_secs(3)).await;
    assert!(tracker.is_acknowledged());

    let mut stages = Vec::new();
    let mut navigations = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            TrackerEvent::Progress(job) => stages.push(job.stage),
            TrackerEvent::Navigate { job_id } => {
                assert_eq!(job_id, "meeting_42");
                navigations += 1;
            }
        }
    }
    assert_eq!(stages, meetcap::pipeline::PIPELINE.to_vec());
    assert_eq!(navigations, 1);

    let result = tracker.fetch_result().await.unwrap();
    assert!(render_meeting(&result).contains("[00:01] Speaker 1: Let's ship it."));

    // Leaving the flow releases the artifact handle.
    tracker.teardown();
    session.discard().unwrap();
    assert!(artifact.handle().is_none());
    assert!(!handle.exists());
    assert_eq!(session.held_resources(), 0);
}

#[tokio::test]
async fn test_dropping_session_mid_recording_releases_device() {
    let mic = Arc::new(ScriptedMic::new());
    let mut session = AudioCaptureSession::new(mic.clone());
    session.start().await.unwrap();
    session.pause().unwrap();

    drop(session);
    assert_eq!(mic.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore] // Requires a running processing service at the configured base URL
async fn test_status_against_running_service() {
    use meetcap::backend::HttpBackend;
    use meetcap::config::ApiConfig;

    let backend = HttpBackend::from_config(&ApiConfig::default()).unwrap();
    let err = backend.get_job_status("does-not-exist").await;
    assert!(err.is_err(), "unknown jobs should be rejected");
}
