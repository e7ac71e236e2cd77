//! Recording session: device acquisition, chunk accumulation, elapsed time,
//! and artifact assembly.
//!
//! ```text
//! Idle --start--> Recording --pause--> Paused --resume--> Recording
//! Recording | Paused --stop--> Stopped
//! ```
//!
//! Stopped is terminal; a new session records again.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::artifact::AudioArtifact;
use super::audio_source::{AudioChunk, AudioEncoding, AudioInput, ChunkGate, ChunkSink};
use super::elapsed::ElapsedCounter;
use super::CaptureError;
use crate::resources::{ResourceGuard, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications for whoever renders the session.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Started,
    Paused { elapsed_seconds: u64 },
    Resumed { elapsed_seconds: u64 },
    Stopped {
        artifact: Arc<AudioArtifact>,
        duration_seconds: u64,
    },
    Discarded,
}

pub struct AudioCaptureSession {
    input: Arc<dyn AudioInput>,
    state: RecordingState,
    device: ResourceGuard,
    artifacts: ResourceGuard,
    gate: ChunkGate,
    incoming: Option<mpsc::UnboundedReceiver<AudioChunk>>,
    chunks: Vec<AudioChunk>,
    counter: ElapsedCounter,
    artifact: Option<Arc<AudioArtifact>>,
    events: broadcast::Sender<CaptureEvent>,
}

impl AudioCaptureSession {
    pub fn new(input: Arc<dyn AudioInput>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            input,
            state: RecordingState::Idle,
            device: ResourceGuard::new("capture device"),
            artifacts: ResourceGuard::new("capture artifacts"),
            gate: ChunkGate::new(),
            incoming: None,
            chunks: Vec::new(),
            counter: ElapsedCounter::new(),
            artifact: None,
            events,
        }
    }

    /// Acquire the device and begin recording.
    ///
    /// On `DeviceUnavailable` the session stays `Idle` with nothing registered.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        self.expect_state("start", &[RecordingState::Idle])?;

        let (tx, rx) = mpsc::unbounded_channel();
        let gate = ChunkGate::new();
        let sink = ChunkSink::new(tx, gate.clone());

        let stream = match self.input.open(sink).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to acquire recording device: {}", e);
                return Err(e);
            }
        };

        self.device.acquire(stream);
        self.gate = gate;
        self.incoming = Some(rx);
        self.chunks.clear();
        self.counter.reset();
        self.counter.start();
        self.state = RecordingState::Recording;

        info!("Capture session recording");
        let _ = self.events.send(CaptureEvent::Started);
        Ok(())
    }

    /// Freeze accumulation and the clock; the device stays open.
    pub fn pause(&mut self) -> Result<(), CaptureError> {
        self.expect_state("pause", &[RecordingState::Recording])?;

        self.gate.pause();
        self.counter.freeze();
        self.drain_incoming();
        self.state = RecordingState::Paused;

        let elapsed_seconds = self.counter.seconds();
        info!("Capture session paused at {}s", elapsed_seconds);
        let _ = self.events.send(CaptureEvent::Paused { elapsed_seconds });
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), CaptureError> {
        self.expect_state("resume", &[RecordingState::Paused])?;

        self.gate.open();
        self.counter.start();
        self.state = RecordingState::Recording;

        let elapsed_seconds = self.counter.seconds();
        info!("Capture session resumed at {}s", elapsed_seconds);
        let _ = self.events.send(CaptureEvent::Resumed { elapsed_seconds });
        Ok(())
    }

    /// Finish recording: release the device, assemble the artifact from every
    /// accepted chunk in order, and hand it to subscribers.
    ///
    /// The artifact handle stays registered until `discard` or drop.
    pub fn stop(&mut self) -> Result<Arc<AudioArtifact>, CaptureError> {
        self.expect_state("stop", &[RecordingState::Recording, RecordingState::Paused])?;

        self.counter.freeze();
        // Release first so everything delivered before the device closed is kept
        self.device.release_all();
        self.gate.close();
        self.drain_incoming();
        self.incoming = None;
        self.state = RecordingState::Stopped;

        let duration_seconds = self.counter.seconds();
        let (artifact, handle) =
            AudioArtifact::assemble(&self.chunks, self.input.encoding(), duration_seconds)
                .map_err(|e| CaptureError::Assembly(format!("{e:#}")))?;
        self.artifacts.acquire(Box::new(handle));

        let artifact = Arc::new(artifact);
        self.artifact = Some(artifact.clone());

        info!(
            "Capture session stopped: {} chunks, {}s",
            self.chunks.len(),
            duration_seconds
        );
        let _ = self.events.send(CaptureEvent::Stopped {
            artifact: artifact.clone(),
            duration_seconds,
        });
        Ok(artifact)
    }

    /// Release the artifact handle and clear what consumers can see.
    pub fn discard(&mut self) -> Result<(), CaptureError> {
        self.expect_state("discard", &[RecordingState::Stopped])?;

        self.artifacts.release_all();
        self.artifact = None;
        self.chunks.clear();
        self.counter.reset();

        debug!("Capture session discarded");
        let _ = self.events.send(CaptureEvent::Discarded);
        Ok(())
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn encoding(&self) -> AudioEncoding {
        self.input.encoding()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.counter.seconds()
    }

    /// Live view of the elapsed-seconds counter.
    pub fn watch_elapsed(&self) -> watch::Receiver<u64> {
        self.counter.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Chunks accepted so far, in arrival order.
    pub fn chunks(&mut self) -> &[AudioChunk] {
        self.drain_incoming();
        &self.chunks
    }

    pub fn artifact(&self) -> Option<Arc<AudioArtifact>> {
        self.artifact.clone()
    }

    /// Whether the microphone is currently held.
    pub fn is_device_live(&self) -> bool {
        self.device.holds(ResourceKind::DeviceStream)
    }

    /// Total resources held by this session (device and artifact handles).
    pub fn held_resources(&self) -> usize {
        self.device.len() + self.artifacts.len()
    }

    fn drain_incoming(&mut self) {
        if let Some(rx) = self.incoming.as_mut() {
            while let Ok(chunk) = rx.try_recv() {
                self.chunks.push(chunk);
            }
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[RecordingState],
    ) -> Result<(), CaptureError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            warn!("Rejected {} while {}", operation, self.state);
            Err(CaptureError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl Drop for AudioCaptureSession {
    fn drop(&mut self) {
        self.counter.freeze();
        self.gate.close();
        self.device.release_all();
        self.artifacts.release_all();
    }
}
