pub mod artifact;
pub mod audio_source;
pub mod capture_session;
pub mod elapsed;
pub mod mic_source;

pub use artifact::{ArtifactHandle, AudioArtifact};
pub use audio_source::{AudioChunk, AudioEncoding, AudioInput, ChunkGate, ChunkSink, DeviceLease};
pub use capture_session::{AudioCaptureSession, CaptureEvent, RecordingState};
pub use elapsed::ElapsedCounter;
pub use mic_source::MicInput;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// Permission denied, no device present, or the device is held elsewhere.
    #[error("{0}")]
    DeviceUnavailable(String),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RecordingState,
    },

    /// The recording stopped cleanly but its artifact could not be written.
    #[error("Failed to assemble recording: {0}")]
    Assembly(String),
}
