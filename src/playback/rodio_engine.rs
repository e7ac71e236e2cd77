//! Speaker output via rodio.

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::controller::PlaybackEngine;
use super::PlaybackError;
use crate::audio::AudioArtifact;

pub struct RodioEngine {
    _stream: OutputStream,
    sink: Sink,
    media: Arc<[u8]>,
    duration: Option<f64>,
}

impl RodioEngine {
    /// Open the artifact through its addressable handle.
    pub fn for_artifact(artifact: &AudioArtifact) -> Result<Self, PlaybackError> {
        let path = artifact.handle().ok_or_else(|| {
            PlaybackError::InvalidState("recording has already been discarded".to_string())
        })?;
        Self::open(path)
    }

    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let bytes = std::fs::read(path)
            .map_err(|e| PlaybackError::Engine(format!("Failed to read {}: {e}", path.display())))?;
        info!("Loaded {} for playback ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(Arc::from(bytes))
    }

    pub fn from_bytes(media: Arc<[u8]>) -> Result<Self, PlaybackError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Engine(format!("No audio output available: {e}")))?;
        stream.log_on_drop(false);

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();

        let decoder = decode(&media)?;
        let duration = decoder.total_duration().map(|d| d.as_secs_f64());
        sink.append(decoder);

        Ok(Self {
            _stream: stream,
            sink,
            media,
            duration,
        })
    }
}

fn decode(media: &Arc<[u8]>) -> Result<Decoder<Cursor<Arc<[u8]>>>, PlaybackError> {
    Decoder::new(Cursor::new(media.clone()))
        .map_err(|e| PlaybackError::Engine(format!("Unsupported audio: {e}")))
}

impl PlaybackEngine for RodioEngine {
    fn play_from(&mut self, position: f64) -> Result<(), PlaybackError> {
        // A drained sink needs its source back before it can play again
        if self.sink.empty() {
            debug!("Re-queueing media for playback");
            self.sink.append(decode(&self.media)?);
        }
        self.seek(position)?;
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position: f64) -> Result<(), PlaybackError> {
        if self.sink.empty() {
            return Ok(());
        }
        self.sink
            .try_seek(Duration::from_secs_f64(position.max(0.0)))
            .map_err(|e| PlaybackError::Engine(format!("Seek failed: {e}")))
    }

    fn position(&self) -> f64 {
        self.sink.get_pos().as_secs_f64()
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }

    fn media_duration(&self) -> Option<f64> {
        self.duration
    }
}
