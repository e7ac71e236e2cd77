//! Finalized recordings and their addressable handles.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use super::audio_source::{AudioChunk, AudioEncoding};
use crate::resources::{Releasable, ResourceKind};

/// A finished recording: WAV payload, encoding, measured duration, and a
/// temporary file a player can open while the handle is live.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    bytes: Arc<[u8]>,
    encoding: AudioEncoding,
    duration_seconds: u64,
    pcm_len: usize,
    location: PathBuf,
    revoked: Arc<AtomicBool>,
}

impl AudioArtifact {
    /// Wrap the concatenated chunks in a WAV container and expose it through a
    /// temporary file. The returned handle must be registered for release.
    pub fn assemble(
        chunks: &[AudioChunk],
        encoding: AudioEncoding,
        duration_seconds: u64,
    ) -> Result<(Self, ArtifactHandle)> {
        let pcm: Vec<u8> = chunks
            .iter()
            .flat_map(|chunk| chunk.bytes().iter().copied())
            .collect();
        let bytes = encode_wav(&pcm, encoding)?;

        let mut file = tempfile::Builder::new()
            .prefix("meetcap-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create artifact file")?;
        file.write_all(&bytes)
            .context("Failed to write artifact file")?;
        file.flush()?;
        let path = file.into_temp_path();

        let revoked = Arc::new(AtomicBool::new(false));
        let location = path.to_path_buf();

        info!(
            "Assembled recording: {} chunks, {} bytes, {}s at {:?}",
            chunks.len(),
            bytes.len(),
            duration_seconds,
            location
        );

        Ok((
            Self {
                bytes: Arc::from(bytes),
                encoding,
                duration_seconds,
                pcm_len: pcm.len(),
                location,
                revoked: revoked.clone(),
            },
            ArtifactHandle {
                path: Some(path),
                revoked,
            },
        ))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    pub fn mime_type(&self) -> &'static str {
        self.encoding.mime_type()
    }

    /// Seconds spent recording, paused time excluded.
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// Length of the audio itself, derived from the PCM payload.
    pub fn media_duration_seconds(&self) -> f64 {
        let per_second = self.encoding.bytes_per_second();
        if per_second == 0 {
            return 0.0;
        }
        self.pcm_len as f64 / per_second as f64
    }

    /// Path a player can open, or `None` once the handle has been released.
    pub fn handle(&self) -> Option<&Path> {
        if self.revoked.load(Ordering::SeqCst) {
            None
        } else {
            Some(&self.location)
        }
    }

    pub fn is_released(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Write a copy as `recording_<timestamp>.wav` under `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).context("Failed to create recordings directory")?;
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
        let path = dir.join(format!("recording_{timestamp}.wav"));
        std::fs::write(&path, &self.bytes).context("Failed to save recording")?;
        info!("Recording saved: {:?}", path);
        Ok(path)
    }
}

fn encode_wav(pcm: &[u8], encoding: AudioEncoding) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: encoding.channels,
        sample_rate: encoding.sample_rate,
        bits_per_sample: AudioEncoding::BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        let pairs = pcm.chunks_exact(2);
        let tail = pairs.remainder();
        for pair in pairs {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        // A dangling low byte becomes its own sample
        if let [low] = tail {
            writer.write_sample(i16::from_le_bytes([*low, 0]))?;
        }
        // hound rejects a partial final frame
        let frame = encoding.channels.max(1) as u32;
        let written = pcm.len().div_ceil(2) as u32;
        for _ in 0..(frame - written % frame) % frame {
            writer.write_sample(0i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Ownership of the artifact's temporary file. Releasing deletes the file
/// and revokes `AudioArtifact::handle`.
pub struct ArtifactHandle {
    path: Option<TempPath>,
    revoked: Arc<AtomicBool>,
}

impl Releasable for ArtifactHandle {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ArtifactHandle
    }

    fn release(&mut self) {
        self.revoked.store(true, Ordering::SeqCst);
        if let Some(path) = self.path.take() {
            debug!("Releasing artifact file {:?}", path);
            if let Err(e) = path.close() {
                warn!("Failed to delete artifact file: {}", e);
            }
        }
    }
}
