//! Capture abstractions shared by real and test inputs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::CaptureError;
use crate::resources::Releasable;

/// Declared encoding of every chunk a session accepts:
/// interleaved little-endian signed 16-bit PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEncoding {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioEncoding {
    pub const BITS_PER_SAMPLE: u16 = 16;

    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// MIME type of the assembled artifact.
    pub fn mime_type(&self) -> &'static str {
        "audio/wav"
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * (Self::BITS_PER_SAMPLE as u64 / 8)
    }
}

/// One immutable fragment of recorded audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    data: Arc<[u8]>,
}

impl AudioChunk {
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

const GATE_OPEN: u8 = 0;
const GATE_PAUSED: u8 = 1;
const GATE_CLOSED: u8 = 2;

/// Decides whether chunks produced by the device are accepted.
///
/// Paused gates drop incoming data while the device stays open.
/// A closed gate never reopens.
#[derive(Debug, Clone)]
pub struct ChunkGate {
    state: Arc<AtomicU8>,
}

impl ChunkGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(GATE_OPEN)),
        }
    }

    pub fn pause(&self) {
        let _ = self.state.compare_exchange(
            GATE_OPEN,
            GATE_PAUSED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn open(&self) {
        let _ = self.state.compare_exchange(
            GATE_PAUSED,
            GATE_OPEN,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn close(&self) {
        self.state.store(GATE_CLOSED, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::SeqCst) == GATE_OPEN
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == GATE_CLOSED
    }
}

impl Default for ChunkGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of a session's chunk buffer, handed to the device callback.
#[derive(Debug, Clone)]
pub struct ChunkSink {
    tx: mpsc::UnboundedSender<AudioChunk>,
    gate: ChunkGate,
}

impl ChunkSink {
    pub fn new(tx: mpsc::UnboundedSender<AudioChunk>, gate: ChunkGate) -> Self {
        Self { tx, gate }
    }

    /// Offer a fragment to the session. Returns whether it was accepted;
    /// empty fragments and anything arriving while paused or closed are dropped.
    pub fn push(&self, data: Vec<u8>) -> bool {
        if data.is_empty() || !self.gate.is_open() {
            return false;
        }
        self.tx
            .send(AudioChunk {
                data: Arc::from(data),
            })
            .is_ok()
    }

    /// Convert f32 samples in [-1.0, 1.0] to the declared PCM layout and push them.
    pub fn push_f32(&self, samples: &[f32]) -> bool {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            data.extend_from_slice(&value.to_le_bytes());
        }
        self.push(data)
    }
}

/// Exclusive claim on a capture device. Only one live stream may hold it.
#[derive(Debug, Clone, Default)]
pub struct DeviceLease {
    in_use: Arc<AtomicBool>,
}

impl DeviceLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the device. Fails if another stream already holds it.
    pub fn claim(&self) -> Result<LeaseToken, CaptureError> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::DeviceUnavailable(
                "The microphone is already in use by another recording.".to_string(),
            ));
        }
        Ok(LeaseToken {
            in_use: self.in_use.clone(),
        })
    }

    pub fn is_claimed(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }
}

/// Held by a live stream; dropping it frees the device for the next session.
#[derive(Debug)]
pub struct LeaseToken {
    in_use: Arc<AtomicBool>,
}

impl Drop for LeaseToken {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

/// A source of recorded audio (microphone, test double).
///
/// `open` is asynchronous because acquiring a device may wait on a permission
/// decision. The returned stream delivers chunks into `sink` until released.
#[async_trait(?Send)]
pub trait AudioInput {
    fn encoding(&self) -> AudioEncoding;

    async fn open(&self, sink: ChunkSink) -> Result<Box<dyn Releasable>, CaptureError>;
}
