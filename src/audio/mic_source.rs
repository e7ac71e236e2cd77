//! Microphone audio capture via cpal.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::OnceLock;
use tracing::{debug, error, info};

use super::audio_source::{AudioEncoding, AudioInput, ChunkSink, DeviceLease, LeaseToken};
use super::CaptureError;
use crate::resources::{Releasable, ResourceKind};

const PERMISSION_HINT: &str =
    "Could not access microphone. Please ensure you have granted microphone permissions.";

/// One lease for the default input device, shared by every `MicInput` in
/// the process.
fn default_device_lease() -> &'static DeviceLease {
    static LEASE: OnceLock<DeviceLease> = OnceLock::new();
    LEASE.get_or_init(DeviceLease::new)
}

/// The default input device of the default host.
pub struct MicInput {
    encoding: AudioEncoding,
}

impl MicInput {
    /// # Arguments
    /// * `sample_rate` - Capture rate requested from the device (e.g. 16000)
    /// * `channels` - Channel count requested from the device
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            encoding: AudioEncoding::new(sample_rate, channels),
        }
    }

    pub fn lease(&self) -> &'static DeviceLease {
        default_device_lease()
    }
}

#[async_trait(?Send)]
impl AudioInput for MicInput {
    fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    async fn open(&self, sink: ChunkSink) -> Result<Box<dyn Releasable>, CaptureError> {
        let token = self.lease().claim()?;

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!("{PERMISSION_HINT} (no input device found)"))
        })?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Mic input using device: {}", device_name);

        let config = cpal::StreamConfig {
            channels: self.encoding.channels,
            sample_rate: cpal::SampleRate(self.encoding.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err| error!("Mic stream error: {}", err);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    sink.push_f32(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{PERMISSION_HINT} ({e})")))?;

        stream
            .play()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{PERMISSION_HINT} ({e})")))?;

        info!("Mic recording started");
        Ok(Box::new(MicStream {
            stream: Some(stream),
            device_name,
            token: Some(token),
        }))
    }
}

/// A live cpal input stream. Releasing it stops the device tracks.
struct MicStream {
    stream: Option<cpal::Stream>,
    device_name: String,
    token: Option<LeaseToken>,
}

impl Releasable for MicStream {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DeviceStream
    }

    fn release(&mut self) {
        // Dropping the stream stops the callback
        if let Some(stream) = self.stream.take() {
            debug!("Stopping mic stream on {}", self.device_name);
            drop(stream);
        }
        self.token.take();
    }
}

impl Drop for MicStream {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!("Dropping live MicStream, cleaning up");
            self.release();
        }
    }
}
