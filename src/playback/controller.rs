//! Scrub-seekable playback over a finished recording.
//!
//! The controller owns the cursor; the engine only makes sound. Engine
//! progress reaches the cursor through `on_time_update`, `on_loaded_metadata`
//! and `on_ended`, either called directly or via `poll_engine`.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackCursor {
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
}

/// Something that can render audio from an arbitrary position.
pub trait PlaybackEngine {
    fn play_from(&mut self, position: f64) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn seek(&mut self, position: f64) -> Result<(), PlaybackError>;

    /// Current engine position in seconds.
    fn position(&self) -> f64;

    /// True once the engine has run out of audio.
    fn is_finished(&self) -> bool;

    /// Total length, once known.
    fn media_duration(&self) -> Option<f64>;
}

pub struct PlaybackController<E: PlaybackEngine> {
    engine: E,
    cursor: PlaybackCursor,
    metadata_loaded: bool,
    updates: watch::Sender<PlaybackCursor>,
}

impl<E: PlaybackEngine> PlaybackController<E> {
    pub fn new(engine: E) -> Self {
        let (updates, _) = watch::channel(PlaybackCursor::default());
        Self {
            engine,
            cursor: PlaybackCursor::default(),
            metadata_loaded: false,
            updates,
        }
    }

    /// Start from `current_time`, or pause if already playing.
    pub fn toggle_play(&mut self) -> Result<bool, PlaybackError> {
        if self.cursor.is_playing {
            self.engine.pause();
            self.cursor.is_playing = false;
            debug!("Playback paused at {:.2}s", self.cursor.current_time);
        } else {
            if !self.metadata_loaded {
                return Err(PlaybackError::InvalidState(
                    "no audio loaded yet".to_string(),
                ));
            }
            self.engine.play_from(self.cursor.current_time)?;
            self.cursor.is_playing = true;
            debug!("Playback started at {:.2}s", self.cursor.current_time);
        }
        self.publish();
        Ok(self.cursor.is_playing)
    }

    /// Move to `time`, clamped into `[0, duration]`. The cursor updates even if
    /// the engine rejects the seek.
    pub fn seek(&mut self, time: f64) -> f64 {
        let target = self.clamp(time);
        self.cursor.current_time = target;
        if let Err(e) = self.engine.seek(target) {
            warn!("Engine failed to seek to {:.2}s: {}", target, e);
        }
        self.publish();
        target
    }

    pub fn on_time_update(&mut self, time: f64) {
        if !self.cursor.is_playing {
            return;
        }
        self.cursor.current_time = self.clamp(time);
        self.publish();
    }

    /// Record the duration the first time it becomes known; later reports are ignored.
    pub fn on_loaded_metadata(&mut self, duration: f64) {
        if self.metadata_loaded || !duration.is_finite() || duration < 0.0 {
            return;
        }
        self.metadata_loaded = true;
        self.cursor.duration = duration;
        self.cursor.current_time = self.clamp(self.cursor.current_time);
        info!("Playback ready: {:.2}s", duration);
        self.publish();
    }

    pub fn on_ended(&mut self) {
        self.cursor.is_playing = false;
        self.cursor.current_time = self.cursor.duration;
        debug!("Playback ended");
        self.publish();
    }

    /// Pull state from the engine and feed it through the callbacks.
    pub fn poll_engine(&mut self) {
        if !self.metadata_loaded {
            if let Some(duration) = self.engine.media_duration() {
                self.on_loaded_metadata(duration);
            }
        }
        if self.cursor.is_playing {
            if self.engine.is_finished() {
                self.on_ended();
            } else {
                let position = self.engine.position();
                self.on_time_update(position);
            }
        }
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackCursor> {
        self.updates.subscribe()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn clamp(&self, time: f64) -> f64 {
        if time.is_nan() {
            return 0.0;
        }
        time.clamp(0.0, self.cursor.duration)
    }

    fn publish(&self) {
        self.updates.send_replace(self.cursor);
    }
}
