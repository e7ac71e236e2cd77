pub mod controller;
pub mod rodio_engine;

pub use controller::{PlaybackController, PlaybackCursor, PlaybackEngine};
pub use rodio_engine::RodioEngine;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    #[error("Cannot play: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Engine(String),
}

/// Format seconds as `m:ss` for a scrub bar.
pub fn format_position(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
