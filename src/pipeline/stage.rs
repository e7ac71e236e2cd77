//! Ordered processing stages.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uploading,
    Transcribing,
    Diarizing,
    Analyzing,
    Summarizing,
    Completed,
    Failed,
}

/// The success path, in order. `Failed` sits outside it.
pub const PIPELINE: [Stage; 6] = [
    Stage::Uploading,
    Stage::Transcribing,
    Stage::Diarizing,
    Stage::Analyzing,
    Stage::Summarizing,
    Stage::Completed,
];

/// Stages that do work before completion.
const WORKING_STAGES: usize = PIPELINE.len() - 1;

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Diarizing => "diarizing",
            Self::Analyzing => "analyzing",
            Self::Summarizing => "summarizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploading => "Uploading Audio",
            Self::Transcribing => "Transcribing",
            Self::Diarizing => "Speaker Diarization",
            Self::Analyzing => "RAG Analysis",
            Self::Summarizing => "Generating Summary",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Uploading => "Sending audio file to server...",
            Self::Transcribing => "Converting speech to text...",
            Self::Diarizing => "Identifying different speakers...",
            Self::Analyzing => "Processing transcript for question answering...",
            Self::Summarizing => "Creating meeting summary...",
            Self::Completed => "Processing complete",
            Self::Failed => "Processing failed",
        }
    }

    /// Position on the success path; `None` for `Failed`.
    pub fn index(&self) -> Option<usize> {
        PIPELINE.iter().position(|s| s == self)
    }

    /// The stage that follows this one on the success path.
    pub fn next(&self) -> Option<Stage> {
        self.index().and_then(|i| PIPELINE.get(i + 1)).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `round(100 * index / working stages)`; `None` for `Failed`.
    pub fn progress_percent(&self) -> Option<u8> {
        self.index()
            .map(|i| ((100.0 * i as f64) / WORKING_STAGES as f64).round() as u8)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
