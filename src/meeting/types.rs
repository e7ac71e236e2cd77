//! Processed meeting data returned by the processing service.

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

/// One diarized, transcribed span of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub chunk_id: Option<String>,
    pub speaker_label: String,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingTranscript {
    pub meeting_id: String,
    pub chunks: Vec<TranscriptSegment>,
    pub speakers: Vec<String>,
    pub duration: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingResult {
    pub meeting_id: String,
    pub transcript: MeetingTranscript,
    pub summary: SummaryResponse,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRequest {
    pub question: String,
    pub top_k: usize,
}

impl QaRequest {
    /// Reject blank questions before they reach the service.
    pub fn new(question: &str, top_k: usize) -> Result<Self, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "Please enter a question".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(PipelineError::InvalidRequest(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            question: question.to_string(),
            top_k,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResponse {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub context_chunks: Vec<TranscriptSegment>,
    #[serde(default)]
    pub confidence: Option<String>,
}
