//! Meeting results: transcript, summary, and question answering.

pub mod display;
pub mod types;

pub use display::{render_answer, render_meeting, render_summary, render_transcript};
pub use types::{
    MeetingResult, MeetingTranscript, QaRequest, QaResponse, SummaryResponse, TranscriptSegment,
};
