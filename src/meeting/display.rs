//! Plain-text rendering of transcripts, summaries, and answers.

use std::fmt::Write;

use super::types::{MeetingResult, QaResponse, SummaryResponse, TranscriptSegment};

/// `mm:ss` for a transcript timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// "Speaker N" by position in the meeting's speaker list, or the raw label
/// when it isn't listed.
pub fn speaker_display_name(label: &str, speakers: &[String]) -> String {
    match speakers.iter().position(|s| s == label) {
        Some(index) => format!("Speaker {}", index + 1),
        None => label.to_string(),
    }
}

pub fn format_segment(segment: &TranscriptSegment, speakers: &[String]) -> String {
    format!(
        "[{}] {}: {}",
        format_timestamp(segment.start_time),
        speaker_display_name(&segment.speaker_label, speakers),
        segment.text.trim()
    )
}

pub fn render_transcript(segments: &[TranscriptSegment], speakers: &[String]) -> String {
    segments
        .iter()
        .map(|s| format_segment(s, speakers))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_summary(summary: &SummaryResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary.summary.trim());

    for (title, items) in [
        ("Action items", &summary.action_items),
        ("Key decisions", &summary.key_decisions),
        ("Topics", &summary.topics),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{title}:");
        for item in items {
            let _ = writeln!(out, "  - {item}");
        }
    }

    out.trim_end().to_string()
}

pub fn render_meeting(result: &MeetingResult) -> String {
    let transcript = &result.transcript;
    format!(
        "Meeting {} ({} speakers, {})\n\n--- Summary ---\n{}\n\n--- Transcript ---\n{}",
        result.meeting_id,
        transcript.speakers.len(),
        format_timestamp(transcript.duration),
        render_summary(&result.summary),
        render_transcript(&transcript.chunks, &transcript.speakers),
    )
}

pub fn render_answer(response: &QaResponse, speakers: &[String]) -> String {
    let mut out = response.answer.trim().to_string();
    if !response.context_chunks.is_empty() {
        out.push_str("\n\nSources:");
        for chunk in &response.context_chunks {
            out.push_str("\n  ");
            out.push_str(&format_segment(chunk, speakers));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(label: &str, start: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            chunk_id: None,
            speaker_label: label.to_string(),
            start_time: start,
            end_time: start + 1.0,
            text: text.to_string(),
            language: None,
            confidence: None,
        }
    }

    fn speakers() -> Vec<String> {
        vec!["SPEAKER_00".to_string(), "SPEAKER_01".to_string()]
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(61.7), "01:01");
        assert_eq!(format_timestamp(3600.0), "60:00");
        assert_eq!(format_timestamp(-2.0), "00:00");
    }

    #[test]
    fn test_speaker_display_name() {
        assert_eq!(speaker_display_name("SPEAKER_01", &speakers()), "Speaker 2");
        assert_eq!(speaker_display_name("GUEST", &speakers()), "GUEST");
    }

    #[test]
    fn test_render_transcript() {
        let text = render_transcript(
            &[segment("SPEAKER_00", 0.0, " Hello "), segment("SPEAKER_01", 75.0, "Hi")],
            &speakers(),
        );
        assert_eq!(text, "[00:00] Speaker 1: Hello\n[01:15] Speaker 2: Hi");
    }

    #[test]
    fn test_render_summary_skips_empty_sections() {
        let summary = SummaryResponse {
            summary: "Planning sync.".to_string(),
            action_items: vec!["Ship it".to_string()],
            key_decisions: Vec::new(),
            topics: vec!["Roadmap".to_string()],
        };
        let text = render_summary(&summary);
        assert!(text.starts_with("Planning sync."));
        assert!(text.contains("Action items:\n  - Ship it"));
        assert!(!text.contains("Key decisions"));
        assert!(text.ends_with("  - Roadmap"));
    }

    #[test]
    fn test_render_answer_lists_sources() {
        let response = QaResponse {
            question: "Who said hello?".to_string(),
            answer: "Speaker 1".to_string(),
            context_chunks: vec![segment("SPEAKER_00", 0.0, "Hello")],
            confidence: None,
        };
        let text = render_answer(&response, &speakers());
        assert_eq!(text, "Speaker 1\n\nSources:\n  [00:00] Speaker 1: Hello");
    }
}
