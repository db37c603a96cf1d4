use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A provider-emitted unit of recognized speech with timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// Provider speaker identifier; present only when diarization ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default)]
    pub start_ms: u64,
    #[serde(default)]
    pub duration_ms: u64,
}

/// A contiguous run of tokens attributed to one speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker_label: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// The terminal transcript artifact handed to the note-generation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Transcript {
    /// Build a transcript from provider tokens. An empty token stream (a
    /// silent recording) produces an empty transcript, not an error.
    pub fn from_tokens(tokens: &[Token], roles: &SpeakerRoles) -> Self {
        let segments = group_into_segments(tokens, roles);
        let full_text = render_full_text(&segments);
        Self {
            id: Uuid::new_v4(),
            segments,
            full_text,
            token_count: tokens.len(),
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Ordered role labels for diarized speakers.
///
/// Labels are handed out to distinct provider speaker identifiers in order of
/// first appearance, so the mapping does not depend on whether the provider
/// numbers speakers from 0 or from 1. Speakers beyond the configured labels
/// are rendered as "Speaker N".
#[derive(Debug, Clone)]
pub struct SpeakerRoles {
    labels: Vec<String>,
}

impl SpeakerRoles {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    fn label_for(&self, position: usize) -> String {
        self.labels
            .get(position)
            .cloned()
            .unwrap_or_else(|| format!("Speaker {}", position + 1))
    }
}

impl Default for SpeakerRoles {
    fn default() -> Self {
        Self {
            labels: vec!["Doctor".to_string(), "Patient".to_string()],
        }
    }
}

struct OpenSegment {
    speaker: String,
    label: String,
    start_seconds: f64,
    end_seconds: f64,
    parts: Vec<String>,
}

/// Group an ordered token stream into contiguous speaker turns.
///
/// Tokens arrive in non-decreasing `start_ms` order and are not re-sorted.
/// Tokens whose text is empty after trimming are skipped entirely: they never
/// open or extend a turn, and they do not break a speaker run.
pub fn group_into_segments(tokens: &[Token], roles: &SpeakerRoles) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut seen_speakers: Vec<String> = Vec::new();
    let mut open: Option<OpenSegment> = None;

    for token in tokens {
        if token.text.trim().is_empty() {
            continue;
        }

        let speaker = token.speaker.clone().unwrap_or_default();
        let start_seconds = token.start_ms as f64 / 1000.0;
        let end_seconds = (token.start_ms + token.duration_ms) as f64 / 1000.0;

        match open.as_mut() {
            Some(current) if current.speaker == speaker => {
                current.parts.push(token.text.clone());
                current.end_seconds = end_seconds;
            }
            _ => {
                if let Some(finished) = open.take() {
                    flush(&mut segments, finished);
                }
                let position = match seen_speakers.iter().position(|s| s == &speaker) {
                    Some(position) => position,
                    None => {
                        seen_speakers.push(speaker.clone());
                        seen_speakers.len() - 1
                    }
                };
                open = Some(OpenSegment {
                    speaker,
                    label: roles.label_for(position),
                    start_seconds,
                    end_seconds,
                    parts: vec![token.text.clone()],
                });
            }
        }
    }

    if let Some(finished) = open.take() {
        flush(&mut segments, finished);
    }

    segments
}

fn flush(segments: &mut Vec<TranscriptSegment>, open: OpenSegment) {
    // Token texts keep their provider-internal spacing; the join adds the
    // word boundary and only the outer edges are trimmed.
    let text = open.parts.join(" ").trim().to_string();
    if text.is_empty() {
        return;
    }
    segments.push(TranscriptSegment {
        speaker_label: open.label,
        start_seconds: open.start_seconds,
        end_seconds: open.end_seconds,
        text,
    });
}

/// Render segments as "[label] text" lines separated by a blank line.
pub fn render_full_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| format!("[{}] {}", segment.speaker_label, segment.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
