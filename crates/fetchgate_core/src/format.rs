use std::fmt;
use std::str::FromStr;

use crate::{SubtitleCue, TranscriptDocument};

const SRT_FRACTION_SEPARATOR: char = ',';
const VTT_FRACTION_SEPARATOR: char = '.';
const VTT_HEADER: &str = "WEBVTT\n\n";

/// Output encodings for a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptFormat {
    #[default]
    Json,
    Text,
    Srt,
    Vtt,
}

impl TranscriptFormat {
    pub const ALL: [TranscriptFormat; 4] = [
        TranscriptFormat::Json,
        TranscriptFormat::Text,
        TranscriptFormat::Srt,
        TranscriptFormat::Vtt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TranscriptFormat::Json => "json",
            TranscriptFormat::Text => "text",
            TranscriptFormat::Srt => "srt",
            TranscriptFormat::Vtt => "vtt",
        }
    }
}

impl fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid format. Must be one of: json, text, srt, vtt")]
pub struct FormatParseError {
    pub value: String,
}

impl FromStr for TranscriptFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TranscriptFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| FormatParseError {
                value: s.to_string(),
            })
    }
}

/// A formatted transcript: either the cues themselves or an encoded string.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedTranscript {
    Structured(Vec<SubtitleCue>),
    Text(String),
}

pub fn format_transcript(doc: &TranscriptDocument, format: TranscriptFormat) -> FormattedTranscript {
    match format {
        TranscriptFormat::Json => FormattedTranscript::Structured(doc.cues.clone()),
        TranscriptFormat::Text => FormattedTranscript::Text(to_text(&doc.cues)),
        TranscriptFormat::Srt => FormattedTranscript::Text(to_srt(&doc.cues)),
        TranscriptFormat::Vtt => FormattedTranscript::Text(to_vtt(&doc.cues)),
    }
}

pub fn to_text(cues: &[SubtitleCue]) -> String {
    cues.iter()
        .map(|cue| cue.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// SubRip: numbered blocks, each terminated by a newline and separated by a
/// blank line.
pub fn to_srt(cues: &[SubtitleCue]) -> String {
    cues.iter()
        .enumerate()
        .map(|(index, cue)| {
            format!(
                "{}\n{}\n{}\n",
                index + 1,
                time_range(cue, SRT_FRACTION_SEPARATOR),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// WebVTT: header, then SRT-style numbered cues with `.` before the
/// milliseconds.
pub fn to_vtt(cues: &[SubtitleCue]) -> String {
    let body = cues
        .iter()
        .enumerate()
        .map(|(index, cue)| {
            format!(
                "{}\n{}\n{}",
                index + 1,
                time_range(cue, VTT_FRACTION_SEPARATOR),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{VTT_HEADER}{body}")
}

fn time_range(cue: &SubtitleCue, separator: char) -> String {
    format!(
        "{} --> {}",
        timecode(cue.start, separator),
        timecode(cue.end(), separator)
    )
}

/// `HH:MM:SS<sep>mmm`, every component truncated, never rounded.
pub fn timecode(seconds: f64, separator: char) -> String {
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let millis = ((seconds % 1.0) * 1000.0).floor() as u64;
    format!("{hours:02}:{minutes:02}:{secs:02}{separator}{millis:03}")
}
