use serde::{Deserialize, Serialize};

/// One timed caption entry. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start: f64,
    #[serde(rename = "dur")]
    pub duration: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Which language the cues were actually retrieved in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveLanguage {
    Requested(String),
    AutoDetected,
}

/// Cues in provider order plus the language that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptDocument {
    pub cues: Vec<SubtitleCue>,
    pub language: EffectiveLanguage,
}

impl TranscriptDocument {
    pub fn new(cues: Vec<SubtitleCue>, language: EffectiveLanguage) -> Self {
        Self { cues, language }
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
