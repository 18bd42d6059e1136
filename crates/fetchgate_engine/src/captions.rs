use std::sync::Arc;

use fetchgate_core::{EffectiveLanguage, SubtitleCue, TranscriptDocument, VideoId};
use fetchgate_logging::{gate_debug, gate_info};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptionError {
    /// The provider has no captions for the language it was asked for.
    #[error("No captions found for the requested language")]
    Unavailable,
    /// Neither the requested language nor auto-detection produced cues.
    #[error("No captions available for this video")]
    NoCaptionsAvailable,
    #[error("{0}")]
    Transport(String),
}

/// Source of caption cues. `lang: None` asks the provider to pick.
#[async_trait::async_trait]
pub trait CaptionProvider: Send + Sync {
    async fn cues(
        &self,
        video_id: &VideoId,
        lang: Option<&str>,
    ) -> Result<Vec<SubtitleCue>, CaptionError>;
}

/// Asks for the requested language, then falls back exactly once to
/// auto-detection. Transport failures end the attempt immediately.
#[derive(Clone)]
pub struct CaptionRetriever {
    provider: Arc<dyn CaptionProvider>,
}

impl CaptionRetriever {
    pub fn new(provider: Arc<dyn CaptionProvider>) -> Self {
        Self { provider }
    }

    pub async fn retrieve(
        &self,
        video_id: &VideoId,
        requested_lang: &str,
    ) -> Result<TranscriptDocument, CaptionError> {
        match self.provider.cues(video_id, Some(requested_lang)).await {
            Ok(cues) if !cues.is_empty() => {
                return Ok(TranscriptDocument::new(
                    cues,
                    EffectiveLanguage::Requested(requested_lang.to_string()),
                ));
            }
            Ok(_) | Err(CaptionError::Unavailable) => {
                gate_debug!(
                    "no '{}' captions for {}, retrying with auto-detect",
                    requested_lang,
                    video_id
                );
            }
            Err(err) => return Err(err),
        }

        match self.provider.cues(video_id, None).await {
            Ok(cues) if !cues.is_empty() => {
                gate_info!(
                    "captions for {} served in auto-detected language (requested '{}')",
                    video_id,
                    requested_lang
                );
                Ok(TranscriptDocument::new(cues, EffectiveLanguage::AutoDetected))
            }
            Ok(_) | Err(CaptionError::Unavailable) => Err(CaptionError::NoCaptionsAvailable),
            Err(err) => Err(err),
        }
    }
}
