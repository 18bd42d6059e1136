use std::sync::Arc;

use fetchgate_core::{
    format_transcript, ArticleResult, EffectiveLanguage, FormattedTranscript, Rejection,
    TranscriptFormat, UrlGuard, VideoId,
};
use fetchgate_logging::{gate_info, gate_warn};

use crate::captions::{CaptionError, CaptionRetriever};
use crate::decode::decode_body;
use crate::extract::{ArticleExtractor, ExtractError};
use crate::fetch::Fetcher;
use crate::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArticleError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("Failed to extract article: {0}")]
    Fetch(#[from] FetchError),
    #[error("Failed to extract article: {0}")]
    Extract(#[from] ExtractError),
}

impl ArticleError {
    /// Rejections are the caller's fault; everything else is ours or
    /// upstream's.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ArticleError::Rejected(_))
    }
}

/// Guard, fetch, decode, extract.
#[derive(Clone)]
pub struct ArticlePipeline {
    guard: UrlGuard,
    fetcher: Arc<dyn Fetcher>,
    extractor: ArticleExtractor,
}

impl ArticlePipeline {
    pub fn new(guard: UrlGuard, fetcher: Arc<dyn Fetcher>, extractor: ArticleExtractor) -> Self {
        Self {
            guard,
            fetcher,
            extractor,
        }
    }

    pub async fn extract(&self, raw_url: &str) -> Result<ArticleResult, ArticleError> {
        let url = self.guard.validate(raw_url).inspect_err(|rejection| {
            gate_warn!("article url rejected: {:?}", rejection);
        })?;
        let output = self.fetcher.fetch(&url).await?;
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref());
        let article = self.extractor.extract(&decoded.text, url.as_url())?;
        gate_info!(
            "article extracted host={} encoding={} chars={}",
            url.hostname(),
            decoded.encoding_label,
            article.length.unwrap_or_default()
        );
        Ok(article)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("Failed to fetch transcript: {0}")]
    Caption(#[from] CaptionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub video_id: VideoId,
    pub format: TranscriptFormat,
    pub language: EffectiveLanguage,
    pub body: FormattedTranscript,
}

/// Retrieve with language fallback, then format.
#[derive(Clone)]
pub struct TranscriptPipeline {
    retriever: CaptionRetriever,
}

impl TranscriptPipeline {
    pub fn new(retriever: CaptionRetriever) -> Self {
        Self { retriever }
    }

    pub async fn transcript(
        &self,
        video_id: VideoId,
        format: TranscriptFormat,
        lang: &str,
    ) -> Result<Transcript, TranscriptError> {
        let doc = self.retriever.retrieve(&video_id, lang).await?;
        gate_info!(
            "transcript video={} cues={} format={}",
            video_id,
            doc.cues.len(),
            format
        );
        let body = format_transcript(&doc, format);
        Ok(Transcript {
            video_id,
            format,
            language: doc.language,
            body,
        })
    }
}
