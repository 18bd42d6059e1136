//! Application state for the API server

use std::sync::Arc;
use std::time::Instant;

use fetchgate_core::UrlGuard;
use fetchgate_engine::{
    ArticleExtractor, ArticlePipeline, CaptionRetriever, Fetcher, ReqwestFetcher,
    TranscriptPipeline, YoutubeCaptionProvider,
};

use crate::config::ServerConfig;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub articles: ArticlePipeline,
    pub transcripts: TranscriptPipeline,
    pub started: Instant,
    pub environment: String,
    pub production: bool,
}

impl AppState {
    pub fn new(
        articles: ArticlePipeline,
        transcripts: TranscriptPipeline,
        environment: impl Into<String>,
    ) -> Self {
        let environment = environment.into();
        Self {
            articles,
            transcripts,
            started: Instant::now(),
            production: environment.eq_ignore_ascii_case("production"),
            environment,
        }
    }

    /// Wires the real fetcher, extractor and caption provider.
    pub fn from_config(config: &ServerConfig) -> Self {
        let guard = UrlGuard::default();
        let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::with_guard(
            config.fetch.clone(),
            guard.clone(),
        ));
        let provider = YoutubeCaptionProvider::with_guard(
            fetcher.clone(),
            config.youtube_base_url.clone(),
            guard.clone(),
        );
        let articles = ArticlePipeline::new(guard, fetcher, ArticleExtractor::default());
        let transcripts = TranscriptPipeline::new(CaptionRetriever::new(Arc::new(provider)));
        Self::new(articles, transcripts, config.environment.clone())
    }
}
