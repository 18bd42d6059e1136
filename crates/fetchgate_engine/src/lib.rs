//! Fetchgate engine: outbound IO and the two request pipelines.
mod captions;
mod decode;
mod extract;
mod fetch;
mod pipeline;
mod types;
mod youtube;

pub use captions::{CaptionError, CaptionProvider, CaptionRetriever};
pub use decode::{decode_body, DecodedText};
pub use extract::{ArticleEngine, ArticleExtractor, ExtractError, ParsedArticle, ReadabilityLikeEngine};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use pipeline::{
    ArticleError, ArticlePipeline, Transcript, TranscriptError, TranscriptPipeline,
};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
pub use youtube::{YoutubeCaptionProvider, DEFAULT_YOUTUBE_BASE_URL};
