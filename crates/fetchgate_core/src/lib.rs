//! Fetchgate core: pure validation, data model and transcript formatting.
mod article;
mod format;
mod transcript;
mod url_guard;
mod video_id;

pub use article::ArticleResult;
pub use format::{
    format_transcript, timecode, to_srt, to_text, to_vtt, FormatParseError, FormattedTranscript,
    TranscriptFormat,
};
pub use transcript::{EffectiveLanguage, SubtitleCue, TranscriptDocument};
pub use url_guard::{
    is_internal_ip, AcceptedUrl, GuardPolicy, Rejection, Scheme, UrlGuard,
    DEFAULT_MAX_URL_LENGTH,
};
pub use video_id::{VideoId, VideoIdError};
