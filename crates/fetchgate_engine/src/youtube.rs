//! Caption provider backed by the public watch page and its timed-text
//! tracks.

use std::sync::Arc;

use fetchgate_core::{AcceptedUrl, SubtitleCue, UrlGuard, VideoId};
use fetchgate_logging::{gate_debug, gate_warn};
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

use crate::captions::{CaptionError, CaptionProvider};
use crate::decode::decode_body;
use crate::fetch::Fetcher;

pub const DEFAULT_YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";
const AUTO_GENERATED_KIND: &str = "asr";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some(AUTO_GENERATED_KIND)
    }
}

pub struct YoutubeCaptionProvider {
    fetcher: Arc<dyn Fetcher>,
    base_url: Url,
    guard: UrlGuard,
}

impl YoutubeCaptionProvider {
    /// `base_url` is operator configuration, normally
    /// [`DEFAULT_YOUTUBE_BASE_URL`].
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: Url) -> Self {
        Self::with_guard(fetcher, base_url, UrlGuard::default())
    }

    /// `guard` checks track URLs that point away from `base_url`.
    pub fn with_guard(fetcher: Arc<dyn Fetcher>, base_url: Url, guard: UrlGuard) -> Self {
        Self {
            fetcher,
            base_url,
            guard,
        }
    }

    async fn fetch_text(&self, url: &AcceptedUrl) -> Result<String, CaptionError> {
        let output = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|err| CaptionError::Transport(err.to_string()))?;
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref());
        Ok(decoded.text)
    }

    fn watch_url(&self, video_id: &VideoId) -> Result<AcceptedUrl, CaptionError> {
        let mut url = self
            .base_url
            .join("/watch")
            .map_err(|err| CaptionError::Transport(err.to_string()))?;
        url.query_pairs_mut().append_pair("v", video_id.as_str());
        Ok(AcceptedUrl::trusted(url))
    }

    /// Track URLs come from the fetched page. Only those on the configured
    /// origin skip the guard.
    fn track_url(&self, raw: &str) -> Result<AcceptedUrl, CaptionError> {
        let url = self
            .base_url
            .join(raw)
            .map_err(|err| CaptionError::Transport(err.to_string()))?;
        if url.origin() == self.base_url.origin() {
            return Ok(AcceptedUrl::trusted(url));
        }
        self.guard.check_url(url).map_err(|rejection| {
            gate_warn!("caption track url rejected: {:?}", rejection);
            CaptionError::Transport(format!("Caption track URL rejected: {rejection}"))
        })
    }
}

#[async_trait::async_trait]
impl CaptionProvider for YoutubeCaptionProvider {
    async fn cues(
        &self,
        video_id: &VideoId,
        lang: Option<&str>,
    ) -> Result<Vec<SubtitleCue>, CaptionError> {
        let page = self.fetch_text(&self.watch_url(video_id)?).await?;
        let tracks = caption_tracks(&page)?;
        gate_debug!("video {} lists {} caption tracks", video_id, tracks.len());

        let track = choose_track(&tracks, lang).ok_or(CaptionError::Unavailable)?;
        let track_url = self.track_url(&track.base_url)?;
        let timed_text = self.fetch_text(&track_url).await?;
        Ok(parse_timed_text(&timed_text))
    }
}

/// Reads the JSON array that follows `"captionTracks":` in the watch page.
fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, CaptionError> {
    let Some(start) = page.find(CAPTION_TRACKS_MARKER) else {
        return Ok(Vec::new());
    };
    let rest = &page[start + CAPTION_TRACKS_MARKER.len()..];
    // The array is followed by the rest of the player config; the stream
    // deserializer stops after the first complete value.
    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Vec<CaptionTrack>>();
    match values.next() {
        Some(Ok(tracks)) => Ok(tracks),
        Some(Err(err)) => Err(CaptionError::Transport(format!(
            "Unable to parse caption track list: {err}"
        ))),
        None => Ok(Vec::new()),
    }
}

fn choose_track<'a>(tracks: &'a [CaptionTrack], lang: Option<&str>) -> Option<&'a CaptionTrack> {
    match lang {
        Some(lang) => {
            let regional_prefix = format!("{}-", lang.to_ascii_lowercase());
            tracks
                .iter()
                .find(|t| t.language_code.eq_ignore_ascii_case(lang) && !t.is_auto_generated())
                .or_else(|| {
                    tracks
                        .iter()
                        .find(|t| t.language_code.eq_ignore_ascii_case(lang))
                })
                .or_else(|| {
                    tracks.iter().find(|t| {
                        t.language_code
                            .to_ascii_lowercase()
                            .starts_with(&regional_prefix)
                    })
                })
        }
        None => tracks
            .iter()
            .find(|t| !t.is_auto_generated())
            .or_else(|| tracks.first()),
    }
}

/// Turns `<text start=".." dur="..">..</text>` elements into cues, in
/// document order.
fn parse_timed_text(document: &str) -> Vec<SubtitleCue> {
    let doc = Html::parse_document(document);
    let Ok(selector) = Selector::parse("text") else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter_map(|element| {
            let start = element.value().attr("start")?.trim().parse::<f64>().ok()?;
            let duration = element
                .value()
                .attr("dur")
                .and_then(|dur| dur.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            let raw = element.text().collect::<String>();
            let text = strip_tags(&decode_entities(&raw)).trim().to_string();
            (!text.is_empty()).then(|| SubtitleCue::new(start, duration, text))
        })
        .collect()
}

/// Timed text is often escaped twice (`&amp;#39;`); the HTML parser undoes
/// the first layer, this undoes the second.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}
