//! Route handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use fetchgate_core::{ArticleResult, FormattedTranscript, TranscriptFormat, VideoId};
use fetchgate_logging::gate_debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error_response::ApiError;
use super::state::AppState;

const DEFAULT_LANG: &str = "en";

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started.elapsed().as_secs_f64(),
        "environment": state.environment,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TranscriptQuery {
    pub format: Option<String>,
    pub lang: Option<String>,
}

pub async fn youtube_transcript(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<Value>, ApiError> {
    let video_id = VideoId::parse(&video_id).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let format = match query.format.as_deref() {
        Some(raw) => raw
            .parse::<TranscriptFormat>()
            .map_err(|err| ApiError::bad_request(err.to_string()))?,
        None => TranscriptFormat::default(),
    };
    let lang = query
        .lang
        .as_deref()
        .filter(|lang| !lang.is_empty())
        .unwrap_or(DEFAULT_LANG);

    let transcript = state.transcripts.transcript(video_id, format, lang).await?;
    gate_debug!(
        "transcript {} served as {:?}",
        transcript.video_id,
        transcript.language
    );

    let body = match transcript.body {
        FormattedTranscript::Structured(cues) => json!({
            "videoId": transcript.video_id.as_str(),
            "success": true,
            "format": transcript.format.as_str(),
            "transcript": cues,
        }),
        FormattedTranscript::Text(content) => json!({
            "videoId": transcript.video_id.as_str(),
            "success": true,
            "format": transcript.format.as_str(),
            "content": content,
        }),
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub url: String,
    #[serde(flatten)]
    pub article: ArticleResult,
}

pub async fn extract_article(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        // A body that is not declared as JSON is treated as empty.
        Err(JsonRejection::MissingJsonContentType(_)) => ExtractRequest { url: None },
        Err(rejection) => {
            return Err(ApiError::bad_request(format!(
                "Invalid JSON body: {}",
                rejection.body_text()
            )))
        }
    };

    let url = request
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required in request body"))?;

    let article = state.articles.extract(&url).await?;
    Ok(Json(ExtractResponse {
        success: true,
        url,
        article,
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}
