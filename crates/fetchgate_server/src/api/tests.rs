use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use fetchgate_core::{AcceptedUrl, SubtitleCue, UrlGuard, VideoId};
use fetchgate_engine::{
    ArticleExtractor, ArticlePipeline, CaptionError, CaptionProvider, CaptionRetriever,
    FetchError, FetchMetadata, FetchOutput, Fetcher, TranscriptPipeline,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

const TOKEN: &str = "test-token";

const ARTICLE_HTML: &str = r#"<html><head>
<title>Quarterly report</title>
<meta property="og:site_name" content="Example Wire">
<meta name="author" content="Grace Hopper">
</head><body><nav>Home</nav><article><p>Revenue went up.</p><p>Costs went down.</p></article></body></html>"#;

struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &AcceptedUrl) -> Result<FetchOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchOutput {
            bytes: Bytes::from_static(ARTICLE_HTML.as_bytes()),
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                redirect_count: 0,
                content_type: Some("text/html; charset=utf-8".to_string()),
                byte_len: ARTICLE_HTML.len() as u64,
            },
        })
    }
}

/// Returns the same cues for every language.
struct FixedCaptions(Vec<SubtitleCue>);

#[async_trait::async_trait]
impl CaptionProvider for FixedCaptions {
    async fn cues(
        &self,
        _video_id: &VideoId,
        _lang: Option<&str>,
    ) -> Result<Vec<SubtitleCue>, CaptionError> {
        Ok(self.0.clone())
    }
}

fn test_config(extra: &[(&str, &str)]) -> ServerConfig {
    let extra: Vec<(String, String)> = extra
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ServerConfig::from_lookup(|name| {
        if name == "API_TOKEN" {
            return Some(TOKEN.to_string());
        }
        extra
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    })
    .unwrap()
}

struct TestApp {
    router: Router,
    fetcher: Arc<CountingFetcher>,
}

fn test_app(extra: &[(&str, &str)]) -> TestApp {
    let config = test_config(extra);
    let fetcher = Arc::new(CountingFetcher {
        calls: AtomicUsize::new(0),
    });
    let articles = ArticlePipeline::new(
        UrlGuard::default(),
        fetcher.clone(),
        ArticleExtractor::default(),
    );
    let captions = FixedCaptions(vec![
        SubtitleCue::new(0.0, 1.0, "a"),
        SubtitleCue::new(1.0, 1.0, "b"),
    ]);
    let transcripts =
        TranscriptPipeline::new(CaptionRetriever::new(Arc::new(captions)));
    let state = AppState::new(articles, transcripts, config.environment.clone());
    TestApp {
        router: create_router(state, &config),
        fetcher,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, headers, body)
}

#[tokio::test]
async fn health_is_public_and_reports_environment() {
    let app = test_app(&[]);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["environment"], json!("development"));
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["ratelimit-limit"], "100");
}

#[tokio::test]
async fn text_transcript_joins_cues() {
    let app = test_app(&[]);
    let (status, _, body) = send(
        app.router,
        get("/youtube/transcript/dQw4w9WgXcQ?format=text&lang=en"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "videoId": "dQw4w9WgXcQ",
            "success": true,
            "format": "text",
            "content": "a b",
        })
    );
}

#[tokio::test]
async fn json_is_the_default_transcript_format() {
    let app = test_app(&[]);
    let (status, _, body) = send(app.router, get("/youtube/transcript/dQw4w9WgXcQ")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], json!("json"));
    assert_eq!(
        body["transcript"],
        json!([
            {"start": 0.0, "dur": 1.0, "text": "a"},
            {"start": 1.0, "dur": 1.0, "text": "b"},
        ])
    );
}

#[tokio::test]
async fn bad_transcript_parameters_are_client_errors() {
    let app = test_app(&[]);
    let (status, _, body) = send(app.router.clone(), get("/youtube/transcript/short")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid YouTube video ID format"));

    let (status, _, body) = send(
        app.router,
        get("/youtube/transcript/dQw4w9WgXcQ?format=xml"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("Invalid format. Must be one of: json, text, srt, vtt")
    );
}

#[tokio::test]
async fn private_article_url_is_rejected_without_fetching() {
    let app = test_app(&[]);
    let (status, _, body) = send(
        app.router,
        post_json("/article/extract", r#"{"url":"http://10.0.0.5/page"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Access to private IP addresses is not allowed",
        })
    );
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn article_is_extracted_and_echoes_url() {
    let app = test_app(&[]);
    let (status, _, body) = send(
        app.router,
        post_json("/article/extract", r#"{"url":"https://example.com/report"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["url"], json!("https://example.com/report"));
    assert_eq!(body["title"], json!("Quarterly report"));
    assert_eq!(body["content"], json!("Revenue went up.\nCosts went down."));
    assert_eq!(body["byline"], json!("Grace Hopper"));
    assert_eq!(body["siteName"], json!("Example Wire"));
    assert_eq!(body["length"], json!(33));
}

#[tokio::test]
async fn article_request_needs_a_url() {
    let app = test_app(&[]);
    for payload in [r#"{}"#, r#"{"url":""}"#] {
        let (status, _, body) =
            send(app.router.clone(), post_json("/article/extract", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["error"], json!("URL is required in request body"));
    }

    let (status, _, body) = send(app.router, post_json("/article/extract", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn protected_routes_require_the_token() {
    let app = test_app(&[]);
    let request = Request::builder()
        .uri("/youtube/transcript/dQw4w9WgXcQ")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app.router.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"],
        json!("Missing authorization header. Use: Authorization: Bearer YOUR_TOKEN")
    );

    let request = Request::builder()
        .uri("/nowhere")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid authorization token"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = test_app(&[]);
    let (status, _, body) = send(app.router, get("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "error": "Endpoint not found"}));
}

#[tokio::test]
async fn requests_over_the_limit_are_throttled() {
    let app = test_app(&[("RATE_LIMIT_MAX", "2"), ("RATE_LIMIT_WINDOW_SECS", "60")]);
    for expected_remaining in ["1", "0"] {
        let (status, headers, _) = send(app.router.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["ratelimit-remaining"], expected_remaining);
    }

    let (status, headers, body) = send(app.router, get("/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], json!("Too many requests, please try again later."));
    let retry_after: u64 = headers["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 60);
}

#[tokio::test]
async fn cors_allows_configured_origin() {
    let app = test_app(&[("CORS_ORIGIN", "https://app.example.com")]);
    let request = Request::builder()
        .uri("/health")
        .header("origin", "https://app.example.com")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(app.router, request).await;
    assert_eq!(
        headers["access-control-allow-origin"],
        "https://app.example.com"
    );
}

#[tokio::test]
async fn panic_message_is_hidden_in_production() {
    let response = panic_response(Box::new("boom".to_string()), true);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], json!("Internal server error"));

    let response = panic_response(Box::new("boom"), false);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], json!("boom"));
}

async fn explode() -> &'static str {
    panic!("boom")
}

#[tokio::test]
async fn panic_responses_keep_security_headers() {
    let router = harden(
        Router::new().route("/explode", axum::routing::get(explode)),
        true,
    );
    let (status, headers, body) = send(router, get("/explode")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Internal server error"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["content-security-policy"], "default-src 'self'");
    assert_eq!(headers["cross-origin-resource-policy"], "same-origin");
}
