use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, OnceLock,
};
use std::time::Duration;

use bytes::BytesMut;
use fetchgate_core::{AcceptedUrl, Rejection, UrlGuard};
use fetchgate_logging::{gate_debug, gate_warn};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; fetchgate/1.0)";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Wall-clock budget for the whole exchange, headers and body.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &AcceptedUrl) -> Result<FetchOutput, FetchError>;
}

/// Redirect bookkeeping shared with the client's redirect policy.
#[derive(Debug, Default)]
struct RedirectState {
    count: AtomicUsize,
    /// Why the guard refused a hop, if it did.
    blocked: OnceLock<Rejection>,
}

/// GET with a timeout and a size ceiling. Every redirect hop goes back
/// through the [`UrlGuard`].
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    guard: UrlGuard,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self::with_guard(settings, UrlGuard::default())
    }

    pub fn with_guard(settings: FetchSettings, guard: UrlGuard) -> Self {
        Self { settings, guard }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn build_client(&self, redirects: Arc<RedirectState>) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let guard = self.guard.clone();
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirects.count.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                return attempt.error("redirect limit exceeded");
            }
            match guard.check_url(attempt.url().clone()) {
                Ok(_) => attempt.follow(),
                Err(rejection) => {
                    let _ = redirects.blocked.set(rejection);
                    attempt.error(rejection)
                }
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .user_agent(self.settings.user_agent.as_str())
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    async fn fetch_within_budget(
        &self,
        client: &reqwest::Client,
        url: &AcceptedUrl,
        redirects: &RedirectState,
    ) -> Result<FetchOutput, FetchError> {
        let response = client
            .get(url.as_url().clone())
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, redirects))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("Failed to fetch URL: {status}"),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::too_large(max_bytes, Some(content_len)));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        // Content-Length may be missing or wrong, so the running total is
        // checked on every chunk.
        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(err, redirects))?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::too_large(max_bytes, Some(next_len)));
            }
            body.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            redirect_count: redirects.count.load(Ordering::Relaxed),
            content_type,
            byte_len: body.len() as u64,
        };

        Ok(FetchOutput {
            bytes: body.freeze(),
            metadata,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &AcceptedUrl) -> Result<FetchOutput, FetchError> {
        let redirects = Arc::new(RedirectState::default());
        let client = self.build_client(redirects.clone())?;

        gate_debug!("fetch start host={} url_len={}", url.hostname(), url.as_str().len());
        // Dropping the inner future on expiry aborts the request and frees
        // the timer; nothing outlives this call.
        let result = tokio::time::timeout(
            self.settings.request_timeout,
            self.fetch_within_budget(&client, url, &redirects),
        )
        .await
        .unwrap_or_else(|_| Err(FetchError::timeout()));

        match &result {
            Ok(output) => gate_debug!(
                "fetch done host={} bytes={} redirects={}",
                url.hostname(),
                output.metadata.byte_len,
                output.metadata.redirect_count
            ),
            Err(err) => gate_warn!("fetch failed host={} kind={}", url.hostname(), err.kind),
        }
        result
    }
}

fn map_reqwest_error(err: reqwest::Error, redirects: &RedirectState) -> FetchError {
    if let Some(rejection) = redirects.blocked.get() {
        return FetchError::new(
            FailureKind::RedirectBlocked,
            format!("Redirect target rejected: {rejection}"),
        );
    }
    if err.is_timeout() {
        return FetchError::timeout();
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, "Too many redirects");
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
