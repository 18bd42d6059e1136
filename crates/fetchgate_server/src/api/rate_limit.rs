//! Fixed-window rate limiting per client IP.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fetchgate_logging::gate_warn;
use tokio::sync::Mutex;

use super::error_response::ApiError;
use crate::config::RateLimitConfig;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");

/// Windows are pruned once the map grows past this many clients.
const PRUNE_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }

    pub async fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let window_len = self.config.window;
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, window| now.duration_since(window.started) < window_len);
        }

        let window = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= window_len {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.config.max_requests {
            let elapsed = now.duration_since(window.started);
            return Decision::Limited {
                retry_after: window_len.saturating_sub(elapsed),
            };
        }
        window.count += 1;
        Decision::Allowed {
            remaining: self.config.max_requests - window.count,
        }
    }
}

/// Requests without connection info (in-process callers) share one bucket.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(client).await {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            gate_warn!("rate limit exceeded for {}", client);
            let mut response = ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later.",
            )
            .into_response();
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(
                RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs_f64().ceil() as u64),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[tokio::test]
    async fn allows_up_to_max_then_limits() {
        let limiter = limiter(2, 60);
        let now = Instant::now();
        assert_eq!(
            limiter.check_at(ip(1), now).await,
            Decision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at(ip(1), now).await,
            Decision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check_at(ip(1), now + Duration::from_secs(20)).await,
            Decision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at(ip(2), now).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Limited { .. }));
    }

    #[tokio::test]
    async fn window_resets_after_it_elapses() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Limited { .. }));
        assert_eq!(
            limiter.check_at(ip(1), now + Duration::from_secs(60)).await,
            Decision::Allowed { remaining: 0 }
        );
    }
}
