//! HTTP surface: router, middleware stack and server loop.
//!
//! Request order through the stack: security headers, panic guard, CORS,
//! access log, rate limit, body limit, auth (all routes but `/health`),
//! handler.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use fetchgate_logging::gate_info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

use crate::config::ServerConfig;

pub mod auth;
pub mod error_response;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error_response::ApiError;
pub use state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the router.
///
/// - `GET /health` - liveness, no auth
/// - `GET /youtube/transcript/:videoId` - captions as json, text, srt or vtt
/// - `POST /article/extract` - readable text of a web page
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/youtube/transcript/:videoId", get(routes::youtube_transcript))
        .route("/article/extract", post(routes::extract_article))
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(
            Arc::<str>::from(config.api_token.as_str()),
            auth::require_bearer_token,
        ));

    let limiter = Arc::new(rate_limit::RateLimiter::new(config.rate_limit.clone()));
    let production = state.production;

    let router = Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn(access_log))
        .layer(build_cors_layer(&config.cors_origin));

    harden(router, production)
}

/// Panic guard inside the security headers, so panic responses carry them.
fn harden(router: Router, production: bool) -> Router {
    let router = router.layer(CatchPanicLayer::custom(
        move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, production),
    ));
    with_security_headers(router)
}

/// `*` allows any origin; anything else is a comma-separated list.
fn build_cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin.trim() == "*" {
        cors.allow_origin(AnyOrigin)
    } else {
        let allowed: Vec<HeaderValue> = origin
            .split(',')
            .filter_map(|o| o.trim().parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(allowed))
    }
}

fn with_security_headers(router: Router) -> Router {
    const HEADERS: [(HeaderName, &str); 6] = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=15552000; includeSubDomains",
        ),
        (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            "same-origin",
        ),
    ];

    HEADERS.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    gate_info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, production: bool) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    fetchgate_logging::gate_error!("handler panicked: {}", detail);

    let message = if production {
        "Internal server error".to_string()
    } else {
        detail.to_string()
    };
    ApiError::internal(message).into_response()
}

/// Serves until `shutdown` is cancelled, then drains in-flight requests.
pub async fn serve(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_router(AppState::from_config(&config), &config);

    let listener = TcpListener::bind(address).await?;
    gate_info!(
        "fetchgate listening on {} (environment: {})",
        listener.local_addr()?,
        config.environment
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    gate_info!("fetchgate stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
