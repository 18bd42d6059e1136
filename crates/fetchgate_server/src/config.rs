//! Server configuration read from the process environment.

use std::time::Duration;

use fetchgate_engine::{FetchSettings, DEFAULT_YOUTUBE_BASE_URL};
use url::Url;

use crate::logging::LogDestination;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CONTENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("API_TOKEN must be set to a non-empty value")]
    MissingApiToken,
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Free-form, reported by `/health`. `production` changes log level and
    /// hides panic messages.
    pub environment: String,
    pub api_token: String,
    pub rate_limit: RateLimitConfig,
    pub cors_origin: String,
    pub fetch: FetchSettings,
    pub youtube_base_url: Url,
    pub log_destination: LogDestination,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; unset and empty
    /// variables take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_token = var("API_TOKEN").ok_or(ConfigError::MissingApiToken)?;

        let fetch = FetchSettings {
            request_timeout: Duration::from_millis(parse_or(
                "FETCH_TIMEOUT_MS",
                var("FETCH_TIMEOUT_MS"),
                DEFAULT_FETCH_TIMEOUT_MS,
            )?),
            max_bytes: parse_or(
                "MAX_CONTENT_BYTES",
                var("MAX_CONTENT_BYTES"),
                DEFAULT_MAX_CONTENT_BYTES,
            )?,
            ..FetchSettings::default()
        };

        let youtube_base_url = var("YOUTUBE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_YOUTUBE_BASE_URL.to_string());
        let youtube_base_url =
            Url::parse(&youtube_base_url).map_err(|err| ConfigError::Invalid {
                name: "YOUTUBE_BASE_URL",
                value: youtube_base_url.clone(),
                reason: err.to_string(),
            })?;

        let log_destination = match var("LOG_DESTINATION") {
            Some(value) => value
                .parse::<LogDestination>()
                .map_err(|reason| ConfigError::Invalid {
                    name: "LOG_DESTINATION",
                    value,
                    reason,
                })?,
            None => LogDestination::default(),
        };

        Ok(Self {
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
            environment: var("APP_ENV").unwrap_or_else(|| "development".to_string()),
            api_token,
            rate_limit: RateLimitConfig {
                max_requests: parse_or(
                    "RATE_LIMIT_MAX",
                    var("RATE_LIMIT_MAX"),
                    DEFAULT_RATE_LIMIT_MAX,
                )?,
                window: Duration::from_secs(parse_or(
                    "RATE_LIMIT_WINDOW_SECS",
                    var("RATE_LIMIT_WINDOW_SECS"),
                    DEFAULT_RATE_LIMIT_WINDOW_SECS,
                )?),
            },
            cors_origin: var("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
            fetch,
            youtube_base_url,
            log_destination,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
            value,
        }),
    }
}
