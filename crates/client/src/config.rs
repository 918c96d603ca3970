//! Cart sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_BASE_URL` - Storefront origin (e.g., `http://localhost:8000`)
//!
//! ## Optional
//! - `CART_BATCH_PATH` - Batch endpoint path (default: `/sklep/api/cart/batch/`)
//! - `CART_DEBOUNCE_MS` - Quiet period before a flush (default: 400)
//! - `CART_MAX_RETRIES` - Consecutive failures before automatic retry stops (default: unlimited)
//! - `CART_RETRY_BACKOFF_FACTOR` - Retry delay multiplier per failure (default: 1.0)
//! - `CART_RETRY_MAX_DELAY_MS` - Retry delay cap (default: 30000)
//! - `CART_REQUEST_TIMEOUT_SECS` - HTTP timeout (default: 30)
//! - `CART_ROW_FADE_MS` - Row fade before removal (default: 200)
//! - `CART_EMPTY_RELOAD_MS` - Delay before reloading an empty cart (default: 500)
//! - `CART_CURRENCY_SUFFIX` - Currency suffix for rendered amounts (default: zł)
//! - `CART_CSRF_HEADER` - Anti-forgery header name (default: X-CSRFToken)
//! - `CART_CSRF_TOKEN` - Static anti-forgery token

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_BATCH_PATH: &str = "/sklep/api/cart/batch/";
const DEFAULT_DEBOUNCE_MS: u64 = 400;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ROW_FADE_MS: u64 = 200;
const DEFAULT_EMPTY_RELOAD_MS: u64 = 500;
const DEFAULT_CURRENCY_SUFFIX: &str = "zł";
const DEFAULT_CSRF_HEADER: &str = "X-CSRFToken";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart sync client configuration.
///
/// Implements `Debug` manually to redact the anti-forgery token.
#[derive(Clone)]
pub struct CartSyncConfig {
    /// Absolute URL of the batch endpoint
    pub batch_endpoint: Url,
    /// Quiet period after the last edit before a flush fires
    pub debounce: Duration,
    /// Automatic retry policy for transport failures
    pub retry: RetryPolicy,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Visual fade applied to a row before it is removed
    pub row_fade: Duration,
    /// Delay between detecting an empty cart and reloading the page
    pub empty_reload_delay: Duration,
    /// Currency suffix appended to rendered amounts
    pub currency_suffix: String,
    /// Header carrying the anti-forgery token
    pub csrf_header: String,
    /// Static anti-forgery token, if the page does not provide one
    pub csrf_token: Option<SecretString>,
}

impl std::fmt::Debug for CartSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSyncConfig")
            .field("batch_endpoint", &self.batch_endpoint.as_str())
            .field("debounce", &self.debounce)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("row_fade", &self.row_fade)
            .field("empty_reload_delay", &self.empty_reload_delay)
            .field("currency_suffix", &self.currency_suffix)
            .field("csrf_header", &self.csrf_header)
            .field(
                "csrf_token",
                &self.csrf_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Retry policy for transport failures.
///
/// The delay before the n-th consecutive retry is
/// `debounce * backoff_factor^(n-1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive failed attempts after which automatic retry stops.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Multiplier applied per consecutive failure (1.0 = constant delay).
    pub backoff_factor: f64,
    /// Upper bound on the retry delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Whether another automatic attempt is allowed after `failures`
    /// consecutive failures.
    #[must_use]
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }

    /// Delay before retrying after `failures` consecutive failures.
    #[must_use]
    pub fn delay_for(&self, base: Duration, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let scaled = base.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay.max(base);
        }
        Duration::from_secs_f64(scaled)
    }
}

impl CartSyncConfig {
    /// Configuration with defaults for everything but the endpoint.
    #[must_use]
    pub fn new(batch_endpoint: Url) -> Self {
        Self {
            batch_endpoint,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            row_fade: Duration::from_millis(DEFAULT_ROW_FADE_MS),
            empty_reload_delay: Duration::from_millis(DEFAULT_EMPTY_RELOAD_MS),
            currency_suffix: DEFAULT_CURRENCY_SUFFIX.to_string(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            csrf_token: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_url("CART_BASE_URL", &get_required_env("CART_BASE_URL")?)?;
        let batch_path = get_env_or_default("CART_BATCH_PATH", DEFAULT_BATCH_PATH);
        let batch_endpoint = base_url.join(&batch_path).map_err(|e| {
            ConfigError::InvalidEnvVar("CART_BATCH_PATH".to_string(), e.to_string())
        })?;

        let max_attempts = get_optional_env("CART_MAX_RETRIES")
            .map(|v| parse_number::<u32>("CART_MAX_RETRIES", &v))
            .transpose()?;
        let backoff_factor = parse_number::<f64>(
            "CART_RETRY_BACKOFF_FACTOR",
            &get_env_or_default("CART_RETRY_BACKOFF_FACTOR", "1.0"),
        )?;
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_RETRY_BACKOFF_FACTOR".to_string(),
                format!("must be a finite number >= 1.0 (got {backoff_factor})"),
            ));
        }

        Ok(Self {
            batch_endpoint,
            debounce: get_millis("CART_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
            retry: RetryPolicy {
                max_attempts,
                backoff_factor,
                max_delay: get_millis("CART_RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS)?,
            },
            request_timeout: Duration::from_secs(parse_number(
                "CART_REQUEST_TIMEOUT_SECS",
                &get_env_or_default(
                    "CART_REQUEST_TIMEOUT_SECS",
                    &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
                ),
            )?),
            row_fade: get_millis("CART_ROW_FADE_MS", DEFAULT_ROW_FADE_MS)?,
            empty_reload_delay: get_millis("CART_EMPTY_RELOAD_MS", DEFAULT_EMPTY_RELOAD_MS)?,
            currency_suffix: get_env_or_default("CART_CURRENCY_SUFFIX", DEFAULT_CURRENCY_SUFFIX),
            csrf_header: get_env_or_default("CART_CSRF_HEADER", DEFAULT_CSRF_HEADER),
            csrf_token: get_optional_env("CART_CSRF_TOKEN").map(SecretString::from),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a numeric environment value.
fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Read a millisecond duration with a default.
fn get_millis(key: &str, default: u64) -> Result<Duration, ConfigError> {
    get_optional_env(key)
        .map_or(Ok(default), |v| parse_number::<u64>(key, &v))
        .map(Duration::from_millis)
}

/// Parse an absolute URL.
fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
