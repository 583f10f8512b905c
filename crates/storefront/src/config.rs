//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required for login, logout and plan
//! - `CARTWHEEL_API_URL` - Base URL of the remote cart API (http or https)
//!
//! ## Optional
//! - `CARTWHEEL_DATA_DIR` - Directory for client storage (default: .cartwheel)
//! - `CARTWHEEL_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CARTWHEEL_PRESERVE_SERVER_IDS` - Keep server line ids on merge-in (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::cart::MergePolicy;

const DEFAULT_DATA_DIR: &str = ".cartwheel";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote cart API; local cart editing works without it
    pub api_url: Option<Url>,
    /// Directory holding client storage
    pub data_dir: PathBuf,
    /// Timeout applied to every cart API request
    pub request_timeout: Duration,
    /// What merge-in does with server line ids
    pub merge_policy: MergePolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_url = env
            .optional("CARTWHEEL_API_URL")
            .map(|raw| parse_api_url(&raw))
            .transpose()?;
        let data_dir = PathBuf::from(env.or_default("CARTWHEEL_DATA_DIR", DEFAULT_DATA_DIR));

        let timeout_secs = env
            .or_default("CARTWHEEL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| invalid("CARTWHEEL_REQUEST_TIMEOUT_SECS", e))?;
        if timeout_secs == 0 {
            return Err(invalid("CARTWHEEL_REQUEST_TIMEOUT_SECS", "must be positive"));
        }

        let merge_policy = if parse_bool(&env, "CARTWHEEL_PRESERVE_SERVER_IDS")? {
            MergePolicy::PreserveServerIds
        } else {
            MergePolicy::DropServerIds
        };

        Ok(Self {
            api_url,
            data_dir,
            request_timeout: Duration::from_secs(timeout_secs),
            merge_policy,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// The cart API URL, for operations that talk to the server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `CARTWHEEL_API_URL` is unset.
    pub fn require_api_url(&self) -> Result<&Url, ConfigError> {
        self.api_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTWHEEL_API_URL".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

fn invalid(key: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| invalid("CARTWHEEL_API_URL", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            "CARTWHEEL_API_URL",
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_bool<F: Fn(&str) -> Option<String>>(
    env: &Env<'_, F>,
    key: &str,
) -> Result<bool, ConfigError> {
    match env.optional(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(invalid(key, format!("expected a boolean, got '{other}'"))),
    }
}
