use std::fmt;
use std::time::Duration;

use crate::errors::{ApiError, ErrorKind};

/// Environment variable consulted when no API key is given explicitly.
pub const API_KEY_ENV: &str = "SEARCHLINK_API_KEY";
/// Default service address.
pub const DEFAULT_BASE_URL: &str = "https://api.searchlink.dev";
/// Default deadline for one call, including full stream consumption.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Immutable per-client configuration, threaded through every call.
#[derive(Clone)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the service, without a trailing `/`.
    pub base_url: String,
    /// Deadline applied to each call.
    pub timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a config with defaults and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
        }
    }

    /// Builds a config from `SEARCHLINK_API_KEY`.
    pub fn from_env() -> Result<Self, ApiError> {
        Ok(Self::new(resolve_api_key(None)?))
    }

    /// Overrides the base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the default per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Resolves the credential from an explicit value or `SEARCHLINK_API_KEY`.
///
/// Fails with `AuthenticationError` when neither yields a non-blank key.
pub(crate) fn resolve_api_key(explicit: Option<String>) -> Result<String, ApiError> {
    explicit
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty())
        })
        .ok_or_else(|| {
            ApiError::new(
                ErrorKind::AuthenticationError,
                format!("missing API key: pass one explicitly or set {API_KEY_ENV}"),
            )
        })
}

fn default_user_agent() -> String {
    format!("searchlink-rust/{}", env!("CARGO_PKG_VERSION"))
}
