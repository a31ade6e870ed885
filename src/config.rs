//! Configuration for background removal sessions.
//!
//! Every knob lives in [`RemovalConfig`], built via its
//! [`RemovalConfigBuilder`]. The session, the intake validator and the
//! remote client all read from the same struct, so a single config value
//! describes one deployment end to end.
//!
//! The API key is the only required external setting. It is optional in the
//! struct on purpose: a missing key must surface as a per-job
//! `ConfigurationError` when processing is attempted, not as a failure to
//! start the application.

use crate::error::BgRemoveError;
use std::fmt;

/// Default remove.bg endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Environment variable holding the remove.bg API key.
pub const API_KEY_ENV: &str = "REMOVEBG_API_KEY";

/// Environment variable overriding the endpoint (staging, local mocks).
pub const ENDPOINT_ENV: &str = "REMOVEBG_ENDPOINT";

const MIB: u64 = 1024 * 1024;

/// Configuration for a background-removal session.
///
/// # Example
/// ```rust
/// use edgequake_bgremove::RemovalConfig;
///
/// let config = RemovalConfig::builder()
///     .api_key("my-key")
///     .max_upload_mib(5)
///     .history_capacity(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
/// ```
#[derive(Clone)]
pub struct RemovalConfig {
    /// remove.bg API key, sent as `X-Api-Key`. Default: None.
    pub api_key: Option<String>,

    /// Endpoint receiving the multipart upload. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: u64,

    /// MIME prefix a file must declare to be accepted. Default: `image/`.
    pub accepted_mime_prefix: String,

    /// Value of the `size` form field. Default: `auto`.
    pub output_size: String,

    /// Number of results kept in the session history. Default: 10.
    pub history_capacity: usize,

    /// Per-request timeout in seconds. Default: 60.
    ///
    /// Covers upload, remote processing and download of the result. Large
    /// images on slow links can need more.
    pub api_timeout_secs: u64,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_upload_bytes: 10 * MIB,
            accepted_mime_prefix: "image/".to_string(),
            output_size: "auto".to_string(),
            history_capacity: 10,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for RemovalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemovalConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("accepted_mime_prefix", &self.accepted_mime_prefix)
            .field("output_size", &self.output_size)
            .field("history_capacity", &self.history_capacity)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl RemovalConfig {
    /// Create a new builder for `RemovalConfig`.
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, with the API key and endpoint taken from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint;
            }
        }
        config
    }

    /// The configured key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Builder for [`RemovalConfig`].
#[derive(Debug)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_upload_mib(mut self, mib: u64) -> Self {
        self.config.max_upload_bytes = mib.saturating_mul(MIB);
        self
    }

    pub fn accepted_mime_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.accepted_mime_prefix = prefix.into();
        self
    }

    pub fn output_size(mut self, size: impl Into<String>) -> Self {
        self.config.output_size = size.into();
        self
    }

    pub fn history_capacity(mut self, n: usize) -> Self {
        self.config.history_capacity = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RemovalConfig, BgRemoveError> {
        let c = &self.config;
        if c.history_capacity == 0 {
            return Err(BgRemoveError::InvalidConfig(
                "History capacity must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(BgRemoveError::InvalidConfig(
                "Maximum upload size must be > 0".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(BgRemoveError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(BgRemoveError::InvalidConfig(format!(
                "Endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        if c.output_size.trim().is_empty() {
            return Err(BgRemoveError::InvalidConfig("Output size must not be empty".into()));
        }
        Ok(self.config)
    }
}
