//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// HTTP gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Portal API root, e.g. `https://portal.example.edu`.
    pub base_url: String,

    /// Bearer token sent on every request.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            auth_token: None,
            request_timeout_secs: 10,
            connect_timeout_secs: 3,
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Load from environment variables.
    ///
    /// - `CONTEST_API_URL`
    /// - `CONTEST_API_TOKEN`
    /// - `CONTEST_API_TIMEOUT_SECS`
    /// - `CONTEST_API_CONNECT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("CONTEST_API_URL").unwrap_or(defaults.base_url),
            auth_token: env::var("CONTEST_API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout_secs: env::var("CONTEST_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            connect_timeout_secs: env::var("CONTEST_API_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.connect_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
