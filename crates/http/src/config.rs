//! Gateway configuration

use ::config::ConfigError;
use edgegate_core::{RoutingMethod, ValidateConfig, validators};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the cookie carrying the bearer token
pub const BEARER_COOKIE: &str = "bToken";

/// Settings of one HTTP gateway instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Path prefix of service endpoints, e.g. `/probler/`
    pub prefix: String,
    /// Require a valid token (or API key) on service endpoints and `/registry`
    pub authentication: bool,
    /// Overlay call timeout in seconds
    pub timeout_secs: u64,
    /// Fixed overlay node to address; overrides `routing` when set
    pub target: Option<String>,
    pub routing: RoutingMethod,
    /// Echo the raw payload in 400 diagnostics
    pub verbose_errors: bool,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    pub cookie_name: String,
    /// Lifetime of the bearer cookie in seconds
    pub cookie_max_age_secs: u64,
    /// PEM certificate chain; with `key_file`, the gateway serves HTTPS
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            authentication: false,
            timeout_secs: 30,
            target: None,
            routing: RoutingMethod::Leader,
            verbose_errors: true,
            max_body_bytes: 16 * 1024 * 1024,
            cookie_name: BEARER_COOKIE.to_string(),
            cookie_max_age_secs: 86_400,
            cert_file: None,
            key_file: None,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Certificate and key paths, when both are configured
    pub fn tls_files(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.cert_file.as_ref().zip(self.key_file.as_ref())
    }
}

impl ValidateConfig for GatewayConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validators::validate_not_empty(&self.prefix, "gateway.prefix")?;
        if !self.prefix.starts_with('/') || !self.prefix.ends_with('/') {
            return Err(ConfigError::Message(format!(
                "gateway.prefix: '{}' must start and end with '/'",
                self.prefix
            )));
        }
        validators::validate_range(self.timeout_secs, 1, 3600, "gateway.timeout_secs")?;
        validators::validate_range(self.max_body_bytes, 1, usize::MAX, "gateway.max_body_bytes")?;
        validators::validate_not_empty(&self.cookie_name, "gateway.cookie_name")?;
        if self.cert_file.is_some() != self.key_file.is_some() {
            return Err(ConfigError::Message(
                "gateway.cert_file and gateway.key_file must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
