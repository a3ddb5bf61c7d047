//! REST client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Credentials sent as `X-USER-ID`/`X-API-KEY` headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub user_id: String,
    pub key: String,
}

/// Retry schedule for transient transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub https: bool,
    /// Path prefix of service endpoints; not applied to `/auth`
    pub prefix: String,
    /// CA certificate to verify the server with. Without one, HTTPS
    /// connections accept any certificate.
    pub ca_cert_file: Option<PathBuf>,
    pub token: Option<String>,
    pub api_key: Option<ApiKey>,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 443,
            https: true,
            prefix: String::new(),
            ca_cert_file: None,
            token: None,
            api_key: None,
            timeout: Some(Duration::from_secs(30)),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}
