//! Error types for the proxy

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// No route of the listener serves the requested host
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// The backend could not be reached or broke off the exchange
    #[error("Backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A listener's accept loop ended without an error
    #[error("Listener on port {0} stopped")]
    ListenerStopped(u16),

    #[error("Certificate error for {}: {message}", path.display())]
    Certificate { path: PathBuf, message: String },

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("TLS handshake timed out")]
    HandshakeTimeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub fn certificate(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Certificate {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            Self::UnknownHost(host) => {
                debug!(%host, "no route for host");
                (StatusCode::BAD_GATEWAY, "Unknown host.").into_response()
            }
            Self::Backend(_) | Self::Http(_) | Self::Io(_) => {
                warn!("backend exchange failed: {self}");
                (StatusCode::BAD_GATEWAY, "Bad gateway.").into_response()
            }
            other => {
                error!("proxy failure: {other}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = ProxyError::UnknownHost("x.dev".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(
            ProxyError::Io(io).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::HandshakeTimeout.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_certificate_message() {
        let err = ProxyError::certificate("/etc/certs/a.crt", "no certificates found");
        assert_eq!(
            err.to_string(),
            "Certificate error for /etc/certs/a.crt: no certificates found"
        );
    }
}
