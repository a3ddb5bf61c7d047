//! Forwarding of decrypted requests to backend ports

use crate::error::Result;
use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderName, HeaderValue, Uri, header},
    response::Response,
};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Environment variable overriding the backend host
pub const BACKEND_HOST_ENV: &str = "NODE_IP";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Host every backend port is reached on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHost(String);

impl BackendHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    /// `NODE_IP` when set and non-empty, `localhost` otherwise
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(BACKEND_HOST_ENV).ok())
    }

    /// Host from an optional override; blank values fall back to `localhost`
    pub fn from_value(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => Self::new(host),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BackendHost {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl fmt::Display for BackendHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // bare IPv6 literals need brackets inside a URL
        if self.0.contains(':') && !self.0.starts_with('[') {
            write!(f, "[{}]", self.0)
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Reverse-proxy client for one listener's backends.
///
/// Backends are always reached over TLS and their certificates are not
/// verified: they live on the same controlled network as the proxy.
#[derive(Debug, Clone)]
pub struct BackendForwarder {
    client: reqwest::Client,
    host: BackendHost,
}

impl BackendForwarder {
    pub fn new(host: BackendHost) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .no_gzip()
            .build()?;
        Ok(Self { client, host })
    }

    pub fn host(&self) -> &BackendHost {
        &self.host
    }

    pub fn backend_url(&self, target_port: u16, uri: &Uri) -> String {
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("https://{}:{target_port}{path}", self.host)
    }

    /// Send `request` to `target_port` on the backend host and stream the
    /// answer back
    #[instrument(
        name = "proxy.forward",
        skip_all,
        fields(
            target_port = target_port,
            method = %request.method(),
            path = %request.uri().path(),
        )
    )]
    pub async fn forward(&self, request: Request, target_port: u16) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let url = self.backend_url(target_port, &parts.uri);

        let original_host = parts.headers.get(header::HOST).cloned().or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
        });
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        if let Some(host) = original_host {
            headers.insert(X_FORWARDED_HOST, host);
        }
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        if let Some(ip) = peer {
            append_forwarded_for(&mut headers, ip);
        }

        let mut outbound = self.client.request(parts.method, &url).headers(headers);
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await?;
        debug!(status = %upstream.status(), "backend answered");

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Remove hop-by-hop headers, including those named by `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {ip}"),
        _ => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
