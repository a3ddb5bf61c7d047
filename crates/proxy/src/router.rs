//! Host-based routing of decrypted requests

use crate::config::{ListenerConfig, Route};
use crate::error::ProxyError;
use crate::forward::BackendForwarder;
use axum::{
    Router,
    extract::{Request, State},
    http::header,
    response::Response,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Maps the Host of each request to the backend port of a listener route
#[derive(Debug)]
pub struct DomainRouter {
    routes: Vec<Route>,
    forwarder: BackendForwarder,
}

impl DomainRouter {
    pub fn new(listener: &ListenerConfig, forwarder: BackendForwarder) -> Self {
        Self {
            routes: listener.routes.clone(),
            forwarder,
        }
    }

    /// Route serving `host`, ignoring any port suffix
    pub fn route_for(&self, host: &str) -> Option<&Route> {
        let host = strip_port(host);
        self.routes.iter().find(|route| route.matches(host))
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(proxy_request)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::new(self))
    }
}

async fn proxy_request(
    State(router): State<Arc<DomainRouter>>,
    request: Request,
) -> Result<Response, ProxyError> {
    let host = request_host(&request).unwrap_or_default();
    let Some(route) = router.route_for(&host) else {
        return Err(ProxyError::UnknownHost(host));
    };
    router.forwarder.forward(request, route.target_port).await
}

/// Host the client asked for: the Host header, else the URI authority (HTTP/2)
pub fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
        .map(str::to_string)
}

/// Drop a trailing `:port`. Bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
