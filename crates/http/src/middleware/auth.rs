//! Caller authentication for service endpoints
//!
//! A caller presents a token in one of three places, checked in this order:
//! the `Authorization: Bearer` header, the bearer cookie, the `token` query
//! parameter. The first non-empty one is used and the others are ignored.
//! Without a token, the `X-USER-ID`/`X-API-KEY` header pair is accepted.

use crate::error::HttpError;
use crate::services::federation::{FederationMap, strip_bearer};
use axum::http::{HeaderMap, header, request::Parts};
use edgegate_core::{SecurityProvider, TokenValidation};
use std::sync::Arc;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extract the caller's token from a request
pub fn extract_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    bearer_header(&parts.headers)
        .or_else(|| cookie(&parts.headers, cookie_name))
        .or_else(|| query_token(parts.uri.query()))
}

/// Extract the `(user id, api key)` header pair
pub fn extract_api_key(headers: &HeaderMap) -> Option<(String, String)> {
    let user_id = non_empty_header(headers, USER_ID_HEADER)?;
    let api_key = non_empty_header(headers, API_KEY_HEADER)?;
    Some((user_id, api_key))
}

fn bearer_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, value)| key == "token" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn non_empty_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolves the identity behind a request
pub struct AuthResolver {
    enabled: bool,
    cookie_name: String,
    primary: Arc<dyn SecurityProvider>,
    adjacent: Arc<[Arc<dyn SecurityProvider>]>,
    federation: Arc<FederationMap>,
}

impl AuthResolver {
    pub fn new(
        enabled: bool,
        cookie_name: impl Into<String>,
        primary: Arc<dyn SecurityProvider>,
        adjacent: Arc<[Arc<dyn SecurityProvider>]>,
        federation: Arc<FederationMap>,
    ) -> Self {
        Self {
            enabled,
            cookie_name: cookie_name.into(),
            primary,
            adjacent,
            federation,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Identity of the caller, or `None` when authentication is disabled
    pub async fn authorize(&self, parts: &Parts) -> Result<Option<String>, HttpError> {
        if !self.enabled {
            return Ok(None);
        }
        self.resolve(parts).await.map(Some)
    }

    /// Identity of the caller, regardless of whether authentication is enabled
    pub async fn resolve(&self, parts: &Parts) -> Result<String, HttpError> {
        if let Some(token) = extract_token(parts, &self.cookie_name) {
            return self.validate_token(&token).await;
        }

        if let Some((user_id, api_key)) = extract_api_key(&parts.headers) {
            let validation = self.primary.validate_api_key(&user_id, &api_key).await;
            return accept(validation).inspect_err(|_| {
                debug!(user_id, "api key rejected");
            });
        }

        debug!(path = parts.uri.path(), "request without credentials");
        Err(HttpError::Unauthorized)
    }

    /// Validate a token directly, then through the federation map
    pub async fn validate_token(&self, token: &str) -> Result<String, HttpError> {
        match self.primary.validate_token(token).await {
            TokenValidation::Valid(identity) => return Ok(identity),
            TokenValidation::Invalid => {}
            pending => return accept(pending),
        }

        for federated in self.federation.lookup(strip_bearer(token)) {
            let Some(provider) = self.adjacent.get(federated.network) else {
                continue;
            };
            if let TokenValidation::Valid(identity) = provider.validate_token(&federated.token).await
            {
                debug!(network = provider.network(), "token accepted through federation");
                return Ok(identity);
            }
        }

        debug!("token rejected");
        Err(HttpError::Unauthorized)
    }
}

fn accept(validation: TokenValidation) -> Result<String, HttpError> {
    match validation {
        TokenValidation::Valid(identity) => Ok(identity),
        pending => match pending.tfa_sentinel() {
            Some(sentinel) => Err(HttpError::TfaPending(sentinel)),
            None => Err(HttpError::Unauthorized),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use edgegate_core::tests::InMemorySecurity;

    fn request_parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_header_wins_over_cookie_and_query() {
        let parts = request_parts(
            Request::get("/svc?token=C")
                .header(header::AUTHORIZATION, "Bearer B")
                .header(header::COOKIE, "bToken=A"),
        );
        assert_eq!(extract_token(&parts, "bToken").as_deref(), Some("B"));
    }

    #[test]
    fn test_cookie_wins_over_query() {
        let parts = request_parts(
            Request::get("/svc?token=C").header(header::COOKIE, "theme=dark; bToken=A"),
        );
        assert_eq!(extract_token(&parts, "bToken").as_deref(), Some("A"));
    }

    #[test]
    fn test_query_fallback() {
        let parts = request_parts(Request::get("/svc?x=1&token=C%3D"));
        assert_eq!(extract_token(&parts, "bToken").as_deref(), Some("C="));

        let parts = request_parts(Request::get("/svc?token="));
        assert_eq!(extract_token(&parts, "bToken"), None);
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        let parts = request_parts(Request::get("/svc").header(header::AUTHORIZATION, "bearer xyz"));
        assert_eq!(extract_token(&parts, "bToken").as_deref(), Some("xyz"));

        let parts = request_parts(Request::get("/svc").header(header::AUTHORIZATION, "Basic xyz"));
        assert_eq!(extract_token(&parts, "bToken"), None);
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let parts = request_parts(
            Request::get("/svc?token=C")
                .header(header::AUTHORIZATION, "Bearer ")
                .header(header::COOKIE, "bToken="),
        );
        assert_eq!(extract_token(&parts, "bToken").as_deref(), Some("C"));
    }

    fn resolver(
        primary: Arc<InMemorySecurity>,
        adjacent: Vec<Arc<dyn SecurityProvider>>,
    ) -> (AuthResolver, Arc<FederationMap>) {
        let federation = Arc::new(FederationMap::new());
        let resolver =
            AuthResolver::new(true, "bToken", primary, adjacent.into(), federation.clone());
        (resolver, federation)
    }

    #[tokio::test]
    async fn test_api_key_authentication() {
        let primary = Arc::new(InMemorySecurity::new("primary").with_api_key("svc-user", "k1"));
        let (resolver, _) = resolver(primary, Vec::new());

        let ok = request_parts(
            Request::get("/svc")
                .header("X-USER-ID", "svc-user")
                .header("X-API-KEY", "k1"),
        );
        assert_eq!(resolver.resolve(&ok).await.unwrap(), "svc-user");

        let bad = request_parts(
            Request::get("/svc")
                .header("X-USER-ID", "svc-user")
                .header("X-API-KEY", "nope"),
        );
        assert_eq!(resolver.resolve(&bad).await, Err(HttpError::Unauthorized));
    }

    #[tokio::test]
    async fn test_tfa_sentinel_surfaces() {
        let primary = Arc::new(InMemorySecurity::new("primary").with_tfa_setup_user("carol", "pw"));
        let token = primary.issue_token("carol");
        let (resolver, _) = resolver(primary, Vec::new());

        assert_eq!(
            resolver.validate_token(&token).await,
            Err(HttpError::TfaPending("Token Setup TFA"))
        );
    }

    #[tokio::test]
    async fn test_federated_token_is_validated_by_its_network() {
        let primary = Arc::new(InMemorySecurity::new("primary"));
        let east = Arc::new(InMemorySecurity::new("east"));
        let east_token = east.issue_token("alice");
        let adjacent = vec![east as Arc<dyn SecurityProvider>];
        let (resolver, federation) = resolver(primary, adjacent);

        federation.record("primary-token", 0, east_token);
        assert_eq!(
            resolver.validate_token("Bearer primary-token").await.unwrap(),
            "alice"
        );
        assert_eq!(
            resolver.validate_token("unknown").await,
            Err(HttpError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_disabled_resolver_skips_checks() {
        let primary = Arc::new(InMemorySecurity::new("primary"));
        let resolver = AuthResolver::new(
            false,
            "bToken",
            primary,
            Vec::<Arc<dyn SecurityProvider>>::new().into(),
            Arc::new(FederationMap::new()),
        );
        let parts = request_parts(Request::get("/svc"));
        assert_eq!(resolver.authorize(&parts).await, Ok(None));
    }
}
