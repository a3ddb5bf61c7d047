//! REST and GraphQL clients for edgegate services

pub mod auth;
pub mod config;
pub mod error;
pub mod graphql;

pub use config::{ApiKey, ClientConfig, RetryPolicy};
pub use error::ClientError;
pub use graphql::{GraphQlClient, GraphQlError, GraphQlRequest, GraphQlResponse};

use parking_lot::RwLock;
use reqwest::{Certificate, Client, ClientBuilder, Method, header};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// Endpoints served at the gateway root rather than under the prefix
const ROOT_PATHS: &[&str] = &[
    "/auth",
    "/register",
    "/captcha",
    "/tfaSetup",
    "/tfaSetupVerify",
    "/tfaVerify",
    "/registry",
];

/// Client for a gateway's service and auth endpoints
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    config: Arc<ClientConfig>,
    token: Arc<RwLock<Option<String>>>,
}

impl RestClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let token = config.token.clone();
        Ok(Self {
            client: build_http_client(&config)?,
            config: Arc::new(config),
            token: Arc::new(RwLock::new(token)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// Full URL of `path`. The prefix is applied to service paths only.
    pub fn url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = self.config.base_url();
        if !ROOT_PATHS.contains(&path) {
            url.push_str(self.config.prefix.trim_end_matches('/'));
        }
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query.trim_start_matches('?'));
        }
        url
    }

    fn request(&self, method: Method, path: &str, query: Option<&str>) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, self.url(path, query))
            .header(header::ACCEPT, "application/json, text/plain, */*");

        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        if let Some(api_key) = &self.config.api_key {
            request = request
                .header("X-USER-ID", &api_key.user_id)
                .header("X-API-KEY", &api_key.key);
        }
        request
    }

    /// Send a request, retrying transient transport failures
    pub async fn execute<B, R>(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<&B>,
    ) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.request(method.clone(), path, query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = send_with_retry(request, self.config.retry, &method, path).await?;
        let bytes = success_body(response).await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<R, ClientError> {
        self.execute::<(), R>(Method::GET, path, query, None).await
    }

    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ClientError> {
        self.execute(Method::POST, path, None, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ClientError> {
        self.execute(Method::PUT, path, None, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ClientError> {
        self.execute(Method::PATCH, path, None, Some(body)).await
    }

    pub async fn delete<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ClientError> {
        self.execute(Method::DELETE, path, None, Some(body)).await
    }
}

/// reqwest client honouring the timeout and TLS settings of `config`
pub(crate) fn build_http_client(config: &ClientConfig) -> Result<Client, ClientError> {
    let mut builder = ClientBuilder::new()
        .user_agent(concat!("edgegate-client/", env!("CARGO_PKG_VERSION")))
        .gzip(true);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    if config.https {
        builder = match &config.ca_cert_file {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    ClientError::Configuration(format!("{}: {e}", path.display()))
                })?;
                builder.add_root_certificate(Certificate::from_pem(&pem)?)
            }
            None => builder.danger_accept_invalid_certs(true),
        };
    }

    Ok(builder.build()?)
}

/// Send `request`, retrying transient transport failures per `retry`
pub(crate) async fn send_with_retry(
    request: reqwest::RequestBuilder,
    retry: RetryPolicy,
    method: &Method,
    path: &str,
) -> Result<reqwest::Response, ClientError> {
    let mut attempt = 1;
    loop {
        let Some(this_try) = request.try_clone() else {
            return Ok(request.send().await?);
        };
        match this_try.send().await.map_err(ClientError::from) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < retry.attempts => {
                warn!(
                    %method,
                    path,
                    attempt,
                    "transient failure, retrying in {:?}: {e}",
                    retry.backoff
                );
                attempt += 1;
                tokio::time::sleep(retry.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Body of a 2xx response; other statuses become a [`ClientError`]
pub(crate) async fn success_body(response: reqwest::Response) -> Result<Vec<u8>, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        let message = String::from_utf8_lossy(&bytes).into_owned();
        return Err(ClientError::from_status(status, message));
    }
    Ok(bytes.to_vec())
}
