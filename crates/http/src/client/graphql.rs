//! GraphQL client sharing the REST client's configuration and retry policy

use super::{ClientConfig, ClientError, build_http_client, send_with_retry, success_body};
use parking_lot::RwLock;
use reqwest::{Client, Method, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Default path of the GraphQL endpoint
pub const DEFAULT_ENDPOINT: &str = "/graphql";

const LOGIN_MUTATION: &str = "mutation Login($user: String!, $pass: String!) { \
     login(input: { user: $user, pass: $pass }) { token } }";

/// One GraphQL operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphQlResponse {
    pub data: Option<Value>,
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphQlError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphQlErrorLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlErrorLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginPayload {
    token: String,
}

impl GraphQlResponse {
    /// `data`, or `data[attribute]` when an attribute is named
    pub fn into_data(self, attribute: Option<&str>) -> Result<Value, ClientError> {
        if !self.errors.is_empty() {
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(ClientError::GraphQl(messages.join("; ")));
        }

        let data = self.data.unwrap_or(Value::Null);
        match attribute {
            None => Ok(data),
            Some(attribute) => match data {
                Value::Object(mut object) => object
                    .remove(attribute)
                    .ok_or_else(|| ClientError::MissingAttribute(attribute.to_string())),
                _ => Err(ClientError::MissingAttribute(attribute.to_string())),
            },
        }
    }
}

/// Client for a gateway's GraphQL endpoint
#[derive(Clone)]
pub struct GraphQlClient {
    client: Client,
    config: Arc<ClientConfig>,
    endpoint: String,
    token: Arc<RwLock<Option<String>>>,
}

impl GraphQlClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let token = config.token.clone();
        Ok(Self {
            client: build_http_client(&config)?,
            config: Arc::new(config),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: Arc::new(RwLock::new(token)),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// URL of the GraphQL endpoint, under the configured prefix
    pub fn url(&self) -> String {
        let mut url = self.config.base_url();
        url.push_str(self.config.prefix.trim_end_matches('/'));
        if !self.endpoint.starts_with('/') {
            url.push('/');
        }
        url.push_str(&self.endpoint);
        url
    }

    /// Run the login mutation and keep the returned token
    pub async fn auth(&self, user: &str, pass: &str) -> Result<String, ClientError> {
        let mut variables = Map::new();
        variables.insert("user".to_string(), Value::from(user));
        variables.insert("pass".to_string(), Value::from(pass));

        let payload: LoginPayload = self
            .execute(LOGIN_MUTATION, Some(variables), Some("login"))
            .await?;
        if payload.token.is_empty() {
            return Err(ClientError::AuthenticationFailed(
                "login returned no token".to_string(),
            ));
        }
        self.set_token(payload.token.clone());
        Ok(payload.token)
    }

    /// Send an operation and decode `data` (or `data[attribute]`) into `R`
    pub async fn execute<R: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Map<String, Value>>,
        attribute: Option<&str>,
    ) -> Result<R, ClientError> {
        let operation = GraphQlRequest {
            query: query.to_string(),
            variables,
        };

        let mut request = self
            .client
            .post(self.url())
            .header(header::ACCEPT, "application/json, text/plain, */*")
            .json(&operation);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        if let Some(api_key) = &self.config.api_key {
            request = request
                .header("X-USER-ID", &api_key.user_id)
                .header("X-API-KEY", &api_key.key);
        }

        let response =
            send_with_retry(request, self.config.retry, &Method::POST, &self.endpoint).await?;
        let bytes = success_body(response).await?;
        let response: GraphQlResponse = serde_json::from_slice(&bytes)?;

        Ok(serde_json::from_value(response.into_data(attribute)?)?)
    }

    pub async fn query<R: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Map<String, Value>>,
        attribute: Option<&str>,
    ) -> Result<R, ClientError> {
        self.execute(query, variables, attribute).await
    }

    pub async fn mutate<R: DeserializeOwned>(
        &self,
        mutation: &str,
        variables: Option<Map<String, Value>>,
        attribute: Option<&str>,
    ) -> Result<R, ClientError> {
        self.execute(mutation, variables, attribute).await
    }
}
