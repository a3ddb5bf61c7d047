//! Integration tests for the REST client

#![cfg(feature = "client")]

use edgegate_http::client::{ApiKey, ClientConfig, ClientError, RestClient, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Flow {
    id: String,
    bytes: u64,
}

fn client_for(server: &MockServer, prefix: &str) -> RestClient {
    RestClient::new(ClientConfig {
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        https: false,
        prefix: prefix.to_string(),
        retry: RetryPolicy::none(),
        ..ClientConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_auth_stores_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_json(json!({"user": "alice", "pass": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1",
            "needTfa": false,
            "setupTfa": false
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/probler/3/Flows"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f1", "bytes": 42})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, "/probler/");
    let response = client.auth("alice", "secret").await.unwrap();
    assert_eq!(response.token, "tok-1");
    assert!(!response.need_tfa);
    assert_eq!(client.token().as_deref(), Some("tok-1"));

    let flow: Flow = client
        .post("/3/Flows", &Flow {
            id: "f1".into(),
            bytes: 42,
        })
        .await
        .unwrap();
    assert_eq!(flow.bytes, 42);
}

#[tokio::test]
async fn test_get_with_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/Flows"))
        .and(query_param("body", r#"{"text":"select * from Flows"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, "");
    let body: serde_json::Value = client
        .get(
            "/3/Flows",
            Some("body=%7B%22text%22%3A%22select%20*%20from%20Flows%22%7D"),
        )
        .await
        .unwrap();
    assert_eq!(body, json!({"list": []}));
}

#[tokio::test]
async fn test_api_key_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/3/Flows"))
        .and(header("x-user-id", "robot"))
        .and(header("x-api-key", "k-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RestClient::new(ClientConfig {
        host: "127.0.0.1".to_string(),
        port: mock_server.address().port(),
        https: false,
        api_key: Some(ApiKey {
            user_id: "robot".to_string(),
            key: "k-1".to_string(),
        }),
        retry: RetryPolicy::none(),
        ..ClientConfig::default()
    })
    .unwrap();

    // an empty body decodes as null
    let body: Option<Flow> = client.delete("/3/Flows", &json!({})).await.unwrap();
    assert_eq!(body, None);
}

#[tokio::test]
async fn test_tfa_sentinel_is_authentication_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/3/Flows"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Token Need TFA Verification"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, "");
    let result: Result<Flow, _> = client.put("/3/Flows", &Flow::default()).await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => {
            assert_eq!(message, "Token Need TFA Verification")
        }
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_status_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/3/Flows"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RestClient::new(ClientConfig {
        host: "127.0.0.1".to_string(),
        port: mock_server.address().port(),
        https: false,
        retry: RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(10),
        },
        ..ClientConfig::default()
    })
    .unwrap();

    let result: Result<Flow, _> = client.patch("/3/Flows", &Flow::default()).await;
    assert!(matches!(
        result,
        Err(ClientError::ServerError { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_refused_connection_is_retried() {
    // reserve a port and release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = RestClient::new(ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        https: false,
        retry: RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(50),
        },
        ..ClientConfig::default()
    })
    .unwrap();

    let started = Instant::now();
    let error = client
        .get::<serde_json::Value>("/3/Flows", None)
        .await
        .unwrap_err();
    assert!(error.is_transient(), "{error}");
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_captcha_register_and_registry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/captcha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"captcha": "c-1"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_json(json!({"user": "dave", "pass": "pw", "captcha": "c-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/registry"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"types": ["Flow", "Query"]})),
        )
        .mount(&mock_server)
        .await;

    // the prefix never applies to gateway-level endpoints
    let client = client_for(&mock_server, "/probler/");
    let captcha = client.captcha().await.unwrap();
    assert_eq!(captcha, "c-1");
    client.register("dave", "pw", &captcha).await.unwrap();
    assert_eq!(client.registry().await.unwrap(), vec!["Flow", "Query"]);
}

#[tokio::test]
async fn test_tfa_verify_sends_held_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tfaVerify"))
        .and(body_json(json!({"userId": "bob", "code": "123456", "bearer": "tok-9"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tfaSetup"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"secret": "S", "qr": "iVBO"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, "");
    client.set_token("tok-9");
    assert!(client.tfa_verify("bob", "123456").await.unwrap());

    let setup = client.tfa_setup("bob").await.unwrap();
    assert_eq!(setup.secret, "S");
    assert_eq!(setup.qr, "iVBO");
}
