//! Wire types of the gateway's auth-adjacent endpoints
//!
//! Field names are camelCase on the wire and every field is optional when
//! decoding, matching what browser clients send.

use serde::{Deserialize, Serialize};

/// Body of `/auth` and `/register`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Credentials {
    pub user: String,
    pub pass: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub captcha: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
            captcha: String::new(),
        }
    }
}

/// Response of `/auth`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthTokenResponse {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    pub need_tfa: bool,
    pub setup_tfa: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl AuthTokenResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TfaSetupRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TfaSetupResponse {
    pub secret: String,
    pub qr: String,
}

/// Body of `/tfaSetupVerify` and `/tfaVerify`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TfaVerifyRequest {
    pub user_id: String,
    pub code: String,
    pub bearer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TfaVerifyResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptchaResponse {
    pub captcha: String,
}

/// Response of `/registry`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryResponse {
    pub types: Vec<String>,
}
