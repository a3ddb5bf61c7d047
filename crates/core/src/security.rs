//! Security provider interface
//!
//! A security provider owns credentials, tokens, API keys and two-factor
//! state for one network. The gateway holds one provider per network: its
//! own, plus one for every adjacent network it federates logins with.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity placeholder returned when a token still needs TFA enrollment
pub const TFA_SETUP_REQUIRED: &str = "Token Setup TFA";

/// Identity placeholder returned when a token still needs TFA verification
pub const TFA_VERIFICATION_REQUIRED: &str = "Token Need TFA Verification";

/// Result of a username/password authentication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOutcome {
    pub token: String,
    pub need_tfa: bool,
    pub setup_tfa: bool,
}

/// Result of validating a bearer token or API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    /// The token is valid and maps to this identity
    Valid(String),
    /// Valid credentials, but TFA enrollment has not been completed
    SetupTfa,
    /// Valid credentials, but the TFA code has not been verified yet
    VerifyTfa,
    Invalid,
}

impl TokenValidation {
    /// Build a validation from the `(identity, ok)` pair a provider reports.
    ///
    /// Providers signal pending TFA by returning one of the sentinel strings
    /// as identity together with a negative flag.
    pub fn from_parts(identity: impl Into<String>, ok: bool) -> Self {
        let identity = identity.into();
        match (ok, identity.as_str()) {
            (true, _) => Self::Valid(identity),
            (false, TFA_SETUP_REQUIRED) => Self::SetupTfa,
            (false, TFA_VERIFICATION_REQUIRED) => Self::VerifyTfa,
            (false, _) => Self::Invalid,
        }
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Valid(identity) => Some(identity),
            _ => None,
        }
    }

    /// Sentinel text for a pending-TFA state
    pub fn tfa_sentinel(&self) -> Option<&'static str> {
        match self {
            Self::SetupTfa => Some(TFA_SETUP_REQUIRED),
            Self::VerifyTfa => Some(TFA_VERIFICATION_REQUIRED),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// TFA enrollment material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfaSetup {
    pub secret: String,
    /// QR code image bytes, base64 encoded
    pub qr: String,
}

#[async_trait]
pub trait SecurityProvider: Send + Sync {
    /// Network this provider authenticates for, used in logs
    fn network(&self) -> &str;

    async fn authenticate(&self, user: &str, pass: &str) -> Result<AuthOutcome, ProviderError>;

    async fn validate_token(&self, token: &str) -> TokenValidation;

    /// Validate a per-user API key. Providers without API keys reject all.
    async fn validate_api_key(&self, _user_id: &str, _api_key: &str) -> TokenValidation {
        TokenValidation::Invalid
    }

    async fn tfa_setup(&self, user_id: &str) -> Result<TfaSetup, ProviderError>;

    async fn tfa_verify(&self, user_id: &str, code: &str, bearer: &str)
    -> Result<(), ProviderError>;

    async fn register(&self, user: &str, pass: &str, captcha: &str) -> Result<(), ProviderError>;

    /// Issue a new captcha challenge
    async fn captcha(&self) -> Result<String, ProviderError>;
}
