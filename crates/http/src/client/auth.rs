//! Auth-adjacent endpoint methods

use crate::client::{ClientError, RestClient};
use crate::types::{
    AuthTokenResponse, CaptchaResponse, Credentials, RegistryResponse, TfaSetupRequest,
    TfaSetupResponse, TfaVerifyRequest, TfaVerifyResponse,
};
use reqwest::Method;
use serde_json::Value;

impl RestClient {
    /// Log in and keep the returned token for subsequent requests
    pub async fn auth(&self, user: &str, pass: &str) -> Result<AuthTokenResponse, ClientError> {
        let response: AuthTokenResponse = self
            .execute(Method::POST, "/auth", None, Some(&Credentials::new(user, pass)))
            .await?;
        if !response.token.is_empty() {
            self.set_token(response.token.clone());
        }
        Ok(response)
    }

    pub async fn captcha(&self) -> Result<String, ClientError> {
        let response: CaptchaResponse = self
            .execute::<(), _>(Method::GET, "/captcha", None, None)
            .await?;
        Ok(response.captcha)
    }

    pub async fn register(&self, user: &str, pass: &str, captcha: &str) -> Result<(), ClientError> {
        let credentials = Credentials {
            captcha: captcha.to_string(),
            ..Credentials::new(user, pass)
        };
        let _: Value = self
            .execute(Method::POST, "/register", None, Some(&credentials))
            .await?;
        Ok(())
    }

    pub async fn tfa_setup(&self, user_id: &str) -> Result<TfaSetupResponse, ClientError> {
        let request = TfaSetupRequest {
            user_id: user_id.to_string(),
        };
        self.execute(Method::POST, "/tfaSetup", None, Some(&request))
            .await
    }

    /// Verify a TFA code with the bearer token held by this client
    pub async fn tfa_verify(&self, user_id: &str, code: &str) -> Result<bool, ClientError> {
        let request = TfaVerifyRequest {
            user_id: user_id.to_string(),
            code: code.to_string(),
            bearer: self.token().unwrap_or_default(),
        };
        let response: TfaVerifyResponse = self
            .execute(Method::POST, "/tfaVerify", None, Some(&request))
            .await?;
        Ok(response.ok)
    }

    pub async fn registry(&self) -> Result<Vec<String>, ClientError> {
        let response: RegistryResponse = self
            .execute::<(), _>(Method::GET, "/registry", None, None)
            .await?;
        Ok(response.types)
    }
}
