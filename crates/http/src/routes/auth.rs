//! Login, registration and two-factor endpoints
//!
//! Everything except `/auth` is a thin delegation to the primary network's
//! security provider.

use super::parse_body;
use crate::{error::HttpError, state::AppState, types::*};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", post(login))
        .route("/register", post(register))
        .route("/captcha", get(captcha).post(captcha))
        .route("/tfaSetup", post(tfa_setup))
        .route("/tfaSetupVerify", post(tfa_verify))
        .route("/tfaVerify", post(tfa_verify))
}

/// Authenticate credentials against the primary and every adjacent network
#[instrument(name = "login", skip_all)]
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, HttpError> {
    let credentials: Credentials = parse_body(&body)?;

    let outcome = match state.login.login(&credentials.user, &credentials.pass).await {
        Ok(outcome) => outcome,
        Err(e) => {
            info!(user = %credentials.user, "login rejected: {e}");
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(AuthTokenResponse::failed(e.to_string())),
            )
                .into_response());
        }
    };

    let cookie = bearer_cookie(
        &state.config.cookie_name,
        &outcome.token,
        state.config.cookie_max_age_secs,
    )?;
    let body = AuthTokenResponse {
        token: outcome.token,
        need_tfa: outcome.need_tfa,
        setup_tfa: outcome.setup_tfa,
        error: String::new(),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

fn bearer_cookie(name: &str, token: &str, max_age: u64) -> Result<HeaderValue, HttpError> {
    HeaderValue::from_str(&format!(
        "{name}={token}; Path=/; Max-Age={max_age}; HttpOnly; Secure; SameSite=Strict"
    ))
    .map_err(|e| HttpError::Internal(format!("token is not a valid cookie value: {e}")))
}

pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, HttpError> {
    let credentials: Credentials = parse_body(&body)?;
    state
        .security
        .register(&credentials.user, &credentials.pass, &credentials.captcha)
        .await
        .map_err(|e| HttpError::Rejected(e.to_string()))?;

    info!(user = %credentials.user, "user registered");
    Ok(Json(json!({})))
}

pub async fn captcha(State(state): State<AppState>) -> Result<Json<CaptchaResponse>, HttpError> {
    let captcha = state
        .security
        .captcha()
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))?;
    Ok(Json(CaptchaResponse { captcha }))
}

pub async fn tfa_setup(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TfaSetupResponse>, HttpError> {
    let request: TfaSetupRequest = parse_body(&body)?;
    let setup = state
        .security
        .tfa_setup(&request.user_id)
        .await
        .map_err(|e| HttpError::BadRequest(e.to_string()))?;

    Ok(Json(TfaSetupResponse {
        secret: setup.secret,
        qr: setup.qr,
    }))
}

/// Serves both `/tfaSetupVerify` and `/tfaVerify`
pub async fn tfa_verify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TfaVerifyResponse>, HttpError> {
    let request: TfaVerifyRequest = parse_body(&body)?;
    state
        .security
        .tfa_verify(&request.user_id, &request.code, &request.bearer)
        .await
        .map_err(|e| HttpError::Rejected(e.to_string()))?;

    Ok(Json(TfaVerifyResponse { ok: true }))
}
