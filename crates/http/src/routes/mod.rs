//! Gateway-level endpoints that are not overlay services

pub mod auth;
pub mod registry;

use crate::{error::HttpError, state::AppState};
use axum::{Router, body::Bytes};
use serde::de::DeserializeOwned;

/// Routes served next to the service endpoints
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(registry::router())
}

/// Decode a JSON request body. An empty body yields the default value.
pub(crate) fn parse_body<T>(body: &Bytes) -> Result<T, HttpError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        HttpError::BadRequest(format!(
            "Failed to decode body as {}\n{e}",
            edgegate_core::message::short_type_name::<T>()
        ))
    })
}
