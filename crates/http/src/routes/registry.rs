//! Listing of the message types accepted by registered services

use crate::{error::HttpError, state::AppState, types::RegistryResponse};
use axum::{
    Router,
    extract::{Request, State},
    response::Json,
    routing::get,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/registry", get(registry))
}

pub async fn registry(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<RegistryResponse>, HttpError> {
    let (parts, _) = request.into_parts();
    state.auth.authorize(&parts).await?;

    Ok(Json(RegistryResponse {
        types: state.registry.message_types(),
    }))
}
