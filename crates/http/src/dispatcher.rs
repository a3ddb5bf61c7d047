//! Dispatch of service endpoint requests into the overlay

use crate::error::HttpError;
use crate::state::AppState;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use edgegate_core::{
    Action, Addressing, MessageCodec, OverlayCall, OverlayError, WebService,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Fallback handler serving every registered `{prefix}{area}/{name}` path
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let Some(service) = state.registry.lookup(request.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match call_service(&state, service, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[instrument(
    name = "dispatch",
    skip_all,
    fields(
        service = %service.endpoint().service_name,
        area = service.endpoint().service_area,
        method = %request.method(),
    )
)]
async fn call_service(
    state: &AppState,
    service: Arc<WebService>,
    request: Request,
) -> Result<Response, HttpError> {
    let (parts, body) = request.into_parts();
    let identity = state.auth.authorize(&parts).await?;

    let data = read_body(&parts, body, state.config.max_body_bytes).await?;
    let codec = service.codec(&parts.method).ok_or_else(|| {
        HttpError::BadRequest(format!(
            "Cannot find message type for method {}",
            parts.method
        ))
    })?;
    let payload = codec
        .decode(&data)
        .map_err(|e| decode_error(state, &parts.method, codec.as_ref(), &data, e))?;

    let action = Action::for_request(&parts.method, payload.as_ref());
    let endpoint = service.endpoint();
    let timeout = state.config.timeout();
    let call = OverlayCall {
        service_name: endpoint.service_name.clone(),
        service_area: endpoint.service_area,
        action,
        payload,
        timeout,
        identity,
        addressing: Addressing::resolve(state.config.target.as_deref(), state.config.routing),
    };
    debug!(%action, addressing = ?call.addressing, "sending overlay request");

    let elements = match tokio::time::timeout(timeout, state.overlay.request(call)).await {
        Ok(Ok(elements)) => elements,
        Ok(Err(e)) => {
            warn!("overlay request failed: {e}");
            return Err(HttpError::BadRequest(e.to_string()));
        }
        Err(_) => {
            let e = OverlayError::Timeout(endpoint.to_string());
            warn!("{e}");
            return Err(HttpError::BadRequest(e.to_string()));
        }
    };

    let body = service
        .aggregator()
        .aggregate(&elements)
        .unwrap_or_else(|e| {
            warn!("failed to aggregate {} elements: {e}", elements.len());
            JsonValue::Object(serde_json::Map::new())
        });

    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Read the request body. GET requests without a body may carry it in the
/// `body` query parameter instead.
async fn read_body(parts: &Parts, body: Body, limit: usize) -> Result<Bytes, HttpError> {
    let data = axum::body::to_bytes(body, limit).await.map_err(|e| {
        HttpError::BadRequest(format!(
            "Failed to read body for method {}\n{e}",
            parts.method
        ))
    })?;

    if parts.method == Method::GET && data.is_empty() {
        let from_query = parts.uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "body")
                .map(|(_, value)| Bytes::from(value.into_owned()))
        });
        return Ok(from_query.unwrap_or(data));
    }

    Ok(data)
}

fn decode_error(
    state: &AppState,
    method: &Method,
    codec: &dyn MessageCodec,
    data: &[u8],
    error: serde_json::Error,
) -> HttpError {
    debug!(
        message_type = codec.type_name(),
        "failed to decode request body: {error}"
    );
    let mut text = format!(
        "Failed to decode body for method {method} as {}\n",
        codec.type_name()
    );
    if state.config.verbose_errors {
        text.push_str("body: ");
        text.push_str(&String::from_utf8_lossy(data));
        text.push('\n');
    }
    text.push_str(&error.to_string());
    HttpError::BadRequest(text)
}
