//! Route handlers.
//!
//! Every gateway-backed route answers with the gateway's response envelope;
//! the HTTP status is derived from the envelope's error code.

use crate::server::AppState;
use aima_core::error::http_status_for_code;
use aima_core::gateway::generate_request_id;
use aima_core::{AimaError, Request, Response};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use governor::clock::{Clock, DefaultClock};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// Envelope helpers
// ============================================================================

fn header_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Decode a request body. Empty and `null` bodies carry no request.
fn parse_envelope(body: &[u8]) -> Result<Option<Request>, AimaError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body).map_err(|e| AimaError::InvalidRequest {
        message: format!("malformed JSON body: {}", e),
    })?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| AimaError::InvalidRequest {
            message: format!("invalid request envelope: {}", e),
        })
}

/// Fill transport-level fields the body did not set.
fn apply_headers(mut request: Request, headers: &HeaderMap) -> Request {
    if request.request_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
        request.request_id = header_request_id(headers);
    }
    if let Some(token) = bearer_token(headers) {
        request.credentials = Some(token);
    }
    request
}

fn envelope_response(response: Response) -> axum::response::Response {
    let status = response
        .error_code()
        .map(http_status_for_code)
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let mut http = (status, Json(&response)).into_response();
    if let Ok(value) = HeaderValue::from_str(&response.request_id) {
        http.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    http
}

fn failure(headers: &HeaderMap, err: &AimaError) -> axum::response::Response {
    let request_id = header_request_id(headers).unwrap_or_else(generate_request_id);
    envelope_response(Response::failure(request_id, err, 0))
}

// ============================================================================
// Middleware
// ============================================================================

/// Reject requests over the configured global rate with `RATE_LIMITED`.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    if let Some(limiter) = &state.limiter {
        if let Err(not_until) = limiter.check() {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            warn!("Rate limit exceeded on {}", request.uri().path());
            return failure(request.headers(), &AimaError::RateLimited { retry_after });
        }
    }
    next.run(request).await
}

// ============================================================================
// Routes
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/v2/execute`: run one request envelope through the gateway.
pub async fn handle_execute(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let request = match parse_envelope(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected request body: {}", e);
            return failure(&headers, &e);
        }
    };

    let request = request.map(|r| apply_headers(r, &headers));
    let bodyless = request.is_none();
    let mut response = state.api.handle(request).await;
    if bodyless {
        if let Some(id) = header_request_id(&headers) {
            response.request_id = id;
        }
    }
    envelope_response(response)
}

#[derive(Debug, Deserialize)]
pub struct UnitsParams {
    #[serde(default)]
    pub domain: Option<String>,
}

/// `GET /api/v2/units`: every registered unit, optionally one domain.
pub async fn handle_list_units(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UnitsParams>,
) -> impl IntoResponse {
    let registry = state.api.registry();
    let units = match params.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(domain) => registry.list_by_domain(domain),
        None => registry.describe_all(),
    };
    Json(json!({
        "units": units,
        "total": units.len(),
        "resources": registry.resource_uris(),
    }))
}

/// `GET /api/v2/units/:name`.
pub async fn handle_describe_unit(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    match state.api.registry().describe(&name) {
        Some(info) => Json(info).into_response(),
        None => failure(
            &headers,
            &AimaError::UnitNotFound {
                kind: "unit".to_string(),
                name,
            },
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResourceParams {
    #[serde(default)]
    pub uri: String,
}

/// `GET /api/v2/resources?uri=...`.
pub async fn handle_resource(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResourceParams>,
    headers: HeaderMap,
) -> axum::response::Response {
    if params.uri.trim().is_empty() {
        return failure(
            &headers,
            &AimaError::InvalidRequest {
                message: "uri query parameter is required".to_string(),
            },
        );
    }
    let request = apply_headers(Request::resource_get(params.uri), &headers);
    envelope_response(state.api.handle(Some(request)).await)
}
