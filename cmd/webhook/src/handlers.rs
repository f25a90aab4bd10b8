use crate::admission;
use crate::state::WebhookState;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Whether the request declares a JSON body. Parameters such as `charset` are ignored.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}

pub async fn validate(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty body").into_response();
    }
    if !is_json(&headers) {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("expected Content-Type {JSON_MEDIA_TYPE}"),
        )
            .into_response();
    }

    let review = admission::review(&state.validator, state.metrics.as_ref(), &body);
    match serde_json::to_vec(&review) {
        Ok(encoded) => ([(CONTENT_TYPE, JSON_MEDIA_TYPE)], encoded).into_response(),
        Err(e) => {
            error!(msg = "failed to encode admission review", %e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode admission review: {e}"),
            )
                .into_response()
        }
    }
}

pub async fn livez() -> &'static str {
    "healthy"
}

pub async fn readyz(State(state): State<WebhookState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

pub async fn metrics(State(state): State<WebhookState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        state
            .exporter
            .get_metrics()
            .unwrap_or_else(|| "# EOF\n".to_string()),
    )
}
