//! Idempotent handler execution
//!
//! Wraps a mutating handler in the idempotency store: the first caller with
//! a key runs the handler and the `(status, body)` it produced is captured;
//! replays return the captured bytes verbatim. Errors that the client can
//! meaningfully retry (timeouts, store failures) release the claim instead
//! of capturing, so the retry re-enters the pipeline.

use crate::error::{error_parts, ApiError, ApiResult};
use crate::state::AppState;
use agentpay_crypto::fingerprint;
use agentpay_idempotency::Resolution;
use agentpay_types::GatewayError;
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::future::Future;

/// Header carrying the client-chosen idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Run `handler` under the idempotency store for `(route, key)`.
///
/// The handler returns the `(status, body)` pair to capture; the body is
/// serialized once and the stored text is what every replay returns.
pub async fn run_idempotent<F, Fut>(
    state: &AppState,
    route: &str,
    headers: &HeaderMap,
    payload: &Value,
    handler: F,
) -> ApiResult<Response>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<(StatusCode, Value)>>,
{
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError(GatewayError::MissingIdempotencyKey))?;

    let request_fingerprint = fingerprint(payload);

    match state
        .idempotency
        .begin(route, key, &request_fingerprint)
        .await
        .map_err(ApiError)?
    {
        Resolution::Replay { status_code, body } => {
            let status =
                StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(json_response(status, body))
        }
        Resolution::Proceed => match handler().await {
            Ok((status, value)) => {
                let body = value.to_string();
                state
                    .idempotency
                    .complete(route, key, status.as_u16(), &body)
                    .await
                    .map_err(ApiError)?;
                Ok(json_response(status, body))
            }
            Err(ApiError(err)) if err.is_retriable() => {
                // Do not capture: the client's retry should re-enter.
                let _ = state.idempotency.release(route, key).await;
                Err(ApiError(err))
            }
            Err(ApiError(err)) => {
                // Deterministic business failure: capture it so a replay of
                // the same request gets the same answer without re-running
                // the pipeline.
                let (status, envelope) = error_parts(&err);
                let body = envelope.to_string();
                state
                    .idempotency
                    .complete(route, key, status.as_u16(), &body)
                    .await
                    .map_err(ApiError)?;
                Ok(json_response(status, body))
            }
        },
    }
}
