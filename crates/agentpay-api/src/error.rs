//! API error handling
//!
//! Every error leaves the gateway in one envelope:
//! `{"success": false, "error": {"code", "message", "details?"}}` with the
//! HTTP status fixed by the taxonomy. Business errors keep their message;
//! infrastructure errors are logged with full context and surfaced with a
//! generic message plus an operator trace id.

use agentpay_types::GatewayError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

/// API error wrapper
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<agentpay_db::DbError> for ApiError {
    fn from(err: agentpay_db::DbError) -> Self {
        Self(err.into())
    }
}

/// Render an error into its `(status, envelope)` pair.
///
/// Shared between `IntoResponse` and the idempotency capture path, so a
/// replayed error body is byte-identical to the original.
pub fn error_parts(err: &GatewayError) -> (StatusCode, Value) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let (message, details) = if err.is_infrastructure() {
        let trace_id = Uuid::new_v4();
        error!(error = %err, trace_id = %trace_id, "infrastructure error");
        (
            "Internal error".to_string(),
            Some(json!({ "trace_id": trace_id })),
        )
    } else {
        (err.to_string(), err.details())
    };

    let mut envelope = json!({
        "success": false,
        "error": {
            "code": err.error_code(),
            "message": message,
        }
    });
    if let Some(details) = details {
        envelope["error"]["details"] = details;
    }

    (status, envelope)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, envelope) = error_parts(&self.0);
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_error_envelope() {
        let (status, envelope) = error_parts(&GatewayError::VendorNotAllowed {
            vendor: "v2".to_string(),
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"]["code"], "VENDOR_NOT_ALLOWED");
        assert!(envelope["error"]["message"]
            .as_str()
            .unwrap()
            .contains("v2"));
    }

    #[test]
    fn test_daily_limit_carries_details() {
        let (_, envelope) = error_parts(&GatewayError::DailyLimitExceeded { remaining: 200 });
        assert_eq!(envelope["error"]["details"]["remaining"], 200);
    }

    #[test]
    fn test_infrastructure_error_is_masked() {
        let (status, envelope) = error_parts(&GatewayError::database("password=hunter2 leaked"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope["error"]["message"], "Internal error");
        assert!(envelope["error"]["details"]["trace_id"].is_string());
        assert!(!envelope.to_string().contains("hunter2"));
    }
}
