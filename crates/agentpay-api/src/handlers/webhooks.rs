//! Webhook ingestor
//!
//! Providers notify the gateway of terminal payment states here. The order
//! of operations is fixed: verify the HMAC signature against the raw bytes,
//! deduplicate on the provider's event identity, dispatch by event type,
//! and settle inside one transaction.
//!
//! Once the signature verifies, the answer is 200 — even when downstream
//! processing fails. A processing failure is parked in the dead-letter
//! store and reconciled out of band rather than asking the provider to
//! retry into the same failure.

use crate::error::{ApiError, ApiResult};
use crate::settlement::{settle_payment, SettlementOutcome, TerminalOutcome};
use crate::state::AppState;
use agentpay_crypto::{fingerprint, sha256_hex, verify_webhook_signature};
use agentpay_idempotency::Resolution;
use agentpay_types::{GatewayError, Rail};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// The schema every provider notification is validated into. Fields beyond
/// the ones dispatch needs are preserved opaquely for audit and never
/// consulted for logic.
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event_type: String,
    /// The provider's reference for the payment (`provider_ref` here)
    order_id: String,
    event_time: String,
    #[serde(flatten)]
    _extra: serde_json::Map<String, Value>,
}

fn ack(processed: bool) -> Value {
    json!({ "received": true, "processed": processed })
}

fn ok_json(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Path(rail): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let rail = Rail::parse(&rail).map_err(ApiError)?;

    let secret = state
        .settings
        .webhook_secrets
        .for_rail(rail)
        .ok_or_else(|| {
            GatewayError::configuration(format!("no webhook secret configured for rail {}", rail))
        })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError(GatewayError::Unauthorized))?;

    verify_webhook_signature(secret, signature, &body, Utc::now()).map_err(|err| {
        warn!(rail = %rail, error = %err, "webhook signature rejected");
        ApiError(GatewayError::Unauthorized)
    })?;

    // The signature has verified: from here on, the provider gets a 200.
    let route = format!("webhook:{}", rail.as_str());

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => {
            let event_id = format!("raw:{}", sha256_hex(&body));
            dead_letter(&state, rail, &event_id, &json!(null), &err.to_string()).await;
            return Ok(ok_json(ack(false).to_string()));
        }
    };

    let event: WebhookEvent = match serde_json::from_value(payload.clone()) {
        Ok(e) => e,
        Err(err) => {
            let event_id = format!("raw:{}", sha256_hex(&body));
            dead_letter(&state, rail, &event_id, &payload, &err.to_string()).await;
            return Ok(ok_json(ack(false).to_string()));
        }
    };

    let event_id = format!("{}:{}", event.order_id, event.event_time);

    match state
        .idempotency
        .begin(&route, &event_id, &fingerprint(&payload))
        .await
    {
        Ok(Resolution::Replay { body, .. }) => Ok(ok_json(body)),
        Ok(Resolution::Proceed) => {
            match process_event(&state, rail, &event).await {
                Ok(processed) => {
                    let body = ack(processed).to_string();
                    state
                        .idempotency
                        .complete(&route, &event_id, 200, &body)
                        .await
                        .map_err(ApiError)?;
                    Ok(ok_json(body))
                }
                Err(err) => {
                    // Park it and release the claim so an out-of-band
                    // redelivery can reprocess once the cause is fixed.
                    dead_letter(&state, rail, &event_id, &payload, &err.to_string()).await;
                    let _ = state.idempotency.release(&route, &event_id).await;
                    Ok(ok_json(ack(false).to_string()))
                }
            }
        }
        Err(err) => match err {
            // Another replica is mid-processing, or the same event id
            // arrived with a different body; either way the provider does
            // not need to retry.
            GatewayError::InFlightConflict | GatewayError::IdempotencyConflict => {
                warn!(rail = %rail, event_id = %event_id, code = err.error_code(), "webhook dedup conflict");
                Ok(ok_json(ack(false).to_string()))
            }
            other => {
                dead_letter(&state, rail, &event_id, &payload, &other.to_string()).await;
                Ok(ok_json(ack(false).to_string()))
            }
        },
    }
}

/// Dispatch one verified, deduplicated event. Returns whether the payment
/// was (or had already been) driven to its terminal state.
async fn process_event(state: &AppState, rail: Rail, event: &WebhookEvent) -> Result<bool, GatewayError> {
    let outcome = match event.event_type.as_str() {
        "PAYMENT_SUCCEEDED" => TerminalOutcome::Succeeded {
            settled_at: parse_event_time(&event.event_time),
        },
        "PAYMENT_FAILED" => TerminalOutcome::Failed,
        "PAYMENT_CANCELLED" => TerminalOutcome::Cancelled,
        other => {
            info!(rail = %rail, event_type = other, "ignoring unrecognized webhook event type");
            return Ok(false);
        }
    };

    let Some(payment) = state
        .db
        .payment_repo()
        .find_by_provider_ref(&event.order_id)
        .await?
    else {
        info!(
            rail = %rail,
            order_id = %event.order_id,
            "webhook for unknown provider reference; acknowledged"
        );
        return Ok(false);
    };

    if payment.rail != rail.as_str() {
        warn!(
            payment_id = %payment.id,
            expected = %payment.rail,
            got = %rail,
            "webhook arrived on the wrong rail; ignoring"
        );
        return Ok(false);
    }

    match settle_payment(state, payment.id, outcome, Some(&event.order_id)).await? {
        SettlementOutcome::Applied { .. } => Ok(true),
        SettlementOutcome::AlreadyTerminal => {
            info!(payment_id = %payment.id, "payment already terminal; acknowledged without mutation");
            Ok(true)
        }
        SettlementOutcome::NotFound => Ok(false),
    }
}

/// Provider timestamps ride along as RFC 3339; a malformed one falls back
/// to arrival time rather than dropping the settlement.
fn parse_event_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

async fn dead_letter(state: &AppState, rail: Rail, event_id: &str, payload: &Value, error: &str) {
    warn!(rail = %rail, event_id = %event_id, error = %error, "webhook processing failed; dead-lettering");
    if let Err(db_err) = state
        .db
        .dead_letter_repo()
        .insert(rail.as_str(), event_id, payload, error)
        .await
    {
        // Nothing left to do but log: the provider was already promised a
        // 200 and reconciliation will find the gap.
        tracing::error!(event_id = %event_id, error = %db_err, "failed to write webhook dead letter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_schema_tolerates_extra_fields() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "event_type": "PAYMENT_SUCCEEDED",
            "order_id": "order_abc",
            "event_time": "2025-03-14T10:00:00Z",
            "card_network": "visa",
            "nested": {"anything": true}
        }))
        .unwrap();
        assert_eq!(event.event_type, "PAYMENT_SUCCEEDED");
        assert_eq!(event.order_id, "order_abc");
    }

    #[test]
    fn test_event_schema_requires_identity_fields() {
        let missing: Result<WebhookEvent, _> = serde_json::from_value(json!({
            "event_type": "PAYMENT_SUCCEEDED"
        }));
        assert!(missing.is_err());
    }

    #[test]
    fn test_parse_event_time() {
        let t = parse_event_time("2025-03-14T10:00:00.500Z");
        assert_eq!(t.timestamp_millis() % 1000, 500);
        // Malformed input falls back to "now" rather than failing.
        let fallback = parse_event_time("not-a-time");
        assert!((Utc::now() - fallback).num_seconds().abs() < 5);
    }

    #[test]
    fn test_ack_shape() {
        assert_eq!(ack(true).to_string(), r#"{"processed":true,"received":true}"#);
    }
}
