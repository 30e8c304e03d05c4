//! Payment execution
//!
//! Executing a mandate: validate it is spendable, pick a rail, create the
//! payment row, call the provider, and translate its answer. A `pending`
//! provider answer is normal; the webhook settles it later.

use crate::auth::AuthenticatedAgent;
use crate::dto::{payment_response, ExecutePaymentRequest};
use crate::error::{ApiError, ApiResult};
use crate::idempotent::run_idempotent;
use crate::settlement::{settle_payment, TerminalOutcome};
use crate::state::AppState;
use agentpay_db::DbPayment;
use agentpay_rails::{
    select_rail, PaymentRequest, ProviderStatus, RailError, RouteContext, VendorEndpoint,
};
use agentpay_types::{GatewayError, Mandate, PaymentId, Rail};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const ROUTE: &str = "POST:/payments/execute";

pub async fn execute_payment(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    run_idempotent(&state, ROUTE, &headers, &payload, || async {
        let request: ExecutePaymentRequest = serde_json::from_value(payload.clone())
            .map_err(|e| ApiError(GatewayError::invalid_request(e.to_string())))?;

        let mandate = load_spendable_mandate(&state, &agent.id, request.mandate_id).await?;

        if !agent.is_active() {
            return Err(ApiError(GatewayError::AgentInactive {
                status: agent.status.as_str().to_string(),
            }));
        }

        let now = Utc::now();
        let policy = state
            .db
            .policy_repo()
            .find_active(*agent.id.as_uuid(), now)
            .await
            .map_err(GatewayError::from)?
            .ok_or(GatewayError::PolicyNotFound {
                agent_id: agent.id.to_string(),
            })?
            .into_domain()
            .map_err(GatewayError::from)?;

        // One live or settled payment at a time per mandate.
        if let Some(existing) = state
            .db
            .payment_repo()
            .find_blocking_for_mandate(*mandate.id.as_uuid())
            .await
            .map_err(GatewayError::from)?
        {
            return Err(ApiError(match existing.status.as_str() {
                "SETTLED" => GatewayError::MandateExhausted {
                    mandate_id: mandate.id.to_string(),
                },
                _ => GatewayError::invalid_request(format!(
                    "payment {} is already in flight for this mandate",
                    existing.id
                )),
            }));
        }

        // Pick the rail.
        let vendor_endpoint = state
            .db
            .vendor_endpoint_repo()
            .find_enabled(&mandate.vendor)
            .await
            .map_err(GatewayError::from)?;

        let decision = select_rail(&RouteContext {
            amount: mandate.amount.minor(),
            direct_max_amount: state.settings.direct_max_amount,
            rail_flags: policy.rail_flags,
            risk_tier: agent.risk_tier,
            has_direct_endpoint: vendor_endpoint.is_some(),
        });
        info!(
            mandate_id = %mandate.id,
            rail = %decision.rail,
            reason = decision.reason,
            "rail selected"
        );

        let payment_id = PaymentId::new();
        // The provider reference is fixed before the call so an async
        // webhook can always find the row.
        let provider_ref = match decision.rail {
            Rail::Card => format!("order_{}", payment_id.as_uuid().simple()),
            Rail::Direct => format!("direct_{}", payment_id.as_uuid().simple()),
        };

        let row = DbPayment {
            id: *payment_id.as_uuid(),
            mandate_id: *mandate.id.as_uuid(),
            agent_id: *agent.id.as_uuid(),
            rail: decision.rail.as_str().to_string(),
            rail_reason: decision.reason.to_string(),
            provider_ref: Some(provider_ref.clone()),
            amount: mandate.amount.minor(),
            currency: mandate.currency.code().to_string(),
            status: "PENDING".to_string(),
            settled_at: None,
            created_at: now,
        };
        state
            .db
            .payment_repo()
            .create(&row)
            .await
            .map_err(GatewayError::from)?;

        let adapter = state.rails.get(decision.rail).ok_or_else(|| {
            GatewayError::configuration(format!("rail {} is not configured", decision.rail))
        })?;

        let rail_request = PaymentRequest {
            payment_id: *payment_id.as_uuid(),
            mandate_id: *mandate.id.as_uuid(),
            agent_id: *agent.id.as_uuid(),
            vendor: mandate.vendor.clone(),
            amount: mandate.amount,
            currency: mandate.currency.clone(),
            metadata: request.metadata.unwrap_or_else(|| serde_json::json!({})),
            vendor_endpoint: vendor_endpoint.map(|e| VendorEndpoint {
                vendor: e.vendor,
                endpoint_url: e.endpoint_url,
                vendor_public_key: e.vendor_public_key,
            }),
        };

        let result = match adapter.execute(&rail_request).await {
            Ok(result) => result,
            Err(err) => return Err(translate_rail_failure(&state, &row, err).await),
        };

        let final_ref = result.provider_ref.unwrap_or(provider_ref);

        match result.status {
            ProviderStatus::Settled => {
                settle_payment(
                    &state,
                    *payment_id.as_uuid(),
                    TerminalOutcome::Succeeded { settled_at: Utc::now() },
                    Some(&final_ref),
                )
                .await
                .map_err(ApiError)?;
            }
            ProviderStatus::Pending => {
                state
                    .db
                    .payment_repo()
                    .mark_processing(*payment_id.as_uuid(), &final_ref)
                    .await
                    .map_err(GatewayError::from)?;
            }
            ProviderStatus::Failed => {
                state
                    .db
                    .payment_repo()
                    .mark_failed(*payment_id.as_uuid(), Some(&final_ref))
                    .await
                    .map_err(GatewayError::from)?;
                return Err(ApiError(GatewayError::PaymentDeclined {
                    reason: result
                        .error
                        .unwrap_or_else(|| "payment failed at provider".to_string()),
                }));
            }
        }

        let payment = state
            .db
            .payment_repo()
            .find_by_id(*payment_id.as_uuid())
            .await
            .map_err(GatewayError::from)?
            .ok_or_else(|| GatewayError::internal("payment vanished mid-execution"))?
            .into_domain()
            .map_err(GatewayError::from)?;

        Ok((StatusCode::CREATED, payment_response(&payment)))
    })
    .await
}

/// Load the mandate, enforce ownership, and persist a lazy expiry if its
/// window has passed
async fn load_spendable_mandate(
    state: &AppState,
    agent_id: &agentpay_types::AgentId,
    mandate_id: Uuid,
) -> Result<Mandate, ApiError> {
    let mandate = state
        .db
        .mandate_repo()
        .find_by_id(mandate_id)
        .await
        .map_err(GatewayError::from)?
        .ok_or(GatewayError::MandateNotFound {
            mandate_id: mandate_id.to_string(),
        })?
        .into_domain()
        .map_err(GatewayError::from)?;

    if mandate.agent_id != *agent_id {
        return Err(ApiError(GatewayError::Forbidden));
    }

    let now = Utc::now();
    if let Err(denial) = mandate.check_spendable(now) {
        if matches!(denial, GatewayError::MandateExpired { .. }) {
            state
                .db
                .mandate_repo()
                .update_status(mandate_id, "EXPIRED")
                .await
                .map_err(GatewayError::from)?;
        }
        return Err(ApiError(denial));
    }

    Ok(mandate)
}

/// Translate an adapter failure into the taxonomy, deciding what happens to
/// the payment row.
///
/// Declines are terminal and mark the payment FAILED. Timeouts and
/// exhausted retries leave it PENDING: the provider may still have acted,
/// and only its webhook (or reconciliation) knows the truth.
async fn translate_rail_failure(state: &AppState, payment: &DbPayment, err: RailError) -> ApiError {
    match &err {
        RailError::Declined { .. } | RailError::MissingContact { .. } | RailError::NoEndpoint { .. } => {
            if let Err(db_err) = state
                .db
                .payment_repo()
                .mark_failed(payment.id, payment.provider_ref.as_deref())
                .await
            {
                warn!(payment_id = %payment.id, error = %db_err, "failed to mark payment FAILED");
            }
        }
        RailError::Timeout { .. } | RailError::Provider { .. } => {
            warn!(
                payment_id = %payment.id,
                error = %err,
                "provider outcome unknown; payment left PENDING for webhook or reconciliation"
            );
        }
    }
    ApiError(err.into())
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let payment = state
        .db
        .payment_repo()
        .find_by_id(id)
        .await
        .map_err(GatewayError::from)?
        .ok_or(GatewayError::PaymentNotFound {
            payment_id: id.to_string(),
        })?
        .into_domain()
        .map_err(GatewayError::from)?;

    if payment.agent_id != agent.id {
        return Err(ApiError(GatewayError::Forbidden));
    }

    Ok(Json(payment_response(&payment)))
}
