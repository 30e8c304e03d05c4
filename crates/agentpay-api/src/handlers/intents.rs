//! Purchase intent handlers
//!
//! Creating an intent is the only way a spend enters the system. The intent
//! is inert until a mandate is issued against it.

use crate::auth::AuthenticatedAgent;
use crate::dto::{intent_response, CreateIntentRequest};
use crate::error::{ApiError, ApiResult};
use crate::idempotent::run_idempotent;
use crate::state::AppState;
use agentpay_db::DbIntent;
use agentpay_types::{Amount, Currency, GatewayError, IntentId};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const ROUTE: &str = "POST:/purchase-intents";

pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    run_idempotent(&state, ROUTE, &headers, &payload, || async {
        let request: CreateIntentRequest = serde_json::from_value(payload.clone())
            .map_err(|e| ApiError(GatewayError::invalid_request(e.to_string())))?;

        if request.vendor.trim().is_empty() {
            return Err(ApiError(GatewayError::validation("vendor is required")));
        }
        let amount = Amount::from_minor(request.amount).map_err(ApiError)?;
        if amount.is_zero() {
            return Err(ApiError(GatewayError::validation(
                "amount must be greater than zero",
            )));
        }
        let currency = Currency::parse(&request.currency).map_err(ApiError)?;

        let row = DbIntent {
            id: *IntentId::new().as_uuid(),
            agent_id: *agent.id.as_uuid(),
            vendor: request.vendor.trim().to_string(),
            amount: amount.minor(),
            currency: currency.code().to_string(),
            description: request.description.unwrap_or_default(),
            metadata: request.metadata.unwrap_or_else(|| serde_json::json!({})),
            status: "PENDING".to_string(),
            created_at: chrono::Utc::now(),
        };

        let created = state
            .db
            .intent_repo()
            .create(&row)
            .await
            .map_err(GatewayError::from)?
            .into_domain()
            .map_err(GatewayError::from)?;

        tracing::info!(intent_id = %created.id, agent_id = %agent.id, "purchase intent created");

        Ok((StatusCode::CREATED, intent_response(&created)))
    })
    .await
}

pub async fn get_intent(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let intent = state
        .db
        .intent_repo()
        .find_by_id(id)
        .await
        .map_err(GatewayError::from)?
        .ok_or(GatewayError::IntentNotFound {
            intent_id: id.to_string(),
        })?
        .into_domain()
        .map_err(GatewayError::from)?;

    if intent.agent_id != agent.id {
        return Err(ApiError(GatewayError::Forbidden));
    }

    Ok(Json(intent_response(&intent)))
}
