//! Mandate handlers
//!
//! Issuing a mandate runs the policy gate; the successful answer carries
//! the signature material a third party needs to verify the authorization.

use crate::auth::AuthenticatedAgent;
use crate::dto::{mandate_response, CreateMandateRequest};
use crate::error::{ApiError, ApiResult};
use crate::idempotent::run_idempotent;
use crate::state::AppState;
use agentpay_types::GatewayError;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const ROUTE: &str = "POST:/mandates";

pub async fn create_mandate(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    run_idempotent(&state, ROUTE, &headers, &payload, || async {
        let request: CreateMandateRequest = serde_json::from_value(payload.clone())
            .map_err(|e| ApiError(GatewayError::invalid_request(e.to_string())))?;

        let intent = state
            .db
            .intent_repo()
            .find_by_id(request.intent_id)
            .await
            .map_err(GatewayError::from)?
            .ok_or(GatewayError::IntentNotFound {
                intent_id: request.intent_id.to_string(),
            })?
            .into_domain()
            .map_err(GatewayError::from)?;

        if intent.agent_id != agent.id {
            return Err(ApiError(GatewayError::Forbidden));
        }

        let mandate = state
            .gate
            .authorize(&agent, &intent, request.expires_in_hours)
            .await
            .map_err(ApiError)?;

        Ok((StatusCode::CREATED, mandate_response(&mandate)))
    })
    .await
}

pub async fn get_mandate(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut mandate = state
        .db
        .mandate_repo()
        .find_by_id(id)
        .await
        .map_err(GatewayError::from)?
        .ok_or(GatewayError::MandateNotFound {
            mandate_id: id.to_string(),
        })?
        .into_domain()
        .map_err(GatewayError::from)?;

    if mandate.agent_id != agent.id {
        return Err(ApiError(GatewayError::Forbidden));
    }

    // Expiry is time-derived; reads report it without waiting for the lazy
    // status write.
    mandate.status = mandate.effective_status(Utc::now());

    Ok(Json(mandate_response(&mandate)))
}
