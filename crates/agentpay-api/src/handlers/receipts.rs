//! Receipt endpoints
//!
//! Receipts are read-only: listing in descending chain order, a joined
//! detail row (JSON or CSV), and on-demand verification of the caller's
//! whole chain.

use crate::auth::AuthenticatedAgent;
use crate::dto::{receipt_response, verification_response, ListQuery, ReceiptQuery};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use agentpay_db::DbReceiptDetail;
use agentpay_types::GatewayError;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let receipts = state
        .db
        .receipt_repo()
        .list_by_agent(*agent.id.as_uuid(), limit, offset)
        .await
        .map_err(GatewayError::from)?;

    let items: Vec<Value> = receipts
        .into_iter()
        .map(|r| receipt_response(&r.into_domain()))
        .collect();

    Ok(Json(json!({
        "receipts": items,
        "limit": limit,
        "offset": offset,
    })))
}

pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(id): Path<Uuid>,
    Query(query): Query<ReceiptQuery>,
) -> ApiResult<Response> {
    let detail = state
        .db
        .receipt_repo()
        .find_detail(id)
        .await
        .map_err(GatewayError::from)?
        .ok_or(GatewayError::ReceiptNotFound {
            receipt_id: id.to_string(),
        })?;

    if detail.agent_id != *agent.id.as_uuid() {
        return Err(ApiError(GatewayError::Forbidden));
    }

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(detail_json(&detail)).into_response()),
        Some("csv") => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv")],
            detail_csv(&detail),
        )
            .into_response()),
        Some(other) => Err(ApiError(GatewayError::validation(format!(
            "unsupported format {:?}; expected json or csv",
            other
        )))),
    }
}

pub async fn verify_chain(
    State(state): State<Arc<AppState>>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
) -> ApiResult<Json<Value>> {
    let verification = state
        .chainer
        .verify(*agent.id.as_uuid())
        .await
        .map_err(ApiError)?;
    Ok(Json(verification_response(&verification)))
}

fn detail_json(d: &DbReceiptDetail) -> Value {
    json!({
        "receipt_id": d.receipt_id,
        "agent_id": d.agent_id,
        "chain_index": d.chain_index,
        "prev_hash": d.prev_hash,
        "hash": d.hash,
        "created_at": d.receipt_created_at.to_rfc3339(),
        "payment": {
            "payment_id": d.payment_id,
            "mandate_id": d.mandate_id,
            "rail": d.rail,
            "provider_ref": d.provider_ref,
            "amount": d.amount,
            "currency": d.currency,
            "status": d.payment_status,
            "settled_at": d.settled_at.map(|t| t.to_rfc3339()),
        },
        "intent": {
            "intent_id": d.intent_id,
            "vendor": d.vendor,
            "description": d.description,
            "status": d.intent_status,
        },
    })
}

fn detail_csv(d: &DbReceiptDetail) -> String {
    let header = "receipt_id,chain_index,prev_hash,hash,payment_id,mandate_id,intent_id,vendor,rail,provider_ref,amount,currency,payment_status,settled_at";
    let row = [
        d.receipt_id.to_string(),
        d.chain_index.to_string(),
        d.prev_hash.clone().unwrap_or_default(),
        d.hash.clone(),
        d.payment_id.to_string(),
        d.mandate_id.to_string(),
        d.intent_id.to_string(),
        csv_field(&d.vendor),
        d.rail.clone(),
        d.provider_ref.clone().unwrap_or_default(),
        d.amount.to_string(),
        d.currency.clone(),
        d.payment_status.clone(),
        d.settled_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
    ]
    .join(",");
    format!("{}\n{}\n", header, row)
}

/// Quote a field that could carry separators
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn detail() -> DbReceiptDetail {
        DbReceiptDetail {
            receipt_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            prev_hash: None,
            hash: "sha256:abc".to_string(),
            chain_index: 0,
            receipt_created_at: Utc::now(),
            payment_id: Uuid::new_v4(),
            mandate_id: Uuid::new_v4(),
            rail: "direct".to_string(),
            provider_ref: Some("direct_x".to_string()),
            amount: 199,
            currency: "USD".to_string(),
            payment_status: "SETTLED".to_string(),
            settled_at: Some(Utc::now()),
            intent_id: Uuid::new_v4(),
            vendor: "v1".to_string(),
            description: String::new(),
            intent_status: "EXECUTED".to_string(),
        }
    }

    #[test]
    fn test_csv_has_header_and_one_row() {
        let csv = detail_csv(&detail());
        let lines: Vec<&str> = csv.trim_end().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("receipt_id,chain_index"));
        assert!(lines[1].contains("sha256:abc"));
    }

    #[test]
    fn test_csv_quotes_awkward_vendor_names() {
        let mut d = detail();
        d.vendor = "acme, inc".to_string();
        let csv = detail_csv(&d);
        assert!(csv.contains("\"acme, inc\""));
    }

    #[test]
    fn test_detail_json_nests_payment_and_intent() {
        let v = detail_json(&detail());
        assert_eq!(v["payment"]["status"], "SETTLED");
        assert_eq!(v["intent"]["vendor"], "v1");
        assert_eq!(v["chain_index"], 0);
    }
}
