//! Request and response shapes
//!
//! Responses are built as `serde_json::Value` so the idempotency layer can
//! serialize them once and replay the stored bytes verbatim.

use agentpay_types::{ChainVerification, Mandate, Payment, PurchaseIntent, Receipt};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub vendor: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMandateRequest {
    pub intent_id: Uuid,
    pub expires_in_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct ExecutePaymentRequest {
    pub mandate_id: Uuid,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    #[serde(default)]
    pub format: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

pub fn intent_response(intent: &PurchaseIntent) -> Value {
    json!({
        "intent_id": intent.id,
        "agent_id": intent.agent_id,
        "vendor": intent.vendor,
        "amount": intent.amount,
        "currency": intent.currency,
        "description": intent.description,
        "metadata": intent.metadata,
        "status": intent.status,
        "created_at": intent.created_at.to_rfc3339(),
    })
}

pub fn mandate_response(mandate: &Mandate) -> Value {
    json!({
        "mandate_id": mandate.id,
        "intent_id": mandate.intent_id,
        "agent_id": mandate.agent_id,
        "policy_id": mandate.policy_id,
        "vendor": mandate.vendor,
        "amount": mandate.amount,
        "currency": mandate.currency,
        "signature": mandate.signature,
        "hash": mandate.mandate_hash,
        "public_key": mandate.public_key,
        "issued_at": mandate.issued_at.to_rfc3339(),
        "expires_at": mandate.expires_at.to_rfc3339(),
        "status": mandate.status,
    })
}

pub fn payment_response(payment: &Payment) -> Value {
    json!({
        "payment_id": payment.id,
        "mandate_id": payment.mandate_id,
        "agent_id": payment.agent_id,
        "rail": payment.rail,
        "rail_reason": payment.rail_reason,
        "provider_ref": payment.provider_ref,
        "amount": payment.amount,
        "currency": payment.currency,
        "status": payment.status,
        "settled_at": payment.settled_at.map(|t| t.to_rfc3339()),
        "created_at": payment.created_at.to_rfc3339(),
    })
}

pub fn receipt_response(receipt: &Receipt) -> Value {
    json!({
        "receipt_id": receipt.id,
        "payment_id": receipt.payment_id,
        "agent_id": receipt.agent_id,
        "prev_hash": receipt.prev_hash,
        "hash": receipt.hash,
        "chain_index": receipt.chain_index,
        "created_at": receipt.created_at.to_rfc3339(),
    })
}

pub fn verification_response(verification: &ChainVerification) -> Value {
    match verification.broken_at {
        Some(index) => json!({
            "valid": false,
            "length": verification.length,
            "broken_at": index,
        }),
        None => json!({
            "valid": true,
            "length": verification.length,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let q: ListQuery = serde_json::from_str("{}").unwrap();
        assert!(q.limit.is_none());
        assert!(q.offset.is_none());
    }

    #[test]
    fn test_verification_response_shapes() {
        let ok = verification_response(&ChainVerification::ok(3));
        assert_eq!(ok["valid"], true);
        assert!(ok.get("broken_at").is_none());

        let broken = verification_response(&ChainVerification::broken_at(2, 5));
        assert_eq!(broken["broken_at"], 2);
    }
}
