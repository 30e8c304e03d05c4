//! Database models - mapped from PostgreSQL tables
//!
//! Each `Db*` struct mirrors one row shape. Conversions into the domain
//! types live here so status strings are parsed in exactly one place.

use crate::error::{DbError, DbResult};
use agentpay_types::{
    Agent, AgentStatus, Amount, Currency, IntentStatus, Mandate, MandateStatus, Payment,
    PaymentStatus, PurchaseIntent, Rail, RailFlags, Receipt, RiskTier,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Agent / Policy
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAgent {
    pub id: Uuid,
    pub status: String,
    pub risk_tier: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

impl DbAgent {
    pub fn into_domain(self) -> DbResult<Agent> {
        Ok(Agent {
            id: self.id.into(),
            status: AgentStatus::parse(&self.status).map_err(|e| DbError::Decode(e.to_string()))?,
            risk_tier: RiskTier::parse(&self.risk_tier)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            public_key: self.public_key,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPolicy {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub version: i32,
    pub vendor_allowlist: Vec<String>,
    pub amount_cap: i64,
    pub daily_cap: i64,
    pub risk_tier: String,
    pub rail_flags: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DbPolicy {
    pub fn into_domain(self) -> DbResult<agentpay_types::Policy> {
        let rail_flags: RailFlags = serde_json::from_value(self.rail_flags)
            .map_err(|e| DbError::Decode(format!("rail_flags: {}", e)))?;
        Ok(agentpay_types::Policy {
            id: self.id.into(),
            agent_id: self.agent_id.into(),
            version: self.version,
            vendor_allowlist: self.vendor_allowlist,
            amount_cap: Amount::from_minor(self.amount_cap)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            daily_cap: Amount::from_minor(self.daily_cap)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            risk_tier: RiskTier::parse(&self.risk_tier)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            rail_flags,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

// ============================================================================
// Intent / Mandate / Payment
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbIntent {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub vendor: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl DbIntent {
    pub fn into_domain(self) -> DbResult<PurchaseIntent> {
        Ok(PurchaseIntent {
            id: self.id.into(),
            agent_id: self.agent_id.into(),
            vendor: self.vendor,
            amount: Amount::from_minor(self.amount).map_err(|e| DbError::Decode(e.to_string()))?,
            currency: Currency::parse(&self.currency)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            description: self.description,
            metadata: self.metadata,
            status: IntentStatus::parse(&self.status)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbMandate {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub agent_id: Uuid,
    pub policy_id: Uuid,
    pub vendor: String,
    pub amount: i64,
    pub currency: String,
    pub signature: String,
    pub mandate_hash: String,
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
}

impl DbMandate {
    pub fn into_domain(self) -> DbResult<Mandate> {
        Ok(Mandate {
            id: self.id.into(),
            intent_id: self.intent_id.into(),
            agent_id: self.agent_id.into(),
            policy_id: self.policy_id.into(),
            vendor: self.vendor,
            amount: Amount::from_minor(self.amount).map_err(|e| DbError::Decode(e.to_string()))?,
            currency: Currency::parse(&self.currency)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            signature: self.signature,
            mandate_hash: self.mandate_hash,
            public_key: self.public_key,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            status: MandateStatus::parse(&self.status)
                .map_err(|e| DbError::Decode(e.to_string()))?,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPayment {
    pub id: Uuid,
    pub mandate_id: Uuid,
    pub agent_id: Uuid,
    pub rail: String,
    pub rail_reason: String,
    pub provider_ref: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DbPayment {
    pub fn into_domain(self) -> DbResult<Payment> {
        Ok(Payment {
            id: self.id.into(),
            mandate_id: self.mandate_id.into(),
            agent_id: self.agent_id.into(),
            rail: Rail::parse(&self.rail).map_err(|e| DbError::Decode(e.to_string()))?,
            rail_reason: self.rail_reason,
            provider_ref: self.provider_ref,
            amount: Amount::from_minor(self.amount).map_err(|e| DbError::Decode(e.to_string()))?,
            currency: Currency::parse(&self.currency)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            status: PaymentStatus::parse(&self.status)
                .map_err(|e| DbError::Decode(e.to_string()))?,
            settled_at: self.settled_at,
            created_at: self.created_at,
        })
    }
}

// ============================================================================
// Receipt chain
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbReceipt {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub agent_id: Uuid,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub chain_index: i64,
    pub created_at: DateTime<Utc>,
}

impl DbReceipt {
    pub fn into_domain(self) -> Receipt {
        Receipt {
            id: self.id.into(),
            payment_id: self.payment_id.into(),
            agent_id: self.agent_id.into(),
            prev_hash: self.prev_hash,
            hash: self.hash,
            chain_index: self.chain_index,
            created_at: self.created_at,
        }
    }
}

/// Receipt joined down to its payment and intent; the audit row the
/// receipt detail endpoint serves.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbReceiptDetail {
    pub receipt_id: Uuid,
    pub agent_id: Uuid,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub chain_index: i64,
    pub receipt_created_at: DateTime<Utc>,
    pub payment_id: Uuid,
    pub mandate_id: Uuid,
    pub rail: String,
    pub provider_ref: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub payment_status: String,
    pub settled_at: Option<DateTime<Utc>>,
    pub intent_id: Uuid,
    pub vendor: String,
    pub description: String,
    pub intent_status: String,
}

/// Receipt joined with the payment fields its hash commits to; the shape
/// chain verification walks.
#[derive(Debug, Clone, FromRow)]
pub struct DbReceiptWithPayment {
    pub chain_index: i64,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub payment_id: Uuid,
    pub mandate_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub settled_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Idempotency / vendor endpoints / dead letters
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbIdempotencyRecord {
    pub route: String,
    pub key: String,
    pub request_fingerprint: String,
    pub status: String,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbVendorEndpoint {
    pub vendor: String,
    pub endpoint_url: String,
    pub vendor_public_key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbDeadLetter {
    pub id: Uuid,
    pub rail: String,
    pub event_id: String,
    pub payload: serde_json::Value,
    pub error: String,
    pub created_at: DateTime<Utc>,
}
