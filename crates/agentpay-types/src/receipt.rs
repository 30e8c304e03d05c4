//! Receipt chain types for AgentPay
//!
//! A receipt is the append-only, hash-chained record of one settled payment.
//! Receipts are never mutated or deleted; the chain is the audit trail.

use crate::{AgentId, PaymentId, ReceiptId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One link in a per-agent receipt chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub payment_id: PaymentId,
    pub agent_id: AgentId,
    /// `None` for the first receipt of an agent; otherwise the previous
    /// receipt's full `sha256:`-prefixed hash
    pub prev_hash: Option<String>,
    /// `sha256:`-prefixed hash of the canonical receipt body
    pub hash: String,
    /// Contiguous per-agent sequence, starting at 0
    pub chain_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of verifying one agent's receipt chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    /// Number of receipts examined
    pub length: i64,
    /// First chain index at which a discrepancy was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<i64>,
}

impl ChainVerification {
    pub fn ok(length: i64) -> Self {
        Self {
            valid: true,
            length,
            broken_at: None,
        }
    }

    pub fn broken_at(index: i64, length: i64) -> Self {
        Self {
            valid: false,
            length,
            broken_at: Some(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_serialization() {
        let ok = ChainVerification::ok(5);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["valid"], true);
        assert!(json.get("broken_at").is_none());

        let broken = ChainVerification::broken_at(2, 5);
        let json = serde_json::to_value(&broken).unwrap();
        assert_eq!(json["broken_at"], 2);
    }
}
