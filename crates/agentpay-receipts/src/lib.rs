//! AgentPay Receipts - the per-agent hash chain
//!
//! Every settled payment appends exactly one receipt to its agent's chain.
//! A receipt's hash commits to the payment's amount, currency, mandate,
//! settlement time, and the previous receipt's hash, so altering any settled
//! payment (or reordering the chain) is detectable by re-walking it.
//!
//! Appends serialize on a per-agent advisory lock taken in the same
//! transaction as the insert: concurrent settlements for one agent queue,
//! and chain indexes stay contiguous. Chains are never repaired; a detected
//! break is surfaced and left for operators.

use agentpay_crypto::{canonical_json, iso8601_millis, sha256_prefixed};
use agentpay_db::{Database, DbReceipt, DbReceiptWithPayment, ReceiptRepo};
use agentpay_types::{ChainVerification, GatewayError, ReceiptId, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// The fields a receipt hash commits to
#[derive(Debug, Clone)]
pub struct ReceiptBody<'a> {
    pub amount: i64,
    pub currency: &'a str,
    pub mandate_id: Uuid,
    pub payment_id: Uuid,
    pub prev_hash: Option<&'a str>,
    /// The payment's settlement time
    pub timestamp: DateTime<Utc>,
}

impl ReceiptBody<'_> {
    /// The canonical receipt body: exactly these keys, lexicographic order,
    /// no whitespace.
    pub fn canonical(&self) -> String {
        canonical_json(&json!({
            "amount": self.amount,
            "currency": self.currency,
            "mandate_id": self.mandate_id.to_string(),
            "payment_id": self.payment_id.to_string(),
            "prev_hash": self.prev_hash,
            "timestamp": iso8601_millis(&self.timestamp),
        }))
    }

    /// `sha256:`-prefixed hash of the canonical body
    pub fn hash(&self) -> String {
        sha256_prefixed(self.canonical().as_bytes())
    }
}

/// Recompute the hash a stored receipt row should carry
fn expected_hash(row: &DbReceiptWithPayment) -> Option<String> {
    // A receipt exists only for a settled payment; a missing settled_at is
    // itself a discrepancy.
    let settled_at = row.settled_at?;
    Some(
        ReceiptBody {
            amount: row.amount,
            currency: &row.currency,
            mandate_id: row.mandate_id,
            payment_id: row.payment_id,
            prev_hash: row.prev_hash.as_deref(),
            timestamp: settled_at,
        }
        .hash(),
    )
}

/// Walk a chain in ascending order and find the first discrepancy, if any
pub fn verify_rows(rows: &[DbReceiptWithPayment]) -> ChainVerification {
    let length = rows.len() as i64;
    let mut prev_hash: Option<&str> = None;

    for (i, row) in rows.iter().enumerate() {
        let index = i as i64;

        if row.chain_index != index {
            return ChainVerification::broken_at(index, length);
        }

        if row.prev_hash.as_deref() != prev_hash {
            return ChainVerification::broken_at(index, length);
        }

        match expected_hash(row) {
            Some(expected) if expected == row.hash => {}
            _ => return ChainVerification::broken_at(index, length),
        }

        prev_hash = Some(&row.hash);
    }

    ChainVerification::ok(length)
}

/// Appends and verifies per-agent receipt chains
#[derive(Clone)]
pub struct ReceiptChainer {
    db: Arc<Database>,
}

impl ReceiptChainer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append the receipt for a settled payment, inside the caller's
    /// settlement transaction.
    ///
    /// Takes the per-agent advisory lock first; the read of the chain tip
    /// and the insert then happen with no competing appender for this
    /// agent. The lock releases when the caller commits or rolls back.
    pub async fn append_in(
        &self,
        conn: &mut PgConnection,
        agent_id: Uuid,
        payment_id: Uuid,
        mandate_id: Uuid,
        amount: i64,
        currency: &str,
        settled_at: DateTime<Utc>,
    ) -> Result<DbReceipt> {
        ReceiptRepo::lock_agent_chain(conn, agent_id).await?;

        let tip = ReceiptRepo::find_tip_in(conn, agent_id).await?;
        let (prev_hash, chain_index) = match &tip {
            Some(t) => (Some(t.hash.clone()), t.chain_index + 1),
            None => (None, 0),
        };

        let hash = ReceiptBody {
            amount,
            currency,
            mandate_id,
            payment_id,
            prev_hash: prev_hash.as_deref(),
            timestamp: settled_at,
        }
        .hash();

        let receipt = ReceiptRepo::insert_in(
            conn,
            &DbReceipt {
                id: *ReceiptId::new().as_uuid(),
                payment_id,
                agent_id,
                prev_hash,
                hash,
                chain_index,
                created_at: Utc::now(),
            },
        )
        .await?;

        info!(
            agent_id = %agent_id,
            payment_id = %payment_id,
            chain_index,
            "receipt appended"
        );

        Ok(receipt)
    }

    /// Verify one agent's chain from index 0 upward
    pub async fn verify(&self, agent_id: Uuid) -> Result<ChainVerification> {
        let rows = self.db.receipt_repo().chain_for_verification(agent_id).await?;
        let verification = verify_rows(&rows);
        if let Some(index) = verification.broken_at {
            error!(agent_id = %agent_id, index, "receipt chain break detected");
        }
        Ok(verification)
    }

    /// Verify and fail hard on any break
    pub async fn ensure_intact(&self, agent_id: Uuid) -> Result<()> {
        let verification = self.verify(agent_id).await?;
        match verification.broken_at {
            None => Ok(()),
            Some(index) => Err(GatewayError::ReceiptChainBroken {
                agent_id: agent_id.to_string(),
                index,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settled_at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, min, 0).unwrap()
    }

    /// Build a well-formed chain of `n` receipts with real hashes
    fn chain(n: usize) -> Vec<DbReceiptWithPayment> {
        let mut rows = Vec::with_capacity(n);
        let mut prev_hash: Option<String> = None;

        for i in 0..n {
            let payment_id = Uuid::new_v4();
            let mandate_id = Uuid::new_v4();
            let ts = settled_at(i as u32);
            let hash = ReceiptBody {
                amount: 100 + i as i64,
                currency: "USD",
                mandate_id,
                payment_id,
                prev_hash: prev_hash.as_deref(),
                timestamp: ts,
            }
            .hash();

            rows.push(DbReceiptWithPayment {
                chain_index: i as i64,
                prev_hash: prev_hash.clone(),
                hash: hash.clone(),
                payment_id,
                mandate_id,
                amount: 100 + i as i64,
                currency: "USD".to_string(),
                settled_at: Some(ts),
            });
            prev_hash = Some(hash);
        }
        rows
    }

    #[test]
    fn test_canonical_body_shape() {
        let payment_id = Uuid::nil();
        let mandate_id = Uuid::nil();
        let body = ReceiptBody {
            amount: 199,
            currency: "USD",
            mandate_id,
            payment_id,
            prev_hash: None,
            timestamp: settled_at(0),
        }
        .canonical();

        assert_eq!(
            body,
            format!(
                r#"{{"amount":199,"currency":"USD","mandate_id":"{}","payment_id":"{}","prev_hash":null,"timestamp":"2025-03-14T10:00:00.000Z"}}"#,
                mandate_id, payment_id
            )
        );
    }

    #[test]
    fn test_hash_is_pure() {
        let payment_id = Uuid::new_v4();
        let mandate_id = Uuid::new_v4();
        let make = || {
            ReceiptBody {
                amount: 199,
                currency: "USD",
                mandate_id,
                payment_id,
                prev_hash: Some("sha256:abc"),
                timestamp: settled_at(0),
            }
            .hash()
        };
        assert_eq!(make(), make());
        assert!(make().starts_with("sha256:"));
    }

    #[test]
    fn test_prev_hash_feeds_the_hash() {
        let payment_id = Uuid::new_v4();
        let mandate_id = Uuid::new_v4();
        let base = ReceiptBody {
            amount: 199,
            currency: "USD",
            mandate_id,
            payment_id,
            prev_hash: None,
            timestamp: settled_at(0),
        };
        let linked = ReceiptBody {
            prev_hash: Some("sha256:abc"),
            ..base.clone()
        };
        assert_ne!(base.hash(), linked.hash());
    }

    #[test]
    fn test_empty_chain_verifies() {
        let v = verify_rows(&[]);
        assert!(v.valid);
        assert_eq!(v.length, 0);
    }

    #[test]
    fn test_intact_chain_verifies() {
        let v = verify_rows(&chain(5));
        assert!(v.valid);
        assert_eq!(v.length, 5);
        assert_eq!(v.broken_at, None);
    }

    #[test]
    fn test_tampered_payment_amount_detected() {
        let mut rows = chain(5);
        rows[2].amount += 1;
        let v = verify_rows(&rows);
        assert!(!v.valid);
        assert_eq!(v.broken_at, Some(2));
    }

    #[test]
    fn test_broken_link_detected() {
        let mut rows = chain(4);
        rows[3].prev_hash = Some("sha256:0000".to_string());
        let v = verify_rows(&rows);
        assert_eq!(v.broken_at, Some(3));
    }

    #[test]
    fn test_first_receipt_must_have_null_prev() {
        let mut rows = chain(2);
        rows[0].prev_hash = Some(rows[1].hash.clone());
        let v = verify_rows(&rows);
        assert_eq!(v.broken_at, Some(0));
    }

    #[test]
    fn test_index_gap_detected() {
        let mut rows = chain(3);
        rows[2].chain_index = 5;
        let v = verify_rows(&rows);
        assert_eq!(v.broken_at, Some(2));
    }

    #[test]
    fn test_missing_settled_at_is_a_break() {
        let mut rows = chain(3);
        rows[1].settled_at = None;
        let v = verify_rows(&rows);
        assert_eq!(v.broken_at, Some(1));
    }
}
