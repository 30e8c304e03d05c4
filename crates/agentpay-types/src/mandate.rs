//! Mandate types for AgentPay
//!
//! A mandate converts one approved intent into a spendable token: a bounded,
//! expiring authorization signed by the gateway's Ed25519 key. At most one
//! mandate exists per intent, and at most one SETTLED payment per mandate.

use crate::{AgentId, Amount, Currency, GatewayError, IntentId, MandateId, PolicyId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum mandate validity in hours accepted at issue time
pub const MAX_MANDATE_VALIDITY_HOURS: i64 = 720;

/// Lifecycle status of a mandate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MandateStatus {
    Active,
    Expired,
    Revoked,
    Exhausted,
}

impl MandateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::Exhausted => "EXHAUSTED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "EXPIRED" => Ok(Self::Expired),
            "REVOKED" => Ok(Self::Revoked),
            "EXHAUSTED" => Ok(Self::Exhausted),
            other => Err(GatewayError::internal(format!(
                "unknown mandate status {:?}",
                other
            ))),
        }
    }
}

/// A signed authorization converting one intent into a spendable token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mandate {
    pub id: MandateId,
    pub intent_id: IntentId,
    pub agent_id: AgentId,
    pub policy_id: PolicyId,
    /// Denormalized from the intent so the canonical body can be rebuilt
    /// and re-verified without a join
    pub vendor: String,
    pub amount: Amount,
    pub currency: Currency,
    /// Lower-case hex Ed25519 signature over the hash of the canonical body
    pub signature: String,
    /// `sha256:`-prefixed hash of the canonical mandate body
    pub mandate_hash: String,
    /// Hex public key of the signing key at issue time
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: MandateStatus,
}

impl Mandate {
    /// Status with time-based expiry applied. A stored ACTIVE mandate whose
    /// window has passed reads as EXPIRED; persistence of that transition is
    /// lazy.
    pub fn effective_status(&self, now: DateTime<Utc>) -> MandateStatus {
        if self.status == MandateStatus::Active && now > self.expires_at {
            MandateStatus::Expired
        } else {
            self.status
        }
    }

    /// Check the mandate can be spent right now; first failure wins
    pub fn check_spendable(&self, now: DateTime<Utc>) -> Result<()> {
        match self.effective_status(now) {
            MandateStatus::Active => Ok(()),
            MandateStatus::Expired => Err(GatewayError::MandateExpired {
                mandate_id: self.id.to_string(),
            }),
            MandateStatus::Revoked => Err(GatewayError::MandateRevoked {
                mandate_id: self.id.to_string(),
            }),
            MandateStatus::Exhausted => Err(GatewayError::MandateExhausted {
                mandate_id: self.id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mandate(status: MandateStatus, expires_in: Duration) -> Mandate {
        let now = Utc::now();
        Mandate {
            id: MandateId::new(),
            intent_id: IntentId::new(),
            agent_id: AgentId::new(),
            policy_id: PolicyId::new(),
            vendor: "v1".to_string(),
            amount: Amount::from_minor(199).unwrap(),
            currency: Currency::usd(),
            signature: String::new(),
            mandate_hash: String::new(),
            public_key: String::new(),
            issued_at: now,
            expires_at: now + expires_in,
            status,
        }
    }

    #[test]
    fn test_effective_status_applies_expiry() {
        let m = mandate(MandateStatus::Active, Duration::hours(-1));
        assert_eq!(m.effective_status(Utc::now()), MandateStatus::Expired);

        let m = mandate(MandateStatus::Active, Duration::hours(1));
        assert_eq!(m.effective_status(Utc::now()), MandateStatus::Active);
    }

    #[test]
    fn test_expiry_does_not_mask_terminal_states() {
        let m = mandate(MandateStatus::Exhausted, Duration::hours(-1));
        assert_eq!(m.effective_status(Utc::now()), MandateStatus::Exhausted);
    }

    #[test]
    fn test_check_spendable_errors() {
        let now = Utc::now();
        assert!(mandate(MandateStatus::Active, Duration::hours(1))
            .check_spendable(now)
            .is_ok());
        assert!(matches!(
            mandate(MandateStatus::Active, Duration::hours(-1)).check_spendable(now),
            Err(GatewayError::MandateExpired { .. })
        ));
        assert!(matches!(
            mandate(MandateStatus::Revoked, Duration::hours(1)).check_spendable(now),
            Err(GatewayError::MandateRevoked { .. })
        ));
        assert!(matches!(
            mandate(MandateStatus::Exhausted, Duration::hours(1)).check_spendable(now),
            Err(GatewayError::MandateExhausted { .. })
        ));
    }
}
