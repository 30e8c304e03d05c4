//! Purchase intent types for AgentPay
//!
//! Creating an intent is the only way a spend enters the system. Intents are
//! inert until the policy gate converts them into a signed mandate.

use crate::{AgentId, Amount, Currency, GatewayError, IntentId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a purchase intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Executed => "EXECUTED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "EXECUTED" => Ok(Self::Executed),
            other => Err(GatewayError::internal(format!(
                "unknown intent status {:?}",
                other
            ))),
        }
    }

    /// Valid transitions: PENDING → APPROVED | REJECTED, APPROVED → EXECUTED
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Executed)
        )
    }
}

/// A proposed spend, pre-authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseIntent {
    pub id: IntentId,
    pub agent_id: AgentId,
    pub vendor: String,
    pub amount: Amount,
    pub currency: Currency,
    pub description: String,
    /// Caller-supplied metadata; preserved opaquely for audit, never
    /// consulted for authorization logic
    pub metadata: serde_json::Value,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use IntentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Executed));
        assert!(!Pending.can_transition_to(Executed));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Executed.can_transition_to(Pending));
    }

    #[test]
    fn test_status_roundtrip() {
        for s in [
            IntentStatus::Pending,
            IntentStatus::Approved,
            IntentStatus::Rejected,
            IntentStatus::Executed,
        ] {
            assert_eq!(IntentStatus::parse(s.as_str()).unwrap(), s);
        }
    }
}
