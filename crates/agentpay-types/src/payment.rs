//! Payment types for AgentPay

use crate::{AgentId, Amount, Currency, GatewayError, MandateId, PaymentId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A settlement backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rail {
    /// Card processor (two-phase order/session flow)
    Card,
    /// Signed POST straight to the vendor's endpoint
    Direct,
}

impl Rail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Direct => "direct",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "card" => Ok(Self::Card),
            "direct" => Ok(Self::Direct),
            other => Err(GatewayError::invalid_request(format!(
                "unknown rail {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Settled,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Settled => "SETTLED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "SETTLED" => Ok(Self::Settled),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(GatewayError::internal(format!(
                "unknown payment status {:?}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed | Self::Cancelled)
    }

    /// Statuses that consume headroom in the daily-cap aggregation
    pub fn counts_against_daily_cap(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Settled)
    }

    /// Statuses that block another payment from being opened on the same
    /// mandate
    pub fn blocks_new_payment(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Settled)
    }
}

/// A settlement attempt against a mandate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub mandate_id: MandateId,
    pub agent_id: AgentId,
    pub rail: Rail,
    /// Machine-readable router decision reason, kept for audit
    pub rail_reason: String,
    /// Uniquely addresses the external operation at the chosen rail
    pub provider_ref: Option<String>,
    pub amount: Amount,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PaymentStatus::Settled.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
    }

    #[test]
    fn test_daily_cap_statuses() {
        assert!(PaymentStatus::Pending.counts_against_daily_cap());
        assert!(PaymentStatus::Processing.counts_against_daily_cap());
        assert!(PaymentStatus::Settled.counts_against_daily_cap());
        assert!(!PaymentStatus::Failed.counts_against_daily_cap());
        assert!(!PaymentStatus::Cancelled.counts_against_daily_cap());
    }

    #[test]
    fn test_failed_payment_frees_the_mandate() {
        assert!(!PaymentStatus::Failed.blocks_new_payment());
        assert!(!PaymentStatus::Cancelled.blocks_new_payment());
        assert!(PaymentStatus::Settled.blocks_new_payment());
    }

    #[test]
    fn test_rail_roundtrip() {
        assert_eq!(Rail::parse("card").unwrap(), Rail::Card);
        assert_eq!(Rail::parse("direct").unwrap(), Rail::Direct);
        assert!(Rail::parse("wire").is_err());
    }
}
