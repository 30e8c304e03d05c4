//! Agent types for AgentPay
//!
//! An agent is the authorization principal: the autonomous client allowed to
//! spend under a policy. Registration and operator mutation of agents happen
//! outside the core; the core only reads them.

use crate::{AgentId, GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Suspended,
    Inactive,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "inactive" => Ok(Self::Inactive),
            other => Err(GatewayError::internal(format!(
                "unknown agent status {:?}",
                other
            ))),
        }
    }
}

/// Risk tier assigned to an agent by operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(GatewayError::internal(format!(
                "unknown risk tier {:?}",
                other
            ))),
        }
    }
}

/// A spending agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub status: AgentStatus,
    pub risk_tier: RiskTier,
    /// Hex-encoded Ed25519 public key of the signing key that was active
    /// when this agent was registered
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [AgentStatus::Active, AgentStatus::Suspended, AgentStatus::Inactive] {
            assert_eq!(AgentStatus::parse(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn test_risk_tier_roundtrip() {
        for t in [RiskTier::Low, RiskTier::Medium, RiskTier::High] {
            assert_eq!(RiskTier::parse(t.as_str()).unwrap(), t);
        }
        assert!(RiskTier::parse("low").is_err());
    }
}
