//! Policy types for AgentPay
//!
//! A policy is the versioned, time-bounded authorization envelope for one
//! agent: which vendors it may pay, how much per transaction, and how much
//! per UTC day. Policies are immutable once created; a new version
//! supersedes the old, and only the greatest-version unexpired policy is
//! ever consulted.

use crate::{AgentId, Amount, PolicyId, RiskTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-policy rail permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RailFlags {
    /// Whether the direct vendor rail may be used at all
    #[serde(default = "default_true")]
    pub direct: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RailFlags {
    fn default() -> Self {
        Self { direct: true }
    }
}

/// A versioned authorization envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub agent_id: AgentId,
    /// Monotone per agent; the greatest unexpired version wins
    pub version: i32,
    pub vendor_allowlist: Vec<String>,
    /// Per-transaction cap in minor units
    pub amount_cap: Amount,
    /// Per-UTC-day cap in minor units
    pub daily_cap: Amount,
    pub risk_tier: RiskTier,
    pub rail_flags: RailFlags,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    /// A policy is active iff it has not expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn allows_vendor(&self, vendor: &str) -> bool {
        self.vendor_allowlist.iter().any(|v| v == vendor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn policy(expires_in: Duration) -> Policy {
        let now = Utc::now();
        Policy {
            id: PolicyId::new(),
            agent_id: AgentId::new(),
            version: 1,
            vendor_allowlist: vec!["v1".to_string()],
            amount_cap: Amount::from_minor(500).unwrap(),
            daily_cap: Amount::from_minor(5000).unwrap(),
            risk_tier: RiskTier::Low,
            rail_flags: RailFlags::default(),
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[test]
    fn test_active_window() {
        assert!(policy(Duration::hours(1)).is_active(Utc::now()));
        assert!(!policy(Duration::hours(-1)).is_active(Utc::now()));
    }

    #[test]
    fn test_vendor_allowlist() {
        let p = policy(Duration::hours(1));
        assert!(p.allows_vendor("v1"));
        assert!(!p.allows_vendor("v2"));
    }

    #[test]
    fn test_rail_flags_default_allows_direct() {
        let flags: RailFlags = serde_json::from_str("{}").unwrap();
        assert!(flags.direct);
    }
}
