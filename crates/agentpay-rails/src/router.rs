//! Rail selection
//!
//! Ordered rules, first match wins, everything else falls through to the
//! card rail. Every decision carries a machine-readable reason that is
//! persisted on the payment for audit.

use agentpay_types::{Rail, RailFlags, RiskTier};

/// Inputs to one routing decision
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// Payment amount in minor units
    pub amount: i64,
    /// Largest amount allowed on the direct rail
    pub direct_max_amount: i64,
    pub rail_flags: RailFlags,
    pub risk_tier: RiskTier,
    /// Whether the vendor has an enabled direct endpoint
    pub has_direct_endpoint: bool,
}

/// The routing outcome, with its audit reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub rail: Rail,
    pub reason: &'static str,
}

/// Apply the selection rules in order
pub fn select_rail(ctx: &RouteContext) -> RouteDecision {
    if ctx.amount > ctx.direct_max_amount {
        return RouteDecision {
            rail: Rail::Card,
            reason: "amount_above_direct_max",
        };
    }

    if !ctx.rail_flags.direct {
        return RouteDecision {
            rail: Rail::Card,
            reason: "policy_disallows_direct",
        };
    }

    if !ctx.has_direct_endpoint {
        return RouteDecision {
            rail: Rail::Card,
            reason: "no_direct_endpoint",
        };
    }

    if ctx.risk_tier == RiskTier::High {
        return RouteDecision {
            rail: Rail::Card,
            reason: "high_risk_tier",
        };
    }

    RouteDecision {
        rail: Rail::Direct,
        reason: "direct_eligible",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RouteContext {
        RouteContext {
            amount: 100,
            direct_max_amount: 200,
            rail_flags: RailFlags { direct: true },
            risk_tier: RiskTier::Low,
            has_direct_endpoint: true,
        }
    }

    #[test]
    fn test_direct_when_all_conditions_hold() {
        let d = select_rail(&ctx());
        assert_eq!(d.rail, Rail::Direct);
        assert_eq!(d.reason, "direct_eligible");
    }

    #[test]
    fn test_amount_rule_wins_first() {
        let mut c = ctx();
        c.amount = 201;
        // Also disable the flag: the amount rule must still be the reported
        // reason because it is checked first.
        c.rail_flags.direct = false;
        let d = select_rail(&c);
        assert_eq!(d.rail, Rail::Card);
        assert_eq!(d.reason, "amount_above_direct_max");
    }

    #[test]
    fn test_amount_at_threshold_stays_direct() {
        let mut c = ctx();
        c.amount = 200;
        assert_eq!(select_rail(&c).rail, Rail::Direct);
    }

    #[test]
    fn test_policy_flag_forces_card() {
        let mut c = ctx();
        c.rail_flags.direct = false;
        let d = select_rail(&c);
        assert_eq!(d.rail, Rail::Card);
        assert_eq!(d.reason, "policy_disallows_direct");
    }

    #[test]
    fn test_missing_endpoint_forces_card() {
        let mut c = ctx();
        c.has_direct_endpoint = false;
        let d = select_rail(&c);
        assert_eq!(d.rail, Rail::Card);
        assert_eq!(d.reason, "no_direct_endpoint");
    }

    #[test]
    fn test_high_risk_forces_card() {
        let mut c = ctx();
        c.risk_tier = RiskTier::High;
        let d = select_rail(&c);
        assert_eq!(d.rail, Rail::Card);
        assert_eq!(d.reason, "high_risk_tier");
    }

    #[test]
    fn test_medium_risk_allows_direct() {
        let mut c = ctx();
        c.risk_tier = RiskTier::Medium;
        assert_eq!(select_rail(&c).rail, Rail::Direct);
    }
}
