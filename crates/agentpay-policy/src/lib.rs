//! AgentPay Policy Gate
//!
//! The single authoritative answer to "may this intent become a mandate
//! right now?". Evaluation is ordered and first-failure-wins; every failure
//! is a machine-readable reason code. The daily-cap arithmetic and the
//! mandate insert happen under a row lock on the policy, so two concurrent
//! issues cannot both observe headroom.
//!
//! Fail-closed: a store error during the check surfaces as
//! `POLICY_CHECK_FAILED`, never as a default allow.

use agentpay_crypto::{MandateClaims, MandateSigner};
use agentpay_db::{Database, DbError, DbMandate, IntentRepo, MandateRepo, PaymentRepo, PolicyRepo};
use agentpay_types::{
    Agent, Amount, GatewayError, Mandate, MandateId, Policy, PurchaseIntent, IntentStatus,
    Result, RiskTier, MAX_MANDATE_VALIDITY_HOURS,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Start of the current UTC day; the boundary the daily cap aggregates from
pub fn start_of_day_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc()
}

/// Pure policy evaluation: steps 2-6 of the gate, first failure wins.
///
/// Step 1 (intent existence and ownership) happens at lookup time, before
/// the caller gets here. `spent_today` is the minor-unit sum of payments
/// under the policy since UTC midnight in the PENDING/PROCESSING/SETTLED
/// statuses.
pub fn evaluate(
    agent: &Agent,
    policy: Option<&Policy>,
    intent: &PurchaseIntent,
    spent_today: Amount,
    now: DateTime<Utc>,
) -> Result<()> {
    if !agent.is_active() {
        return Err(GatewayError::AgentInactive {
            status: agent.status.as_str().to_string(),
        });
    }

    let policy = policy
        .filter(|p| p.is_active(now))
        .ok_or_else(|| GatewayError::PolicyNotFound {
            agent_id: agent.id.to_string(),
        })?;

    if !policy.allows_vendor(&intent.vendor) {
        return Err(GatewayError::VendorNotAllowed {
            vendor: intent.vendor.clone(),
        });
    }

    if intent.amount > policy.amount_cap {
        return Err(GatewayError::AmountExceedsCap {
            amount: intent.amount.minor(),
            cap: policy.amount_cap.minor(),
        });
    }

    // A HIGH-risk agent spends only under a policy that acknowledges that
    // tier.
    if agent.risk_tier == RiskTier::High && policy.risk_tier != RiskTier::High {
        return Err(GatewayError::HighRiskAgent);
    }

    let remaining = policy.daily_cap.saturating_sub(spent_today);
    if intent.amount > remaining {
        return Err(GatewayError::DailyLimitExceeded {
            remaining: remaining.minor(),
        });
    }

    Ok(())
}

/// The transactional policy gate
#[derive(Clone)]
pub struct PolicyGate {
    db: Arc<Database>,
    signer: MandateSigner,
}

impl PolicyGate {
    pub fn new(db: Arc<Database>, signer: MandateSigner) -> Self {
        Self { db, signer }
    }

    /// Run the full check-and-issue: evaluate the intent against the newest
    /// active policy and, if it passes, sign and insert the mandate and
    /// approve the intent — all in one transaction holding a row lock on
    /// the policy.
    pub async fn authorize(
        &self,
        agent: &Agent,
        intent: &PurchaseIntent,
        expires_in_hours: i64,
    ) -> Result<Mandate> {
        if !(1..=MAX_MANDATE_VALIDITY_HOURS).contains(&expires_in_hours) {
            return Err(GatewayError::validation(format!(
                "expires_in_hours must be between 1 and {}",
                MAX_MANDATE_VALIDITY_HOURS
            )));
        }

        match intent.status {
            IntentStatus::Pending => {}
            IntentStatus::Approved | IntentStatus::Executed => {
                return Err(GatewayError::invalid_request(
                    "intent already has a mandate",
                ));
            }
            IntentStatus::Rejected => {
                return Err(GatewayError::invalid_request("intent was rejected"));
            }
        }

        let now = Utc::now();

        let mut tx = self.db.begin().await.map_err(fail_closed)?;

        let policy = PolicyRepo::find_active_locked(&mut tx, *agent.id.as_uuid(), now)
            .await
            .map_err(fail_closed)?
            .map(|p| p.into_domain())
            .transpose()
            .map_err(fail_closed)?;

        let spent_today = match &policy {
            Some(p) => Amount::from_minor(
                PaymentRepo::sum_for_policy_since(
                    &mut tx,
                    *p.id.as_uuid(),
                    start_of_day_utc(now),
                )
                .await
                .map_err(fail_closed)?,
            )?,
            None => Amount::ZERO,
        };

        if let Err(denial) = evaluate(agent, policy.as_ref(), intent, spent_today, now) {
            // AGENT_INACTIVE is the one denial the caller cannot remedy by
            // waiting or re-policying; it rejects the intent permanently.
            if matches!(denial, GatewayError::AgentInactive { .. }) {
                IntentRepo::update_status_in(&mut tx, *intent.id.as_uuid(), "REJECTED")
                    .await
                    .map_err(fail_closed)?;
                tx.commit().await.map_err(|e| fail_closed(DbError::Query(e)))?;
            }
            info!(
                intent_id = %intent.id,
                reason = denial.error_code(),
                "policy gate denied intent"
            );
            return Err(denial);
        }
        // evaluate() cannot pass without an active policy; treat the
        // impossible as a failed check rather than unwinding.
        let Some(policy) = policy else {
            return Err(GatewayError::PolicyCheckFailed);
        };

        let expires_at = now + Duration::hours(expires_in_hours);
        let claims = MandateClaims {
            agent_id: agent.id.to_string(),
            amount: intent.amount.minor(),
            currency: intent.currency.code().to_string(),
            expires_at,
            intent_id: intent.id.to_string(),
            policy_id: policy.id.to_string(),
            vendor: intent.vendor.clone(),
        };
        let signed = self
            .signer
            .sign(&claims)
            .map_err(|e| GatewayError::internal(format!("mandate signing: {}", e)))?;

        let row = DbMandate {
            id: *MandateId::new().as_uuid(),
            intent_id: *intent.id.as_uuid(),
            agent_id: *agent.id.as_uuid(),
            policy_id: *policy.id.as_uuid(),
            vendor: intent.vendor.clone(),
            amount: intent.amount.minor(),
            currency: intent.currency.code().to_string(),
            signature: signed.signature,
            mandate_hash: signed.hash,
            public_key: signed.public_key,
            issued_at: now,
            expires_at,
            status: "ACTIVE".to_string(),
        };

        let created = MandateRepo::create_in(&mut tx, &row).await.map_err(|e| {
            if e.is_unique_violation() {
                GatewayError::invalid_request("intent already has a mandate")
            } else {
                fail_closed(e)
            }
        })?;

        IntentRepo::update_status_in(&mut tx, *intent.id.as_uuid(), "APPROVED")
            .await
            .map_err(fail_closed)?;

        tx.commit().await.map_err(|e| fail_closed(DbError::Query(e)))?;

        info!(
            mandate_id = %created.id,
            intent_id = %intent.id,
            policy_version = policy.version,
            "mandate issued"
        );

        created.into_domain().map_err(GatewayError::from)
    }
}

/// Any transient store failure inside the gate surfaces as
/// `POLICY_CHECK_FAILED`; there is no default-allow path.
fn fail_closed(err: DbError) -> GatewayError {
    warn!(error = %err, "policy gate store failure; failing closed");
    GatewayError::PolicyCheckFailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpay_types::{
        AgentId, AgentStatus, Currency, IntentId, PolicyId, RailFlags,
    };
    use chrono::TimeZone;

    fn agent(status: AgentStatus, risk_tier: RiskTier) -> Agent {
        Agent {
            id: AgentId::new(),
            status,
            risk_tier,
            public_key: String::new(),
            created_at: Utc::now(),
        }
    }

    fn policy_for(agent: &Agent, amount_cap: i64, daily_cap: i64) -> Policy {
        Policy {
            id: PolicyId::new(),
            agent_id: agent.id,
            version: 1,
            vendor_allowlist: vec!["v1".to_string()],
            amount_cap: Amount::from_minor(amount_cap).unwrap(),
            daily_cap: Amount::from_minor(daily_cap).unwrap(),
            risk_tier: RiskTier::Low,
            rail_flags: RailFlags::default(),
            expires_at: Utc::now() + Duration::hours(24),
            created_at: Utc::now(),
        }
    }

    fn intent_for(agent: &Agent, vendor: &str, amount: i64) -> PurchaseIntent {
        PurchaseIntent {
            id: IntentId::new(),
            agent_id: agent.id,
            vendor: vendor.to_string(),
            amount: Amount::from_minor(amount).unwrap(),
            currency: Currency::usd(),
            description: String::new(),
            metadata: serde_json::json!({}),
            status: IntentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_happy_path_passes() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 5000);
        let i = intent_for(&a, "v1", 199);
        assert!(evaluate(&a, Some(&p), &i, Amount::ZERO, Utc::now()).is_ok());
    }

    #[test]
    fn test_inactive_agent_denied_first() {
        // Agent status outranks every other check: no policy is even needed
        // to deny.
        let a = agent(AgentStatus::Suspended, RiskTier::Low);
        let i = intent_for(&a, "v1", 199);
        let err = evaluate(&a, None, &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "AGENT_INACTIVE");
    }

    #[test]
    fn test_missing_policy_denied() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let i = intent_for(&a, "v1", 199);
        let err = evaluate(&a, None, &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "POLICY_NOT_FOUND");
    }

    #[test]
    fn test_expired_policy_is_no_policy() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let mut p = policy_for(&a, 500, 5000);
        p.expires_at = Utc::now() - Duration::hours(1);
        let i = intent_for(&a, "v1", 199);
        let err = evaluate(&a, Some(&p), &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "POLICY_NOT_FOUND");
    }

    #[test]
    fn test_vendor_not_allowed() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 5000);
        let i = intent_for(&a, "v2", 100);
        let err = evaluate(&a, Some(&p), &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "VENDOR_NOT_ALLOWED");
    }

    #[test]
    fn test_amount_cap() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 5000);
        let i = intent_for(&a, "v1", 501);
        let err = evaluate(&a, Some(&p), &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "AMOUNT_EXCEEDS_CAP");
    }

    #[test]
    fn test_daily_cap_reports_remaining() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 500);
        let i = intent_for(&a, "v1", 300);
        let spent = Amount::from_minor(300).unwrap();
        let err = evaluate(&a, Some(&p), &i, spent, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "DAILY_LIMIT_EXCEEDED");
        assert_eq!(err.details().unwrap()["remaining"], 200);
    }

    #[test]
    fn test_daily_cap_exact_fit_passes() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 500);
        let i = intent_for(&a, "v1", 200);
        let spent = Amount::from_minor(300).unwrap();
        assert!(evaluate(&a, Some(&p), &i, spent, Utc::now()).is_ok());
    }

    #[test]
    fn test_overspent_day_reports_zero_remaining() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 500);
        let i = intent_for(&a, "v1", 1);
        let spent = Amount::from_minor(900).unwrap();
        let err = evaluate(&a, Some(&p), &i, spent, Utc::now()).unwrap_err();
        assert_eq!(err.details().unwrap()["remaining"], 0);
    }

    #[test]
    fn test_high_risk_agent_needs_high_risk_policy() {
        let a = agent(AgentStatus::Active, RiskTier::High);
        let p = policy_for(&a, 500, 5000);
        let i = intent_for(&a, "v1", 100);
        let err = evaluate(&a, Some(&p), &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "HIGH_RISK_AGENT");

        let mut acknowledged = policy_for(&a, 500, 5000);
        acknowledged.risk_tier = RiskTier::High;
        assert!(evaluate(&a, Some(&acknowledged), &i, Amount::ZERO, Utc::now()).is_ok());
    }

    #[test]
    fn test_vendor_check_precedes_amount_check() {
        let a = agent(AgentStatus::Active, RiskTier::Low);
        let p = policy_for(&a, 500, 5000);
        // Both vendor and amount are wrong; vendor wins per evaluation order.
        let i = intent_for(&a, "v2", 9999);
        let err = evaluate(&a, Some(&p), &i, Amount::ZERO, Utc::now()).unwrap_err();
        assert_eq!(err.error_code(), "VENDOR_NOT_ALLOWED");
    }

    #[test]
    fn test_start_of_day_utc() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 17, 45, 12).unwrap();
        let t = start_of_day_utc(now);
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap());
    }
}
