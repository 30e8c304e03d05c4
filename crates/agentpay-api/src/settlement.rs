//! The settlement transaction
//!
//! Driving a payment to a terminal state touches four tables and must be
//! all-or-nothing: the payment row, the mandate (exhausted on success), the
//! intent (executed on success), and the receipt chain append. Both the
//! synchronous execute path and the webhook ingestor come through here.

use crate::state::AppState;
use agentpay_db::{DbError, DbReceipt, IntentRepo, MandateRepo, PaymentRepo};
use agentpay_types::{GatewayError, PaymentStatus, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

/// The terminal state a provider reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Succeeded { settled_at: DateTime<Utc> },
    Failed,
    Cancelled,
}

/// What the settlement transaction did
#[derive(Debug)]
pub enum SettlementOutcome {
    /// The payment reached its terminal state; a receipt exists on success
    Applied { receipt: Option<DbReceipt> },
    /// The payment was already terminal; nothing was mutated
    AlreadyTerminal,
    /// No payment with that id
    NotFound,
}

/// Apply a terminal outcome to a payment in one transaction.
pub async fn settle_payment(
    state: &AppState,
    payment_id: Uuid,
    outcome: TerminalOutcome,
    provider_ref: Option<&str>,
) -> Result<SettlementOutcome> {
    let mut tx = state.db.begin().await.map_err(GatewayError::from)?;

    let Some(payment) = PaymentRepo::find_by_id_locked(&mut tx, payment_id).await? else {
        return Ok(SettlementOutcome::NotFound);
    };

    let current = PaymentStatus::parse(&payment.status)?;
    if current.is_terminal() {
        return Ok(SettlementOutcome::AlreadyTerminal);
    }

    let receipt = match outcome {
        TerminalOutcome::Succeeded { settled_at } => {
            PaymentRepo::update_terminal_in(
                &mut tx,
                payment.id,
                "SETTLED",
                provider_ref,
                Some(settled_at),
            )
            .await?;

            MandateRepo::update_status_in(&mut tx, payment.mandate_id, "EXHAUSTED").await?;

            let mandate = MandateRepo::find_by_id_in(&mut tx, payment.mandate_id)
                .await?
                .ok_or_else(|| {
                    GatewayError::internal(format!(
                        "payment {} references missing mandate {}",
                        payment.id, payment.mandate_id
                    ))
                })?;

            IntentRepo::update_status_in(&mut tx, mandate.intent_id, "EXECUTED").await?;

            let receipt = state
                .chainer
                .append_in(
                    &mut tx,
                    payment.agent_id,
                    payment.id,
                    payment.mandate_id,
                    payment.amount,
                    &payment.currency,
                    settled_at,
                )
                .await?;

            Some(receipt)
        }
        TerminalOutcome::Failed => {
            PaymentRepo::update_terminal_in(&mut tx, payment.id, "FAILED", provider_ref, None)
                .await?;
            None
        }
        TerminalOutcome::Cancelled => {
            PaymentRepo::update_terminal_in(&mut tx, payment.id, "CANCELLED", provider_ref, None)
                .await?;
            None
        }
    };

    tx.commit()
        .await
        .map_err(|e| GatewayError::from(DbError::Query(e)))?;

    info!(
        payment_id = %payment.id,
        outcome = ?outcome,
        "payment reached terminal state"
    );

    Ok(SettlementOutcome::Applied { receipt })
}
