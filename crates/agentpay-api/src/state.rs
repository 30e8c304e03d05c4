//! Shared application state
//!
//! Constructed once at process start from typed configuration, shared by
//! every handler, and dropped on shutdown after in-flight handlers drain.

use agentpay_crypto::MandateSigner;
use agentpay_db::Database;
use agentpay_idempotency::IdempotencyStore;
use agentpay_policy::PolicyGate;
use agentpay_rails::RailRegistry;
use agentpay_receipts::ReceiptChainer;
use agentpay_types::Rail;
use std::sync::Arc;

/// Per-rail webhook HMAC secrets
#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    pub card: Option<String>,
    pub direct: Option<String>,
}

impl WebhookSecrets {
    pub fn for_rail(&self, rail: Rail) -> Option<&str> {
        match rail {
            Rail::Card => self.card.as_deref(),
            Rail::Direct => self.direct.as_deref(),
        }
    }
}

/// Gateway-level settings the handlers consult
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Largest amount the direct rail accepts, in minor units
    pub direct_max_amount: i64,
    /// HS256 secret agent bearer tokens verify against
    pub token_secret: String,
    pub webhook_secrets: WebhookSecrets,
}

/// Everything a handler can reach
pub struct AppState {
    pub db: Arc<Database>,
    pub signer: MandateSigner,
    pub gate: PolicyGate,
    pub chainer: ReceiptChainer,
    pub idempotency: IdempotencyStore,
    pub rails: RailRegistry,
    pub settings: GatewaySettings,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        signer: MandateSigner,
        rails: RailRegistry,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            gate: PolicyGate::new(db.clone(), signer.clone()),
            chainer: ReceiptChainer::new(db.clone()),
            idempotency: IdempotencyStore::new(db.clone()),
            db,
            signer,
            rails,
            settings,
        }
    }
}
