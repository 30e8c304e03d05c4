//! API Routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// The full gateway surface
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health (unauthenticated)
        .route("/ping", get(handlers::health::ping))
        .route("/health", get(handlers::health::health))
        // Intents
        .route("/purchase-intents", post(handlers::intents::create_intent))
        .route("/purchase-intents/:id", get(handlers::intents::get_intent))
        // Mandates
        .route("/mandates", post(handlers::mandates::create_mandate))
        .route("/mandates/:id", get(handlers::mandates::get_mandate))
        // Payments
        .route("/payments/execute", post(handlers::payments::execute_payment))
        .route("/payments/:id", get(handlers::payments::get_payment))
        // Receipts
        .route("/receipts", get(handlers::receipts::list_receipts))
        .route("/receipts/verify", get(handlers::receipts::verify_chain))
        .route("/receipts/:id", get(handlers::receipts::get_receipt))
        // Provider webhooks
        .route("/webhooks/:rail", post(handlers::webhooks::ingest))
}
