//! AgentPay API - REST surface for the authorization-and-settlement pipeline
//!
//! The transport is deliberately thin: handlers authenticate the agent,
//! resolve idempotency, and delegate to the gate, rails, settlement
//! transaction, and chainer. Every error leaves through one envelope with a
//! machine-readable code.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod idempotent;
pub mod routes;
pub mod settlement;
pub mod state;

pub use auth::{issue_token, AuthenticatedAgent};
pub use error::{ApiError, ApiResult};
pub use state::{AppState, GatewaySettings, WebhookSecrets};

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Transport-level configuration
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// Allowed CORS origins; empty means any (development)
    pub allowed_origins: Vec<String>,
}

/// Build the application router
pub fn create_router(state: Arc<AppState>, config: ApiConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("idempotency-key"),
            ])
    };

    Router::new()
        .merge(routes::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
