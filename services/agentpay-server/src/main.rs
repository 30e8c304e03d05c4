//! AgentPay Server
//!
//! The agentic payment gateway: policy-gated purchase intents become signed
//! mandates, mandates execute over the card or direct rail, and settled
//! payments chain into per-agent tamper-evident receipts.
//!
//! # Usage
//!
//! ```bash
//! # All configuration via environment
//! SIGNING_KEY=... DATABASE_URL=... agentpay-server
//!
//! # With overrides
//! agentpay-server --port 8080 --log-level debug
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agentpay_api::{create_router, ApiConfig, AppState, GatewaySettings, WebhookSecrets};
use agentpay_crypto::{KeyPair, MandateSigner};
use agentpay_db::Database;
use agentpay_rails::{
    CardRailAdapter, CardRailConfig, DirectRailAdapter, DirectRailConfig, RailRegistry,
};

use crate::config::ServerConfig;

/// AgentPay - authorization and settlement gateway for autonomous agents
#[derive(Parser, Debug)]
#[command(name = "agentpay-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(format) = args.log_format {
        config.log_format = format;
    }

    init_logging(&config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %config.app_env,
        "Starting AgentPay server"
    );

    config.validate()?;

    // Database
    let db = Arc::new(Database::connect(&config.database).await?);
    db.migrate().await?;
    if !db.health_check().await? {
        anyhow::bail!("database health check failed");
    }

    // Signing key: read once, held in memory, never logged
    let signer = MandateSigner::from_seed_hex(&config.signing_key)?;
    let keypair = KeyPair::from_seed_hex(&config.signing_key)?;
    tracing::info!(public_key = %signer.public_key_hex(), "mandate signer ready");

    // Rails
    let mut rails = RailRegistry::new();
    rails.register(Arc::new(DirectRailAdapter::new(
        DirectRailConfig {
            timeout_ms: config.direct_timeout_ms,
        },
        keypair,
    )?));
    if let (Some(app_id), Some(secret)) = (&config.card_app_id, &config.card_secret) {
        let card_config = CardRailConfig::new(app_id.clone(), secret.clone());
        tracing::info!(sandbox = card_config.is_sandbox(), "card rail enabled");
        rails.register(Arc::new(CardRailAdapter::new(card_config)?));
    } else {
        tracing::warn!("card rail disabled: no credentials configured");
    }

    let settings = GatewaySettings {
        direct_max_amount: config.direct_max_amount,
        token_secret: config.token_secret.clone(),
        webhook_secrets: WebhookSecrets {
            card: config.card_secret.clone(),
            direct: config.direct_webhook_secret.clone(),
        },
    };

    let state = Arc::new(AppState::new(db, signer, rails, settings));

    // Idempotency retention sweeper
    spawn_idempotency_sweeper(state.clone(), config.idempotency_retention_hours);

    let app = create_router(
        state,
        ApiConfig {
            allowed_origins: config.allowed_origins.clone(),
        },
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
            config.shutdown_timeout_secs,
        )))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &ServerConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.log_format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).init();
        }
        _ => {
            subscriber.with(fmt::layer().with_target(true)).init();
        }
    }

    Ok(())
}

/// Hourly purge of idempotency records past the retention window
fn spawn_idempotency_sweeper(state: Arc<AppState>, retention_hours: i64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match state.idempotency.purge_expired(retention_hours).await {
                Ok(purged) if purged > 0 => {
                    tracing::info!(purged, "idempotency retention sweep")
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "idempotency sweep failed"),
            }
        }
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    // Allow time for in-flight handlers to complete.
    tracing::info!(
        timeout_secs = timeout.as_secs(),
        "Waiting for in-flight requests to complete..."
    );
    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["agentpay-server", "--port", "9000"]);
        assert_eq!(args.port, Some(9000));
    }
}
