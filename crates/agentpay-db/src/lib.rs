//! AgentPay Database Layer
//!
//! PostgreSQL persistence for the payment gateway. The relational store is
//! the only shared state between replicas; every invariant that must hold
//! under concurrency (chain contiguity, single settled payment, idempotency
//! capture, daily-cap arithmetic) is anchored to a constraint or lock here.
//!
//! # Repository Pattern
//!
//! Each table has its own repository with CRUD and domain-specific queries.
//! Multi-step write paths take an explicit `&mut PgConnection` so the caller
//! owns the transaction boundary.

pub mod config;
pub mod error;
pub mod models;
pub mod repos;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use models::*;
pub use repos::*;

/// Database connection pool
pub struct Database {
    /// PostgreSQL connection pool
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        Ok(Self { pg })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Health check: one round trip
    pub async fn health_check(&self) -> DbResult<bool> {
        Ok(sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok())
    }

    /// Begin a transaction; callers thread it through the repos' `*_in`
    /// methods and own commit/rollback
    pub async fn begin(&self) -> DbResult<sqlx::Transaction<'_, sqlx::Postgres>> {
        Ok(self.pg.begin().await?)
    }

    pub fn agent_repo(&self) -> AgentRepo {
        AgentRepo::new(self.pg.clone())
    }

    pub fn policy_repo(&self) -> PolicyRepo {
        PolicyRepo::new(self.pg.clone())
    }

    pub fn intent_repo(&self) -> IntentRepo {
        IntentRepo::new(self.pg.clone())
    }

    pub fn mandate_repo(&self) -> MandateRepo {
        MandateRepo::new(self.pg.clone())
    }

    pub fn payment_repo(&self) -> PaymentRepo {
        PaymentRepo::new(self.pg.clone())
    }

    pub fn receipt_repo(&self) -> ReceiptRepo {
        ReceiptRepo::new(self.pg.clone())
    }

    pub fn idempotency_repo(&self) -> IdempotencyRepo {
        IdempotencyRepo::new(self.pg.clone())
    }

    pub fn vendor_endpoint_repo(&self) -> VendorEndpointRepo {
        VendorEndpointRepo::new(self.pg.clone())
    }

    pub fn dead_letter_repo(&self) -> DeadLetterRepo {
        DeadLetterRepo::new(self.pg.clone())
    }
}
