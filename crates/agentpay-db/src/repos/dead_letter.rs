//! Webhook dead-letter repository
//!
//! A webhook whose signature verified but whose processing failed is
//! acknowledged to the provider and parked here for out-of-band
//! reconciliation.

use sqlx::PgPool;
use uuid::Uuid;

use crate::DbResult;

pub struct DeadLetterRepo {
    pool: PgPool,
}

impl DeadLetterRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        rail: &str,
        event_id: &str,
        payload: &serde_json::Value,
        error: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_dead_letters (id, rail, event_id, payload, error, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rail)
        .bind(event_id)
        .bind(payload)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
