//! Mandate repository
//!
//! The `mandates(intent_id)` unique constraint is the store-level guarantee
//! that an intent never carries two mandates; inserts that lose that race
//! surface as `DbError::Duplicate`.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{DbError, DbMandate, DbResult};

pub struct MandateRepo {
    pool: PgPool,
}

impl MandateRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbMandate>> {
        let mandate = sqlx::query_as::<_, DbMandate>("SELECT * FROM mandates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mandate)
    }

    pub async fn find_by_intent(&self, intent_id: Uuid) -> DbResult<Option<DbMandate>> {
        let mandate = sqlx::query_as::<_, DbMandate>("SELECT * FROM mandates WHERE intent_id = $1")
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mandate)
    }

    pub async fn update_status(&self, id: Uuid, status: &str) -> DbResult<()> {
        sqlx::query("UPDATE mandates SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert inside the policy-gate transaction. A unique violation on
    /// `intent_id` means a concurrent issue won; reported as `Duplicate`.
    pub async fn create_in(conn: &mut PgConnection, mandate: &DbMandate) -> DbResult<DbMandate> {
        let created = sqlx::query_as::<_, DbMandate>(
            r#"
            INSERT INTO mandates (id, intent_id, agent_id, policy_id, vendor, amount,
                currency, signature, mandate_hash, public_key, issued_at, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(mandate.id)
        .bind(mandate.intent_id)
        .bind(mandate.agent_id)
        .bind(mandate.policy_id)
        .bind(&mandate.vendor)
        .bind(mandate.amount)
        .bind(&mandate.currency)
        .bind(&mandate.signature)
        .bind(&mandate.mandate_hash)
        .bind(&mandate.public_key)
        .bind(mandate.issued_at)
        .bind(mandate.expires_at)
        .bind(&mandate.status)
        .fetch_one(conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::Duplicate(format!("mandate for intent {}", mandate.intent_id))
            }
            _ => DbError::Query(e),
        })?;
        Ok(created)
    }

    /// Lookup inside a caller-owned transaction
    pub async fn find_by_id_in(conn: &mut PgConnection, id: Uuid) -> DbResult<Option<DbMandate>> {
        let mandate = sqlx::query_as::<_, DbMandate>("SELECT * FROM mandates WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(mandate)
    }

    /// Status update inside a caller-owned transaction
    pub async fn update_status_in(conn: &mut PgConnection, id: Uuid, status: &str) -> DbResult<()> {
        sqlx::query("UPDATE mandates SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;
        Ok(())
    }
}
