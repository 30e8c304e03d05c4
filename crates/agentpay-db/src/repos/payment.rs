//! Payment repository
//!
//! The partial unique index on `payments(mandate_id) WHERE status =
//! 'SETTLED'` is the store-level guarantee behind "at most one settled
//! payment per mandate".

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{DbPayment, DbResult};

pub struct PaymentRepo {
    pool: PgPool,
}

impl PaymentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payment: &DbPayment) -> DbResult<DbPayment> {
        let created = sqlx::query_as::<_, DbPayment>(
            r#"
            INSERT INTO payments (id, mandate_id, agent_id, rail, rail_reason,
                provider_ref, amount, currency, status, settled_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(payment.mandate_id)
        .bind(payment.agent_id)
        .bind(&payment.rail)
        .bind(&payment.rail_reason)
        .bind(&payment.provider_ref)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.status)
        .bind(payment.settled_at)
        .bind(payment.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbPayment>> {
        let payment = sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    pub async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<DbPayment>> {
        let payment =
            sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE provider_ref = $1")
                .bind(provider_ref)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payment)
    }

    /// Any payment on the mandate that blocks opening a new one
    /// (PENDING, PROCESSING, or SETTLED)
    pub async fn find_blocking_for_mandate(&self, mandate_id: Uuid) -> DbResult<Option<DbPayment>> {
        let payment = sqlx::query_as::<_, DbPayment>(
            r#"
            SELECT * FROM payments
            WHERE mandate_id = $1 AND status IN ('PENDING', 'PROCESSING', 'SETTLED')
            LIMIT 1
            "#,
        )
        .bind(mandate_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    /// Minor units consumed under a policy since `since` by payments in the
    /// daily-cap statuses. Runs on the caller's transaction so it shares the
    /// policy-row lock.
    pub async fn sum_for_policy_since(
        conn: &mut PgConnection,
        policy_id: Uuid,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.amount), 0)::BIGINT
            FROM payments p
            JOIN mandates m ON m.id = p.mandate_id
            WHERE m.policy_id = $1
              AND p.created_at >= $2
              AND p.status IN ('PENDING', 'PROCESSING', 'SETTLED')
            "#,
        )
        .bind(policy_id)
        .bind(since)
        .fetch_one(conn)
        .await?;
        Ok(sum)
    }

    /// Record the provider handing back an async acknowledgement
    pub async fn mark_processing(&self, id: Uuid, provider_ref: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE payments SET status = 'PROCESSING', provider_ref = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, provider_ref: Option<&str>) -> DbResult<()> {
        sqlx::query(
            "UPDATE payments SET status = 'FAILED', provider_ref = COALESCE($2, provider_ref) WHERE id = $1",
        )
        .bind(id)
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal update inside the settlement transaction
    pub async fn update_terminal_in(
        conn: &mut PgConnection,
        id: Uuid,
        status: &str,
        provider_ref: Option<&str>,
        settled_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2,
                provider_ref = COALESCE($3, provider_ref),
                settled_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(provider_ref)
        .bind(settled_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Lookup inside a caller-owned transaction, locking the row
    pub async fn find_by_id_locked(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> DbResult<Option<DbPayment>> {
        let payment =
            sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        Ok(payment)
    }
}
