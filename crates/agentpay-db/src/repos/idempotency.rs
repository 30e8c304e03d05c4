//! Idempotency record repository
//!
//! The `(route, key)` primary key makes the initial claim race-safe: losers
//! of `INSERT .. ON CONFLICT DO NOTHING` observe zero affected rows and go
//! read the winner's record.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbIdempotencyRecord, DbResult};

pub struct IdempotencyRepo {
    pool: PgPool,
}

impl IdempotencyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attempt to claim `(route, key)` as IN_FLIGHT. Returns whether this
    /// caller won the insert.
    pub async fn try_claim(
        &self,
        route: &str,
        key: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency (route, key, request_fingerprint, status, created_at)
            VALUES ($1, $2, $3, 'IN_FLIGHT', $4)
            ON CONFLICT (route, key) DO NOTHING
            "#,
        )
        .bind(route)
        .bind(key)
        .bind(fingerprint)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find(&self, route: &str, key: &str) -> DbResult<Option<DbIdempotencyRecord>> {
        let record = sqlx::query_as::<_, DbIdempotencyRecord>(
            "SELECT * FROM idempotency WHERE route = $1 AND key = $2",
        )
        .bind(route)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Compare-and-swap takeover of an abandoned IN_FLIGHT record: succeeds
    /// only if `created_at` still matches what the caller observed.
    pub async fn take_over(
        &self,
        route: &str,
        key: &str,
        observed_created_at: DateTime<Utc>,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE idempotency
            SET created_at = $5, request_fingerprint = $4, status = 'IN_FLIGHT',
                status_code = NULL, response_body = NULL
            WHERE route = $1 AND key = $2 AND status = 'IN_FLIGHT' AND created_at = $3
            "#,
        )
        .bind(route)
        .bind(key)
        .bind(observed_created_at)
        .bind(fingerprint)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Capture the terminal response for replay
    pub async fn complete(
        &self,
        route: &str,
        key: &str,
        status_code: i32,
        response_body: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE idempotency
            SET status = 'COMPLETED', status_code = $3, response_body = $4
            WHERE route = $1 AND key = $2
            "#,
        )
        .bind(route)
        .bind(key)
        .bind(status_code)
        .bind(response_body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop the claim without capturing a response, so a retry can re-enter
    /// the pipeline immediately
    pub async fn release(&self, route: &str, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM idempotency WHERE route = $1 AND key = $2 AND status = 'IN_FLIGHT'")
            .bind(route)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Purge records past the retention window. Removes replay ability, not
    /// the correctness of results already produced.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM idempotency WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
