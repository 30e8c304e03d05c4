//! Policy repository
//!
//! Policies are immutable rows; a new version supersedes the old. Only the
//! greatest-version unexpired policy per agent is ever consulted.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{DbPolicy, DbResult};

pub struct PolicyRepo {
    pool: PgPool,
}

impl PolicyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The newest unexpired policy for an agent, if any
    pub async fn find_active(&self, agent_id: Uuid, now: DateTime<Utc>) -> DbResult<Option<DbPolicy>> {
        let policy = sqlx::query_as::<_, DbPolicy>(
            r#"
            SELECT * FROM policies
            WHERE agent_id = $1 AND expires_at > $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(agent_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }

    /// Same as `find_active`, but locks the policy row for the duration of
    /// the caller's transaction. This is the serialization point for the
    /// daily-cap check-and-issue.
    pub async fn find_active_locked(
        conn: &mut PgConnection,
        agent_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<DbPolicy>> {
        let policy = sqlx::query_as::<_, DbPolicy>(
            r#"
            SELECT * FROM policies
            WHERE agent_id = $1 AND expires_at > $2
            ORDER BY version DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(agent_id)
        .bind(now)
        .fetch_optional(conn)
        .await?;
        Ok(policy)
    }

    /// Insert a policy version; used by seeding and tests, not the request
    /// path
    pub async fn create(&self, policy: &DbPolicy) -> DbResult<DbPolicy> {
        let created = sqlx::query_as::<_, DbPolicy>(
            r#"
            INSERT INTO policies (id, agent_id, version, vendor_allowlist, amount_cap,
                daily_cap, risk_tier, rail_flags, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(policy.id)
        .bind(policy.agent_id)
        .bind(policy.version)
        .bind(&policy.vendor_allowlist)
        .bind(policy.amount_cap)
        .bind(policy.daily_cap)
        .bind(&policy.risk_tier)
        .bind(&policy.rail_flags)
        .bind(policy.expires_at)
        .bind(policy.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}
