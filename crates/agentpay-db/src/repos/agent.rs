//! Agent repository
//!
//! Agents are registered and mutated outside the core; the gateway only
//! reads them.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbAgent, DbResult};

pub struct AgentRepo {
    pool: PgPool,
}

impl AgentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbAgent>> {
        let agent = sqlx::query_as::<_, DbAgent>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agent)
    }

    /// Insert an agent row; used by seeding and tests, not the request path
    pub async fn create(&self, agent: &DbAgent) -> DbResult<DbAgent> {
        let created = sqlx::query_as::<_, DbAgent>(
            r#"
            INSERT INTO agents (id, status, risk_tier, public_key, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(agent.id)
        .bind(&agent.status)
        .bind(&agent.risk_tier)
        .bind(&agent.public_key)
        .bind(agent.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}
