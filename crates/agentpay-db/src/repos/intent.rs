//! Purchase intent repository

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{DbIntent, DbResult};

pub struct IntentRepo {
    pool: PgPool,
}

impl IntentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, intent: &DbIntent) -> DbResult<DbIntent> {
        let created = sqlx::query_as::<_, DbIntent>(
            r#"
            INSERT INTO purchase_intents (id, agent_id, vendor, amount, currency,
                description, metadata, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(intent.id)
        .bind(intent.agent_id)
        .bind(&intent.vendor)
        .bind(intent.amount)
        .bind(&intent.currency)
        .bind(&intent.description)
        .bind(&intent.metadata)
        .bind(&intent.status)
        .bind(intent.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbIntent>> {
        let intent = sqlx::query_as::<_, DbIntent>("SELECT * FROM purchase_intents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(intent)
    }

    pub async fn update_status(&self, id: Uuid, status: &str) -> DbResult<()> {
        sqlx::query("UPDATE purchase_intents SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Status update inside a caller-owned transaction
    pub async fn update_status_in(conn: &mut PgConnection, id: Uuid, status: &str) -> DbResult<()> {
        sqlx::query("UPDATE purchase_intents SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Lookup inside a caller-owned transaction
    pub async fn find_by_id_in(conn: &mut PgConnection, id: Uuid) -> DbResult<Option<DbIntent>> {
        let intent = sqlx::query_as::<_, DbIntent>("SELECT * FROM purchase_intents WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(intent)
    }
}
