//! Receipt repository
//!
//! Receipts are append-only. All appends go through a per-agent advisory
//! lock taken on the caller's transaction; the `(agent_id, chain_index)`
//! unique constraint is a backstop, not the serialization mechanism.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{DbReceipt, DbReceiptDetail, DbReceiptWithPayment, DbResult};

pub struct ReceiptRepo {
    pool: PgPool,
}

impl ReceiptRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Take the per-agent append lock for the rest of the transaction.
    ///
    /// `hashtext` folds the agent id into the advisory-lock keyspace; the
    /// lock releases automatically at commit or rollback.
    pub async fn lock_agent_chain(conn: &mut PgConnection, agent_id: Uuid) -> DbResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(agent_id.to_string())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// The chain tip (greatest chain_index) for an agent, if any
    pub async fn find_tip_in(
        conn: &mut PgConnection,
        agent_id: Uuid,
    ) -> DbResult<Option<DbReceipt>> {
        let tip = sqlx::query_as::<_, DbReceipt>(
            "SELECT * FROM receipts WHERE agent_id = $1 ORDER BY chain_index DESC LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(conn)
        .await?;
        Ok(tip)
    }

    /// Append inside the settlement transaction; caller must already hold
    /// the agent chain lock
    pub async fn insert_in(conn: &mut PgConnection, receipt: &DbReceipt) -> DbResult<DbReceipt> {
        let created = sqlx::query_as::<_, DbReceipt>(
            r#"
            INSERT INTO receipts (id, payment_id, agent_id, prev_hash, hash, chain_index, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(receipt.id)
        .bind(receipt.payment_id)
        .bind(receipt.agent_id)
        .bind(&receipt.prev_hash)
        .bind(&receipt.hash)
        .bind(receipt.chain_index)
        .bind(receipt.created_at)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DbReceipt>> {
        let receipt = sqlx::query_as::<_, DbReceipt>("SELECT * FROM receipts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(receipt)
    }

    pub async fn list_by_agent(
        &self,
        agent_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DbReceipt>> {
        let receipts = sqlx::query_as::<_, DbReceipt>(
            r#"
            SELECT * FROM receipts
            WHERE agent_id = $1
            ORDER BY chain_index DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(agent_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(receipts)
    }

    /// One receipt joined down to its payment and intent
    pub async fn find_detail(&self, id: Uuid) -> DbResult<Option<DbReceiptDetail>> {
        let detail = sqlx::query_as::<_, DbReceiptDetail>(
            r#"
            SELECT r.id AS receipt_id, r.agent_id, r.prev_hash, r.hash, r.chain_index,
                   r.created_at AS receipt_created_at,
                   p.id AS payment_id, p.mandate_id, p.rail, p.provider_ref,
                   p.amount, p.currency, p.status AS payment_status, p.settled_at,
                   i.id AS intent_id, i.vendor, i.description, i.status AS intent_status
            FROM receipts r
            JOIN payments p ON p.id = r.payment_id
            JOIN mandates m ON m.id = p.mandate_id
            JOIN purchase_intents i ON i.id = m.intent_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(detail)
    }

    /// The full chain for one agent in ascending order, joined with the
    /// payment fields each hash commits to
    pub async fn chain_for_verification(
        &self,
        agent_id: Uuid,
    ) -> DbResult<Vec<DbReceiptWithPayment>> {
        let rows = sqlx::query_as::<_, DbReceiptWithPayment>(
            r#"
            SELECT r.chain_index, r.prev_hash, r.hash,
                   p.id AS payment_id, p.mandate_id, p.amount, p.currency, p.settled_at
            FROM receipts r
            JOIN payments p ON p.id = r.payment_id
            WHERE r.agent_id = $1
            ORDER BY r.chain_index ASC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
