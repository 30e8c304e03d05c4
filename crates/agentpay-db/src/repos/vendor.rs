//! Vendor direct-endpoint repository

use sqlx::PgPool;

use crate::{DbResult, DbVendorEndpoint};

pub struct VendorEndpointRepo {
    pool: PgPool,
}

impl VendorEndpointRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The vendor's direct endpoint, only if direct settlement is enabled
    /// for it
    pub async fn find_enabled(&self, vendor: &str) -> DbResult<Option<DbVendorEndpoint>> {
        let endpoint = sqlx::query_as::<_, DbVendorEndpoint>(
            "SELECT * FROM vendor_direct_endpoints WHERE vendor = $1 AND enabled = TRUE",
        )
        .bind(vendor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(endpoint)
    }

    pub async fn upsert(&self, endpoint: &DbVendorEndpoint) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vendor_direct_endpoints (vendor, endpoint_url, vendor_public_key, enabled)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (vendor) DO UPDATE
            SET endpoint_url = $2, vendor_public_key = $3, enabled = $4
            "#,
        )
        .bind(&endpoint.vendor)
        .bind(&endpoint.endpoint_url)
        .bind(&endpoint.vendor_public_key)
        .bind(endpoint.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
