//! Shipment control settings lookup

use sqlx::PgPool;
use shared::types::TenantScope;

use crate::db::models::ShipmentControl;

use super::{RepoResult, require_tenant};

#[derive(Clone)]
pub struct ControlRepository {
    pool: PgPool,
}

impl ControlRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the tenant's control row, falling back to defaults for tenants
    /// that never customized theirs.
    pub async fn get(&self, tenant: &TenantScope) -> RepoResult<ShipmentControl> {
        require_tenant(tenant)?;
        let row: Option<ShipmentControl> = sqlx::query_as(
            r#"
            SELECT * FROM shipment_controls
            WHERE organization_id = $1 AND business_unit_id = $2
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.unwrap_or_else(|| ShipmentControl {
            organization_id: tenant.organization_id.clone(),
            business_unit_id: tenant.business_unit_id.clone(),
            ..ShipmentControl::default()
        }))
    }
}
