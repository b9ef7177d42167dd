//! Hold and hold-reason persistence

use sqlx::PgPool;
use shared::error::ErrorCode;
use shared::types::{TenantScope, Timestamp};

use crate::db::models::{HoldReason, ShipmentHold};

use super::{RepoError, RepoResult, require_tenant};

#[derive(Clone)]
pub struct HoldRepository {
    pool: PgPool,
}

impl HoldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a hold reason by tenant-unique code.
    pub async fn find_reason(
        &self,
        tenant: &TenantScope,
        code: &str,
    ) -> RepoResult<HoldReason> {
        require_tenant(tenant)?;
        sqlx::query_as(
            r#"
            SELECT * FROM hold_reasons
            WHERE organization_id = $1 AND business_unit_id = $2 AND code = $3
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::business(
            ErrorCode::HoldReasonNotFound,
            format!("hold reason '{code}' not found"),
        ))
    }

    /// Active (unreleased) holds for a shipment.
    pub async fn active_for_shipment(
        &self,
        tenant: &TenantScope,
        shipment_id: &str,
    ) -> RepoResult<Vec<ShipmentHold>> {
        require_tenant(tenant)?;
        let rows = sqlx::query_as(
            r#"
            SELECT * FROM shipment_holds
            WHERE organization_id = $1 AND business_unit_id = $2
              AND shipment_id = $3 AND released_at IS NULL
            ORDER BY started_at
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(shipment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert a freshly seeded hold.
    pub async fn insert(&self, hold: &ShipmentHold) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shipment_holds (
                id, shipment_id, organization_id, business_unit_id, reason_code,
                hold_type, severity, source, blocks_dispatch, blocks_delivery,
                blocks_billing, visible_to_customer, started_at, released_at,
                released_by_id, notes, metadata, created_by_id, version,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            "#,
        )
        .bind(&hold.id)
        .bind(&hold.shipment_id)
        .bind(&hold.organization_id)
        .bind(&hold.business_unit_id)
        .bind(&hold.reason_code)
        .bind(&hold.hold_type)
        .bind(hold.severity)
        .bind(hold.source)
        .bind(hold.blocks_dispatch)
        .bind(hold.blocks_delivery)
        .bind(hold.blocks_billing)
        .bind(hold.visible_to_customer)
        .bind(hold.started_at)
        .bind(hold.released_at)
        .bind(&hold.released_by_id)
        .bind(&hold.notes)
        .bind(&hold.metadata)
        .bind(&hold.created_by_id)
        .bind(hold.version)
        .bind(hold.created_at)
        .bind(hold.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Release a hold: stamps `released_at`/`released_by_id` exactly once.
    ///
    /// Returns the released row; releasing an already-released hold is a
    /// business error, not an idempotent success, so callers can surface
    /// the double release.
    pub async fn release(
        &self,
        tenant: &TenantScope,
        hold_id: &str,
        user_id: &str,
        now: Timestamp,
    ) -> RepoResult<ShipmentHold> {
        require_tenant(tenant)?;
        let released: Option<ShipmentHold> = sqlx::query_as(
            r#"
            UPDATE shipment_holds
            SET released_at = $4, released_by_id = $5,
                version = version + 1, updated_at = $4
            WHERE organization_id = $1 AND business_unit_id = $2
              AND id = $3 AND released_at IS NULL
            RETURNING *
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(hold_id)
        .bind(now)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match released {
            Some(hold) => Ok(hold),
            None => {
                // distinguish "missing" from "already released"
                let exists: Option<(String,)> = sqlx::query_as(
                    r#"
                    SELECT id FROM shipment_holds
                    WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3
                    "#,
                )
                .bind(&tenant.organization_id)
                .bind(&tenant.business_unit_id)
                .bind(hold_id)
                .fetch_optional(&self.pool)
                .await?;
                if exists.is_some() {
                    Err(RepoError::business(
                        ErrorCode::HoldAlreadyReleased,
                        format!("hold {hold_id} has already been released"),
                    ))
                } else {
                    Err(RepoError::not_found("shipment_hold", hold_id))
                }
            }
        }
    }
}
