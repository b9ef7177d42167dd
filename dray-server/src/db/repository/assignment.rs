//! Assignment persistence

use sqlx::PgPool;
use shared::types::{TenantScope, Timestamp};

use crate::db::models::{Assignment, AssignmentStatus, MoveStatus, ShipmentMove};

use super::{RepoError, RepoResult, require_tenant};

#[derive(Clone)]
pub struct AssignmentRepository {
    pool: PgPool,
}

impl AssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The move a candidate assignment targets, with its current stops and
    /// any attached assignment (needed for validation and recompute).
    pub async fn find_move(
        &self,
        tenant: &TenantScope,
        move_id: &str,
    ) -> RepoResult<ShipmentMove> {
        require_tenant(tenant)?;
        let mut mv: ShipmentMove = sqlx::query_as(
            r#"
            SELECT * FROM shipment_moves
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(move_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::not_found("shipment_move", move_id))?;

        mv.stops = sqlx::query_as(
            r#"
            SELECT * FROM stops
            WHERE organization_id = $1 AND business_unit_id = $2
              AND shipment_move_id = $3
            ORDER BY sequence
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(move_id)
        .fetch_all(&self.pool)
        .await?;

        mv.assignment = self.active_for_move(tenant, move_id).await?;
        Ok(mv)
    }

    /// The move's current non-canceled assignment, if any.
    pub async fn active_for_move(
        &self,
        tenant: &TenantScope,
        move_id: &str,
    ) -> RepoResult<Option<Assignment>> {
        require_tenant(tenant)?;
        let row = sqlx::query_as(
            r#"
            SELECT * FROM assignments
            WHERE organization_id = $1 AND business_unit_id = $2
              AND shipment_move_id = $3 AND status != 'canceled'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(move_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a new assignment row (state New).
    pub async fn insert(&self, assignment: &Assignment) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO assignments (
                id, shipment_move_id, organization_id, business_unit_id,
                primary_worker_id, secondary_worker_id, tractor_id, trailer_id,
                status, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.shipment_move_id)
        .bind(&assignment.organization_id)
        .bind(&assignment.business_unit_id)
        .bind(&assignment.primary_worker_id)
        .bind(&assignment.secondary_worker_id)
        .bind(&assignment.tractor_id)
        .bind(&assignment.trailer_id)
        .bind(assignment.status)
        .bind(assignment.version)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// CAS-update an existing assignment (reassignment path).
    pub async fn update(&self, assignment: &Assignment) -> RepoResult<Assignment> {
        let affected = sqlx::query(
            r#"
            UPDATE assignments SET
                primary_worker_id = $5, secondary_worker_id = $6,
                tractor_id = $7, trailer_id = $8, status = $9,
                version = version + 1, updated_at = $10
            WHERE organization_id = $1 AND business_unit_id = $2
              AND id = $3 AND version = $4
            "#,
        )
        .bind(&assignment.organization_id)
        .bind(&assignment.business_unit_id)
        .bind(&assignment.id)
        .bind(assignment.version)
        .bind(&assignment.primary_worker_id)
        .bind(&assignment.secondary_worker_id)
        .bind(&assignment.tractor_id)
        .bind(&assignment.trailer_id)
        .bind(assignment.status)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(RepoError::version_mismatch("assignment", &assignment.id));
        }
        let mut updated = assignment.clone();
        updated.version += 1;
        Ok(updated)
    }

    /// Persist a move's derived status after an assignment change.
    pub async fn update_move_status(
        &self,
        tenant: &TenantScope,
        move_id: &str,
        status: MoveStatus,
        now: Timestamp,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE shipment_moves SET status = $4, version = version + 1, updated_at = $5
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(move_id)
        .bind(status)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancel the active assignment of a move, if one exists.
    pub async fn cancel_for_move(
        &self,
        tenant: &TenantScope,
        move_id: &str,
        now: Timestamp,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE assignments SET status = $4, version = version + 1, updated_at = $5
            WHERE organization_id = $1 AND business_unit_id = $2
              AND shipment_move_id = $3 AND status != 'canceled'
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(move_id)
        .bind(AssignmentStatus::Canceled)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
