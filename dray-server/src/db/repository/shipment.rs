//! Shipment aggregate repository
//!
//! The aggregate (shipment + moves + stops + commodities + additional
//! charges + comments + holds) is always loaded, modified, and persisted as
//! a unit. All writes happen inside one transaction; the root row and every
//! updated child are CAS-guarded on `version`, and concurrent writers
//! serialize through `VersionMismatch`.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use shared::error::ErrorCode;
use shared::ids::{self, IdPrefix};
use shared::types::{TenantScope, Timestamp};
use shared::util::ONE_DAY_SECS;

use crate::db::models::{
    AdditionalCharge, MoveStatus, Shipment, ShipmentComment, ShipmentCommodity,
    ShipmentControl, ShipmentMove, ShipmentStatus, Stop, StopStatus, extract_mentions,
};
use crate::holds::HoldGates;
use crate::pricing::ChargeCalculator;
use crate::statemachine;

use super::diff::{ChildDiff, diff_children, resequence_moves, resequence_stops};
use super::location::LocationRepository;
use super::{RepoError, RepoResult, require_tenant};

/// `(id, proNumber)` pair returned by the duplicate-BOL check.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BolDuplicate {
    pub id: String,
    pub pro_number: String,
}

/// A shipment flipped to Delayed by the sweep.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DelayedShipment {
    pub id: String,
    pub organization_id: String,
    pub business_unit_id: String,
}

/// Bulk-duplication request (§ external interface).
#[derive(Debug, Clone)]
pub struct DuplicateRequest {
    pub shipment_id: String,
    pub count: u32,
    pub override_dates: bool,
    pub include_commodities: bool,
    pub include_additional_charges: bool,
    pub include_comments: bool,
    pub tenant: TenantScope,
}

#[derive(Clone)]
pub struct ShipmentRepository {
    write: PgPool,
    read: PgPool,
    locations: LocationRepository,
}

impl ShipmentRepository {
    pub fn new(write: PgPool, read: PgPool, locations: LocationRepository) -> Self {
        Self {
            write,
            read,
            locations,
        }
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Load the full aggregate. Children come back ordered by sequence
    /// (moves, stops) or creation (comments, holds).
    pub async fn get(&self, tenant: &TenantScope, id: &str) -> RepoResult<Shipment> {
        require_tenant(tenant)?;

        let mut shipment: Shipment = sqlx::query_as(
            r#"
            SELECT * FROM shipments
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .fetch_optional(&self.read)
        .await?
        .ok_or_else(|| RepoError::not_found("shipment", id))?;

        shipment.moves = sqlx::query_as(
            r#"
            SELECT * FROM shipment_moves
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
            ORDER BY sequence
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .fetch_all(&self.read)
        .await?;

        let move_ids: Vec<String> = shipment.moves.iter().map(|m| m.id.clone()).collect();
        if !move_ids.is_empty() {
            let stops: Vec<Stop> = sqlx::query_as(
                r#"
                SELECT * FROM stops
                WHERE organization_id = $1 AND business_unit_id = $2
                  AND shipment_move_id = ANY($3)
                ORDER BY shipment_move_id, sequence
                "#,
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(&move_ids)
            .fetch_all(&self.read)
            .await?;

            let assignments: Vec<crate::db::models::Assignment> = sqlx::query_as(
                r#"
                SELECT DISTINCT ON (shipment_move_id) * FROM assignments
                WHERE organization_id = $1 AND business_unit_id = $2
                  AND shipment_move_id = ANY($3) AND status != 'canceled'
                ORDER BY shipment_move_id, created_at DESC
                "#,
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(&move_ids)
            .fetch_all(&self.read)
            .await?;

            for mv in &mut shipment.moves {
                mv.stops = stops
                    .iter()
                    .filter(|s| s.shipment_move_id == mv.id)
                    .cloned()
                    .collect();
                mv.assignment = assignments
                    .iter()
                    .find(|a| a.shipment_move_id == mv.id)
                    .cloned();
            }
        }

        shipment.commodities = sqlx::query_as(
            r#"
            SELECT sc.*, c.hazmat AS hazmat, c.linear_feet_per_unit AS linear_feet_per_unit
            FROM shipment_commodities sc
            JOIN commodities c
              ON c.id = sc.commodity_id
             AND c.organization_id = sc.organization_id
             AND c.business_unit_id = sc.business_unit_id
            WHERE sc.organization_id = $1 AND sc.business_unit_id = $2 AND sc.shipment_id = $3
            ORDER BY sc.created_at
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .fetch_all(&self.read)
        .await?;

        shipment.additional_charges = sqlx::query_as(
            r#"
            SELECT * FROM additional_charges
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
            ORDER BY created_at
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .fetch_all(&self.read)
        .await?;

        shipment.holds = sqlx::query_as(
            r#"
            SELECT * FROM shipment_holds
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
            ORDER BY started_at
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .fetch_all(&self.read)
        .await?;

        shipment.comments = sqlx::query_as(
            r#"
            SELECT * FROM shipment_comments
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
            ORDER BY created_at
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .fetch_all(&self.read)
        .await?;

        Ok(shipment)
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Insert a fresh aggregate. The caller has already allocated the
    /// pro-number and run the calculator and coordinator; this persists
    /// root → moves → stops → distances → commodities → charges in order
    /// inside one transaction.
    pub async fn create(&self, mut shipment: Shipment, now: Timestamp) -> RepoResult<Shipment> {
        let tenant = TenantScope::new(&shipment.organization_id, &shipment.business_unit_id);
        require_tenant(&tenant)?;
        assign_child_identity(&mut shipment, now);

        let mut tx = self.write.begin().await?;

        insert_root(&mut *tx, &shipment).await?;
        for mv in &shipment.moves {
            insert_move(&mut *tx, mv).await?;
            for stop in &mv.stops {
                insert_stop(&mut *tx, stop).await?;
            }
        }
        // distances after stops exist, before commit
        for mv in &mut shipment.moves {
            if let Some(result) = self.locations.resolve_move_distance(&tenant, mv).await? {
                mv.distance = Some(result.miles);
                sqlx::query(
                    "UPDATE shipment_moves SET distance = $2, updated_at = $3 WHERE id = $1",
                )
                .bind(&mv.id)
                .bind(mv.distance)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }
        for line in &shipment.commodities {
            insert_commodity(&mut *tx, line).await?;
        }
        for charge in &shipment.additional_charges {
            insert_charge(&mut *tx, charge).await?;
        }
        for comment in &shipment.comments {
            insert_comment(&mut *tx, comment).await?;
        }

        tx.commit().await?;
        Ok(shipment)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Persist an aggregate update: recompute charges and state inside the
    /// transaction, CAS the root, then diff every child collection.
    pub async fn update(
        &self,
        mut incoming: Shipment,
        control: &ShipmentControl,
        gates: &HoldGates,
        calc: &ChargeCalculator,
        principal_id: &str,
        now: Timestamp,
    ) -> RepoResult<Shipment> {
        let tenant = TenantScope::new(&incoming.organization_id, &incoming.business_unit_id);
        require_tenant(&tenant)?;

        let mut tx = self.write.begin().await?;

        // persisted children for diffing
        let existing_moves: Vec<ShipmentMove> = sqlx::query_as(
            r#"
            SELECT * FROM shipment_moves
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
            ORDER BY sequence
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&incoming.id)
        .fetch_all(&mut *tx)
        .await?;
        let existing_move_ids: Vec<String> =
            existing_moves.iter().map(|m| m.id.clone()).collect();
        let existing_stops: Vec<Stop> = if existing_move_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT * FROM stops
                WHERE organization_id = $1 AND business_unit_id = $2
                  AND shipment_move_id = ANY($3)
                ORDER BY shipment_move_id, sequence
                "#,
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(&existing_move_ids)
            .fetch_all(&mut *tx)
            .await?
        };
        let existing_commodities: Vec<ShipmentCommodity> = sqlx::query_as(
            "SELECT * FROM shipment_commodities WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3",
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&incoming.id)
        .fetch_all(&mut *tx)
        .await?;
        let existing_charges: Vec<AdditionalCharge> = sqlx::query_as(
            "SELECT * FROM additional_charges WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3",
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&incoming.id)
        .fetch_all(&mut *tx)
        .await?;
        let existing_comments: Vec<ShipmentComment> = sqlx::query_as(
            "SELECT * FROM shipment_comments WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3",
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&incoming.id)
        .fetch_all(&mut *tx)
        .await?;

        // fresh ids + contiguous sequences before anything derives from them
        assign_child_identity(&mut incoming, now);
        resequence_moves(&mut incoming.moves);
        let mut moves_with_stop_changes: Vec<usize> = Vec::new();
        for (i, mv) in incoming.moves.iter_mut().enumerate() {
            let persisted: Vec<&Stop> = existing_stops
                .iter()
                .filter(|s| s.shipment_move_id == mv.id)
                .collect();
            let persisted_owned: Vec<Stop> = persisted.into_iter().cloned().collect();
            let stop_diff = diff_children(&persisted_owned, &mv.stops);
            if !stop_diff.delete_ids.is_empty() {
                assert_stop_retention(&mv.stops)?;
            }
            if !stop_diff.inserts.is_empty() || !stop_diff.delete_ids.is_empty() {
                moves_with_stop_changes.push(i);
            }
            resequence_stops(&mut mv.stops);
        }

        // in-transaction recompute: charges first, then state derivation
        calc.calculate(&mut incoming, principal_id).await;
        statemachine::recompute_with_parallel_stops(&mut incoming, gates, now).await?;

        // 1. CAS the root
        let affected = update_root(&mut *tx, &incoming, now).await?;
        if affected == 0 {
            return Err(RepoError::version_mismatch("shipment", &incoming.id));
        }
        incoming.version += 1;

        // 2. diff moves
        let move_diff = diff_children(&existing_moves, &incoming.moves);
        if !move_diff.delete_ids.is_empty() {
            if !control.allow_move_removals {
                return Err(RepoError::business(
                    ErrorCode::MoveRemovalNotAllowed,
                    "organization disallows move removals",
                ));
            }
            delete_moves_cascade(&mut *tx, &tenant, &move_diff.delete_ids).await?;
        }
        for idx in &move_diff.inserts {
            insert_move(&mut *tx, &incoming.moves[*idx]).await?;
        }
        if !move_diff.updates.is_empty() {
            bulk_update_moves(&mut *tx, &tenant, &incoming.moves, &move_diff, now).await?;
            for idx in &move_diff.updates {
                incoming.moves[*idx].version += 1;
            }
        }

        // 3. diff stops per surviving move
        let mut stop_inserts: Vec<(usize, usize)> = Vec::new();
        let mut stop_updates: Vec<(usize, usize)> = Vec::new();
        let mut stop_deletes: Vec<String> = Vec::new();
        for (i, mv) in incoming.moves.iter().enumerate() {
            let persisted: Vec<Stop> = existing_stops
                .iter()
                .filter(|s| s.shipment_move_id == mv.id)
                .cloned()
                .collect();
            let diff = diff_children(&persisted, &mv.stops);
            stop_inserts.extend(diff.inserts.iter().map(|j| (i, *j)));
            stop_updates.extend(diff.updates.iter().map(|j| (i, *j)));
            stop_deletes.extend(diff.delete_ids);
        }
        if !stop_deletes.is_empty() {
            delete_stops(&mut *tx, &tenant, &stop_deletes).await?;
        }
        for (i, j) in &stop_inserts {
            insert_stop(&mut *tx, &incoming.moves[*i].stops[*j]).await?;
        }
        if !stop_updates.is_empty() {
            bulk_update_stops(&mut *tx, &tenant, &incoming.moves, &stop_updates, now).await?;
            for (i, j) in &stop_updates {
                incoming.moves[*i].stops[*j].version += 1;
            }
        }

        // 4. distance recompute on moves whose stop-set changed
        for i in &moves_with_stop_changes {
            let mv = &mut incoming.moves[*i];
            if let Some(result) = self.locations.resolve_move_distance(&tenant, mv).await? {
                mv.distance = Some(result.miles);
                sqlx::query(
                    "UPDATE shipment_moves SET distance = $2, updated_at = $3 WHERE id = $1",
                )
                .bind(&mv.id)
                .bind(mv.distance)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        // 5. simple id-set diffs for commodities, charges, comments
        let commodity_diff = diff_children(&existing_commodities, &incoming.commodities);
        apply_commodity_diff(&mut *tx, &tenant, &mut incoming, &commodity_diff, now).await?;

        let charge_diff = diff_children(&existing_charges, &incoming.additional_charges);
        apply_charge_diff(&mut *tx, &tenant, &mut incoming, &charge_diff, now).await?;

        let comment_diff = diff_children(&existing_comments, &incoming.comments);
        for idx in &comment_diff.inserts {
            insert_comment(&mut *tx, &incoming.comments[*idx]).await?;
        }
        if !comment_diff.delete_ids.is_empty() {
            sqlx::query(
                "DELETE FROM shipment_comments WHERE organization_id = $1 AND business_unit_id = $2 AND id = ANY($3)",
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(&comment_diff.delete_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(incoming)
    }

    // =========================================================================
    // Cancel / Uncancel
    // =========================================================================

    /// Cancel the shipment and cascade to all non-terminal children.
    pub async fn cancel(
        &self,
        tenant: &TenantScope,
        id: &str,
        version: i64,
        user_id: &str,
        reason: &str,
        now: Timestamp,
    ) -> RepoResult<()> {
        require_tenant(tenant)?;
        let mut tx = self.write.begin().await?;

        let affected = sqlx::query(
            r#"
            UPDATE shipments SET
                status = 'canceled', canceled_at = $5, canceled_by_id = $6,
                cancel_reason = $7, version = version + 1, updated_at = $5
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3
              AND version = $4 AND status NOT IN ('billed', 'canceled')
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(version)
        .bind(now)
        .bind(user_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            // distinguish a stale version from a terminal shipment
            let row: Option<(i64, ShipmentStatus)> = sqlx::query_as(
                "SELECT version, status FROM shipments WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3",
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            return Err(match row {
                None => RepoError::not_found("shipment", id),
                Some((v, _)) if v != version => RepoError::version_mismatch("shipment", id),
                Some((_, status)) => RepoError::business(
                    ErrorCode::ShipmentTerminal,
                    format!("cannot cancel a {status} shipment"),
                ),
            });
        }

        sqlx::query(
            r#"
            UPDATE shipment_moves SET status = 'canceled', version = version + 1, updated_at = $4
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
              AND status != 'canceled'
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE assignments SET status = 'canceled', version = version + 1, updated_at = $4
            WHERE organization_id = $1 AND business_unit_id = $2 AND status != 'canceled'
              AND shipment_move_id IN (
                  SELECT id FROM shipment_moves WHERE shipment_id = $3
                    AND organization_id = $1 AND business_unit_id = $2)
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE stops SET status = 'canceled', version = version + 1, updated_at = $4
            WHERE organization_id = $1 AND business_unit_id = $2 AND status != 'canceled'
              AND shipment_move_id IN (
                  SELECT id FROM shipment_moves WHERE shipment_id = $3
                    AND organization_id = $1 AND business_unit_id = $2)
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Reverse a cancellation: everything back to New; optionally reset
    /// every stop's planned window to `[now, now + 1 day]`.
    pub async fn uncancel(
        &self,
        tenant: &TenantScope,
        id: &str,
        version: i64,
        update_appointments: bool,
        now: Timestamp,
    ) -> RepoResult<()> {
        require_tenant(tenant)?;
        let mut tx = self.write.begin().await?;

        let affected = sqlx::query(
            r#"
            UPDATE shipments SET
                status = 'new', canceled_at = NULL, canceled_by_id = NULL,
                cancel_reason = NULL, version = version + 1, updated_at = $5
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3
              AND version = $4 AND status = 'canceled'
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(version)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::version_mismatch("shipment", id));
        }

        sqlx::query(
            r#"
            UPDATE shipment_moves SET status = 'new', version = version + 1, updated_at = $4
            WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_id = $3
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE assignments SET status = 'new', version = version + 1, updated_at = $4
            WHERE organization_id = $1 AND business_unit_id = $2
              AND shipment_move_id IN (
                  SELECT id FROM shipment_moves WHERE shipment_id = $3
                    AND organization_id = $1 AND business_unit_id = $2)
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if update_appointments {
            sqlx::query(
                r#"
                UPDATE stops SET status = 'new', actual_arrival = NULL, actual_departure = NULL,
                    planned_arrival = $4, planned_departure = $5,
                    version = version + 1, updated_at = $4
                WHERE organization_id = $1 AND business_unit_id = $2
                  AND shipment_move_id IN (
                      SELECT id FROM shipment_moves WHERE shipment_id = $3
                        AND organization_id = $1 AND business_unit_id = $2)
                "#,
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(id)
            .bind(now)
            .bind(now + ONE_DAY_SECS)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE stops SET status = 'new', version = version + 1, updated_at = $4
                WHERE organization_id = $1 AND business_unit_id = $2
                  AND shipment_move_id IN (
                      SELECT id FROM shipment_moves WHERE shipment_id = $3
                        AND organization_id = $1 AND business_unit_id = $2)
                "#,
            )
            .bind(&tenant.organization_id)
            .bind(&tenant.business_unit_id)
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Bulk duplicate
    // =========================================================================

    /// Insert pre-built duplicates in one transaction, grouped by entity
    /// class in dependency order.
    pub async fn insert_duplicates(&self, duplicates: &[Shipment]) -> RepoResult<()> {
        let mut tx = self.write.begin().await?;

        for shipment in duplicates {
            insert_root(&mut *tx, shipment).await?;
        }
        for shipment in duplicates {
            for mv in &shipment.moves {
                insert_move(&mut *tx, mv).await?;
            }
        }
        for shipment in duplicates {
            for mv in &shipment.moves {
                for stop in &mv.stops {
                    insert_stop(&mut *tx, stop).await?;
                }
            }
        }
        for shipment in duplicates {
            for line in &shipment.commodities {
                insert_commodity(&mut *tx, line).await?;
            }
        }
        for shipment in duplicates {
            for charge in &shipment.additional_charges {
                insert_charge(&mut *tx, charge).await?;
            }
        }
        for shipment in duplicates {
            for comment in &shipment.comments {
                insert_comment(&mut *tx, comment).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Billing transitions
    // =========================================================================

    /// CAS a billing-phase status flip (ReadyToBill / ReviewRequired /
    /// Billed). The service has already run the state machine and hold
    /// gates; this only persists the agreed target.
    pub async fn set_billing_status(
        &self,
        tenant: &TenantScope,
        id: &str,
        version: i64,
        status: ShipmentStatus,
        ready_to_bill: bool,
        now: Timestamp,
    ) -> RepoResult<()> {
        require_tenant(tenant)?;
        let affected = sqlx::query(
            r#"
            UPDATE shipments SET status = $5, ready_to_bill = $6,
                version = version + 1, updated_at = $7
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3 AND version = $4
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(version)
        .bind(status)
        .bind(ready_to_bill)
        .bind(now)
        .execute(&self.write)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::version_mismatch("shipment", id));
        }
        Ok(())
    }

    /// CAS the root's derived status only (assignment flow: the coordinator
    /// ran in memory and nothing else on the root changed).
    pub async fn set_derived_status(
        &self,
        tenant: &TenantScope,
        id: &str,
        version: i64,
        status: ShipmentStatus,
        now: Timestamp,
    ) -> RepoResult<()> {
        require_tenant(tenant)?;
        let affected = sqlx::query(
            r#"
            UPDATE shipments SET status = $5, version = version + 1, updated_at = $6
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3 AND version = $4
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(id)
        .bind(version)
        .bind(status)
        .bind(now)
        .execute(&self.write)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::version_mismatch("shipment", id));
        }
        Ok(())
    }

    // =========================================================================
    // Sweeps and lookups
    // =========================================================================

    /// Flip overdue in-flight shipments to Delayed and return them.
    ///
    /// A shipment qualifies when some non-terminal stop with no actual
    /// departure is past its planned departure, through a non-terminal
    /// move, and the shipment is not already Delayed or terminal-ish.
    pub async fn delay_shipments(&self, now: Timestamp) -> RepoResult<Vec<DelayedShipment>> {
        let rows = sqlx::query_as(
            r#"
            WITH late_stops AS (
                SELECT DISTINCT shipment_move_id FROM stops
                WHERE planned_departure < $1
                  AND status != 'canceled'
                  AND actual_departure IS NULL
            ),
            late_moves AS (
                SELECT DISTINCT m.shipment_id FROM shipment_moves m
                JOIN late_stops ls ON ls.shipment_move_id = m.id
                WHERE m.status != 'canceled'
            ),
            affected AS (
                SELECT s.id FROM shipments s
                JOIN late_moves lm ON lm.shipment_id = s.id
                WHERE s.status NOT IN ('delayed', 'canceled', 'completed', 'billed')
            )
            UPDATE shipments SET status = 'delayed', version = version + 1, updated_at = $1
            WHERE id IN (SELECT id FROM affected)
            RETURNING id, organization_id, business_unit_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.write)
        .await?;
        Ok(rows)
    }

    /// `(id, proNumber)` of non-canceled shipments sharing a BOL in-tenant.
    pub async fn check_for_duplicate_bols(
        &self,
        tenant: &TenantScope,
        bol: &str,
        exclude_id: Option<&str>,
    ) -> RepoResult<Vec<BolDuplicate>> {
        require_tenant(tenant)?;
        if bol.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as(
            r#"
            SELECT id, pro_number FROM shipments
            WHERE organization_id = $1 AND business_unit_id = $2
              AND bol = $3 AND status != 'canceled'
              AND ($4::text IS NULL OR id != $4)
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(bol)
        .bind(exclude_id)
        .fetch_all(&self.read)
        .await?;
        Ok(rows)
    }

    /// Up to 50 most-recent Billed shipments matching an origin/destination
    /// lane and service/shipment type (and customer, when specified).
    pub async fn previous_rates(
        &self,
        tenant: &TenantScope,
        origin_location_id: &str,
        destination_location_id: &str,
        service_type_id: &str,
        shipment_type_id: &str,
        customer_id: Option<&str>,
    ) -> RepoResult<Vec<Shipment>> {
        require_tenant(tenant)?;
        let rows = sqlx::query_as(
            r#"
            WITH origin_match AS (
                SELECT m.shipment_id FROM shipment_moves m
                JOIN stops st ON st.shipment_move_id = m.id
                WHERE m.organization_id = $1 AND m.business_unit_id = $2
                  AND m.sequence = 0 AND st.sequence = 0
                  AND st.stop_type IN ('pickup', 'split_pickup')
                  AND st.location_id = $3
            ),
            dest_match AS (
                SELECT m.shipment_id FROM shipment_moves m
                JOIN stops st ON st.shipment_move_id = m.id
                WHERE m.organization_id = $1 AND m.business_unit_id = $2
                  AND st.stop_type IN ('delivery', 'split_delivery')
                  AND st.location_id = $4
                  AND m.sequence = (
                      SELECT MAX(m2.sequence) FROM shipment_moves m2
                      WHERE m2.shipment_id = m.shipment_id)
                  AND st.sequence = (
                      SELECT MAX(s2.sequence) FROM stops s2
                      WHERE s2.shipment_move_id = m.id)
            )
            SELECT s.* FROM shipments s
            WHERE s.organization_id = $1 AND s.business_unit_id = $2
              AND s.status = 'billed'
              AND s.service_type_id = $5 AND s.shipment_type_id = $6
              AND ($7::text IS NULL OR s.customer_id = $7)
              AND s.id IN (SELECT shipment_id FROM origin_match)
              AND s.id IN (SELECT shipment_id FROM dest_match)
            ORDER BY s.created_at DESC
            LIMIT 50
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(origin_location_id)
        .bind(destination_location_id)
        .bind(service_type_id)
        .bind(shipment_type_id)
        .bind(customer_id)
        .fetch_all(&self.read)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Pure helpers
// =============================================================================

/// Give every id-less child a fresh id and stamp parentage, tenancy, and
/// timestamps.
pub fn assign_child_identity(shipment: &mut Shipment, now: Timestamp) {
    let org = shipment.organization_id.clone();
    let bu = shipment.business_unit_id.clone();
    if ids::is_nil(&shipment.id) {
        shipment.id = ids::generate(IdPrefix::Shipment);
        shipment.created_at = now;
    }
    shipment.updated_at = now;

    for mv in &mut shipment.moves {
        if ids::is_nil(&mv.id) {
            mv.id = ids::generate(IdPrefix::ShipmentMove);
            mv.created_at = now;
        }
        mv.shipment_id = shipment.id.clone();
        mv.organization_id = org.clone();
        mv.business_unit_id = bu.clone();
        mv.updated_at = now;
        for stop in &mut mv.stops {
            if ids::is_nil(&stop.id) {
                stop.id = ids::generate(IdPrefix::Stop);
                stop.created_at = now;
            }
            stop.shipment_move_id = mv.id.clone();
            stop.organization_id = org.clone();
            stop.business_unit_id = bu.clone();
            stop.updated_at = now;
        }
    }
    for line in &mut shipment.commodities {
        if ids::is_nil(&line.id) {
            line.id = ids::generate(IdPrefix::ShipmentCommodity);
            line.created_at = now;
        }
        line.shipment_id = shipment.id.clone();
        line.organization_id = org.clone();
        line.business_unit_id = bu.clone();
        line.updated_at = now;
    }
    for charge in &mut shipment.additional_charges {
        if ids::is_nil(&charge.id) {
            charge.id = ids::generate(IdPrefix::AdditionalCharge);
            charge.created_at = now;
        }
        charge.shipment_id = shipment.id.clone();
        charge.organization_id = org.clone();
        charge.business_unit_id = bu.clone();
        charge.updated_at = now;
    }
    for comment in &mut shipment.comments {
        if ids::is_nil(&comment.id) {
            comment.id = ids::generate(IdPrefix::ShipmentComment);
            comment.created_at = now;
        }
        comment.shipment_id = shipment.id.clone();
        comment.organization_id = org.clone();
        comment.business_unit_id = bu.clone();
        comment.updated_at = now;
    }
}

/// A move must keep at least one pickup, one delivery, and two stops.
fn assert_stop_retention(surviving: &[Stop]) -> RepoResult<()> {
    let pickups = surviving
        .iter()
        .filter(|s| s.stop_type.is_pickup_variant())
        .count();
    let deliveries = surviving
        .iter()
        .filter(|s| s.stop_type.is_delivery_variant())
        .count();
    if surviving.len() < 2 || pickups == 0 || deliveries == 0 {
        return Err(RepoError::business(
            ErrorCode::StopMinimumViolated,
            "a move must keep at least one pickup, one delivery, and two stops",
        ));
    }
    Ok(())
}

/// Build `count` duplicates of a loaded aggregate: fresh ids everywhere,
/// everything back to New, `bol = "GENERATED-COPY"`.
pub fn build_duplicates(
    original: &Shipment,
    pro_numbers: &[String],
    req: &DuplicateRequest,
    now: Timestamp,
) -> Vec<Shipment> {
    pro_numbers
        .iter()
        .map(|pro| {
            let mut copy = original.clone();
            copy.id = ids::generate(IdPrefix::Shipment);
            copy.pro_number = pro.clone();
            copy.status = ShipmentStatus::New;
            copy.bol = "GENERATED-COPY".to_string();
            copy.ready_to_bill = false;
            copy.actual_ship_date = None;
            copy.actual_delivery_date = None;
            copy.canceled_at = None;
            copy.canceled_by_id = None;
            copy.cancel_reason = None;
            copy.version = 0;
            copy.created_at = now;
            copy.updated_at = now;
            copy.holds = Vec::new();

            for mv in &mut copy.moves {
                mv.id = ids::generate(IdPrefix::ShipmentMove);
                mv.shipment_id = copy.id.clone();
                mv.status = MoveStatus::New;
                mv.assignment = None;
                mv.version = 0;
                mv.created_at = now;
                mv.updated_at = now;
                for stop in &mut mv.stops {
                    stop.id = ids::generate(IdPrefix::Stop);
                    stop.shipment_move_id = mv.id.clone();
                    stop.status = StopStatus::New;
                    stop.actual_arrival = None;
                    stop.actual_departure = None;
                    if req.override_dates {
                        stop.planned_arrival = now;
                        stop.planned_departure = now + ONE_DAY_SECS;
                    }
                    stop.version = 0;
                    stop.created_at = now;
                    stop.updated_at = now;
                }
            }

            if req.include_commodities {
                for line in &mut copy.commodities {
                    line.id = ids::generate(IdPrefix::ShipmentCommodity);
                    line.shipment_id = copy.id.clone();
                    line.version = 0;
                    line.created_at = now;
                    line.updated_at = now;
                }
            } else {
                copy.commodities = Vec::new();
            }

            if req.include_additional_charges {
                for charge in &mut copy.additional_charges {
                    charge.id = ids::generate(IdPrefix::AdditionalCharge);
                    charge.shipment_id = copy.id.clone();
                    charge.version = 0;
                    charge.created_at = now;
                    charge.updated_at = now;
                }
            } else {
                copy.additional_charges = Vec::new();
            }

            if req.include_comments {
                for comment in &mut copy.comments {
                    comment.id = ids::generate(IdPrefix::ShipmentComment);
                    comment.shipment_id = copy.id.clone();
                    comment.version = 0;
                    comment.created_at = now;
                    comment.updated_at = now;
                }
            } else {
                copy.comments = Vec::new();
            }

            copy
        })
        .collect()
}

// =============================================================================
// SQL helpers
// =============================================================================

async fn insert_root(conn: &mut PgConnection, s: &Shipment) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipments (
            id, organization_id, business_unit_id, pro_number, status, bol,
            customer_id, service_type_id, shipment_type_id, tractor_type_id,
            trailer_type_id, rating_method, rating_unit, freight_charge_amount,
            other_charge_amount, total_charge_amount, weight, pieces,
            temperature_min, temperature_max, formula_template_id, owner_id,
            ready_to_bill, actual_ship_date, actual_delivery_date,
            canceled_at, canceled_by_id, cancel_reason, version, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
            $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31
        )
        "#,
    )
    .bind(&s.id)
    .bind(&s.organization_id)
    .bind(&s.business_unit_id)
    .bind(&s.pro_number)
    .bind(s.status)
    .bind(&s.bol)
    .bind(&s.customer_id)
    .bind(&s.service_type_id)
    .bind(&s.shipment_type_id)
    .bind(&s.tractor_type_id)
    .bind(&s.trailer_type_id)
    .bind(s.rating_method)
    .bind(s.rating_unit)
    .bind(s.freight_charge_amount)
    .bind(s.other_charge_amount)
    .bind(s.total_charge_amount)
    .bind(s.weight)
    .bind(s.pieces)
    .bind(s.temperature_min)
    .bind(s.temperature_max)
    .bind(&s.formula_template_id)
    .bind(&s.owner_id)
    .bind(s.ready_to_bill)
    .bind(s.actual_ship_date)
    .bind(s.actual_delivery_date)
    .bind(s.canceled_at)
    .bind(&s.canceled_by_id)
    .bind(&s.cancel_reason)
    .bind(s.version)
    .bind(s.created_at)
    .bind(s.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn update_root(conn: &mut PgConnection, s: &Shipment, now: Timestamp) -> RepoResult<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE shipments SET
            status = $5, bol = $6, customer_id = $7, service_type_id = $8,
            shipment_type_id = $9, tractor_type_id = $10, trailer_type_id = $11,
            rating_method = $12, rating_unit = $13, freight_charge_amount = $14,
            other_charge_amount = $15, total_charge_amount = $16, weight = $17,
            pieces = $18, temperature_min = $19, temperature_max = $20,
            formula_template_id = $21, owner_id = $22, ready_to_bill = $23,
            actual_ship_date = $24, actual_delivery_date = $25,
            version = version + 1, updated_at = $26
        WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3 AND version = $4
        "#,
    )
    .bind(&s.organization_id)
    .bind(&s.business_unit_id)
    .bind(&s.id)
    .bind(s.version)
    .bind(s.status)
    .bind(&s.bol)
    .bind(&s.customer_id)
    .bind(&s.service_type_id)
    .bind(&s.shipment_type_id)
    .bind(&s.tractor_type_id)
    .bind(&s.trailer_type_id)
    .bind(s.rating_method)
    .bind(s.rating_unit)
    .bind(s.freight_charge_amount)
    .bind(s.other_charge_amount)
    .bind(s.total_charge_amount)
    .bind(s.weight)
    .bind(s.pieces)
    .bind(s.temperature_min)
    .bind(s.temperature_max)
    .bind(&s.formula_template_id)
    .bind(&s.owner_id)
    .bind(s.ready_to_bill)
    .bind(s.actual_ship_date)
    .bind(s.actual_delivery_date)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(affected)
}

async fn insert_move(conn: &mut PgConnection, mv: &ShipmentMove) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipment_moves (
            id, shipment_id, organization_id, business_unit_id, sequence,
            status, loaded, distance, version, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&mv.id)
    .bind(&mv.shipment_id)
    .bind(&mv.organization_id)
    .bind(&mv.business_unit_id)
    .bind(mv.sequence)
    .bind(mv.status)
    .bind(mv.loaded)
    .bind(mv.distance)
    .bind(mv.version)
    .bind(mv.created_at)
    .bind(mv.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_stop(conn: &mut PgConnection, stop: &Stop) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stops (
            id, shipment_move_id, organization_id, business_unit_id, sequence,
            stop_type, status, location_id, address_line, pieces, weight,
            planned_arrival, planned_departure, actual_arrival, actual_departure,
            version, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18
        )
        "#,
    )
    .bind(&stop.id)
    .bind(&stop.shipment_move_id)
    .bind(&stop.organization_id)
    .bind(&stop.business_unit_id)
    .bind(stop.sequence)
    .bind(stop.stop_type)
    .bind(stop.status)
    .bind(&stop.location_id)
    .bind(&stop.address_line)
    .bind(stop.pieces)
    .bind(stop.weight)
    .bind(stop.planned_arrival)
    .bind(stop.planned_departure)
    .bind(stop.actual_arrival)
    .bind(stop.actual_departure)
    .bind(stop.version)
    .bind(stop.created_at)
    .bind(stop.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_commodity(conn: &mut PgConnection, line: &ShipmentCommodity) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipment_commodities (
            id, shipment_id, organization_id, business_unit_id, commodity_id,
            pieces, weight, version, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&line.id)
    .bind(&line.shipment_id)
    .bind(&line.organization_id)
    .bind(&line.business_unit_id)
    .bind(&line.commodity_id)
    .bind(line.pieces)
    .bind(line.weight)
    .bind(line.version)
    .bind(line.created_at)
    .bind(line.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_charge(conn: &mut PgConnection, charge: &AdditionalCharge) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO additional_charges (
            id, shipment_id, organization_id, business_unit_id,
            accessorial_charge_id, method, amount, unit, version,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&charge.id)
    .bind(&charge.shipment_id)
    .bind(&charge.organization_id)
    .bind(&charge.business_unit_id)
    .bind(&charge.accessorial_charge_id)
    .bind(charge.method)
    .bind(charge.amount)
    .bind(charge.unit)
    .bind(charge.version)
    .bind(charge.created_at)
    .bind(charge.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_comment(conn: &mut PgConnection, comment: &ShipmentComment) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipment_comments (
            id, shipment_id, organization_id, business_unit_id, user_id,
            text, version, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&comment.id)
    .bind(&comment.shipment_id)
    .bind(&comment.organization_id)
    .bind(&comment.business_unit_id)
    .bind(&comment.user_id)
    .bind(&comment.text)
    .bind(comment.version)
    .bind(comment.created_at)
    .bind(comment.updated_at)
    .execute(&mut *conn)
    .await?;

    // @mentions become explicit rows
    for username in extract_mentions(&comment.text) {
        sqlx::query(
            r#"
            INSERT INTO shipment_comment_mentions (
                id, comment_id, organization_id, business_unit_id, username, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(ids::generate(IdPrefix::ShipmentComment))
        .bind(&comment.id)
        .bind(&comment.organization_id)
        .bind(&comment.business_unit_id)
        .bind(&username)
        .bind(comment.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn delete_moves_cascade(
    conn: &mut PgConnection,
    tenant: &TenantScope,
    move_ids: &[String],
) -> RepoResult<()> {
    sqlx::query(
        "DELETE FROM assignments WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_move_id = ANY($3)",
    )
    .bind(&tenant.organization_id)
    .bind(&tenant.business_unit_id)
    .bind(move_ids)
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "DELETE FROM stops WHERE organization_id = $1 AND business_unit_id = $2 AND shipment_move_id = ANY($3)",
    )
    .bind(&tenant.organization_id)
    .bind(&tenant.business_unit_id)
    .bind(move_ids)
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "DELETE FROM shipment_moves WHERE organization_id = $1 AND business_unit_id = $2 AND id = ANY($3)",
    )
    .bind(&tenant.organization_id)
    .bind(&tenant.business_unit_id)
    .bind(move_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn delete_stops(
    conn: &mut PgConnection,
    tenant: &TenantScope,
    stop_ids: &[String],
) -> RepoResult<()> {
    sqlx::query(
        "DELETE FROM stops WHERE organization_id = $1 AND business_unit_id = $2 AND id = ANY($3)",
    )
    .bind(&tenant.organization_id)
    .bind(&tenant.business_unit_id)
    .bind(stop_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// Bulk CAS update of changed moves, joining against a VALUES list.
async fn bulk_update_moves(
    conn: &mut PgConnection,
    tenant: &TenantScope,
    moves: &[ShipmentMove],
    diff: &ChildDiff,
    now: Timestamp,
) -> RepoResult<()> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "UPDATE shipment_moves AS m SET \
         sequence = v.sequence, status = v.status, loaded = v.loaded, \
         distance = v.distance, version = m.version + 1, updated_at = v.updated_at \
         FROM (",
    );
    qb.push_values(diff.updates.iter().map(|i| &moves[*i]), |mut b, mv| {
        b.push_bind(&mv.id);
        b.push_bind(mv.sequence);
        b.push_bind(mv.status);
        b.push_bind(mv.loaded);
        b.push_bind(mv.distance);
        b.push_bind(now);
        b.push_bind(mv.version);
    });
    qb.push(
        ") AS v(id, sequence, status, loaded, distance, updated_at, version) \
         WHERE m.id = v.id AND m.version = v.version AND m.organization_id = ",
    );
    qb.push_bind(&tenant.organization_id);
    qb.push(" AND m.business_unit_id = ");
    qb.push_bind(&tenant.business_unit_id);

    let affected = qb.build().execute(&mut *conn).await?.rows_affected();
    if affected as usize != diff.updates.len() {
        let stale = find_stale_child(
            &mut *conn,
            "shipment_moves",
            diff.updates.iter().map(|i| {
                let mv = &moves[*i];
                (mv.id.clone(), mv.version)
            }),
        )
        .await?;
        return Err(RepoError::version_mismatch(
            "shipment_move",
            stale.unwrap_or_default(),
        ));
    }
    Ok(())
}

/// Bulk CAS update of changed stops across all surviving moves.
async fn bulk_update_stops(
    conn: &mut PgConnection,
    tenant: &TenantScope,
    moves: &[ShipmentMove],
    updates: &[(usize, usize)],
    now: Timestamp,
) -> RepoResult<()> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "UPDATE stops AS s SET \
         sequence = v.sequence, stop_type = v.stop_type, status = v.status, \
         location_id = v.location_id, address_line = v.address_line, \
         pieces = v.pieces, weight = v.weight, \
         planned_arrival = v.planned_arrival, planned_departure = v.planned_departure, \
         actual_arrival = v.actual_arrival, actual_departure = v.actual_departure, \
         version = s.version + 1, updated_at = v.updated_at \
         FROM (",
    );
    qb.push_values(
        updates.iter().map(|(i, j)| &moves[*i].stops[*j]),
        |mut b, st| {
            b.push_bind(&st.id);
            b.push_bind(st.sequence);
            b.push_bind(st.stop_type);
            b.push_bind(st.status);
            b.push_bind(&st.location_id);
            b.push_bind(&st.address_line);
            b.push_bind(st.pieces);
            b.push_bind(st.weight);
            b.push_bind(st.planned_arrival);
            b.push_bind(st.planned_departure);
            b.push_bind(st.actual_arrival);
            b.push_bind(st.actual_departure);
            b.push_bind(now);
            b.push_bind(st.version);
        },
    );
    qb.push(
        ") AS v(id, sequence, stop_type, status, location_id, address_line, \
         pieces, weight, planned_arrival, planned_departure, actual_arrival, \
         actual_departure, updated_at, version) \
         WHERE s.id = v.id AND s.version = v.version AND s.organization_id = ",
    );
    qb.push_bind(&tenant.organization_id);
    qb.push(" AND s.business_unit_id = ");
    qb.push_bind(&tenant.business_unit_id);

    let affected = qb.build().execute(&mut *conn).await?.rows_affected();
    if affected as usize != updates.len() {
        let stale = find_stale_child(
            &mut *conn,
            "stops",
            updates.iter().map(|(i, j)| {
                let st = &moves[*i].stops[*j];
                (st.id.clone(), st.version)
            }),
        )
        .await?;
        return Err(RepoError::version_mismatch("stop", stale.unwrap_or_default()));
    }
    Ok(())
}

/// After a short bulk-update, identify which child failed its CAS. Rows
/// that matched have `version = expected + 1`; anything else is stale.
async fn find_stale_child(
    conn: &mut PgConnection,
    table: &str,
    expected: impl Iterator<Item = (String, i64)>,
) -> RepoResult<Option<String>> {
    for (id, version) in expected {
        let query = format!("SELECT version FROM {table} WHERE id = $1");
        let row: Option<(i64,)> = sqlx::query_as(&query)
            .bind(&id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some((v,)) if v == version + 1 => continue,
            _ => return Ok(Some(id)),
        }
    }
    Ok(None)
}

async fn apply_commodity_diff(
    conn: &mut PgConnection,
    tenant: &TenantScope,
    incoming: &mut Shipment,
    diff: &ChildDiff,
    now: Timestamp,
) -> RepoResult<()> {
    if !diff.delete_ids.is_empty() {
        sqlx::query(
            "DELETE FROM shipment_commodities WHERE organization_id = $1 AND business_unit_id = $2 AND id = ANY($3)",
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&diff.delete_ids)
        .execute(&mut *conn)
        .await?;
    }
    for idx in &diff.inserts {
        insert_commodity(&mut *conn, &incoming.commodities[*idx]).await?;
    }
    for idx in &diff.updates {
        let line = &incoming.commodities[*idx];
        let affected = sqlx::query(
            r#"
            UPDATE shipment_commodities SET
                commodity_id = $5, pieces = $6, weight = $7,
                version = version + 1, updated_at = $8
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3 AND version = $4
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&line.id)
        .bind(line.version)
        .bind(&line.commodity_id)
        .bind(line.pieces)
        .bind(line.weight)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::version_mismatch("shipment_commodity", &line.id));
        }
        incoming.commodities[*idx].version += 1;
    }
    Ok(())
}

async fn apply_charge_diff(
    conn: &mut PgConnection,
    tenant: &TenantScope,
    incoming: &mut Shipment,
    diff: &ChildDiff,
    now: Timestamp,
) -> RepoResult<()> {
    if !diff.delete_ids.is_empty() {
        sqlx::query(
            "DELETE FROM additional_charges WHERE organization_id = $1 AND business_unit_id = $2 AND id = ANY($3)",
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&diff.delete_ids)
        .execute(&mut *conn)
        .await?;
    }
    for idx in &diff.inserts {
        insert_charge(&mut *conn, &incoming.additional_charges[*idx]).await?;
    }
    for idx in &diff.updates {
        let charge = &incoming.additional_charges[*idx];
        let affected = sqlx::query(
            r#"
            UPDATE additional_charges SET
                accessorial_charge_id = $5, method = $6, amount = $7, unit = $8,
                version = version + 1, updated_at = $9
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = $3 AND version = $4
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(&charge.id)
        .bind(charge.version)
        .bind(&charge.accessorial_charge_id)
        .bind(charge.method)
        .bind(charge.amount)
        .bind(charge.unit)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::version_mismatch("additional_charge", &charge.id));
        }
        incoming.additional_charges[*idx].version += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::StopType;

    fn original() -> Shipment {
        let mut s = Shipment {
            id: "shp_orig".into(),
            organization_id: "org_1".into(),
            business_unit_id: "bu_1".into(),
            pro_number: "S00000001".into(),
            status: ShipmentStatus::Billed,
            bol: "BOL-9".into(),
            customer_id: "cust_1".into(),
            actual_ship_date: Some(100),
            actual_delivery_date: Some(200),
            version: 7,
            ..Shipment::default()
        };
        s.moves = vec![ShipmentMove {
            id: "smv_orig".into(),
            shipment_id: s.id.clone(),
            status: MoveStatus::Completed,
            version: 3,
            stops: vec![
                Stop {
                    id: "stp_a".into(),
                    stop_type: StopType::Pickup,
                    status: StopStatus::Completed,
                    planned_arrival: 100,
                    planned_departure: 200,
                    actual_arrival: Some(110),
                    actual_departure: Some(150),
                    ..Stop::default()
                },
                Stop {
                    id: "stp_b".into(),
                    stop_type: StopType::Delivery,
                    status: StopStatus::Completed,
                    planned_arrival: 300,
                    planned_departure: 400,
                    actual_arrival: Some(310),
                    actual_departure: Some(350),
                    ..Stop::default()
                },
            ],
            ..ShipmentMove::default()
        }];
        s.commodities = vec![ShipmentCommodity {
            id: "cg_1".into(),
            commodity_id: "cmd_1".into(),
            pieces: 4,
            ..ShipmentCommodity::default()
        }];
        s.comments = vec![ShipmentComment {
            id: "sc_1".into(),
            text: "original note".into(),
            ..ShipmentComment::default()
        }];
        s
    }

    fn dup_req(count: u32, override_dates: bool) -> DuplicateRequest {
        DuplicateRequest {
            shipment_id: "shp_orig".into(),
            count,
            override_dates,
            include_commodities: true,
            include_additional_charges: false,
            include_comments: false,
            tenant: TenantScope::new("org_1", "bu_1"),
        }
    }

    #[test]
    fn duplicates_reset_everything_to_new() {
        let pros = vec!["S00000002".to_string(), "S00000003".to_string()];
        let copies = build_duplicates(&original(), &pros, &dup_req(2, false), 1_000);

        assert_eq!(copies.len(), 2);
        for (copy, pro) in copies.iter().zip(&pros) {
            assert_ne!(copy.id, "shp_orig");
            assert_eq!(&copy.pro_number, pro);
            assert_eq!(copy.status, ShipmentStatus::New);
            assert_eq!(copy.bol, "GENERATED-COPY");
            assert_eq!(copy.version, 0);
            assert!(copy.actual_ship_date.is_none());
            for mv in &copy.moves {
                assert_eq!(mv.status, MoveStatus::New);
                assert!(mv.assignment.is_none());
                assert_eq!(mv.shipment_id, copy.id);
                for stop in &mv.stops {
                    assert_eq!(stop.status, StopStatus::New);
                    assert!(stop.actual_arrival.is_none());
                    // dates untouched when override_dates is false
                    assert_eq!(stop.planned_arrival % 100, 0);
                }
            }
            // commodities copied with fresh ids, comments excluded
            assert_eq!(copy.commodities.len(), 1);
            assert_ne!(copy.commodities[0].id, "cg_1");
            assert!(copy.comments.is_empty());
        }
        // ids unique within batch
        assert_ne!(copies[0].id, copies[1].id);
        assert_ne!(copies[0].pro_number, copies[1].pro_number);
    }

    #[test]
    fn duplicates_can_reset_planned_windows() {
        let pros = vec!["S00000002".to_string()];
        let copies = build_duplicates(&original(), &pros, &dup_req(1, true), 5_000);
        let stop = &copies[0].moves[0].stops[0];
        assert_eq!(stop.planned_arrival, 5_000);
        assert_eq!(stop.planned_departure, 5_000 + ONE_DAY_SECS);
    }

    #[test]
    fn stop_retention_guard() {
        let pickup = Stop {
            stop_type: StopType::Pickup,
            ..Stop::default()
        };
        let delivery = Stop {
            stop_type: StopType::Delivery,
            ..Stop::default()
        };
        assert!(assert_stop_retention(&[pickup.clone(), delivery.clone()]).is_ok());
        assert!(assert_stop_retention(&[pickup.clone()]).is_err());
        assert!(assert_stop_retention(&[pickup.clone(), pickup.clone()]).is_err());
        assert!(assert_stop_retention(&[delivery.clone(), delivery]).is_err());
    }

    #[test]
    fn child_identity_assignment_fills_blanks_only() {
        let mut s = original();
        s.moves[0].stops.push(Stop {
            stop_type: StopType::Delivery,
            planned_arrival: 500,
            planned_departure: 600,
            ..Stop::default()
        });
        assign_child_identity(&mut s, 9_000);

        // existing ids untouched, the new stop got one
        assert_eq!(s.moves[0].stops[0].id, "stp_a");
        let new_stop = &s.moves[0].stops[2];
        assert!(new_stop.id.starts_with("stp_"));
        assert_eq!(new_stop.shipment_move_id, "smv_orig");
        assert_eq!(new_stop.organization_id, "org_1");
        assert_eq!(new_stop.created_at, 9_000);
    }
}
