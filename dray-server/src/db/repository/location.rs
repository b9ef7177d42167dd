//! Location and distance-override lookups

use std::collections::HashMap;

use sqlx::PgPool;
use shared::types::TenantScope;

use crate::db::models::{DistanceOverride, Location, ShipmentMove};
use crate::distance::{self, DistanceOutcome};

use super::{RepoResult, require_tenant};

#[derive(Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the locations referenced by the given ids, keyed by id.
    pub async fn find_by_ids(
        &self,
        tenant: &TenantScope,
        ids: &[String],
    ) -> RepoResult<HashMap<String, Location>> {
        require_tenant(tenant)?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<Location> = sqlx::query_as(
            r#"
            SELECT * FROM locations
            WHERE organization_id = $1 AND business_unit_id = $2 AND id = ANY($3)
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|l| (l.id.clone(), l)).collect())
    }

    /// Exact-match distance override for an (origin, destination) pair.
    pub async fn find_override(
        &self,
        tenant: &TenantScope,
        origin_location_id: &str,
        destination_location_id: &str,
    ) -> RepoResult<Option<DistanceOverride>> {
        require_tenant(tenant)?;
        let row = sqlx::query_as(
            r#"
            SELECT * FROM distance_overrides
            WHERE organization_id = $1 AND business_unit_id = $2
              AND origin_location_id = $3 AND destination_location_id = $4
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(origin_location_id)
        .bind(destination_location_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Resolve a move's distance: the override lookup and the location
    /// fetch run concurrently, then the pure calculator decides.
    ///
    /// Returns `None` for moves with fewer than two stops (zero-distance
    /// no-op for the caller).
    pub async fn resolve_move_distance(
        &self,
        tenant: &TenantScope,
        mv: &ShipmentMove,
    ) -> RepoResult<Option<distance::DistanceResult>> {
        let (Some(first), Some(last)) = (mv.stops.first(), mv.stops.last()) else {
            return Ok(None);
        };
        if mv.stops.len() < 2 {
            return Ok(None);
        }

        let location_ids: Vec<String> = mv.stops.iter().map(|s| s.location_id.clone()).collect();
        let (override_entry, locations) = tokio::try_join!(
            self.find_override(tenant, &first.location_id, &last.location_id),
            self.find_by_ids(tenant, &location_ids),
        )?;

        match distance::calculate(&mv.stops, &locations, override_entry.as_ref()) {
            DistanceOutcome::Computed(result) => Ok(Some(result)),
            DistanceOutcome::InsufficientStops => Ok(None),
        }
    }
}
