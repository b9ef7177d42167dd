//! Pro-number sequence generator
//!
//! Allocates tenant-scoped monotonic pro-numbers in batches. Allocation is
//! serialized per `(organization, business unit)` with `SELECT … FOR
//! UPDATE` on the counter row, so concurrent callers can never observe the
//! same value. The produced format is an opaque ascending string.

use sqlx::PgPool;
use shared::error::ErrorCode;
use shared::types::TenantScope;

use super::{RepoError, RepoResult, require_tenant};

#[derive(Clone)]
pub struct ProNumberSequence {
    pool: PgPool,
}

impl ProNumberSequence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Allocate one pro-number.
    pub async fn next(&self, tenant: &TenantScope) -> RepoResult<String> {
        self.next_batch(tenant, 1).await?.pop().ok_or_else(|| {
            RepoError::business(ErrorCode::InternalError, "sequence batch came back empty")
        })
    }

    /// Allocate `n` pro-numbers in one round-trip batch.
    pub async fn next_batch(&self, tenant: &TenantScope, n: u32) -> RepoResult<Vec<String>> {
        require_tenant(tenant)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        // counter row must exist before it can be locked
        sqlx::query(
            r#"
            INSERT INTO pro_number_sequences (organization_id, business_unit_id, current_value)
            VALUES ($1, $2, 0)
            ON CONFLICT (organization_id, business_unit_id) DO NOTHING
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .execute(&mut *tx)
        .await?;

        let (current,): (i64,) = sqlx::query_as(
            r#"
            SELECT current_value FROM pro_number_sequences
            WHERE organization_id = $1 AND business_unit_id = $2
            FOR UPDATE
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .fetch_one(&mut *tx)
        .await?;

        let last = current + i64::from(n);
        sqlx::query(
            r#"
            UPDATE pro_number_sequences SET current_value = $3
            WHERE organization_id = $1 AND business_unit_id = $2
            "#,
        )
        .bind(&tenant.organization_id)
        .bind(&tenant.business_unit_id)
        .bind(last)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(((current + 1)..=last).map(format_pro_number).collect())
    }
}

/// Zero-padded so string order matches allocation order.
fn format_pro_number(value: i64) -> String {
    format!("S{value:08}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pro_numbers_are_ascending_strings() {
        let a = format_pro_number(41);
        let b = format_pro_number(42);
        let c = format_pro_number(100_000);
        assert_eq!(a, "S00000041");
        assert!(a < b && b < c);
    }
}
