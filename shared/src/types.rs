//! Common types for the shared crate
//!
//! Utility types used across the engine.

use serde::{Deserialize, Serialize};

/// Timestamp type (Unix seconds, UTC)
pub type Timestamp = i64;

/// Tenant scoping keys carried by every read and write.
///
/// Queries that omit these are programming errors, so the pair travels as
/// one value instead of two loose strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    pub organization_id: String,
    pub business_unit_id: String,
}

impl TenantScope {
    pub fn new(organization_id: impl Into<String>, business_unit_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            business_unit_id: business_unit_id.into(),
        }
    }
}

impl std::fmt::Display for TenantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.organization_id, self.business_unit_id)
    }
}
