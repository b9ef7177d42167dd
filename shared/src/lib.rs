//! Shared types for the Drayage TMS
//!
//! Common types used across crates: entity identifiers, tenant scoping,
//! error codes, monetary helpers, and engine event types.

pub mod error;
pub mod events;
pub mod ids;
pub mod money;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Error re-exports (for convenient access)
pub use error::{AppError, AppResult, ErrorCode};

// Tenant re-exports
pub use types::{TenantScope, Timestamp};
