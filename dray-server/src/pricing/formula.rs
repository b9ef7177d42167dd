//! Formula oracle
//!
//! Formula-template rating delegates to an external evaluator treated as a
//! pure `(template, shipment, principal) → decimal` function. The engine
//! only depends on this trait; the inline implementation must stay
//! replaceable by a test double.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::models::Shipment;

/// Failures surfaced by a formula evaluator.
///
/// The charge calculator treats every variant the same way: log a warning
/// and rate the shipment at zero.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("formula template '{0}' not found")]
    TemplateNotFound(String),
    #[error("formula evaluation failed: {0}")]
    Evaluation(String),
    #[error("no formula evaluator is configured")]
    Unavailable,
}

/// External formula evaluator.
#[async_trait]
pub trait FormulaOracle: Send + Sync {
    async fn evaluate(
        &self,
        template_id: &str,
        shipment: &Shipment,
        principal_id: &str,
    ) -> Result<Decimal, FormulaError>;
}

/// Default oracle for deployments without a formula service.
pub struct NoFormulaOracle;

#[async_trait]
impl FormulaOracle for NoFormulaOracle {
    async fn evaluate(
        &self,
        _template_id: &str,
        _shipment: &Shipment,
        _principal_id: &str,
    ) -> Result<Decimal, FormulaError> {
        Err(FormulaError::Unavailable)
    }
}
