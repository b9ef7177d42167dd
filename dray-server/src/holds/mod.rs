//! Hold registry
//!
//! Holds are named predicates attached to a shipment that can gate
//! dispatch, delivery, or billing independently of the state machine.
//! Gating is purely a function of the *active* holds (no `released_at`).

pub mod registry;

pub use registry::{HoldGates, seed_from_reason, validate_severity_rule};
