//! Service layer
//!
//! Orchestrates validator → repository → triggers per operation. Services
//! own no state besides handles; everything is cheap to clone.

pub mod assignment;
pub mod hold;
pub mod shipment;

pub use assignment::AssignmentService;
pub use hold::{HoldService, HoldShipmentRequest, LogNotifier, Notifier};
pub use shipment::ShipmentService;
