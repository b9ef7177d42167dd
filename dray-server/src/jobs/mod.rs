//! Job queue and shipment event triggers
//!
//! - **queue**: in-process job queue with unique-key dedup windows,
//!   delayed execution, and at-least-once delivery to a worker
//! - **triggers**: well-known jobs fired on shipment lifecycle events

pub mod queue;
pub mod triggers;

pub use queue::{Job, JobHandler, JobKind, JobQueue, JobWorker};
pub use triggers::ShipmentTriggers;
