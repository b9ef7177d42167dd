//! Hierarchical state machines (stop ← move ← shipment)
//!
//! Each machine is data: a table of `(from, event) → to` entries plus an
//! event-derivation function that reads current facts (actual times,
//! attached assignments, child statuses). The coordinator walks the three
//! levels bottom-up and re-derives everything in one pass.
//!
//! Transition attempts are idempotent: replaying an event whose target the
//! entity already occupies is a no-op, not an error. Terminal states reject
//! everything else.

pub mod coordinator;
pub mod shipment;
pub mod shipment_move;
pub mod stop;

pub use coordinator::{recompute, recompute_with_parallel_stops};
pub use shipment::ShipmentEvent;
pub use shipment_move::MoveEvent;
pub use stop::StopEvent;

/// Outcome of a single transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<S> {
    /// Transitioned to a new state
    Moved(S),
    /// Already at the event's target; nothing to do
    NoOp,
    /// The pair (from, event) is not in the table
    Denied,
}
