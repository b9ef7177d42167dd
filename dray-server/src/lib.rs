//! Drayage Server — shipment lifecycle engine
//!
//! # Architecture
//!
//! The engine keeps a shipment internally consistent under concurrent
//! writes: a three-level hierarchical state machine (shipment ← moves ←
//! stops) with bottom-up derivation, a charge calculator, a transactional
//! aggregate repository with optimistic concurrency, a hold subsystem that
//! gates dispatch/delivery/billing, and an event trigger layer fed by
//! lifecycle events and CDC.
//!
//! # Module structure
//!
//! ```text
//! dray-server/src/
//! ├── core/          # config, state, errors, background tasks
//! ├── db/            # models, repositories, migrations
//! ├── statemachine/  # stop/move/shipment machines + coordinator
//! ├── pricing/       # charge calculator + formula oracle
//! ├── distance/      # override short-circuit + haversine
//! ├── holds/         # hold gates and seeding
//! ├── validation/    # staged rule pipeline + validators
//! ├── services/      # shipment / assignment / hold orchestration
//! ├── jobs/          # job queue + lifecycle triggers
//! └── cdc/           # change-data-capture consumer
//! ```

pub mod cdc;
pub mod core;
pub mod db;
pub mod distance;
pub mod holds;
pub mod jobs;
pub mod pricing;
pub mod services;
pub mod statemachine;
pub mod validation;

// Re-export the common entry types
pub use core::{AppState, Config};
