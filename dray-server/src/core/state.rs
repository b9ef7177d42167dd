//! Shared application state

use std::sync::Arc;

use crate::core::Config;
use crate::db::DbService;
use crate::db::repository::{
    AssignmentRepository, ControlRepository, HoldRepository, LocationRepository,
    ProNumberSequence, ShipmentRepository,
};
use crate::jobs::{JobQueue, ShipmentTriggers};
use crate::pricing::{ChargeCalculator, NoFormulaOracle};
use crate::services::{AssignmentService, HoldService, LogNotifier, ShipmentService};

/// Application state — holds shared references to every service.
///
/// Built once at startup; `Clone` is shallow (pools and `Arc`s).
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DbService,
    pub queue: JobQueue,
    pub shipments: ShipmentService,
    pub assignments: AssignmentService,
    pub holds: HoldService,
}

impl AppState {
    /// Wire repositories and services over the connected pools.
    pub fn new(config: Config, db: DbService, queue: JobQueue) -> Self {
        let locations = LocationRepository::new(db.read.clone());
        let shipment_repo =
            ShipmentRepository::new(db.write.clone(), db.read.clone(), locations.clone());
        let controls = ControlRepository::new(db.read.clone());
        let sequence = ProNumberSequence::new(db.write.clone());
        let hold_repo = HoldRepository::new(db.write.clone());
        let assignment_repo = AssignmentRepository::new(db.write.clone());

        let calculator = Arc::new(ChargeCalculator::new(Arc::new(NoFormulaOracle)));
        let triggers = ShipmentTriggers::new(queue.clone());

        let shipments = ShipmentService::new(
            shipment_repo.clone(),
            controls,
            sequence,
            hold_repo.clone(),
            calculator,
            triggers,
        );
        let assignments = AssignmentService::new(assignment_repo, shipment_repo.clone());
        let holds = HoldService::new(hold_repo, shipment_repo, Arc::new(LogNotifier));

        Self {
            config,
            db,
            queue,
            shipments,
            assignments,
            holds,
        }
    }
}
