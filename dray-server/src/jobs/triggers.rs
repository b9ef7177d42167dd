//! Shipment event triggers
//!
//! Fires the well-known jobs on committed shipment events:
//!
//! - `analyzePatterns` with `uniqueKey = pattern_analysis_shipment_<customer>`
//!   and a 30 s delay (60 s when the shipment completed) — duplicates within
//!   the window collapse
//! - `shipmentStatusUpdate` on any status change
//!
//! Trigger failures downstream of a successful write are logged and never
//! fail the primary operation.

use serde_json::json;

use shared::events::{ShipmentEvent, ShipmentEventKind};
use shared::util::now_secs;

use super::queue::{Job, JobKind, JobQueue};

/// Unique-key prefixes for pattern analysis jobs.
pub const PATTERN_ANALYSIS_SHIPMENT_PREFIX: &str = "pattern_analysis_shipment_";
pub const PATTERN_ANALYSIS_CUSTOMER_PREFIX: &str = "pattern_analysis_customer_";

/// Delay before pattern analysis runs (seconds).
const PATTERN_DELAY_SECS: i64 = 30;
/// Longer window once a shipment completes.
const PATTERN_DELAY_COMPLETED_SECS: i64 = 60;

#[derive(Clone)]
pub struct ShipmentTriggers {
    queue: JobQueue,
}

impl ShipmentTriggers {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }

    /// Fire the jobs appropriate for a committed shipment event.
    pub async fn notify(&self, event: &ShipmentEvent) {
        match event.kind {
            ShipmentEventKind::Created
            | ShipmentEventKind::StatusChanged
            | ShipmentEventKind::Completed => {
                self.enqueue_pattern_analysis(event).await;
                if event.kind != ShipmentEventKind::Created {
                    self.enqueue_status_update(event).await;
                }
            }
            ShipmentEventKind::Canceled | ShipmentEventKind::Uncanceled => {
                self.enqueue_status_update(event).await;
            }
            ShipmentEventKind::HoldApplied | ShipmentEventKind::HoldReleased => {}
        }
    }

    async fn enqueue_pattern_analysis(&self, event: &ShipmentEvent) {
        let delay = if event.kind == ShipmentEventKind::Completed {
            PATTERN_DELAY_COMPLETED_SECS
        } else {
            PATTERN_DELAY_SECS
        };
        let job = Job {
            kind: JobKind::AnalyzePatterns,
            unique_key: Some(format!(
                "{PATTERN_ANALYSIS_SHIPMENT_PREFIX}{}",
                event.customer_id
            )),
            run_at: now_secs() + delay,
            payload: json!({
                "organizationId": event.tenant.organization_id,
                "businessUnitId": event.tenant.business_unit_id,
                "userId": event.user_id,
                "timestamp": event.timestamp,
                "customerId": event.customer_id,
                "shipmentId": event.shipment_id,
            }),
        };
        self.queue.enqueue(job).await;
    }

    async fn enqueue_status_update(&self, event: &ShipmentEvent) {
        let job = Job {
            kind: JobKind::ShipmentStatusUpdate,
            unique_key: None,
            run_at: now_secs(),
            payload: json!({
                "organizationId": event.tenant.organization_id,
                "businessUnitId": event.tenant.business_unit_id,
                "userId": event.user_id,
                "timestamp": event.timestamp,
                "shipmentId": event.shipment_id,
                "previousStatus": event.previous_status,
                "newStatus": event.new_status,
            }),
        };
        self.queue.enqueue(job).await;
    }
}
