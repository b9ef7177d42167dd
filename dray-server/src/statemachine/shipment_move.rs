//! Move state machine

use crate::db::models::{MoveStatus, ShipmentMove, StopStatus};

use super::Attempt;

/// Events a move can experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveEvent {
    Assigned,
    Started,
    Completed,
    Canceled,
}

impl MoveEvent {
    pub const fn target(&self) -> MoveStatus {
        match self {
            Self::Assigned => MoveStatus::Assigned,
            Self::Started => MoveStatus::InTransit,
            Self::Completed => MoveStatus::Completed,
            Self::Canceled => MoveStatus::Canceled,
        }
    }
}

/// Legal transitions; unlisted pairs are forbidden.
const TRANSITIONS: &[(MoveStatus, MoveEvent)] = &[
    (MoveStatus::New, MoveEvent::Assigned),
    (MoveStatus::New, MoveEvent::Started),
    (MoveStatus::New, MoveEvent::Completed),
    (MoveStatus::New, MoveEvent::Canceled),
    (MoveStatus::Assigned, MoveEvent::Started),
    (MoveStatus::Assigned, MoveEvent::Completed),
    (MoveStatus::Assigned, MoveEvent::Canceled),
    (MoveStatus::InTransit, MoveEvent::Completed),
    (MoveStatus::InTransit, MoveEvent::Canceled),
    (MoveStatus::Completed, MoveEvent::Canceled),
];

/// Attempt a transition. Replaying an event at its own target is a no-op.
pub fn attempt(current: MoveStatus, event: MoveEvent) -> Attempt<MoveStatus> {
    if TRANSITIONS.contains(&(current, event)) {
        Attempt::Moved(event.target())
    } else if current == event.target() {
        Attempt::NoOp
    } else {
        Attempt::Denied
    }
}

/// Derive the pending event from the move's stops and attached assignment.
///
/// All stops Completed → Completed; else origin stop Completed or any stop
/// InTransit → Started; else a New move with an active assignment →
/// Assigned; else none. A move with no stops derives nothing.
pub fn derive_event(mv: &ShipmentMove) -> Option<MoveEvent> {
    if mv.stops.is_empty() {
        return None;
    }
    if mv.stops.iter().all(|s| s.status == StopStatus::Completed) {
        return Some(MoveEvent::Completed);
    }
    let origin_completed = mv
        .stops
        .first()
        .is_some_and(|s| s.status == StopStatus::Completed);
    let any_in_transit = mv.stops.iter().any(|s| s.status == StopStatus::InTransit);
    if origin_completed || any_in_transit {
        return Some(MoveEvent::Started);
    }
    if mv.status == MoveStatus::New && mv.active_assignment().is_some() {
        return Some(MoveEvent::Assigned);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Assignment, AssignmentStatus, Stop};

    fn stop(status: StopStatus) -> Stop {
        Stop {
            status,
            ..Stop::default()
        }
    }

    fn mv(status: MoveStatus, stops: Vec<Stop>) -> ShipmentMove {
        ShipmentMove {
            status,
            stops,
            ..ShipmentMove::default()
        }
    }

    #[test]
    fn all_stops_completed_derives_completed() {
        let m = mv(
            MoveStatus::InTransit,
            vec![stop(StopStatus::Completed), stop(StopStatus::Completed)],
        );
        assert_eq!(derive_event(&m), Some(MoveEvent::Completed));
    }

    #[test]
    fn origin_completed_derives_started() {
        let m = mv(
            MoveStatus::New,
            vec![stop(StopStatus::Completed), stop(StopStatus::New)],
        );
        assert_eq!(derive_event(&m), Some(MoveEvent::Started));
    }

    #[test]
    fn any_stop_in_transit_derives_started() {
        let m = mv(
            MoveStatus::Assigned,
            vec![stop(StopStatus::InTransit), stop(StopStatus::New)],
        );
        assert_eq!(derive_event(&m), Some(MoveEvent::Started));
    }

    #[test]
    fn new_move_with_assignment_derives_assigned() {
        let mut m = mv(MoveStatus::New, vec![stop(StopStatus::New), stop(StopStatus::New)]);
        m.assignment = Some(Assignment::default());
        assert_eq!(derive_event(&m), Some(MoveEvent::Assigned));
    }

    #[test]
    fn canceled_assignment_does_not_count() {
        let mut m = mv(MoveStatus::New, vec![stop(StopStatus::New), stop(StopStatus::New)]);
        m.assignment = Some(Assignment {
            status: AssignmentStatus::Canceled,
            ..Assignment::default()
        });
        assert_eq!(derive_event(&m), None);
    }

    #[test]
    fn assigned_move_with_quiet_stops_derives_nothing() {
        let mut m = mv(
            MoveStatus::Assigned,
            vec![stop(StopStatus::New), stop(StopStatus::New)],
        );
        m.assignment = Some(Assignment::default());
        assert_eq!(derive_event(&m), None);
    }

    #[test]
    fn completed_can_only_cancel() {
        assert_eq!(
            attempt(MoveStatus::Completed, MoveEvent::Canceled),
            Attempt::Moved(MoveStatus::Canceled)
        );
        assert_eq!(attempt(MoveStatus::Completed, MoveEvent::Started), Attempt::Denied);
        assert_eq!(attempt(MoveStatus::Completed, MoveEvent::Completed), Attempt::NoOp);
    }

    #[test]
    fn canceled_is_terminal() {
        assert_eq!(attempt(MoveStatus::Canceled, MoveEvent::Started), Attempt::Denied);
        assert_eq!(attempt(MoveStatus::Canceled, MoveEvent::Completed), Attempt::Denied);
    }
}
