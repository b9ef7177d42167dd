//! Stop state machine

use crate::db::models::{Stop, StopStatus};

use super::Attempt;

/// Events a stop can experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    Arrived,
    Departed,
    Canceled,
}

impl StopEvent {
    /// Every event lands in exactly one state.
    pub const fn target(&self) -> StopStatus {
        match self {
            Self::Arrived => StopStatus::InTransit,
            Self::Departed => StopStatus::Completed,
            Self::Canceled => StopStatus::Canceled,
        }
    }
}

/// Legal transitions; unlisted pairs are forbidden.
const TRANSITIONS: &[(StopStatus, StopEvent)] = &[
    (StopStatus::New, StopEvent::Arrived),
    (StopStatus::New, StopEvent::Departed),
    (StopStatus::New, StopEvent::Canceled),
    (StopStatus::InTransit, StopEvent::Departed),
    (StopStatus::InTransit, StopEvent::Canceled),
    (StopStatus::Completed, StopEvent::Canceled),
];

/// Attempt a transition. Replaying an event at its own target is a no-op.
pub fn attempt(current: StopStatus, event: StopEvent) -> Attempt<StopStatus> {
    if TRANSITIONS.contains(&(current, event)) {
        Attempt::Moved(event.target())
    } else if current == event.target() {
        Attempt::NoOp
    } else {
        Attempt::Denied
    }
}

/// Derive the pending event from a stop's actual times.
///
/// Both actuals set → Departed; only an arrival → Arrived; otherwise none.
pub fn derive_event(stop: &Stop) -> Option<StopEvent> {
    match (stop.actual_arrival, stop.actual_departure) {
        (Some(_), Some(_)) | (None, Some(_)) => Some(StopEvent::Departed),
        (Some(_), None) => Some(StopEvent::Arrived),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_with(arrival: Option<i64>, departure: Option<i64>) -> Stop {
        Stop {
            actual_arrival: arrival,
            actual_departure: departure,
            ..Stop::default()
        }
    }

    #[test]
    fn arrival_only_derives_arrived() {
        assert_eq!(derive_event(&stop_with(Some(150), None)), Some(StopEvent::Arrived));
    }

    #[test]
    fn both_actuals_derive_departed() {
        assert_eq!(
            derive_event(&stop_with(Some(150), Some(190))),
            Some(StopEvent::Departed)
        );
    }

    #[test]
    fn no_actuals_derive_nothing() {
        assert_eq!(derive_event(&stop_with(None, None)), None);
    }

    #[test]
    fn new_can_skip_straight_to_completed() {
        assert_eq!(
            attempt(StopStatus::New, StopEvent::Departed),
            Attempt::Moved(StopStatus::Completed)
        );
    }

    #[test]
    fn canceled_is_terminal() {
        assert_eq!(attempt(StopStatus::Canceled, StopEvent::Arrived), Attempt::Denied);
        assert_eq!(attempt(StopStatus::Canceled, StopEvent::Departed), Attempt::Denied);
        // replaying the cancel itself is a no-op
        assert_eq!(attempt(StopStatus::Canceled, StopEvent::Canceled), Attempt::NoOp);
    }

    #[test]
    fn completed_rejects_arrival() {
        assert_eq!(attempt(StopStatus::Completed, StopEvent::Arrived), Attempt::Denied);
    }

    #[test]
    fn replay_at_target_is_noop() {
        assert_eq!(attempt(StopStatus::Completed, StopEvent::Departed), Attempt::NoOp);
    }
}
