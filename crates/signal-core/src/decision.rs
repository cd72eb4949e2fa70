//! Decision Dispatcher: which signal counts as "confirm" right now.
//!
//! Not a state machine. The dispatcher latches one-shot gesture events until
//! the consumer clears them and answers, per frame, whether the active
//! method's signal has crossed its threshold.

use gazelink_tracking_model::decision::DecisionMethod;
use gazelink_tracking_model::tuning::PipelineTuning;
use serde::{Deserialize, Serialize};

use crate::gesture::GestureEvents;

/// A completed gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    DeepBlink,
    DoubleMouthOpen,
}

impl GestureKind {
    /// The decision method this gesture confirms under.
    pub fn method(&self) -> DecisionMethod {
        match self {
            Self::DeepBlink => DecisionMethod::SustainedBlink,
            Self::DoubleMouthOpen => DecisionMethod::DoubleMouthOpen,
        }
    }
}

/// What a completed gesture means in the current context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureIntent {
    Confirm,
    RequestRecalibration,
    Ignore,
}

/// Route a gesture by context.
///
/// In the decision-selection phase only the gesture matching `method`
/// confirms. Outside it a deep blink asks for recalibration.
pub fn route_gesture(
    kind: GestureKind,
    in_selection_phase: bool,
    method: DecisionMethod,
) -> GestureIntent {
    if in_selection_phase {
        if kind.method() == method {
            GestureIntent::Confirm
        } else {
            GestureIntent::Ignore
        }
    } else if kind == GestureKind::DeepBlink {
        GestureIntent::RequestRecalibration
    } else {
        GestureIntent::Ignore
    }
}

pub struct DecisionDispatcher {
    method: DecisionMethod,
    dwell_confirm_secs: f64,
    deep_blink_pending: bool,
    double_mouth_open_pending: bool,
}

impl DecisionDispatcher {
    pub fn new(method: DecisionMethod, dwell_confirm_secs: f64) -> Self {
        Self {
            method,
            dwell_confirm_secs,
            deep_blink_pending: false,
            double_mouth_open_pending: false,
        }
    }

    pub fn from_tuning(method: DecisionMethod, tuning: &PipelineTuning) -> Self {
        Self::new(method, tuning.decision.dwell_confirm_secs)
    }

    pub fn method(&self) -> DecisionMethod {
        self.method
    }

    pub fn set_method(&mut self, method: DecisionMethod) {
        if self.method != method {
            tracing::info!(method = %method, "Decision method changed");
        }
        self.method = method;
    }

    /// Latch this frame's gesture events. Both are kept when they coincide.
    pub fn record(&mut self, events: GestureEvents) {
        self.deep_blink_pending |= events.deep_blink;
        self.double_mouth_open_pending |= events.double_mouth_open;
    }

    /// Whether the active method's signal has crossed its threshold.
    pub fn confirmation_ready(&self, dwell_time: f64) -> bool {
        match self.method {
            DecisionMethod::Dwell => dwell_time >= self.dwell_confirm_secs,
            DecisionMethod::SustainedBlink => self.deep_blink_pending,
            DecisionMethod::DoubleMouthOpen => self.double_mouth_open_pending,
        }
    }

    /// Consume the active method's confirmation. Returns whether one was
    /// pending. For dwell the caller resets the dwell timer itself.
    pub fn consume_confirmation(&mut self, dwell_time: f64) -> bool {
        let ready = self.confirmation_ready(dwell_time);
        match self.method {
            DecisionMethod::Dwell => {}
            DecisionMethod::SustainedBlink => self.deep_blink_pending = false,
            DecisionMethod::DoubleMouthOpen => self.double_mouth_open_pending = false,
        }
        ready
    }

    pub fn clear_deep_blink(&mut self) {
        self.deep_blink_pending = false;
    }

    pub fn clear_double_mouth_open(&mut self) {
        self.double_mouth_open_pending = false;
    }

    pub fn deep_blink_pending(&self) -> bool {
        self.deep_blink_pending
    }

    pub fn double_mouth_open_pending(&self) -> bool {
        self.double_mouth_open_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: GestureEvents = GestureEvents {
        deep_blink: true,
        double_mouth_open: true,
    };

    #[test]
    fn test_dwell_threshold() {
        let dispatcher = DecisionDispatcher::new(DecisionMethod::Dwell, 3.0);
        assert!(!dispatcher.confirmation_ready(2.99));
        assert!(dispatcher.confirmation_ready(3.0));
    }

    #[test]
    fn test_coinciding_events_only_active_method_confirms() {
        let mut dispatcher = DecisionDispatcher::new(DecisionMethod::DoubleMouthOpen, 3.0);
        dispatcher.record(BOTH);
        assert!(dispatcher.confirmation_ready(0.0));
        assert!(dispatcher.consume_confirmation(0.0));
        assert!(!dispatcher.confirmation_ready(0.0));
        // The other event stays latched for the consumer to clear.
        assert!(dispatcher.deep_blink_pending());
    }

    #[test]
    fn test_gesture_does_not_confirm_dwell() {
        let mut dispatcher = DecisionDispatcher::new(DecisionMethod::Dwell, 3.0);
        dispatcher.record(BOTH);
        assert!(!dispatcher.confirmation_ready(1.0));
    }

    #[test]
    fn test_consume_is_one_shot() {
        let mut dispatcher = DecisionDispatcher::new(DecisionMethod::SustainedBlink, 3.0);
        dispatcher.record(GestureEvents {
            deep_blink: true,
            double_mouth_open: false,
        });
        assert!(dispatcher.consume_confirmation(0.0));
        assert!(!dispatcher.consume_confirmation(0.0));
    }

    #[test]
    fn test_clear_flags() {
        let mut dispatcher = DecisionDispatcher::new(DecisionMethod::Dwell, 3.0);
        dispatcher.record(BOTH);
        dispatcher.clear_deep_blink();
        dispatcher.clear_double_mouth_open();
        assert!(!dispatcher.deep_blink_pending());
        assert!(!dispatcher.double_mouth_open_pending());
    }

    #[test]
    fn test_route_gesture() {
        use DecisionMethod as M;
        use GestureKind as K;
        assert_eq!(route_gesture(K::DeepBlink, true, M::SustainedBlink), GestureIntent::Confirm);
        assert_eq!(route_gesture(K::DeepBlink, true, M::Dwell), GestureIntent::Ignore);
        assert_eq!(
            route_gesture(K::DoubleMouthOpen, true, M::DoubleMouthOpen),
            GestureIntent::Confirm
        );
        assert_eq!(
            route_gesture(K::DeepBlink, false, M::SustainedBlink),
            GestureIntent::RequestRecalibration
        );
        assert_eq!(
            route_gesture(K::DoubleMouthOpen, false, M::DoubleMouthOpen),
            GestureIntent::Ignore
        );
    }
}
