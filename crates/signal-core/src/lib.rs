//! Gazelink Signal Core: the gaze-to-pointer pipeline
//!
//! Turns noisy per-frame face-tracking samples into a stable pointer and a
//! small set of confirmation gestures:
//! - **Gaze processing:** Calibrated mapping, exponential smoothing, dwell time
//! - **Calibration:** Guided multi-point procedure with trimmed-mean sensitivity
//! - **Drift correction:** Re-anchor the head reference after a posture change
//! - **Gestures:** Sustained eyes-closed and double mouth-open detectors
//! - **Decision dispatch:** Gate which signal counts as "confirm"
//!
//! This crate is pure computation: no I/O, no threads, no wall clock.
//! Time comes from sample timestamps, so every stage is deterministic.

pub mod calibration;
pub mod calibration_session;
pub mod decision;
pub mod drift;
pub mod gaze;
pub mod gesture;
pub mod pipeline;
pub mod smoothing;

pub use calibration::{trimmed_mean, CalibrationEngine};
pub use calibration_session::CalibrationSession;
pub use decision::{route_gesture, DecisionDispatcher, GestureIntent};
pub use drift::DriftCorrector;
pub use gaze::GazeSignalProcessor;
pub use gesture::{DoubleMouthOpenDetector, GestureEvents, SustainedBlinkDetector};
pub use pipeline::FramePipeline;
pub use smoothing::ExponentialSmoother;
