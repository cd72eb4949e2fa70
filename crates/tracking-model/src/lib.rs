//! Gazelink Tracking Model
//!
//! Defines the core data contracts shared by the signal pipeline, the
//! runtime, and UI consumers:
//! - **Samples:** Per-frame face-tracking measurements (gaze, blend shapes, head pose)
//! - **Calibration:** Gaze-to-screen mapping and target point patterns
//! - **Cursor:** Stabilized pointer position, dwell time, head reference
//! - **Snapshot:** The immutable per-frame view published to the UI layer
//! - **Tuning:** Named constants for every threshold and duration
//!
//! Screen coordinates are normalized to `[0.0, 1.0]` with `(0, 0)` at the
//! top-left. Head positions are in meters.

pub mod calibration;
pub mod cursor;
pub mod decision;
pub mod geometry;
pub mod sample;
pub mod snapshot;
pub mod tuning;

pub use calibration::*;
pub use cursor::*;
pub use decision::*;
pub use geometry::*;
pub use sample::*;
pub use snapshot::*;
pub use tuning::*;
