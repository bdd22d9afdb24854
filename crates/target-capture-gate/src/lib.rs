//! The capture gate: decides, once per rendered frame, whether the camera's
//! view of the tracked target is good enough to capture.
//!
//! The gate is `facing ∧ in range ∧ fully visible ∧ still`:
//! - facing: the camera looks roughly straight at the target face,
//! - in range: camera-target distance is inside the target's [`DistanceRange`],
//! - fully visible: all four corners are inside the camera viewport,
//! - still: a [`StabilityWindow`] of recent distances shows no shake.

mod params;
mod requirements;
mod stability;

pub use params::{GateParams, GateParamsError};
pub use requirements::{
    all_in_viewport, is_facing, is_fully_visible, DistanceRange, GateReport, RequirementValidator,
    TargetObservation,
};
pub use stability::StabilityWindow;
