use target_capture_core::{ProjectionError, RectifyError};
use target_capture_gate::GateParamsError;

/// Setup defects. These are not transient tracking conditions and are
/// logged at `error` level where they are detected.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    #[error("no capture targets registered")]
    NoTargets,
    #[error("target id {0:?} registered twice")]
    DuplicateTarget(String),
    #[error("target {id:?}: {reason}")]
    InvalidTarget { id: String, reason: String },
    #[error(transparent)]
    Gate(#[from] GateParamsError),
    #[error("camera field of view {vertical_fov_deg}° / aspect {aspect} is invalid")]
    InvalidCamera { vertical_fov_deg: f64, aspect: f64 },
    #[error("canonical output size {width}x{height} is invalid")]
    InvalidOutput { width: usize, height: usize },
    #[error("max distance factor {0} is outside [2, 5]")]
    DistanceFactor(f64),
    #[error("camera background plane not available after {polls} polls")]
    BackgroundPlaneUnavailable { polls: usize },
}

/// Reasons a capture attempt produced no image. The session stays in
/// `Tracking`, so a later request may succeed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("camera frame not ready")]
    FrameNotReady,
    #[error("camera background plane not available")]
    NoBackgroundPlane,
    #[error("pose of target {0:?} unavailable")]
    TargetPoseUnavailable(String),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Rectify(#[from] RectifyError),
}
