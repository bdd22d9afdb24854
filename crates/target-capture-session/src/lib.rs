//! Capture session for tracked planar targets.
//!
//! A [`CaptureSession`] listens to a pose tracker, decides every frame whether
//! the current target can be captured (facing the camera, within range,
//! fully visible, held still) and, on request, turns the camera frame into a
//! perspective-corrected canonical image of the target.
//!
//! ```no_run
//! use target_capture_session::{sim::Scenario, CaptureConfig, TargetSpec};
//! use target_capture_core::{Image, PixelFormat};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = CaptureConfig::default();
//! config.targets.push(TargetSpec::new("poster", 0.2, 0.15));
//! let frame = Image::new(1280, 720, PixelFormat::Rgb8);
//! let result = Scenario::new(config).run(frame)?;
//! assert_eq!(result.image.width, 1024);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod queue;
mod readiness;
mod services;
mod session;
pub mod sim;
mod target;

pub use config::{CameraParams, CaptureConfig, ConfigError};
pub use error::{CaptureError, SetupError};
pub use events::{EventBus, SessionEvent, Subscription};
pub use queue::{TrackerEvent, TrackerEventSender};
pub use readiness::{Readiness, ReadinessProbe};
pub use services::{CameraFrame, FrameSource, Tracker};
pub use session::{CaptureOutcome, CaptureResult, CaptureSession, CaptureState, FrameOverlay};
pub use target::{TargetRegistry, TargetSpec, TrackedTarget};
