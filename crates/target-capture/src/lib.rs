//! Facade crate for the `target-capture-*` workspace.
//!
//! Capturing a tracked planar target means four things happen every frame:
//! the tracker reports camera and target poses, the gate checks that the
//! target faces the camera, is within range, is fully visible and is held
//! still, and on request the target's corners are projected onto the camera
//! background quad and the enclosed region is rectified to a canonical image.
//!
//! ## Quickstart
//!
//! ```no_run
//! use target_capture::session::{sim::Scenario, CaptureConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scenario = Scenario::load_json("scenario.json")?;
//! let frame = target_capture::convert::load_frame("frame.png")?;
//! let result = scenario.run(frame)?;
//! target_capture::convert::save_image(&result.image, "capture.png")?;
//! # let _ = CaptureConfig::default();
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `target_capture::core`: geometry, images, homography, projection, rectification.
//! - `target_capture::gate`: stability window and capture requirements.
//! - `target_capture::session`: the capture state machine, config and events.
//! - `target_capture::convert` (feature `image`): `image` crate interop.

pub use target_capture_core as core;
pub use target_capture_gate as gate;
pub use target_capture_session as session;

pub use target_capture_core::{Image, ImageView, PixelFormat, Rectifier, RectifierParams};
pub use target_capture_gate::{GateParams, GateReport};
pub use target_capture_session::{
    CaptureConfig, CaptureOutcome, CaptureResult, CaptureSession, CaptureState, SessionEvent,
    TargetSpec,
};

#[cfg(feature = "image")]
pub mod convert;

/// Install a `tracing` subscriber and forward `log` records into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    if tracing_log::LogTracer::init().is_err() {
        tracing::debug!("log bridge already installed");
    }
    target_capture_core::init_tracing(json);
}
