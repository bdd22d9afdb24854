//! Collaborators the session depends on, injected at construction.

use nalgebra::Isometry3;
use target_capture_core::{BackgroundPlane, Image};

/// The external pose tracker.
pub trait Tracker {
    /// Current camera-to-world pose.
    fn camera_pose(&self) -> Isometry3<f64>;
    /// Current target-to-world pose, if the tracker has one.
    fn target_pose(&self, id: &str) -> Option<Isometry3<f64>>;
    /// Whether the tracker currently reports the target as tracked.
    fn is_tracked(&self, id: &str) -> bool;
}

/// The camera feed and the quad it is rendered on.
pub trait FrameSource {
    /// Size of the frames the camera delivers, `None` before the camera has started.
    fn frame_size(&self) -> Option<(usize, usize)>;
    /// Pixels of the current frame; `None` when no frame is available yet.
    fn current_frame(&self) -> Option<Image>;
    /// Where the current frame is rendered in the world.
    fn background_plane(&self) -> Option<BackgroundPlane>;
}

/// A frame together with the quad it was rendered on.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub image: Image,
    pub background: BackgroundPlane,
}
