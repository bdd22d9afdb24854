//! Camera and planar-target geometry.
//!
//! Conventions used throughout the workspace:
//! - A camera looks along its local `+Z`, with `+X` right and `+Y` down.
//!   Viewport coordinates are in `[0, 1]²` with `(0, 0)` at the top-left.
//! - A planar target spans its local `X` (width) and `Z` (height) axes; its
//!   face normal ("up") is local `+Y`. Viewed from the `+Y` side, `+Z` points
//!   towards the bottom edge.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Target corners in world space: top-left, top-right, bottom-left, bottom-right.
pub type WorldCorners = [Point3<f64>; 4];

/// Target corners in pixel space, same order as [`WorldCorners`].
pub type ImageCorners = [Point2<f64>; 4];

pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_LEFT: usize = 2;
pub const BOTTOM_RIGHT: usize = 3;

/// Corners of a `width × height` target in its own frame.
pub fn local_corners(width: f64, height: f64) -> WorldCorners {
    let hw = width / 2.0;
    let hh = height / 2.0;
    [
        Point3::new(-hw, 0.0, -hh),
        Point3::new(hw, 0.0, -hh),
        Point3::new(-hw, 0.0, hh),
        Point3::new(hw, 0.0, hh),
    ]
}

/// World corners of a target posed at `pose`.
pub fn world_corners(pose: &Isometry3<f64>, width: f64, height: f64) -> WorldCorners {
    local_corners(width, height).map(|p| pose * p)
}

/// Face normal of a planar pose (its local `+Y`).
pub fn plane_up(pose: &Isometry3<f64>) -> Vector3<f64> {
    pose.rotation * Vector3::y()
}

/// Rotation turning a plane's local `+Y` towards `-Z` of the parent frame,
/// i.e. a plane facing a camera that sits at the parent origin.
pub fn facing_parent_rotation() -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -std::f64::consts::FRAC_PI_2)
}

/// Horizontal field of view (radians) from a vertical one and the aspect ratio.
pub fn horizontal_fov_rad(vertical_fov_deg: f64, aspect: f64) -> f64 {
    let half_v = vertical_fov_deg.to_radians() / 2.0;
    2.0 * (half_v.tan() * aspect).atan()
}

/// Pinhole camera described only by its pose and field of view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Camera-to-world transform.
    pub pose: Isometry3<f64>,
    pub vertical_fov_deg: f64,
    /// Width over height.
    pub aspect: f64,
}

impl CameraModel {
    pub fn new(pose: Isometry3<f64>, vertical_fov_deg: f64, aspect: f64) -> Self {
        Self {
            pose,
            vertical_fov_deg,
            aspect,
        }
    }

    #[inline]
    pub fn position(&self) -> Point3<f64> {
        Point3::from(self.pose.translation.vector)
    }

    #[inline]
    pub fn forward(&self) -> Vector3<f64> {
        self.pose.rotation * Vector3::z()
    }

    pub fn horizontal_fov_rad(&self) -> f64 {
        horizontal_fov_rad(self.vertical_fov_deg, self.aspect)
    }

    /// Normalized viewport position of a world point, `None` when it is not
    /// in front of the camera.
    pub fn world_to_viewport(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        let pc = self.pose.inverse_transform_point(p);
        if pc.z <= 0.0 {
            return None;
        }
        let tan_h = (self.horizontal_fov_rad() / 2.0).tan();
        let tan_v = (self.vertical_fov_deg.to_radians() / 2.0).tan();
        Some(Point2::new(
            0.5 + 0.5 * (pc.x / pc.z) / tan_h,
            0.5 + 0.5 * (pc.y / pc.z) / tan_v,
        ))
    }
}

/// Camera pose at `eye` looking at `target`; `up` is a hint for the image's upward direction.
///
/// Returns `None` when `up` is parallel to the viewing direction.
pub fn look_at(eye: Point3<f64>, target: Point3<f64>, up: Vector3<f64>) -> Option<Isometry3<f64>> {
    let forward = (target - eye).try_normalize(1e-12)?;
    let right = (-up).cross(&forward).try_normalize(1e-12)?;
    let down = forward.cross(&right);
    let rot = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[right, down, forward]));
    Some(Isometry3::from_parts(
        Translation3::from(eye.coords),
        UnitQuaternion::from_rotation_matrix(&rot),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn facing_target(distance: f64) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(0.0, 0.0, distance),
            facing_parent_rotation(),
        )
    }

    #[test]
    fn corners_keep_canonical_order_in_image() {
        let camera = CameraModel::new(Isometry3::identity(), 60.0, 1.0);
        let corners = world_corners(&facing_target(1.0), 0.2, 0.1);
        let vp = corners.map(|c| camera.world_to_viewport(&c).expect("in front"));

        assert!(vp[TOP_LEFT].x < vp[TOP_RIGHT].x);
        assert!(vp[TOP_LEFT].y < vp[BOTTOM_LEFT].y);
        assert!(vp[BOTTOM_LEFT].x < vp[BOTTOM_RIGHT].x);
        assert_relative_eq!(vp[TOP_LEFT].y, vp[TOP_RIGHT].y, epsilon = 1e-12);
    }

    #[test]
    fn facing_rotation_points_up_at_camera() {
        let up = plane_up(&facing_target(1.0));
        assert_relative_eq!(up, -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn horizontal_fov_matches_aspect() {
        assert_relative_eq!(horizontal_fov_rad(90.0, 1.0), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert!(horizontal_fov_rad(60.0, 16.0 / 9.0) > 60f64.to_radians());
    }

    #[test]
    fn viewport_center_and_behind() {
        let camera = CameraModel::new(Isometry3::identity(), 60.0, 1.5);
        let c = camera.world_to_viewport(&Point3::new(0.0, 0.0, 3.0)).expect("front");
        assert_relative_eq!(c, Point2::new(0.5, 0.5), epsilon = 1e-12);
        assert!(camera.world_to_viewport(&Point3::new(0.0, 0.0, -3.0)).is_none());
    }

    #[test]
    fn look_at_builds_forward_axis() {
        let eye = Point3::new(0.0, -1.0, 0.0);
        let pose = look_at(eye, Point3::new(0.0, 0.0, 0.0), -Vector3::z()).expect("valid");
        let camera = CameraModel::new(pose, 60.0, 1.0);
        assert_relative_eq!(camera.forward(), Vector3::y(), epsilon = 1e-12);
        assert!(look_at(eye, Point3::origin(), Vector3::y()).is_none());
    }
}
