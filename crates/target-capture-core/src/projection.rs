//! Ray/plane projection of target corners onto the camera background plane.
//!
//! The camera feed is rendered on a quad (the background plane) placed in
//! front of the camera. A world point seen by the camera lands, in the feed
//! texture, where the ray from the camera center through that point meets
//! the quad. No camera intrinsics are needed: only the camera position, the
//! quad's pose and local extent, and the texture size.

use crate::geometry::{CameraModel, ImageCorners, WorldCorners};
use log::debug;
use nalgebra::{Isometry3, Point2, Point3, Translation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("ray through corner {corner} does not hit the background plane in front of the camera")]
    DegenerateRay { corner: usize },
    #[error("background plane has a degenerate extent or an empty texture")]
    DegeneratePlane,
    #[error("projected corner {corner} at ({x:.1}, {y:.1}) lies outside the {width}x{height} image")]
    OutOfImage {
        corner: usize,
        x: f64,
        y: f64,
        width: usize,
        height: usize,
    },
}

/// The quad the camera feed is rendered on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackgroundPlane {
    /// Plane-to-world transform. The plane normal is local `+Y`.
    pub pose: Isometry3<f64>,
    /// Local-space reference point that maps to pixel `(0, 0)`.
    pub origin: Point3<f64>,
    /// Local-space size of the quad along its `X` and `Z` axes.
    pub extent: Vector2<f64>,
    pub texture_width: usize,
    pub texture_height: usize,
}

impl BackgroundPlane {
    /// A quad `distance` in front of `camera` that exactly fills its field of view.
    pub fn fitted_to_camera(
        camera: &CameraModel,
        distance: f64,
        texture_width: usize,
        texture_height: usize,
    ) -> Self {
        let w = 2.0 * distance * (camera.horizontal_fov_rad() / 2.0).tan();
        let h = 2.0 * distance * (camera.vertical_fov_deg.to_radians() / 2.0).tan();
        let local = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, distance),
            crate::geometry::facing_parent_rotation(),
        );
        Self {
            pose: camera.pose * local,
            origin: Point3::new(-w / 2.0, 0.0, -h / 2.0),
            extent: Vector2::new(w, h),
            texture_width,
            texture_height,
        }
    }

    #[inline]
    pub fn point(&self) -> Point3<f64> {
        Point3::from(self.pose.translation.vector)
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.pose.rotation * Vector3::y()
    }

    fn is_degenerate(&self) -> bool {
        self.extent.x.abs() < 1e-12
            || self.extent.y.abs() < 1e-12
            || self.texture_width == 0
            || self.texture_height == 0
    }

    /// Texture pixel coordinates of a world point lying on the plane.
    pub fn to_pixel(&self, world: &Point3<f64>) -> Point2<f64> {
        let local = self.pose.inverse_transform_point(world) - self.origin;
        Point2::new(
            local.x / self.extent.x * self.texture_width as f64,
            local.z / self.extent.y * self.texture_height as f64,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneProjector {
    /// Minimum |cos| between a corner ray and the plane normal.
    pub parallel_epsilon: f64,
}

impl Default for PlaneProjector {
    fn default() -> Self {
        Self {
            parallel_epsilon: 1e-6,
        }
    }
}

impl PlaneProjector {
    /// Intersection of the ray from `camera` through `corner` with the plane.
    /// `None` when the ray is parallel to the plane or the plane lies behind
    /// the camera along it.
    pub fn intersect(
        &self,
        camera: &Point3<f64>,
        plane: &BackgroundPlane,
        corner: &Point3<f64>,
    ) -> Option<Point3<f64>> {
        let dir = corner - camera;
        let len = dir.norm();
        if !(len > 1e-12) {
            return None;
        }
        let n = plane.normal();
        let denom = dir.dot(&n);
        if !(denom.abs() > self.parallel_epsilon * len) {
            return None;
        }
        let t = (plane.point() - camera).dot(&n) / denom;
        if !(t > 0.0) {
            return None;
        }
        let p = camera + dir * t;
        p.coords.iter().all(|v| v.is_finite()).then_some(p)
    }

    /// Project four world corners into background texture pixels.
    ///
    /// Fails as a whole if any corner ray is degenerate or any projected
    /// point falls outside `[0, image_width] × [0, image_height]`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, plane, corners)))]
    pub fn project(
        &self,
        camera: &Point3<f64>,
        plane: &BackgroundPlane,
        corners: &WorldCorners,
        image_width: usize,
        image_height: usize,
    ) -> Result<ImageCorners, ProjectionError> {
        if plane.is_degenerate() {
            return Err(ProjectionError::DegeneratePlane);
        }

        let mut out = [Point2::origin(); 4];
        for (i, corner) in corners.iter().enumerate() {
            let hit = self
                .intersect(camera, plane, corner)
                .ok_or(ProjectionError::DegenerateRay { corner: i })?;
            out[i] = plane.to_pixel(&hit);
        }

        let (w, h) = (image_width as f64, image_height as f64);
        for (i, p) in out.iter().enumerate() {
            if !(p.x >= 0.0 && p.x <= w && p.y >= 0.0 && p.y <= h) {
                return Err(ProjectionError::OutOfImage {
                    corner: i,
                    x: p.x,
                    y: p.y,
                    width: image_width,
                    height: image_height,
                });
            }
        }

        debug!(
            "projected corners: {:?}",
            out.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()
        );
        Ok(out)
    }
}
