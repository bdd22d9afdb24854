use crate::{GateParams, StabilityWindow};
use nalgebra::{distance, Isometry3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use target_capture_core::{plane_up, CameraModel, WorldCorners};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Open interval of camera-to-target distances that allow capture.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceRange {
    pub min: f64,
    pub max: f64,
}

impl DistanceRange {
    /// The closest distance at which a target `width` wide still fits the
    /// horizontal field of view, and `max_factor` times that.
    pub fn from_fov(width: f64, horizontal_fov_rad: f64, max_factor: f64) -> Self {
        let min = (width / 2.0) / (horizontal_fov_rad / 2.0).tan();
        Self {
            min,
            max: min * max_factor,
        }
    }

    #[inline]
    pub fn contains(&self, distance: f64) -> bool {
        distance > self.min && distance < self.max
    }
}

/// What the gate needs to know about the current target this tick.
#[derive(Clone, Copy, Debug)]
pub struct TargetObservation {
    pub pose: Isometry3<f64>,
    pub corners: Option<WorldCorners>,
    pub range: DistanceRange,
}

/// Outcome of the individual checks for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct GateReport {
    pub facing: bool,
    pub in_range: bool,
    pub fully_visible: bool,
    pub still: bool,
    pub facing_dot: f64,
    pub distance: f64,
}

impl GateReport {
    #[inline]
    pub fn meets_requirements(&self) -> bool {
        self.facing && self.in_range && self.fully_visible && self.still
    }
}

#[inline]
pub fn is_facing(forward: &Vector3<f64>, up: &Vector3<f64>, threshold: f64) -> bool {
    forward.dot(up) < threshold
}

/// Whether every viewport point lies in `[0, 1]²`.
pub fn all_in_viewport(points: &[Point2<f64>]) -> bool {
    points
        .iter()
        .all(|p| (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y))
}

/// Whether all four corners are in front of the camera and inside its viewport.
/// Missing corner data counts as not visible.
pub fn is_fully_visible(camera: &CameraModel, corners: Option<&WorldCorners>) -> bool {
    let Some(corners) = corners else {
        return false;
    };
    let mut vp = [Point2::origin(); 4];
    for (out, c) in vp.iter_mut().zip(corners.iter()) {
        match camera.world_to_viewport(c) {
            Some(p) => *out = p,
            None => return false,
        }
    }
    all_in_viewport(&vp)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RequirementValidator {
    params: GateParams,
}

impl RequirementValidator {
    pub fn new(params: GateParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    /// A stability window sized for these parameters.
    pub fn new_window(&self) -> StabilityWindow {
        StabilityWindow::new(self.params.stability_samples, self.params.max_shake_delta)
    }

    /// Run all checks for one tick.
    ///
    /// Each check is reported on its own. The stillness sample is always
    /// pushed into `window`, so evidence keeps accumulating while the target
    /// is tracked.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn evaluate(
        &self,
        camera: &CameraModel,
        target: &TargetObservation,
        window: &mut StabilityWindow,
    ) -> GateReport {
        let forward = camera.forward();
        let up = plane_up(&target.pose);
        let facing_dot = forward.dot(&up);
        let facing = is_facing(&forward, &up, self.params.facing_threshold);

        let target_pos = Point3::from(target.pose.translation.vector);
        let dist = distance(&camera.position(), &target_pos);
        let in_range = target.range.contains(dist);

        let fully_visible = is_fully_visible(camera, target.corners.as_ref());

        let still = window.push(dist);

        GateReport {
            facing,
            in_range,
            fully_visible,
            still,
            facing_dot,
            distance: dist,
        }
    }
}
