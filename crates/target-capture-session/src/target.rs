use crate::config::{check_distance_factor, CameraParams};
use crate::SetupError;
use nalgebra::{Isometry3, Point3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use target_capture_core::{horizontal_fov_rad, world_corners, WorldCorners};
use target_capture_gate::DistanceRange;

/// Static description of a capturable target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub id: String,
    /// Physical width, in the tracker's world units.
    pub width: f64,
    /// Physical height, in the tracker's world units.
    pub height: f64,
    /// Overrides the config-wide factor turning min into max distance.
    #[serde(default)]
    pub max_distance_factor: Option<f64>,
    /// Show an outline around the target while waiting for capture.
    #[serde(default)]
    pub draw_frame: bool,
}

impl TargetSpec {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            max_distance_factor: None,
            draw_frame: false,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |reason: &str| SetupError::InvalidTarget {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(invalid("size must be positive"));
        }
        if let Some(f) = self.max_distance_factor {
            check_distance_factor(f)?;
        }
        Ok(())
    }
}

/// A registered target with its capture distance range fixed at setup.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedTarget {
    spec: TargetSpec,
    range: DistanceRange,
}

impl TrackedTarget {
    pub fn new(spec: TargetSpec, camera: &CameraParams, default_factor: f64) -> Self {
        let factor = spec.max_distance_factor.unwrap_or(default_factor);
        let hfov = horizontal_fov_rad(camera.vertical_fov_deg, camera.aspect);
        let range = DistanceRange::from_fov(spec.width, hfov, factor);
        Self { spec, range }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &TargetSpec {
        &self.spec
    }

    pub fn range(&self) -> DistanceRange {
        self.range
    }

    pub fn corners(&self, pose: &Isometry3<f64>) -> WorldCorners {
        world_corners(pose, self.spec.width, self.spec.height)
    }

    /// Outline in drawing order: top-left, top-right, bottom-right, bottom-left.
    pub fn outline(&self, pose: &Isometry3<f64>) -> [Point3<f64>; 4] {
        let [tl, tr, bl, br] = self.corners(pose);
        [tl, tr, br, bl]
    }
}

/// Targets known to the session, looked up by id on "found".
#[derive(Clone, Debug, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, TrackedTarget>,
}

impl TargetRegistry {
    pub fn from_specs(
        specs: &[TargetSpec],
        camera: &CameraParams,
        default_factor: f64,
    ) -> Result<Self, SetupError> {
        if specs.is_empty() {
            return Err(SetupError::NoTargets);
        }
        let mut targets = BTreeMap::new();
        for spec in specs {
            spec.validate()?;
            let target = TrackedTarget::new(spec.clone(), camera, default_factor);
            if targets.insert(spec.id.clone(), target).is_some() {
                return Err(SetupError::DuplicateTarget(spec.id.clone()));
            }
        }
        Ok(Self { targets })
    }

    pub fn get(&self, id: &str) -> Option<&TrackedTarget> {
        self.targets.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_camera() -> CameraParams {
        CameraParams {
            vertical_fov_deg: 90.0,
            aspect: 1.0,
        }
    }

    #[test]
    fn range_derived_from_width_and_fov() {
        let t = TrackedTarget::new(TargetSpec::new("a", 2.0, 1.0), &square_camera(), 3.0);
        assert_relative_eq!(t.range().min, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.range().max, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn per_target_factor_overrides_default() {
        let mut spec = TargetSpec::new("a", 2.0, 1.0);
        spec.max_distance_factor = Some(2.0);
        let t = TrackedTarget::new(spec, &square_camera(), 5.0);
        assert_relative_eq!(t.range().max, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn outline_closes_around_the_quad() {
        let t = TrackedTarget::new(TargetSpec::new("a", 2.0, 1.0), &square_camera(), 5.0);
        let o = t.outline(&Isometry3::identity());
        assert_eq!(o[0], Point3::new(-1.0, 0.0, -0.5));
        assert_eq!(o[1], Point3::new(1.0, 0.0, -0.5));
        assert_eq!(o[2], Point3::new(1.0, 0.0, 0.5));
        assert_eq!(o[3], Point3::new(-1.0, 0.0, 0.5));
    }

    #[test]
    fn registry_rejects_bad_input() {
        let cam = square_camera();
        assert_eq!(
            TargetRegistry::from_specs(&[], &cam, 5.0).unwrap_err(),
            SetupError::NoTargets
        );
        let dup = [TargetSpec::new("x", 1.0, 1.0), TargetSpec::new("x", 1.0, 1.0)];
        assert_eq!(
            TargetRegistry::from_specs(&dup, &cam, 5.0).unwrap_err(),
            SetupError::DuplicateTarget("x".into())
        );
        let flat = [TargetSpec::new("y", 0.0, 1.0)];
        assert!(matches!(
            TargetRegistry::from_specs(&flat, &cam, 5.0),
            Err(SetupError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn registry_lookup() {
        let specs = [TargetSpec::new("b", 1.0, 1.0), TargetSpec::new("a", 1.0, 1.0)];
        let reg = TargetRegistry::from_specs(&specs, &square_camera(), 5.0).expect("registry");
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.ids().collect::<Vec<_>>(), ["a", "b"]);
        assert!(reg.get("a").is_some());
        assert!(reg.get("c").is_none());
    }
}
