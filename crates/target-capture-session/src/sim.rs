//! Fixed-pose tracker and camera used to replay captures offline.

use crate::config::{CaptureConfig, ConfigError};
use crate::services::{FrameSource, Tracker};
use crate::session::{CaptureOutcome, CaptureResult, CaptureSession};
use crate::{CaptureError, SetupError};
use log::info;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::task::Poll;
use target_capture_core::{facing_parent_rotation, BackgroundPlane, CameraModel, Image};
use target_capture_gate::GateReport;

/// Tracker reporting fixed poses.
#[derive(Clone, Debug, Default)]
pub struct StaticTracker {
    pub camera: Isometry3<f64>,
    pub targets: BTreeMap<String, Isometry3<f64>>,
}

impl StaticTracker {
    pub fn new(camera: Isometry3<f64>) -> Self {
        Self {
            camera,
            targets: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, id: impl Into<String>, pose: Isometry3<f64>) -> Self {
        self.targets.insert(id.into(), pose);
        self
    }

    pub fn set_target(&mut self, id: impl Into<String>, pose: Isometry3<f64>) {
        self.targets.insert(id.into(), pose);
    }

    pub fn remove_target(&mut self, id: &str) {
        self.targets.remove(id);
    }
}

impl Tracker for StaticTracker {
    fn camera_pose(&self) -> Isometry3<f64> {
        self.camera
    }

    fn target_pose(&self, id: &str) -> Option<Isometry3<f64>> {
        self.targets.get(id).copied()
    }

    fn is_tracked(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }
}

/// Camera that always shows the same frame on the same quad.
#[derive(Clone, Debug, Default)]
pub struct StaticFrameSource {
    pub frame: Option<Image>,
    pub background: Option<BackgroundPlane>,
}

impl StaticFrameSource {
    pub fn new(frame: Image, background: BackgroundPlane) -> Self {
        Self {
            frame: Some(frame),
            background: Some(background),
        }
    }
}

impl FrameSource for StaticFrameSource {
    fn frame_size(&self) -> Option<(usize, usize)> {
        self.frame.as_ref().map(|f| (f.width, f.height))
    }

    fn current_frame(&self) -> Option<Image> {
        self.frame.clone()
    }

    fn background_plane(&self) -> Option<BackgroundPlane> {
        self.background
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("gate still closed after {ticks} ticks (last report: {report:?})")]
    GateNeverOpened {
        ticks: usize,
        report: Option<GateReport>,
    },
}

fn default_target_position() -> [f64; 3] {
    [0.0, 0.0, 0.3]
}

fn default_plane_distance() -> f64 {
    1.0
}

fn default_ticks() -> usize {
    30
}

/// A camera at the world origin looking at one registered target.
///
/// `target_position` is in camera coordinates (`+Z` forward, `+Y` down);
/// the target faces the camera, tilted by `target_tilt_deg` about its
/// horizontal axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub config: CaptureConfig,
    /// Defaults to the first registered target.
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default = "default_target_position")]
    pub target_position: [f64; 3],
    #[serde(default)]
    pub target_tilt_deg: f64,
    /// Distance from the camera to the background quad.
    #[serde(default = "default_plane_distance")]
    pub plane_distance: f64,
    /// Ticks to run before giving up on the gate.
    #[serde(default = "default_ticks")]
    pub ticks: usize,
}

impl Scenario {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            target_id: None,
            target_position: default_target_position(),
            target_tilt_deg: 0.0,
            plane_distance: default_plane_distance(),
            ticks: default_ticks(),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let scenario: Self = serde_json::from_str(&raw)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    pub fn target_pose(&self) -> Isometry3<f64> {
        let [x, y, z] = self.target_position;
        let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.target_tilt_deg.to_radians());
        Isometry3::from_parts(Translation3::new(x, y, z), facing_parent_rotation() * tilt)
    }

    /// Tracker and camera for this scenario, showing `frame` on a quad that
    /// fills the camera's field of view.
    pub fn services(&self, frame: Image) -> (StaticTracker, StaticFrameSource) {
        let camera = CameraModel::new(
            Isometry3::identity(),
            self.config.camera.vertical_fov_deg,
            self.config.camera.aspect,
        );
        let background =
            BackgroundPlane::fitted_to_camera(&camera, self.plane_distance, frame.width, frame.height);
        let id = self.resolved_target_id().unwrap_or_default();
        let tracker = StaticTracker::new(camera.pose).with_target(id, self.target_pose());
        (tracker, StaticFrameSource::new(frame, background))
    }

    fn resolved_target_id(&self) -> Option<String> {
        self.target_id
            .clone()
            .or_else(|| self.config.targets.first().map(|t| t.id.clone()))
    }

    /// Drive a session through found, stabilization and capture.
    pub fn run(&self, frame: Image) -> Result<Arc<CaptureResult>, ScenarioError> {
        let id = self.resolved_target_id().ok_or(SetupError::NoTargets)?;
        let (tracker, frames) = self.services(frame);
        let mut session = CaptureSession::new(&self.config, tracker, frames)?;

        session.on_target_found(&id);
        for tick in 1..=self.ticks {
            session.tick();
            if let Poll::Ready(Err(e)) = session.poll_ready() {
                return Err(e.into());
            }
            if !session.gate_open() {
                continue;
            }
            if let CaptureOutcome::Captured(result) = session.request_capture()? {
                info!("scenario captured {id:?} on tick {tick}");
                return Ok(result);
            }
        }

        Err(ScenarioError::GateNeverOpened {
            ticks: self.ticks,
            report: session.last_report().copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetSpec;
    use target_capture_core::PixelFormat;

    fn scenario() -> Scenario {
        let mut config = CaptureConfig::default();
        config.output.output_width = 64;
        config.output.output_height = 64;
        config.targets.push(TargetSpec::new("poster", 0.2, 0.15));
        Scenario::new(config)
    }

    fn frame() -> Image {
        let mut img = Image::new(160, 90, PixelFormat::Rgb8);
        for (i, v) in img.data.iter_mut().enumerate() {
            *v = (i % 251) as u8;
        }
        img
    }

    #[test]
    fn default_scenario_captures() {
        let result = scenario().run(frame()).expect("capture");
        assert_eq!(result.target_id, "poster");
        assert_eq!((result.image.width, result.image.height), (64, 64));
        assert_eq!(result.image.format, PixelFormat::Rgb8);
    }

    #[test]
    fn too_few_ticks_never_open_the_gate() {
        let mut s = scenario();
        s.ticks = 19;
        match s.run(frame()) {
            Err(ScenarioError::GateNeverOpened { ticks: 19, report }) => {
                let report = report.expect("evaluated");
                assert!(report.facing && report.in_range && report.fully_visible);
                assert!(!report.still);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn target_turned_away_is_not_captured() {
        let mut s = scenario();
        s.target_tilt_deg = 80.0;
        assert!(matches!(
            s.run(frame()),
            Err(ScenarioError::GateNeverOpened { .. })
        ));
    }

    #[test]
    fn scenario_json_uses_defaults() {
        let s: Scenario = serde_json::from_str(
            r#"{ "config": { "targets": [ { "id": "a", "width": 0.2, "height": 0.2 } ] } }"#,
        )
        .expect("parse");
        assert_eq!(s.ticks, 30);
        assert_eq!(s.target_position, [0.0, 0.0, 0.3]);
        assert_eq!(s.resolved_target_id().as_deref(), Some("a"));
    }
}
