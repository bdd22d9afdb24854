//! JSON configuration for a capture session.

use crate::target::TargetSpec;
use crate::SetupError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fs, path::Path};
use target_capture_core::{PlaneProjector, RectifierParams};
use target_capture_gate::GateParams;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] SetupError),
}

/// Field of view of the AR camera. Poses come from the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    pub vertical_fov_deg: f64,
    pub aspect: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            vertical_fov_deg: 60.0,
            aspect: 16.0 / 9.0,
        }
    }
}

fn default_max_distance_factor() -> f64 {
    5.0
}

fn default_readiness_max_polls() -> usize {
    300
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub gate: GateParams,
    #[serde(default)]
    pub output: RectifierParams,
    #[serde(default)]
    pub camera: CameraParams,
    #[serde(default)]
    pub projector: PlaneProjector,
    /// Used by targets that do not set their own factor.
    #[serde(default = "default_max_distance_factor")]
    pub default_max_distance_factor: f64,
    /// Upper bound on readiness polls before setup is declared broken.
    #[serde(default = "default_readiness_max_polls")]
    pub readiness_max_polls: usize,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            gate: GateParams::default(),
            output: RectifierParams::default(),
            camera: CameraParams::default(),
            projector: PlaneProjector::default(),
            default_max_distance_factor: default_max_distance_factor(),
            readiness_max_polls: default_readiness_max_polls(),
            targets: Vec::new(),
        }
    }
}

pub(crate) fn check_distance_factor(factor: f64) -> Result<(), SetupError> {
    if !(2.0..=5.0).contains(&factor) {
        return Err(SetupError::DistanceFactor(factor));
    }
    Ok(())
}

impl CaptureConfig {
    /// Load a JSON config from disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check every startup constant, including per-target sizes and
    /// unique target ids.
    pub fn validate(&self) -> Result<(), SetupError> {
        self.gate.validate()?;
        let cam = &self.camera;
        if !(cam.vertical_fov_deg > 0.0 && cam.vertical_fov_deg < 180.0 && cam.aspect > 0.0) {
            return Err(SetupError::InvalidCamera {
                vertical_fov_deg: cam.vertical_fov_deg,
                aspect: cam.aspect,
            });
        }
        if self.output.output_width == 0 || self.output.output_height == 0 {
            return Err(SetupError::InvalidOutput {
                width: self.output.output_width,
                height: self.output.output_height,
            });
        }
        check_distance_factor(self.default_max_distance_factor)?;
        let mut ids = BTreeSet::new();
        for spec in &self.targets {
            spec.validate()?;
            if !ids.insert(spec.id.as_str()) {
                return Err(SetupError::DuplicateTarget(spec.id.clone()));
            }
        }
        Ok(())
    }
}
