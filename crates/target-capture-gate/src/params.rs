use serde::{Deserialize, Serialize};

/// Thresholds of the capture gate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
    /// `dot(camera forward, target up)` must be strictly below this value.
    pub facing_threshold: f64,
    /// Number of consecutive distance samples the stillness check needs.
    pub stability_samples: usize,
    /// Largest allowed change of camera-target distance between two ticks.
    pub max_shake_delta: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            facing_threshold: -0.5,
            stability_samples: 20,
            max_shake_delta: 0.01,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GateParamsError {
    #[error("facing threshold {0} is outside [-1, 1]")]
    FacingThreshold(f64),
    #[error("stability window needs at least 2 samples, got {0}")]
    StabilitySamples(usize),
    #[error("max shake delta must be a non-negative number, got {0}")]
    ShakeDelta(f64),
}

impl GateParams {
    pub fn validate(&self) -> Result<(), GateParamsError> {
        if !(-1.0..=1.0).contains(&self.facing_threshold) {
            return Err(GateParamsError::FacingThreshold(self.facing_threshold));
        }
        if self.stability_samples < 2 {
            return Err(GateParamsError::StabilitySamples(self.stability_samples));
        }
        if !(self.max_shake_delta >= 0.0) {
            return Err(GateParamsError::ShakeDelta(self.max_shake_delta));
        }
        Ok(())
    }
}
