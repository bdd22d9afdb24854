//! The capture state machine.
//!
//! ```text
//!            found (while Idle)           request_capture (gate open, success)
//!   Idle ─────────────────────────▶ Tracking ─────────────────────────▶ Captured
//!    ▲                                 │                                    │
//!    └──────── lost (nothing tracked) ─┴──────── lost (nothing tracked) ────┘
//! ```
//!
//! One capture per tracking session: `Captured` only re-arms through `Idle`.

use crate::config::{CameraParams, CaptureConfig};
use crate::events::{EventBus, SessionEvent, Subscription};
use crate::queue::{TrackerEvent, TrackerEventQueue, TrackerEventSender};
use crate::readiness::{Readiness, ReadinessProbe};
use crate::services::{CameraFrame, FrameSource, Tracker};
use crate::target::{TargetRegistry, TrackedTarget};
use crate::{CaptureError, SetupError};
use log::{debug, error, info, warn};
use nalgebra::Point3;
use std::sync::Arc;
use std::task::Poll;
use target_capture_core::{
    BackgroundPlane, CameraModel, Image, ImageCorners, PixelRect, PlaneProjector, Rectifier,
};
use target_capture_gate::{GateReport, RequirementValidator, StabilityWindow, TargetObservation};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// No target tracked.
    Idle,
    /// A target is current and the gate is evaluated every tick.
    Tracking,
    /// A capture was produced for the current tracking session.
    Captured,
}

/// A canonical image of a captured target.
#[derive(Clone, Debug)]
pub struct CaptureResult {
    pub target_id: String,
    pub image: Image,
    /// Target corners in frame pixels, top-left, top-right, bottom-left, bottom-right.
    pub corners: ImageCorners,
    /// Frame region the image was rectified from.
    pub crop: PixelRect,
}

/// Result of [`CaptureSession::request_capture`] when nothing went wrong.
#[derive(Clone, Debug)]
pub enum CaptureOutcome {
    /// A new capture was produced.
    Captured(Arc<CaptureResult>),
    /// This tracking session already captured; the stored result is returned.
    AlreadyCaptured(Arc<CaptureResult>),
    /// No target, or the requirements are not met. Nothing happened.
    GateClosed,
}

impl CaptureOutcome {
    pub fn result(&self) -> Option<&Arc<CaptureResult>> {
        match self {
            CaptureOutcome::Captured(r) | CaptureOutcome::AlreadyCaptured(r) => Some(r),
            CaptureOutcome::GateClosed => None,
        }
    }
}

/// Outline the application may draw around the current target.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameOverlay {
    pub visible: bool,
    /// World corners in drawing order: top-left, top-right, bottom-right, bottom-left.
    pub outline: Option<[Point3<f64>; 4]>,
}

pub struct CaptureSession<T, F> {
    tracker: T,
    frames: F,
    registry: TargetRegistry,
    camera: CameraParams,
    validator: RequirementValidator,
    projector: PlaneProjector,
    rectifier: Rectifier,
    readiness: ReadinessProbe,

    state: CaptureState,
    current: Option<String>,
    window: StabilityWindow,
    gate_open: bool,
    last_report: Option<GateReport>,
    latest: Option<Arc<CaptureResult>>,
    overlay: FrameOverlay,

    bus: EventBus,
    journal: Vec<SessionEvent>,
    queue: TrackerEventQueue,
}

impl<T: Tracker, F: FrameSource> CaptureSession<T, F> {
    /// Build a session from a validated config and its collaborators.
    pub fn new(config: &CaptureConfig, tracker: T, frames: F) -> Result<Self, SetupError> {
        let registry = config
            .validate()
            .and_then(|_| {
                TargetRegistry::from_specs(
                    &config.targets,
                    &config.camera,
                    config.default_max_distance_factor,
                )
            })
            .inspect_err(|e| error!("capture session setup failed: {e}"))?;

        let validator = RequirementValidator::new(config.gate);
        info!(
            "capture session ready with {} target(s), {}x{} output",
            registry.len(),
            config.output.output_width,
            config.output.output_height
        );

        Ok(Self {
            tracker,
            frames,
            registry,
            camera: config.camera,
            window: validator.new_window(),
            validator,
            projector: config.projector,
            rectifier: Rectifier::new(config.output),
            readiness: ReadinessProbe::new(config.readiness_max_polls),
            state: CaptureState::Idle,
            current: None,
            gate_open: false,
            last_report: None,
            latest: None,
            overlay: FrameOverlay::default(),
            bus: EventBus::new(),
            journal: Vec::new(),
            queue: TrackerEventQueue::new(),
        })
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn current_target(&self) -> Option<&TrackedTarget> {
        self.current.as_deref().and_then(|id| self.registry.get(id))
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Whether the gate was open at the last evaluation.
    pub fn gate_open(&self) -> bool {
        self.gate_open
    }

    pub fn last_report(&self) -> Option<&GateReport> {
        self.last_report.as_ref()
    }

    pub fn stability_window(&self) -> &StabilityWindow {
        &self.window
    }

    /// Most recent successful capture, kept for re-display.
    pub fn latest_result(&self) -> Option<&Arc<CaptureResult>> {
        self.latest.as_ref()
    }

    pub fn overlay(&self) -> &FrameOverlay {
        &self.overlay
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    pub fn subscribe(&self, listener: impl FnMut(&SessionEvent) + 'static) -> Subscription {
        self.bus.subscribe(listener)
    }

    /// Handle for tracker callbacks running on other threads. Events are
    /// applied at the start of the next [`tick`](Self::tick).
    pub fn tracker_events(&self) -> TrackerEventSender {
        self.queue.sender()
    }

    /// Camera readiness as settled by past ticks. `Pending` until the
    /// background plane shows up or the frame budget runs out.
    pub fn poll_ready(&self) -> Poll<Result<BackgroundPlane, SetupError>> {
        self.readiness.outcome().map_or(Poll::Pending, Poll::Ready)
    }

    /// Future completing when a tick settles camera readiness.
    pub fn readiness(&self) -> Readiness {
        self.readiness.readiness()
    }

    /// Frames spent waiting for the camera.
    pub fn readiness_polls(&self) -> usize {
        self.readiness.polls()
    }

    fn emit(&mut self, event: SessionEvent) {
        self.bus.emit(&event);
        self.journal.push(event);
    }

    fn reset_validation(&mut self) {
        self.window.clear();
        self.gate_open = false;
        self.last_report = None;
    }

    /// The tracker found target `id`. Only takes effect while idle.
    pub fn on_target_found(&mut self, id: &str) {
        if self.state != CaptureState::Idle {
            debug!("target {id:?} found while {:?}, keeping current target", self.state);
            return;
        }
        if self.registry.get(id).is_none() {
            warn!("tracker found unregistered target {id:?}");
            return;
        }

        info!("target {id:?} found");
        self.current = Some(id.to_string());
        self.state = CaptureState::Tracking;
        self.reset_validation();
        self.emit(SessionEvent::TargetFound {
            target_id: id.to_string(),
        });
    }

    /// The tracker lost a target. Returns to idle only once no registered
    /// target is tracked anymore.
    pub fn on_target_lost(&mut self) {
        let any_tracked = self.registry.ids().any(|id| self.tracker.is_tracked(id));
        let target_id = self.current.clone();

        if !any_tracked {
            info!("target {target_id:?} lost, back to idle");
            self.current = None;
            self.state = CaptureState::Idle;
            self.reset_validation();
            self.overlay = FrameOverlay::default();
        }
        self.emit(SessionEvent::TargetLost { target_id });
    }

    /// Per-rendered-frame update. Checks camera readiness until settled,
    /// applies queued tracker events, then runs the work of the current
    /// state. Returns every event raised since the previous tick.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let _ = self.readiness.poll(&self.frames);

        for event in self.queue.drain() {
            match event {
                TrackerEvent::Found(id) => self.on_target_found(&id),
                TrackerEvent::Lost => self.on_target_lost(),
            }
        }

        match self.state {
            CaptureState::Idle => self.reset_validation(),
            CaptureState::Tracking => self.evaluate_gate(),
            CaptureState::Captured => self.overlay.visible = false,
        }

        std::mem::take(&mut self.journal)
    }

    fn camera_model(&self) -> CameraModel {
        CameraModel::new(
            self.tracker.camera_pose(),
            self.camera.vertical_fov_deg,
            self.camera.aspect,
        )
    }

    fn evaluate_gate(&mut self) {
        let Some(target) = self.current.as_deref().and_then(|id| self.registry.get(id)) else {
            return;
        };

        let report = match self.tracker.target_pose(target.id()) {
            Some(pose) => {
                let observation = TargetObservation {
                    pose,
                    corners: Some(target.corners(&pose)),
                    range: target.range(),
                };
                self.overlay = FrameOverlay {
                    visible: target.spec().draw_frame,
                    outline: Some(target.outline(&pose)),
                };
                let camera = self.camera_model();
                self.validator.evaluate(&camera, &observation, &mut self.window)
            }
            None => {
                // without a pose there is no distance to sample
                self.window.clear();
                self.overlay.visible = false;
                GateReport::default()
            }
        };

        let meets = report.meets_requirements();
        self.last_report = Some(report);
        if meets != self.gate_open {
            debug!("gate {} ({report:?})", if meets { "opened" } else { "closed" });
            self.gate_open = meets;
            self.emit(if meets {
                SessionEvent::GateOpened(report)
            } else {
                SessionEvent::GateClosed(report)
            });
        }
    }

    /// Capture the current target if the gate is open.
    ///
    /// A closed gate is not an error: it yields [`CaptureOutcome::GateClosed`].
    /// Once captured, further requests return the stored result until the
    /// target is lost. Errors leave the session in `Tracking`.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn request_capture(&mut self) -> Result<CaptureOutcome, CaptureError> {
        match (self.state, &self.latest) {
            (CaptureState::Captured, Some(latest)) => {
                return Ok(CaptureOutcome::AlreadyCaptured(latest.clone()))
            }
            (CaptureState::Tracking, _) if self.gate_open => {}
            _ => return Ok(CaptureOutcome::GateClosed),
        }

        let result = self
            .capture_current()
            .inspect_err(|e| warn!("capture failed: {e}"))?;
        let result = Arc::new(result);
        info!(
            "captured target {:?} from {}x{} region",
            result.target_id, result.crop.width, result.crop.height
        );

        self.latest = Some(result.clone());
        self.state = CaptureState::Captured;
        self.window.clear();
        self.overlay.visible = false;
        self.emit(SessionEvent::Captured(result.clone()));
        Ok(CaptureOutcome::Captured(result))
    }

    fn grab_frame(&self) -> Result<CameraFrame, CaptureError> {
        let background = self
            .frames
            .background_plane()
            .ok_or(CaptureError::NoBackgroundPlane)?;
        let image = self
            .frames
            .current_frame()
            .ok_or(CaptureError::FrameNotReady)?;
        Ok(CameraFrame { image, background })
    }

    fn capture_current(&self) -> Result<CaptureResult, CaptureError> {
        let Some(target) = self.current_target() else {
            return Err(CaptureError::TargetPoseUnavailable(String::new()));
        };
        let pose = self
            .tracker
            .target_pose(target.id())
            .ok_or_else(|| CaptureError::TargetPoseUnavailable(target.id().to_string()))?;

        let frame = self.grab_frame()?;
        let corners = self.projector.project(
            &self.camera_model().position(),
            &frame.background,
            &target.corners(&pose),
            frame.image.width,
            frame.image.height,
        )?;
        let rectified = self.rectifier.rectify(&frame.image.view(), &corners)?;

        Ok(CaptureResult {
            target_id: target.id().to_string(),
            image: rectified.image,
            corners,
            crop: rectified.crop,
        })
    }
}
