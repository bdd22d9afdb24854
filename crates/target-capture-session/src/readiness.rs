//! Startup readiness: the camera must be streaming and its background quad
//! must exist before captures can work.
//!
//! The budget is counted in rendered frames: [`ReadinessProbe::poll`] is
//! meant to run once per frame (the session does so from `tick`). Awaiting
//! [`Readiness`] never spends budget; it completes when a frame-driven poll
//! settles the outcome.

use crate::services::FrameSource;
use crate::SetupError;
use log::{debug, error};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use target_capture_core::BackgroundPlane;

#[derive(Debug, Default)]
struct Shared {
    outcome: Option<Result<BackgroundPlane, SetupError>>,
    waker: Option<Waker>,
}

/// Frame-bounded wait for the background plane and camera.
#[derive(Debug)]
pub struct ReadinessProbe {
    polls: usize,
    max_polls: usize,
    shared: Rc<RefCell<Shared>>,
}

impl ReadinessProbe {
    pub fn new(max_polls: usize) -> Self {
        Self {
            polls: 0,
            max_polls: max_polls.max(1),
            shared: Rc::default(),
        }
    }

    /// Frames spent waiting so far.
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// The settled outcome, if any.
    pub fn outcome(&self) -> Option<Result<BackgroundPlane, SetupError>> {
        self.shared.borrow().outcome.clone()
    }

    /// One frame's readiness check.
    ///
    /// Once settled, the same outcome is returned without checking the
    /// camera again or spending budget.
    pub fn poll<F: FrameSource + ?Sized>(
        &mut self,
        frames: &F,
    ) -> Poll<Result<BackgroundPlane, SetupError>> {
        if let Some(done) = self.outcome() {
            return Poll::Ready(done);
        }
        self.polls += 1;

        let outcome = match (frames.background_plane(), frames.frame_size()) {
            (Some(plane), Some((w, h))) => {
                debug!("camera ready after {} frames: {w}x{h}", self.polls);
                Ok(plane)
            }
            _ if self.polls >= self.max_polls => {
                error!(
                    "camera background plane still unavailable after {} frames; check the camera setup",
                    self.polls
                );
                Err(SetupError::BackgroundPlaneUnavailable { polls: self.polls })
            }
            _ => return Poll::Pending,
        };

        let waker = {
            let mut shared = self.shared.borrow_mut();
            shared.outcome = Some(outcome.clone());
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Poll::Ready(outcome)
    }

    /// Future resolving with the settled outcome.
    pub fn readiness(&self) -> Readiness {
        Readiness {
            shared: self.shared.clone(),
        }
    }
}

/// Resolves once a frame-driven poll settles readiness. Never wakes itself.
#[derive(Debug)]
pub struct Readiness {
    shared: Rc<RefCell<Shared>>,
}

impl Future for Readiness {
    type Output = Result<BackgroundPlane, SetupError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        if let Some(done) = shared.outcome.clone() {
            return Poll::Ready(done);
        }
        shared.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Isometry3;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Wake;
    use std::time::{Duration, Instant};
    use target_capture_core::{CameraModel, Image};

    fn plane() -> BackgroundPlane {
        let cam = CameraModel::new(Isometry3::identity(), 60.0, 4.0 / 3.0);
        BackgroundPlane::fitted_to_camera(&cam, 1.0, 64, 48)
    }

    struct LateCamera {
        ready_after: usize,
        calls: Cell<usize>,
    }

    impl FrameSource for LateCamera {
        fn frame_size(&self) -> Option<(usize, usize)> {
            Some((64, 48))
        }
        fn current_frame(&self) -> Option<Image> {
            None
        }
        fn background_plane(&self) -> Option<BackgroundPlane> {
            self.calls.set(self.calls.get() + 1);
            (self.calls.get() > self.ready_after).then(plane)
        }
    }

    fn camera(ready_after: usize) -> LateCamera {
        LateCamera {
            ready_after,
            calls: Cell::new(0),
        }
    }

    /// Ready once a wall-clock delay has passed since start.
    struct SlowStartCamera {
        ready_at: Instant,
    }

    impl FrameSource for SlowStartCamera {
        fn frame_size(&self) -> Option<(usize, usize)> {
            (Instant::now() >= self.ready_at).then_some((64, 48))
        }
        fn current_frame(&self) -> Option<Image> {
            None
        }
        fn background_plane(&self) -> Option<BackgroundPlane> {
            (Instant::now() >= self.ready_at).then(plane)
        }
    }

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn resolves_once_plane_appears() {
        let cam = camera(3);
        let mut check = ReadinessProbe::new(10);
        for _ in 0..3 {
            assert!(check.poll(&cam).is_pending());
        }
        assert!(matches!(check.poll(&cam), Poll::Ready(Ok(_))));
        assert_eq!(check.polls(), 4);
    }

    #[test]
    fn gives_up_after_budget_and_stays_failed() {
        let cam = camera(usize::MAX);
        let mut check = ReadinessProbe::new(5);
        let mut result = Poll::Pending;
        for _ in 0..5 {
            result = check.poll(&cam);
        }
        let failed = Poll::Ready(Err(SetupError::BackgroundPlaneUnavailable { polls: 5 }));
        assert_eq!(result, failed);
        assert_eq!(check.poll(&cam), failed);
        assert_eq!(check.polls(), 5);
    }

    #[test]
    fn settled_ok_is_kept_past_the_budget() {
        let cam = camera(0);
        let mut check = ReadinessProbe::new(2);
        for _ in 0..4 {
            assert_eq!(check.poll(&cam), Poll::Ready(Ok(plane())));
        }
        assert_eq!(check.polls(), 1);
        assert_eq!(cam.calls.get(), 1);
    }

    #[test]
    fn awaiting_spends_no_budget_on_a_slow_camera() {
        let cam = SlowStartCamera {
            ready_at: Instant::now() + Duration::from_millis(20),
        };
        let mut check = ReadinessProbe::new(3);
        let mut fut = check.readiness();
        let mut cx = Context::from_waker(Waker::noop());

        // an eager executor polling in a tight loop
        for _ in 0..10_000 {
            assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        }
        assert_eq!(check.polls(), 0);

        std::thread::sleep(Duration::from_millis(25));
        assert!(matches!(check.poll(&cam), Poll::Ready(Ok(_))));
        assert!(matches!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(Ok(_))));
    }

    #[test]
    fn future_is_woken_only_when_settled() {
        let cam = camera(2);
        let mut check = ReadinessProbe::new(10);
        let mut fut = check.readiness();
        let counter = Arc::new(CountingWaker::default());
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        assert!(check.poll(&cam).is_pending());
        assert!(check.poll(&cam).is_pending());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        assert!(check.poll(&cam).is_ready());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(matches!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(Ok(_))));
    }
}
