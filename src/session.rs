use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::capture::CaptureWriter;
use crate::frame::FrameOutcome;
use crate::pipeline::{Detector, Pipeline, Renderer};
use crate::plate::PlateReader;
use crate::Timestamp;

/// Seek epoch observed when a frame was pulled from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket(u64);

/// Pipeline shared between a playback thread and seek/teardown requests.
///
/// Frame processing runs under the lock, so a seek never interleaves with
/// a frame in flight. A frame whose ticket predates the latest seek is
/// handed back without touching any state.
pub struct Session<D, P, R, W> {
    pipeline: Mutex<Pipeline<D, P, R, W>>,
    epoch: AtomicU64,
}

impl<D, P, R, W> Session<D, P, R, W> {
    pub fn new(pipeline: Pipeline<D, P, R, W>) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
            epoch: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pipeline<D, P, R, W>> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn ticket(&self) -> FrameTicket {
        FrameTicket(self.epoch.load(Ordering::Acquire))
    }

    pub fn process<I>(&self, ticket: FrameTicket, frame: I, now: Timestamp) -> FrameOutcome<I>
    where
        D: Detector<I>,
        P: PlateReader<I>,
        R: Renderer<I>,
        W: CaptureWriter<I>,
    {
        let mut pipeline = self.lock();

        if ticket != self.ticket() {
            debug!("frame at {:.3}s discarded after seek", now);
            return FrameOutcome::Discarded(frame);
        }

        pipeline.run_frame(frame, now)
    }

    /// Invalidates frames pulled before this call. Tracks, speeds and plates
    /// are kept.
    pub fn seek(&self) {
        let _pipeline = self.lock();

        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Ends the session: pending frames are invalidated and every cache is
    /// cleared.
    pub fn teardown(&self) {
        let mut pipeline = self.lock();

        self.epoch.fetch_add(1, Ordering::AcqRel);
        pipeline.reset();
    }

    /// Runs `f` between frames, e.g. to change the speed limit.
    pub fn with_pipeline<T>(&self, f: impl FnOnce(&mut Pipeline<D, P, R, W>) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn into_inner(self) -> Pipeline<D, P, R, W> {
        self.pipeline
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
