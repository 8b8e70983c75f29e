use log::{trace, warn};

use crate::capture::{CaptureWriter, ViolationCapture};
use crate::classes::ClassCatalog;
use crate::config::PipelineConfig;
use crate::detection::{RawDetection, TrackedDetection};
use crate::error::Error;
use crate::frame::FrameOutcome;
use crate::plate::{PlateReader, PlateStage};
use crate::speed::SpeedEstimator;
use crate::tracker::Tracker;
use crate::Timestamp;

/// Object detector model, consumed as a function of the frame.
pub trait Detector<I> {
    fn detect(&mut self, image: &I) -> Result<Vec<RawDetection>, Error>;
}

/// Draws annotations for the detections onto a copy of the frame.
pub trait Renderer<I> {
    fn render(&mut self, image: &I, detections: &[TrackedDetection]) -> Result<I, Error>;
}

/// Renderer that hands the frame back unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl<I: Clone> Renderer<I> for NullRenderer {
    fn render(&mut self, image: &I, _: &[TrackedDetection]) -> Result<I, Error> {
        Ok(image.clone())
    }
}

/// Owns every stage's state and the external collaborators.
///
/// Frames are processed one at a time: detect, filter, track, estimate
/// speed, read plates, evaluate violations, render. Each stage prunes its
/// own per-track cache at the end of the frame.
pub struct Pipeline<D, P, R, W> {
    catalog: ClassCatalog,
    tracker: Tracker,
    speed: SpeedEstimator,
    plates: PlateStage,
    captures: ViolationCapture,

    detector: D,
    plate_reader: P,
    renderer: R,
    writer: W,
}

impl<D, P, R, W> Pipeline<D, P, R, W> {
    pub fn new(
        config: PipelineConfig,
        detector: D,
        plate_reader: P,
        renderer: R,
        writer: W,
    ) -> Self {
        Self {
            catalog: config.catalog,
            tracker: Tracker::new(config.tracker),
            speed: SpeedEstimator::new(config.speed),
            plates: PlateStage::new(config.plate),
            captures: ViolationCapture::new(config.capture),
            detector,
            plate_reader,
            renderer,
            writer,
        }
    }

    #[inline]
    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    #[inline]
    pub fn catalog_mut(&mut self) -> &mut ClassCatalog {
        &mut self.catalog
    }

    #[inline]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[inline]
    pub fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    #[inline]
    pub fn speed(&self) -> &SpeedEstimator {
        &self.speed
    }

    #[inline]
    pub fn speed_mut(&mut self) -> &mut SpeedEstimator {
        &mut self.speed
    }

    #[inline]
    pub fn plates(&self) -> &PlateStage {
        &self.plates
    }

    #[inline]
    pub fn plates_mut(&mut self) -> &mut PlateStage {
        &mut self.plates
    }

    #[inline]
    pub fn captures(&self) -> &ViolationCapture {
        &self.captures
    }

    #[inline]
    pub fn captures_mut(&mut self) -> &mut ViolationCapture {
        &mut self.captures
    }

    #[inline]
    pub fn set_speed_limit(&mut self, limit: Option<f32>) {
        self.captures.set_speed_limit(limit);
    }

    #[inline]
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.captures.set_confidence_threshold(threshold);
    }

    #[inline]
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    #[inline]
    pub fn plate_reader_mut(&mut self) -> &mut P {
        &mut self.plate_reader
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[inline]
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Forgets every track and cached record.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.speed.clear();
        self.plates.clear();
        self.captures.clear();
    }

    /// Runs every stage after detection on already detected objects.
    pub fn track<I>(
        &mut self,
        image: &I,
        raw: Vec<RawDetection>,
        now: Timestamp,
    ) -> Result<Vec<TrackedDetection>, Error>
    where
        P: PlateReader<I>,
        W: CaptureWriter<I>,
    {
        let detections = self.catalog.filter(raw);
        let mut tracked = self.tracker.update(&detections, now)?;

        self.speed.apply(&mut tracked, now);
        self.plates
            .apply(image, &mut tracked, &mut self.plate_reader, now);
        let captured = self
            .captures
            .evaluate(image, &mut tracked, &mut self.writer, now);

        trace!(
            "frame at {:.3}s: {} tracked, {} captured",
            now,
            tracked.len(),
            captured
        );

        Ok(tracked)
    }

    pub fn process<I>(&mut self, image: &I, now: Timestamp) -> Result<Vec<TrackedDetection>, Error>
    where
        D: Detector<I>,
        P: PlateReader<I>,
        W: CaptureWriter<I>,
    {
        let raw = self.detector.detect(image)?;

        self.track(image, raw, now)
    }

    /// Processes and renders one frame. Any stage failure is logged and the
    /// input frame is handed back untouched.
    pub fn run_frame<I>(&mut self, frame: I, now: Timestamp) -> FrameOutcome<I>
    where
        D: Detector<I>,
        P: PlateReader<I>,
        R: Renderer<I>,
        W: CaptureWriter<I>,
    {
        let result = self
            .process(&frame, now)
            .and_then(|detections| {
                let rendered = self.renderer.render(&frame, &detections)?;
                Ok((rendered, detections))
            });

        match result {
            Ok((rendered, detections)) => FrameOutcome::Annotated {
                frame: rendered,
                detections,
            },
            Err(reason) => {
                warn!("frame at {:.3}s passed through: {}", now, reason);
                FrameOutcome::Passthrough { frame, reason }
            }
        }
    }
}
