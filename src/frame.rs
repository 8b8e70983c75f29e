use crate::detection::TrackedDetection;
use crate::error::Error;

/// Result of pushing one frame through the pipeline.
///
/// Every variant hands the frame back so the host can keep playing.
#[derive(Debug)]
pub enum FrameOutcome<I> {
    /// All stages ran; `frame` is the rendered frame.
    Annotated {
        frame: I,
        detections: Vec<TrackedDetection>,
    },
    /// A stage failed; `frame` is the untouched input.
    Passthrough { frame: I, reason: Error },
    /// The frame was pulled before a seek and was not processed.
    Discarded(I),
}

impl<I> FrameOutcome<I> {
    #[inline]
    pub fn frame(&self) -> &I {
        match self {
            FrameOutcome::Annotated { frame, .. } => frame,
            FrameOutcome::Passthrough { frame, .. } => frame,
            FrameOutcome::Discarded(frame) => frame,
        }
    }

    #[inline]
    pub fn into_frame(self) -> I {
        match self {
            FrameOutcome::Annotated { frame, .. } => frame,
            FrameOutcome::Passthrough { frame, .. } => frame,
            FrameOutcome::Discarded(frame) => frame,
        }
    }

    #[inline]
    pub fn detections(&self) -> &[TrackedDetection] {
        match self {
            FrameOutcome::Annotated { detections, .. } => detections,
            _ => &[],
        }
    }

    #[inline]
    pub fn is_annotated(&self) -> bool {
        matches!(self, FrameOutcome::Annotated { .. })
    }
}
