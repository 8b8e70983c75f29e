pub mod bbox;
pub mod capture;
pub mod classes;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod plate;
pub mod session;
pub mod speed;
pub mod tracker;

mod circular_queue;
mod rolling_median;
mod track;

pub use capture::{Capture, CaptureWriter, SpeedLimit, ViolationCapture};
pub use classes::ClassCatalog;
pub use config::PipelineConfig;
pub use detection::{ClassDimensions, Detection, PlateText, RawDetection, TrackedDetection};
pub use error::Error;
pub use frame::FrameOutcome;
pub use pipeline::{Detector, NullRenderer, Pipeline, Renderer};
pub use plate::{NoPlateReader, PlateCorrector, PlateReader, PlateStage};
pub use session::{FrameTicket, Session};
pub use speed::{SpeedEstimator, SpeedUnit};
pub use track::Track;
pub use tracker::Tracker;

/// Seconds on the host's clock.
pub type Timestamp = f64;
