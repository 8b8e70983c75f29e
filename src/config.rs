use serde_derive::{Deserialize, Serialize};
use std::path::Path;

use crate::capture::CaptureConfig;
use crate::classes::ClassCatalog;
use crate::error::Error;
use crate::plate::PlateConfig;
use crate::speed::SpeedConfig;
use crate::tracker::TrackerConfig;

/// Tuning for every stage. Missing sections and fields fall back to their
/// defaults when loaded from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub catalog: ClassCatalog,
    pub tracker: TrackerConfig,
    pub speed: SpeedConfig,
    pub plate: PlateConfig,
    pub capture: CaptureConfig,
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;

        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
