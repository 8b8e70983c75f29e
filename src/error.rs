use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed detection `{class}`: box {bbox:?} is not finite or has no area")]
    MalformedDetection { class: String, bbox: [f32; 4] },

    #[error("Detection `{class}` has no usable reference dimensions")]
    MissingClassDimensions { class: String },

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Plate Reader Error: {0}")]
    PlateReader(String),

    #[error("Render Error: {0}")]
    Render(String),

    #[error("Capture Write Error: {0}")]
    CaptureWrite(String),

    #[error("Config Error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}
