use serde_derive::{Deserialize, Serialize};
use std::fmt;

use nalgebra as na;

use crate::bbox::{BBox, Ltrb};
use crate::Timestamp;

/// Real-world average size of a class, in meters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ClassDimensions {
    pub width: f32,
    pub height: f32,
}

impl ClassDimensions {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Detector output, before the class catalog has been consulted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: BBox<Ltrb>,
    pub class: String,
    #[serde(rename = "p")]
    pub confidence: f32,
}

/// A detection of a class of interest, carrying its class reference size.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    pub class: String,
    #[serde(rename = "p")]
    pub confidence: f32,
    pub dims: Option<ClassDimensions>,
}

impl Detection {
    pub fn new(
        bbox: BBox<Ltrb>,
        class: impl Into<String>,
        confidence: f32,
        dims: ClassDimensions,
    ) -> Self {
        Self {
            bbox,
            class: class.into(),
            confidence,
            dims: Some(dims),
        }
    }

    #[inline(always)]
    pub fn center(&self) -> na::Point2<f32> {
        self.bbox.center()
    }

    /// Pixels per meter implied by the box size and the class reference
    /// size, averaged over both axes.
    pub fn pixels_per_meter(&self) -> Option<f32> {
        let dims = self.dims.filter(ClassDimensions::is_usable)?;
        let ppm_w = self.bbox.width() / dims.width;
        let ppm_h = self.bbox.height() / dims.height;

        Some((ppm_w + ppm_h) / 2.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum PlateText {
    Read(String),
    Unreadable,
}

impl PlateText {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlateText::Read(s) => Some(s),
            PlateText::Unreadable => None,
        }
    }
}

impl fmt::Display for PlateText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlateText::Read(s) => f.write_str(s),
            PlateText::Unreadable => f.write_str("UNREADABLE"),
        }
    }
}

/// A detection after it went through the tracker, widened by each later
/// stage of the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackedDetection {
    pub detection: Detection,
    pub track_id: u32,
    pub first_seen: Timestamp,

    // center points, oldest first, current one last
    pub history: Vec<na::Point2<f32>>,

    // in px per frame
    pub velocity: na::Vector2<f32>,

    pub speed: Option<f32>,
    pub plate: Option<PlateText>,
    pub offender: bool,
}

impl TrackedDetection {
    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        self.detection.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ppm_averages_both_axes() {
        let det = Detection::new(
            BBox::ltrb(0.0, 0.0, 200.0, 150.0),
            "car",
            0.9,
            ClassDimensions::new(2.0, 1.5),
        );

        assert_abs_diff_eq!(det.pixels_per_meter().unwrap(), 100.0);
    }

    #[test]
    fn ppm_requires_dimensions() {
        let mut det = Detection::new(
            BBox::ltrb(0.0, 0.0, 200.0, 150.0),
            "car",
            0.9,
            ClassDimensions::new(0.0, 1.5),
        );
        assert_eq!(det.pixels_per_meter(), None);

        det.dims = None;
        assert_eq!(det.pixels_per_meter(), None);
    }

    #[test]
    fn raw_detection_json() {
        let raw: RawDetection =
            serde_json::from_str(r#"{"bbox":[1.0,2.0,3.0,4.0],"class":"car","p":0.8}"#).unwrap();

        assert_eq!(raw.bbox, BBox::ltrb(1.0, 2.0, 3.0, 4.0));
        assert_eq!(raw.class, "car");
    }
}
