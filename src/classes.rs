use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detection::{ClassDimensions, Detection, RawDetection};

/// Allow-list of classes worth tracking, with their average real-world size.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClassCatalog {
    pub classes: BTreeMap<String, ClassDimensions>,
    pub min_confidence: f32,
}

impl Default for ClassCatalog {
    fn default() -> Self {
        let classes = [
            ("car", ClassDimensions::new(1.821, 1.534)),
            ("motorcycle", ClassDimensions::new(0.995, 2.190)),
            ("bus", ClassDimensions::new(2.560, 4.200)),
            ("truck", ClassDimensions::new(2.400, 2.590)),
        ]
        .into_iter()
        .map(|(name, dims)| (name.to_string(), dims))
        .collect();

        Self {
            classes,
            min_confidence: 0.70,
        }
    }
}

impl ClassCatalog {
    #[inline]
    pub fn dimensions(&self, class: &str) -> Option<ClassDimensions> {
        self.classes.get(class).copied()
    }

    pub fn admit(&self, raw: RawDetection) -> Option<Detection> {
        // NaN and scores above 1.0 are rejected along with weak ones
        if !(self.min_confidence..=1.0).contains(&raw.confidence) {
            return None;
        }

        let dims = self.dimensions(&raw.class)?;

        Some(Detection {
            bbox: raw.bbox,
            class: raw.class,
            confidence: raw.confidence,
            dims: Some(dims),
        })
    }

    pub fn filter(&self, raw: Vec<RawDetection>) -> Vec<Detection> {
        raw.into_iter().filter_map(|r| self.admit(r)).collect()
    }
}
