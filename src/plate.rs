//! Licence plate text correction and per-track plate memo.
//!
//! Plates follow the `[A-Z]{2}[0-9]{2}[A-Z]{3}` layout: a two letter area
//! code, a two digit registration year and a three letter suffix. OCR output
//! is repaired by swapping look-alike characters according to the slot they
//! occupy, and only accepted when the repaired text stays close to what was
//! read.

use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bbox::{self, BBox, Ltrb};
use crate::detection::{PlateText, TrackedDetection};
use crate::error::Error;
use crate::Timestamp;

pub const PLATE_LEN: usize = 7;

const MIN_RAW_LEN: usize = 6;
const MAX_RAW_LEN: usize = 8;

/// Plate region detection and OCR, both provided by external models.
pub trait PlateReader<I> {
    /// Plate boxes found inside `vehicle`, relative to its top-left corner.
    fn detect_plate_regions(
        &mut self,
        image: &I,
        vehicle: &BBox<Ltrb>,
    ) -> Result<Vec<BBox<Ltrb>>, Error>;

    /// Raw text read from the plate at `plate`, in frame coordinates.
    fn read_text(&mut self, image: &I, plate: &BBox<Ltrb>) -> Result<String, Error>;
}

/// Reader for pipelines that don't do plate recognition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlateReader;

impl<I> PlateReader<I> for NoPlateReader {
    fn detect_plate_regions(&mut self, _: &I, _: &BBox<Ltrb>) -> Result<Vec<BBox<Ltrb>>, Error> {
        Ok(Vec::new())
    }

    fn read_text(&mut self, _: &I, _: &BBox<Ltrb>) -> Result<String, Error> {
        Ok(String::new())
    }
}

#[inline(always)]
fn is_digit_slot(idx: usize) -> bool {
    idx == 2 || idx == 3
}

pub fn is_valid_plate(text: &str) -> bool {
    let bytes = text.as_bytes();

    bytes.len() == PLATE_LEN
        && bytes.iter().enumerate().all(|(i, b)| {
            if is_digit_slot(i) {
                b.is_ascii_digit()
            } else {
                b.is_ascii_uppercase()
            }
        })
}

fn digit_to_letter(c: char) -> char {
    match c {
        '0' => 'O',
        '1' => 'I',
        '3' => 'J',
        '4' => 'A',
        '6' => 'G',
        '5' => 'S',
        c => c,
    }
}

fn letter_to_digit(c: char) -> char {
    match c {
        'O' => '0',
        'I' => '1',
        'J' => '3',
        'A' => '4',
        'G' => '6',
        'S' => '5',
        c => c,
    }
}

/// `2 * LCS / (len(a) + len(b))`, 1.0 for two empty strings.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();

    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (2 * prev[b.len()]) as f32 / total as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateCorrector {
    pub similarity_threshold: f32,
}

impl Default for PlateCorrector {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl PlateCorrector {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Returns plate text that follows the grammar, or `None` when the raw
    /// reading can't be repaired with enough confidence.
    pub fn correct(&self, raw: &str) -> Option<String> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        if is_valid_plate(&cleaned) {
            return Some(cleaned);
        }

        let chars: Vec<char> = cleaned.chars().collect();
        if !(MIN_RAW_LEN..=MAX_RAW_LEN).contains(&chars.len()) {
            return None;
        }

        let groups = chars
            .windows(PLATE_LEN)
            .find(|w| is_valid_plate(&w.iter().collect::<String>()))
            .or_else(|| (chars.len() == PLATE_LEN).then_some(&chars[..]))?;

        let candidate: String = groups
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                if is_digit_slot(i) {
                    letter_to_digit(c)
                } else {
                    digit_to_letter(c)
                }
            })
            .collect();

        if !is_valid_plate(&candidate) {
            return None;
        }

        let score = similarity(&candidate, &cleaned);
        if score < self.similarity_threshold {
            debug!("plate `{}` -> `{}` rejected, similarity {:.3}", cleaned, candidate, score);
            return None;
        }

        Some(candidate)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlateConfig {
    pub similarity_threshold: f32,
    /// Seconds an accepted plate is reused before reading again.
    pub ttl: Timestamp,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            ttl: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlateRecord {
    pub text: PlateText,
    pub read_at: Timestamp,
}

/// Attaches plate text to tracked detections, reading each track's plate
/// at most once per TTL window.
#[derive(Debug, Default)]
pub struct PlateStage {
    config: PlateConfig,
    records: HashMap<u32, PlateRecord>,
}

impl PlateStage {
    pub fn new(config: PlateConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &PlateConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut PlateConfig {
        &mut self.config
    }

    #[inline]
    pub fn corrector(&self) -> PlateCorrector {
        PlateCorrector::new(self.config.similarity_threshold)
    }

    #[inline]
    pub fn record(&self, id: u32) -> Option<&PlateRecord> {
        self.records.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Accepted plate text for `id`, if it was read within the TTL.
    pub fn cached(&self, id: u32, now: Timestamp) -> Option<&str> {
        let record = self.records.get(&id)?;
        if now - record.read_at > self.config.ttl {
            return None;
        }

        record.text.as_str()
    }

    pub fn apply<I, R>(
        &mut self,
        image: &I,
        detections: &mut [TrackedDetection],
        reader: &mut R,
        now: Timestamp,
    ) where
        R: PlateReader<I> + ?Sized,
    {
        for det in detections.iter_mut() {
            if let Some(text) = self.cached(det.track_id, now) {
                det.plate = Some(PlateText::Read(text.to_string()));
                continue;
            }

            let text = self.read_plate(image, det, reader);
            self.records.insert(
                det.track_id,
                PlateRecord {
                    text: text.clone(),
                    read_at: now,
                },
            );

            det.plate = Some(text);
        }

        self.prune(now);
    }

    fn read_plate<I, R>(&self, image: &I, det: &TrackedDetection, reader: &mut R) -> PlateText
    where
        R: PlateReader<I> + ?Sized,
    {
        let vehicle = &det.detection.bbox;
        let regions = match reader.detect_plate_regions(image, vehicle) {
            Ok(regions) => regions,
            Err(err) => {
                warn!("track {}: plate detection failed: {}", det.track_id, err);
                return PlateText::Unreadable;
            }
        };

        let corrector = self.corrector();

        for region in regions.iter().filter(|r| bbox::plate_belongs_to(vehicle, r)) {
            let plate = bbox::absolute_plate_box(vehicle, region);

            match reader.read_text(image, &plate) {
                Ok(raw) => {
                    if let Some(text) = corrector.correct(&raw) {
                        debug!("track {}: plate `{}`", det.track_id, text);
                        return PlateText::Read(text);
                    }
                }
                Err(err) => warn!("track {}: OCR failed: {}", det.track_id, err),
            }
        }

        PlateText::Unreadable
    }

    pub fn prune(&mut self, now: Timestamp) {
        let ttl = self.config.ttl;

        self.records.retain(|_, r| now - r.read_at <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{ClassDimensions, Detection};
    use approx::assert_abs_diff_eq;
    use nalgebra as na;

    #[test]
    fn grammar() {
        assert!(is_valid_plate("AB12CDE"));
        assert!(!is_valid_plate("AB1CCDE"));
        assert!(!is_valid_plate("ab12cde"));
        assert!(!is_valid_plate("AB12CD"));
    }

    #[test]
    fn valid_plate_is_unchanged() {
        let c = PlateCorrector::default();

        assert_eq!(c.correct("AB12CDE").as_deref(), Some("AB12CDE"));
        assert_eq!(c.correct(" ab12 cde\n").as_deref(), Some("AB12CDE"));
    }

    #[test]
    fn single_confusable_is_repaired() {
        let c = PlateCorrector::default();

        assert_eq!(c.correct("AB0IXYZ").as_deref(), Some("AB01XYZ"));
        assert_eq!(c.correct("A8O1XYZ"), None);
        assert_eq!(c.correct("AB12XY5").as_deref(), Some("AB12XYS"));
    }

    #[test]
    fn too_many_repairs_are_rejected() {
        let c = PlateCorrector::default();

        assert_eq!(c.correct("4B0IXYZ"), None);
        assert_eq!(
            PlateCorrector::new(0.7).correct("4B0IXYZ").as_deref(),
            Some("AB01XYZ")
        );
    }

    #[test]
    fn length_bounds() {
        let c = PlateCorrector::default();

        assert_eq!(c.correct("AB12C"), None);
        assert_eq!(c.correct("AB12CD"), None);
        assert_eq!(c.correct("XAB12CDE").as_deref(), Some("AB12CDE"));
        assert_eq!(c.correct("AB12CDEFG"), None);
    }

    #[test]
    fn similarity_ratio() {
        assert_abs_diff_eq!(similarity("AB01XYZ", "AB0IXYZ"), 12.0 / 14.0);
        assert_abs_diff_eq!(similarity("", ""), 1.0);
        assert_abs_diff_eq!(similarity("ABC", "XYZ"), 0.0);
    }

    struct ScriptedReader {
        regions: Vec<BBox<Ltrb>>,
        text: Result<String, String>,
        reads: usize,
        seen: Vec<BBox<Ltrb>>,
    }

    impl ScriptedReader {
        fn new(text: Result<&str, &str>) -> Self {
            Self {
                regions: vec![BBox::ltrb(40.0, 30.0, 80.0, 40.0)],
                text: text.map(str::to_string).map_err(str::to_string),
                reads: 0,
                seen: Vec::new(),
            }
        }
    }

    impl PlateReader<()> for ScriptedReader {
        fn detect_plate_regions(
            &mut self,
            _: &(),
            _: &BBox<Ltrb>,
        ) -> Result<Vec<BBox<Ltrb>>, Error> {
            Ok(self.regions.clone())
        }

        fn read_text(&mut self, _: &(), plate: &BBox<Ltrb>) -> Result<String, Error> {
            self.reads += 1;
            self.seen.push(*plate);
            self.text.clone().map_err(Error::PlateReader)
        }
    }

    fn tracked(id: u32) -> TrackedDetection {
        TrackedDetection {
            detection: Detection::new(
                BBox::ltrb(100.0, 200.0, 220.0, 260.0),
                "car",
                0.9,
                ClassDimensions::new(1.821, 1.534),
            ),
            track_id: id,
            first_seen: 0.0,
            history: Vec::new(),
            velocity: na::Vector2::zeros(),
            speed: None,
            plate: None,
            offender: false,
        }
    }

    #[test]
    fn accepted_plate_is_cached_per_track() {
        let mut stage = PlateStage::default();
        let mut reader = ScriptedReader::new(Ok("AB0IXYZ"));

        for i in 0..5 {
            let mut dets = vec![tracked(7)];
            stage.apply(&(), &mut dets, &mut reader, i as f64 * 0.5);
            assert_eq!(dets[0].plate, Some(PlateText::Read("AB01XYZ".to_string())));
        }

        assert_eq!(reader.reads, 1);
        assert_eq!(reader.seen[0], BBox::ltrb(140.0, 230.0, 180.0, 240.0));

        let mut dets = vec![tracked(7)];
        stage.apply(&(), &mut dets, &mut reader, 14.5);
        assert_eq!(reader.reads, 2);
    }

    #[test]
    fn unreadable_plates_are_retried() {
        let mut stage = PlateStage::default();
        let mut reader = ScriptedReader::new(Ok("??"));

        for i in 0..3 {
            let mut dets = vec![tracked(3)];
            stage.apply(&(), &mut dets, &mut reader, i as f64);
            assert_eq!(dets[0].plate, Some(PlateText::Unreadable));
        }

        assert_eq!(reader.reads, 3);
        assert_eq!(stage.record(3).unwrap().text, PlateText::Unreadable);
    }

    #[test]
    fn reader_failure_means_unreadable() {
        let mut stage = PlateStage::default();
        let mut reader = ScriptedReader::new(Err("model crashed"));

        let mut dets = vec![tracked(1)];
        stage.apply(&(), &mut dets, &mut reader, 0.0);
        assert_eq!(dets[0].plate, Some(PlateText::Unreadable));
    }

    #[test]
    fn regions_outside_vehicle_are_ignored() {
        let mut stage = PlateStage::default();
        let mut reader = ScriptedReader::new(Ok("AB12CDE"));
        reader.regions = vec![BBox::ltrb(500.0, 500.0, 540.0, 510.0)];

        let mut dets = vec![tracked(1)];
        stage.apply(&(), &mut dets, &mut reader, 0.0);
        assert_eq!(dets[0].plate, Some(PlateText::Unreadable));
        assert_eq!(reader.reads, 0);
    }

    #[test]
    fn records_expire() {
        let mut stage = PlateStage::default();
        let mut reader = ScriptedReader::new(Ok("AB12CDE"));

        let mut dets = vec![tracked(1)];
        stage.apply(&(), &mut dets, &mut reader, 0.0);
        assert_eq!(stage.cached(1, 5.0), Some("AB12CDE"));

        stage.apply(&(), &mut [], &mut reader, 12.5);
        assert!(stage.is_empty());
    }
}
