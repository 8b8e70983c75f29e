use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::detection::TrackedDetection;
use crate::error::Error;
use crate::Timestamp;

/// UK national limits, in mph.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeedLimit {
    SchoolZone,
    Residential,
    Carriageway,
    Motorway,
}

impl SpeedLimit {
    pub const ALL: [SpeedLimit; 4] = [
        SpeedLimit::SchoolZone,
        SpeedLimit::Residential,
        SpeedLimit::Carriageway,
        SpeedLimit::Motorway,
    ];

    #[inline]
    pub fn mph(self) -> f32 {
        match self {
            SpeedLimit::SchoolZone => 20.0,
            SpeedLimit::Residential => 30.0,
            SpeedLimit::Carriageway => 60.0,
            SpeedLimit::Motorway => 70.0,
        }
    }
}

impl fmt::Display for SpeedLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpeedLimit::SchoolZone => "School Zone",
            SpeedLimit::Residential => "Residential",
            SpeedLimit::Carriageway => "Carriageway",
            SpeedLimit::Motorway => "Motorway",
        };

        write!(f, "{} - {}mph", name, self.mph())
    }
}

/// Everything the writer needs to persist one violation.
#[derive(Debug)]
pub struct Capture<'a, I> {
    pub image: &'a I,
    pub detection: &'a TrackedDetection,
    pub captured_at: Timestamp,
    pub file_name: String,
}

/// Composes and stores the capture image. Failures are logged by the caller
/// and never stop the pipeline.
pub trait CaptureWriter<I> {
    fn write(&mut self, capture: &Capture<'_, I>) -> Result<(), Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// No limit means nothing is an offence.
    pub speed_limit: Option<f32>,
    pub confidence_threshold: f32,
    /// Seconds after the last offence before a captured track re-arms.
    pub ttl: Timestamp,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            speed_limit: None,
            confidence_threshold: 0.70,
            ttl: 12.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffenderRecord {
    pub already_captured: bool,
    pub last_detected: Timestamp,
}

#[derive(Debug, Default)]
pub struct ViolationCapture {
    config: CaptureConfig,
    records: HashMap<u32, OffenderRecord>,
}

impl ViolationCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut CaptureConfig {
        &mut self.config
    }

    #[inline]
    pub fn set_speed_limit(&mut self, limit: Option<f32>) {
        self.config.speed_limit = limit;
    }

    #[inline]
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.config.confidence_threshold = threshold;
    }

    #[inline]
    pub fn record(&self, id: u32) -> Option<&OffenderRecord> {
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

    #[inline]
    pub fn is_offending(&self, det: &TrackedDetection) -> bool {
        match (self.config.speed_limit, det.speed) {
            (Some(limit), Some(speed)) => {
                speed > limit && det.detection.confidence > self.config.confidence_threshold
            }
            _ => false,
        }
    }

    /// Flags offending detections and triggers at most one capture for this
    /// frame. Returns the number of captures triggered.
    pub fn evaluate<I, W>(
        &mut self,
        image: &I,
        detections: &mut [TrackedDetection],
        writer: &mut W,
        now: Timestamp,
    ) -> usize
    where
        W: CaptureWriter<I> + ?Sized,
    {
        let ttl = self.config.ttl;
        let mut captured = 0;

        for det in detections.iter_mut() {
            if !self.is_offending(det) {
                continue;
            }

            det.offender = true;

            let record = self.records.entry(det.track_id).or_insert(OffenderRecord {
                already_captured: false,
                last_detected: now,
            });

            if now - record.last_detected > ttl {
                record.already_captured = false;
            }
            record.last_detected = now;

            if captured > 0 || record.already_captured {
                continue;
            }

            record.already_captured = true;
            captured += 1;

            let capture = Capture {
                image,
                detection: &*det,
                captured_at: now,
                file_name: format!(
                    "offender-{}-{}.jpg",
                    det.track_id,
                    (now * 1000.0).round() as u64
                ),
            };

            debug!(
                "track {} captured at speed {:?}",
                det.track_id, capture.detection.speed
            );

            if let Err(err) = writer.write(&capture) {
                warn!("capture of track {} not written: {}", det.track_id, err);
            }
        }

        self.prune(now);

        captured
    }

    pub fn prune(&mut self, now: Timestamp) {
        let ttl = self.config.ttl;

        self.records.retain(|_, r| now - r.last_detected <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::{ClassDimensions, Detection};
    use nalgebra as na;

    #[derive(Default)]
    struct Recorder {
        files: Vec<(u32, String)>,
        fail: bool,
    }

    impl CaptureWriter<()> for Recorder {
        fn write(&mut self, capture: &Capture<'_, ()>) -> Result<(), Error> {
            if self.fail {
                return Err(Error::CaptureWrite("disk full".to_string()));
            }

            self.files
                .push((capture.detection.track_id, capture.file_name.clone()));
            Ok(())
        }
    }

    fn tracked(id: u32, speed: f32, confidence: f32) -> TrackedDetection {
        TrackedDetection {
            detection: Detection::new(
                BBox::ltrb(0.0, 0.0, 100.0, 50.0),
                "car",
                confidence,
                ClassDimensions::new(1.821, 1.534),
            ),
            track_id: id,
            first_seen: 0.0,
            history: Vec::new(),
            velocity: na::Vector2::zeros(),
            speed: Some(speed),
            plate: None,
            offender: false,
        }
    }

    fn capture_with_limit(limit: f32) -> ViolationCapture {
        ViolationCapture::new(CaptureConfig {
            speed_limit: Some(limit),
            ..CaptureConfig::default()
        })
    }

    #[test]
    fn no_limit_no_offence() {
        let mut vc = ViolationCapture::default();
        let mut rec = Recorder::default();
        let mut dets = vec![tracked(1, 200.0, 0.99)];

        assert_eq!(vc.evaluate(&(), &mut dets, &mut rec, 0.0), 0);
        assert!(!dets[0].offender);
    }

    #[test]
    fn one_capture_per_track_within_cooldown() {
        let mut vc = capture_with_limit(30.0);
        let mut rec = Recorder::default();

        for i in 0..5 {
            let mut dets = vec![tracked(1, 45.0, 0.9)];
            vc.evaluate(&(), &mut dets, &mut rec, i as f64 * 0.1);
            assert!(dets[0].offender);
        }

        assert_eq!(rec.files.len(), 1);
        assert_eq!(rec.files[0].1, "offender-1-0.jpg");
    }

    #[test]
    fn rearms_after_cooldown() {
        let mut vc = capture_with_limit(30.0);
        let mut rec = Recorder::default();

        let mut dets = vec![tracked(1, 45.0, 0.9)];
        vc.evaluate(&(), &mut dets, &mut rec, 0.0);

        let mut dets = vec![tracked(1, 45.0, 0.9)];
        vc.evaluate(&(), &mut dets, &mut rec, 20.0);

        assert_eq!(rec.files.len(), 2);
    }

    #[test]
    fn single_capture_per_frame() {
        let mut vc = capture_with_limit(30.0);
        let mut rec = Recorder::default();

        let mut dets = vec![tracked(1, 45.0, 0.9), tracked(2, 50.0, 0.9)];
        assert_eq!(vc.evaluate(&(), &mut dets, &mut rec, 0.0), 1);
        assert!(dets.iter().all(|d| d.offender));

        let mut dets = vec![tracked(1, 45.0, 0.9), tracked(2, 50.0, 0.9)];
        assert_eq!(vc.evaluate(&(), &mut dets, &mut rec, 0.1), 1);

        let ids: Vec<u32> = rec.files.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn low_confidence_or_slow_is_ignored() {
        let mut vc = capture_with_limit(30.0);
        let mut rec = Recorder::default();

        let mut dets = vec![tracked(1, 45.0, 0.5), tracked(2, 25.0, 0.9)];
        assert_eq!(vc.evaluate(&(), &mut dets, &mut rec, 0.0), 0);
        assert!(vc.is_empty());
    }

    #[test]
    fn limit_changes_between_frames() {
        let mut vc = capture_with_limit(70.0);
        let mut rec = Recorder::default();

        let mut dets = vec![tracked(1, 45.0, 0.9)];
        vc.evaluate(&(), &mut dets, &mut rec, 0.0);
        assert!(rec.files.is_empty());

        vc.set_speed_limit(Some(SpeedLimit::Residential.mph()));
        let mut dets = vec![tracked(1, 45.0, 0.9)];
        vc.evaluate(&(), &mut dets, &mut rec, 0.1);
        assert_eq!(rec.files.len(), 1);
    }

    #[test]
    fn writer_failure_is_not_fatal() {
        let mut vc = capture_with_limit(30.0);
        let mut rec = Recorder {
            fail: true,
            ..Recorder::default()
        };

        let mut dets = vec![tracked(1, 45.0, 0.9)];
        assert_eq!(vc.evaluate(&(), &mut dets, &mut rec, 0.0), 1);
        assert!(vc.record(1).unwrap().already_captured);
    }

    #[test]
    fn presets() {
        assert_eq!(SpeedLimit::Motorway.mph(), 70.0);
        assert_eq!(SpeedLimit::SchoolZone.to_string(), "School Zone - 20mph");
        assert_eq!(SpeedLimit::ALL.len(), 4);
    }
}
