use log::{debug, trace};
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bbox;
use crate::detection::TrackedDetection;
use crate::rolling_median::RollingMedian;
use crate::Timestamp;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    #[default]
    Mph,
    Kmh,
}

impl SpeedUnit {
    /// Multiplier from meters per second.
    #[inline]
    pub fn factor(self) -> f32 {
        match self {
            SpeedUnit::Mph => 2.23,
            SpeedUnit::Kmh => 3.6,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeedConfig {
    /// Weight of the previous ppm estimate in the exponential blend.
    pub ppm_smoothing: f32,
    /// Displacements below this many pixels count as standing still.
    pub min_displacement_px: f32,
    pub window: usize,
    pub ttl: Timestamp,
    pub unit: SpeedUnit,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            ppm_smoothing: 0.7,
            min_displacement_px: 2.0,
            window: 5,
            ttl: 10.0,
            unit: SpeedUnit::Mph,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeedRecord {
    pub ppm: f32,
    pub pos: na::Point2<f32>,
    pub updated_at: Timestamp,
    samples: RollingMedian,
}

impl SpeedRecord {
    #[inline]
    pub fn speed(&self) -> Option<f32> {
        self.samples.median()
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

/// Converts track motion in pixels into real-world speed.
#[derive(Debug, Default)]
pub struct SpeedEstimator {
    config: SpeedConfig,
    records: HashMap<u32, SpeedRecord>,
}

impl SpeedEstimator {
    pub fn new(config: SpeedConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &SpeedConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut SpeedConfig {
        &mut self.config
    }

    #[inline]
    pub fn record(&self, id: u32) -> Option<&SpeedRecord> {
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

    pub fn apply(&mut self, detections: &mut [TrackedDetection], now: Timestamp) {
        for det in detections.iter_mut() {
            det.speed = self.estimate(det, now);
        }

        self.prune(now);
    }

    fn estimate(&mut self, det: &TrackedDetection, now: Timestamp) -> Option<f32> {
        let id = det.track_id;
        let pos = det.center();
        let current_ppm = det.detection.pixels_per_meter().filter(|p| p.is_finite());
        let ttl = self.config.ttl;

        if self
            .records
            .get(&id)
            .is_some_and(|r| now - r.updated_at > ttl)
        {
            self.records.remove(&id);
        }

        if !self.records.contains_key(&id) {
            match current_ppm {
                Some(ppm) if ppm > 0.0 => {
                    self.records.insert(
                        id,
                        SpeedRecord {
                            ppm,
                            pos,
                            updated_at: now,
                            samples: RollingMedian::new(self.config.window),
                        },
                    );
                }
                _ => trace!("track {}: no usable ppm, speed record not started", id),
            }

            return None;
        }

        let record = self.records.get_mut(&id)?;
        let elapsed = now - record.updated_at;
        if elapsed <= 0.0 {
            trace!("track {}: non-positive elapsed time {}, skipped", id, elapsed);
            return record.speed();
        }

        let ppm = match current_ppm {
            Some(current) if current > 0.0 => {
                let alpha = self.config.ppm_smoothing;
                alpha * record.ppm + (1.0 - alpha) * current
            }
            _ => {
                trace!("track {}: degenerate ppm, skipped", id);
                return record.speed();
            }
        };

        if !(ppm.is_finite() && ppm > 0.0) {
            trace!("track {}: degenerate ppm {}, skipped", id, ppm);
            return record.speed();
        }

        let dist = bbox::distance(&record.pos, &pos);
        let sample = if dist >= self.config.min_displacement_px {
            dist / ppm / elapsed as f32 * self.config.unit.factor()
        } else {
            0.0
        };

        record.ppm = ppm;
        record.pos = pos;
        record.updated_at = now;
        record.samples.push(sample);

        record.speed()
    }

    /// Drops records not updated within the TTL.
    pub fn prune(&mut self, now: Timestamp) {
        let ttl = self.config.ttl;

        self.records.retain(|id, r| {
            let keep = now - r.updated_at <= ttl;
            if !keep {
                debug!("speed record {} pruned", id);
            }

            keep
        });
    }
}
