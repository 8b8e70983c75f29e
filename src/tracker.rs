use log::debug;
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox;
use crate::detection::{Detection, TrackedDetection};
use crate::error::Error;
use crate::track::Track;
use crate::Timestamp;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Matching radius per pixel-per-meter of the incoming detection; the
    /// effective radius in px is `base_threshold * box_width / class_width`.
    pub base_threshold: f32,
    /// Seconds without a match before a track is dropped.
    pub deregistration_time: Timestamp,
    pub history_capacity: usize,
    pub velocity_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.65,
            deregistration_time: 10.0,
            history_capacity: 25,
            velocity_window: 10,
        }
    }
}

/// Assigns stable identities to detections across frames.
///
/// Matching is greedy in input order: every detection takes the nearest
/// still-unmatched track of the same class within its size-scaled radius,
/// otherwise it opens a new track.
#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut TrackerConfig {
        &mut self.config
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Drops every track. Identities handed out so far stay retired.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn update(
        &mut self,
        detections: &[Detection],
        now: Timestamp,
    ) -> Result<Vec<TrackedDetection>, Error> {
        let scales = detections
            .iter()
            .map(Self::scale)
            .collect::<Result<Vec<_>, _>>()?;

        let mut matched = vec![false; self.tracks.len()];
        let mut tracked = Vec::with_capacity(detections.len());

        for (det, scale) in detections.iter().zip(scales) {
            let center = det.center();
            let radius = self.config.base_threshold * scale;

            let idx = match self.nearest(&det.class, center, radius * radius, &matched, now) {
                Some(idx) => {
                    self.tracks[idx].update(center, now);
                    matched[idx] = true;
                    idx
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;

                    debug!("track {} registered ({}) at {:?}", id, det.class, center);

                    self.tracks.push(Track::new(
                        id,
                        &det.class,
                        center,
                        now,
                        self.config.history_capacity,
                        self.config.velocity_window,
                    ));
                    matched.push(true);
                    self.tracks.len() - 1
                }
            };

            tracked.push(self.tracks[idx].annotate(det));
        }

        self.evict(now);

        Ok(tracked)
    }

    /// Removes tracks not seen for longer than the deregistration time.
    pub fn evict(&mut self, now: Timestamp) {
        let ttl = self.config.deregistration_time;

        self.tracks.retain(|t| {
            let expired = t.is_expired(now, ttl);
            if expired {
                debug!("track {} deregistered after {:.2}s", t.id, now - t.last_seen);
            }

            !expired
        });
    }

    fn nearest(
        &self,
        class: &str,
        center: na::Point2<f32>,
        max_dist_sq: f32,
        matched: &[bool],
        now: Timestamp,
    ) -> Option<usize> {
        let ttl = self.config.deregistration_time;
        let mut best: Option<(usize, f32)> = None;

        for (idx, track) in self.tracks.iter().enumerate() {
            if matched[idx] || track.class != class || track.is_expired(now, ttl) {
                continue;
            }

            let dist_sq = bbox::distance_squared(&track.pos, &center);
            if dist_sq > max_dist_sq {
                continue;
            }

            if best.map_or(true, |(_, d)| dist_sq < d) {
                best = Some((idx, dist_sq));
            }
        }

        best.map(|(idx, _)| idx)
    }

    /// Box width in px per meter of class reference width.
    fn scale(det: &Detection) -> Result<f32, Error> {
        if !det.bbox.is_well_formed() {
            return Err(Error::MalformedDetection {
                class: det.class.clone(),
                bbox: *det.bbox.as_slice(),
            });
        }

        match det.dims {
            Some(dims) if dims.is_usable() => Ok(det.bbox.width() / dims.width),
            _ => Err(Error::MissingClassDimensions {
                class: det.class.clone(),
            }),
        }
    }
}
