use nalgebra as na;

use crate::circular_queue::CircularQueue;
use crate::detection::{Detection, TrackedDetection};
use crate::Timestamp;

#[derive(Debug, Clone)]
pub struct Track {
    pub id: u32,
    pub class: String,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,

    // last matched center, in px
    pub pos: na::Point2<f32>,

    history: CircularQueue<na::Point2<f32>>,
    displacements: CircularQueue<na::Vector2<f32>>,
}

impl Track {
    pub fn new(
        id: u32,
        class: &str,
        pos: na::Point2<f32>,
        ts: Timestamp,
        history_capacity: usize,
        velocity_window: usize,
    ) -> Self {
        let mut history = CircularQueue::with_capacity(history_capacity);
        history.push(pos);

        Self {
            id,
            class: class.to_string(),
            first_seen: ts,
            last_seen: ts,
            pos,
            history,
            displacements: CircularQueue::with_capacity(velocity_window),
        }
    }

    pub fn update(&mut self, pos: na::Point2<f32>, ts: Timestamp) {
        self.displacements.push(pos - self.pos);
        self.history.push(pos);
        self.pos = pos;
        self.last_seen = ts;
    }

    /// Mean displacement per matched frame over the velocity window.
    pub fn velocity(&self) -> na::Vector2<f32> {
        if self.displacements.is_empty() {
            return na::Vector2::zeros();
        }

        let sum = self
            .displacements
            .iter()
            .fold(na::Vector2::zeros(), |acc, d| acc + d);

        sum / self.displacements.len() as f32
    }

    #[inline]
    pub fn history(&self) -> impl Iterator<Item = &na::Point2<f32>> {
        self.history.iter()
    }

    #[inline]
    pub fn is_expired(&self, now: Timestamp, ttl: Timestamp) -> bool {
        now - self.last_seen > ttl
    }

    pub(crate) fn annotate(&self, detection: &Detection) -> TrackedDetection {
        TrackedDetection {
            detection: detection.clone(),
            track_id: self.id,
            first_seen: self.first_seen,
            history: self.history().copied().collect(),
            velocity: self.velocity(),
            speed: None,
            plate: None,
            offender: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn history_is_bounded_and_ordered() {
        let mut t = Track::new(1, "car", na::Point2::new(0.0, 0.0), 0.0, 3, 10);
        for i in 1..5 {
            t.update(na::Point2::new(i as f32, 0.0), i as f64);
        }

        let xs: Vec<f32> = t.history().map(|p| p.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(t.last_seen, 4.0);
        assert_eq!(t.first_seen, 0.0);
    }

    #[test]
    fn velocity_is_mean_displacement() {
        let mut t = Track::new(1, "car", na::Point2::new(0.0, 0.0), 0.0, 25, 2);
        assert_eq!(t.velocity(), na::Vector2::zeros());

        t.update(na::Point2::new(10.0, 0.0), 0.1);
        t.update(na::Point2::new(30.0, 4.0), 0.2);
        t.update(na::Point2::new(60.0, 4.0), 0.3);

        let v = t.velocity();
        assert_abs_diff_eq!(v.x, 25.0);
        assert_abs_diff_eq!(v.y, 2.0);
    }
}
