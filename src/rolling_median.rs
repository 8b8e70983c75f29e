use crate::circular_queue::CircularQueue;

/// Median over the last `window` samples.
#[derive(Debug, Clone)]
pub struct RollingMedian {
    samples: CircularQueue<f32>,
}

impl RollingMedian {
    pub fn new(window: usize) -> Self {
        Self {
            samples: CircularQueue::with_capacity(window),
        }
    }

    #[inline]
    pub fn push(&mut self, value: f32) {
        self.samples.push(value);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn median(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(f32::total_cmp);

        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}
