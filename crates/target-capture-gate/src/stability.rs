use std::collections::VecDeque;

/// Rolling window of camera-to-target distances.
///
/// The camera counts as still once the window is full and no two
/// consecutive samples differ by more than `max_delta`. A single larger
/// jump wipes the whole window, so stillness has to be re-earned over a
/// full window of new samples.
#[derive(Clone, Debug)]
pub struct StabilityWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    max_delta: f64,
}

impl StabilityWindow {
    pub fn new(capacity: usize, max_delta: f64) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            max_delta,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Largest absolute difference between consecutive samples.
    pub fn max_consecutive_delta(&self) -> Option<f64> {
        self.samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .reduce(f64::max)
    }

    /// Append a distance sample and report whether the camera is still.
    pub fn push(&mut self, distance: f64) -> bool {
        self.samples.push_back(distance);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        if self.samples.len() < self.capacity {
            return false;
        }

        match self.max_consecutive_delta() {
            Some(delta) if delta <= self.max_delta => true,
            _ => {
                log::debug!("camera shake detected, resetting {} samples", self.samples.len());
                self.samples.clear();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_after_full_window_of_small_deltas() {
        let mut w = StabilityWindow::new(20, 0.01);
        for i in 0..19 {
            assert!(!w.push(1.0 + i as f64 * 0.001), "sample {i}");
        }
        assert!(w.push(1.019));
        // stays still while samples remain steady, window stays bounded
        for _ in 0..50 {
            assert!(w.push(1.019));
        }
        assert_eq!(w.len(), 20);
    }

    #[test]
    fn delta_equal_to_threshold_is_still() {
        let mut w = StabilityWindow::new(4, 0.5);
        let results: Vec<bool> = [0.0, 0.5, 1.0, 1.5].into_iter().map(|d| w.push(d)).collect();
        assert_eq!(results, [false, false, false, true]);
    }

    #[test]
    fn single_jolt_clears_and_requires_full_window() {
        let mut w = StabilityWindow::new(20, 0.01);
        for _ in 0..25 {
            w.push(2.0);
        }
        assert!(!w.push(2.5));
        assert!(w.is_empty());
        for i in 0..19 {
            assert!(!w.push(2.5), "sample {i} after jolt");
        }
        assert!(w.push(2.5));
    }

    #[test]
    fn jolt_anywhere_in_window_is_caught() {
        let mut w = StabilityWindow::new(5, 0.1);
        // the jump sits between the first two samples once the window fills
        for d in [0.0, 1.0, 1.0, 1.0] {
            assert!(!w.push(d));
        }
        assert!(!w.push(1.0));
        assert!(w.is_empty());
    }

    #[test]
    fn clear_resets_progress() {
        let mut w = StabilityWindow::new(3, 0.1);
        w.push(1.0);
        w.push(1.0);
        w.clear();
        assert!(!w.push(1.0));
        assert!(!w.push(1.0));
        assert!(w.push(1.0));
    }
}
