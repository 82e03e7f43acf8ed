//! Capture buffers: the bounded live-display window and the unbounded
//! full-resolution accumulator.
//!
//! Both are owned exclusively by the session controller and are only ever
//! handed out as snapshots, so readers never observe a half-applied chunk.

use std::collections::VecDeque;

/// Bounded FIFO window of converted pressure values for the live chart.
///
/// Capacity is `sample_rate * window_secs`; appending beyond it evicts the
/// oldest values. At any instant the content equals the most recent
/// `capacity` values appended, in arrival order.
#[derive(Debug)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    /// Creates a window sized for `window_secs` of audio at `sample_rate` Hz.
    /// Capacity is at least 1 so a degenerate config cannot make the window
    /// swallow everything.
    pub fn for_duration(sample_rate: u32, window_secs: f64) -> Self {
        let capacity = ((sample_rate as f64 * window_secs) as usize).max(1);
        Self::with_capacity(capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.min(1 << 20)),
            capacity: capacity.max(1),
        }
    }

    /// Appends values in order, evicting from the front past capacity.
    pub fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        for value in values {
            if self.values.len() == self.capacity {
                self.values.pop_front();
            }
            self.values.push_back(value);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies the window content, oldest first, for rendering.
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Unbounded accumulator of raw int16 samples for one capture session.
///
/// This is the source of truth for the persisted artifact; the sliding
/// window is display-only.
#[derive(Debug, Default)]
pub struct Accumulator {
    samples: Vec<i16>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend_from_slice(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_capacity_from_rate_and_duration() {
        let window = SlidingWindow::for_duration(20000, 1.0);
        assert_eq!(window.capacity(), 20000);
        let half = SlidingWindow::for_duration(16000, 0.5);
        assert_eq!(half.capacity(), 8000);
    }

    #[test]
    fn test_fifo_eviction_keeps_last_cap_in_order() {
        let cap = 8;
        let extra = 5;
        let mut window = SlidingWindow::with_capacity(cap);
        for i in 0..(cap + extra) {
            window.extend([i as f64]);
        }
        let expected: Vec<f64> = (extra..cap + extra).map(|i| i as f64).collect();
        assert_eq!(window.snapshot(), expected);
        assert_eq!(window.len(), cap);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = SlidingWindow::with_capacity(100);
        window.extend((0..1000).map(|i| i as f64));
        assert_eq!(window.len(), 100);
        assert_eq!(window.snapshot()[0], 900.0);
    }

    #[test]
    fn test_chunk_larger_than_capacity() {
        let mut window = SlidingWindow::with_capacity(3);
        window.extend([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.snapshot(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_accumulator_grows_unbounded_next_to_window() {
        let mut window = SlidingWindow::with_capacity(10);
        let mut accumulator = Accumulator::new();
        let session: Vec<i16> = (0..50).collect();
        for chunk in session.chunks(7) {
            accumulator.extend_from_slice(chunk);
            window.extend(chunk.iter().map(|&s| s as f64));
        }
        assert_eq!(accumulator.len(), 50);
        assert_eq!(window.len(), 10);
        assert_eq!(accumulator.samples(), session.as_slice());
    }

    #[test]
    fn test_clear_resets_both_buffers() {
        let mut window = SlidingWindow::with_capacity(4);
        let mut accumulator = Accumulator::new();
        window.extend([1.0, 2.0]);
        accumulator.extend_from_slice(&[1, 2]);
        window.clear();
        accumulator.clear();
        assert!(window.is_empty());
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_single_sample_eviction_boundary() {
        // 20001 samples into a 20000-capacity window: exactly the first
        // sample is evicted.
        let cap = 20000;
        let mut window = SlidingWindow::with_capacity(cap);
        window.extend((0..=cap).map(|i| i as f64));
        let snapshot = window.snapshot();
        assert_eq!(snapshot.len(), cap);
        assert_eq!(snapshot[0], 1.0);
        assert_eq!(snapshot[cap - 1], cap as f64);
    }
}
