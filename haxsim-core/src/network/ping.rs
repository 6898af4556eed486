//! Ping Estimation
//!
//! Rolling round-trip samples with exponentially decaying weights. The
//! estimate is the weighted median, which ignores short spikes.

use std::collections::VecDeque;

/// Weighted rolling round-trip estimator.
#[derive(Clone, Debug)]
pub struct PingEstimator {
    samples: VecDeque<(f64, f64)>,
    capacity: usize,
    decay: f64,
}

impl PingEstimator {
    /// Create an estimator keeping `capacity` samples, multiplying older
    /// weights by `decay` on every new sample.
    pub fn new(capacity: usize, decay: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            decay,
        }
    }

    /// Record a round-trip time in milliseconds.
    pub fn add(&mut self, rtt_ms: f64) {
        if !rtt_ms.is_finite() || rtt_ms < 0.0 {
            return;
        }
        for (_, weight) in &mut self.samples {
            *weight *= self.decay;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((rtt_ms, 1.0));
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Weighted median round trip in milliseconds.
    pub fn estimate(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<(f64, f64)> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let half = sorted.iter().map(|(_, w)| w).sum::<f64>() / 2.0;
        let mut acc = 0.0;
        for (value, weight) in &sorted {
            acc += weight;
            if acc >= half {
                return Some(*value);
            }
        }
        sorted.last().map(|(v, _)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_ignores_spike() {
        let mut p = PingEstimator::new(32, 0.97);
        for _ in 0..9 {
            p.add(50.0);
        }
        p.add(900.0);
        assert_eq!(p.estimate(), Some(50.0));
    }

    #[test]
    fn test_recent_samples_weigh_more() {
        let mut p = PingEstimator::new(32, 0.5);
        for _ in 0..3 {
            p.add(200.0);
        }
        for _ in 0..2 {
            p.add(40.0);
        }
        // Recent weights 1 + 0.5 outweigh 0.25 + 0.125 + 0.0625.
        assert_eq!(p.estimate(), Some(40.0));
    }

    #[test]
    fn test_capacity_bound() {
        let mut p = PingEstimator::new(4, 0.97);
        for i in 0..10 {
            p.add(i as f64);
        }
        assert_eq!(p.len(), 4);
        assert!(PingEstimator::new(4, 0.97).estimate().is_none());
    }
}
