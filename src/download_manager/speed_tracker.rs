// model-linker/src/download_manager/speed_tracker.rs

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const WINDOW_SIZE: usize = 5;
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Mean of the last few throughput samples; one sample per interval.
#[derive(Debug, Clone)]
pub struct SpeedTracker {
    samples: VecDeque<f64>,
    last_sample_at: Instant,
    bytes_since_sample: u64,
}

impl SpeedTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_SIZE),
            last_sample_at: now,
            bytes_since_sample: 0,
        }
    }

    /// Accounts for a received chunk. Returns the new smoothed speed when a
    /// sample was taken, `None` when the interval has not elapsed yet.
    pub fn record(&mut self, bytes: u64, now: Instant) -> Option<f64> {
        self.bytes_since_sample += bytes;
        let elapsed = now.saturating_duration_since(self.last_sample_at);
        if elapsed < SAMPLE_INTERVAL {
            return None;
        }

        let instant_speed = self.bytes_since_sample as f64 / elapsed.as_secs_f64();
        if self.samples.len() == WINDOW_SIZE {
            self.samples.pop_front();
        }
        self.samples.push_back(instant_speed);
        self.last_sample_at = now;
        self.bytes_since_sample = 0;
        Some(self.current())
    }

    pub fn current(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_only_after_interval() {
        let start = Instant::now();
        let mut tracker = SpeedTracker::new(start);
        assert_eq!(tracker.record(1000, start + Duration::from_millis(100)), None);
        // 1000 + 1000 bytes over 0.5 s
        let speed = tracker.record(1000, start + Duration::from_millis(500)).unwrap();
        assert!((speed - 4000.0).abs() < 1e-6);
    }

    #[test]
    fn window_keeps_last_five_samples() {
        let start = Instant::now();
        let mut tracker = SpeedTracker::new(start);
        let mut at = start;
        for bytes in [100u64, 100, 100, 100, 100, 600] {
            at += Duration::from_secs(1);
            tracker.record(bytes, at);
        }
        // (100 * 4 + 600) / 5
        assert!((tracker.current() - 200.0).abs() < 1e-6);
        assert!(tracker.current() >= 0.0);
    }
}
