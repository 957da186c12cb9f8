use std::time::{Duration, Instant};

/// Throughput over fixed windows: bytes are accumulated until the window
/// elapses, then published as bytes per second and the window restarts.
pub(super) struct SpeedSampler {
    interval: Duration,
    window_start: Instant,
    bytes: u64,
}

impl SpeedSampler {
    pub(super) fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            bytes: 0,
        }
    }

    pub(super) fn record(&mut self, n: usize) -> Option<u64> {
        self.record_at(n, Instant::now())
    }

    fn record_at(&mut self, n: usize, now: Instant) -> Option<u64> {
        self.bytes += n as u64;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }
        let rate = (self.bytes as f64 / elapsed.as_secs_f64()) as u64;
        self.window_start = now;
        self.bytes = 0;
        Some(rate)
    }
}
