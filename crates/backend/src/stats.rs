use std::time::{Duration, Instant};

use tracing::debug;

/// Rolling frame-rate estimate for the presentation/capture loop.
///
/// Timestamps are passed in rather than sampled so the arithmetic is
/// testable; the loop hands in `Instant::now()`.
pub struct LoopStats {
    frame_count: u64,
    window_start: Instant,
    frames_in_window: u32,
    frames_per_second: f32,
}

impl LoopStats {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start: now,
            frames_in_window: 0,
            frames_per_second: 0.0,
        }
    }

    /// Records one presented/published frame and folds the rolling
    /// window once a second.
    pub fn record_frame(&mut self, now: Instant) {
        self.frame_count += 1;
        self.frames_in_window += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.frames_per_second = self.frames_in_window as f32 / elapsed.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = now;
            debug!(
                fps = self.frames_per_second.round(),
                frame_count = self.frame_count,
                "loop stats"
            );
        }
    }

    /// Frames recorded since the loop started.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Most recent one-second estimate; 0.0 until the first window
    /// completes.
    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_accumulates_across_windows() {
        let start = Instant::now();
        let mut stats = LoopStats::new(start);
        for i in 0..5 {
            stats.record_frame(start + Duration::from_millis(100 * i));
        }
        assert_eq!(stats.frame_count(), 5);
        assert_eq!(stats.frames_per_second(), 0.0);
    }

    #[test]
    fn fps_folds_once_the_window_elapses() {
        let start = Instant::now();
        let mut stats = LoopStats::new(start);
        for i in 1..=60 {
            stats.record_frame(start + Duration::from_millis(i * 1000 / 60));
        }
        let fps = stats.frames_per_second();
        assert!((fps - 60.0).abs() < 2.0, "estimate was {fps}");
    }
}
