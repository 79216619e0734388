//! Frame pacing.
//!
//! Holds a real-time run to the configured tick rate and keeps a rolling
//! average of frame times for the end-of-run report.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum samples kept for averaging.
const MAX_SAMPLES: usize = 120;

/// Frame pacing for real-time runs.
#[derive(Debug)]
pub struct FrameTiming {
    /// Target ticks per second
    tick_rate: u32,
    /// Time budget per frame
    frame_budget: Duration,
    /// Start of the current frame
    frame_start: Instant,
    /// Recent frame times in seconds
    frame_times: VecDeque<f32>,
    /// Frames begun since creation or reset
    frames: u64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameTiming {
    /// Create a pacer for `tick_rate` frames per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(tick_rate)),
            frame_start: Instant::now(),
            frame_times: VecDeque::with_capacity(MAX_SAMPLES),
            frames: 0,
        }
    }

    /// Marks the start of a frame and records the length of the previous one.
    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        if self.frames > 0 {
            self.frame_times
                .push_back((now - self.frame_start).as_secs_f32());
            if self.frame_times.len() > MAX_SAMPLES {
                self.frame_times.pop_front();
            }
        }
        self.frame_start = now;
        self.frames += 1;
    }

    /// Sleep for the remainder of the frame budget.
    pub fn sleep_remainder(&self) {
        let elapsed = self.frame_start.elapsed();
        if elapsed < self.frame_budget {
            let sleep_time = self.frame_budget - elapsed;
            if sleep_time > Duration::from_millis(1) {
                std::thread::sleep(sleep_time - Duration::from_millis(1));
            }
            while self.frame_start.elapsed() < self.frame_budget {
                std::hint::spin_loop();
            }
        }
    }

    /// Average ticks per second over recent frames.
    #[must_use]
    pub fn current_fps(&self) -> f32 {
        let avg = self.average_frame_time_ms();
        if avg > 0.0 {
            1000.0 / avg
        } else {
            0.0
        }
    }

    /// Average frame time in milliseconds.
    #[must_use]
    pub fn average_frame_time_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        (self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32) * 1000.0
    }

    /// Frames begun so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Target ticks per second.
    #[must_use]
    pub const fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Reset timing (call after a pause).
    pub fn reset(&mut self) {
        self.frame_start = Instant::now();
        self.frame_times.clear();
        self.frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timing_creation() {
        let timing = FrameTiming::new(0);
        assert_eq!(timing.tick_rate(), 1);
        assert_eq!(timing.frames(), 0);
        assert_eq!(timing.current_fps(), 0.0);
    }

    #[test]
    fn test_first_frame_records_nothing() {
        let mut timing = FrameTiming::new(60);
        timing.begin_frame();
        assert_eq!(timing.frames(), 1);
        assert_eq!(timing.average_frame_time_ms(), 0.0);
    }

    #[test]
    fn test_sleep_holds_frame_budget() {
        let mut timing = FrameTiming::new(100);
        timing.begin_frame();
        timing.sleep_remainder();
        timing.begin_frame();

        // 10 ms budget per frame
        assert!(timing.average_frame_time_ms() >= 9.5);
        assert!(timing.current_fps() <= 105.0);
    }

    #[test]
    fn test_reset_timing() {
        let mut timing = FrameTiming::new(60);
        timing.begin_frame();
        timing.begin_frame();
        timing.reset();
        assert_eq!(timing.frames(), 0);
        assert_eq!(timing.average_frame_time_ms(), 0.0);
    }
}
