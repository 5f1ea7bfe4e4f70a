//! Frame timing and FPS measurement.
//!
//! [`FrameTimer`] is ticked once per frame by the window loop. It keeps the
//! last frame's delta, the instantaneous FPS derived from it, and an
//! exponentially smoothed FPS that is readable on screen.

use std::time::Instant;

/// Weight of the newest sample in the smoothed FPS.
pub const FPS_SMOOTHING: f32 = 0.02;

/// Smoothed FPS before the first frame.
pub const INITIAL_FPS: f32 = 60.0;

/// Per-frame timing state.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimer {
    startup: Instant,
    last_frame: Instant,
    delta_ms: f32,
    fps: f32,
    smoothed_fps: f32,
    frame_count: u64,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            startup: now,
            last_frame: now,
            delta_ms: 0.0,
            fps: 0.0,
            smoothed_fps: INITIAL_FPS,
            frame_count: 0,
        }
    }

    /// Measure the time since the previous tick and return it in milliseconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt_ms = (now - self.last_frame).as_secs_f32() * 1000.0;
        self.last_frame = now;
        self.tick_with(dt_ms);
        dt_ms
    }

    /// Advance by an explicit frame time. Zero-length frames leave FPS alone.
    pub fn tick_with(&mut self, dt_ms: f32) {
        self.delta_ms = dt_ms;
        self.frame_count += 1;
        if dt_ms > 0.0 {
            self.fps = 1000.0 / dt_ms;
            self.smoothed_fps = self.fps * FPS_SMOOTHING + self.smoothed_fps * (1.0 - FPS_SMOOTHING);
        }
    }

    /// Duration of the previous frame in milliseconds.
    pub fn delta_ms(&self) -> f32 {
        self.delta_ms
    }

    /// FPS from the last frame alone.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn smoothed_fps(&self) -> f32 {
        self.smoothed_fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.startup.elapsed().as_secs_f32()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_sixty_smoothed() {
        let timer = FrameTimer::new();
        assert_eq!(timer.smoothed_fps(), 60.0);
        assert_eq!(timer.frame_count(), 0);
    }

    #[test]
    fn smoothing_moves_two_percent_toward_sample() {
        let mut timer = FrameTimer::new();
        timer.tick_with(10.0); // 100 fps
        assert!((timer.fps() - 100.0).abs() < 1e-3);
        assert!((timer.smoothed_fps() - 60.8).abs() < 1e-3, "{}", timer.smoothed_fps());
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn zero_delta_keeps_fps() {
        let mut timer = FrameTimer::new();
        timer.tick_with(20.0);
        timer.tick_with(0.0);
        assert_eq!(timer.fps(), 50.0);
        assert_eq!(timer.frame_count(), 2);
    }
}
