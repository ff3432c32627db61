//! Time base shared by the engine and every timer.
//!
//! A clock tracks the current and delta time, a frame rate that throttles how
//! often ticks are accepted, and a playback rate that scales elapsed time.

use crate::math::{K, MIN_VALUE};

/// How a render pass was requested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickMode {
    /// Less than one frame elapsed; timing state advances but nothing is forced
    Skip,
    /// Regular frame tick
    Auto,
    /// Render unconditionally (seeks, resets, zero-length timers)
    Force,
}

/// Time bookkeeping embedded in the engine and in each timer.
///
/// All times are in milliseconds.
#[derive(Clone, Debug)]
pub struct Clock {
    /// Current time; for a timer this is its local time minus its delay.
    pub(crate) current_time: f64,
    /// Time between the last two accepted ticks.
    pub(crate) delta_time: f64,
    /// Last time handed to [`Clock::request_tick`].
    pub(crate) elapsed_time: f64,
    /// Reference time local time is measured from.
    pub(crate) start_time: f64,
    pub(crate) last_time: f64,
    scheduled_time: f64,
    frame_duration: f64,
    fps: f64,
    speed: f64,
}

impl Clock {
    /// Create a clock whose times all start at `init_time`
    pub fn new(init_time: f64, fps: f64) -> Self {
        let mut clock = Self {
            current_time: init_time,
            delta_time: 0.0,
            elapsed_time: init_time,
            start_time: init_time,
            last_time: init_time,
            scheduled_time: 0.0,
            frame_duration: 0.0,
            fps: 0.0,
            speed: 1.0,
        };
        clock.fps = if fps < MIN_VALUE || fps.is_nan() {
            MIN_VALUE
        } else {
            fps
        };
        clock.frame_duration = K / clock.fps;
        clock
    }

    pub fn frame_rate(&self) -> f64 {
        self.fps
    }

    /// Duration of one frame, always > 0 for finite frame rates
    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    /// Change the frame rate, shifting the next scheduled tick so the phase is kept
    pub fn set_frame_rate(&mut self, fps: f64) {
        let previous = self.frame_duration;
        let fps = if fps < MIN_VALUE || fps.is_nan() {
            MIN_VALUE
        } else {
            fps
        };
        let frame_duration = K / fps;
        self.fps = fps;
        self.frame_duration = frame_duration;
        self.scheduled_time += frame_duration - previous;
    }

    pub fn playback_rate(&self) -> f64 {
        self.speed
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.speed = if rate < MIN_VALUE || rate.is_nan() {
            MIN_VALUE
        } else {
            rate
        };
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Decide whether a tick at `time` should proceed.
    ///
    /// Returns [`TickMode::Skip`] until a full frame duration has accumulated.
    /// After a stall the schedule jumps to the first frame boundary past
    /// `time`, so the frame that follows is still throttled.
    pub fn request_tick(&mut self, time: f64) -> TickMode {
        self.elapsed_time = time;
        if time < self.scheduled_time {
            return TickMode::Skip;
        }
        let frames_late = ((time - self.scheduled_time) / self.frame_duration).floor();
        self.scheduled_time += (frames_late + 1.0) * self.frame_duration;
        TickMode::Auto
    }

    /// Record `time` as the last tick and return the delta since the previous one
    pub fn compute_delta_time(&mut self, time: f64) -> f64 {
        let delta = time - self.last_time;
        self.delta_time = delta;
        self.last_time = time;
        delta
    }

    /// Forget the tick schedule so the next request proceeds
    pub(crate) fn reset_schedule(&mut self, time: f64) {
        self.scheduled_time = time;
        self.elapsed_time = time;
        self.last_time = time;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(0.0, 120.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration_from_rate() {
        let clock = Clock::new(0.0, 120.0);
        assert_eq!(clock.frame_duration(), 1000.0 / 120.0);
        let clock = Clock::new(0.0, 60.0);
        assert_eq!(clock.frame_duration(), 1000.0 / 60.0);
    }

    #[test]
    fn test_high_frame_rate_keeps_positive_duration() {
        let mut clock = Clock::new(0.0, 3000.0);
        assert!((clock.frame_duration() - 1000.0 / 3000.0).abs() < 1e-12);
        assert!(clock.frame_duration() > 0.0);
        assert_eq!(clock.request_tick(0.0), TickMode::Auto);
        assert_eq!(clock.request_tick(0.2), TickMode::Skip);
        assert_eq!(clock.request_tick(0.4), TickMode::Auto);

        clock.set_frame_rate(1e6);
        assert!(clock.frame_duration() > 0.0);
    }

    #[test]
    fn test_request_tick_skips_partial_frames() {
        let mut clock = Clock::new(0.0, 60.0);
        assert_eq!(clock.request_tick(0.0), TickMode::Auto);
        assert_eq!(clock.request_tick(5.0), TickMode::Skip);
        assert_eq!(clock.request_tick(16.0), TickMode::Skip);
        assert_eq!(clock.request_tick(17.0), TickMode::Auto);
    }

    #[test]
    fn test_request_tick_catches_up() {
        let mut clock = Clock::new(0.0, 60.0);
        assert_eq!(clock.request_tick(0.0), TickMode::Auto);
        // After a stall the next boundary is 30 frames in (516.67), not 505
        assert_eq!(clock.request_tick(505.0), TickMode::Auto);
        assert_eq!(clock.request_tick(510.0), TickMode::Skip);
        assert_eq!(clock.request_tick(516.0), TickMode::Skip);
        assert_eq!(clock.request_tick(517.0), TickMode::Auto);
        assert_eq!(clock.request_tick(520.0), TickMode::Skip);
    }

    #[test]
    fn test_frame_rate_change_keeps_phase() {
        let mut clock = Clock::new(0.0, 60.0);
        clock.request_tick(0.0);
        // next tick scheduled at 16.67; switching to 30fps moves it to 33.33
        clock.set_frame_rate(30.0);
        assert_eq!(clock.request_tick(20.0), TickMode::Skip);
        assert_eq!(clock.request_tick(33.0), TickMode::Skip);
        assert_eq!(clock.request_tick(34.0), TickMode::Auto);
    }

    #[test]
    fn test_rates_are_clamped() {
        let mut clock = Clock::default();
        clock.set_playback_rate(-2.0);
        assert_eq!(clock.playback_rate(), MIN_VALUE);
        clock.set_frame_rate(0.0);
        assert_eq!(clock.frame_rate(), MIN_VALUE);
        assert!(clock.frame_duration() > 0.0);
    }

    #[test]
    fn test_delta_time() {
        let mut clock = Clock::default();
        assert_eq!(clock.compute_delta_time(16.0), 16.0);
        assert_eq!(clock.compute_delta_time(40.0), 24.0);
        assert_eq!(clock.delta_time(), 24.0);
    }
}
