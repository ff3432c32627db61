//! Spring-derived easing
//!
//! A damped harmonic oscillator solved analytically. The spring is sampled
//! once at construction to find how long it takes to settle; that settling
//! duration replaces the duration of any tween eased with it.

use crate::math::{clamp, round_to, K, MIN_VALUE};

const MAX_PARAM: f64 = K * 10.0;
/// Solver step in seconds
const TIME_STEP: f64 = 0.02;
const REST_THRESHOLD: f64 = 0.0005;
/// Consecutive resting samples (200ms) before the spring counts as settled
const MAX_REST_STEPS: u32 = 10;
/// Hard cap of one minute of solver steps
const MAX_ITERATIONS: u32 = 3000;

/// Physical spring parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConfig {
    pub mass: f64,
    pub stiffness: f64,
    pub damping: f64,
    pub velocity: f64,
}

impl SpringConfig {
    pub fn new(mass: f64, stiffness: f64, damping: f64, velocity: f64) -> Self {
        Self {
            mass,
            stiffness,
            damping,
            velocity,
        }
    }

    /// Snappy, barely overshooting
    pub fn stiff() -> Self {
        Self::new(1.0, 400.0, 30.0, 0.0)
    }

    /// Slow and soft
    pub fn gentle() -> Self {
        Self::new(1.0, 120.0, 14.0, 0.0)
    }

    /// Visible oscillation
    pub fn wobbly() -> Self {
        Self::new(1.0, 180.0, 12.0, 0.0)
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::new(1.0, 100.0, 10.0, 0.0)
    }
}

/// A solved spring usable as an easing curve
#[derive(Clone, Debug, PartialEq)]
pub struct Spring {
    config: SpringConfig,
    w0: f64,
    zeta: f64,
    wd: f64,
    b: f64,
    solver_duration: f64,
    settling_duration: f64,
}

impl Spring {
    pub fn new(config: SpringConfig) -> Self {
        let config = SpringConfig {
            mass: clamp(config.mass, 0.0, MAX_PARAM),
            stiffness: clamp(config.stiffness, 1.0, MAX_PARAM),
            damping: clamp(config.damping, 0.1, MAX_PARAM),
            velocity: clamp(config.velocity, -MAX_PARAM, MAX_PARAM),
        };
        let SpringConfig {
            mass: m,
            stiffness: s,
            damping: d,
            velocity: v,
        } = config;

        let w0 = clamp((s / m).sqrt(), MIN_VALUE, K);
        let zeta = d / (2.0 * (s * m).sqrt());
        let wd = if zeta < 1.0 {
            w0 * (1.0 - zeta * zeta).sqrt()
        } else {
            0.0
        };
        let b = if zeta < 1.0 {
            (zeta * w0 - v) / wd
        } else {
            -v + w0
        };

        let mut spring = Self {
            config,
            w0,
            zeta,
            wd,
            b,
            solver_duration: 0.0,
            settling_duration: 0.0,
        };
        spring.settle();
        spring
    }

    fn settle(&mut self) {
        let mut solver_time = 0.0;
        let mut rest_steps = 0;
        let mut iterations = 0;
        while rest_steps < MAX_REST_STEPS && iterations < MAX_ITERATIONS {
            if (1.0 - self.solve(solver_time)).abs() < REST_THRESHOLD {
                rest_steps += 1;
            } else {
                rest_steps = 0;
            }
            self.solver_duration = solver_time;
            solver_time += TIME_STEP;
            iterations += 1;
        }
        self.settling_duration = round_to(self.solver_duration * K, 0);
    }

    /// Displacement-derived progress at `time` seconds
    fn solve(&self, time: f64) -> f64 {
        let t = if self.zeta < 1.0 {
            (-time * self.zeta * self.w0).exp()
                * ((self.wd * time).cos() + self.b * (self.wd * time).sin())
        } else {
            (1.0 + self.b * time) * (-time * self.w0).exp()
        };
        1.0 - t
    }

    /// Map normalized time to progress; may overshoot 1
    pub fn evaluate(&self, t: f64) -> f64 {
        if t == 0.0 || t == 1.0 {
            t
        } else {
            self.solve(t * self.solver_duration)
        }
    }

    /// Time in milliseconds until the spring rests
    pub fn settling_duration(&self) -> f64 {
        self.settling_duration
    }

    pub fn config(&self) -> SpringConfig {
        self.config
    }
}

impl Default for Spring {
    fn default() -> Self {
        Self::new(SpringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_exact() {
        let spring = Spring::default();
        assert_eq!(spring.evaluate(0.0), 0.0);
        assert_eq!(spring.evaluate(1.0), 1.0);
    }

    #[test]
    fn test_settling_duration_is_positive_and_bounded() {
        let spring = Spring::default();
        assert!(spring.settling_duration() > 0.0);
        assert!(spring.settling_duration() <= 60_000.0);
    }

    #[test]
    fn test_stiffer_springs_settle_faster() {
        let soft = Spring::new(SpringConfig::gentle());
        let stiff = Spring::new(SpringConfig::stiff());
        assert!(stiff.settling_duration() < soft.settling_duration());
    }

    #[test]
    fn test_underdamped_spring_overshoots() {
        let spring = Spring::new(SpringConfig::wobbly());
        let peak = (1..100)
            .map(|i| spring.evaluate(i as f64 / 100.0))
            .fold(f64::MIN, f64::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_parameters_are_clamped() {
        let spring = Spring::new(SpringConfig::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(spring.config().stiffness, 1.0);
        assert_eq!(spring.config().damping, 0.1);
    }
}
