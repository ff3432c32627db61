//! Easing functions for animations
//!
//! Every easing maps normalized time `t ∈ [0, 1]` to progress. Curves that
//! overshoot (back, elastic, springs) may leave `[0, 1]` in between, but all of
//! them start at 0 and end at 1.
//!
//! Easings parse from and print to short names, which is also how they are
//! serialized in configuration files:
//!
//! ```rust
//! use cadence_animation::Easing;
//!
//! let ease: Easing = "inOutQuad".parse().unwrap();
//! assert_eq!(ease.evaluate(0.5), 0.5);
//! assert_eq!(ease.to_string(), "inOutQuad");
//!
//! let stepped: Easing = "steps(4)".parse().unwrap();
//! assert_eq!(stepped.evaluate(0.3), 0.25);
//! ```

use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::math::{clamp, MIN_VALUE};
use crate::spring::{Spring, SpringConfig};

/// Default exponent of the bare `in` / `out` power curves
const DEFAULT_POWER: f64 = 1.68;
const DEFAULT_OVERSHOOT: f64 = 1.70158;

/// Errors raised while parsing an easing name
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EasingParseError {
    #[error("unknown easing `{0}`")]
    Unknown(String),

    #[error("invalid arguments for easing `{name}`: {args}")]
    Arguments { name: String, args: String },
}

/// How a base "in" curve is applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EaseMode {
    #[default]
    In,
    Out,
    InOut,
    OutIn,
}

impl EaseMode {
    fn prefix(self) -> &'static str {
        match self {
            EaseMode::In => "in",
            EaseMode::Out => "out",
            EaseMode::InOut => "inOut",
            EaseMode::OutIn => "outIn",
        }
    }

    #[inline]
    fn apply(self, t: f64, ease_in: impl Fn(f64) -> f64) -> f64 {
        match self {
            EaseMode::In => ease_in(t),
            EaseMode::Out => 1.0 - ease_in(1.0 - t),
            EaseMode::InOut => {
                if t < 0.5 {
                    ease_in(t * 2.0) / 2.0
                } else {
                    1.0 - ease_in(t * -2.0 + 2.0) / 2.0
                }
            }
            EaseMode::OutIn => {
                if t < 0.5 {
                    (1.0 - ease_in(1.0 - t * 2.0)) / 2.0
                } else {
                    (ease_in(t * 2.0 - 1.0) + 1.0) / 2.0
                }
            }
        }
    }
}

/// Where the jumps of a stepped easing happen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StepPosition {
    /// Jump at the start of each interval
    Start,
    /// Jump at the end of each interval
    #[default]
    End,
    /// Jump at both ends
    Both,
    /// No jump at either end
    None,
}

impl StepPosition {
    fn name(self) -> &'static str {
        match self {
            StepPosition::Start => "start",
            StepPosition::End => "end",
            StepPosition::Both => "both",
            StepPosition::None => "none",
        }
    }
}

/// Easing function type
#[derive(Clone, Default)]
pub enum Easing {
    #[default]
    Linear,
    /// `t^power`
    Power { power: f64, mode: EaseMode },
    Sine(EaseMode),
    Circ(EaseMode),
    Expo(EaseMode),
    Bounce(EaseMode),
    Back { overshoot: f64, mode: EaseMode },
    Elastic {
        amplitude: f64,
        period: f64,
        mode: EaseMode,
    },
    Steps { count: u32, position: StepPosition },
    CubicBezier(f64, f64, f64, f64),
    /// `(x, y)` control points, x ascending from 0 to 1
    PiecewiseLinear(Vec<(f64, f64)>),
    Spring(Spring),
    Custom(Rc<dyn Fn(f64) -> f64>),
}

impl Easing {
    pub fn power(power: f64, mode: EaseMode) -> Self {
        Easing::Power { power, mode }
    }

    pub fn in_quad() -> Self {
        Self::power(2.0, EaseMode::In)
    }

    pub fn out_quad() -> Self {
        Self::power(2.0, EaseMode::Out)
    }

    pub fn in_out_quad() -> Self {
        Self::power(2.0, EaseMode::InOut)
    }

    pub fn in_cubic() -> Self {
        Self::power(3.0, EaseMode::In)
    }

    pub fn out_cubic() -> Self {
        Self::power(3.0, EaseMode::Out)
    }

    pub fn in_out_cubic() -> Self {
        Self::power(3.0, EaseMode::InOut)
    }

    pub fn steps(count: u32) -> Self {
        Easing::Steps {
            count,
            position: StepPosition::End,
        }
    }

    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Easing::CubicBezier(x1, y1, x2, y2)
    }

    pub fn spring(config: SpringConfig) -> Self {
        Easing::Spring(Spring::new(config))
    }

    pub fn custom(f: impl Fn(f64) -> f64 + 'static) -> Self {
        Easing::Custom(Rc::new(f))
    }

    /// Piecewise-linear curve through `(x, y)` points
    ///
    /// The points are sorted by x; missing endpoints at x = 0 and x = 1 are
    /// filled with y = 0 and y = 1.
    pub fn piecewise(points: impl Into<Vec<(f64, f64)>>) -> Self {
        let mut points: Vec<(f64, f64)> = points.into();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if points.first().map_or(true, |p| p.0 > 0.0) {
            points.insert(0, (0.0, 0.0));
        }
        if points.last().map_or(true, |p| p.0 < 1.0) {
            points.push((1.0, 1.0));
        }
        Easing::PiecewiseLinear(points)
    }

    /// Settling time of a spring easing, which overrides tween durations
    pub fn settling_duration(&self) -> Option<f64> {
        match self {
            Easing::Spring(spring) => Some(spring.settling_duration()),
            _ => None,
        }
    }

    /// Apply the easing to a progress value (clamped to 0.0..=1.0)
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = clamp(t, 0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Power { power, mode } => mode.apply(t, |t| t.powf(*power)),
            Easing::Sine(mode) => mode.apply(t, |t| 1.0 - (t * PI / 2.0).cos()),
            Easing::Circ(mode) => mode.apply(t, |t| 1.0 - (1.0 - t * t).sqrt()),
            Easing::Expo(mode) => mode.apply(t, |t| {
                if t == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * t - 10.0)
                }
            }),
            Easing::Bounce(mode) => mode.apply(t, bounce_in),
            Easing::Back { overshoot, mode } => {
                mode.apply(t, |t| (overshoot + 1.0) * t * t * t - overshoot * t * t)
            }
            Easing::Elastic {
                amplitude,
                period,
                mode,
            } => {
                let a = clamp(*amplitude, 1.0, 10.0);
                let p = clamp(*period, MIN_VALUE, 2.0);
                let s = (p / (2.0 * PI)) * (1.0 / a).asin();
                let e = 2.0 * PI / p;
                mode.apply(t, |t| {
                    if t == 0.0 || t == 1.0 {
                        t
                    } else {
                        -a * 2f64.powf(-10.0 * (1.0 - t)) * (((1.0 - t) - s) * e).sin()
                    }
                })
            }
            Easing::Steps { count, position } => stepped(*count, *position, t),
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, *x1, *y1, *x2, *y2),
            Easing::PiecewiseLinear(points) => piecewise_linear(points, t),
            Easing::Spring(spring) => spring.evaluate(t),
            Easing::Custom(f) => f(t),
        }
    }
}

fn bounce_in(t: f64) -> f64 {
    let mut b = 4;
    let mut pow2;
    loop {
        b -= 1;
        pow2 = 2f64.powi(b);
        if b <= 0 || t >= (pow2 - 1.0) / 11.0 {
            break;
        }
    }
    1.0 / 4f64.powi(3 - b) - 7.5625 * ((pow2 * 3.0 - 2.0) / 22.0 - t).powi(2)
}

fn stepped(steps: u32, position: StepPosition, t: f64) -> f64 {
    if steps == 0 {
        return t;
    }

    let steps_f = f64::from(steps);

    match position {
        StepPosition::Start => (t * steps_f).ceil() / steps_f,
        StepPosition::End => (t * steps_f).floor() / steps_f,
        StepPosition::Both => ((t * (steps_f + 1.0)).floor() / steps_f).min(1.0),
        StepPosition::None => {
            if steps == 1 {
                0.5
            } else {
                ((t * steps_f).floor() / (steps_f - 1.0)).min(1.0)
            }
        }
    }
}

fn piecewise_linear(points: &[(f64, f64)], t: f64) -> f64 {
    for pair in points.windows(2) {
        let (prev_x, prev_y) = pair[0];
        let (x, y) = pair[1];
        if t <= x {
            if x == prev_x {
                return y;
            }
            return prev_y + (y - prev_y) * (t - prev_x) / (x - prev_x);
        }
    }
    points.last().map_or(t, |p| p.1)
}

/// Cubic bezier easing calculation (matches CSS spec / browser implementations).
///
/// Uses Newton-Raphson with binary-search fallback for robustness.
fn cubic_bezier_ease(t: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    // Endpoints are always exact
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    // Straight diagonal needs no solving
    if x1 == y1 && x2 == y2 {
        return t;
    }

    let x = t;
    let mut p = x;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - x;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2);
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    // Binary search fallback (always converges)
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = x;
    for _ in 0..20 {
        let val = bezier_sample(p, x1, x2);
        if (val - x).abs() < 1e-7 {
            break;
        }
        if val < x {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2)
}

/// Evaluate cubic bezier at parameter t: B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

/// Derivative of cubic bezier
#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}

fn num(n: f64) -> String {
    cadence_core::format_number(n)
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Easing::Linear => f.write_str("linear"),
            Easing::Power { power, mode } => {
                let family = match *power {
                    p if p == 2.0 => "Quad",
                    p if p == 3.0 => "Cubic",
                    p if p == 4.0 => "Quart",
                    p if p == 5.0 => "Quint",
                    p => return write!(f, "{}({})", mode.prefix(), num(p)),
                };
                write!(f, "{}{}", mode.prefix(), family)
            }
            Easing::Sine(mode) => write!(f, "{}Sine", mode.prefix()),
            Easing::Circ(mode) => write!(f, "{}Circ", mode.prefix()),
            Easing::Expo(mode) => write!(f, "{}Expo", mode.prefix()),
            Easing::Bounce(mode) => write!(f, "{}Bounce", mode.prefix()),
            Easing::Back { overshoot, mode } => {
                write!(f, "{}Back({})", mode.prefix(), num(*overshoot))
            }
            Easing::Elastic {
                amplitude,
                period,
                mode,
            } => write!(
                f,
                "{}Elastic({},{})",
                mode.prefix(),
                num(*amplitude),
                num(*period)
            ),
            Easing::Steps { count, position } => write!(f, "steps({},{})", count, position.name()),
            Easing::CubicBezier(x1, y1, x2, y2) => write!(
                f,
                "cubicBezier({},{},{},{})",
                num(*x1),
                num(*y1),
                num(*x2),
                num(*y2)
            ),
            Easing::PiecewiseLinear(points) => {
                let parts: Vec<String> = points
                    .iter()
                    .map(|(x, y)| format!("{} {}%", num(*y), num(x * 100.0)))
                    .collect();
                write!(f, "linear({})", parts.join(","))
            }
            Easing::Spring(spring) => {
                let c = spring.config();
                write!(
                    f,
                    "spring({},{},{},{})",
                    num(c.mass),
                    num(c.stiffness),
                    num(c.damping),
                    num(c.velocity)
                )
            }
            Easing::Custom(_) => f.write_str("custom"),
        }
    }
}

impl fmt::Debug for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Easing({})", self)
    }
}

impl FromStr for Easing {
    type Err = EasingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, args) = match s.find('(') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| EasingParseError::Unknown(s.to_string()))?;
                let args: Vec<&str> = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .collect();
                (s[..open].trim(), args)
            }
            None => (s, Vec::new()),
        };

        let bad_args = || EasingParseError::Arguments {
            name: name.to_string(),
            args: args.join(","),
        };
        let number = |i: usize, default: f64| -> Result<f64, EasingParseError> {
            match args.get(i) {
                Some(a) => a.parse::<f64>().map_err(|_| bad_args()),
                None => Ok(default),
            }
        };

        match name {
            "linear" | "none" if args.is_empty() => return Ok(Easing::Linear),
            "linear" => return parse_piecewise(&args).ok_or_else(bad_args),
            "steps" => {
                let count = args
                    .first()
                    .and_then(|a| a.parse::<u32>().ok())
                    .ok_or_else(bad_args)?;
                let position = match args.get(1).copied() {
                    None | Some("end") | Some("jump-end") => StepPosition::End,
                    Some("start") | Some("jump-start") => StepPosition::Start,
                    Some("both") | Some("jump-both") => StepPosition::Both,
                    Some("none") | Some("jump-none") => StepPosition::None,
                    Some(_) => return Err(bad_args()),
                };
                return Ok(Easing::Steps { count, position });
            }
            "cubicBezier" => {
                if args.len() != 4 {
                    return Err(bad_args());
                }
                return Ok(Easing::CubicBezier(
                    number(0, 0.0)?,
                    number(1, 0.0)?,
                    number(2, 1.0)?,
                    number(3, 1.0)?,
                ));
            }
            "spring" => {
                let d = SpringConfig::default();
                return Ok(Easing::spring(SpringConfig::new(
                    number(0, d.mass)?,
                    number(1, d.stiffness)?,
                    number(2, d.damping)?,
                    number(3, d.velocity)?,
                )));
            }
            _ => {}
        }

        let (mode, family) = [
            ("inOut", EaseMode::InOut),
            ("outIn", EaseMode::OutIn),
            ("in", EaseMode::In),
            ("out", EaseMode::Out),
        ]
        .iter()
        .find_map(|(prefix, mode)| name.strip_prefix(prefix).map(|rest| (*mode, rest)))
        .ok_or_else(|| EasingParseError::Unknown(s.to_string()))?;

        let easing = match family {
            "" => Easing::Power {
                power: number(0, DEFAULT_POWER)?,
                mode,
            },
            "Quad" => Easing::power(2.0, mode),
            "Cubic" => Easing::power(3.0, mode),
            "Quart" => Easing::power(4.0, mode),
            "Quint" => Easing::power(5.0, mode),
            "Sine" => Easing::Sine(mode),
            "Circ" => Easing::Circ(mode),
            "Expo" => Easing::Expo(mode),
            "Bounce" => Easing::Bounce(mode),
            "Back" => Easing::Back {
                overshoot: number(0, DEFAULT_OVERSHOOT)?,
                mode,
            },
            "Elastic" => Easing::Elastic {
                amplitude: number(0, 1.0)?,
                period: number(1, 0.3)?,
                mode,
            },
            _ => return Err(EasingParseError::Unknown(s.to_string())),
        };
        Ok(easing)
    }
}

/// `linear(0, .5 25%, 1)`: each stop is a value with an optional percentage
fn parse_piecewise(args: &[&str]) -> Option<Easing> {
    if args.len() < 2 {
        return None;
    }
    let last = args.len() - 1;
    let mut points = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let mut parts = arg.split_whitespace();
        let y = parts.next()?.parse::<f64>().ok()?;
        let x = match parts.next() {
            Some(percent) => percent.strip_suffix('%')?.parse::<f64>().ok()? / 100.0,
            None => i as f64 / last as f64,
        };
        points.push((x, y));
    }
    Some(Easing::PiecewiseLinear(points))
}

impl Serialize for Easing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Easing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn parse(s: &str) -> Easing {
        s.parse().unwrap()
    }

    #[test]
    fn test_endpoints() {
        for name in [
            "linear",
            "inQuad",
            "outCubic",
            "inOutQuart",
            "outInQuint",
            "inSine",
            "outCirc",
            "inOutExpo",
            "outBounce",
            "inBack",
            "outElastic",
            "cubicBezier(.4,0,.2,1)",
            "linear(0, .5 25%, 1)",
            "spring",
        ] {
            let ease = parse(name);
            assert!(approx_eq(ease.evaluate(0.0), 0.0), "{name} at 0");
            assert!(approx_eq(ease.evaluate(1.0), 1.0), "{name} at 1");
        }
    }

    #[test]
    fn test_modes() {
        assert!(approx_eq(parse("inQuad").evaluate(0.5), 0.25));
        assert!(approx_eq(parse("outQuad").evaluate(0.5), 0.75));
        assert!(approx_eq(parse("inOutQuad").evaluate(0.25), 0.125));
        assert!(approx_eq(parse("outInQuad").evaluate(0.25), 0.375));
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Easing::Linear.evaluate(-1.0), 0.0);
        assert_eq!(Easing::Linear.evaluate(2.0), 1.0);
    }

    #[test]
    fn test_power_arguments() {
        assert!(approx_eq(parse("in(3)").evaluate(0.5), 0.125));
        assert!(approx_eq(parse("in").evaluate(0.5), 0.5f64.powf(1.68)));
    }

    #[test]
    fn test_back_overshoots_below_zero() {
        let ease = parse("inBack(1.70158)");
        assert!(ease.evaluate(0.2) < 0.0);
    }

    #[test]
    fn test_steps() {
        let ease = Easing::steps(4);
        assert_eq!(ease.evaluate(0.0), 0.0);
        assert_eq!(ease.evaluate(0.3), 0.25);
        assert_eq!(ease.evaluate(0.99), 0.75);
        assert_eq!(ease.evaluate(1.0), 1.0);

        let start = parse("steps(4, start)");
        assert_eq!(start.evaluate(0.1), 0.25);
    }

    #[test]
    fn test_piecewise_linear() {
        let ease = parse("linear(0, .5 25%, 1)");
        assert!(approx_eq(ease.evaluate(0.25), 0.5));
        assert!(approx_eq(ease.evaluate(0.125), 0.25));
        assert!(approx_eq(ease.evaluate(0.625), 0.75));

        let built = Easing::piecewise(vec![(0.5, 0.8)]);
        assert!(approx_eq(built.evaluate(0.5), 0.8));
        assert!(approx_eq(built.evaluate(1.0), 1.0));
    }

    #[test]
    fn test_cubic_bezier_linear_diagonal() {
        let ease = Easing::cubic_bezier(0.25, 0.25, 0.75, 0.75);
        assert!(approx_eq(ease.evaluate(0.3), 0.3));
    }

    #[test]
    fn test_cubic_bezier_ease_out_is_ahead() {
        let ease = Easing::cubic_bezier(0.0, 0.0, 0.58, 1.0);
        assert!(ease.evaluate(0.5) > 0.5);
    }

    #[test]
    fn test_display_round_trip() {
        for name in [
            "linear",
            "inQuad",
            "outIn(2.5)",
            "inOutBack(1.2)",
            "outElastic(1,0.3)",
            "steps(5,start)",
            "cubicBezier(0.4,0,0.2,1)",
            "spring(1,100,10,0)",
        ] {
            assert_eq!(parse(name).to_string(), name);
        }
    }

    #[test]
    fn test_spring_reports_settling_duration() {
        let ease = parse("spring(1, 200, 20, 0)");
        assert!(ease.settling_duration().unwrap() > 0.0);
        assert_eq!(parse("linear").settling_duration(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "wobble".parse::<Easing>(),
            Err(EasingParseError::Unknown(_))
        ));
        assert!(matches!(
            "inFoo".parse::<Easing>(),
            Err(EasingParseError::Unknown(_))
        ));
        assert!(matches!(
            "steps(x)".parse::<Easing>(),
            Err(EasingParseError::Arguments { .. })
        ));
        assert!(matches!(
            "cubicBezier(1,2)".parse::<Easing>(),
            Err(EasingParseError::Arguments { .. })
        ));
        assert!(matches!(
            "inQuad(".parse::<Easing>(),
            Err(EasingParseError::Unknown(_))
        ));
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Easing::out_quad()).unwrap();
        assert_eq!(json, "\"outQuad\"");
        let ease: Easing = serde_json::from_str("\"inOutSine\"").unwrap();
        assert!(approx_eq(ease.evaluate(0.5), 0.5));
    }
}
