//! Raw and decomposed animation values
//!
//! A [`ValueCodec`] turns a [`RawValue`] read from a sink into a
//! [`Decomposed`] form the engine can interpolate, and turns the interpolated
//! result back into a raw value. [`CssCodec`] understands plain numbers,
//! numbers with a unit, colors, and strings with embedded numbers.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::color;
use crate::error::ValueError;

/// A value as stored on a target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Number(_) => None,
            RawValue::Text(s) => Some(s),
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => f.write_str(&format_number(*n)),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// Shape of a decomposed value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Number,
    Unit,
    Color,
    Complex,
}

/// Relative operator prefix (`+=`, `-=`, `*=`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
}

impl Operator {
    /// Apply `self` to `base` with `operand`
    pub fn apply(self, base: f64, operand: f64) -> f64 {
        match self {
            Operator::Add => base + operand,
            Operator::Sub => base - operand,
            Operator::Mul => base * operand,
        }
    }

    /// Split a leading operator off a string
    pub fn strip(value: &str) -> (Option<Operator>, &str) {
        let trimmed = value.trim_start();
        for (prefix, op) in [
            ("+=", Operator::Add),
            ("-=", Operator::Sub),
            ("*=", Operator::Mul),
        ] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                return (Some(op), rest);
            }
        }
        (None, value)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+=",
            Operator::Sub => "-=",
            Operator::Mul => "*=",
        }
    }
}

/// Interpolatable form of a value
///
/// - `Number` / `Unit` use `number` (and `unit`)
/// - `Color` uses four `numbers` (rgba)
/// - `Complex` interleaves `strings` and `numbers`: `strings.len() == numbers.len() + 1`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decomposed {
    pub kind: ValueKind,
    pub number: f64,
    pub unit: Option<String>,
    pub operator: Option<Operator>,
    pub numbers: SmallVec<[f64; 4]>,
    pub strings: Vec<String>,
}

impl Decomposed {
    pub fn number(number: f64) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    pub fn unit(number: f64, unit: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Unit,
            number,
            unit: Some(unit.into()),
            ..Self::default()
        }
    }

    pub fn color(rgba: [f64; 4]) -> Self {
        Self {
            kind: ValueKind::Color,
            numbers: SmallVec::from_slice(&rgba),
            ..Self::default()
        }
    }

    /// Whether the interpolatable state lives in `numbers` rather than `number`
    pub fn is_multi(&self) -> bool {
        matches!(self.kind, ValueKind::Color | ValueKind::Complex)
    }
}

/// Decomposes raw values into interpolatable form and back
pub trait ValueCodec {
    fn decompose(&self, raw: &RawValue) -> Result<Decomposed, ValueError>;

    fn recompose(&self, value: &Decomposed) -> RawValue;
}

/// Format a number the shortest way that round-trips, without `-0`
pub fn format_number(n: f64) -> String {
    format!("{}", n + 0.0)
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-+]?\d*\.?\d+(?:e[-+]?\d+)?").expect("number pattern is valid")
    })
}

fn unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([-+]?\d*\.?\d+(?:e[-+]?\d+)?)([a-z]+|%)$").expect("unit pattern is valid")
    })
}

/// CSS-flavoured codec
#[derive(Clone, Copy, Debug, Default)]
pub struct CssCodec;

impl CssCodec {
    pub fn new() -> Self {
        Self
    }

    fn decompose_text(&self, text: &str) -> Result<Decomposed, ValueError> {
        let (operator, rest) = Operator::strip(text);
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ValueError::Empty);
        }

        if let Ok(number) = rest.parse::<f64>() {
            return Ok(Decomposed {
                operator,
                ..Decomposed::number(number)
            });
        }

        if let Some(caps) = unit_regex().captures(rest) {
            let number = caps[1]
                .parse::<f64>()
                .map_err(|_| ValueError::Number(caps[1].to_string()))?;
            return Ok(Decomposed {
                operator,
                ..Decomposed::unit(number, &caps[2])
            });
        }

        if color::is_color(rest) {
            return color::parse_color(rest).map(Decomposed::color);
        }

        let mut numbers = SmallVec::new();
        let mut strings = Vec::new();
        let mut last = 0;
        for m in number_regex().find_iter(rest) {
            let number = m
                .as_str()
                .parse::<f64>()
                .map_err(|_| ValueError::Number(m.as_str().to_string()))?;
            strings.push(rest[last..m.start()].to_string());
            numbers.push(number);
            last = m.end();
        }
        strings.push(rest[last..].to_string());

        Ok(Decomposed {
            kind: ValueKind::Complex,
            numbers,
            strings,
            ..Decomposed::default()
        })
    }
}

impl ValueCodec for CssCodec {
    fn decompose(&self, raw: &RawValue) -> Result<Decomposed, ValueError> {
        match raw {
            RawValue::Number(n) if n.is_finite() => Ok(Decomposed::number(*n)),
            RawValue::Number(n) => Err(ValueError::Number(n.to_string())),
            RawValue::Text(text) => self.decompose_text(text),
        }
    }

    fn recompose(&self, value: &Decomposed) -> RawValue {
        match value.kind {
            ValueKind::Number => RawValue::Number(value.number),
            ValueKind::Unit => RawValue::Text(format!(
                "{}{}",
                format_number(value.number),
                value.unit.as_deref().unwrap_or_default()
            )),
            ValueKind::Color => {
                let channel = |i: usize| value.numbers.get(i).copied().unwrap_or(0.0);
                RawValue::Text(format!(
                    "rgba({},{},{},{})",
                    format_number(channel(0)),
                    format_number(channel(1)),
                    format_number(channel(2)),
                    format_number(value.numbers.get(3).copied().unwrap_or(1.0)),
                ))
            }
            ValueKind::Complex => {
                let mut out = value.strings.first().cloned().unwrap_or_default();
                for (i, n) in value.numbers.iter().enumerate() {
                    out.push_str(&format_number(*n));
                    if let Some(s) = value.strings.get(i + 1) {
                        out.push_str(s);
                    }
                }
                RawValue::Text(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decompose(s: &str) -> Decomposed {
        CssCodec.decompose(&RawValue::from(s)).unwrap()
    }

    #[test]
    fn test_plain_numbers() {
        let d = CssCodec.decompose(&RawValue::Number(12.5)).unwrap();
        assert_eq!(d.kind, ValueKind::Number);
        assert_eq!(d.number, 12.5);

        let d = decompose("  -3 ");
        assert_eq!(d.kind, ValueKind::Number);
        assert_eq!(d.number, -3.0);
    }

    #[test]
    fn test_units() {
        let d = decompose("10px");
        assert_eq!(d.kind, ValueKind::Unit);
        assert_eq!(d.number, 10.0);
        assert_eq!(d.unit.as_deref(), Some("px"));

        let d = decompose("-.5turn");
        assert_eq!(d.number, -0.5);
        assert_eq!(d.unit.as_deref(), Some("turn"));

        let d = decompose("50%");
        assert_eq!(d.unit.as_deref(), Some("%"));
    }

    #[test]
    fn test_relative_operators() {
        let d = decompose("+=50");
        assert_eq!(d.operator, Some(Operator::Add));
        assert_eq!(d.number, 50.0);

        let d = decompose("-=2em");
        assert_eq!(d.operator, Some(Operator::Sub));
        assert_eq!(d.unit.as_deref(), Some("em"));

        let d = decompose("*=3");
        assert_eq!(d.operator, Some(Operator::Mul));
        assert_eq!(Operator::Mul.apply(4.0, d.number), 12.0);
    }

    #[test]
    fn test_colors() {
        let d = decompose("#ff0000");
        assert_eq!(d.kind, ValueKind::Color);
        assert_eq!(d.numbers.as_slice(), &[255.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            CssCodec.recompose(&d),
            RawValue::from("rgba(255,0,0,1)")
        );
    }

    #[test]
    fn test_complex_values() {
        let d = decompose("translate(10px, 20px) scale(1.5)");
        assert_eq!(d.kind, ValueKind::Complex);
        assert_eq!(d.numbers.as_slice(), &[10.0, 20.0, 1.5]);
        assert_eq!(d.strings, vec!["translate(", "px, ", "px) scale(", ")"]);
        assert_eq!(
            CssCodec.recompose(&d),
            RawValue::from("translate(10px, 20px) scale(1.5)")
        );
    }

    #[test]
    fn test_text_without_numbers_is_complex() {
        let d = decompose("none");
        assert_eq!(d.kind, ValueKind::Complex);
        assert!(d.numbers.is_empty());
        assert_eq!(CssCodec.recompose(&d), RawValue::from("none"));
    }

    #[test]
    fn test_decompose_errors() {
        assert_eq!(CssCodec.decompose(&RawValue::from("   ")), Err(ValueError::Empty));
        assert!(CssCodec.decompose(&RawValue::Number(f64::NAN)).is_err());
        assert!(matches!(
            CssCodec.decompose(&RawValue::from("#12")),
            Err(ValueError::Color(_))
        ));
    }

    #[test]
    fn test_unit_recompose_formatting() {
        let mut d = decompose("10px");
        d.number = 15.0;
        assert_eq!(CssCodec.recompose(&d), RawValue::from("15px"));
        d.number = -0.0;
        assert_eq!(CssCodec.recompose(&d), RawValue::from("0px"));
        d.number = 0.1234;
        assert_eq!(CssCodec.recompose(&d), RawValue::from("0.1234px"));
    }
}
