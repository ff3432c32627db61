//! Color parsing into RGBA channels
//!
//! Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`,
//! `hsl()` and `hsla()`. Channels come back as `[r, g, b, a]` with rgb in
//! `0..=255` and alpha in `0..=1`.

use crate::error::ValueError;

/// Whether a string looks like a color this module understands
pub fn is_color(value: &str) -> bool {
    let v = value.trim_start();
    v.starts_with('#') || v.starts_with("rgb") || v.starts_with("hsl")
}

/// Parse a color string into `[r, g, b, a]`
pub fn parse_color(value: &str) -> Result<[f64; 4], ValueError> {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| ValueError::Color(v.to_string()));
    }
    if let Some(args) = function_args(v, "rgba").or_else(|| function_args(v, "rgb")) {
        return parse_rgb(&args).ok_or_else(|| ValueError::Color(v.to_string()));
    }
    if let Some(args) = function_args(v, "hsla").or_else(|| function_args(v, "hsl")) {
        return parse_hsl(&args).ok_or_else(|| ValueError::Color(v.to_string()));
    }
    Err(ValueError::Color(v.to_string()))
}

fn function_args(value: &str, name: &str) -> Option<Vec<String>> {
    let inner = value.strip_prefix(name)?.trim_start().strip_prefix('(')?;
    let inner = inner.strip_suffix(')')?;
    Some(
        inner
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn parse_hex(hex: &str) -> Option<[f64; 4]> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let short = |i: usize| digit(i).map(|d| f64::from(d * 17));
    match hex.len() {
        3 => Some([short(0)?, short(1)?, short(2)?, 1.0]),
        4 => Some([short(0)?, short(1)?, short(2)?, short(3)? / 255.0]),
        6 => Some([
            f64::from(pair(0)?),
            f64::from(pair(2)?),
            f64::from(pair(4)?),
            1.0,
        ]),
        8 => Some([
            f64::from(pair(0)?),
            f64::from(pair(2)?),
            f64::from(pair(4)?),
            f64::from(pair(6)?) / 255.0,
        ]),
        _ => None,
    }
}

fn channel(arg: &str, scale: f64) -> Option<f64> {
    match arg.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok().map(|p| p / 100.0 * scale),
        None => arg.parse::<f64>().ok(),
    }
}

fn alpha(args: &[String]) -> Option<f64> {
    match args.get(3) {
        Some(a) => channel(a, 1.0),
        None => Some(1.0),
    }
}

fn parse_rgb(args: &[String]) -> Option<[f64; 4]> {
    if args.len() < 3 {
        return None;
    }
    Some([
        channel(&args[0], 255.0)?,
        channel(&args[1], 255.0)?,
        channel(&args[2], 255.0)?,
        alpha(args)?,
    ])
}

fn parse_hsl(args: &[String]) -> Option<[f64; 4]> {
    if args.len() < 3 {
        return None;
    }
    let h = args[0].trim_end_matches("deg").parse::<f64>().ok()? / 360.0;
    let s = args[1].trim_end_matches('%').parse::<f64>().ok()? / 100.0;
    let l = args[2].trim_end_matches('%').parse::<f64>().ok()? / 100.0;
    let a = alpha(args)?;
    if s == 0.0 {
        let grey = (l * 255.0).round();
        return Some([grey, grey, grey, a]);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Some([
        (hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0).round(),
        (hue_to_rgb(p, q, h) * 255.0).round(),
        (hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0).round(),
        a,
    ])
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
