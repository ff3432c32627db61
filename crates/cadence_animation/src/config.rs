//! Engine configuration and playback defaults
//!
//! Everything here deserializes from TOML with `#[serde(default)]`, so a
//! configuration file only needs the keys it changes:
//!
//! ```toml
//! precision = 2
//! tick_threshold = 250
//!
//! [defaults]
//! duration = 600
//! ease = "inOutQuad"
//! loop = true
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::easing::Easing;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Number of extra iterations after the first run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LoopCount {
    #[default]
    Once,
    /// Repeat this many more times
    Count(u32),
    Infinite,
}

impl LoopCount {
    /// Total iterations including the first run
    pub fn iterations(self) -> f64 {
        match self {
            LoopCount::Once => 1.0,
            LoopCount::Count(n) => f64::from(n) + 1.0,
            LoopCount::Infinite => f64::INFINITY,
        }
    }
}

impl From<u32> for LoopCount {
    fn from(n: u32) -> Self {
        if n == 0 {
            LoopCount::Once
        } else {
            LoopCount::Count(n)
        }
    }
}

impl From<bool> for LoopCount {
    fn from(infinite: bool) -> Self {
        if infinite {
            LoopCount::Infinite
        } else {
            LoopCount::Once
        }
    }
}

impl Serialize for LoopCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LoopCount::Once => serializer.serialize_u32(0),
            LoopCount::Count(n) => serializer.serialize_u32(*n),
            LoopCount::Infinite => serializer.serialize_bool(true),
        }
    }
}

impl<'de> Deserialize<'de> for LoopCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LoopVisitor;

        impl<'de> Visitor<'de> for LoopVisitor {
            type Value = LoopCount;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a loop count or a boolean")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<LoopCount, E> {
                Ok(LoopCount::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LoopCount, E> {
                if v < 0 {
                    Ok(LoopCount::Infinite)
                } else {
                    self.visit_u64(v as u64)
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LoopCount, E> {
                Ok(u32::try_from(v).map_or(LoopCount::Infinite, LoopCount::from))
            }
        }

        deserializer.deserialize_any(LoopVisitor)
    }
}

/// How a new tween interacts with earlier tweens on the same target property
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Composition {
    /// Later tweens truncate or override earlier ones
    #[default]
    Replace,
    /// Tweens ignore each other
    None,
    /// Tweens add their deltas onto a shared carrier
    Blend,
}

/// Playback defaults applied to timers without explicit values
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub duration: f64,
    pub delay: f64,
    #[serde(rename = "loop")]
    pub loop_count: LoopCount,
    pub loop_delay: f64,
    pub reversed: bool,
    pub alternate: bool,
    pub autoplay: bool,
    pub ease: Easing,
    pub playback_ease: Option<Easing>,
    pub composition: Composition,
    pub frame_rate: f64,
    pub playback_rate: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            duration: 1000.0,
            delay: 0.0,
            loop_count: LoopCount::Once,
            loop_delay: 0.0,
            reversed: false,
            alternate: false,
            autoplay: true,
            ease: Easing::out_quad(),
            playback_ease: None,
            composition: Composition::Replace,
            frame_rate: 120.0,
            playback_rate: 1.0,
        }
    }
}

/// Engine-wide settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub defaults: Defaults,
    /// Decimal places kept for in-between values written as strings
    pub precision: i32,
    /// Render deltas at or above this many ms count as a manual seek
    pub tick_threshold: f64,
    pub frame_rate: f64,
    pub playback_rate: f64,
    /// Animations on at least this many targets default to [`Composition::None`]
    pub auto_composition_threshold: usize,
    pub pause_when_hidden: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            precision: 4,
            tick_threshold: 200.0,
            frame_rate: 120.0,
            playback_rate: 1.0,
            auto_composition_threshold: 1000,
            pause_when_hidden: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.precision, 4);
        assert_eq!(config.tick_threshold, 200.0);
        assert_eq!(config.defaults.duration, 1000.0);
        assert_eq!(config.defaults.ease.to_string(), "outQuad");
        assert_eq!(config.defaults.composition, Composition::Replace);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            precision = 2

            [defaults]
            duration = 600
            ease = "inOutSine"
            loop = true
            composition = "blend"
            "#,
        )
        .unwrap();
        assert_eq!(config.precision, 2);
        assert_eq!(config.tick_threshold, 200.0);
        assert_eq!(config.defaults.duration, 600.0);
        assert_eq!(config.defaults.ease.to_string(), "inOutSine");
        assert_eq!(config.defaults.loop_count, LoopCount::Infinite);
        assert_eq!(config.defaults.composition, Composition::Blend);
    }

    #[test]
    fn test_loop_values() {
        #[derive(Deserialize)]
        struct Wrapper {
            value: LoopCount,
        }
        let parse = |s: &str| toml::from_str::<Wrapper>(s).unwrap().value;
        assert_eq!(parse("value = 0"), LoopCount::Once);
        assert_eq!(parse("value = 3"), LoopCount::Count(3));
        assert_eq!(parse("value = -1"), LoopCount::Infinite);
        assert_eq!(parse("value = false"), LoopCount::Once);
        assert_eq!(LoopCount::Count(2).iterations(), 3.0);
    }

    #[test]
    fn test_bad_easing_is_a_config_error() {
        let err = EngineConfig::from_toml_str("[defaults]\nease = \"wobble\"").unwrap_err();
        assert!(err.to_string().contains("wobble"));
    }
}
