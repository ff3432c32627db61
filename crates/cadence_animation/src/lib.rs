//! Cadence Animation Engine
//!
//! A frame-driven scheduler that tweens target properties over time.
//!
//! # Features
//!
//! - **Timers**: delay, duration, loops, alternation, reversal and seeking
//! - **Animations**: per-property tweens with keyframes, relative values,
//!   unit conversion and colors
//! - **Composition**: overlapping tweens replace or blend additively
//! - **Timelines**: children placed by absolute, relative or label positions
//! - **Easing**: named curves, cubic bezier, steps, irregular and springs
//!
//! Properties are read and written through a [`cadence_core::PropertySink`];
//! the engine never touches a host directly.
//!
//! # Example
//!
//! ```rust
//! use cadence_animation::{AnimationParams, Easing, Engine};
//! use cadence_core::{MemorySink, PropertyKind, RawValue, TargetId};
//!
//! let el = TargetId(1);
//! let sink = MemorySink::new().with(el, "width", PropertyKind::Style, "10px");
//! let mut engine = Engine::new(sink);
//!
//! engine.animate(
//!     &[el],
//!     AnimationParams::new()
//!         .prop("width", "20px")
//!         .duration(1000.0)
//!         .ease(Easing::Linear),
//! );
//! engine.update(0.0);
//! engine.update(500.0);
//! assert_eq!(engine.sink().get(el, "width"), Some(&RawValue::from("15px")));
//! ```

pub mod animation;
pub mod clock;
pub mod composition;
pub mod config;
pub mod easing;
pub mod engine;
pub mod math;
pub mod params;
mod render;
pub mod spring;
pub mod timeline;
pub mod timer;
pub mod tween;

pub use clock::{Clock, TickMode};
pub use composition::CompositionRegistry;
pub use config::{Composition, ConfigError, Defaults, EngineConfig, LoopCount};
pub use easing::{EaseMode, Easing, EasingParseError, StepPosition};
pub use engine::Engine;
pub use math::{K, MAX_VALUE, MIN_VALUE};
pub use params::{
    stagger, AnimationKeyframes, AnimationParams, Keyframe, KeyframeStop, PlaybackParams,
    PropertyValue, TimelineParams, TimerParams, Timing, Value,
};
pub use spring::{Spring, SpringConfig};
pub use timeline::{Anchor, Position, PositionParseError};
pub use timer::{Callbacks, Event, Timer, TimerId, TimerKind, TweenId};
pub use tween::Tween;

pub use cadence_core;
