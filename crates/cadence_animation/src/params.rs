//! Declarative parameters for timers, animations and timelines
//!
//! Parameters are plain builders. Anything left unset falls back to the
//! engine's [`Defaults`](crate::Defaults), or to the enclosing timeline's
//! defaults for timeline children.
//!
//! ```rust
//! use cadence_animation::{AnimationParams, Easing, Keyframe, LoopCount};
//!
//! let params = AnimationParams::new()
//!     .prop("x", [0.0, 100.0])
//!     .prop("opacity", vec![Keyframe::to(0.5), Keyframe::to(1.0).duration(200.0)])
//!     .duration(800.0)
//!     .ease(Easing::Linear)
//!     .looped(LoopCount::Count(1));
//! # let _ = params;
//! ```

use std::fmt;
use std::rc::Rc;

use cadence_core::{RawValue, TargetId};

use crate::config::{Composition, Defaults, LoopCount};
use crate::easing::Easing;
use crate::timer::{Callbacks, Timer};

/// Value computed per target from `(target, index, total)`
pub type ValueFn = Rc<dyn Fn(TargetId, usize, usize) -> Value>;

/// Time computed per target from `(target, index, total)`
pub type TimingFn = Rc<dyn Fn(TargetId, usize, usize) -> f64>;

/// Post-interpolation transform of every animated number
pub type Modifier = Rc<dyn Fn(f64) -> f64>;

/// A property value as written by the user
#[derive(Clone)]
pub enum Value {
    Number(f64),
    /// Unit, color, complex or relative (`"+=10"`) value
    Text(String),
    Func(ValueFn),
}

impl Value {
    pub fn func(f: impl Fn(TargetId, usize, usize) -> Value + 'static) -> Self {
        Value::Func(Rc::new(f))
    }

    /// Evaluate function values for one target
    pub(crate) fn resolve(&self, target: TargetId, index: usize, total: usize) -> RawValue {
        match self {
            Value::Number(n) => RawValue::Number(*n),
            Value::Text(s) => RawValue::Text(s.clone()),
            Value::Func(f) => f(target, index, total).resolve(target, index, total),
        }
    }

    pub(crate) fn as_func(&self) -> Option<&ValueFn> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Func(_) => f.write_str("Func"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Number(n) => Value::Number(n),
            RawValue::Text(s) => Value::Text(s),
        }
    }
}

/// A duration or delay, fixed or computed per target
#[derive(Clone)]
pub enum Timing {
    Fixed(f64),
    Func(TimingFn),
}

impl Timing {
    pub fn func(f: impl Fn(TargetId, usize, usize) -> f64 + 'static) -> Self {
        Timing::Func(Rc::new(f))
    }

    pub(crate) fn resolve(&self, target: TargetId, index: usize, total: usize) -> f64 {
        match self {
            Timing::Fixed(ms) => *ms,
            Timing::Func(f) => f(target, index, total),
        }
    }
}

impl fmt::Debug for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timing::Fixed(ms) => write!(f, "Fixed({ms})"),
            Timing::Func(_) => f.write_str("Func"),
        }
    }
}

impl From<f64> for Timing {
    fn from(ms: f64) -> Self {
        Timing::Fixed(ms)
    }
}

/// Spread a timing across targets: `start + index * step`
pub fn stagger(step: f64, start: f64) -> Timing {
    Timing::func(move |_, index, _| start + index as f64 * step)
}

/// One keyframe of a property
#[derive(Clone, Default)]
pub struct Keyframe {
    /// `None` holds the previous value for this keyframe's duration
    pub to: Option<Value>,
    pub from: Option<Value>,
    pub duration: Option<Timing>,
    pub delay: Option<Timing>,
    pub ease: Option<Easing>,
    pub composition: Option<Composition>,
    pub modifier: Option<Modifier>,
}

impl Keyframe {
    pub fn to(value: impl Into<Value>) -> Self {
        Self {
            to: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn hold() -> Self {
        Self::default()
    }

    pub fn from(mut self, value: impl Into<Value>) -> Self {
        self.from = Some(value.into());
        self
    }

    pub fn duration(mut self, duration: impl Into<Timing>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn delay(mut self, delay: impl Into<Timing>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }

    pub fn composition(mut self, composition: Composition) -> Self {
        self.composition = Some(composition);
        self
    }

    pub fn modifier(mut self, f: impl Fn(f64) -> f64 + 'static) -> Self {
        self.modifier = Some(Rc::new(f));
        self
    }
}

/// Value specification for one property
#[derive(Clone)]
pub enum PropertyValue {
    To(Value),
    FromTo(Value, Value),
    Keyframes(Vec<Keyframe>),
}

impl PropertyValue {
    /// A sequence of values: one is a `to`, two a `from`/`to` pair, more
    /// become evenly split keyframes starting from the first value
    pub fn sequence(values: Vec<Value>) -> Self {
        let mut values = values.into_iter();
        match (values.next(), values.len()) {
            (None, _) => PropertyValue::Keyframes(Vec::new()),
            (Some(only), 0) => PropertyValue::To(only),
            (Some(from), 1) => {
                let to = values.next().unwrap_or_else(|| from.clone());
                PropertyValue::FromTo(from, to)
            }
            (Some(from), _) => {
                let mut frames: Vec<Keyframe> = values.map(Keyframe::to).collect();
                if let Some(first) = frames.first_mut() {
                    first.from = Some(from);
                }
                PropertyValue::Keyframes(frames)
            }
        }
    }

    /// Normalize into keyframes
    pub(crate) fn into_keyframes(self) -> Vec<Keyframe> {
        match self {
            PropertyValue::To(to) => vec![Keyframe::to(to)],
            PropertyValue::FromTo(from, to) => vec![Keyframe::to(to).from(from)],
            PropertyValue::Keyframes(frames) => frames,
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::To(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::To(n.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::To(s.into())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::To(s.into())
    }
}

impl From<[f64; 2]> for PropertyValue {
    fn from([from, to]: [f64; 2]) -> Self {
        PropertyValue::FromTo(from.into(), to.into())
    }
}

impl From<[&str; 2]> for PropertyValue {
    fn from([from, to]: [&str; 2]) -> Self {
        PropertyValue::FromTo(from.into(), to.into())
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(values: Vec<f64>) -> Self {
        PropertyValue::sequence(values.into_iter().map(Value::from).collect())
    }
}

impl From<Vec<Keyframe>> for PropertyValue {
    fn from(frames: Vec<Keyframe>) -> Self {
        PropertyValue::Keyframes(frames)
    }
}

/// A stop of animation-level keyframes
#[derive(Clone, Default)]
pub struct KeyframeStop {
    pub properties: Vec<(String, Value)>,
    pub duration: Option<Timing>,
    pub delay: Option<Timing>,
    pub ease: Option<Easing>,
}

impl KeyframeStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn duration(mut self, duration: impl Into<Timing>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn delay(mut self, delay: impl Into<Timing>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }
}

/// Keyframes spanning several properties at once
#[derive(Clone)]
pub enum AnimationKeyframes {
    /// Stops keyed by percentage (0 to 100) of the animation duration.
    /// A stop's ease applies to the segment that follows it.
    Percent(Vec<(f64, KeyframeStop)>),
    /// Consecutive stops with their own durations
    Durations(Vec<KeyframeStop>),
}

impl AnimationKeyframes {
    /// Expand into per-property keyframes, in first-seen property order
    pub(crate) fn into_properties(self, duration: f64) -> Vec<(String, PropertyValue)> {
        let mut properties: Vec<(String, Vec<Keyframe>)> = Vec::new();
        let entry = |properties: &mut Vec<(String, Vec<Keyframe>)>, name: &str| {
            match properties.iter().position(|(n, _)| n == name) {
                Some(i) => i,
                None => {
                    properties.push((name.to_string(), Vec::new()));
                    properties.len() - 1
                }
            }
        };

        match self {
            AnimationKeyframes::Percent(mut stops) => {
                stops.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (percent, stop) in stops {
                    let end = percent / 100.0 * duration;
                    for (name, value) in stop.properties {
                        let i = entry(&mut properties, &name);
                        let frames = &mut properties[i].1;
                        let elapsed: f64 = frames
                            .iter()
                            .filter_map(|k| match k.duration {
                                Some(Timing::Fixed(ms)) => Some(ms),
                                _ => None,
                            })
                            .sum();
                        let mut frame = Keyframe::to(value).duration(end - elapsed);
                        if frames.len() == 1 {
                            frame.from = frames[0].to.clone();
                        }
                        frame.ease = stop.ease.clone();
                        frames.push(frame);
                    }
                }
                for (_, frames) in properties.iter_mut() {
                    // eases move one stop forward
                    let mut previous: Option<Easing> = None;
                    for frame in frames.iter_mut() {
                        let current = frame.ease.take();
                        frame.ease = previous;
                        previous = current;
                    }
                    let leading_zero = matches!(
                        frames.first().and_then(|k| k.duration.as_ref()),
                        Some(Timing::Fixed(ms)) if *ms == 0.0
                    );
                    if leading_zero && frames.len() > 1 {
                        frames.remove(0);
                    }
                }
            }
            AnimationKeyframes::Durations(stops) => {
                let names: Vec<String> = {
                    let mut names: Vec<String> = Vec::new();
                    for stop in &stops {
                        for (name, _) in &stop.properties {
                            if !names.contains(name) {
                                names.push(name.clone());
                            }
                        }
                    }
                    names
                };
                for name in &names {
                    entry(&mut properties, name);
                }
                for stop in stops {
                    for (name, frames) in properties.iter_mut() {
                        let to = stop
                            .properties
                            .iter()
                            .find(|(n, _)| n.as_str() == name.as_str())
                            .map(|(_, v)| v.clone());
                        frames.push(Keyframe {
                            to,
                            duration: stop.duration.clone(),
                            delay: stop.delay.clone(),
                            ease: stop.ease.clone(),
                            ..Keyframe::default()
                        });
                    }
                }
            }
        }

        properties
            .into_iter()
            .map(|(name, frames)| (name, PropertyValue::Keyframes(frames)))
            .collect()
    }
}

/// Playback options shared by timers, animations and timelines
#[derive(Default)]
pub struct PlaybackParams {
    pub label: Option<String>,
    pub loop_count: Option<LoopCount>,
    pub loop_delay: Option<f64>,
    pub reversed: Option<bool>,
    pub alternate: Option<bool>,
    pub autoplay: Option<bool>,
    pub frame_rate: Option<f64>,
    pub playback_rate: Option<f64>,
    pub playback_ease: Option<Easing>,
    pub callbacks: Callbacks,
}

macro_rules! playback_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn label(mut self, label: impl Into<String>) -> Self {
                self.playback.label = Some(label.into());
                self
            }

            pub fn looped(mut self, count: impl Into<LoopCount>) -> Self {
                self.playback.loop_count = Some(count.into());
                self
            }

            pub fn loop_delay(mut self, ms: f64) -> Self {
                self.playback.loop_delay = Some(ms);
                self
            }

            pub fn reversed(mut self, reversed: bool) -> Self {
                self.playback.reversed = Some(reversed);
                self
            }

            pub fn alternate(mut self, alternate: bool) -> Self {
                self.playback.alternate = Some(alternate);
                self
            }

            pub fn autoplay(mut self, autoplay: bool) -> Self {
                self.playback.autoplay = Some(autoplay);
                self
            }

            pub fn frame_rate(mut self, fps: f64) -> Self {
                self.playback.frame_rate = Some(fps);
                self
            }

            pub fn playback_rate(mut self, rate: f64) -> Self {
                self.playback.playback_rate = Some(rate);
                self
            }

            pub fn playback_ease(mut self, ease: Easing) -> Self {
                self.playback.playback_ease = Some(ease);
                self
            }

            pub fn on_begin(mut self, f: impl FnMut(&Timer) + 'static) -> Self {
                self.playback.callbacks.on_begin = Some(Box::new(f));
                self
            }

            pub fn on_update(mut self, f: impl FnMut(&Timer) + 'static) -> Self {
                self.playback.callbacks.on_update = Some(Box::new(f));
                self
            }

            pub fn on_loop(mut self, f: impl FnMut(&Timer) + 'static) -> Self {
                self.playback.callbacks.on_loop = Some(Box::new(f));
                self
            }

            pub fn on_render(mut self, f: impl FnMut(&Timer) + 'static) -> Self {
                self.playback.callbacks.on_render = Some(Box::new(f));
                self
            }

            pub fn on_complete(mut self, f: impl FnMut(&Timer) + 'static) -> Self {
                self.playback.callbacks.on_complete = Some(Box::new(f));
                self
            }

            pub fn on_pause(mut self, f: impl FnMut(&Timer) + 'static) -> Self {
                self.playback.callbacks.on_pause = Some(Box::new(f));
                self
            }
        }
    };
}

/// Parameters of a plain timer
#[derive(Default)]
pub struct TimerParams {
    /// Defaults to an endless timer
    pub duration: Option<f64>,
    pub delay: Option<f64>,
    pub playback: PlaybackParams,
}

impl TimerParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = Some(ms);
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay = Some(ms);
        self
    }
}

playback_builders!(TimerParams);

/// Parameters of an animation
#[derive(Default)]
pub struct AnimationParams {
    pub properties: Vec<(String, PropertyValue)>,
    pub keyframes: Option<AnimationKeyframes>,
    pub duration: Option<Timing>,
    pub delay: Option<Timing>,
    pub ease: Option<Easing>,
    pub composition: Option<Composition>,
    pub modifier: Option<Modifier>,
    pub playback: PlaybackParams,
}

impl AnimationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn keyframes(mut self, keyframes: AnimationKeyframes) -> Self {
        self.keyframes = Some(keyframes);
        self
    }

    pub fn duration(mut self, duration: impl Into<Timing>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn delay(mut self, delay: impl Into<Timing>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }

    pub fn composition(mut self, composition: Composition) -> Self {
        self.composition = Some(composition);
        self
    }

    pub fn modifier(mut self, f: impl Fn(f64) -> f64 + 'static) -> Self {
        self.modifier = Some(Rc::new(f));
        self
    }
}

playback_builders!(AnimationParams);

/// Parameters of a timeline
#[derive(Default)]
pub struct TimelineParams {
    /// Defaults inherited by children instead of the engine's
    pub defaults: Option<Defaults>,
    pub delay: Option<f64>,
    pub playback: PlaybackParams,
}

impl TimelineParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay = Some(ms);
        self
    }
}

playback_builders!(TimelineParams);
