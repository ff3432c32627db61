//! Timer state shared by plain timers, animations and timelines
//!
//! A [`Timer`] only holds state. Everything that advances it lives on the
//! [`Engine`](crate::Engine), which owns all timers and tweens.

use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use tokio::sync::oneshot;

use crate::clock::Clock;
use crate::config::Defaults;
use crate::easing::Easing;
use crate::math::{clamp, clamp_infinity, round_to, MIN_VALUE};

new_key_type! {
    /// Handle to a timer, animation or timeline
    pub struct TimerId;
    /// Handle to a single tween
    pub struct TweenId;
}

/// Lifecycle callback; receives the timer that fired it
pub type Callback = Box<dyn FnMut(&Timer)>;

/// Lifecycle callbacks of a timer
#[derive(Default)]
pub struct Callbacks {
    pub on_begin: Option<Callback>,
    pub on_update: Option<Callback>,
    pub on_loop: Option<Callback>,
    pub on_render: Option<Callback>,
    pub on_complete: Option<Callback>,
    pub on_pause: Option<Callback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_begin", &self.on_begin.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_loop", &self.on_loop.is_some())
            .field("on_render", &self.on_render.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_pause", &self.on_pause.is_some())
            .finish()
    }
}

/// Lifecycle events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Begin,
    Update,
    Loop,
    Render,
    Complete,
    Pause,
}

impl Callbacks {
    pub(crate) fn slot(&mut self, event: Event) -> &mut Option<Callback> {
        match event {
            Event::Begin => &mut self.on_begin,
            Event::Update => &mut self.on_update,
            Event::Loop => &mut self.on_loop,
            Event::Render => &mut self.on_render,
            Event::Complete => &mut self.on_complete,
            Event::Pause => &mut self.on_pause,
        }
    }
}

/// A pending `then` continuation
pub(crate) struct Completion {
    pub(crate) sender: Option<oneshot::Sender<TimerId>>,
    pub(crate) callback: Option<Box<dyn FnOnce(&Timer)>>,
}

/// Tweens owned by an animation
#[derive(Clone, Debug, Default)]
pub struct AnimationState {
    pub(crate) tweens: Vec<TweenId>,
    /// Number of targets the animation was built for
    pub(crate) target_count: usize,
}

/// Children and labels of a timeline
#[derive(Clone, Debug, Default)]
pub struct TimelineState {
    pub(crate) children: Vec<TimerId>,
    pub(crate) labels: FxHashMap<String, f64>,
    pub(crate) defaults: Defaults,
}

/// What a timer renders
#[derive(Clone, Debug)]
pub enum Renderable {
    Timer,
    Animation(AnimationState),
    Timeline(TimelineState),
}

/// Kind of a timer, without its contents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    Timer,
    Animation,
    Timeline,
}

/// Schedulable unit: delay, duration, loops, direction and playback state
pub struct Timer {
    pub(crate) id: TimerId,
    pub(crate) label: Option<String>,
    pub(crate) parent: Option<TimerId>,
    pub(crate) clock: Clock,

    /// Total duration including loops and loop delays
    pub(crate) duration: f64,
    pub(crate) iteration_duration: f64,
    /// Iterations including the first run; may be infinite
    pub(crate) iteration_count: f64,
    pub(crate) delay: f64,
    pub(crate) loop_delay: f64,
    /// Position within the parent timeline, or on the engine's time axis
    pub(crate) offset: f64,

    pub(crate) iteration_time: f64,
    pub(crate) current_iteration: i64,
    pub(crate) reversed: bool,
    /// Direction restored by a reset
    pub(crate) reverse_initial: bool,
    pub(crate) alternate: bool,
    pub(crate) backwards: bool,

    pub(crate) paused: bool,
    pub(crate) began: bool,
    pub(crate) completed: bool,
    pub(crate) cancelled: bool,
    pub(crate) running: bool,
    pub(crate) autoplay: bool,

    pub(crate) ease: Option<Easing>,
    pub(crate) callbacks: Callbacks,
    pub(crate) completions: Vec<Completion>,
    pub(crate) kind: Renderable,
}

impl Timer {
    pub(crate) fn new(id: TimerId, kind: Renderable, fps: f64) -> Self {
        Self {
            id,
            label: None,
            parent: None,
            clock: Clock::new(0.0, fps),
            duration: MIN_VALUE,
            iteration_duration: MIN_VALUE,
            iteration_count: 1.0,
            delay: 0.0,
            loop_delay: 0.0,
            offset: 0.0,
            iteration_time: 0.0,
            current_iteration: 0,
            reversed: false,
            reverse_initial: false,
            alternate: false,
            backwards: false,
            paused: true,
            began: false,
            completed: false,
            cancelled: false,
            running: false,
            autoplay: true,
            ease: None,
            callbacks: Callbacks::default(),
            completions: Vec::new(),
            kind,
        }
    }

    /// Recompute the total duration from iteration duration, count and loop delay
    pub(crate) fn refresh_duration(&mut self) {
        let total = clamp_infinity(
            (self.iteration_duration + self.loop_delay) * self.iteration_count - self.loop_delay,
        );
        self.duration = if total <= 0.0 { MIN_VALUE } else { total };
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn parent(&self) -> Option<TimerId> {
        self.parent
    }

    pub fn kind(&self) -> TimerKind {
        match self.kind {
            Renderable::Timer => TimerKind::Timer,
            Renderable::Animation(_) => TimerKind::Animation,
            Renderable::Timeline(_) => TimerKind::Timeline,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn iteration_duration(&self) -> f64 {
        self.iteration_duration
    }

    pub fn iteration_count(&self) -> f64 {
        self.iteration_count
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn loop_delay(&self) -> f64 {
        self.loop_delay
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Local time without the delay, in `[-delay, duration]`
    pub fn current_time(&self) -> f64 {
        clamp(
            round_to(self.clock.current_time, 10),
            -self.delay,
            self.duration,
        )
    }

    /// Time within the current iteration, after direction and playback easing
    pub fn iteration_time(&self) -> f64 {
        self.iteration_time
    }

    pub fn current_iteration(&self) -> i64 {
        self.current_iteration
    }

    /// Overall progress in `[0, 1]`
    pub fn progress(&self) -> f64 {
        clamp(
            round_to(self.clock.current_time / self.duration, 10),
            0.0,
            1.0,
        )
    }

    /// Progress of the current iteration in `[0, 1]`
    pub fn iteration_progress(&self) -> f64 {
        clamp(
            round_to(self.iteration_time / self.iteration_duration, 10),
            0.0,
            1.0,
        )
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn is_alternate(&self) -> bool {
        self.alternate
    }

    pub fn is_backwards(&self) -> bool {
        self.backwards
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_began(&self) -> bool {
        self.began
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the engine is currently driving this timer
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn playback_rate(&self) -> f64 {
        self.clock.playback_rate()
    }

    pub fn frame_rate(&self) -> f64 {
        self.clock.frame_rate()
    }

    pub fn playback_ease(&self) -> Option<&Easing> {
        self.ease.as_ref()
    }

    pub fn tweens(&self) -> &[TweenId] {
        match &self.kind {
            Renderable::Animation(state) => &state.tweens,
            _ => &[],
        }
    }

    pub fn children(&self) -> &[TimerId] {
        match &self.kind {
            Renderable::Timeline(state) => &state.children,
            _ => &[],
        }
    }

    /// Offset of a timeline label
    pub fn label_offset(&self, name: &str) -> Option<f64> {
        match &self.kind {
            Renderable::Timeline(state) => state.labels.get(name).copied(),
            _ => None,
        }
    }

    pub(crate) fn is_container(&self) -> bool {
        matches!(self.kind, Renderable::Timeline(_))
    }

    pub(crate) fn timeline(&self) -> Option<&TimelineState> {
        match &self.kind {
            Renderable::Timeline(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn timeline_mut(&mut self) -> Option<&mut TimelineState> {
        match &mut self.kind {
            Renderable::Timeline(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn animation_mut(&mut self) -> Option<&mut AnimationState> {
        match &mut self.kind {
            Renderable::Animation(state) => Some(state),
            _ => None,
        }
    }
}

/// Whether `ancestor` is `id` or one of its parents
pub(crate) fn is_ancestor(timers: &SlotMap<TimerId, Timer>, ancestor: TimerId, id: TimerId) -> bool {
    let mut cursor = Some(id);
    while let Some(current) = cursor {
        if current == ancestor {
            return true;
        }
        cursor = timers.get(current).and_then(|t| t.parent);
    }
    false
}

/// Position of a timer on the engine's time axis: its own offset plus the
/// offsets and delays of every enclosing timeline
pub(crate) fn absolute_offset(timers: &SlotMap<TimerId, Timer>, id: TimerId) -> f64 {
    let Some(timer) = timers.get(id) else {
        return 0.0;
    };
    let mut offset = timer.offset;
    let mut cursor = timer.parent;
    while let Some(parent) = cursor.and_then(|p| timers.get(p)) {
        offset += parent.offset + parent.delay;
        cursor = parent.parent;
    }
    offset
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("duration", &self.duration)
            .field("current_time", &self.current_time())
            .field("paused", &self.paused)
            .field("completed", &self.completed)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn timer() -> Timer {
        Timer::new(TimerId::from(KeyData::from_ffi(1)), Renderable::Timer, 120.0)
    }

    #[test]
    fn test_duration_includes_loops() {
        let mut t = timer();
        t.iteration_duration = 1000.0;
        t.iteration_count = 3.0;
        t.loop_delay = 100.0;
        t.refresh_duration();
        assert_eq!(t.duration, 3200.0);
    }

    #[test]
    fn test_infinite_duration_is_clamped() {
        let mut t = timer();
        t.iteration_duration = 500.0;
        t.iteration_count = f64::INFINITY;
        t.refresh_duration();
        assert_eq!(t.duration, crate::math::MAX_VALUE);
    }

    #[test]
    fn test_zero_duration_uses_min_value() {
        let mut t = timer();
        t.iteration_duration = 0.0;
        t.refresh_duration();
        assert_eq!(t.duration, MIN_VALUE);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut t = timer();
        t.iteration_duration = 1000.0;
        t.refresh_duration();
        t.clock.current_time = 1500.0;
        assert_eq!(t.progress(), 1.0);
        t.clock.current_time = -20.0;
        assert_eq!(t.progress(), 0.0);
        t.clock.current_time = 250.0;
        assert_eq!(t.progress(), 0.25);
    }
}
