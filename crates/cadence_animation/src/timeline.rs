//! Timelines: timers that position children on a shared time axis

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use cadence_core::{Operator, PropertySink, TargetId};

use crate::clock::TickMode;
use crate::config::Composition;
use crate::engine::Engine;
use crate::math::MIN_VALUE;
use crate::params::{AnimationParams, TimelineParams, Timing, TimerParams};
use crate::timer::{absolute_offset, is_ancestor, Renderable, Timer, TimelineState, TimerId};

/// Errors raised while parsing a [`Position`]
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PositionParseError {
    #[error("empty timeline position")]
    Empty,
    #[error("invalid offset in timeline position `{0}`")]
    Offset(String),
}

/// Reference point of a relative position
#[derive(Clone, Debug, PartialEq)]
pub enum Anchor {
    /// End of the timeline's current iteration
    End,
    Label(String),
    /// Start of the last added child (`<`)
    PrevStart,
    /// End of the last added child (`<<`)
    PrevEnd,
}

/// Where a child is placed in a timeline
///
/// Parses from the usual textual forms:
///
/// | text       | position                                   |
/// |------------|--------------------------------------------|
/// | `500`      | 500 ms from the timeline start             |
/// | `+=100`    | 100 ms after the current end               |
/// | `intro`    | at label `intro`                           |
/// | `intro-=50`| 50 ms before label `intro`                 |
/// | `<`        | where the previous child starts            |
/// | `<<+=20`   | 20 ms after the previous child ends        |
#[derive(Clone, Debug, PartialEq)]
pub enum Position {
    At(f64),
    Relative {
        anchor: Anchor,
        offset: Option<(Operator, f64)>,
    },
}

impl Position {
    /// Append after the current end
    pub fn end() -> Self {
        Position::Relative {
            anchor: Anchor::End,
            offset: None,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Position::Relative {
            anchor: Anchor::Label(name.into()),
            offset: None,
        }
    }

    pub fn prev_start() -> Self {
        Position::Relative {
            anchor: Anchor::PrevStart,
            offset: None,
        }
    }

    pub fn prev_end() -> Self {
        Position::Relative {
            anchor: Anchor::PrevEnd,
            offset: None,
        }
    }

    /// Shift a relative position; absolute positions are moved directly
    pub fn offset(self, operator: Operator, amount: f64) -> Self {
        match self {
            Position::At(ms) => Position::At(operator.apply(ms, amount)),
            Position::Relative { anchor, .. } => Position::Relative {
                anchor,
                offset: Some((operator, amount)),
            },
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::end()
    }
}

impl From<f64> for Position {
    fn from(ms: f64) -> Self {
        Position::At(ms)
    }
}

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PositionParseError::Empty);
        }
        if let Ok(ms) = s.parse::<f64>() {
            return Ok(Position::At(ms));
        }

        let split = ["+=", "-=", "*="]
            .iter()
            .filter_map(|op| s.find(op))
            .min();
        let (head, offset) = match split {
            Some(at) => {
                let (operator, amount) = Operator::strip(&s[at..]);
                let amount = amount
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| PositionParseError::Offset(s.to_string()))?;
                (&s[..at], operator.map(|op| (op, amount)))
            }
            None => (s, None),
        };
        let anchor = match head.trim() {
            "" => Anchor::End,
            "<" => Anchor::PrevStart,
            "<<" => Anchor::PrevEnd,
            label => Anchor::Label(label.to_string()),
        };
        Ok(Position::Relative { anchor, offset })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::At(ms) => write!(f, "{ms}"),
            Position::Relative { anchor, offset } => {
                match anchor {
                    Anchor::End => {}
                    Anchor::Label(name) => f.write_str(name)?,
                    Anchor::PrevStart => f.write_str("<")?,
                    Anchor::PrevEnd => f.write_str("<<")?,
                }
                if let Some((operator, amount)) = offset {
                    write!(f, "{}{amount}", operator.symbol())?;
                }
                Ok(())
            }
        }
    }
}

impl<S: PropertySink> Engine<S> {
    /// Create an empty timeline; children are added with the `timeline_*` methods
    pub fn create_timeline(&mut self, params: TimelineParams) -> TimerId {
        let engine_defaults = self.config.defaults.clone();
        let TimelineParams {
            defaults,
            delay,
            playback,
        } = params;
        let state = TimelineState {
            defaults: defaults.unwrap_or_else(|| engine_defaults.clone()),
            ..TimelineState::default()
        };
        let id = self.insert_timer(Renderable::Timeline(state), playback, &engine_defaults, None, 0.0);
        if let Some(timeline) = self.timers.get_mut(id) {
            timeline.delay = delay.unwrap_or(0.0).max(0.0);
            timeline.iteration_duration = 0.0;
            timeline.refresh_duration();
        }
        self.init(id, false);
        id
    }

    /// Resolve a position against the timeline's current children and labels
    pub fn resolve_position(&self, timeline: TimerId, position: &Position) -> f64 {
        let Some(timer) = self.timers.get(timeline) else {
            return 0.0;
        };
        let end = if timer.iteration_duration <= MIN_VALUE {
            0.0
        } else {
            timer.iteration_duration
        };
        let (anchor, offset) = match position {
            Position::At(ms) => return *ms,
            Position::Relative { anchor, offset } => (anchor, offset),
        };
        let prev = timer.children().last().and_then(|c| self.timers.get(*c));
        let base = match anchor {
            Anchor::End => end,
            Anchor::PrevStart => prev.map_or(0.0, |p| p.offset + p.delay),
            Anchor::PrevEnd => prev.map_or(0.0, |p| p.offset + p.delay + p.duration),
            Anchor::Label(name) => match timer.label_offset(name) {
                Some(ms) => ms,
                None => {
                    warn!(label = %name, "unknown timeline label; placing at the end");
                    end
                }
            },
        };
        match offset {
            Some((operator, amount)) => operator.apply(base, *amount),
            None => base,
        }
    }

    /// Add an animation of `targets` at `position`
    pub fn timeline_add(
        &mut self,
        timeline: TimerId,
        targets: &[TargetId],
        params: AnimationParams,
        position: impl Into<Position>,
    ) -> Option<TimerId> {
        self.add_animation_child(timeline, targets, params, position.into(), None)
    }

    fn add_animation_child(
        &mut self,
        timeline: TimerId,
        targets: &[TargetId],
        params: AnimationParams,
        position: Position,
        stagger: Option<(usize, usize)>,
    ) -> Option<TimerId> {
        if !self.is_timeline(timeline) {
            return None;
        }
        let is_setter = matches!(params.duration, Some(Timing::Fixed(ms)) if ms <= MIN_VALUE);
        let offset = self.child_offset(timeline, &position, is_setter);
        let child = self.build_animation(targets, params, Some(timeline), offset, stagger);
        self.attach_child(timeline, child);
        Some(child)
    }

    /// Add a plain timer at `position`
    pub fn timeline_add_timer(
        &mut self,
        timeline: TimerId,
        params: TimerParams,
        position: impl Into<Position>,
    ) -> Option<TimerId> {
        if !self.is_timeline(timeline) {
            return None;
        }
        let is_setter = params.duration.is_some_and(|ms| ms <= MIN_VALUE);
        let offset = self.child_offset(timeline, &position.into(), is_setter);
        let child = self.build_timer(params, Some(timeline), offset);
        self.attach_child(timeline, child);
        Some(child)
    }

    /// Nest an existing top-level timeline at `position`
    ///
    /// Returns `false` when `child` is not a top-level timeline or the
    /// nesting would create a cycle.
    pub fn timeline_add_timeline(
        &mut self,
        timeline: TimerId,
        child: TimerId,
        position: impl Into<Position>,
    ) -> bool {
        if !self.is_timeline(timeline) || !self.is_timeline(child) {
            return false;
        }
        let nestable = self
            .timers
            .get(child)
            .is_some_and(|c| c.parent.is_none())
            && !is_ancestor(&self.timers, child, timeline);
        if !nestable {
            warn!(?timeline, ?child, "timeline cannot be nested here");
            return false;
        }

        let before = absolute_offset(&self.timers, child);
        let offset = self.child_offset(timeline, &position.into(), false);
        if let Some(c) = self.timers.get_mut(child) {
            c.parent = Some(timeline);
            c.offset = offset;
            c.autoplay = false;
            c.paused = true;
            c.running = false;
        }
        self.running.retain(|r| *r != child);
        let shift = absolute_offset(&self.timers, child) - before;
        if shift != 0.0 {
            self.shift_tweens(child, shift);
        }
        self.attach_child(timeline, child);
        true
    }

    /// Move every tween below `id` along the absolute axis and recompose it
    fn shift_tweens(&mut self, id: TimerId, shift: f64) {
        let Some(timer) = self.timers.get(id) else {
            return;
        };
        let children = timer.children().to_vec();
        let tweens = timer.tweens().to_vec();
        for child in children {
            self.shift_tweens(child, shift);
        }
        for tween_id in tweens {
            self.registry.remove(tween_id, &mut self.tweens);
            let Some(tween) = self.tweens.get_mut(tween_id) else {
                continue;
            };
            tween.absolute_start_time += shift;
            tween.reset_composition();
            if tween.composition == Composition::None {
                continue;
            }
            if let Some(overridden) = self.registry.compose(tween_id, &mut self.tweens, &self.timers) {
                self.pause_overridden(overridden);
            }
        }
    }

    /// Add a zero-duration animation that snaps `targets` to the given values
    pub fn timeline_set(
        &mut self,
        timeline: TimerId,
        targets: &[TargetId],
        params: AnimationParams,
        position: impl Into<Position>,
    ) -> Option<TimerId> {
        let params = params
            .duration(MIN_VALUE)
            .composition(Composition::Replace);
        self.timeline_add(timeline, targets, params, position)
    }

    /// Register or move a label
    pub fn timeline_label(
        &mut self,
        timeline: TimerId,
        name: impl Into<String>,
        position: impl Into<Position>,
    ) {
        let offset = self.resolve_position(timeline, &position.into());
        if let Some(state) = self.timers.get_mut(timeline).and_then(Timer::timeline_mut) {
            state.labels.insert(name.into(), offset);
        }
    }

    /// Call `callback` when playback crosses `position`
    pub fn timeline_call(
        &mut self,
        timeline: TimerId,
        callback: impl FnMut(&Timer) + 'static,
        position: impl Into<Position>,
    ) -> Option<TimerId> {
        let params = TimerParams::new().duration(0.0).on_complete(callback);
        self.timeline_add_timer(timeline, params, position)
    }

    /// Add one animation per target, each with its own parameters and position
    ///
    /// Function values see the target's index within the whole group.
    pub fn timeline_add_staggered(
        &mut self,
        timeline: TimerId,
        targets: &[TargetId],
        params: impl Fn(TargetId, usize, usize) -> AnimationParams,
        position: impl Fn(usize, usize) -> Position,
    ) -> Vec<TimerId> {
        let total = targets.len();
        targets
            .iter()
            .enumerate()
            .filter_map(|(index, &target)| {
                self.add_animation_child(
                    timeline,
                    &[target],
                    params(target, index, total),
                    position(index, total),
                    Some((index, total)),
                )
            })
            .collect()
    }

    fn is_timeline(&self, id: TimerId) -> bool {
        let is_timeline = self.timers.get(id).is_some_and(Timer::is_container);
        if !is_timeline {
            warn!(?id, "not a timeline");
        }
        is_timeline
    }

    /// Resolve where a new child goes and render the timeline up to it so
    /// the child's start values are captured from that point
    fn child_offset(&mut self, timeline: TimerId, position: &Position, is_setter: bool) -> f64 {
        let mut offset = self.resolve_position(timeline, position);
        if is_setter {
            offset -= MIN_VALUE;
        }
        self.tick_timer(timeline, offset, true, true, TickMode::Auto);
        offset
    }

    /// Register a built child and grow the timeline (and its ancestors) around it
    fn attach_child(&mut self, timeline: TimerId, child: TimerId) {
        self.init(child, true);
        if let Some(state) = self.timers.get_mut(timeline).and_then(Timer::timeline_mut) {
            state.children.push(child);
        }
        debug!(?timeline, ?child, "child added to timeline");
        self.refresh_timeline(timeline);
    }

    /// Recompute iteration durations from children up the ancestor chain
    pub(crate) fn refresh_timeline(&mut self, timeline: TimerId) {
        let mut cursor = Some(timeline);
        while let Some(id) = cursor {
            let Some(timer) = self.timers.get(id) else {
                break;
            };
            let end = timer
                .children()
                .iter()
                .filter_map(|c| self.timers.get(*c))
                .map(|c| c.offset + c.delay + c.duration)
                .fold(0.0, f64::max);
            let parent = timer.parent;
            if let Some(timer) = self.timers.get_mut(id) {
                timer.iteration_duration = end;
                timer.refresh_duration();
            }
            self.init(id, true);
            cursor = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Defaults, Easing};
    use cadence_core::{MemorySink, PropertyKind};
    use std::cell::Cell;
    use std::rc::Rc;

    const A: TargetId = TargetId(1);

    fn engine() -> Engine<MemorySink> {
        let sink = MemorySink::new()
            .with(A, "x", PropertyKind::Style, 0.0)
            .with(A, "y", PropertyKind::Style, 0.0)
            .with(A, "z", PropertyKind::Style, 0.0);
        Engine::new(sink)
    }

    fn slide(property: &str, to: f64, duration: f64) -> AnimationParams {
        AnimationParams::new()
            .prop(property, to)
            .duration(duration)
            .ease(Easing::Linear)
    }

    fn offset_of(engine: &Engine<MemorySink>, id: Option<TimerId>) -> f64 {
        engine.timer(id.unwrap()).unwrap().offset()
    }

    #[test]
    fn test_parse_positions() {
        assert_eq!("500".parse::<Position>().unwrap(), Position::At(500.0));
        assert_eq!("".parse::<Position>(), Err(PositionParseError::Empty));
        assert_eq!(
            "+=100".parse::<Position>().unwrap(),
            Position::end().offset(Operator::Add, 100.0)
        );
        assert_eq!("<".parse::<Position>().unwrap(), Position::prev_start());
        assert_eq!("<<".parse::<Position>().unwrap(), Position::prev_end());
        assert_eq!(
            "<+=20".parse::<Position>().unwrap(),
            Position::prev_start().offset(Operator::Add, 20.0)
        );
        assert_eq!(
            "intro-=50".parse::<Position>().unwrap(),
            Position::label("intro").offset(Operator::Sub, 50.0)
        );
        assert_eq!(
            "intro+=x".parse::<Position>(),
            Err(PositionParseError::Offset("intro+=x".to_string()))
        );
    }

    #[test]
    fn test_position_display() {
        for text in ["500", "+=100", "<", "<<-=20", "intro*=2"] {
            assert_eq!(text.parse::<Position>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_prev_start_shares_the_start() {
        let mut engine = engine();
        let tl = engine.create_timeline(TimelineParams::new());
        let a = engine.timeline_add(tl, &[A], slide("x", 100.0, 1000.0), Position::end());
        let b = engine.timeline_add(tl, &[A], slide("y", 50.0, 500.0), Position::prev_start());
        assert_eq!(offset_of(&engine, a), 0.0);
        assert_eq!(offset_of(&engine, b), 0.0);
        assert_eq!(engine.timer(tl).unwrap().duration(), 1000.0);

        engine.update(0.0);
        engine.update(500.0);
        assert_eq!(engine.sink().number(A, "x"), Some(50.0));
        assert_eq!(engine.sink().number(A, "y"), Some(50.0));
        engine.update(1000.0);
        assert_eq!(engine.sink().number(A, "x"), Some(100.0));
        assert!(engine.timer(tl).unwrap().is_completed());
    }

    #[test]
    fn test_children_are_appended_in_sequence() {
        let mut engine = engine();
        let tl = engine.create_timeline(TimelineParams::new());
        engine.timeline_add(tl, &[A], slide("x", 100.0, 500.0), Position::end());
        let b = engine.timeline_add(tl, &[A], slide("y", 100.0, 1000.0), Position::end());
        let c = engine.timeline_add(tl, &[A], slide("z", 100.0, 500.0), Position::prev_end());
        assert_eq!(offset_of(&engine, b), 500.0);
        assert_eq!(offset_of(&engine, c), 1500.0);
        assert_eq!(engine.timer(tl).unwrap().duration(), 2000.0);

        engine.update(0.0);
        engine.update(250.0);
        assert_eq!(engine.sink().number(A, "x"), Some(50.0));
        assert_eq!(engine.sink().number(A, "y"), Some(0.0));
        engine.update(1000.0);
        assert_eq!(engine.sink().number(A, "x"), Some(100.0));
        assert_eq!(engine.sink().number(A, "y"), Some(50.0));
        engine.update(2000.0);
        assert_eq!(engine.sink().number(A, "z"), Some(100.0));
        assert!(engine.timer(tl).unwrap().is_completed());
    }

    #[test]
    fn test_labels_and_offsets() {
        let mut engine = engine();
        let tl = engine.create_timeline(TimelineParams::new());
        engine.timeline_add(tl, &[A], slide("x", 100.0, 1000.0), Position::end());
        engine.timeline_label(tl, "mid", 250.0);
        let b = engine.timeline_add(tl, &[A], slide("y", 100.0, 100.0), "mid+=50".parse::<Position>().unwrap());
        assert_eq!(offset_of(&engine, b), 300.0);
        assert_eq!(engine.timer(tl).unwrap().label_offset("mid"), Some(250.0));
        assert_eq!(engine.resolve_position(tl, &Position::label("missing")), 1000.0);
        assert_eq!(
            engine.resolve_position(tl, &Position::end().offset(Operator::Sub, 200.0)),
            800.0
        );
    }

    #[test]
    fn test_empty_timeline_resolves_to_zero() {
        let mut engine = engine();
        let tl = engine.create_timeline(TimelineParams::new());
        assert_eq!(engine.resolve_position(tl, &Position::end()), 0.0);
        assert_eq!(engine.resolve_position(tl, &Position::prev_start()), 0.0);
        assert_eq!(engine.resolve_position(tl, &Position::prev_end()), 0.0);
    }

    #[test]
    fn test_children_inherit_timeline_defaults() {
        let mut engine = engine();
        let defaults = Defaults {
            duration: 400.0,
            ease: Easing::Linear,
            ..Defaults::default()
        };
        let tl = engine.create_timeline(TimelineParams::new().defaults(defaults));
        let a = engine.timeline_add(tl, &[A], AnimationParams::new().prop("x", 100.0), Position::end());
        assert_eq!(engine.timer(a.unwrap()).unwrap().duration(), 400.0);
        engine.update(0.0);
        engine.update(100.0);
        assert_eq!(engine.sink().number(A, "x"), Some(25.0));
    }

    #[test]
    fn test_set_snaps_values_at_its_position() {
        let mut engine = engine();
        let tl = engine.create_timeline(TimelineParams::new());
        engine.timeline_add(tl, &[A], slide("x", 100.0, 1000.0), Position::end());
        let set = engine.timeline_set(tl, &[A], AnimationParams::new().prop("z", 30.0), 500.0);
        assert!(offset_of(&engine, set) < 500.0);
        engine.update(0.0);
        engine.update(250.0);
        assert_eq!(engine.sink().number(A, "z"), Some(0.0));
        engine.update(600.0);
        assert_eq!(engine.sink().number(A, "z"), Some(30.0));
    }

    #[test]
    fn test_call_fires_when_crossed() {
        let mut engine = engine();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let tl = engine.create_timeline(TimelineParams::new());
        engine.timeline_add(tl, &[A], slide("x", 100.0, 1000.0), Position::end());
        engine.timeline_call(tl, move |_| seen.set(seen.get() + 1), 250.0);
        engine.update(0.0);
        engine.update(100.0);
        assert_eq!(calls.get(), 0);
        engine.update(300.0);
        assert_eq!(calls.get(), 1);
        engine.update(600.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_nested_timeline() {
        let mut engine = engine();
        let inner = engine.create_timeline(TimelineParams::new());
        engine.timeline_add(inner, &[A], slide("x", 100.0, 500.0), Position::end());
        let outer = engine.create_timeline(TimelineParams::new());
        assert!(engine.timeline_add_timeline(outer, inner, 500.0));
        assert_eq!(engine.timer(inner).unwrap().parent(), Some(outer));
        assert!(!engine.running().contains(&inner));
        assert_eq!(engine.timer(outer).unwrap().duration(), 1000.0);

        engine.update(0.0);
        engine.update(250.0);
        assert_eq!(engine.sink().number(A, "x"), Some(0.0));
        engine.update(750.0);
        assert_eq!(engine.sink().number(A, "x"), Some(50.0));
        engine.update(1000.0);
        assert!(engine.timer(outer).unwrap().is_completed());
    }

    #[test]
    fn test_nesting_rejects_cycles() {
        let mut engine = engine();
        let inner = engine.create_timeline(TimelineParams::new());
        let outer = engine.create_timeline(TimelineParams::new());
        assert!(!engine.timeline_add_timeline(outer, outer, 0.0));
        assert!(engine.timeline_add_timeline(outer, inner, 0.0));
        assert!(!engine.timeline_add_timeline(inner, outer, 0.0));
    }

    #[test]
    fn test_staggered_children() {
        let mut engine = engine();
        let b = TargetId(2);
        engine.sink_mut().insert(b, "x", PropertyKind::Style, 0.0);
        let tl = engine.create_timeline(TimelineParams::new());
        let children = engine.timeline_add_staggered(
            tl,
            &[A, b],
            |_, _, _| slide("x", 100.0, 200.0),
            |i, _| Position::At(i as f64 * 100.0),
        );
        assert_eq!(children.len(), 2);
        assert_eq!(offset_of(&engine, Some(children[1])), 100.0);
        assert_eq!(engine.timer(tl).unwrap().duration(), 300.0);
    }
}
