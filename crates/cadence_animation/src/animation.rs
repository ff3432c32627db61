//! Building animations from declarative parameters
//!
//! Every `(target, property, keyframe)` triple becomes one [`Tween`]. Start
//! values come, in order of preference, from an explicit `from`, the previous
//! keyframe, a preceding sibling in the same timeline, or the target's live
//! value. Values of different kinds are coerced to a common kind before
//! interpolation.

use smallvec::smallvec;
use tracing::{debug, warn};

use cadence_core::{Decomposed, PropertyKind, PropertySink, RawValue, TargetId, ValueKind};

use crate::config::Composition;
use crate::easing::Easing;
use crate::engine::Engine;
use crate::math::{round_to, MAX_VALUE, MIN_VALUE};
use crate::params::{AnimationParams, Keyframe, Timing, Value};
use crate::timer::{absolute_offset, AnimationState, Renderable, Timer, TimerId, TweenId};
use crate::tween::Tween;

/// What a preceding sibling tween contributes to a new tween's start value
struct SiblingInfo {
    to_number: f64,
    value_kind: ValueKind,
    unit: Option<String>,
    animation: TimerId,
    value: Option<RawValue>,
}

impl<S: PropertySink> Engine<S> {
    /// Animate properties of `targets`; starts playing unless `autoplay` is off
    pub fn animate(&mut self, targets: &[TargetId], params: AnimationParams) -> TimerId {
        let id = self.build_animation(targets, params, None, 0.0, None);
        self.init(id, false);
        id
    }

    /// Build an animation and its tweens without initializing playback
    ///
    /// `stagger` overrides the `(index, total)` passed to function values when
    /// the targets of one logical group are added one by one.
    pub(crate) fn build_animation(
        &mut self,
        targets: &[TargetId],
        params: AnimationParams,
        parent: Option<TimerId>,
        position: f64,
        stagger: Option<(usize, usize)>,
    ) -> TimerId {
        let defaults = self.defaults_for(parent);
        let AnimationParams {
            mut properties,
            keyframes,
            duration,
            delay,
            ease,
            composition,
            modifier,
            playback,
        } = params;

        let has_playback_ease = playback.playback_ease.is_some() || defaults.playback_ease.is_some();
        let ease = ease.unwrap_or_else(|| {
            if has_playback_ease {
                Easing::Linear
            } else {
                defaults.ease.clone()
            }
        });
        let duration = match ease.settling_duration() {
            Some(ms) => Timing::Fixed(ms),
            None => duration.unwrap_or(Timing::Fixed(defaults.duration)),
        };
        let delay = delay.unwrap_or(Timing::Fixed(defaults.delay));
        let composition = composition.unwrap_or(
            if targets.len() >= self.config.auto_composition_threshold {
                Composition::None
            } else {
                defaults.composition
            },
        );
        let total = stagger.map_or(targets.len(), |(_, total)| total);

        if let Some(keyframes) = keyframes {
            let base = targets.first().map_or(defaults.duration, |target| {
                duration.resolve(*target, stagger.map_or(0, |(index, _)| index), total)
            });
            let mut expanded = keyframes.into_properties(base);
            expanded.append(&mut properties);
            properties = expanded;
        }

        let state = AnimationState {
            tweens: Vec::new(),
            target_count: targets.len(),
        };
        let id = self.insert_timer(Renderable::Animation(state), playback, &defaults, parent, position);
        let offset = absolute_offset(&self.timers, id);

        if targets.is_empty() {
            warn!(?id, "animation has no targets");
        }

        let mut iteration_delay = MAX_VALUE;
        let mut iteration_duration: f64 = 0.0;
        let mut created: Vec<TweenId> = Vec::new();

        for (i, &target) in targets.iter().enumerate() {
            let index = stagger.map_or(i, |(index, _)| index);
            for (name, value) in &properties {
                let Some(kind) = self.sink.resolve(target, name) else {
                    warn!(target_id = %target, property = %name, "property cannot be animated on this target");
                    continue;
                };
                let frames = value.clone().into_keyframes();
                let frame_count = frames.len() as f64;
                let base_duration = duration.resolve(target, index, total);
                let mut prev_tween: Option<TweenId> = None;
                let mut last_end = 0.0;

                for (k, frame) in frames.into_iter().enumerate() {
                    let frame_ease = frame.ease.clone().unwrap_or_else(|| ease.clone());
                    let frame_duration = match (frame.ease.as_ref().and_then(Easing::settling_duration), &frame.duration) {
                        (Some(ms), _) => ms,
                        (None, Some(timing)) => timing.resolve(target, index, total),
                        (None, None) => base_duration / frame_count,
                    };
                    let frame_delay = match &frame.delay {
                        Some(timing) => timing.resolve(target, index, total),
                        None if k == 0 => delay.resolve(target, index, total),
                        None => 0.0,
                    };
                    let frame_composition = frame.composition.unwrap_or(composition);
                    let start = if prev_tween.is_some() {
                        last_end + frame_delay
                    } else {
                        frame_delay
                    };
                    let absolute_start = round_to(offset + start, 12);

                    let prev_sibling = self.walk_siblings(target, name, absolute_start, frame_composition);
                    let Some((from, to)) = self.resolve_endpoints(
                        target,
                        name,
                        kind,
                        &frame,
                        prev_tween,
                        prev_sibling,
                        parent,
                        frame_composition,
                        (index, total),
                    ) else {
                        continue;
                    };

                    let update_duration = round_to(
                        if frame_duration <= 0.0 {
                            MIN_VALUE
                        } else {
                            frame_duration
                        },
                        12,
                    );
                    let mut tween = Tween::new(id, target, name.clone(), kind, &from, to);
                    tween.ease = frame_ease;
                    tween.modifier = frame.modifier.clone().or_else(|| modifier.clone());
                    tween.to_fn = frame
                        .to
                        .as_ref()
                        .and_then(Value::as_func)
                        .map(|f| (f.clone(), index, total));
                    tween.start_time = start;
                    tween.delay = frame_delay;
                    tween.update_duration = update_duration;
                    tween.change_duration = update_duration;
                    tween.absolute_start_time = absolute_start;
                    tween.composition = frame_composition;

                    let tween_id = self.tweens.insert_with_key(|key| {
                        tween.id = key;
                        tween
                    });
                    if let Some(state) = self.timers.get_mut(id).and_then(Timer::animation_mut) {
                        state.tweens.push(tween_id);
                    }
                    if frame_composition != Composition::None {
                        if let Some(overridden) = self.registry.compose(tween_id, &mut self.tweens, &self.timers) {
                            self.pause_overridden(overridden);
                        }
                    }

                    created.push(tween_id);
                    prev_tween = Some(tween_id);
                    last_end = round_to(start + update_duration, 12);
                    iteration_delay = iteration_delay.min(start);
                    iteration_duration = iteration_duration.max(last_end);
                }
            }
        }

        if created.is_empty() {
            warn!(?id, "animation has no animatable property on any target");
            iteration_delay = 0.0;
            iteration_duration = MIN_VALUE;
        } else if iteration_delay > 0.0 {
            // the earliest start becomes the animation's own delay
            for tween_id in &created {
                if let Some(tween) = self.tweens.get_mut(*tween_id) {
                    if tween.start_time - tween.delay == 0.0 {
                        tween.delay -= iteration_delay;
                    }
                    tween.start_time -= iteration_delay;
                }
            }
            iteration_duration -= iteration_delay;
        } else {
            iteration_delay = 0.0;
        }

        if let Some(timer) = self.timers.get_mut(id) {
            if created.is_empty() {
                timer.iteration_count = 0.0;
            }
            timer.iteration_duration = if iteration_duration > 0.0 {
                iteration_duration
            } else {
                MIN_VALUE
            };
            timer.delay = iteration_delay;
            timer.refresh_duration();
            debug!(?id, tweens = created.len(), duration = timer.duration, "animation created");
        }
        id
    }

    /// Find the last replace tween starting at or before `absolute_start`
    ///
    /// Replace tweens that start at or after it are overridden on the way.
    fn walk_siblings(
        &mut self,
        target: TargetId,
        property: &str,
        absolute_start: f64,
        composition: Composition,
    ) -> Option<TweenId> {
        if composition == Composition::None {
            return None;
        }
        let mut prev = None;
        let mut next = self.registry.replace_head(target, property);
        while let Some(sibling) = next.and_then(|n| self.tweens.get(n)) {
            if sibling.overridden || sibling.absolute_start_time > absolute_start {
                break;
            }
            prev = next;
            next = sibling.next_rep;
            let later = next
                .and_then(|n| self.tweens.get(n))
                .is_some_and(|n| n.absolute_start_time >= absolute_start);
            if later && composition == Composition::Replace {
                let mut cursor = next;
                while let Some(tween) = cursor.and_then(|c| self.tweens.get_mut(c)) {
                    tween.mark_overridden();
                    debug!(property = %tween.property, "tween overridden by a new tween");
                    cursor = tween.next_rep;
                }
                break;
            }
        }
        prev
    }

    /// Decompose and coerce the start and end value of one keyframe
    #[allow(clippy::too_many_arguments)]
    fn resolve_endpoints(
        &mut self,
        target: TargetId,
        property: &str,
        kind: PropertyKind,
        frame: &Keyframe,
        prev_tween: Option<TweenId>,
        prev_sibling: Option<TweenId>,
        parent: Option<TimerId>,
        composition: Composition,
        (index, total): (usize, usize),
    ) -> Option<(Decomposed, Decomposed)> {
        let live = self
            .sink
            .read(target, property, kind)
            .unwrap_or(RawValue::Number(0.0));
        let original = match self.codec.decompose(&live) {
            Ok(value) => value,
            Err(err) => {
                warn!(target_id = %target, property, %err, "live value cannot be decomposed; starting from 0");
                Decomposed::number(0.0)
            }
        };
        let sibling = prev_sibling.and_then(|s| self.tweens.get(s)).map(|s| SiblingInfo {
            to_number: s.to_number,
            value_kind: s.value_kind,
            unit: s.unit.clone(),
            animation: s.parent,
            value: s.value.clone(),
        });

        let mut from = if let Some(value) = &frame.from {
            let mut from = self.decompose_value(value, target, property, index, total)?;
            if let Some(operator) = from.operator.take() {
                let base = sibling.as_ref().map_or(original.number, |s| s.to_number);
                from.number = operator.apply(base, from.number);
            }
            from
        } else if let Some(prev) = prev_tween.and_then(|p| self.tweens.get(p)) {
            prev.decomposed_to()
        } else {
            let in_same_timeline = parent.is_some()
                && sibling.as_ref().is_some_and(|s| {
                    self.timers.get(s.animation).and_then(|a| a.parent) == parent
                });
            let sibling_value = sibling.as_ref().and_then(|s| s.value.as_ref());
            match sibling_value {
                Some(raw) if in_same_timeline => {
                    self.codec.decompose(raw).unwrap_or_else(|_| original.clone())
                }
                _ => original.clone(),
            }
        };

        if from.kind == ValueKind::Number {
            let inherited = match &sibling {
                Some(s) => (s.value_kind == ValueKind::Unit).then(|| s.unit.clone()),
                None => (original.kind == ValueKind::Unit).then(|| original.unit.clone()),
            };
            if let Some(unit) = inherited {
                from.kind = ValueKind::Unit;
                from.unit = unit;
            }
        }

        let (mut to, operator) = match &frame.to {
            Some(value) => {
                let mut to = self.decompose_value(value, target, property, index, total)?;
                let operator = to.operator.take();
                (to, operator)
            }
            None => (from.clone(), None),
        };

        self.coerce(target, property, &mut from, &mut to);

        if let Some(operator) = operator {
            // a blend chain already running on the property accumulates from its latest target
            let blend_base = (composition == Composition::Blend && frame.from.is_none())
                .then(|| self.registry.carrier(target, property))
                .flatten()
                .and_then(|carrier| self.tweens.get(carrier))
                .map(|carrier| carrier.from_number);
            to.number = operator.apply(blend_base.unwrap_or(from.number), to.number);
        }
        Some((from, to))
    }

    fn decompose_value(
        &self,
        value: &Value,
        target: TargetId,
        property: &str,
        index: usize,
        total: usize,
    ) -> Option<Decomposed> {
        let raw = value.resolve(target, index, total);
        match self.codec.decompose(&raw) {
            Ok(decomposed) => Some(decomposed),
            Err(err) => {
                warn!(target_id = %target, property, %err, "value cannot be decomposed; tween skipped");
                None
            }
        }
    }

    /// Bring `from` and `to` to the same kind, unit and length
    pub(crate) fn coerce(
        &mut self,
        target: TargetId,
        property: &str,
        from: &mut Decomposed,
        to: &mut Decomposed,
    ) {
        if from.kind != to.kind {
            if from.kind == ValueKind::Complex || to.kind == ValueKind::Complex {
                let (complex, other) = if from.kind == ValueKind::Complex {
                    (&*from, &mut *to)
                } else {
                    (&*to, &mut *from)
                };
                let n = other.number;
                other.kind = ValueKind::Complex;
                other.strings = complex.strings.clone();
                other.numbers = complex.numbers.iter().map(|_| n).collect();
            } else if from.kind == ValueKind::Unit || to.kind == ValueKind::Unit {
                let (with_unit, other) = if from.kind == ValueKind::Unit {
                    (&*from, &mut *to)
                } else {
                    (&*to, &mut *from)
                };
                other.kind = ValueKind::Unit;
                other.unit = with_unit.unit.clone();
            } else if from.kind == ValueKind::Color || to.kind == ValueKind::Color {
                let other = if from.kind == ValueKind::Color { &mut *to } else { &mut *from };
                other.kind = ValueKind::Color;
                other.numbers = smallvec![0.0, 0.0, 0.0, 1.0];
            }
        }

        if from.unit != to.unit {
            match (from.unit.clone(), to.unit.clone()) {
                (Some(from_unit), Some(to_unit)) => {
                    from.number = self.units.convert(
                        &self.sink,
                        target,
                        property,
                        from.number,
                        &from_unit,
                        &to_unit,
                    );
                    from.unit = Some(to_unit);
                }
                (Some(unit), None) => to.unit = Some(unit),
                (None, Some(unit)) => from.unit = Some(unit),
                (None, None) => {}
            }
        }

        let multi = matches!(to.kind, ValueKind::Color | ValueKind::Complex);
        if multi && from.numbers.len() != to.numbers.len() {
            let (longer, shorter) = if from.numbers.len() > to.numbers.len() {
                (&*from, &mut *to)
            } else {
                (&*to, &mut *from)
            };
            shorter.numbers = (0..longer.numbers.len())
                .map(|i| shorter.numbers.get(i).copied().unwrap_or(0.0))
                .collect();
            shorter.strings = longer.strings.clone();
        }
    }

    /// Re-evaluate function `to` values against the targets' live values
    pub fn refresh(&mut self, id: TimerId) {
        let tweens = self.timers.get(id).map(|t| t.tweens().to_vec()).unwrap_or_default();
        for tween_id in tweens {
            let Some(tween) = self.tweens.get(tween_id) else {
                continue;
            };
            let Some((f, index, total)) = tween.to_fn.clone() else {
                continue;
            };
            let (target, property, kind, composition) =
                (tween.target, tween.property.clone(), tween.kind, tween.composition);

            let live = self
                .sink
                .read(target, &property, kind)
                .unwrap_or(RawValue::Number(0.0));
            let mut from = match self.codec.decompose(&live) {
                Ok(from) => from,
                Err(err) => {
                    warn!(target_id = %target, property = %property, %err, "live value cannot be decomposed; refresh skipped");
                    continue;
                }
            };
            let Some(mut to) = self.decompose_value(&Value::Func(f), target, &property, index, total) else {
                continue;
            };
            let operator = to.operator.take();
            self.coerce(target, &property, &mut from, &mut to);
            if let Some(operator) = operator {
                to.number = operator.apply(from.number, to.number);
            }

            if composition == Composition::Blend {
                self.registry.remove(tween_id, &mut self.tweens);
            }
            let Some(tween) = self.tweens.get_mut(tween_id) else {
                continue;
            };
            tween.value_kind = to.kind;
            tween.from_number = from.number;
            tween.from_numbers = from.numbers;
            tween.to_number = to.number;
            tween.to_numbers = to.numbers;
            tween.strings = to.strings;
            tween.unit = to.unit;
            tween.store_endpoints();
            if composition == Composition::Blend {
                tween.reset_composition();
                if let Some(overridden) = self.registry.compose(tween_id, &mut self.tweens, &self.timers) {
                    self.pause_overridden(overridden);
                }
            }
        }
        debug!(?id, "animation refreshed");
    }

    /// Stop animating `target`, or only its `property`
    ///
    /// Animations left without tweens are cancelled.
    pub fn remove_target(&mut self, target: TargetId, property: Option<&str>) {
        let removed: Vec<TweenId> = self
            .tweens
            .iter()
            .filter(|(_, t)| {
                !t.is_carrier && t.target == target && property.map_or(true, |p| t.property == p)
            })
            .map(|(id, _)| id)
            .collect();

        let mut touched: Vec<TimerId> = Vec::new();
        for tween_id in removed {
            self.registry.remove(tween_id, &mut self.tweens);
            let Some(tween) = self.tweens.remove(tween_id) else {
                continue;
            };
            if let Some(state) = self.timers.get_mut(tween.parent).and_then(Timer::animation_mut) {
                state.tweens.retain(|t| *t != tween_id);
            }
            if !touched.contains(&tween.parent) {
                touched.push(tween.parent);
            }
        }

        for animation in touched {
            let empty = self.timers.get(animation).is_some_and(|t| t.tweens().is_empty());
            if empty {
                debug!(?animation, target_id = %target, "animation lost its last tween");
                self.cancel(animation);
            }
        }
    }
}
