//! Per-frame rendering of timers, animation tweens and timeline children

use cadence_core::{PropertyKind, PropertySink, ValueKind};
use tracing::debug;

use crate::clock::TickMode;
use crate::config::Composition;
use crate::engine::Engine;
use crate::math::{clamp, or_zero, round_to, MIN_VALUE};
use crate::timer::{absolute_offset, Event, Renderable, TimerId};

impl<S: PropertySink> Engine<S> {
    /// Render a timer at `time` and recurse into timeline children
    ///
    /// `time` is the timer's local time including its delay. `internal`
    /// renders update state without writing to the sink or resolving
    /// completions. Returns whether anything rendered.
    pub(crate) fn tick_timer(
        &mut self,
        id: TimerId,
        time: f64,
        mute: bool,
        internal: bool,
        mode: TickMode,
    ) -> bool {
        let Some(prev_iteration) = self.timers.get(id).map(|t| t.current_iteration) else {
            return false;
        };
        let rendered = self.render_timer(id, time, mute, internal, mode);

        let Some(timeline) = self.timers.get(id) else {
            return rendered;
        };
        if !timeline.is_container() {
            return rendered;
        }
        let backwards = timeline.backwards;
        let timeline_time = if internal {
            time
        } else {
            timeline.iteration_time
        };
        let timeline_fps = timeline.clock.frame_rate();
        let iteration_duration = timeline.iteration_duration;
        let looped = !internal && timeline.current_iteration != prev_iteration;
        let mut children = timeline.children().to_vec();

        if looped {
            for &child in &children {
                let Some(c) = self.timers.get(child) else {
                    continue;
                };
                if !backwards {
                    // finish children the loop jumped over
                    let unfinished = !c.completed && !c.backwards && c.clock.current_time < c.iteration_duration;
                    if unfinished {
                        self.tick_timer(child, iteration_duration, mute, true, TickMode::Force);
                    }
                    if let Some(c) = self.timers.get_mut(child) {
                        c.began = false;
                        c.completed = false;
                    }
                } else if c.duration <= MIN_VALUE && !mute {
                    self.fire(child, Event::Complete);
                }
            }
            if !mute {
                self.fire(id, Event::Loop);
            }
        }

        if backwards {
            children.reverse();
        }
        let now = self.clock.elapsed_time;
        let mut children_rendered = false;
        let mut all_completed = true;
        for child in children {
            let Some(c) = self.timers.get_mut(child) else {
                continue;
            };
            let child_time = round_to((timeline_time - c.offset) * c.clock.playback_rate(), 12);
            let child_mode = if c.clock.frame_rate() < timeline_fps {
                c.clock.request_tick(now)
            } else {
                mode
            };
            children_rendered |= self.tick_timer(child, child_time, mute, internal, child_mode);
            if !self.timers.get(child).is_some_and(|c| c.completed) {
                all_completed = false;
            }
        }

        if children_rendered && !mute {
            self.fire(id, Event::Render);
        }

        let Some(timeline) = self.timers.get_mut(id) else {
            return rendered || children_rendered;
        };
        if (all_completed || timeline.backwards) && timeline.clock.current_time >= timeline.duration {
            timeline.paused = true;
            if !timeline.completed {
                timeline.completed = true;
                debug!(?id, "timeline completed");
                if !mute {
                    self.fire(id, Event::Complete);
                }
                if !internal {
                    self.resolve_completions(id);
                }
            }
        }
        rendered || children_rendered
    }

    /// Advance one timer's own state and render its tweens
    fn render_timer(
        &mut self,
        id: TimerId,
        time: f64,
        mute: bool,
        internal: bool,
        mode: TickMode,
    ) -> bool {
        let tick_threshold = self.config.tick_threshold;
        let parent_state = self
            .timers
            .get(id)
            .and_then(|t| t.parent)
            .and_then(|p| self.timers.get(p))
            .map(|p| (p.backwards, p.began));
        let Some(timer) = self.timers.get_mut(id) else {
            return false;
        };

        let duration = timer.duration;
        let iteration_duration = timer.iteration_duration;
        let count = timer.iteration_count;
        let loop_delay = timer.loop_delay;
        let is_leaf = !timer.is_container();
        let is_setter = is_leaf && parent_state.is_some() && duration <= MIN_VALUE;
        let prev_time = timer.clock.current_time;
        let prev_iteration = timer.current_iteration;

        let t = clamp(time - timer.delay, -timer.delay, duration);
        let above_zero = t > 0.0;
        let at_end = t >= duration;
        let forced = mode == TickMode::Force;

        let mut odd_iteration = false;
        let elapsed = if count > 1.0 {
            let span = iteration_duration + if at_end { 0.0 } else { loop_delay };
            let mut iteration = clamp((t / span).trunc(), 0.0, count) as i64;
            if at_end {
                iteration -= 1;
            }
            timer.current_iteration = iteration;
            odd_iteration = iteration % 2 != 0;
            or_zero(t % (iteration_duration + loop_delay))
        } else {
            t
        };

        let is_reversed = timer.reversed ^ (timer.alternate && odd_iteration);
        let mut iteration_time = if at_end {
            if is_reversed {
                0.0
            } else {
                duration
            }
        } else if is_reversed {
            iteration_duration - elapsed
        } else {
            elapsed
        };
        if let Some(ease) = &timer.ease {
            iteration_time = or_zero(iteration_duration * ease.evaluate(iteration_time / iteration_duration));
        }

        let backwards = match parent_state {
            Some((parent_backwards, _)) => parent_backwards,
            None => t < prev_time,
        } ^ is_reversed;
        let parent_suppressed =
            parent_state.is_some_and(|(_, parent_began)| backwards || !parent_began);

        timer.clock.current_time = t;
        timer.iteration_time = iteration_time;
        timer.backwards = backwards;

        let mut fire_begin = false;
        if above_zero && !timer.began {
            timer.began = true;
            fire_begin = !mute && !parent_suppressed;
        } else if t <= 0.0 {
            timer.began = false;
        }
        let fire_loop =
            !mute && is_leaf && above_zero && timer.current_iteration != prev_iteration;

        let trigger = match mode {
            TickMode::Force => true,
            // the final frame always renders
            TickMode::Skip => at_end && prev_time < duration,
            TickMode::Auto => {
                t != prev_time
                    && !(t <= 0.0 && prev_time <= 0.0)
                    && !(t >= duration && prev_time >= duration)
            }
        };
        let forced_render = forced || (t - prev_time).abs() >= tick_threshold;

        if fire_begin {
            self.fire(id, Event::Begin);
        }
        if fire_loop {
            self.fire(id, Event::Loop);
        }

        let mut rendered = false;
        if trigger {
            if !mute {
                self.fire(id, Event::Update);
            }
            rendered = if is_leaf {
                self.render_tweens(id, iteration_time, forced_render, internal)
            } else {
                true
            };
            if rendered && is_leaf && !mute {
                self.fire(id, Event::Render);
            }
        }

        let Some(timer) = self.timers.get_mut(id) else {
            return rendered;
        };
        if is_setter {
            let parent_began = parent_state.is_some_and(|(_, began)| began);
            if parent_began && !backwards && t >= duration && !timer.completed {
                timer.completed = true;
                if !mute {
                    self.fire(id, Event::Complete);
                }
            } else if backwards && t <= MIN_VALUE && timer.completed {
                timer.completed = false;
                if !mute {
                    self.fire(id, Event::Complete);
                }
            }
        } else if above_zero && at_end {
            if count.is_infinite() {
                timer.clock.start_time += duration;
            } else if timer.current_iteration as f64 >= count - 1.0 {
                timer.paused = true;
                if !timer.completed && is_leaf {
                    timer.completed = true;
                    debug!(?id, "timer completed");
                    if !parent_suppressed {
                        if !mute {
                            self.fire(id, Event::Complete);
                        }
                        if !internal {
                            self.resolve_completions(id);
                        }
                    }
                }
            }
        } else {
            timer.completed = false;
        }

        rendered
    }

    /// Interpolate and write the tweens of an animation at `iteration_time`
    ///
    /// Plain timers have nothing to render and count as rendered.
    fn render_tweens(
        &mut self,
        id: TimerId,
        iteration_time: f64,
        forced_render: bool,
        internal: bool,
    ) -> bool {
        let absolute_time = absolute_offset(&self.timers, id)
            + self.timers.get(id).map_or(0.0, |t| t.delay)
            + iteration_time;
        let Engine {
            timers,
            tweens,
            sink,
            codec,
            config,
            ..
        } = self;
        let Some(timer) = timers.get(id) else {
            return false;
        };
        let Renderable::Animation(state) = &timer.kind else {
            return true;
        };

        let mut rendered = false;
        for &tween_id in &state.tweens {
            let Some(tween) = tweens.get(tween_id) else {
                continue;
            };
            if tween.is_carrier {
                continue;
            }
            let absolute_end = tween.absolute_end_time();
            let next = tween.next_rep.and_then(|n| tweens.get(n));
            let prev = tween.prev_rep.and_then(|p| tweens.get(p));

            let in_window = forced_render
                || ((tween.current_time != tween.change_duration
                    || absolute_time <= absolute_end + next.map_or(0.0, |n| n.delay))
                    && (tween.current_time != 0.0 || absolute_time >= tween.absolute_start_time));
            let composed = tween.composition != Composition::None;
            let unblocked = !composed
                || (!tween.overridden
                    && (!tween.overlapped || absolute_time <= absolute_end || forced_render)
                    && next.map_or(true, |n| {
                        n.overridden || absolute_time <= n.absolute_start_time
                    })
                    && prev.map_or(true, |p| {
                        p.overridden || absolute_time >= p.absolute_end_time() + tween.delay
                    }));
            if !(in_window && unblocked) {
                continue;
            }

            let Some(tween) = tweens.get_mut(tween_id) else {
                continue;
            };
            let tween_time = clamp(iteration_time - tween.start_time, 0.0, tween.change_duration);
            tween.current_time = tween_time;
            let progress = tween.ease.evaluate(tween_time / tween.update_duration);
            let exact = (tween.value_kind == ValueKind::Number && tween.kind == PropertyKind::Field)
                || progress == 0.0
                || progress == 1.0;
            let precision = if exact { None } else { Some(config.precision) };
            let value = tween.interpolate(progress, precision);
            let raw = codec.recompose(&value);
            if !internal && tween.composition != Composition::Blend {
                sink.write(tween.target, &tween.property, tween.kind, raw.clone());
            }
            tween.value = Some(raw);
            rendered = true;
        }
        rendered
    }

    /// Write the summed value of every blend chain
    pub(crate) fn render_additive(&mut self) {
        let carriers = self.registry.sum_blends(&mut self.tweens);
        for id in carriers {
            let Some(carrier) = self.tweens.get_mut(id) else {
                continue;
            };
            let value = carrier.interpolate(1.0, None);
            let raw = self.codec.recompose(&value);
            self.sink
                .write(carrier.target, &carrier.property, carrier.kind, raw.clone());
            carrier.value = Some(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::params::{AnimationParams, TimerParams};
    use crate::{Easing, Engine, LoopCount};
    use cadence_core::{MemorySink, PropertyKind, TargetId};
    use std::cell::RefCell;
    use std::rc::Rc;

    const A: TargetId = TargetId(1);

    fn engine() -> Engine<MemorySink> {
        Engine::new(MemorySink::new().with(A, "x", PropertyKind::Style, 0.0))
    }

    fn run(engine: &mut Engine<MemorySink>, until: f64, step: f64) {
        let mut now = 0.0;
        while now <= until {
            engine.update(now);
            now += step;
        }
    }

    #[test]
    fn test_callback_order() {
        let mut engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
        engine.animate(
            &[A],
            AnimationParams::new()
                .prop("x", 100.0)
                .duration(100.0)
                .ease(Easing::Linear)
                .on_begin(move |_| a.borrow_mut().push("begin"))
                .on_update(move |_| b.borrow_mut().push("update"))
                .on_render(move |_| c.borrow_mut().push("render"))
                .on_complete(move |_| d.borrow_mut().push("complete")),
        );
        engine.update(0.0);
        engine.update(50.0);
        engine.update(100.0);
        let log = log.borrow();
        assert_eq!(
            log.as_slice(),
            &["begin", "update", "render", "update", "render", "complete"]
        );
    }

    #[test]
    fn test_delay_holds_the_start_value() {
        let mut engine = engine();
        let id = engine.animate(
            &[A],
            AnimationParams::new()
                .prop("x", 100.0)
                .duration(500.0)
                .delay(500.0)
                .ease(Easing::Linear),
        );
        assert_eq!(engine.timer(id).unwrap().delay(), 500.0);
        engine.update(0.0);
        engine.update(250.0);
        assert_eq!(engine.sink().number(A, "x"), Some(0.0));
        assert_eq!(engine.current_time(id), Some(-250.0));
        engine.update(750.0);
        assert_eq!(engine.sink().number(A, "x"), Some(50.0));
    }

    #[test]
    fn test_alternate_loops_play_back() {
        let mut engine = engine();
        engine.animate(
            &[A],
            AnimationParams::new()
                .prop("x", 100.0)
                .duration(1000.0)
                .ease(Easing::Linear)
                .looped(LoopCount::Count(1))
                .alternate(true),
        );
        engine.update(0.0);
        engine.update(500.0);
        assert_eq!(engine.sink().number(A, "x"), Some(50.0));
        engine.update(1250.0);
        assert_eq!(engine.sink().number(A, "x"), Some(75.0));
        engine.update(2000.0);
        assert_eq!(engine.sink().number(A, "x"), Some(0.0));
    }

    #[test]
    fn test_playback_ease_shapes_time() {
        let mut engine = engine();
        let id = engine.animate(
            &[A],
            AnimationParams::new()
                .prop("x", 100.0)
                .duration(1000.0)
                .playback_ease(Easing::in_quad()),
        );
        engine.update(0.0);
        engine.update(500.0);
        assert_eq!(engine.timer(id).unwrap().iteration_time(), 250.0);
        assert_eq!(engine.sink().number(A, "x"), Some(25.0));
    }

    #[test]
    fn test_zero_duration_timer_completes_on_play() {
        let mut engine = engine();
        let id = engine.create_timer(TimerParams::new().duration(0.0));
        assert!(engine.timer(id).unwrap().is_completed());
        run(&mut engine, 100.0, 10.0);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_large_jump_renders_final_value() {
        let mut engine = engine();
        let id = engine.animate(
            &[A],
            AnimationParams::new()
                .prop("x", 100.0)
                .duration(300.0)
                .ease(Easing::Linear),
        );
        engine.update(0.0);
        engine.update(10_000.0);
        assert_eq!(engine.sink().number(A, "x"), Some(100.0));
        assert!(engine.timer(id).unwrap().is_completed());
    }
}
