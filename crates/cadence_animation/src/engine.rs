//! Animation engine
//!
//! The engine owns every timer and tween, drives the ones that are running
//! once per frame, and writes interpolated values to a [`PropertySink`].
//! Timers are addressed by [`TimerId`] handles; all playback control goes
//! through the engine.

use std::time::Instant;

use slotmap::SlotMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use cadence_core::{CssCodec, PropertySink, UnitConverter, ValueCodec};

use crate::clock::{Clock, TickMode};
use crate::composition::CompositionRegistry;
use crate::config::{Defaults, EngineConfig};
use crate::math::{normalize_time, K, MAX_VALUE, MIN_VALUE};
use crate::params::{PlaybackParams, TimerParams};
use crate::timer::{Completion, Event, Renderable, Timer, TimerId, TweenId};
use crate::tween::Tween;

/// Scheduler and renderer for timers, animations and timelines
pub struct Engine<S: PropertySink> {
    pub(crate) config: EngineConfig,
    pub(crate) clock: Clock,
    pub(crate) timers: SlotMap<TimerId, Timer>,
    pub(crate) tweens: SlotMap<TweenId, Tween>,
    pub(crate) registry: CompositionRegistry,
    /// Top-level timers driven by [`Engine::update`], in insertion order
    pub(crate) running: Vec<TimerId>,
    pub(crate) sink: S,
    pub(crate) codec: Box<dyn ValueCodec>,
    pub(crate) units: UnitConverter,
    origin: Instant,
    started: bool,
    suspended: bool,
}

impl<S: PropertySink> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl<S: PropertySink> Engine<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, EngineConfig::default())
    }

    pub fn with_config(sink: S, config: EngineConfig) -> Self {
        let mut clock = Clock::new(0.0, config.frame_rate);
        clock.set_playback_rate(config.playback_rate);
        Self {
            config,
            clock,
            timers: SlotMap::with_key(),
            tweens: SlotMap::with_key(),
            registry: CompositionRegistry::new(),
            running: Vec::new(),
            sink,
            codec: Box::new(CssCodec::new()),
            units: UnitConverter::new(),
            origin: Instant::now(),
            started: false,
            suspended: false,
        }
    }

    /// Replace the value codec used to decompose and recompose values
    pub fn with_codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Advance every running timer to `now` (milliseconds)
    ///
    /// Paused timers are dropped from the run loop; completed ones are
    /// cancelled on the way out.
    pub fn update(&mut self, now: f64) {
        if self.suspended {
            return;
        }
        if !self.started {
            self.started = true;
            self.clock.start_time = now;
            self.clock.reset_schedule(now);
            for id in self.running.clone() {
                self.reset_time(id);
            }
        }
        if self.clock.request_tick(now) == TickMode::Skip {
            return;
        }
        let delta = self.clock.compute_delta_time(now);
        self.clock.current_time = now - self.clock.start_time;
        trace!(now, delta, running = self.running.len(), "engine tick");

        let engine_rate = self.clock.playback_rate();
        let engine_fps = self.clock.frame_rate();
        let mut i = 0;
        while i < self.running.len() {
            let id = self.running[i];
            let Some(timer) = self.timers.get_mut(id) else {
                self.running.remove(i);
                continue;
            };
            if !timer.paused {
                let time = (now - timer.clock.start_time) * timer.clock.playback_rate() * engine_rate;
                let mode = if timer.clock.frame_rate() < engine_fps {
                    timer.clock.request_tick(now)
                } else {
                    TickMode::Auto
                };
                self.tick_timer(id, time, false, false, mode);
                i += 1;
            } else {
                timer.running = false;
                let finished = timer.completed && !timer.cancelled;
                self.running.remove(i);
                debug!(?id, "timer left the run loop");
                if finished {
                    self.cancel(id);
                }
            }
        }

        self.render_additive();
    }

    /// [`Engine::update`] with the time elapsed since the engine was created
    pub fn tick(&mut self) {
        let now = self.origin.elapsed().as_secs_f64() * K;
        self.update(now);
    }

    /// Stop processing frames until [`Engine::wake`]
    pub fn suspend(&mut self) {
        if !self.suspended {
            self.suspended = true;
            debug!("engine suspended");
        }
    }

    /// Resume processing frames; running timers continue where they were
    pub fn wake(&mut self, now: f64) {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        self.clock.reset_schedule(now);
        for id in self.running.clone() {
            self.reset_time(id);
        }
        debug!(now, "engine woken");
    }

    /// Host visibility changed; suspends while hidden when configured to
    pub fn set_hidden(&mut self, hidden: bool, now: f64) {
        if !self.config.pause_when_hidden {
            return;
        }
        if hidden {
            self.suspend();
        } else {
            self.wake(now);
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Engine time since the first update
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed_time - self.clock.start_time
    }

    pub fn playback_rate(&self) -> f64 {
        self.clock.playback_rate()
    }

    /// Scale the speed of every timer
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.clock.set_playback_rate(rate);
        for id in self.running.clone() {
            self.reset_time(id);
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.clock.frame_rate()
    }

    pub fn set_frame_rate(&mut self, fps: f64) {
        self.clock.set_frame_rate(fps);
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a plain timer; starts playing unless `autoplay` is off
    pub fn create_timer(&mut self, params: TimerParams) -> TimerId {
        let id = self.build_timer(params, None, 0.0);
        self.init(id, false);
        id
    }

    pub(crate) fn build_timer(
        &mut self,
        params: TimerParams,
        parent: Option<TimerId>,
        position: f64,
    ) -> TimerId {
        let defaults = self.defaults_for(parent);
        let TimerParams {
            duration,
            delay,
            playback,
        } = params;
        let id = self.insert_timer(Renderable::Timer, playback, &defaults, parent, position);
        if let Some(timer) = self.timers.get_mut(id) {
            timer.iteration_duration = normalize_time(duration.unwrap_or(f64::INFINITY));
            timer.delay = delay.unwrap_or(defaults.delay).max(0.0);
            timer.refresh_duration();
        }
        id
    }

    /// Allocate a timer and apply playback parameters over `defaults`
    pub(crate) fn insert_timer(
        &mut self,
        kind: Renderable,
        playback: PlaybackParams,
        defaults: &Defaults,
        parent: Option<TimerId>,
        position: f64,
    ) -> TimerId {
        let PlaybackParams {
            label,
            loop_count,
            loop_delay,
            reversed,
            alternate,
            autoplay,
            frame_rate,
            playback_rate,
            playback_ease,
            callbacks,
        } = playback;

        let offset = match parent {
            Some(_) => position,
            None => self.clock.elapsed_time - self.clock.start_time,
        };
        let fps = frame_rate.unwrap_or(defaults.frame_rate);
        let id = self.timers.insert_with_key(|id| Timer::new(id, kind, fps));
        let timer = &mut self.timers[id];
        let reversed = reversed.unwrap_or(defaults.reversed);
        timer.label = label;
        timer.parent = parent;
        timer.offset = offset;
        timer
            .clock
            .set_playback_rate(playback_rate.unwrap_or(defaults.playback_rate));
        timer.iteration_count = loop_count.unwrap_or(defaults.loop_count).iterations();
        timer.loop_delay = loop_delay.unwrap_or(defaults.loop_delay).max(0.0);
        timer.reversed = reversed;
        timer.reverse_initial = reversed;
        timer.alternate = alternate.unwrap_or(defaults.alternate);
        timer.autoplay = parent.is_none() && autoplay.unwrap_or(defaults.autoplay);
        timer.ease = playback_ease.or_else(|| defaults.playback_ease.clone());
        timer.callbacks = callbacks;
        id
    }

    /// Defaults a new child of `parent` inherits
    pub(crate) fn defaults_for(&self, parent: Option<TimerId>) -> Defaults {
        parent
            .and_then(|p| self.timers.get(p))
            .and_then(|t| t.timeline())
            .map(|state| state.defaults.clone())
            .unwrap_or_else(|| self.config.defaults.clone())
    }

    /// Bring a freshly built timer to its initial state
    ///
    /// Containers created outside a timeline first render their end state so
    /// every child's `from` values are captured.
    pub(crate) fn init(&mut self, id: TimerId, internal: bool) {
        let Some(timer) = self.timers.get(id) else {
            return;
        };
        let duration = timer.duration;
        let autoplay = timer.autoplay;
        if !internal && timer.is_container() {
            self.tick_timer(id, duration, true, false, TickMode::Force);
        }
        self.reset(id, internal);
        if autoplay {
            self.resume(id);
        }
    }

    // ------------------------------------------------------------------
    // Playback control
    // ------------------------------------------------------------------

    /// Start or continue playing; restarts a completed timer
    pub fn play(&mut self, id: TimerId) {
        if self.timers.get(id).is_some_and(|t| t.completed) {
            self.reset(id, false);
        }
        self.resume(id);
    }

    /// Continue playing from the current time
    ///
    /// Timeline children follow their parent and ignore this.
    pub fn resume(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        if timer.parent.is_some() || !timer.paused {
            return;
        }
        self.revive(id);
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        timer.paused = false;
        if timer.duration <= MIN_VALUE && !timer.is_container() {
            self.tick_timer(id, MIN_VALUE, false, false, TickMode::Force);
            return;
        }
        if !timer.running {
            timer.running = true;
            self.running.push(id);
            debug!(?id, "timer added to the run loop");
        }
        self.reset_time(id);
    }

    pub fn pause(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        if timer.paused {
            return;
        }
        timer.paused = true;
        self.fire(id, Event::Pause);
    }

    /// Play forwards, reversing direction first if needed
    pub fn play_forward(&mut self, id: TimerId) {
        if self.timers.get(id).is_some_and(|t| t.reversed) {
            self.reverse(id);
        }
        self.resume(id);
    }

    /// Play backwards, reversing direction first if needed
    pub fn play_backward(&mut self, id: TimerId) {
        if self.timers.get(id).is_some_and(|t| !t.reversed) {
            self.reverse(id);
        }
        self.resume(id);
    }

    /// Flip the playback direction while keeping the rendered state
    pub fn reverse(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        let count = timer.iteration_count;
        let iteration_duration = timer.iteration_duration;
        let infinite = count.is_infinite();
        let iterations = if infinite {
            (MAX_VALUE / iteration_duration).floor()
        } else {
            count
        };
        let keep_direction = timer.alternate && iterations % 2.0 == 0.0;
        if !keep_direction {
            timer.reversed = !timer.reversed;
        }

        let target = if infinite {
            // same visual position within the current iteration
            let span = iteration_duration + timer.loop_delay;
            let iteration = timer.current_iteration as f64;
            let odd = timer.current_iteration % 2 != 0;
            let visual = timer.iteration_time.clamp(0.0, iteration_duration);
            let reversed_now = timer.reversed ^ (timer.alternate && odd);
            let elapsed = if reversed_now {
                iteration_duration - visual
            } else {
                visual
            };
            iteration * span + elapsed
        } else {
            timer.duration - timer.current_time()
        };
        self.seek(id, target, false);
        self.reset_time(id);
    }

    /// Render the state at `time` (local, without delay)
    pub fn seek(&mut self, id: TimerId, time: f64, mute: bool) {
        self.revive(id);
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        let was_paused = timer.paused;
        let delay = timer.delay;
        timer.completed = false;
        timer.paused = true;
        self.tick_timer(id, time + delay, mute, false, TickMode::Auto);
        self.render_additive();
        if !was_paused {
            self.resume(id);
        }
    }

    /// Go back to the initial state and stop
    pub fn reset(&mut self, id: TimerId, internal: bool) {
        self.revive(id);
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        timer.reversed = timer.reverse_initial;
        timer.iteration_time = timer.iteration_duration;
        self.tick_timer(id, 0.0, true, internal, TickMode::Force);
        self.reset_flags(id);
    }

    fn reset_flags(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        timer.paused = true;
        timer.began = false;
        timer.completed = false;
        for child in timer.children().to_vec() {
            self.reset_flags(child);
        }
    }

    /// Reset and play from the start
    pub fn restart(&mut self, id: TimerId) {
        self.reset(id, false);
        self.resume(id);
    }

    /// Stop and detach every tween from composition; a later play revives it
    pub fn cancel(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get(id) else {
            return;
        };
        let children = timer.children().to_vec();
        let tweens = timer.tweens().to_vec();
        for child in children {
            self.cancel(child);
        }
        for tween in tweens {
            self.registry.remove(tween, &mut self.tweens);
        }
        if let Some(timer) = self.timers.get_mut(id) {
            timer.cancelled = true;
            debug!(?id, "timer cancelled");
        }
        self.pause(id);
    }

    /// Restore the initial state, then cancel
    pub fn revert(&mut self, id: TimerId) {
        self.reset(id, false);
        self.cancel(id);
    }

    /// Jump to the end, then cancel
    pub fn complete(&mut self, id: TimerId) {
        let duration = self.timers.get(id).map_or(0.0, |t| t.duration);
        self.seek(id, duration, false);
        self.cancel(id);
    }

    /// Cancel and drop the timer, its children and tweens
    ///
    /// Pending completion receivers observe a closed channel.
    pub fn dispose(&mut self, id: TimerId) {
        self.cancel(id);
        let Some(timer) = self.timers.remove(id) else {
            return;
        };
        for child in timer.children() {
            self.dispose(*child);
        }
        for tween in timer.tweens() {
            self.tweens.remove(*tween);
        }
        if let Some(state) = timer.parent.and_then(|p| self.timers.get_mut(p)).and_then(|p| p.timeline_mut()) {
            state.children.retain(|c| *c != id);
        }
        self.running.retain(|r| *r != id);
        debug!(?id, "timer disposed");
    }

    /// Re-attach the tweens of a cancelled timer to composition
    pub(crate) fn revive(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        if !timer.cancelled {
            return;
        }
        timer.cancelled = false;
        let children = timer.children().to_vec();
        let tweens = timer.tweens().to_vec();
        for child in children {
            self.revive(child);
        }
        for tween in tweens {
            if let Some(t) = self.tweens.get_mut(tween) {
                t.reset_composition();
            }
            if let Some(overridden) = self.registry.compose(tween, &mut self.tweens, &self.timers) {
                self.pause_overridden(overridden);
            }
        }
        debug!(?id, "timer revived");
    }

    /// Stop a timer whose tweens were all overridden by a newer one
    pub(crate) fn pause_overridden(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        if timer.paused && timer.completed {
            return;
        }
        timer.paused = true;
        timer.completed = true;
        debug!(?id, "timer overridden and paused");
        self.resolve_completions(id);
    }

    /// Scale a timer to a new total duration
    pub fn stretch(&mut self, id: TimerId, duration: f64) {
        let Some(timer) = self.timers.get(id) else {
            return;
        };
        let current = timer.duration;
        let target = normalize_time(duration);
        if current == target || current <= 0.0 {
            return;
        }
        let scale = target / current;
        let children = timer.children().to_vec();
        let tweens = timer.tweens().to_vec();

        for tween in tweens {
            if let Some(t) = self.tweens.get_mut(tween) {
                t.update_duration = normalize_time(t.update_duration * scale);
                t.change_duration = normalize_time(t.change_duration * scale);
                t.current_time *= scale;
                t.start_time *= scale;
                t.delay *= scale;
                t.absolute_start_time *= scale;
            }
        }
        for child in children {
            let Some(c) = self.timers.get_mut(child) else {
                continue;
            };
            c.offset *= scale;
            let child_duration = c.duration * scale;
            self.stretch(child, child_duration);
        }

        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        if let Some(state) = timer.timeline_mut() {
            for offset in state.labels.values_mut() {
                *offset *= scale;
            }
        }
        timer.iteration_duration = normalize_time(timer.iteration_duration * scale);
        timer.loop_delay *= scale;
        timer.delay *= scale;
        timer.refresh_duration();
        debug!(?id, duration = timer.duration, "timer stretched");
    }

    pub fn current_time(&self, id: TimerId) -> Option<f64> {
        self.timers.get(id).map(Timer::current_time)
    }

    pub fn set_current_time(&mut self, id: TimerId, time: f64) {
        self.seek(id, time, false);
    }

    pub fn progress(&self, id: TimerId) -> Option<f64> {
        self.timers.get(id).map(Timer::progress)
    }

    pub fn set_progress(&mut self, id: TimerId, progress: f64) {
        let duration = self.timers.get(id).map_or(0.0, |t| t.duration);
        self.seek(id, duration * progress, false);
    }

    /// Seek within the current iteration
    pub fn set_iteration_progress(&mut self, id: TimerId, progress: f64) {
        let Some(timer) = self.timers.get(id) else {
            return;
        };
        let span = timer.iteration_duration + timer.loop_delay;
        let time = span * timer.current_iteration.max(0) as f64 + timer.iteration_duration * progress;
        self.seek(id, time, false);
    }

    pub fn set_timer_playback_rate(&mut self, id: TimerId, rate: f64) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        timer.clock.set_playback_rate(rate);
        if timer.parent.is_none() {
            self.reset_time(id);
        }
    }

    pub fn set_timer_frame_rate(&mut self, id: TimerId, fps: f64) {
        if let Some(timer) = self.timers.get_mut(id) {
            timer.clock.set_frame_rate(fps);
        }
    }

    /// Realign a timer's start time so its current time is kept at the
    /// current engine time and speed
    pub(crate) fn reset_time(&mut self, id: TimerId) {
        let engine_rate = self.clock.playback_rate();
        let elapsed = self.clock.elapsed_time;
        if let Some(timer) = self.timers.get_mut(id) {
            let speed = timer.clock.playback_rate() * engine_rate;
            timer.clock.start_time = elapsed - (timer.clock.current_time + timer.delay) / speed;
        }
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Run `callback` once the timer completes and resolve the returned
    /// receiver with its id; both happen immediately if it already has
    pub fn then(
        &mut self,
        id: TimerId,
        callback: impl FnOnce(&Timer) + 'static,
    ) -> oneshot::Receiver<TimerId> {
        let (sender, receiver) = oneshot::channel();
        match self.timers.get_mut(id) {
            Some(timer) if timer.completed => {
                callback(timer);
                let _ = sender.send(id);
            }
            Some(timer) => timer.completions.push(Completion {
                sender: Some(sender),
                callback: Some(Box::new(callback)),
            }),
            None => {}
        }
        receiver
    }

    /// Receiver resolved when the timer completes
    pub fn completion(&mut self, id: TimerId) -> oneshot::Receiver<TimerId> {
        self.then(id, |_| {})
    }

    pub(crate) fn resolve_completions(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        let pending = std::mem::take(&mut timer.completions);
        for completion in pending {
            if let Some(callback) = completion.callback {
                callback(timer);
            }
            if let Some(sender) = completion.sender {
                let _ = sender.send(id);
            }
        }
    }

    /// Invoke a lifecycle callback
    pub(crate) fn fire(&mut self, id: TimerId, event: Event) {
        let Some(timer) = self.timers.get_mut(id) else {
            return;
        };
        let Some(mut callback) = timer.callbacks.slot(event).take() else {
            return;
        };
        callback(timer);
        *timer.callbacks.slot(event) = Some(callback);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.timers.get(id)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.timers.values()
    }

    pub fn tween(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.get(id)
    }

    /// Tweens of an animation, in creation order
    pub fn tweens_of(&self, id: TimerId) -> Vec<&Tween> {
        self.timers
            .get(id)
            .map(|t| t.tweens().iter().filter_map(|tw| self.tweens.get(*tw)).collect())
            .unwrap_or_default()
    }

    /// Top-level timers currently driven by the frame loop
    pub fn running(&self) -> &[TimerId] {
        &self.running
    }

    /// Nothing left for the frame loop to drive
    pub fn is_idle(&self) -> bool {
        self.running.is_empty()
    }

    pub fn registry(&self) -> &CompositionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AnimationParams;
    use crate::Easing;
    use cadence_core::{MemorySink, PropertyKind, TargetId};
    use std::cell::Cell;
    use std::rc::Rc;

    const A: TargetId = TargetId(1);

    fn engine() -> Engine<MemorySink> {
        // style values round in-between numbers to the configured precision
        let sink = MemorySink::new().with(A, "x", PropertyKind::Style, 0.0);
        Engine::new(sink)
    }

    fn linear_x(to: f64) -> AnimationParams {
        AnimationParams::new()
            .prop("x", to)
            .duration(1000.0)
            .ease(Easing::Linear)
    }

    #[test]
    fn test_timer_runs_and_completes() {
        let mut engine = Engine::new(MemorySink::new());
        let done = Rc::new(Cell::new(0));
        let seen = done.clone();
        let id = engine.create_timer(
            TimerParams::new()
                .duration(500.0)
                .on_complete(move |_| seen.set(seen.get() + 1)),
        );
        engine.update(0.0);
        engine.update(250.0);
        assert_eq!(engine.current_time(id), Some(250.0));
        engine.update(600.0);
        assert!(engine.timer(id).unwrap().is_completed());
        assert_eq!(done.get(), 1);
        engine.update(700.0);
        assert!(engine.is_idle());
        assert!(engine.timer(id).unwrap().is_cancelled());
    }

    #[test]
    fn test_autoplay_off_waits_for_play() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0).autoplay(false));
        engine.update(0.0);
        engine.update(500.0);
        assert_eq!(engine.sink().number(A, "x"), Some(0.0));
        engine.play(id);
        engine.update(750.0);
        assert_eq!(engine.sink().number(A, "x"), Some(25.0));
    }

    #[test]
    fn test_pause_and_resume_keep_position() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.update(300.0);
        engine.pause(id);
        engine.update(600.0);
        assert_eq!(engine.sink().number(A, "x"), Some(30.0));
        engine.resume(id);
        engine.update(800.0);
        assert_eq!(engine.current_time(id), Some(500.0));
        assert_eq!(engine.sink().number(A, "x"), Some(50.0));
    }

    #[test]
    fn test_double_reverse_restores_time() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.update(300.0);
        engine.reverse(id);
        assert!(engine.timer(id).unwrap().is_reversed());
        assert_eq!(engine.current_time(id), Some(700.0));
        assert_eq!(engine.sink().number(A, "x"), Some(30.0));
        engine.reverse(id);
        assert_eq!(engine.current_time(id), Some(300.0));
        assert_eq!(engine.sink().number(A, "x"), Some(30.0));
    }

    #[test]
    fn test_reversed_playback_runs_to_start() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.update(300.0);
        engine.reverse(id);
        engine.update(500.0);
        assert_eq!(engine.sink().number(A, "x"), Some(10.0));
        engine.update(700.0);
        assert_eq!(engine.sink().number(A, "x"), Some(0.0));
        assert!(engine.timer(id).unwrap().is_completed());
    }

    #[test]
    fn test_seek_is_idempotent() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0).autoplay(false));
        engine.seek(id, 400.0, false);
        let first = engine.sink().number(A, "x");
        engine.seek(id, 400.0, false);
        assert_eq!(engine.sink().number(A, "x"), first);
        assert_eq!(first, Some(40.0));
        assert_eq!(engine.current_time(id), Some(400.0));
    }

    #[test]
    fn test_then_resolves_on_completion() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let mut receiver = engine.then(id, move |_| flag.set(true));
        engine.update(0.0);
        engine.update(500.0);
        assert!(receiver.try_recv().is_err());
        engine.update(1000.0);
        assert!(called.get());
        assert_eq!(receiver.try_recv().ok(), Some(id));

        // already completed: immediate
        let mut late = engine.completion(id);
        assert_eq!(late.try_recv().ok(), Some(id));
    }

    #[test]
    fn test_revert_restores_initial_values() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.update(600.0);
        engine.revert(id);
        assert_eq!(engine.sink().number(A, "x"), Some(0.0));
        assert!(engine.timer(id).unwrap().is_cancelled());
    }

    #[test]
    fn test_play_after_cancel_rejoins_composition() {
        let mut engine = engine();
        let first = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.update(200.0);
        engine.cancel(first);
        engine.play(first);
        assert!(!engine.timer(first).unwrap().is_cancelled());
        engine.update(300.0);
        assert_eq!(engine.sink().number(A, "x"), Some(30.0));

        // the newer animation truncates the revived one
        let second = engine.animate(&[A], linear_x(-100.0));
        assert_eq!(engine.tweens_of(first)[0].change_duration(), 300.0);
        engine.update(400.0);
        let writes = engine.sink().write_count(A, "x");
        engine.update(500.0);
        engine.update(600.0);
        assert_eq!(engine.sink().write_count(A, "x"), writes + 2);
        assert!(engine.timer(first).unwrap().is_paused());
        assert!(!engine.timer(second).unwrap().is_paused());
    }

    #[test]
    fn test_complete_jumps_to_end() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.complete(id);
        assert_eq!(engine.sink().number(A, "x"), Some(100.0));
        assert!(engine.timer(id).unwrap().is_completed());
    }

    #[test]
    fn test_stretch_scales_duration() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0).autoplay(false));
        engine.stretch(id, 2000.0);
        assert_eq!(engine.timer(id).unwrap().duration(), 2000.0);
        engine.seek(id, 500.0, false);
        assert_eq!(engine.sink().number(A, "x"), Some(25.0));
    }

    #[test]
    fn test_suspend_freezes_time() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        engine.update(0.0);
        engine.update(200.0);
        engine.suspend();
        engine.update(5000.0);
        engine.wake(5000.0);
        engine.update(5100.0);
        assert_eq!(engine.current_time(id), Some(300.0));
    }

    #[test]
    fn test_dispose_removes_everything() {
        let mut engine = engine();
        let id = engine.animate(&[A], linear_x(100.0));
        let mut receiver = engine.completion(id);
        engine.dispose(id);
        assert!(engine.timer(id).is_none());
        assert_eq!(engine.registry().chain_count(), 0);
        assert!(engine.is_idle());
        assert!(receiver.try_recv().is_err());
    }
}
