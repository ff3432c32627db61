//! Integration tests for the engine's public surface
//!
//! These drive the engine with explicit frame times and check what reaches
//! the property sink:
//! - Timer progress, looping and direction changes
//! - Replace and blend composition between animations
//! - Unit handling and timeline placement

use cadence_animation::{
    AnimationParams, Composition, Easing, Engine, LoopCount, Position, TimelineParams, TimerParams,
};
use cadence_core::{MemorySink, PropertyKind, RawValue, TargetId};
use std::cell::Cell;
use std::rc::Rc;

const A: TargetId = TargetId(1);
const B: TargetId = TargetId(2);

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn sink() -> MemorySink {
    MemorySink::new()
        .with(A, "x", PropertyKind::Style, 0.0)
        .with(A, "y", PropertyKind::Style, 0.0)
        .with(B, "y", PropertyKind::Style, 0.0)
}

fn frames(engine: &mut Engine<MemorySink>, from: f64, until: f64, step: f64) {
    let mut now = from;
    while now <= until {
        engine.update(now);
        now += step;
    }
}

#[test]
fn test_progress_stays_in_bounds_and_hits_one_on_completion() {
    let mut engine = Engine::new(sink());
    let id = engine.create_timer(TimerParams::new().duration(1000.0));
    let mut now = 0.0;
    while now <= 1200.0 {
        engine.update(now);
        let progress = engine.progress(id).unwrap();
        assert!((0.0..=1.0).contains(&progress));
        if engine.timer(id).unwrap().is_completed() {
            assert_eq!(progress, 1.0);
        }
        now += 70.0;
    }
    assert!(engine.timer(id).unwrap().is_completed());
}

#[test]
fn test_reverse_then_advance_returns_to_the_same_time() {
    let mut engine = Engine::new(sink());
    let id = engine.create_timer(TimerParams::new().duration(1000.0));
    engine.update(0.0);
    engine.update(300.0);
    let before = engine.current_time(id).unwrap();
    engine.reverse(id);
    assert!(approx_eq(engine.current_time(id).unwrap(), 1000.0 - before));
    engine.update(400.0);
    engine.reverse(id);
    assert!(approx_eq(engine.current_time(id).unwrap(), 200.0));
    engine.update(500.0);
    assert!(approx_eq(engine.current_time(id).unwrap(), before));
}

#[test]
fn test_muted_seek_twice_renders_the_same_state() {
    let mut engine = Engine::new(sink());
    let updates = Rc::new(Cell::new(0));
    let seen = updates.clone();
    let id = engine.animate(
        &[A],
        AnimationParams::new()
            .prop("x", 100.0)
            .duration(1000.0)
            .ease(Easing::Linear)
            .autoplay(false)
            .on_update(move |_| seen.set(seen.get() + 1)),
    );
    engine.seek(id, 400.0, true);
    let first = engine.sink().number(A, "x");
    engine.seek(id, 400.0, true);
    assert_eq!(engine.sink().number(A, "x"), first);
    assert_eq!(first, Some(40.0));
    assert_eq!(updates.get(), 0);
}

#[test]
fn test_replace_truncates_the_earlier_animation() {
    let mut engine = Engine::new(sink());
    let first = engine.animate(
        &[A],
        AnimationParams::new()
            .prop("x", 100.0)
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    engine.update(0.0);
    engine.update(500.0);
    assert_eq!(engine.sink().number(A, "x"), Some(50.0));

    let second = engine.animate(
        &[A],
        AnimationParams::new()
            .prop("x", 200.0)
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    let truncated = engine.tweens_of(first)[0].change_duration();
    assert!(approx_eq(truncated, 500.0));
    assert_eq!(engine.tweens_of(second)[0].from_number(), 50.0);

    engine.update(1000.0);
    assert_eq!(engine.sink().number(A, "x"), Some(125.0));
}

#[test]
fn test_blend_sums_disjoint_deltas() {
    let mut engine = Engine::new(sink());
    let blend = |engine: &mut Engine<MemorySink>| {
        engine.animate(
            &[A],
            AnimationParams::new()
                .prop("x", "+=50")
                .duration(500.0)
                .ease(Easing::Linear)
                .composition(Composition::Blend),
        )
    };
    let first = blend(&mut engine);
    frames(&mut engine, 0.0, 700.0, 100.0);
    assert!(engine.timer(first).unwrap().is_completed());
    assert_eq!(engine.sink().number(A, "x"), Some(50.0));

    let second = blend(&mut engine);
    frames(&mut engine, 800.0, 1500.0, 100.0);
    assert!(engine.timer(second).unwrap().is_completed());
    assert_eq!(engine.sink().number(A, "x"), Some(100.0));
}

#[test]
fn test_blends_scheduled_together_accumulate() {
    let mut engine = Engine::new(sink());
    let blend = |delay: f64| {
        AnimationParams::new()
            .prop("x", "+=50")
            .duration(500.0)
            .delay(delay)
            .ease(Easing::Linear)
            .composition(Composition::Blend)
    };
    let first = engine.animate(&[A], blend(0.0));
    let second = engine.animate(&[A], blend(600.0));
    assert_eq!(engine.tweens_of(second)[0].from_number(), -50.0);

    frames(&mut engine, 0.0, 300.0, 100.0);
    assert!(approx_eq(engine.sink().number(A, "x").unwrap(), 30.0));
    frames(&mut engine, 400.0, 900.0, 100.0);
    assert!(engine.timer(first).unwrap().is_completed());
    assert!(approx_eq(engine.sink().number(A, "x").unwrap(), 80.0));
    frames(&mut engine, 1000.0, 1300.0, 100.0);
    assert!(engine.timer(second).unwrap().is_completed());
    assert_eq!(engine.sink().number(A, "x"), Some(100.0));
}

#[test]
fn test_loops_fire_loop_and_complete_callbacks() {
    let mut engine = Engine::new(sink());
    let loops = Rc::new(Cell::new(0));
    let completes = Rc::new(Cell::new(0));
    let (l, c) = (loops.clone(), completes.clone());
    let id = engine.create_timer(
        TimerParams::new()
            .duration(1000.0)
            .looped(LoopCount::Count(2))
            .on_loop(move |_| l.set(l.get() + 1))
            .on_complete(move |_| c.set(c.get() + 1)),
    );
    frames(&mut engine, 0.0, 3200.0, 100.0);
    assert_eq!(loops.get(), 2);
    assert_eq!(completes.get(), 1);
    assert_eq!(engine.current_time(id), Some(3000.0));
}

#[test]
fn test_unit_values_interpolate_with_their_unit() {
    let sink = MemorySink::new().with(A, "width", PropertyKind::Style, "10px");
    let mut engine = Engine::new(sink);
    engine.animate(
        &[A],
        AnimationParams::new()
            .prop("width", "20px")
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    engine.update(0.0);
    engine.update(500.0);
    assert_eq!(engine.sink().get(A, "width"), Some(&RawValue::from("15px")));
}

#[test]
fn test_from_to_animation_end_to_end() {
    let mut engine = Engine::new(sink());
    let id = engine.animate(
        &[A],
        AnimationParams::new()
            .prop("x", [0.0, 100.0])
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    engine.update(0.0);
    engine.update(250.0);
    assert_eq!(engine.sink().number(A, "x"), Some(25.0));
    engine.update(1000.0);
    assert_eq!(engine.sink().number(A, "x"), Some(100.0));
    assert!(engine.timer(id).unwrap().is_completed());
}

#[test]
fn test_timeline_children_share_a_start() {
    let mut engine = Engine::new(sink());
    let tl = engine.create_timeline(TimelineParams::new());
    let a = engine
        .timeline_add(tl, &[A], AnimationParams::new().prop("x", 100.0), 0.0)
        .unwrap();
    let b = engine
        .timeline_add(
            tl,
            &[B],
            AnimationParams::new().prop("y", 100.0),
            "<".parse::<Position>().unwrap(),
        )
        .unwrap();
    assert_eq!(engine.timer(a).unwrap().offset(), 0.0);
    assert_eq!(engine.timer(b).unwrap().offset(), 0.0);

    frames(&mut engine, 0.0, 1100.0, 100.0);
    assert_eq!(engine.sink().number(A, "x"), Some(100.0));
    assert_eq!(engine.sink().number(B, "y"), Some(100.0));
    assert!(engine.timer(tl).unwrap().is_completed());
}
