//! A single scheduled change of one property on one target

use smallvec::SmallVec;

use cadence_core::{Decomposed, PropertyKind, RawValue, TargetId, ValueKind};

use crate::config::Composition;
use crate::easing::Easing;
use crate::math::{clamp, lerp, round, round_to, MIN_VALUE};
use crate::params::{Modifier, ValueFn};
use crate::timer::{TimerId, TweenId};

pub(crate) type Numbers = SmallVec<[f64; 4]>;

/// Interpolation of one property between a decomposed `from` and `to`
///
/// Times are local to the owning animation's iteration:
///
/// - `start_time` is where the change begins, including its delay
/// - `update_duration` is the nominal length of the change
/// - `change_duration` is the part that still renders once a later tween
///   truncated it
#[derive(Clone)]
pub struct Tween {
    pub(crate) id: TweenId,
    pub(crate) parent: TimerId,
    pub(crate) target: TargetId,
    pub(crate) property: String,
    pub(crate) kind: PropertyKind,
    pub(crate) value_kind: ValueKind,
    pub(crate) ease: Easing,
    pub(crate) modifier: Option<Modifier>,
    /// Function `to` value and the target's index and count, re-evaluated on refresh
    pub(crate) to_fn: Option<(ValueFn, usize, usize)>,

    pub(crate) from_number: f64,
    pub(crate) to_number: f64,
    pub(crate) from_numbers: Numbers,
    pub(crate) to_numbers: Numbers,
    pub(crate) strings: Vec<String>,
    pub(crate) unit: Option<String>,

    /// Last interpolated number(s), kept for blending
    pub(crate) number: f64,
    pub(crate) numbers: Numbers,
    /// Last composed value
    pub(crate) value: Option<RawValue>,

    pub(crate) current_time: f64,
    pub(crate) start_time: f64,
    pub(crate) delay: f64,
    pub(crate) update_duration: f64,
    pub(crate) change_duration: f64,
    pub(crate) absolute_start_time: f64,

    pub(crate) composition: Composition,
    pub(crate) overlapped: bool,
    pub(crate) overridden: bool,
    pub(crate) is_carrier: bool,
    /// Decomposed endpoints before blending rewrote them
    pub(crate) base_from_number: f64,
    pub(crate) base_from_numbers: Numbers,
    pub(crate) base_to_number: f64,
    pub(crate) base_to_numbers: Numbers,

    pub(crate) prev_rep: Option<TweenId>,
    pub(crate) next_rep: Option<TweenId>,
    pub(crate) prev_add: Option<TweenId>,
    pub(crate) next_add: Option<TweenId>,
}

impl Tween {
    /// A zero-length, unscheduled replace tween between two decomposed values
    pub(crate) fn new(
        parent: TimerId,
        target: TargetId,
        property: String,
        kind: PropertyKind,
        from: &Decomposed,
        to: Decomposed,
    ) -> Self {
        let mut tween = Self {
            id: TweenId::default(),
            parent,
            target,
            property,
            kind,
            value_kind: to.kind,
            ease: Easing::Linear,
            modifier: None,
            to_fn: None,
            from_number: from.number,
            to_number: to.number,
            from_numbers: from.numbers.clone(),
            to_numbers: to.numbers,
            strings: to.strings,
            unit: to.unit,
            number: from.number,
            numbers: from.numbers.clone(),
            value: None,
            current_time: 0.0,
            start_time: 0.0,
            delay: 0.0,
            update_duration: MIN_VALUE,
            change_duration: MIN_VALUE,
            absolute_start_time: 0.0,
            composition: Composition::Replace,
            overlapped: false,
            overridden: false,
            is_carrier: false,
            base_from_number: 0.0,
            base_from_numbers: Numbers::new(),
            base_to_number: 0.0,
            base_to_numbers: Numbers::new(),
            prev_rep: None,
            next_rep: None,
            prev_add: None,
            next_add: None,
        };
        tween.store_endpoints();
        tween
    }

    /// The `to` side as a decomposed value, before any blending rewrote it
    pub(crate) fn decomposed_to(&self) -> Decomposed {
        Decomposed {
            kind: self.value_kind,
            number: self.base_to_number,
            unit: self.unit.clone(),
            numbers: self.base_to_numbers.clone(),
            strings: self.strings.clone(),
            ..Decomposed::default()
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn parent(&self) -> TimerId {
        self.parent
    }

    pub fn composition(&self) -> Composition {
        self.composition
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn from_number(&self) -> f64 {
        self.from_number
    }

    pub fn to_number(&self) -> f64 {
        self.to_number
    }

    pub fn from_numbers(&self) -> &[f64] {
        &self.from_numbers
    }

    pub fn to_numbers(&self) -> &[f64] {
        &self.to_numbers
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn update_duration(&self) -> f64 {
        self.update_duration
    }

    pub fn change_duration(&self) -> f64 {
        self.change_duration
    }

    pub fn absolute_start_time(&self) -> f64 {
        self.absolute_start_time
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Cut short by a later tween
    pub fn is_overlapped(&self) -> bool {
        self.overlapped
    }

    /// Fully replaced by a later tween; never renders again
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    pub fn is_carrier(&self) -> bool {
        self.is_carrier
    }

    pub fn value(&self) -> Option<&RawValue> {
        self.value.as_ref()
    }

    /// Absolute time at which the (possibly truncated) change ends
    pub(crate) fn absolute_end_time(&self) -> f64 {
        self.absolute_start_time + self.change_duration
    }

    /// Freeze at the last rendered value and stop rendering
    pub(crate) fn mark_overridden(&mut self) {
        self.overlapped = true;
        self.overridden = true;
        self.change_duration = MIN_VALUE;
        self.current_time = MIN_VALUE;
    }

    /// Restore the state a fresh composition starts from
    pub(crate) fn reset_composition(&mut self) {
        self.overlapped = false;
        self.overridden = false;
        self.change_duration = self.update_duration;
        self.prev_rep = None;
        self.next_rep = None;
        self.prev_add = None;
        self.next_add = None;
        if self.composition == Composition::Blend {
            self.restore_endpoints();
        }
    }

    /// Record the decomposed endpoints as the base blending starts from
    pub(crate) fn store_endpoints(&mut self) {
        self.base_from_number = self.from_number;
        self.base_from_numbers = self.from_numbers.clone();
        self.base_to_number = self.to_number;
        self.base_to_numbers = self.to_numbers.clone();
    }

    fn restore_endpoints(&mut self) {
        self.from_number = self.base_from_number;
        self.from_numbers = self.base_from_numbers.clone();
        self.to_number = self.base_to_number;
        self.to_numbers = self.base_to_numbers.clone();
    }

    fn modify(&self, n: f64) -> f64 {
        match &self.modifier {
            Some(f) => f(n),
            None => n,
        }
    }

    /// Interpolate at eased `progress`
    ///
    /// `precision` is `None` to keep full precision. Composed tweens keep
    /// their interpolated numbers for blending.
    pub(crate) fn interpolate(&mut self, progress: f64, precision: Option<i32>) -> Decomposed {
        let mut out = Decomposed {
            kind: self.value_kind,
            unit: self.unit.clone(),
            ..Decomposed::default()
        };

        match self.value_kind {
            ValueKind::Number | ValueKind::Unit => {
                out.number = self.modify(round(
                    lerp(self.from_number, self.to_number, progress),
                    precision,
                ));
            }
            ValueKind::Color => {
                let channel = |i: usize| {
                    let from = self.from_numbers.get(i).copied().unwrap_or(0.0);
                    let to = self.to_numbers.get(i).copied().unwrap_or(from);
                    lerp(from, to, progress)
                };
                if self.composition == Composition::Blend {
                    // blended channels are signed deltas
                    for i in 0..4 {
                        out.numbers
                            .push(self.modify(round(channel(i), precision)));
                    }
                } else {
                    for i in 0..3 {
                        out.numbers
                            .push(round_to(clamp(self.modify(channel(i)), 0.0, 255.0), 0));
                    }
                    out.numbers
                        .push(clamp(self.modify(round(channel(3), precision)), 0.0, 1.0));
                }
            }
            ValueKind::Complex => {
                out.strings = self.strings.clone();
                for (i, from) in self.from_numbers.iter().enumerate() {
                    let to = self.to_numbers.get(i).copied().unwrap_or(*from);
                    out.numbers
                        .push(self.modify(round(lerp(*from, to, progress), precision)));
                }
            }
        }

        if self.composition != Composition::None {
            self.number = out.number;
            self.numbers = out.numbers.clone();
        }
        out
    }
}

impl std::fmt::Debug for Tween {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tween")
            .field("target", &self.target)
            .field("property", &self.property)
            .field("from", &self.from_number)
            .field("to", &self.to_number)
            .field("start_time", &self.start_time)
            .field("change_duration", &self.change_duration)
            .field("absolute_start_time", &self.absolute_start_time)
            .field("composition", &self.composition)
            .field("overridden", &self.overridden)
            .finish()
    }
}
