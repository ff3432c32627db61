//! Override and blend bookkeeping per target property
//!
//! Every composed tween joins one chain keyed by `(target, property)`:
//!
//! - **Replace** chains are ordered by absolute start time. Inserting a tween
//!   truncates the tween before it, or overrides it entirely, so only one
//!   tween drives the property at any time.
//! - **Blend** chains are ordered by insertion. Each chain has a synthetic
//!   carrier tween that sums every member's current delta and is the only
//!   writer of the property.
//!
//! Links live on the tweens themselves (`prev_rep`/`next_rep` and
//! `prev_add`/`next_add`); the registry only keeps heads and tails.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use tracing::debug;

use cadence_core::{TargetId, ValueKind};

use crate::config::Composition;
use crate::math::{round_to, MIN_VALUE};
use crate::timer::{is_ancestor, Timer, TimerId, TweenId};
use crate::tween::Tween;

type Key = (TargetId, String);

#[derive(Clone, Copy, Debug, Default)]
struct Chain {
    head: Option<TweenId>,
    tail: Option<TweenId>,
}

#[derive(Clone, Copy, Debug)]
struct BlendChain {
    carrier: TweenId,
    chain: Chain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Rep,
    Add,
}

impl Link {
    fn prev(self, tween: &Tween) -> Option<TweenId> {
        match self {
            Link::Rep => tween.prev_rep,
            Link::Add => tween.prev_add,
        }
    }

    fn next(self, tween: &Tween) -> Option<TweenId> {
        match self {
            Link::Rep => tween.next_rep,
            Link::Add => tween.next_add,
        }
    }

    fn set_prev(self, tween: &mut Tween, prev: Option<TweenId>) {
        match self {
            Link::Rep => tween.prev_rep = prev,
            Link::Add => tween.prev_add = prev,
        }
    }

    fn set_next(self, tween: &mut Tween, next: Option<TweenId>) {
        match self {
            Link::Rep => tween.next_rep = next,
            Link::Add => tween.next_add = next,
        }
    }
}

impl Chain {
    /// Insert `id` right after `prev`, or at the head when `prev` is `None`
    fn insert_after(
        &mut self,
        link: Link,
        tweens: &mut SlotMap<TweenId, Tween>,
        prev: Option<TweenId>,
        id: TweenId,
    ) {
        let next = match prev {
            Some(p) => tweens.get(p).and_then(|t| link.next(t)),
            None => self.head,
        };
        if let Some(tween) = tweens.get_mut(id) {
            link.set_prev(tween, prev);
            link.set_next(tween, next);
        }
        match prev.and_then(|p| tweens.get_mut(p)) {
            Some(p) => link.set_next(p, Some(id)),
            None => self.head = Some(id),
        }
        match next.and_then(|n| tweens.get_mut(n)) {
            Some(n) => link.set_prev(n, Some(id)),
            None => self.tail = Some(id),
        }
    }

    fn contains(&self, link: Link, tween: &Tween) -> bool {
        self.head == Some(tween.id) || link.prev(tween).is_some() || link.next(tween).is_some()
    }

    fn unlink(&mut self, link: Link, tweens: &mut SlotMap<TweenId, Tween>, id: TweenId) {
        let Some(tween) = tweens.get(id) else {
            return;
        };
        let (prev, next) = (link.prev(tween), link.next(tween));
        match prev.and_then(|p| tweens.get_mut(p)) {
            Some(p) => link.set_next(p, next),
            None => {
                if self.head == Some(id) {
                    self.head = next;
                }
            }
        }
        match next.and_then(|n| tweens.get_mut(n)) {
            Some(n) => link.set_prev(n, prev),
            None => {
                if self.tail == Some(id) {
                    self.tail = prev;
                }
            }
        }
        if let Some(tween) = tweens.get_mut(id) {
            link.set_prev(tween, None);
            link.set_next(tween, None);
        }
    }
}

/// Per `(target, property)` chains of composed tweens
#[derive(Debug, Default)]
pub struct CompositionRegistry {
    replace: FxHashMap<Key, Chain>,
    blend: FxHashMap<Key, BlendChain>,
}

impl CompositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// First tween of the replace chain for a property
    pub fn replace_head(&self, target: TargetId, property: &str) -> Option<TweenId> {
        self.replace
            .get(&(target, property.to_string()))
            .and_then(|c| c.head)
    }

    /// Carrier tween summing the blend chain of a property
    pub fn carrier(&self, target: TargetId, property: &str) -> Option<TweenId> {
        self.blend
            .get(&(target, property.to_string()))
            .map(|b| b.carrier)
    }

    /// Tweens of a replace chain in order
    pub fn replace_chain(
        &self,
        tweens: &SlotMap<TweenId, Tween>,
        target: TargetId,
        property: &str,
    ) -> Vec<TweenId> {
        let mut out = Vec::new();
        let mut cursor = self.replace_head(target, property);
        while let Some(id) = cursor {
            out.push(id);
            cursor = tweens.get(id).and_then(|t| t.next_rep);
        }
        out
    }

    pub fn chain_count(&self) -> usize {
        self.replace.len() + self.blend.len()
    }

    /// Register a tween according to its composition mode
    ///
    /// Returns the timer (animation or timeline) left with no active tween
    /// by this insertion; the caller pauses it as completed.
    pub(crate) fn compose(
        &mut self,
        id: TweenId,
        tweens: &mut SlotMap<TweenId, Tween>,
        timers: &SlotMap<TimerId, Timer>,
    ) -> Option<TimerId> {
        let composition = tweens.get(id)?.composition;
        match composition {
            Composition::Replace => self.compose_replace(id, tweens, timers),
            Composition::Blend => {
                self.compose_blend(id, tweens);
                None
            }
            Composition::None => None,
        }
    }

    fn compose_replace(
        &mut self,
        id: TweenId,
        tweens: &mut SlotMap<TweenId, Tween>,
        timers: &SlotMap<TimerId, Timer>,
    ) -> Option<TimerId> {
        let tween = tweens.get(id)?;
        let key = (tween.target, tween.property.clone());
        let abs_start = tween.absolute_start_time;
        let parent = tween.parent;
        let delay = tween.delay;

        let chain = self.replace.entry(key).or_default();
        let mut prev = chain.tail;
        while let Some(p) = prev.and_then(|p| tweens.get(p)) {
            if p.overridden || p.absolute_start_time > abs_start {
                prev = p.prev_rep;
            } else {
                break;
            }
        }
        chain.insert_after(Link::Rep, tweens, prev, id);

        let prev_id = prev?;
        let (prev_parent, prev_abs_end) = {
            let p = tweens.get(prev_id)?;
            (p.parent, p.absolute_end_time())
        };

        // A looping animation would come back over the new tween
        if let Some(looped) = timers.get(prev_parent) {
            let loops_back = looped.iteration_count > 1.0
                && prev_abs_end + (looped.duration - looped.iteration_duration) > abs_start;
            if prev_parent != parent && loops_back {
                let mut cursor = Some(prev_id);
                while let Some(t) = cursor.and_then(|c| tweens.get_mut(c)) {
                    if t.parent != prev_parent {
                        break;
                    }
                    t.mark_overridden();
                    cursor = t.prev_rep;
                }
                debug!(?prev_parent, "looping tweens overridden");
            }
        }

        let abs_update_start = abs_start - delay;
        if prev_abs_end > abs_update_start {
            if let Some(p) = tweens.get_mut(prev_id) {
                let timeline_offset = prev_abs_end - (p.start_time + p.update_duration);
                let change = round_to(abs_update_start - timeline_offset - p.start_time, 12);
                p.change_duration = change;
                p.current_time = change;
                p.overlapped = true;
                if change < MIN_VALUE {
                    p.mark_overridden();
                }
                debug!(property = %p.property, change, "tween truncated");
            }
        }

        if prev_parent == parent {
            return None;
        }
        let overlapped = |timer: &Timer| {
            timer
                .tweens()
                .iter()
                .all(|t| tweens.get(*t).map_or(true, |t| t.overlapped))
        };
        let prev_timer = timers.get(prev_parent)?;
        if !overlapped(prev_timer) {
            return None;
        }
        match prev_timer.parent {
            None => Some(prev_parent),
            Some(timeline_id) => {
                let timeline = timers.get(timeline_id)?;
                let others_overlapped = timeline
                    .children()
                    .iter()
                    .filter(|c| **c != prev_parent)
                    .filter_map(|c| timers.get(*c))
                    .all(overlapped);
                if others_overlapped && !is_ancestor(timers, timeline_id, parent) {
                    Some(timeline_id)
                } else {
                    None
                }
            }
        }
    }

    fn compose_blend(&mut self, id: TweenId, tweens: &mut SlotMap<TweenId, Tween>) {
        let Some(tween) = tweens.get(id) else {
            return;
        };
        let key = (tween.target, tween.property.clone());

        if !self.blend.contains_key(&key) {
            let mut carrier = tween.clone();
            carrier.composition = Composition::Replace;
            carrier.update_duration = MIN_VALUE;
            carrier.change_duration = MIN_VALUE;
            carrier.start_time = 0.0;
            carrier.delay = 0.0;
            carrier.numbers = carrier.from_numbers.clone();
            carrier.number = 0.0;
            carrier.modifier = None;
            carrier.to_fn = None;
            carrier.is_carrier = true;
            carrier.prev_rep = None;
            carrier.next_rep = None;
            carrier.prev_add = None;
            carrier.next_add = None;
            let carrier_id = tweens.insert_with_key(|k| {
                carrier.id = k;
                carrier
            });
            debug!(target_id = %key.0, property = %key.1, "blend carrier created");
            self.blend.insert(
                key.clone(),
                BlendChain {
                    carrier: carrier_id,
                    chain: Chain::default(),
                },
            );
        }

        let Some(blend) = self.blend.get_mut(&key) else {
            return;
        };
        let Some(carrier) = tweens.get(blend.carrier).cloned() else {
            return;
        };
        let Some(tween) = tweens.get_mut(id) else {
            return;
        };

        let to = tween.to_number;
        tween.from_number = carrier.from_number - to;
        tween.to_number = 0.0;
        tween.number = tween.from_number;
        let multi = matches!(tween.value_kind, ValueKind::Color | ValueKind::Complex);
        let to_numbers = tween.to_numbers.clone();
        if multi {
            for (i, value) in to_numbers.iter().enumerate() {
                let base = carrier.from_numbers.get(i).copied().unwrap_or(0.0);
                if let Some(from) = tween.from_numbers.get_mut(i) {
                    *from = base - value;
                }
                if let Some(to) = tween.to_numbers.get_mut(i) {
                    *to = 0.0;
                }
            }
            tween.numbers = tween.from_numbers.clone();
        }

        if let Some(carrier) = tweens.get_mut(blend.carrier) {
            carrier.from_number = to;
            if multi {
                carrier.from_numbers = to_numbers;
            }
        }
        let tail = blend.chain.tail;
        blend.chain.insert_after(Link::Add, tweens, tail, id);
    }

    /// Detach a tween from whichever chain holds it
    ///
    /// A blend chain left with only its carrier drops the carrier too.
    pub(crate) fn remove(&mut self, id: TweenId, tweens: &mut SlotMap<TweenId, Tween>) {
        let Some(tween) = tweens.get(id) else {
            return;
        };
        let key = (tween.target, tween.property.clone());
        let composition = tween.composition;
        match composition {
            Composition::Replace => {
                let Some(chain) = self.replace.get_mut(&key) else {
                    return;
                };
                if !tweens.get(id).is_some_and(|t| chain.contains(Link::Rep, t)) {
                    return;
                }
                chain.unlink(Link::Rep, tweens, id);
                if chain.head.is_none() {
                    self.replace.remove(&key);
                }
            }
            Composition::Blend => {
                let Some(blend) = self.blend.get_mut(&key) else {
                    return;
                };
                if !tweens.get(id).is_some_and(|t| blend.chain.contains(Link::Add, t)) {
                    return;
                }
                blend.chain.unlink(Link::Add, tweens, id);
                if blend.chain.head.is_none() {
                    tweens.remove(blend.carrier);
                    self.blend.remove(&key);
                    debug!(target_id = %key.0, property = %key.1, "blend carrier dropped");
                }
            }
            Composition::None => {}
        }
    }

    /// Sum every blend chain into its carrier; returns the carriers to render
    pub(crate) fn sum_blends(&self, tweens: &mut SlotMap<TweenId, Tween>) -> Vec<TweenId> {
        let mut carriers = Vec::with_capacity(self.blend.len());
        for blend in self.blend.values() {
            let Some(carrier) = tweens.get(blend.carrier) else {
                continue;
            };
            let multi = matches!(carrier.value_kind, ValueKind::Color | ValueKind::Complex);
            let mut total = carrier.from_number;
            let mut totals = carrier.from_numbers.clone();
            let mut cursor = blend.chain.tail;
            while let Some(tween) = cursor.and_then(|c| tweens.get(c)) {
                if multi {
                    for (sum, n) in totals.iter_mut().zip(tween.numbers.iter()) {
                        *sum += n;
                    }
                } else {
                    total += tween.number;
                }
                cursor = tween.prev_add;
            }
            if let Some(carrier) = tweens.get_mut(blend.carrier) {
                carrier.to_number = total;
                carrier.to_numbers = totals;
            }
            carriers.push(blend.carrier);
        }
        carriers
    }
}
