//! Animation targets and the property sink boundary
//!
//! The engine never touches host objects directly. Every read and write goes
//! through a [`PropertySink`], which also decides how a property is accessed
//! (plain field, attribute, style channel, transform channel, custom variable).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::value::RawValue;

/// Opaque handle to a host object that can be animated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u64);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a property is reached on its target
///
/// Resolved once when a tween is created and cached on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Direct numeric field; in-between values are never rounded
    Field,
    /// Attribute stored as text
    Attribute,
    /// Styled property channel
    Style,
    /// One channel of a transform list
    Transform,
    /// Custom variable
    CustomVar,
}

/// Read/write access to animated properties
pub trait PropertySink {
    /// Resolve the access kind for a property, or `None` if the target has no such property
    fn resolve(&self, target: TargetId, property: &str) -> Option<PropertyKind>;

    /// Read the current live value
    fn read(&self, target: TargetId, property: &str, kind: PropertyKind) -> Option<RawValue>;

    /// Write a composed value
    fn write(&mut self, target: TargetId, property: &str, kind: PropertyKind, value: RawValue);

    /// Number of pixels in one `unit` for this property, used for length conversions
    /// that have no fixed factor (`em`, `%`, `vw`, ...).
    fn measure_unit(&self, _target: TargetId, _property: &str, _unit: &str) -> Option<f64> {
        None
    }
}

#[derive(Clone, Debug)]
struct Slot {
    kind: PropertyKind,
    value: RawValue,
    writes: u32,
}

/// In-memory sink
///
/// Properties must be declared with [`MemorySink::insert`] before they can be
/// animated; undeclared properties resolve to `None`.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    targets: FxHashMap<TargetId, FxHashMap<String, Slot>>,
    unit_scales: FxHashMap<String, f64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property with its initial value
    pub fn insert(
        &mut self,
        target: TargetId,
        property: impl Into<String>,
        kind: PropertyKind,
        value: impl Into<RawValue>,
    ) {
        self.targets.entry(target).or_default().insert(
            property.into(),
            Slot {
                kind,
                value: value.into(),
                writes: 0,
            },
        );
    }

    /// Builder form of [`MemorySink::insert`]
    pub fn with(
        mut self,
        target: TargetId,
        property: impl Into<String>,
        kind: PropertyKind,
        value: impl Into<RawValue>,
    ) -> Self {
        self.insert(target, property, kind, value);
        self
    }

    /// Pixels per `unit`, reported through [`PropertySink::measure_unit`] for every target
    pub fn set_unit_scale(&mut self, unit: impl Into<String>, px: f64) {
        self.unit_scales.insert(unit.into(), px);
    }

    pub fn get(&self, target: TargetId, property: &str) -> Option<&RawValue> {
        self.targets
            .get(&target)
            .and_then(|props| props.get(property))
            .map(|slot| &slot.value)
    }

    /// Current value as a number, if it is one
    pub fn number(&self, target: TargetId, property: &str) -> Option<f64> {
        self.get(target, property).and_then(RawValue::as_number)
    }

    /// How many times the engine wrote this property
    pub fn write_count(&self, target: TargetId, property: &str) -> u32 {
        self.targets
            .get(&target)
            .and_then(|props| props.get(property))
            .map_or(0, |slot| slot.writes)
    }

    /// All declared targets in ascending order
    pub fn targets(&self) -> Vec<TargetId> {
        let mut ids: Vec<_> = self.targets.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Declared properties of a target, sorted by name
    pub fn properties(&self, target: TargetId) -> Vec<(&str, &RawValue)> {
        let mut props: Vec<_> = self
            .targets
            .get(&target)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, slot)| (name.as_str(), &slot.value))
                    .collect()
            })
            .unwrap_or_default();
        props.sort_by(|a, b| a.0.cmp(b.0));
        props
    }
}

impl PropertySink for MemorySink {
    fn resolve(&self, target: TargetId, property: &str) -> Option<PropertyKind> {
        self.targets.get(&target)?.get(property).map(|slot| slot.kind)
    }

    fn read(&self, target: TargetId, property: &str, _kind: PropertyKind) -> Option<RawValue> {
        self.get(target, property).cloned()
    }

    fn write(&mut self, target: TargetId, property: &str, kind: PropertyKind, value: RawValue) {
        let props = self.targets.entry(target).or_default();
        match props.get_mut(property) {
            Some(slot) => {
                slot.value = value;
                slot.writes += 1;
            }
            None => {
                props.insert(
                    property.to_string(),
                    Slot {
                        kind,
                        value,
                        writes: 1,
                    },
                );
            }
        }
    }

    fn measure_unit(&self, _target: TargetId, _property: &str, unit: &str) -> Option<f64> {
        self.unit_scales.get(unit).copied()
    }
}
