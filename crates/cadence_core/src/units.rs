//! Unit conversion
//!
//! Angles and absolute lengths convert with fixed factors. Anything else
//! (`em`, `%`, viewport units) is measured through the sink and the factor is
//! memoized per unit pair.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::target::{PropertySink, TargetId};

const ANGLE_UNITS: &[(&str, f64)] = &[
    ("deg", 1.0),
    ("rad", 180.0 / std::f64::consts::PI),
    ("turn", 360.0),
    ("grad", 0.9),
];

const LENGTH_UNITS: &[(&str, f64)] = &[
    ("px", 1.0),
    ("in", 96.0),
    ("cm", 96.0 / 2.54),
    ("mm", 96.0 / 25.4),
    ("pt", 96.0 / 72.0),
    ("pc", 16.0),
];

fn factor(table: &[(&str, f64)], unit: &str) -> Option<f64> {
    table.iter().find(|(u, _)| *u == unit).map(|(_, f)| *f)
}

/// Converts numbers between units, caching measured factors
#[derive(Debug, Default)]
pub struct UnitConverter {
    cache: FxHashMap<(String, String), f64>,
}

impl UnitConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `value` expressed in `from` into `to`
    ///
    /// Returns `value` unchanged when no factor can be determined.
    pub fn convert<S: PropertySink + ?Sized>(
        &mut self,
        sink: &S,
        target: TargetId,
        property: &str,
        value: f64,
        from: &str,
        to: &str,
    ) -> f64 {
        if from == to || from.is_empty() || to.is_empty() {
            return value;
        }
        for table in [ANGLE_UNITS, LENGTH_UNITS] {
            if let (Some(f), Some(t)) = (factor(table, from), factor(table, to)) {
                return value * f / t;
            }
        }

        let key = (from.to_string(), to.to_string());
        if let Some(ratio) = self.cache.get(&key) {
            return value * ratio;
        }

        let px_per = |unit: &str| {
            factor(LENGTH_UNITS, unit).or_else(|| sink.measure_unit(target, property, unit))
        };
        match (px_per(from), px_per(to)) {
            (Some(f), Some(t)) if t != 0.0 => {
                let ratio = f / t;
                self.cache.insert(key, ratio);
                value * ratio
            }
            _ => {
                warn!(%target, property, from, to, "no conversion factor between units");
                value
            }
        }
    }

    /// Number of memoized unit pairs
    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }
}
