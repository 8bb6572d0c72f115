//! Per-node field storage indexed by field kind and time.
//!
//! Each field holds one `Vector3` value per element node. Values are stored
//! as a time series; lookups return the latest sample at or before the
//! requested time, so a field set once at t = 0 stays visible for the whole
//! analysis unless a later sample overrides it.

use nalgebra::Vector3;
use std::collections::HashMap;

/// Nodal field kinds known to the contact kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Reference (undeformed) nodal coordinates
    Geometry,
    /// Nodal displacement
    Displacement,
    /// Nodal surface normal
    Normal,
    /// Nodal reaction force (Lagrange multiplier)
    ReactionForce,
}

/// Time-indexed storage of per-node vector fields
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    series: HashMap<FieldKind, Vec<(f64, Vec<Vector3<f64>>)>>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
        }
    }

    /// Insert a field sample at the given time, replacing an existing sample
    /// at the same time
    pub fn insert(&mut self, kind: FieldKind, time: f64, values: Vec<Vector3<f64>>) {
        let samples = self.series.entry(kind).or_default();
        match samples.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(pos) => samples[pos] = (time, values),
            Err(pos) => samples.insert(pos, (time, values)),
        }
    }

    /// Latest sample at or before `time`, if any
    pub fn at(&self, kind: FieldKind, time: f64) -> Option<&[Vector3<f64>]> {
        let samples = self.series.get(&kind)?;
        samples
            .iter()
            .rev()
            .find(|(t, _)| *t <= time)
            .map(|(_, values)| values.as_slice())
    }

    /// Whether any sample exists for this kind
    pub fn contains(&self, kind: FieldKind) -> bool {
        self.series.contains_key(&kind)
    }
}
