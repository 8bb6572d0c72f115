//! Configuration surface of the contact assembly.

use serde::{Deserialize, Serialize};

/// Forced contact state on the first iteration of a load step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialContactState {
    /// Decide from the statistics of the initial weighted gap: a gap that is
    /// uniformly zero resolves to `Active`, anything else falls through to
    /// the per-node complementarity classification.
    Auto,
    /// Force all slave nodes active on the first iteration
    Active,
    /// Force all slave nodes inactive on the first iteration
    Inactive,
}

/// Mortar contact assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Use the biorthogonal (dual) basis for the Lagrange multiplier space
    pub dual_basis: bool,
    /// Boundary-modification blend for quadratic slave elements; 0 disables
    pub alpha: f64,
    /// Broad-phase centroid distance cutoff for master candidates
    pub distval: f64,
    /// Flip the averaged slave nodal normals
    pub rotate_normals: bool,
    /// Absolute-value threshold below which compressed sparse entries are dropped
    pub drop_tolerance: f64,
    /// Contact state policy on the first iteration of a load step
    pub contact_state_in_first_iteration: InitialContactState,
    /// 1-based iteration counter, incremented by the external nonlinear solver
    pub iteration: usize,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            dual_basis: true,
            alpha: 0.0,
            distval: f64::INFINITY,
            rotate_normals: false,
            drop_tolerance: 1e-12,
            contact_state_in_first_iteration: InitialContactState::Auto,
            iteration: 1,
        }
    }
}
