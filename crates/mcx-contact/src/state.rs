//! Global contact state machine.
//!
//! Runs once per assembly call, strictly after every element pair has been
//! integrated. Classifies each slave node from its complementarity value,
//! applies the first-iteration policy, and post-processes the compressed
//! operators: inactive nodes lose their constraint rows entirely, and
//! active (slipping) nodes trade their tangential mortar rows for direct
//! frictionless-slip kinematic rows in D.

use crate::config::{ContactConfig, InitialContactState};
use crate::geometry::create_orthogonal_basis;
use crate::sparse::{MortarAssembly, csr_from_triplets};
use log::{debug, info};
use nalgebra::{DVector, Vector3};
use nalgebra_sparse::CsrMatrix;
use std::collections::{BTreeMap, HashSet};

/// Discrete contact state of one slave node. Exactly one variant holds at a
/// time; friction is not modeled, so active nodes always resolve to slip
/// and `ActiveStick` is never produced by the current classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    Inactive,
    ActiveSlip,
    ActiveStick,
}

impl ContactState {
    pub fn is_active(self) -> bool {
        matches!(self, ContactState::ActiveSlip | ContactState::ActiveStick)
    }
}

/// Per-node classification record, recomputed from scratch every assembly
#[derive(Debug, Clone)]
pub struct NodeContactState {
    /// Mortar-weighted gap in the node-local (normal, tangent, tangent) frame
    pub weighted_gap: Vector3<f64>,
    /// Reaction force projected onto the local frame; zero when no reaction
    /// forces are available yet
    pub contact_pressure: Vector3<f64>,
    /// contact_pressure - weighted_gap
    pub complementarity: Vector3<f64>,
    pub state: ContactState,
}

/// Summary of one assembly call
#[derive(Debug, Clone, Default)]
pub struct InterfaceStatistics {
    pub num_slave_elements: usize,
    pub num_segments: usize,
    pub total_contact_area: f64,
    pub num_active_nodes: usize,
    pub num_inactive_nodes: usize,
}

/// Assembled and post-processed contact constraint operators
#[derive(Debug, Clone)]
pub struct AssembledInterface {
    /// Coupling operator in the global xyz frame
    pub c1: CsrMatrix<f64>,
    /// Coupling operator rotated into the node-local frames
    pub c2: CsrMatrix<f64>,
    /// Direct constraint operator (frictionless-slip tangent rows)
    pub d: CsrMatrix<f64>,
    /// Weighted gap per global DOF, local frame
    pub g: DVector<f64>,
    /// Complementarity value per global DOF
    pub c: DVector<f64>,
    pub node_states: BTreeMap<usize, NodeContactState>,
    pub statistics: InterfaceStatistics,
}

/// Initial contact state after resolving the `Auto` policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedState {
    Active,
    Inactive,
    Unknown,
}

fn resolve_initial_state(
    policy: InitialContactState,
    gaps: &[f64],
) -> ResolvedState {
    match policy {
        InitialContactState::Active => ResolvedState::Active,
        InitialContactState::Inactive => ResolvedState::Inactive,
        InitialContactState::Auto => {
            if gaps.is_empty() {
                return ResolvedState::Unknown;
            }
            let n = gaps.len() as f64;
            let mean = gaps.iter().sum::<f64>() / n;
            let std = if gaps.len() > 1 {
                let var = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / (n - 1.0);
                var.sqrt()
            } else {
                0.0
            };
            let resolved = if mean.abs() < 1e-12 && std.abs() < 1e-12 {
                ResolvedState::Active
            } else {
                ResolvedState::Unknown
            };
            info!(
                "initial weighted gap: mean = {mean:.3e}, std = {std:.3e}, resolved state = {resolved:?}"
            );
            resolved
        }
    }
}

fn filter_rows(
    matrix: &CsrMatrix<f64>,
    removed: &HashSet<usize>,
) -> Vec<(usize, usize, f64)> {
    matrix
        .triplet_iter()
        .filter(|(row, _, _)| !removed.contains(row))
        .map(|(row, col, &value)| (row, col, value))
        .collect()
}

/// Classify every slave node and post-process the accumulated operators.
pub(crate) fn apply_contact_state(
    assembly: MortarAssembly,
    normals: &BTreeMap<usize, Vector3<f64>>,
    reaction_forces: Option<&DVector<f64>>,
    config: &ContactConfig,
    inv_te: Option<&CsrMatrix<f64>>,
    mut statistics: InterfaceStatistics,
) -> AssembledInterface {
    let num_dofs = assembly.num_dofs();
    let drop_tolerance = config.drop_tolerance;

    let mut c1 = assembly.c1.into_csr(num_dofs, num_dofs, 0.0);
    let mut c2 = assembly.c2.into_csr(num_dofs, num_dofs, 0.0);
    let d = assembly.d.into_csr(num_dofs, num_dofs, 0.0);
    let mut g = assembly.g;
    let mut c = DVector::zeros(num_dofs);

    // frame correction for quadratic slave surfaces
    if let Some(inverse) = inv_te {
        c1 = &c1 * inverse;
        c2 = &c2 * inverse;
    }

    // per-node classification from the complementarity condition
    let mut node_states: BTreeMap<usize, NodeContactState> = BTreeMap::new();
    for (&node, normal) in normals {
        let dofs = [3 * node, 3 * node + 1, 3 * node + 2];
        let weighted_gap = Vector3::new(g[dofs[0]], g[dofs[1]], g[dofs[2]]);

        let contact_pressure = match reaction_forces {
            Some(la) => {
                let la_node = Vector3::new(la[dofs[0]], la[dofs[1]], la[dofs[2]]);
                let (t1, t2) = create_orthogonal_basis(normal);
                Vector3::new(normal.dot(&la_node), t1.dot(&la_node), t2.dot(&la_node))
            }
            None => Vector3::zeros(),
        };

        let complementarity = contact_pressure - weighted_gap;
        let state = if complementarity[0] < 0.0 {
            ContactState::Inactive
        } else {
            ContactState::ActiveSlip
        };
        for k in 0..3 {
            c[dofs[k]] = complementarity[k];
        }
        node_states.insert(
            node,
            NodeContactState {
                weighted_gap,
                contact_pressure,
                complementarity,
                state,
            },
        );
    }

    // uniform override on the first iteration of a load step
    if config.iteration == 1 {
        let gaps: Vec<f64> = node_states
            .values()
            .map(|record| record.weighted_gap[0])
            .collect();
        match resolve_initial_state(config.contact_state_in_first_iteration, &gaps) {
            ResolvedState::Active => {
                for record in node_states.values_mut() {
                    record.state = ContactState::ActiveSlip;
                }
            }
            ResolvedState::Inactive => {
                for record in node_states.values_mut() {
                    record.state = ContactState::Inactive;
                }
            }
            ResolvedState::Unknown => {}
        }
    }

    // row surgery on the compressed operators
    let mut inactive_rows: HashSet<usize> = HashSet::new();
    let mut tangent_rows: HashSet<usize> = HashSet::new();
    let mut slip_rows: Vec<(usize, usize, f64)> = Vec::new();
    for (&node, record) in &node_states {
        let dofs = [3 * node, 3 * node + 1, 3 * node + 2];
        match record.state {
            ContactState::Inactive => {
                inactive_rows.extend(dofs);
                for dof in dofs {
                    g[dof] = 0.0;
                }
            }
            ContactState::ActiveSlip => {
                // the tangential constraint becomes a direct kinematic row:
                // D * u restricted to the node's tangent directions
                tangent_rows.insert(dofs[1]);
                tangent_rows.insert(dofs[2]);
                g[dofs[1]] = 0.0;
                g[dofs[2]] = 0.0;
                let (t1, t2) = create_orthogonal_basis(&normals[&node]);
                for k in 0..3 {
                    slip_rows.push((dofs[1], dofs[k], t1[k]));
                    slip_rows.push((dofs[2], dofs[k], t2[k]));
                }
            }
            ContactState::ActiveStick => {}
        }
        debug!("slave node {node}: {:?}", record.state);
    }

    let c1_triplets = filter_rows(&c1, &inactive_rows);
    let removed_c2: HashSet<usize> = inactive_rows.union(&tangent_rows).copied().collect();
    let c2_triplets = filter_rows(&c2, &removed_c2);
    let mut d_triplets = filter_rows(&d, &removed_c2);
    d_triplets.extend(slip_rows);

    let c1 = csr_from_triplets(num_dofs, num_dofs, &c1_triplets, drop_tolerance);
    let c2 = csr_from_triplets(num_dofs, num_dofs, &c2_triplets, drop_tolerance);
    let d = csr_from_triplets(num_dofs, num_dofs, &d_triplets, drop_tolerance);

    statistics.num_active_nodes = node_states
        .values()
        .filter(|record| record.state.is_active())
        .count();
    statistics.num_inactive_nodes = node_states.len() - statistics.num_active_nodes;
    info!(
        "contact state: {} active, {} inactive of {} slave nodes",
        statistics.num_active_nodes,
        statistics.num_inactive_nodes,
        node_states.len()
    );

    AssembledInterface {
        c1,
        c2,
        d,
        g,
        c,
        node_states,
        statistics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::{SparseAccumulator, to_dense};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn one_node_assembly(gap_normal: f64) -> (MortarAssembly, BTreeMap<usize, Vector3<f64>>) {
        let mut assembly = MortarAssembly::new(3);
        let local = DMatrix::from_element(3, 3, 1.0);
        assembly.c1.add(&[0, 1, 2], &[0, 1, 2], &local);
        assembly.c2.add(&[0, 1, 2], &[0, 1, 2], &local);
        assembly.add_gap(&[0], &DVector::from_vec(vec![gap_normal]));
        let mut normals = BTreeMap::new();
        normals.insert(0, Vector3::z());
        (assembly, normals)
    }

    fn config_iteration_2() -> ContactConfig {
        // iteration > 1 disables the first-iteration override
        ContactConfig {
            iteration: 2,
            ..ContactConfig::default()
        }
    }

    #[test]
    fn positive_gap_without_pressure_deactivates() {
        let (assembly, normals) = one_node_assembly(0.5);
        let out = apply_contact_state(
            assembly,
            &normals,
            None,
            &config_iteration_2(),
            None,
            InterfaceStatistics::default(),
        );

        assert_eq!(out.node_states[&0].state, ContactState::Inactive);
        // all rows of the node are gone
        assert_eq!(out.c1.nnz(), 0);
        assert_eq!(out.c2.nnz(), 0);
        assert_eq!(out.d.nnz(), 0);
        assert_eq!(out.g[0], 0.0);
        // complementarity is recorded before row removal
        assert_relative_eq!(out.c[0], -0.5, epsilon = 1e-15);
    }

    #[test]
    fn penetrating_node_is_active_with_slip_rows() {
        let (assembly, normals) = one_node_assembly(-0.1);
        let out = apply_contact_state(
            assembly,
            &normals,
            None,
            &config_iteration_2(),
            None,
            InterfaceStatistics::default(),
        );

        let record = &out.node_states[&0];
        assert_eq!(record.state, ContactState::ActiveSlip);
        assert_relative_eq!(record.complementarity[0], 0.1, epsilon = 1e-15);

        // normal row of C1/C2 survives, tangential rows of C2 are zeroed
        let c2 = to_dense(&out.c2);
        assert!(c2.row(0).amax() > 0.0);
        assert_eq!(c2.row(1).amax(), 0.0);
        assert_eq!(c2.row(2).amax(), 0.0);
        assert_eq!(out.g[1], 0.0);
        assert_eq!(out.g[2], 0.0);

        // D carries the tangent basis vectors in the tangential rows
        let d = to_dense(&out.d);
        let n = Vector3::z();
        let (t1, t2) = create_orthogonal_basis(&n);
        for k in 0..3 {
            assert_relative_eq!(d[(1, k)], t1[k], epsilon = 1e-15);
            assert_relative_eq!(d[(2, k)], t2[k], epsilon = 1e-15);
        }
        assert_eq!(d.row(0).amax(), 0.0);
    }

    #[test]
    fn pressure_keeps_separated_node_active() {
        let (assembly, normals) = one_node_assembly(0.5);
        // normal reaction force larger than the gap
        let la = DVector::from_vec(vec![0.0, 0.0, 0.8]);
        let out = apply_contact_state(
            assembly,
            &normals,
            Some(&la),
            &config_iteration_2(),
            None,
            InterfaceStatistics::default(),
        );
        let record = &out.node_states[&0];
        assert_relative_eq!(record.contact_pressure[0], 0.8, epsilon = 1e-15);
        assert_eq!(record.state, ContactState::ActiveSlip);
    }

    #[test]
    fn auto_policy_activates_on_uniformly_zero_gap() {
        let (assembly, normals) = one_node_assembly(0.0);
        let out = apply_contact_state(
            assembly,
            &normals,
            None,
            &ContactConfig::default(),
            None,
            InterfaceStatistics::default(),
        );
        assert_eq!(out.node_states[&0].state, ContactState::ActiveSlip);
        assert_eq!(out.statistics.num_active_nodes, 1);
    }

    #[test]
    fn forced_inactive_policy_overrides_classification() {
        // penetrating node would classify active, but the first-iteration
        // policy forces inactive
        let (assembly, normals) = one_node_assembly(-0.1);
        let config = ContactConfig {
            contact_state_in_first_iteration: InitialContactState::Inactive,
            ..ContactConfig::default()
        };
        let out = apply_contact_state(
            assembly,
            &normals,
            None,
            &config,
            None,
            InterfaceStatistics::default(),
        );
        assert_eq!(out.node_states[&0].state, ContactState::Inactive);
        assert_eq!(out.c1.nnz(), 0);
    }

    #[test]
    fn auto_resolution_statistics() {
        assert_eq!(
            resolve_initial_state(InitialContactState::Auto, &[0.0, 0.0, 0.0]),
            ResolvedState::Active
        );
        assert_eq!(
            resolve_initial_state(InitialContactState::Auto, &[0.0, 1e-3, 0.0]),
            ResolvedState::Unknown
        );
        assert_eq!(
            resolve_initial_state(InitialContactState::Auto, &[1e-3; 4]),
            ResolvedState::Unknown
        );
    }
}
