//! Element assembly drivers and the contact interface entry point.
//!
//! Each slave element is segmented against its candidate master elements,
//! the segments are integrated, and the element contributions are expanded
//! to per-DOF block form and scattered into the global operators. Linear
//! slave elements use one auxiliary plane per element; quadratic slave
//! elements are sub-triangulated into linear facets, each with its own
//! plane, because a curved patch has no single meaningful tangent plane.

use crate::clipping::MasterOutline;
use crate::clipping::create_contact_segmentation;
use crate::config::ContactConfig;
use crate::error::{ContactError, Result};
use crate::geometry::{create_rotation_matrix, mean};
use crate::integrator::{
    accumulate_biorthogonal, dual_basis_coefficients, integrate_segment,
};
use crate::normals::calculate_normals;
use crate::sparse::{MortarAssembly, csr_from_triplets};
use crate::state::{AssembledInterface, InterfaceStatistics, apply_contact_state};
use log::debug;
use mcx_model::{ElementKind, FieldKind, SurfaceElement};
use nalgebra::{DMatrix, DVector, Vector3};
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeMap;

/// Global DOF indices of an element: 3 per node, component-major per node
pub fn global_dofs(element: &SurfaceElement) -> Vec<usize> {
    let mut dofs = Vec::with_capacity(3 * element.num_nodes());
    for &node in &element.nodes {
        for k in 0..3 {
            dofs.push(3 * node + k);
        }
    }
    dofs
}

/// Expand an element-level nodal matrix to per-DOF block form, replicating
/// every entry across the 3 displacement components
fn expand_to_dofs(local: &DMatrix<f64>) -> DMatrix<f64> {
    let (nr, nc) = local.shape();
    let mut expanded = DMatrix::zeros(3 * nr, 3 * nc);
    for i in 0..nr {
        for j in 0..nc {
            for k in 0..3 {
                expanded[(3 * i + k, 3 * j + k)] = local[(i, j)];
            }
        }
    }
    expanded
}

/// Boundary-modification transform of the 6-node triangle: the midside
/// functions are scaled by 1 - 2*alpha and the removed weight is lumped onto
/// the two adjacent corner functions, preserving partition of unity.
/// Returns (T, T^-1).
fn boundary_transform(alpha: f64) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let mut t = DMatrix::identity(6, 6);
    // midside 3 joins corners 0-1, midside 4 joins 1-2, midside 5 joins 2-0
    for (midside, corners) in [(3, [0, 1]), (4, [1, 2]), (5, [2, 0])] {
        t[(midside, midside)] = 1.0 - 2.0 * alpha;
        for corner in corners {
            t[(corner, midside)] = alpha;
        }
    }
    let inverse = t
        .clone()
        .try_inverse()
        .ok_or(ContactError::SingularBoundaryTransform(alpha))?;
    Ok((t, inverse))
}

/// Per-driver summary returned for statistics
#[derive(Debug, Clone, Copy, Default)]
struct DriverReport {
    segments: usize,
    area: f64,
}

/// Candidate master elements of a slave element, with their deformed
/// coordinates, after the broad-phase centroid cull
fn gather_masters<'a>(
    slave: &SurfaceElement,
    slave_centroid: &Vector3<f64>,
    masters: &'a BTreeMap<usize, SurfaceElement>,
    time: f64,
    distval: f64,
) -> Result<BTreeMap<usize, (&'a SurfaceElement, Vec<Vector3<f64>>)>> {
    let mut gathered = BTreeMap::new();
    for &master_id in slave.master_elements(time) {
        let master = masters
            .get(&master_id)
            .ok_or(ContactError::UnknownMasterElement {
                slave: slave.id,
                master: master_id,
            })?;
        let x2 = master.current_coordinates(time)?;
        if (mean(&x2) - slave_centroid).norm() > distval {
            continue;
        }
        gathered.insert(master_id, (master, x2));
    }
    Ok(gathered)
}

fn scatter_segment(
    assembly: &mut MortarAssembly,
    sdofs: &[usize],
    mdofs: &[usize],
    qt: &DMatrix<f64>,
    de: &DMatrix<f64>,
    me: &DMatrix<f64>,
    ge: &DVector<f64>,
) {
    let d3 = expand_to_dofs(de);
    let m3 = expand_to_dofs(me);

    assembly.c1.add(sdofs, sdofs, &d3);
    assembly.c1.add(sdofs, mdofs, &(-&m3));
    assembly.c2.add(sdofs, sdofs, &(qt * &d3));
    assembly.c2.add(sdofs, mdofs, &(-(qt * &m3)));
    assembly.add_gap(sdofs, &(qt * ge));
}

/// Assembly driver for linear (Tri3/Quad4) slave elements: one auxiliary
/// plane per element, clipped against the corner outlines of the candidate
/// masters.
fn assemble_linear_slave(
    slave: &SurfaceElement,
    masters: &BTreeMap<usize, SurfaceElement>,
    time: f64,
    config: &ContactConfig,
    assembly: &mut MortarAssembly,
) -> Result<DriverReport> {
    if slave.kind.is_quadratic() {
        return Err(ContactError::UnsupportedElement {
            kind: slave.kind,
            driver: "linear",
        });
    }

    let nsl = slave.num_nodes();
    let x1 = slave.current_coordinates(time)?;
    let n1 = slave.field(FieldKind::Normal, time)?;
    let x0 = mean(&x1);
    let n0 = mean(n1).normalize();

    let master_data = gather_masters(slave, &x0, masters, time, config.distval)?;
    let outlines: Vec<MasterOutline> = master_data
        .iter()
        .map(|(&id, (master, x2))| MasterOutline {
            id,
            polygon: x2[..master.kind.num_corners()].to_vec(),
        })
        .collect();

    let segments = create_contact_segmentation(slave.id, &x1, &outlines, &x0, &n0)?;
    if segments.is_empty() {
        return Ok(DriverReport::default());
    }

    let ae = if config.dual_basis {
        let mut de_b = DMatrix::zeros(nsl, nsl);
        let mut me_b = DMatrix::zeros(nsl, nsl);
        accumulate_biorthogonal(slave, &x1, None, &n0, &segments, &mut de_b, &mut me_b)?;
        dual_basis_coefficients(slave.id, &de_b, &me_b)?
    } else {
        DMatrix::identity(nsl, nsl)
    };

    let q = create_rotation_matrix(slave, time)?;
    let qt = q.transpose();
    let sdofs = global_dofs(slave);

    let mut report = DriverReport::default();
    for segment in &segments {
        let (master, x2) = &master_data[&segment.master];
        let integrals =
            integrate_segment(slave, &x1, None, &ae, master, x2, segment, &n0)?;
        scatter_segment(
            assembly,
            &sdofs,
            &global_dofs(master),
            &qt,
            &integrals.de,
            &integrals.me,
            &integrals.ge,
        );
        report.segments += 1;
        report.area += segment.area;
    }
    Ok(report)
}

/// Assembly driver for quadratic (Tri6) slave elements: both sides are
/// sub-triangulated into linear facets and a fresh auxiliary plane is
/// derived per slave facet; the boundary transform T is applied to the
/// slave basis when alpha is nonzero. Integration still projects onto the
/// full parent elements.
fn assemble_quadratic_slave(
    slave: &SurfaceElement,
    masters: &BTreeMap<usize, SurfaceElement>,
    time: f64,
    config: &ContactConfig,
    assembly: &mut MortarAssembly,
) -> Result<DriverReport> {
    if slave.kind != ElementKind::Tri6 {
        return Err(ContactError::UnsupportedElement {
            kind: slave.kind,
            driver: "quadratic",
        });
    }

    let nsl = slave.num_nodes();
    let x1 = slave.current_coordinates(time)?;
    let n1 = slave.field(FieldKind::Normal, time)?.to_vec();

    let transform = if config.alpha != 0.0 {
        Some(boundary_transform(config.alpha)?)
    } else {
        None
    };
    let t_ref = transform.as_ref().map(|(t, _)| t);

    let master_data = gather_masters(slave, &mean(&x1), masters, time, config.distval)?;

    // segment every slave facet against every master facet on the facet's
    // own auxiliary plane
    let mut facet_segments = Vec::new();
    for facet in slave.kind.sub_facets() {
        let facet_coords: Vec<Vector3<f64>> = facet.iter().map(|&i| x1[i]).collect();
        let facet_normals: Vec<Vector3<f64>> = facet.iter().map(|&i| n1[i]).collect();
        let x0 = mean(&facet_coords);
        let n0 = mean(&facet_normals).normalize();

        let mut outlines = Vec::new();
        for (&master_id, (master, x2)) in &master_data {
            for master_facet in master.kind.sub_facets() {
                outlines.push(MasterOutline {
                    id: master_id,
                    polygon: master_facet.iter().map(|&i| x2[i]).collect(),
                });
            }
        }

        let segments =
            create_contact_segmentation(slave.id, &facet_coords, &outlines, &x0, &n0)?;
        facet_segments.push((n0, segments));
    }

    if facet_segments.iter().all(|(_, s)| s.is_empty()) {
        return Ok(DriverReport::default());
    }

    let ae = if config.dual_basis {
        let mut de_b = DMatrix::zeros(nsl, nsl);
        let mut me_b = DMatrix::zeros(nsl, nsl);
        for (n0, segments) in &facet_segments {
            accumulate_biorthogonal(slave, &x1, t_ref, n0, segments, &mut de_b, &mut me_b)?;
        }
        dual_basis_coefficients(slave.id, &de_b, &me_b)?
    } else {
        DMatrix::identity(nsl, nsl)
    };

    let q = create_rotation_matrix(slave, time)?;
    let qt = q.transpose();
    let sdofs = global_dofs(slave);

    let mut report = DriverReport::default();
    for (n0, segments) in &facet_segments {
        for segment in segments {
            let (master, x2) = &master_data[&segment.master];
            let integrals =
                integrate_segment(slave, &x1, t_ref, &ae, master, x2, segment, n0)?;
            scatter_segment(
                assembly,
                &sdofs,
                &global_dofs(master),
                &qt,
                &integrals.de,
                &integrals.me,
                &integrals.ge,
            );
            report.segments += 1;
            report.area += segment.area;
        }
    }
    Ok(report)
}

/// Global inverse of the blockwise nodal edge-correction transform,
/// assembled by scattering the per-element inverse blocks of every
/// quadratic slave element over an identity background. Shared nodes
/// receive identical blocks, so overwriting is consistent.
fn build_edge_correction_inverse(
    num_dofs: usize,
    slave_elements: &[SurfaceElement],
    alpha: f64,
) -> Result<CsrMatrix<f64>> {
    let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for dof in 0..num_dofs {
        entries.insert((dof, dof), 1.0);
    }

    let (_, inverse) = boundary_transform(alpha)?;
    for element in slave_elements {
        if element.kind != ElementKind::Tri6 {
            continue;
        }
        for (i, &node_i) in element.nodes.iter().enumerate() {
            for (j, &node_j) in element.nodes.iter().enumerate() {
                let value = inverse[(i, j)];
                if value == 0.0 && i != j {
                    continue;
                }
                for k in 0..3 {
                    entries.insert((3 * node_i + k, 3 * node_j + k), value);
                }
            }
        }
    }

    let triplets: Vec<(usize, usize, f64)> = entries
        .into_iter()
        .map(|((row, col), value)| (row, col, value))
        .collect();
    Ok(csr_from_triplets(num_dofs, num_dofs, &triplets, 0.0))
}

/// One mortar contact interface: the slave surface elements, the master
/// elements referenced by their candidate lists, and the assembly
/// configuration. Reaction forces from the previous iteration are optional;
/// without them every contact pressure is taken as zero.
#[derive(Debug, Clone)]
pub struct ContactInterface {
    pub config: ContactConfig,
    slave_elements: Vec<SurfaceElement>,
    master_elements: BTreeMap<usize, SurfaceElement>,
    reaction_forces: Option<DVector<f64>>,
}

impl ContactInterface {
    pub fn new(config: ContactConfig) -> Self {
        Self {
            config,
            slave_elements: Vec::new(),
            master_elements: BTreeMap::new(),
            reaction_forces: None,
        }
    }

    pub fn add_slave_element(&mut self, element: SurfaceElement) {
        self.slave_elements.push(element);
    }

    pub fn add_master_element(&mut self, element: SurfaceElement) {
        self.master_elements.insert(element.id, element);
    }

    pub fn slave_elements(&self) -> &[SurfaceElement] {
        &self.slave_elements
    }

    /// Reaction forces (Lagrange multipliers) per global DOF from the
    /// external solver, used for the contact pressure classification
    pub fn set_reaction_forces(&mut self, la: DVector<f64>) {
        self.reaction_forces = Some(la);
    }

    /// Total number of global DOFs: 3 per node, sized by the largest node id
    pub fn num_dofs(&self) -> usize {
        let max_node = self
            .slave_elements
            .iter()
            .chain(self.master_elements.values())
            .flat_map(|e| e.nodes.iter().copied())
            .max();
        match max_node {
            Some(node) => 3 * (node + 1),
            None => 0,
        }
    }

    /// Assemble the contact constraint operators at the given time.
    ///
    /// Computes the slave nodal normals, runs the per-element segmentation
    /// and integration drivers, and post-processes the accumulated operators
    /// through the contact state machine. Everything is recomputed from
    /// scratch on every call.
    pub fn assemble(&mut self, time: f64) -> Result<AssembledInterface> {
        let num_dofs = self.num_dofs();

        if let Some(la) = &self.reaction_forces {
            if la.len() != num_dofs {
                return Err(ContactError::ReactionForceDimension {
                    expected: num_dofs,
                    actual: la.len(),
                });
            }
        }

        // 1. nodal normals for the whole slave surface
        let normals = calculate_normals(&self.slave_elements, time, self.config.rotate_normals)?;
        let normals: BTreeMap<usize, Vector3<f64>> = normals.into_iter().collect();
        for element in &mut self.slave_elements {
            let values: Vec<Vector3<f64>> =
                element.nodes.iter().map(|node| normals[node]).collect();
            element.set_field(FieldKind::Normal, time, values)?;
        }

        // 2. per-slave-element segmentation and integration
        let mut assembly = MortarAssembly::new(num_dofs);
        let mut statistics = InterfaceStatistics {
            num_slave_elements: self.slave_elements.len(),
            ..InterfaceStatistics::default()
        };
        for slave in &self.slave_elements {
            let report = match slave.kind {
                ElementKind::Tri3 | ElementKind::Quad4 => assemble_linear_slave(
                    slave,
                    &self.master_elements,
                    time,
                    &self.config,
                    &mut assembly,
                )?,
                ElementKind::Tri6 => assemble_quadratic_slave(
                    slave,
                    &self.master_elements,
                    time,
                    &self.config,
                    &mut assembly,
                )?,
                ElementKind::Quad8 => {
                    return Err(ContactError::UnsupportedElement {
                        kind: slave.kind,
                        driver: "quadratic",
                    });
                }
            };
            debug!(
                "slave element {}: {} segments, contact area {:.6e}",
                slave.id, report.segments, report.area
            );
            statistics.num_segments += report.segments;
            statistics.total_contact_area += report.area;
        }

        // 3. optional global edge-correction transform
        let inv_te = if self.config.alpha != 0.0 {
            Some(build_edge_correction_inverse(
                num_dofs,
                &self.slave_elements,
                self.config.alpha,
            )?)
        } else {
            None
        };

        // 4. contact state machine
        Ok(apply_contact_state(
            assembly,
            &normals,
            self.reaction_forces.as_ref(),
            &self.config,
            inv_te.as_ref(),
            statistics,
        ))
    }
}
