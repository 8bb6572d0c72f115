//! Surface element kinds and the element-level geometric interface.
//!
//! Elements are 2D surface patches embedded in 3D. Triangles use the
//! reference domain with vertices (0,0), (1,0), (0,1); quadrilaterals use
//! [-1,1]². Node ordering follows the usual corner-first convention, with
//! midside nodes appended edge by edge for the quadratic kinds.

use crate::error::{ModelError, Result};
use crate::fields::{FieldKind, FieldStore};
use nalgebra::{Matrix3, Vector3};

/// Closed set of supported surface element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 3-node linear triangle
    Tri3,
    /// 6-node quadratic triangle
    Tri6,
    /// 4-node bilinear quadrilateral
    Quad4,
    /// 8-node serendipity quadrilateral
    Quad8,
}

impl ElementKind {
    pub fn num_nodes(self) -> usize {
        match self {
            ElementKind::Tri3 => 3,
            ElementKind::Tri6 => 6,
            ElementKind::Quad4 => 4,
            ElementKind::Quad8 => 8,
        }
    }

    /// Number of corner nodes; corners always come first in the connectivity
    pub fn num_corners(self) -> usize {
        match self {
            ElementKind::Tri3 | ElementKind::Tri6 => 3,
            ElementKind::Quad4 | ElementKind::Quad8 => 4,
        }
    }

    pub fn is_quadratic(self) -> bool {
        matches!(self, ElementKind::Tri6 | ElementKind::Quad8)
    }

    /// Reference-domain coordinates of each node
    pub fn reference_coordinates(self) -> &'static [[f64; 2]] {
        match self {
            ElementKind::Tri3 => &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            ElementKind::Tri6 => &[
                [0.0, 0.0],
                [1.0, 0.0],
                [0.0, 1.0],
                [0.5, 0.0],
                [0.5, 0.5],
                [0.0, 0.5],
            ],
            ElementKind::Quad4 => &[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]],
            ElementKind::Quad8 => &[
                [-1.0, -1.0],
                [1.0, -1.0],
                [1.0, 1.0],
                [-1.0, 1.0],
                [0.0, -1.0],
                [1.0, 0.0],
                [0.0, 1.0],
                [-1.0, 0.0],
            ],
        }
    }

    /// Decomposition into linear triangular facets (local node index triples).
    /// Used by the quadratic assembly path, where curved patches must be
    /// linearized before an auxiliary plane is meaningful.
    pub fn sub_facets(self) -> &'static [[usize; 3]] {
        match self {
            ElementKind::Tri3 => &[[0, 1, 2]],
            ElementKind::Tri6 => &[[0, 3, 5], [3, 1, 4], [5, 4, 2], [3, 4, 5]],
            ElementKind::Quad4 => &[[0, 1, 2], [0, 2, 3]],
            ElementKind::Quad8 => &[
                [0, 4, 7],
                [4, 1, 5],
                [5, 2, 6],
                [6, 3, 7],
                [4, 5, 6],
                [4, 6, 7],
            ],
        }
    }

    /// Shape functions at a parametric point
    pub fn shape_functions(self, xi: [f64; 2]) -> Vec<f64> {
        let [r, s] = xi;
        match self {
            ElementKind::Tri3 => vec![1.0 - r - s, r, s],
            ElementKind::Tri6 => {
                let l = 1.0 - r - s;
                vec![
                    l * (2.0 * l - 1.0),
                    r * (2.0 * r - 1.0),
                    s * (2.0 * s - 1.0),
                    4.0 * r * l,
                    4.0 * r * s,
                    4.0 * s * l,
                ]
            }
            ElementKind::Quad4 => vec![
                (1.0 - r) * (1.0 - s) / 4.0,
                (1.0 + r) * (1.0 - s) / 4.0,
                (1.0 + r) * (1.0 + s) / 4.0,
                (1.0 - r) * (1.0 + s) / 4.0,
            ],
            ElementKind::Quad8 => {
                let mut n = vec![0.0; 8];
                // corner functions
                for (i, rc) in self.reference_coordinates()[..4].iter().enumerate() {
                    let [ri, si] = *rc;
                    n[i] = (1.0 + r * ri) * (1.0 + s * si) * (r * ri + s * si - 1.0) / 4.0;
                }
                n[4] = (1.0 - r * r) * (1.0 - s) / 2.0;
                n[5] = (1.0 + r) * (1.0 - s * s) / 2.0;
                n[6] = (1.0 - r * r) * (1.0 + s) / 2.0;
                n[7] = (1.0 - r) * (1.0 - s * s) / 2.0;
                n
            }
        }
    }

    /// Parametric derivatives [dN/dr, dN/ds] per node
    pub fn shape_derivatives(self, xi: [f64; 2]) -> Vec<[f64; 2]> {
        let [r, s] = xi;
        match self {
            ElementKind::Tri3 => vec![[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]],
            ElementKind::Tri6 => {
                let l = 1.0 - r - s;
                vec![
                    [1.0 - 4.0 * l, 1.0 - 4.0 * l],
                    [4.0 * r - 1.0, 0.0],
                    [0.0, 4.0 * s - 1.0],
                    [4.0 * (l - r), -4.0 * r],
                    [4.0 * s, 4.0 * r],
                    [-4.0 * s, 4.0 * (l - s)],
                ]
            }
            ElementKind::Quad4 => {
                let mut d = Vec::with_capacity(4);
                for rc in self.reference_coordinates() {
                    let [ri, si] = *rc;
                    d.push([ri * (1.0 + s * si) / 4.0, si * (1.0 + r * ri) / 4.0]);
                }
                d
            }
            ElementKind::Quad8 => {
                let mut d = vec![[0.0, 0.0]; 8];
                for (i, rc) in self.reference_coordinates()[..4].iter().enumerate() {
                    let [ri, si] = *rc;
                    d[i] = [
                        ri * (1.0 + s * si) * (2.0 * r * ri + s * si) / 4.0,
                        si * (1.0 + r * ri) * (r * ri + 2.0 * s * si) / 4.0,
                    ];
                }
                d[4] = [-r * (1.0 - s), -(1.0 - r * r) / 2.0];
                d[5] = [(1.0 - s * s) / 2.0, -s * (1.0 + r)];
                d[6] = [-r * (1.0 + s), (1.0 - r * r) / 2.0];
                d[7] = [-(1.0 - s * s) / 2.0, -s * (1.0 - r)];
                d
            }
        }
    }
}

/// A surface element: immutable topology, mutable time-indexed field data,
/// and a time-indexed list of candidate master elements supplied by the
/// external contact search.
#[derive(Debug, Clone)]
pub struct SurfaceElement {
    pub id: usize,
    pub kind: ElementKind,
    /// Global node ids (0-based); global DOF of node j, component k is 3j + k
    pub nodes: Vec<usize>,
    fields: FieldStore,
    master_elements: Vec<(f64, Vec<usize>)>,
}

impl SurfaceElement {
    pub fn new(id: usize, kind: ElementKind, nodes: Vec<usize>) -> Result<Self> {
        if nodes.len() != kind.num_nodes() {
            return Err(ModelError::NodeCountMismatch {
                element: id,
                expected: kind.num_nodes(),
                actual: nodes.len(),
            });
        }
        Ok(Self {
            id,
            kind,
            nodes,
            fields: FieldStore::new(),
            master_elements: Vec::new(),
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.kind.num_nodes()
    }

    /// Store a per-node field sample at the given time
    pub fn set_field(&mut self, kind: FieldKind, time: f64, values: Vec<Vector3<f64>>) -> Result<()> {
        if values.len() != self.num_nodes() {
            return Err(ModelError::NodeCountMismatch {
                element: self.id,
                expected: self.num_nodes(),
                actual: values.len(),
            });
        }
        self.fields.insert(kind, time, values);
        Ok(())
    }

    /// Per-node field values at the given time
    pub fn field(&self, kind: FieldKind, time: f64) -> Result<&[Vector3<f64>]> {
        self.fields.at(kind, time).ok_or(ModelError::MissingField {
            element: self.id,
            field: kind,
            time,
        })
    }

    pub fn set_master_elements(&mut self, time: f64, ids: Vec<usize>) {
        match self
            .master_elements
            .binary_search_by(|(t, _)| t.total_cmp(&time))
        {
            Ok(pos) => self.master_elements[pos] = (time, ids),
            Err(pos) => self.master_elements.insert(pos, (time, ids)),
        }
    }

    /// Candidate master element ids at the given time (empty if none set)
    pub fn master_elements(&self, time: f64) -> &[usize] {
        self.master_elements
            .iter()
            .rev()
            .find(|(t, _)| *t <= time)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Deformed nodal coordinates: geometry plus displacement. A never-set
    /// displacement field counts as zero displacement.
    pub fn current_coordinates(&self, time: f64) -> Result<Vec<Vector3<f64>>> {
        let geometry = self.field(FieldKind::Geometry, time)?;
        let mut coords = geometry.to_vec();
        if self.fields.contains(FieldKind::Displacement) {
            let u = self.field(FieldKind::Displacement, time)?;
            for (x, du) in coords.iter_mut().zip(u.iter()) {
                *x += du;
            }
        }
        Ok(coords)
    }

    /// Interpolate per-node values at a parametric point
    pub fn interpolate(&self, values: &[Vector3<f64>], xi: [f64; 2]) -> Vector3<f64> {
        let n = self.kind.shape_functions(xi);
        let mut out = Vector3::zeros();
        for (ni, vi) in n.iter().zip(values.iter()) {
            out += *ni * vi;
        }
        out
    }

    /// Geometry tangents d x/d xi1 and d x/d xi2 at a parametric point
    pub fn tangents(
        &self,
        coords: &[Vector3<f64>],
        xi: [f64; 2],
    ) -> (Vector3<f64>, Vector3<f64>) {
        let dn = self.kind.shape_derivatives(xi);
        let mut t1 = Vector3::zeros();
        let mut t2 = Vector3::zeros();
        for (di, x) in dn.iter().zip(coords.iter()) {
            t1 += di[0] * x;
            t2 += di[1] * x;
        }
        (t1, t2)
    }

    /// Inverse-map a 3D point onto this element's parametric domain along the
    /// direction `n0`: solves x(xi) = p + d*n0 for (xi, d) by Newton
    /// iteration on the element basis.
    pub fn project_point(
        &self,
        p: &Vector3<f64>,
        n0: &Vector3<f64>,
        coords: &[Vector3<f64>],
    ) -> Result<([f64; 2], f64)> {
        const MAX_ITERATIONS: usize = 10;
        const TOLERANCE: f64 = 1.0e-9;

        if coords.len() != self.num_nodes() {
            return Err(ModelError::NodeCountMismatch {
                element: self.id,
                expected: self.num_nodes(),
                actual: coords.len(),
            });
        }

        let mut xi = [0.0, 0.0];
        let mut d = 0.0;
        for _ in 0..MAX_ITERATIONS {
            let x = self.interpolate(coords, xi);
            let residual = x - p - d * n0;
            if residual.norm() < TOLERANCE {
                return Ok((xi, d));
            }
            let (t1, t2) = self.tangents(coords, xi);
            let jacobian = Matrix3::from_columns(&[t1, t2, -n0]);
            let inverse = jacobian
                .try_inverse()
                .ok_or(ModelError::ProjectionFailed {
                    element: self.id,
                    iterations: MAX_ITERATIONS,
                })?;
            let delta = inverse * residual;
            xi[0] -= delta[0];
            xi[1] -= delta[1];
            d -= delta[2];
            if delta.norm() < TOLERANCE {
                return Ok((xi, d));
            }
        }
        Err(ModelError::ProjectionFailed {
            element: self.id,
            iterations: MAX_ITERATIONS,
        })
    }
}
