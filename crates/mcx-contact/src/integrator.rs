//! Per-segment mortar integration.
//!
//! Every contact segment is fan-triangulated into integration cells; on each
//! cell a 3-point Gauss rule maps quadrature points into 3D, projects them
//! back onto the parametric domains of the slave and master elements, and
//! accumulates the element-level coupling matrices De, Me and the weighted
//! gap ge. The biorthogonal (dual-basis) coefficients Ae are built in a
//! separate pass over all segments of a slave element before the main pass.

use crate::clipping::{ContactSegment, get_cells};
use crate::error::{ContactError, Result};
use mcx_model::{ElementKind, SurfaceElement, TRIANGLE_GAUSS_3};
use nalgebra::{DMatrix, DVector, Vector3};

/// Element-level integrals of one contact segment
#[derive(Debug, Clone)]
pub struct SegmentIntegrals {
    /// Slave-slave coupling (nsl x nsl)
    pub de: DMatrix<f64>,
    /// Slave-master coupling (nsl x nm)
    pub me: DMatrix<f64>,
    /// Weighted gap, 3 components per slave node (3*nsl)
    pub ge: DVector<f64>,
}

/// Slave shape functions, optionally passed through the quadratic boundary
/// transform
pub(crate) fn slave_basis(
    kind: ElementKind,
    xi: [f64; 2],
    transform: Option<&DMatrix<f64>>,
) -> Vec<f64> {
    let n = kind.shape_functions(xi);
    match transform {
        None => n,
        Some(t) => {
            let mut out = vec![0.0; n.len()];
            for i in 0..n.len() {
                for (j, nj) in n.iter().enumerate() {
                    out[i] += t[(i, j)] * nj;
                }
            }
            out
        }
    }
}

/// Accumulate the biorthogonality integrals of one batch of segments:
/// De += w diag(N1), Me += w N1 N1^T. The caller runs this over *all*
/// segments of a slave element before forming Ae.
pub(crate) fn accumulate_biorthogonal(
    slave: &SurfaceElement,
    slave_coords: &[Vector3<f64>],
    transform: Option<&DMatrix<f64>>,
    n0: &Vector3<f64>,
    segments: &[ContactSegment],
    de: &mut DMatrix<f64>,
    me: &mut DMatrix<f64>,
) -> Result<()> {
    for segment in segments {
        for cell in get_cells(&segment.polygon, segment.centroid) {
            let detj = cell.det_jacobian();
            for gp in TRIANGLE_GAUSS_3 {
                let w = gp.weight * detj;
                let x_gauss = cell.map(gp.xi);
                let (xi_s, _) = slave.project_point(&x_gauss, n0, slave_coords)?;
                let n1 = slave_basis(slave.kind, xi_s, transform);
                for i in 0..n1.len() {
                    de[(i, i)] += w * n1[i];
                    for j in 0..n1.len() {
                        me[(i, j)] += w * n1[i] * n1[j];
                    }
                }
            }
        }
    }
    Ok(())
}

/// Dual-basis coefficients Ae = De * Me^-1. A singular Me means the
/// segmentation degenerated and is fatal.
pub(crate) fn dual_basis_coefficients(
    element_id: usize,
    de: &DMatrix<f64>,
    me: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let inverse = me
        .clone()
        .try_inverse()
        .ok_or(ContactError::SingularDualBasis(element_id))?;
    Ok(de * inverse)
}

/// Integrate the coupling matrices of one contact segment.
///
/// With Phi = Ae * N1: De += w Phi N1^T, Me += w Phi N2^T and
/// ge += w (x_m - x_s) Phi^T. Positions are interpolated with the plain
/// geometric basis; the boundary transform only modifies the multiplier and
/// coupling spaces.
pub(crate) fn integrate_segment(
    slave: &SurfaceElement,
    slave_coords: &[Vector3<f64>],
    transform: Option<&DMatrix<f64>>,
    ae: &DMatrix<f64>,
    master: &SurfaceElement,
    master_coords: &[Vector3<f64>],
    segment: &ContactSegment,
    n0: &Vector3<f64>,
) -> Result<SegmentIntegrals> {
    let nsl = slave.num_nodes();
    let nm = master.num_nodes();
    let mut de = DMatrix::zeros(nsl, nsl);
    let mut me = DMatrix::zeros(nsl, nm);
    let mut ge = DVector::zeros(3 * nsl);

    for cell in get_cells(&segment.polygon, segment.centroid) {
        let detj = cell.det_jacobian();
        for gp in TRIANGLE_GAUSS_3 {
            let w = gp.weight * detj;
            let x_gauss = cell.map(gp.xi);
            let (xi_s, _) = slave.project_point(&x_gauss, n0, slave_coords)?;
            let (xi_m, _) = master.project_point(&x_gauss, n0, master_coords)?;

            let n1 = slave_basis(slave.kind, xi_s, transform);
            let n2 = master.kind.shape_functions(xi_m);

            let mut phi = vec![0.0; nsl];
            for i in 0..nsl {
                for (j, nj) in n1.iter().enumerate() {
                    phi[i] += ae[(i, j)] * nj;
                }
            }

            let x_s = slave.interpolate(slave_coords, xi_s);
            let x_m = master.interpolate(master_coords, xi_m);
            let diff = x_m - x_s;

            for i in 0..nsl {
                for j in 0..nsl {
                    de[(i, j)] += w * phi[i] * n1[j];
                }
                for j in 0..nm {
                    me[(i, j)] += w * phi[i] * n2[j];
                }
                for k in 0..3 {
                    ge[3 * i + k] += w * diff[k] * phi[i];
                }
            }
        }
    }

    Ok(SegmentIntegrals { de, me, ge })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipping::{MasterOutline, create_contact_segmentation};
    use approx::assert_relative_eq;
    use mcx_model::FieldKind;

    fn tri3(id: usize, nodes: [usize; 3], coords: [[f64; 3]; 3]) -> SurfaceElement {
        let mut element = SurfaceElement::new(id, ElementKind::Tri3, nodes.to_vec()).unwrap();
        element
            .set_field(
                FieldKind::Geometry,
                0.0,
                coords.iter().map(|c| Vector3::new(c[0], c[1], c[2])).collect(),
            )
            .unwrap();
        element
    }

    fn coincident_pair() -> (SurfaceElement, SurfaceElement, ContactSegment) {
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let slave = tri3(0, [0, 1, 2], coords);
        let master = tri3(1, [3, 4, 5], coords);

        let outline: Vec<Vector3<f64>> = coords
            .iter()
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        let segments = create_contact_segmentation(
            0,
            &outline,
            &[MasterOutline {
                id: 1,
                polygon: outline.clone(),
            }],
            &Vector3::zeros(),
            &Vector3::z(),
        )
        .unwrap();
        let segment = segments.into_iter().next().unwrap();
        (slave, master, segment)
    }

    #[test]
    fn coincident_tri3_standard_basis_gives_mass_matrix() {
        let (slave, master, segment) = coincident_pair();
        let slave_coords = slave.current_coordinates(0.0).unwrap();
        let master_coords = master.current_coordinates(0.0).unwrap();
        let identity = DMatrix::identity(3, 3);

        let integrals = integrate_segment(
            &slave,
            &slave_coords,
            None,
            &identity,
            &master,
            &master_coords,
            &segment,
            &Vector3::z(),
        )
        .unwrap();

        // exact 3-node triangle mass matrix scaled by the segment area:
        // A/12 * [[2,1,1],[1,2,1],[1,1,2]] with A = 1/2
        let area = 0.5;
        for i in 0..3 {
            for j in 0..3 {
                let expected = area / 12.0 * if i == j { 2.0 } else { 1.0 };
                assert_relative_eq!(integrals.de[(i, j)], expected, epsilon = 1e-12);
                assert_relative_eq!(integrals.me[(i, j)], expected, epsilon = 1e-12);
            }
        }
        // zero gap everywhere
        assert!(integrals.ge.amax() < 1e-12);
    }

    #[test]
    fn dual_basis_diagonalizes_the_coupling() {
        let (slave, master, segment) = coincident_pair();
        let slave_coords = slave.current_coordinates(0.0).unwrap();
        let master_coords = master.current_coordinates(0.0).unwrap();

        let mut de_b = DMatrix::zeros(3, 3);
        let mut me_b = DMatrix::zeros(3, 3);
        accumulate_biorthogonal(
            &slave,
            &slave_coords,
            None,
            &Vector3::z(),
            std::slice::from_ref(&segment),
            &mut de_b,
            &mut me_b,
        )
        .unwrap();
        let ae = dual_basis_coefficients(slave.id, &de_b, &me_b).unwrap();

        let integrals = integrate_segment(
            &slave,
            &slave_coords,
            None,
            &ae,
            &master,
            &master_coords,
            &segment,
            &Vector3::z(),
        )
        .unwrap();

        // biorthogonality: int Phi_i N_j = delta_ij * int N_i, with
        // int N_i = A/3 on the linear triangle
        let lumped = 0.5 / 3.0;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { lumped } else { 0.0 };
                assert_relative_eq!(integrals.de[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn singular_biorthogonal_matrix_is_fatal() {
        let de = DMatrix::identity(3, 3);
        let me = DMatrix::zeros(3, 3);
        let err = dual_basis_coefficients(5, &de, &me).unwrap_err();
        assert!(matches!(err, ContactError::SingularDualBasis(5)));
    }
}
