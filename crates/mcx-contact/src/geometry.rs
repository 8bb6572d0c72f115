//! Auxiliary-plane projection and locally-rotated coordinate frames.

use crate::error::Result;
use mcx_model::{FieldKind, SurfaceElement};
use nalgebra::{DMatrix, Vector3};

/// Two mutually orthogonal unit tangents spanning the orthogonal complement
/// of the unit normal `n`, such that {n, t1, t2} is a right-handed
/// orthonormal frame.
///
/// The seed axis is the coordinate axis maximizing the cross-product norm
/// with `n`, which keeps the construction away from the near-parallel
/// degeneracy. A zero `n` is not guarded; callers must pass nonzero normals.
pub fn create_orthogonal_basis(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let axes = [Vector3::x(), Vector3::y(), Vector3::z()];
    let mut seed = axes[0];
    let mut best = n.cross(&seed).norm();
    for axis in &axes[1..] {
        let candidate = n.cross(axis).norm();
        if candidate > best {
            seed = *axis;
            best = candidate;
        }
    }
    let t1 = n.cross(&seed).normalize();
    let t2 = n.cross(&t1);
    (t1, t2)
}

/// Orthogonal projection of `p` onto the plane through `x0` with unit
/// normal `n0`.
pub fn project_vertex_to_auxiliary_plane(
    p: &Vector3<f64>,
    x0: &Vector3<f64>,
    n0: &Vector3<f64>,
) -> Vector3<f64> {
    p - (p - x0).dot(n0) * n0
}

/// Block-diagonal rotation matrix stacking one 3x3 block [n | t1 | t2] per
/// element node, rotating nodal DOFs from global xyz to the node-local
/// normal-tangent-tangent frame. Reads the `Normal` field at `time`.
pub fn create_rotation_matrix(element: &SurfaceElement, time: f64) -> Result<DMatrix<f64>> {
    let normals = element.field(FieldKind::Normal, time)?;
    let n_nodes = element.num_nodes();
    let mut q = DMatrix::zeros(3 * n_nodes, 3 * n_nodes);
    for (i, n) in normals.iter().enumerate() {
        let (t1, t2) = create_orthogonal_basis(n);
        for k in 0..3 {
            q[(3 * i + k, 3 * i)] = n[k];
            q[(3 * i + k, 3 * i + 1)] = t1[k];
            q[(3 * i + k, 3 * i + 2)] = t2[k];
        }
    }
    Ok(q)
}

/// Arithmetic mean of a set of points
pub(crate) fn mean(points: &[Vector3<f64>]) -> Vector3<f64> {
    let mut sum = Vector3::zeros();
    for p in points {
        sum += p;
    }
    sum / points.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mcx_model::ElementKind;

    fn sample_normals() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0).normalize(),
            Vector3::new(-0.3, 0.7, 0.2).normalize(),
            Vector3::new(1e-6, 1.0, -1e-6).normalize(),
        ]
    }

    #[test]
    fn orthogonal_basis_is_right_handed_orthonormal() {
        for n in sample_normals() {
            let (t1, t2) = create_orthogonal_basis(&n);
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-10);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-10);
            assert!(t1.dot(&n).abs() < 1e-10);
            assert!(t2.dot(&n).abs() < 1e-10);
            assert!(t1.dot(&t2).abs() < 1e-10);
            // right-handedness: n = t1 x t2
            let n_rebuilt = t1.cross(&t2);
            assert_relative_eq!((n_rebuilt - n).norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn plane_projection_is_idempotent_on_plane_points() {
        let x0 = Vector3::new(1.0, 2.0, 3.0);
        let n0 = Vector3::new(1.0, 1.0, 0.5).normalize();
        let (t1, t2) = create_orthogonal_basis(&n0);
        let on_plane = x0 + 0.8 * t1 - 1.7 * t2;
        let projected = project_vertex_to_auxiliary_plane(&on_plane, &x0, &n0);
        assert_relative_eq!((projected - on_plane).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn plane_projection_removes_normal_component() {
        let x0 = Vector3::zeros();
        let n0 = Vector3::z();
        let p = Vector3::new(0.3, -0.4, 2.5);
        let projected = project_vertex_to_auxiliary_plane(&p, &x0, &n0);
        assert_relative_eq!(projected.z, 0.0, epsilon = 1e-15);
        assert_relative_eq!(projected.x, 0.3, epsilon = 1e-15);
    }

    #[test]
    fn rotation_matrix_stacks_nodal_frames() {
        let mut element = SurfaceElement::new(0, ElementKind::Tri3, vec![0, 1, 2]).unwrap();
        element
            .set_field(FieldKind::Normal, 0.0, vec![Vector3::z(); 3])
            .unwrap();
        let q = create_rotation_matrix(&element, 0.0).unwrap();
        assert_eq!(q.nrows(), 9);

        // each block is orthogonal: Q^T Q = I
        let qtq = q.transpose() * &q;
        for i in 0..9 {
            for j in 0..9 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(qtq[(i, j)], expected, epsilon = 1e-12);
            }
        }
        // first column of each block is the normal itself
        assert_relative_eq!(q[(2, 0)], 1.0, epsilon = 1e-15);
        assert_relative_eq!(q[(5, 3)], 1.0, epsilon = 1e-15);
    }
}
