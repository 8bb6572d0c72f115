//! Averaged nodal normals for the slave surface.

use crate::error::Result;
use mcx_model::SurfaceElement;
use nalgebra::Vector3;
use std::collections::HashMap;

/// Compute unit nodal normals for all nodes of the given surface elements.
///
/// For every element node, the surface normal is the cross product of the
/// deformed geometry tangents evaluated at that node's reference coordinate.
/// Contributions from all elements sharing a node are summed and the result
/// normalized, so the field is continuous across element boundaries.
/// `rotate_normals` flips the sign of every normal, for meshes whose surface
/// winding points into the body.
pub fn calculate_normals(
    elements: &[SurfaceElement],
    time: f64,
    rotate_normals: bool,
) -> Result<HashMap<usize, Vector3<f64>>> {
    let mut sums: HashMap<usize, Vector3<f64>> = HashMap::new();

    for element in elements {
        let coords = element.current_coordinates(time)?;
        for (local, &node) in element.nodes.iter().enumerate() {
            let xi = element.kind.reference_coordinates()[local];
            let (t1, t2) = element.tangents(&coords, xi);
            let normal = t1.cross(&t2);
            *sums.entry(node).or_insert_with(Vector3::zeros) += normal;
        }
    }

    let sign = if rotate_normals { -1.0 } else { 1.0 };
    let normals = sums
        .into_iter()
        .map(|(node, sum)| (node, sign * sum.normalize()))
        .collect();
    Ok(normals)
}
