//! Polygon clipping on the auxiliary plane and integration-cell generation.
//!
//! The slave and master element outlines are projected onto a common
//! auxiliary plane, intersected into a convex contact polygon, and the
//! polygon is fan-triangulated from its centroid into integration cells.

use crate::error::{ContactError, Result};
use crate::geometry::{create_orthogonal_basis, mean, project_vertex_to_auxiliary_plane};
use nalgebra::Vector3;

/// Absolute area below which a clipped polygon counts as degenerate
pub(crate) const DEGENERATE_AREA: f64 = 1.0e-12;

/// Tolerance of the angle-sum point-in-polygon test
const INSIDE_ATOL: f64 = 1.0e-3;

/// Tolerance for merging coincident clip vertices
const MERGE_TOL: f64 = 1.0e-10;

/// Result of intersecting one slave element projection with one master
/// element projection: an oriented convex polygon on the auxiliary plane.
#[derive(Debug, Clone)]
pub struct ContactSegment {
    /// Master element id
    pub master: usize,
    /// Polygon vertices, ordered counter-clockwise about the plane normal
    pub polygon: Vec<Vector3<f64>>,
    /// Area-weighted centroid
    pub centroid: Vector3<f64>,
    /// Polygon area
    pub area: f64,
}

/// A master element outline handed to the segmentation
#[derive(Debug, Clone)]
pub struct MasterOutline {
    pub id: usize,
    pub polygon: Vec<Vector3<f64>>,
}

/// Triangular sub-region of a contact polygon carrying its own linear
/// parametrization for quadrature
#[derive(Debug, Clone)]
pub struct IntegrationCell {
    /// Centroid, then two consecutive polygon vertices
    pub vertices: [Vector3<f64>; 3],
}

impl IntegrationCell {
    /// Map a reference-triangle point to 3D
    pub fn map(&self, xi: [f64; 2]) -> Vector3<f64> {
        let [v0, v1, v2] = &self.vertices;
        v0 + xi[0] * (v1 - v0) + xi[1] * (v2 - v0)
    }

    /// Constant Jacobian determinant of the linear map
    pub fn det_jacobian(&self) -> f64 {
        let [v0, v1, v2] = &self.vertices;
        (v1 - v0).cross(&(v2 - v0)).norm()
    }
}

/// Angle-sum test whether `q` lies inside (or on the boundary of) the convex
/// polygon `polygon`. Vertex coincidence and on-edge points count as inside.
pub fn vertex_inside_polygon(q: &Vector3<f64>, polygon: &[Vector3<f64>]) -> bool {
    let n = polygon.len();
    let mut angle = 0.0;
    for i in 0..n {
        let a = polygon[i] - q;
        let b = polygon[(i + 1) % n] - q;
        let c = a.norm() * b.norm();
        if c < INSIDE_ATOL {
            return true; // q coincides with a vertex
        }
        let cosa = (a.dot(&b) / c).clamp(-1.0, 1.0);
        if (cosa - 1.0).abs() < INSIDE_ATOL {
            return false; // q outside, on an edge extension
        }
        if (cosa + 1.0).abs() < INSIDE_ATOL {
            return true; // q on the edge interior
        }
        angle += cosa.acos();
    }
    (angle - 2.0 * std::f64::consts::PI).abs() < INSIDE_ATOL
}

fn push_unique(points: &mut Vec<Vector3<f64>>, q: Vector3<f64>) {
    if points.iter().all(|p| (p - q).norm() > MERGE_TOL) {
        points.push(q);
    }
}

/// Intersection of the projected slave outline `s` and master outline `m`,
/// both lying in the plane with normal `n0`. The result is the unordered
/// vertex set of the clip polygon: vertices of either outline contained in
/// the other, plus all edge-edge intersection points.
pub fn get_polygon_clip(
    s: &[Vector3<f64>],
    m: &[Vector3<f64>],
    n0: &Vector3<f64>,
) -> Vec<Vector3<f64>> {
    let mut clip = Vec::new();

    for q in m {
        if vertex_inside_polygon(q, s) {
            push_unique(&mut clip, *q);
        }
    }
    for q in s {
        if vertex_inside_polygon(q, m) {
            push_unique(&mut clip, *q);
        }
    }

    let ns = s.len();
    let nm = m.len();
    for i in 0..nm {
        let x1 = m[i];
        let x2 = m[(i + 1) % nm];
        for j in 0..ns {
            let x3 = s[j];
            let x4 = s[(j + 1) % ns];
            let denom = n0.dot(&(x2 - x1).cross(&(x4 - x3)));
            if denom.abs() < 1.0e-12 {
                continue; // parallel edges
            }
            let t = n0.dot(&(x3 - x1).cross(&(x4 - x3))) / denom;
            if !(0.0..=1.0).contains(&t) {
                continue;
            }
            let q = x1 + t * (x2 - x1);
            if vertex_inside_polygon(&q, s) && vertex_inside_polygon(&q, m) {
                push_unique(&mut clip, q);
            }
        }
    }

    clip
}

/// Order polygon vertices counter-clockwise about `n0`, measured around
/// their arithmetic mean, so that cross(P[i]-C, P[i+1]-C) . n0 > 0 on every
/// edge of a convex polygon.
pub fn check_orientation(polygon: &mut [Vector3<f64>], n0: &Vector3<f64>) {
    let center = mean(polygon);
    let (t1, t2) = create_orthogonal_basis(n0);
    polygon.sort_by(|a, b| {
        let ra = a - center;
        let rb = b - center;
        let aa = ra.dot(&t2).atan2(ra.dot(&t1));
        let ab = rb.dot(&t2).atan2(rb.dot(&t1));
        aa.total_cmp(&ab)
    });
}

/// Polygon area via fan triangulation from the first vertex
pub fn polygon_area(polygon: &[Vector3<f64>]) -> f64 {
    let p0 = polygon[0];
    let mut area = 0.0;
    for i in 1..polygon.len() - 1 {
        area += 0.5 * (polygon[i] - p0).cross(&(polygon[i + 1] - p0)).norm();
    }
    area
}

/// Area-weighted centroid of the fan triangulation from the first vertex.
/// The polygon must have nonzero area.
pub fn polygon_centroid(polygon: &[Vector3<f64>]) -> Vector3<f64> {
    let p0 = polygon[0];
    let mut total = 0.0;
    let mut weighted = Vector3::zeros();
    for i in 1..polygon.len() - 1 {
        let area = 0.5 * (polygon[i] - p0).cross(&(polygon[i + 1] - p0)).norm();
        let centroid = (p0 + polygon[i] + polygon[i + 1]) / 3.0;
        total += area;
        weighted += area * centroid;
    }
    weighted / total
}

/// Fan-triangulate a contact polygon from its centroid into integration cells
pub fn get_cells(polygon: &[Vector3<f64>], centroid: Vector3<f64>) -> Vec<IntegrationCell> {
    let n = polygon.len();
    (0..n)
        .map(|i| IntegrationCell {
            vertices: [centroid, polygon[i], polygon[(i + 1) % n]],
        })
        .collect()
}

/// Project the slave outline and every master outline onto the auxiliary
/// plane (x0, n0) and clip them pairwise.
///
/// Intersections with fewer than 3 vertices carry no overlap and are
/// discarded; an intersection that passes the vertex filter but has
/// (near-)zero area is a hard error, since it signals a degenerate or
/// ill-conditioned clip.
pub fn create_contact_segmentation(
    slave_id: usize,
    slave_outline: &[Vector3<f64>],
    masters: &[MasterOutline],
    x0: &Vector3<f64>,
    n0: &Vector3<f64>,
) -> Result<Vec<ContactSegment>> {
    let s: Vec<Vector3<f64>> = slave_outline
        .iter()
        .map(|p| project_vertex_to_auxiliary_plane(p, x0, n0))
        .collect();

    let mut segments = Vec::new();
    for master in masters {
        let m: Vec<Vector3<f64>> = master
            .polygon
            .iter()
            .map(|p| project_vertex_to_auxiliary_plane(p, x0, n0))
            .collect();

        let mut polygon = get_polygon_clip(&s, &m, n0);
        if polygon.len() < 3 {
            continue; // no true overlap
        }
        check_orientation(&mut polygon, n0);
        let area = polygon_area(&polygon);
        if area < DEGENERATE_AREA {
            return Err(ContactError::GeometricDegeneracy {
                slave: slave_id,
                master: master.id,
                area,
            });
        }
        let centroid = polygon_centroid(&polygon);
        segments.push(ContactSegment {
            master: master.id,
            polygon,
            centroid,
            area,
        });
    }
    Ok(segments)
}
