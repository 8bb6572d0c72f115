//! Quadrature rules for triangular integration cells.

/// A single quadrature point on the reference triangle
#[derive(Debug, Clone, Copy)]
pub struct GaussPoint {
    pub weight: f64,
    pub xi: [f64; 2],
}

/// Degree-2 exact 3-point rule on the reference triangle with vertices
/// (0,0), (1,0), (0,1). Weights sum to the reference area 1/2.
pub const TRIANGLE_GAUSS_3: [GaussPoint; 3] = [
    GaussPoint {
        weight: 1.0 / 6.0,
        xi: [1.0 / 6.0, 1.0 / 6.0],
    },
    GaussPoint {
        weight: 1.0 / 6.0,
        xi: [2.0 / 3.0, 1.0 / 6.0],
    },
    GaussPoint {
        weight: 1.0 / 6.0,
        xi: [1.0 / 6.0, 2.0 / 3.0],
    },
];
