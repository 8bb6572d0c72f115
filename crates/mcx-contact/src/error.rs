//! Error types for mcx-contact

use mcx_model::{ElementKind, ModelError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContactError>;

#[derive(Error, Debug)]
pub enum ContactError {
    /// A clipped contact polygon passed the minimum-vertex filter but has
    /// (near-)zero area. This signals corrupted geometry or normals and
    /// aborts the whole assembly step.
    #[error(
        "degenerate contact polygon between slave element {slave} and master element {master} \
         (area = {area:.3e})"
    )]
    GeometricDegeneracy {
        slave: usize,
        master: usize,
        area: f64,
    },

    /// The biorthogonal mass matrix of a slave element is singular, so the
    /// dual-basis coefficients Ae = De * Me^-1 cannot be formed.
    #[error("singular biorthogonal mass matrix on slave element {0}")]
    SingularDualBasis(usize),

    #[error("unsupported slave element kind {kind:?} for the {driver} assembly driver")]
    UnsupportedElement {
        kind: ElementKind,
        driver: &'static str,
    },

    #[error("slave element {slave} references unknown master element {master}")]
    UnknownMasterElement { slave: usize, master: usize },

    #[error("boundary transform is singular for alpha = {0}")]
    SingularBoundaryTransform(f64),

    #[error("reaction force vector has {actual} entries, expected {expected}")]
    ReactionForceDimension { expected: usize, actual: usize },

    #[error(transparent)]
    Model(#[from] ModelError),
}
