//! Mortar contact assembly kernel.
//!
//! Computes nonlinear mechanical contact constraints between two deformable
//! 3D surfaces with the mortar (dual-basis, segment-to-segment) method. A
//! slave surface element is projected onto an auxiliary tangent plane
//! together with its candidate master elements, the projected outlines are
//! clipped into contact polygons, and the polygons are integrated into
//! coupling operators C1/C2/D and the weighted gap g. After all element
//! pairs are processed, an active-set state machine classifies every slave
//! node and rewrites the constraint rows accordingly.
//!
//! The element layer (basis functions, field storage, inverse mapping) is
//! consumed from the `mcx-model` crate; the surrounding nonlinear solver,
//! contact search and mesh I/O are external.

pub mod assembly;
pub mod clipping;
pub mod config;
pub mod error;
pub mod geometry;
pub mod integrator;
pub mod normals;
pub mod sparse;
pub mod state;

pub use assembly::{ContactInterface, global_dofs};
pub use clipping::{
    ContactSegment, IntegrationCell, MasterOutline, check_orientation,
    create_contact_segmentation, get_cells, get_polygon_clip, polygon_area, polygon_centroid,
    vertex_inside_polygon,
};
pub use config::{ContactConfig, InitialContactState};
pub use error::{ContactError, Result};
pub use geometry::{
    create_orthogonal_basis, create_rotation_matrix, project_vertex_to_auxiliary_plane,
};
pub use normals::calculate_normals;
pub use sparse::{MortarAssembly, SparseAccumulator, to_dense};
pub use state::{
    AssembledInterface, ContactState, InterfaceStatistics, NodeContactState,
};
