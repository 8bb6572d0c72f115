//! Surface element layer for mortar contact assembly.
//!
//! This crate provides the element-level capabilities the contact kernel
//! consumes as a black box: surface element kinds with their basis functions
//! and parametric derivatives, per-node field storage indexed by time, the
//! Newton inverse mapping from a 3D point back onto the parametric domain of
//! a (possibly curved) surface element, and the quadrature rule used on
//! integration cells.

pub mod element;
pub mod error;
pub mod fields;
pub mod quadrature;

pub use element::{ElementKind, SurfaceElement};
pub use error::{ModelError, Result};
pub use fields::{FieldKind, FieldStore};
pub use quadrature::{GaussPoint, TRIANGLE_GAUSS_3};
