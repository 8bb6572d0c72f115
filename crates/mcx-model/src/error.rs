//! Error types for mcx-model

use crate::fields::FieldKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("element {element}: field {field:?} has no value at time {time}")]
    MissingField {
        element: usize,
        field: FieldKind,
        time: f64,
    },

    #[error("element {element}: expected {expected} nodal values, got {actual}")]
    NodeCountMismatch {
        element: usize,
        expected: usize,
        actual: usize,
    },

    #[error("projection onto element {element} did not converge in {iterations} iterations")]
    ProjectionFailed { element: usize, iterations: usize },
}
