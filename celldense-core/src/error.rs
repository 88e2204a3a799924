//! Structured error types for the celldense crates.

use thiserror::Error;

/// Unified error type for ingestion and loading.
#[derive(Debug, Error)]
pub enum CellDenseError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected container contents
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two arrays that must run in parallel disagree in length
    #[error("shape mismatch: {what} has length {actual}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Sparse offset array is not a valid prefix-offset table
    #[error("malformed sparse layout: {0}")]
    MalformedSparseLayout(String),

    /// Destination dense buffer was not sized before ingestion
    #[error("unsized destination: buffer holds {actual} elements, expected {expected}")]
    UnsizedDestination { expected: usize, actual: usize },

    /// Failure reported by the HDF5 library
    #[error("HDF5 error: {0}")]
    Hdf5(String),
}

/// Convenience alias used throughout the celldense crates.
pub type Result<T> = std::result::Result<T, CellDenseError>;
