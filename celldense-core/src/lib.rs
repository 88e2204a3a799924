//! Shared primitives for the celldense single-cell ingestion crates.
//!
//! `celldense-core` provides the foundation the other crates build on:
//!
//! - **Error types**: [`CellDenseError`] and [`Result`] for structured error handling
//! - **Traits**: [`Summarizable`] for display and [`ProgressSink`] for coarse progress reporting

pub mod error;
pub mod traits;

pub use error::{CellDenseError, Result};
pub use traits::*;
