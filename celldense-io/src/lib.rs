//! Loaders turning single-cell HDF5 containers into dense matrices.
//!
//! - **Options**: [`LoadOptions`] selects the storage policy, transform,
//!   normalization and dimension subset
//! - **Datasets**: [`LoadedDataset`], the populated matrix with its names,
//!   [`Annotation`]s, [`Embedding`]s and extra [`Layer`]s
//! - **Formats**: [`Format`] detection; with the `h5` feature, `read_10x`,
//!   `read_h5ad`, `read_tome` and `load`
//!
//! The readers need the `h5` feature and a system HDF5 library.

pub mod dataset;
pub mod format;
pub mod metadata;
pub mod options;

#[cfg(feature = "h5")]
pub mod h5ad;
#[cfg(feature = "h5")]
mod h5util;
#[cfg(feature = "h5")]
pub mod tenx;
#[cfg(feature = "h5")]
pub mod tome;

pub use dataset::{Layer, LoadedDataset};
pub use format::Format;
pub use metadata::{Annotation, AnnotationValues, Embedding};
pub use options::LoadOptions;

#[cfg(feature = "h5")]
pub use format::{load, load_with_progress};
#[cfg(feature = "h5")]
pub use h5ad::read_h5ad;
#[cfg(feature = "h5")]
pub use tenx::read_10x;
#[cfg(feature = "h5")]
pub use tome::read_tome;
