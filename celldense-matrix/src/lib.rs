//! Sparse-to-dense ingestion with storage-type narrowing for single-cell
//! count matrices.
//!
//! - **Element types**: [`ElementType`] (the six dense storage types) and
//!   the [`Scalar`] / [`Element`] traits over on-disk and storage scalars
//! - **Typed buffers**: [`TypedBuffer`], a tagged union over the storage vectors
//! - **Dense matrices**: [`DenseMatrix`], the row-major destination
//! - **Transforms**: [`Transform`] and counts-per-million normalization
//! - **Classification**: range and integrality checks behind [`select_storage_type`]
//! - **Ingestion**: CSR, CSC and dense sources into a [`DenseMatrix`], in parallel
//! - **Optimization**: [`StoragePolicy`] resolution and choose-then-ingest
//!
//! # Quick start
//!
//! ```
//! use celldense_matrix::{
//!     ingest_sparse_with_policy, ElementType, Layout, SourceArray, SparseSource,
//!     StoragePlan, StoragePolicy,
//! };
//!
//! let values = SourceArray::Float32(vec![3.0, 1.0, 7.0]);
//! let source = SparseSource {
//!     values: &values,
//!     minor: &[0u32, 2, 1],
//!     offsets: &[0u32, 2, 3],
//!     layout: Layout::RowMajor,
//!     rows: 2,
//!     columns: 3,
//! };
//! let plan = StoragePlan { policy: StoragePolicy::OptimizedLossless, ..Default::default() };
//! let matrix = ingest_sparse_with_policy(&source, &plan).unwrap();
//!
//! assert_eq!(matrix.element_type(), ElementType::UInt8);
//! assert_eq!(matrix.get(1, 1), Some(7.0));
//! ```

pub mod buffer;
pub mod classify;
pub mod dense;
pub mod element;
pub mod ingest;
pub mod optimize;
pub mod source;
pub mod sparse;
pub mod transform;

pub use half::bf16;

pub use buffer::{BufferVisitor, BufferVisitorMut, TypedBuffer};
pub use classify::{
    contains_only_integers, in_range, is_integer, select_storage_type, summarize, value_range,
    ValueSummary,
};
pub use dense::DenseMatrix;
pub use element::{bf16_truncate, Element, ElementType, Scalar, SourceKind};
pub use ingest::{
    apply_row_normalization_and_transform, ingest_column_major, ingest_dense, ingest_dense_row,
    ingest_row_major, IngestParams, WriteMode,
};
pub use optimize::{
    choose_storage_type, ingest_dense_with_policy, ingest_sparse_with_policy,
    narrow_dense_matrix, DenseSource, SparseSource, StoragePlan, StoragePolicy,
};
pub use source::SourceArray;
pub use sparse::{DimensionSelection, Layout, SparseArrays, SparseIndex};
pub use transform::{cpm, Transform, CPM_SCALE};
