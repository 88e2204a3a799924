//! Storage-type selection and choose-then-ingest entry points.
//!
//! An automatic policy is resolved to a concrete element type first; the
//! entry point then calls itself with [`StoragePolicy::Explicit`], which
//! allocates the destination at that type and ingests straight from the
//! source. No wider intermediate dense buffer is ever built.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use celldense_core::{CellDenseError, NoProgress, ProgressSink, Result};

use crate::buffer::BufferVisitor;
use crate::classify::{select_storage_type, summarize, ValueSummary};
use crate::dense::DenseMatrix;
use crate::element::{Element, ElementType};
use crate::ingest::{
    apply_row_normalization_and_transform, ingest_column_major, ingest_dense, ingest_row_major,
    IngestParams,
};
use crate::source::SourceArray;
use crate::sparse::{DimensionSelection, Layout, SparseArrays, SparseIndex};
use crate::transform::Transform;
use crate::with_source_values;

/// How the dense element type is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StoragePolicy {
    /// Smallest integer type that holds every value exactly (code `-3`).
    #[default]
    OptimizedLossless,
    /// As `OptimizedLossless`, but falls back to bfloat16 instead of
    /// 16-bit integers or the native type (code `-2`).
    OptimizedBFloat16,
    /// Keep the source element type (code `-1`).
    Original,
    /// A fixed element type (codes `0..=5`).
    Explicit(ElementType),
}

impl StoragePolicy {
    /// Decode an integer policy code. Unknown codes fall back to
    /// [`StoragePolicy::Original`].
    pub fn from_code(code: i32) -> Self {
        match code {
            -3 => StoragePolicy::OptimizedLossless,
            -2 => StoragePolicy::OptimizedBFloat16,
            -1 => StoragePolicy::Original,
            other => match ElementType::from_code(other) {
                Some(t) => StoragePolicy::Explicit(t),
                None => {
                    warn!(code = other, "unknown storage policy code, keeping the original element type");
                    StoragePolicy::Original
                }
            },
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            StoragePolicy::OptimizedLossless => -3,
            StoragePolicy::OptimizedBFloat16 => -2,
            StoragePolicy::Original => -1,
            StoragePolicy::Explicit(t) => t.code(),
        }
    }

    pub fn is_optimized(&self) -> bool {
        matches!(
            self,
            StoragePolicy::OptimizedLossless | StoragePolicy::OptimizedBFloat16
        )
    }

    pub fn allows_lossy(&self) -> bool {
        matches!(self, StoragePolicy::OptimizedBFloat16)
    }
}

impl fmt::Display for StoragePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoragePolicy::OptimizedLossless => f.write_str("optimized"),
            StoragePolicy::OptimizedBFloat16 => f.write_str("optimized-bfloat16"),
            StoragePolicy::Original => f.write_str("original"),
            StoragePolicy::Explicit(t) => write!(f, "{t}"),
        }
    }
}

impl FromStr for StoragePolicy {
    type Err = CellDenseError;

    /// Accepts the display names, any element type name, or an integer code.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "optimized" | "optimized-lossless" => Ok(StoragePolicy::OptimizedLossless),
            "optimized-bfloat16" | "optimized-bf16" => Ok(StoragePolicy::OptimizedBFloat16),
            "original" => Ok(StoragePolicy::Original),
            other => {
                if let Ok(code) = other.parse::<i32>() {
                    return Ok(StoragePolicy::from_code(code));
                }
                other
                    .parse::<ElementType>()
                    .map(StoragePolicy::Explicit)
                    .map_err(|_| {
                        CellDenseError::InvalidInput(format!("unknown storage policy: {s}"))
                    })
            }
        }
    }
}

/// Everything besides the source arrays that shapes one load.
#[derive(Clone, Copy)]
pub struct StoragePlan<'a> {
    pub policy: StoragePolicy,
    pub transform: Transform,
    /// Counts-per-million normalize each row before the transform.
    pub normalize: bool,
    /// Selection over the column dimensions of the source.
    pub selection: Option<&'a DimensionSelection>,
    pub progress: &'a dyn ProgressSink,
}

impl Default for StoragePlan<'_> {
    fn default() -> Self {
        Self {
            policy: StoragePolicy::default(),
            transform: Transform::None,
            normalize: false,
            selection: None,
            progress: &NoProgress,
        }
    }
}

impl StoragePlan<'_> {
    fn with_policy(&self, policy: StoragePolicy) -> Self {
        Self { policy, ..*self }
    }

    fn output_columns(&self, source_columns: usize) -> usize {
        self.selection
            .map_or(source_columns, DimensionSelection::selected_count)
    }

    /// The transform applied while ingesting; normalization defers it to the
    /// row pass.
    fn ingest_transform(&self) -> Transform {
        if self.normalize {
            Transform::None
        } else {
            self.transform
        }
    }
}

/// Resolve `policy` to the element type the values will be stored as.
///
/// Ranges are taken over the transformed values. Normalized rows are
/// fractional, so normalization skips the integer candidates. A transform
/// or normalization on an integral source stores `Original` as float32.
pub fn choose_storage_type(
    values: &SourceArray,
    policy: StoragePolicy,
    transform: Transform,
    normalize: bool,
) -> ElementType {
    let reshaped = normalize || !transform.is_identity();
    let native = match values.storage_type() {
        t if t.is_integral() && reshaped => ElementType::Float32,
        t => t,
    };
    match policy {
        StoragePolicy::Explicit(t) => t,
        StoragePolicy::Original => native,
        _ if normalize => {
            let chosen = if policy.allows_lossy() {
                ElementType::BFloat16
            } else {
                ElementType::Float32
            };
            debug!(%chosen, "normalized rows, skipping integer storage candidates");
            chosen
        }
        _ => {
            let summary = values.summarize(transform);
            let chosen = select_storage_type(
                &summary,
                native,
                values.kind().size_bytes(),
                policy.allows_lossy(),
            );
            debug!(
                min = summary.min,
                max = summary.max,
                integral = summary.all_integral,
                source = ?values.kind(),
                %chosen,
                "selected storage type"
            );
            chosen
        }
    }
}

/// A compressed sparse source held by the caller.
///
/// `rows` / `columns` describe the full source matrix regardless of
/// `layout`; the selection in the plan applies to `columns`.
#[derive(Debug, Clone, Copy)]
pub struct SparseSource<'a, I, O> {
    pub values: &'a SourceArray,
    pub minor: &'a [I],
    pub offsets: &'a [O],
    pub layout: Layout,
    pub rows: usize,
    pub columns: usize,
}

/// A dense row-major source of `rows x columns` values.
#[derive(Debug, Clone, Copy)]
pub struct DenseSource<'a> {
    pub values: &'a SourceArray,
    pub rows: usize,
    pub columns: usize,
}

/// Choose a storage type for `source` under `plan` and ingest into a new
/// dense matrix of that type.
pub fn ingest_sparse_with_policy<I: SparseIndex, O: SparseIndex>(
    source: &SparseSource<'_, I, O>,
    plan: &StoragePlan<'_>,
) -> Result<DenseMatrix> {
    let element_type = match plan.policy {
        StoragePolicy::Explicit(t) => t,
        policy => {
            let t = choose_storage_type(source.values, policy, plan.transform, plan.normalize);
            return ingest_sparse_with_policy(source, &plan.with_policy(StoragePolicy::Explicit(t)));
        }
    };

    let (major, minor) = match source.layout {
        Layout::RowMajor => (source.rows, source.columns),
        Layout::ColumnMajor => (source.columns, source.rows),
    };
    let params = IngestParams::new(plan.ingest_transform())
        .remap(plan.selection)
        .progress(plan.progress);
    let mut dest = DenseMatrix::zeroed(
        ingest_element_type(element_type, plan.normalize),
        source.rows,
        plan.output_columns(source.columns),
    );
    with_source_values!(source.values, v => {
        let arrays = SparseArrays::new(v, source.minor, source.offsets, major, minor);
        match source.layout {
            Layout::RowMajor => ingest_row_major(&arrays, &params, &mut dest),
            Layout::ColumnMajor => ingest_column_major(&arrays, &params, &mut dest),
        }
    })?;
    Ok(finish(dest, element_type, plan))
}

/// Dense counterpart of [`ingest_sparse_with_policy`].
pub fn ingest_dense_with_policy(
    source: &DenseSource<'_>,
    plan: &StoragePlan<'_>,
) -> Result<DenseMatrix> {
    let element_type = match plan.policy {
        StoragePolicy::Explicit(t) => t,
        policy => {
            let t = choose_storage_type(source.values, policy, plan.transform, plan.normalize);
            return ingest_dense_with_policy(source, &plan.with_policy(StoragePolicy::Explicit(t)));
        }
    };

    let params = IngestParams::new(plan.ingest_transform())
        .remap(plan.selection)
        .progress(plan.progress);
    let mut dest = DenseMatrix::zeroed(
        ingest_element_type(element_type, plan.normalize),
        source.rows,
        plan.output_columns(source.columns),
    );
    with_source_values!(source.values, v => {
        ingest_dense(v, source.rows, source.columns, &params, &mut dest)
    })?;
    Ok(finish(dest, element_type, plan))
}

/// Narrow an already populated matrix according to `policy`. The values are
/// classified as stored; no transform is applied.
pub fn narrow_dense_matrix(matrix: DenseMatrix, policy: StoragePolicy) -> DenseMatrix {
    let current = matrix.element_type();
    let target = match policy {
        StoragePolicy::Original => current,
        StoragePolicy::Explicit(t) => t,
        _ => {
            let summary = matrix.visit(SummarizeBuffer);
            select_storage_type(
                &summary,
                current,
                current.size_bytes(),
                policy.allows_lossy(),
            )
        }
    };
    if target == current {
        return matrix;
    }
    debug!(from = %current, to = %target, "narrowing populated matrix");
    matrix.to_element_type(target)
}

/// Normalization needs float cells to hold fractional row shares.
fn ingest_element_type(target: ElementType, normalize: bool) -> ElementType {
    if normalize {
        ElementType::Float32
    } else {
        target
    }
}

fn finish(mut dest: DenseMatrix, target: ElementType, plan: &StoragePlan<'_>) -> DenseMatrix {
    if !plan.normalize {
        return dest;
    }
    apply_row_normalization_and_transform(&mut dest, plan.transform, true);
    if target == dest.element_type() {
        dest
    } else {
        dest.to_element_type(target)
    }
}

struct SummarizeBuffer;

impl BufferVisitor for SummarizeBuffer {
    type Output = ValueSummary;
    fn visit<T: Element>(self, values: &[T]) -> ValueSummary {
        summarize(values, Transform::None)
    }
}
