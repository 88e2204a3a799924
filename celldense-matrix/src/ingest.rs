//! Sparse-to-dense ingestion.
//!
//! Every entry point validates its inputs completely before the first write,
//! then fans out over destination rows. Each task receives the disjoint
//! `&mut` slice of exactly one row, so no two tasks can touch the same cell.
//! Column-major sources are first bucketed by row (a stable counting sort
//! over entry positions) and then go through the same row kernel.
//!
//! Per-element rules shared by all entry points:
//!
//! - stored zeros are never written
//! - indices that are negative, removed by the dimension selection, or past
//!   the destination bounds are dropped silently
//! - in [`WriteMode::Set`], duplicate indices within a row resolve to the
//!   last one in source order

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use celldense_core::{CellDenseError, NoProgress, ProgressSink, Result};

use crate::buffer::BufferVisitorMut;
use crate::dense::DenseMatrix;
use crate::element::{Element, Scalar};
use crate::sparse::{DimensionSelection, SparseArrays, SparseIndex};
use crate::transform::{cpm, with_transform_fn, Transform};

/// How transformed values are combined with the destination cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteMode {
    /// Overwrite the cell.
    #[default]
    Set,
    /// Add to the cell.
    Accumulate,
}

/// Per-call ingestion settings.
#[derive(Clone, Copy)]
pub struct IngestParams<'a> {
    pub transform: Transform,
    pub mode: WriteMode,
    /// Maps source minor-axis dimensions to destination columns.
    pub remap: Option<&'a DimensionSelection>,
    pub progress: &'a dyn ProgressSink,
}

impl Default for IngestParams<'_> {
    fn default() -> Self {
        Self {
            transform: Transform::None,
            mode: WriteMode::Set,
            remap: None,
            progress: &NoProgress,
        }
    }
}

impl<'a> IngestParams<'a> {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn remap(mut self, remap: Option<&'a DimensionSelection>) -> Self {
        self.remap = remap;
        self
    }

    pub fn progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }
}

/// Ingest a CSR triple whose major axis is the destination rows.
///
/// `arrays.major_count` must equal `dest.rows()`.
pub fn ingest_row_major<V: Scalar, I: SparseIndex, O: SparseIndex>(
    arrays: &SparseArrays<'_, V, I, O>,
    params: &IngestParams<'_>,
    dest: &mut DenseMatrix,
) -> Result<()> {
    let offsets = arrays.validated_offsets()?;
    dest.ensure_sized(arrays.major_count)?;
    let rows = CsrRows {
        values: arrays.values,
        minor: arrays.minor,
        offsets: &offsets,
        remap: params.remap,
    };
    scatter(dest, &rows, params);
    Ok(())
}

/// Ingest a CSC triple whose major axis is the destination columns.
///
/// `arrays.minor_count` must equal `dest.rows()`; the dimension selection,
/// if any, applies to the major axis.
pub fn ingest_column_major<V: Scalar, I: SparseIndex, O: SparseIndex>(
    arrays: &SparseArrays<'_, V, I, O>,
    params: &IngestParams<'_>,
    dest: &mut DenseMatrix,
) -> Result<()> {
    let offsets = arrays.validated_offsets()?;
    dest.ensure_sized(arrays.minor_count)?;
    let rows = TransposedRows::build(arrays, &offsets, dest.rows(), params.remap);
    scatter(dest, &rows, params);
    Ok(())
}

/// Ingest a dense row-major source of `rows x columns` values, skipping
/// zeros and applying the dimension selection to its columns.
pub fn ingest_dense<V: Scalar>(
    values: &[V],
    rows: usize,
    columns: usize,
    params: &IngestParams<'_>,
    dest: &mut DenseMatrix,
) -> Result<()> {
    if values.len() != rows * columns {
        return Err(CellDenseError::ShapeMismatch {
            what: "dense source",
            expected: rows * columns,
            actual: values.len(),
        });
    }
    dest.ensure_sized(rows)?;
    let source = DenseRows {
        values,
        columns,
        remap: params.remap,
    };
    scatter(dest, &source, params);
    Ok(())
}

/// Write one row from explicit `(column, value)` pairs, overwriting or
/// adding to the existing cells according to `mode`.
pub fn ingest_dense_row<V: Scalar, I: SparseIndex>(
    dest: &mut DenseMatrix,
    row: usize,
    column_indices: &[I],
    row_values: &[V],
    transform: Transform,
    mode: WriteMode,
) -> Result<()> {
    if column_indices.len() != row_values.len() {
        return Err(CellDenseError::ShapeMismatch {
            what: "column index array",
            expected: row_values.len(),
            actual: column_indices.len(),
        });
    }
    if row >= dest.rows() {
        return Err(CellDenseError::InvalidInput(format!(
            "row {row} is outside a matrix of {} rows",
            dest.rows()
        )));
    }
    let columns = dest.columns();
    with_transform_fn!(transform, f => dest.visit_mut(RowWriter {
        offset: row * columns,
        columns,
        indices: column_indices,
        values: row_values,
        mode,
        f,
    }));
    Ok(())
}

/// Replace every nonzero cell `v` with `transform(v)`, or with
/// `transform(cpm(v, row_sum))` when `normalize` is set. The row sum is taken
/// over the untransformed row. Returns immediately for an identity transform
/// without normalization.
pub fn apply_row_normalization_and_transform(
    dest: &mut DenseMatrix,
    transform: Transform,
    normalize: bool,
) {
    if transform.is_identity() && !normalize {
        return;
    }
    let columns = dest.columns();
    with_transform_fn!(transform, f => dest.visit_mut(NormalizeRows { columns, normalize, f }));
}

// ── Row sources ──────────────────────────────────────────────────────────

/// Yields the `(destination column, raw value)` pairs of one destination row.
trait RowEntries: Sync {
    fn for_each_entry(&self, row: usize, sink: impl FnMut(usize, f64));
}

#[inline]
fn remap_index(remap: Option<&DimensionSelection>, index: usize) -> Option<usize> {
    match remap {
        Some(sel) => sel.remap(index),
        None => Some(index),
    }
}

struct CsrRows<'a, V, I> {
    values: &'a [V],
    minor: &'a [I],
    offsets: &'a [usize],
    remap: Option<&'a DimensionSelection>,
}

impl<V: Scalar, I: SparseIndex> RowEntries for CsrRows<'_, V, I> {
    #[inline]
    fn for_each_entry(&self, row: usize, mut sink: impl FnMut(usize, f64)) {
        for i in self.offsets[row]..self.offsets[row + 1] {
            let v = self.values[i].to_f64();
            if v == 0.0 {
                continue;
            }
            let Some(column) = self.minor[i]
                .to_index()
                .and_then(|c| remap_index(self.remap, c))
            else {
                continue;
            };
            sink(column, v);
        }
    }
}

/// Row-bucketed positions of a CSC source.
struct TransposedRows<'a, V> {
    values: &'a [V],
    row_offsets: Vec<usize>,
    columns: Vec<usize>,
    positions: Vec<usize>,
}

impl<'a, V: Scalar> TransposedRows<'a, V> {
    fn build<I: SparseIndex, O>(
        arrays: &SparseArrays<'a, V, I, O>,
        offsets: &[usize],
        rows: usize,
        remap: Option<&DimensionSelection>,
    ) -> Self {
        let keep = |i: usize| -> Option<usize> {
            if arrays.values[i].to_f64() == 0.0 {
                return None;
            }
            arrays.minor[i].to_index().filter(|&r| r < rows)
        };

        let mut row_offsets = vec![0usize; rows + 1];
        for major in 0..arrays.major_count {
            if remap_index(remap, major).is_none() {
                continue;
            }
            for i in offsets[major]..offsets[major + 1] {
                if let Some(r) = keep(i) {
                    row_offsets[r + 1] += 1;
                }
            }
        }
        for r in 0..rows {
            row_offsets[r + 1] += row_offsets[r];
        }

        let kept = row_offsets[rows];
        let mut columns = vec![0usize; kept];
        let mut positions = vec![0usize; kept];
        let mut cursor = row_offsets.clone();
        for major in 0..arrays.major_count {
            let Some(column) = remap_index(remap, major) else {
                continue;
            };
            for i in offsets[major]..offsets[major + 1] {
                if let Some(r) = keep(i) {
                    let slot = cursor[r];
                    columns[slot] = column;
                    positions[slot] = i;
                    cursor[r] += 1;
                }
            }
        }

        Self {
            values: arrays.values,
            row_offsets,
            columns,
            positions,
        }
    }
}

impl<V: Scalar> RowEntries for TransposedRows<'_, V> {
    #[inline]
    fn for_each_entry(&self, row: usize, mut sink: impl FnMut(usize, f64)) {
        for k in self.row_offsets[row]..self.row_offsets[row + 1] {
            sink(self.columns[k], self.values[self.positions[k]].to_f64());
        }
    }
}

struct DenseRows<'a, V> {
    values: &'a [V],
    columns: usize,
    remap: Option<&'a DimensionSelection>,
}

impl<V: Scalar> RowEntries for DenseRows<'_, V> {
    #[inline]
    fn for_each_entry(&self, row: usize, mut sink: impl FnMut(usize, f64)) {
        let start = row * self.columns;
        for (c, value) in self.values[start..start + self.columns].iter().enumerate() {
            let v = value.to_f64();
            if v == 0.0 {
                continue;
            }
            if let Some(column) = remap_index(self.remap, c) {
                sink(column, v);
            }
        }
    }
}

// ── Kernels ──────────────────────────────────────────────────────────────

fn scatter<R: RowEntries>(dest: &mut DenseMatrix, rows: &R, params: &IngestParams<'_>) {
    let tracker = ProgressTracker::new(params.progress, dest.rows());
    let columns = dest.columns();
    let mode = params.mode;
    with_transform_fn!(params.transform, f => dest.visit_mut(Scatter {
        rows,
        columns,
        mode,
        f,
        tracker: &tracker,
    }));
    tracker.finish();
}

struct Scatter<'a, R, F> {
    rows: &'a R,
    columns: usize,
    mode: WriteMode,
    f: F,
    tracker: &'a ProgressTracker<'a>,
}

impl<R, F> BufferVisitorMut for Scatter<'_, R, F>
where
    R: RowEntries,
    F: Fn(f64) -> f64 + Send + Sync,
{
    type Output = ();

    fn visit<T: Element>(self, out: &mut [T]) {
        let Scatter {
            rows,
            columns,
            mode,
            f,
            tracker,
        } = self;
        if columns == 0 {
            return;
        }
        let fill = |(row, dst): (usize, &mut [T])| {
            match mode {
                WriteMode::Set => rows.for_each_entry(row, |c, v| {
                    if c < columns {
                        dst[c] = T::from_f64(f(v));
                    }
                }),
                WriteMode::Accumulate => rows.for_each_entry(row, |c, v| {
                    if c < columns {
                        dst[c] = dst[c].accumulate(f(v));
                    }
                }),
            }
            tracker.tick();
        };
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            out.par_chunks_mut(columns).enumerate().for_each(fill);
        }
        #[cfg(not(feature = "parallel"))]
        {
            out.chunks_mut(columns).enumerate().for_each(fill);
        }
    }
}

struct RowWriter<'a, I, V, F> {
    offset: usize,
    columns: usize,
    indices: &'a [I],
    values: &'a [V],
    mode: WriteMode,
    f: F,
}

impl<I: SparseIndex, V: Scalar, F: Fn(f64) -> f64> BufferVisitorMut for RowWriter<'_, I, V, F> {
    type Output = ();

    fn visit<T: Element>(self, out: &mut [T]) {
        let dst = &mut out[self.offset..self.offset + self.columns];
        for (index, value) in self.indices.iter().zip(self.values) {
            let v = value.to_f64();
            if v == 0.0 {
                continue;
            }
            let Some(c) = index.to_index().filter(|&c| c < self.columns) else {
                continue;
            };
            dst[c] = match self.mode {
                WriteMode::Set => T::from_f64((self.f)(v)),
                WriteMode::Accumulate => dst[c].accumulate((self.f)(v)),
            };
        }
    }
}

struct NormalizeRows<F> {
    columns: usize,
    normalize: bool,
    f: F,
}

impl<F: Fn(f64) -> f64 + Send + Sync> BufferVisitorMut for NormalizeRows<F> {
    type Output = ();

    fn visit<T: Element>(self, out: &mut [T]) {
        let NormalizeRows { columns, normalize, f } = self;
        if columns == 0 {
            return;
        }
        let apply = |row: &mut [T]| {
            let sum: f64 = row.iter().map(|v| v.to_f64()).sum();
            for cell in row.iter_mut() {
                let v = cell.to_f64();
                if v == 0.0 {
                    continue;
                }
                let n = if normalize { cpm(v, sum) } else { v };
                *cell = T::from_f64(f(n));
            }
        };
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            out.par_chunks_mut(columns).for_each(apply);
        }
        #[cfg(not(feature = "parallel"))]
        {
            out.chunks_mut(columns).for_each(apply);
        }
    }
}

// ── Progress ─────────────────────────────────────────────────────────────

/// Forwards roughly one update per percent of rows. Reports are
/// monotonic: a contended or stale report is dropped rather than awaited.
struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    total: usize,
    stride: usize,
    done: AtomicUsize,
    reported: Mutex<usize>,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            total,
            stride: (total / 100).max(1),
            done: AtomicUsize::new(0),
            reported: Mutex::new(0),
        }
    }

    #[inline]
    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.stride == 0 {
            if let Ok(mut last) = self.reported.try_lock() {
                if done > *last {
                    *last = done;
                    self.sink.progress(done, self.total);
                }
            }
        }
    }

    fn finish(&self) {
        let mut last = match self.reported.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last < self.total {
            *last = self.total;
            self.sink.progress(self.total, self.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use celldense_core::LatestProgress;

    // 3 x 4:
    // [1 0 2 0]
    // [0 0 0 0]
    // [0 3 0 4]
    const VALUES: [f32; 4] = [1.0, 2.0, 3.0, 4.0];
    const COLS: [u32; 4] = [0, 2, 1, 3];
    const PTR: [u64; 4] = [0, 2, 2, 4];

    fn csr() -> SparseArrays<'static, f32, u32, u64> {
        SparseArrays::new(&VALUES, &COLS, &PTR, 3, 4)
    }

    fn ingest_csr(params: &IngestParams<'_>) -> DenseMatrix {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 3, 4);
        ingest_row_major(&csr(), params, &mut m).unwrap();
        m
    }

    #[test]
    fn row_major_set() {
        let m = ingest_csr(&IngestParams::default());
        assert_eq!(
            m.as_slice::<f32>(),
            &[1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0, 4.0]
        );
    }

    #[test]
    fn repeated_set_ingestion_is_idempotent() {
        let a = ingest_csr(&IngestParams::default());
        let mut b = ingest_csr(&IngestParams::default());
        ingest_row_major(&csr(), &IngestParams::default(), &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn accumulate_matches_set_for_unique_indices() {
        let set = ingest_csr(&IngestParams::default());
        let acc = ingest_csr(&IngestParams::default().mode(WriteMode::Accumulate));
        assert_eq!(set, acc);
    }

    #[test]
    fn duplicates_accumulate_or_last_write_wins() {
        let values = [1.0f32, 2.0, 5.0];
        let cols = [1i32, 1, 1];
        let ptr = [0i32, 3];
        let a = SparseArrays::new(&values, &cols, &ptr, 1, 2);

        let mut acc = DenseMatrix::zeroed(ElementType::Float32, 1, 2);
        ingest_row_major(&a, &IngestParams::default().mode(WriteMode::Accumulate), &mut acc)
            .unwrap();
        assert_eq!(acc.as_slice::<f32>(), &[0.0, 8.0]);

        let mut set = DenseMatrix::zeroed(ElementType::Float32, 1, 2);
        ingest_row_major(&a, &IngestParams::default(), &mut set).unwrap();
        assert_eq!(set.as_slice::<f32>(), &[0.0, 5.0]);
    }

    #[test]
    fn stored_zeros_are_not_written() {
        let values = [0.0f32, 7.0];
        let cols = [0u32, 1];
        let ptr = [0u32, 2];
        let a = SparseArrays::new(&values, &cols, &ptr, 1, 2);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 1, 2);
        m.set_point_at(0, 0, 9.0);
        ingest_row_major(&a, &IngestParams::new(Transform::Log), &mut m).unwrap();
        assert_eq!(m.get(0, 0), Some(9.0));
        assert_eq!(m.get(0, 1), Some(3.0));
    }

    #[test]
    fn transform_applied_per_element() {
        let m = ingest_csr(&IngestParams::new(Transform::Sqrt));
        assert_eq!(m.get(2, 3), Some(2.0));
        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(1, 1), Some(0.0));
    }

    #[test]
    fn out_of_range_and_negative_columns_dropped() {
        let values = [1.0f32, 2.0, 3.0];
        let cols = [-1i64, 9, 1];
        let ptr = [0i64, 3];
        let a = SparseArrays::new(&values, &cols, &ptr, 1, 2);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 1, 2);
        ingest_row_major(&a, &IngestParams::default(), &mut m).unwrap();
        assert_eq!(m.as_slice::<f32>(), &[0.0, 3.0]);
    }

    #[test]
    fn removed_dimensions_are_dropped() {
        let sel = DimensionSelection::from_mask(&[true, false, false, true]);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 3, sel.selected_count());
        ingest_row_major(&csr(), &IngestParams::default().remap(Some(&sel)), &mut m).unwrap();
        assert_eq!(m.as_slice::<f32>(), &[1.0, 0.0, 0.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn column_major_matches_row_major() {
        // Same matrix as `csr()` in CSC form.
        let values = [1.0f32, 3.0, 2.0, 4.0];
        let rows = [0u32, 2, 0, 2];
        let ptr = [0u64, 1, 2, 3, 4];
        let csc = SparseArrays::new(&values, &rows, &ptr, 4, 3);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 3, 4);
        ingest_column_major(&csc, &IngestParams::default(), &mut m).unwrap();
        assert_eq!(m, ingest_csr(&IngestParams::default()));
    }

    #[test]
    fn column_major_selection_applies_to_major_axis() {
        let values = [1.0f32, 3.0, 2.0, 4.0];
        let rows = [0u32, 2, 0, 2];
        let ptr = [0u64, 1, 2, 3, 4];
        let csc = SparseArrays::new(&values, &rows, &ptr, 4, 3);
        let sel = DimensionSelection::from_mask(&[false, true, true, false]);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 3, 2);
        ingest_column_major(&csc, &IngestParams::default().remap(Some(&sel)), &mut m).unwrap();
        assert_eq!(m.as_slice::<f32>(), &[0.0, 2.0, 0.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn exon_then_intron_accumulates() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 3, 4);
        ingest_row_major(&csr(), &IngestParams::default(), &mut m).unwrap();
        ingest_row_major(&csr(), &IngestParams::default().mode(WriteMode::Accumulate), &mut m)
            .unwrap();
        assert_eq!(m.get(2, 3), Some(8.0));
    }

    #[test]
    fn structural_errors() {
        let mut unsized_dest = DenseMatrix::new(ElementType::Float32);
        let err = ingest_row_major(&csr(), &IngestParams::default(), &mut unsized_dest).unwrap_err();
        assert!(matches!(err, CellDenseError::UnsizedDestination { expected: 0, actual: 0 }));

        let mut wrong_rows = DenseMatrix::zeroed(ElementType::Float32, 2, 4);
        let err = ingest_row_major(&csr(), &IngestParams::default(), &mut wrong_rows).unwrap_err();
        assert!(matches!(err, CellDenseError::UnsizedDestination { .. }));

        let short = [0u32, 1];
        let a = SparseArrays::new(&VALUES, &short, &PTR, 3, 4);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 3, 4);
        assert!(matches!(
            ingest_row_major(&a, &IngestParams::default(), &mut m),
            Err(CellDenseError::ShapeMismatch { .. })
        ));

        let bad_ptr = [0u64, 3, 2, 4];
        let a = SparseArrays::new(&VALUES, &COLS, &bad_ptr, 3, 4);
        assert!(matches!(
            ingest_row_major(&a, &IngestParams::default(), &mut m),
            Err(CellDenseError::MalformedSparseLayout(_))
        ));
        // Validation runs before any write.
        assert_eq!(m.nnz(), 0);
    }

    #[test]
    fn narrow_destination_types() {
        let mut m = DenseMatrix::zeroed(ElementType::UInt8, 3, 4);
        ingest_row_major(&csr(), &IngestParams::default(), &mut m).unwrap();
        assert_eq!(m.as_slice::<u8>(), &[1, 0, 2, 0, 0, 0, 0, 0, 0, 3, 0, 4]);
    }

    #[test]
    fn dense_row_writes() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 2, 3);
        ingest_dense_row(&mut m, 1, &[2u32, 0, 5], &[15.0f64, 0.0, 1.0], Transform::Log, WriteMode::Set)
            .unwrap();
        assert_eq!(m.row_f64(1), Some(vec![0.0, 0.0, 4.0]));
        assert_eq!(m.row_f64(0), Some(vec![0.0, 0.0, 0.0]));

        let err = ingest_dense_row(&mut m, 0, &[0u32], &[1.0f32, 2.0], Transform::None, WriteMode::Set);
        assert!(matches!(err, Err(CellDenseError::ShapeMismatch { .. })));
        assert!(ingest_dense_row(&mut m, 2, &[0u32], &[1.0f32], Transform::None, WriteMode::Set).is_err());
    }

    #[test]
    fn dense_row_accumulates() {
        let mut m = DenseMatrix::zeroed(ElementType::UInt8, 1, 3);
        ingest_dense_row(&mut m, 0, &[0u32, 2], &[3u8, 4], Transform::None, WriteMode::Set).unwrap();
        ingest_dense_row(&mut m, 0, &[2u32, 2, 1], &[5u8, 1, 7], Transform::None, WriteMode::Accumulate)
            .unwrap();
        assert_eq!(m.as_slice::<u8>(), &[3, 7, 10]);
        ingest_dense_row(&mut m, 0, &[0u32], &[9u8], Transform::None, WriteMode::Set).unwrap();
        assert_eq!(m.as_slice::<u8>(), &[9, 7, 10]);
    }

    #[test]
    fn dense_source_with_selection() {
        let values = [1u16, 0, 2, 3, 4, 0];
        let sel = DimensionSelection::from_mask(&[true, false, true]);
        let mut m = DenseMatrix::zeroed(ElementType::UInt16, 2, 2);
        ingest_dense(&values, 2, 3, &IngestParams::default().remap(Some(&sel)), &mut m).unwrap();
        assert_eq!(m.as_slice::<u16>(), &[1, 2, 3, 0]);

        let err = ingest_dense(&values, 2, 2, &IngestParams::default(), &mut m);
        assert!(matches!(err, Err(CellDenseError::ShapeMismatch { .. })));
    }

    #[test]
    fn row_normalization() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 2, 4);
        for (c, v) in [0.0, 3.0, 0.0, 1.0].into_iter().enumerate() {
            m.set_point_at(0, c, v);
        }
        apply_row_normalization_and_transform(&mut m, Transform::None, true);
        assert_eq!(m.row_f64(0), Some(vec![0.0, 750000.0, 0.0, 250000.0]));
        assert_eq!(m.row_f64(1), Some(vec![0.0; 4]));
    }

    #[test]
    fn normalization_then_transform() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 1, 2);
        m.set_point_at(0, 0, 1.0);
        m.set_point_at(0, 1, 3.0);
        apply_row_normalization_and_transform(&mut m, Transform::Log, true);
        let expect = (1.0f64 + 250000.0).log2() as f32;
        assert_eq!(m.as_slice::<f32>()[0], expect);
    }

    #[test]
    fn identity_without_normalization_is_noop() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 1, 2);
        m.set_point_at(0, 1, 3.0);
        let before = m.clone();
        apply_row_normalization_and_transform(&mut m, Transform::None, false);
        assert_eq!(m, before);
        apply_row_normalization_and_transform(&mut m, Transform::Sqrt, false);
        assert_eq!(m.get(0, 1), Some(3f64.sqrt() as f32 as f64));
    }

    #[test]
    fn progress_reaches_total_monotonically() {
        let n = 1000;
        let values = vec![1.0f32; n];
        let cols = vec![0u32; n];
        let ptr: Vec<u64> = (0..=n as u64).collect();
        let a = SparseArrays::new(&values, &cols, &ptr, n, 1);
        let seen = Mutex::new(Vec::new());
        let sink = |done: usize, total: usize| {
            assert_eq!(total, n);
            seen.lock().unwrap().push(done);
        };
        let mut m = DenseMatrix::zeroed(ElementType::Float32, n, 1);
        ingest_row_major(&a, &IngestParams::default().progress(&sink), &mut m).unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.last(), Some(&n));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.len() <= 101);
    }

    #[test]
    fn progress_for_empty_matrix() {
        let sink = LatestProgress::new();
        let values: [f32; 0] = [];
        let cols: [u32; 0] = [];
        let ptr = [0u32];
        let a = SparseArrays::new(&values, &cols, &ptr, 0, 0);
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 0, 0);
        ingest_row_major(&a, &IngestParams::default().progress(&sink), &mut m).unwrap();
        assert_eq!(sink.calls(), 0);
    }
}
