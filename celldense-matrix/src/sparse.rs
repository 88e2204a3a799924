//! Borrowed CSR/CSC views and dimension selection.

use celldense_core::{CellDenseError, Result};

/// Orientation of a compressed sparse triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layout {
    /// CSR: offsets delimit rows, minor indices are columns.
    RowMajor,
    /// CSC: offsets delimit columns, minor indices are rows.
    ColumnMajor,
}

/// An on-disk integer usable as a sparse index or offset.
pub trait SparseIndex: Copy + Send + Sync + 'static {
    /// The value as `usize`, or `None` when negative or too large.
    fn to_index(self) -> Option<usize>;
}

macro_rules! impl_sparse_index {
    ($($ty:ty),*) => {
        $(
            impl SparseIndex for $ty {
                #[inline]
                fn to_index(self) -> Option<usize> {
                    usize::try_from(self).ok()
                }
            }
        )*
    };
}

impl_sparse_index!(i32, i64, u32, u64, usize);

/// A caller-owned compressed sparse triple.
///
/// `offsets` has `major_count + 1` entries delimiting each major slice of
/// `values` / `minor`.
#[derive(Debug, Clone, Copy)]
pub struct SparseArrays<'a, V, I = usize, O = usize> {
    pub values: &'a [V],
    pub minor: &'a [I],
    pub offsets: &'a [O],
    pub major_count: usize,
    pub minor_count: usize,
}

impl<'a, V, I: SparseIndex, O: SparseIndex> SparseArrays<'a, V, I, O> {
    pub fn new(
        values: &'a [V],
        minor: &'a [I],
        offsets: &'a [O],
        major_count: usize,
        minor_count: usize,
    ) -> Self {
        Self {
            values,
            minor,
            offsets,
            major_count,
            minor_count,
        }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Check lengths and offsets, returning the offsets as `usize`.
    ///
    /// Runs in `O(major_count)` and must succeed before any write.
    pub fn validated_offsets(&self) -> Result<Vec<usize>> {
        let nnz = self.values.len();
        if self.minor.len() != nnz {
            return Err(CellDenseError::ShapeMismatch {
                what: "minor index array",
                expected: nnz,
                actual: self.minor.len(),
            });
        }
        if self.offsets.len() != self.major_count + 1 {
            return Err(CellDenseError::MalformedSparseLayout(format!(
                "offset array has {} entries, expected {}",
                self.offsets.len(),
                self.major_count + 1
            )));
        }
        let mut out = Vec::with_capacity(self.offsets.len());
        let mut prev = 0usize;
        for (i, &o) in self.offsets.iter().enumerate() {
            let o = o.to_index().ok_or_else(|| {
                CellDenseError::MalformedSparseLayout(format!("offset {i} is negative"))
            })?;
            if i == 0 && o != 0 {
                return Err(CellDenseError::MalformedSparseLayout(format!(
                    "first offset is {o}, expected 0"
                )));
            }
            if o < prev {
                return Err(CellDenseError::MalformedSparseLayout(format!(
                    "offset {i} ({o}) is smaller than offset {} ({prev})",
                    i - 1
                )));
            }
            prev = o;
            out.push(o);
        }
        if prev != nnz {
            return Err(CellDenseError::MalformedSparseLayout(format!(
                "last offset is {prev}, expected {nnz} stored values"
            )));
        }
        Ok(out)
    }
}

/// Maps source dimension indices to destination indices, dropping the
/// dimensions that were not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionSelection {
    lut: Vec<Option<usize>>,
    selected: usize,
}

impl DimensionSelection {
    /// Keep every one of `source_count` dimensions.
    pub fn all(source_count: usize) -> Self {
        Self {
            lut: (0..source_count).map(Some).collect(),
            selected: source_count,
        }
    }

    /// Keep the dimensions whose mask entry is `true`, preserving order.
    pub fn from_mask(mask: &[bool]) -> Self {
        let mut next = 0usize;
        let lut = mask
            .iter()
            .map(|&keep| {
                keep.then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        Self { lut, selected: next }
    }

    /// Destination index for source dimension `index`, or `None` when it
    /// was removed or lies beyond the source range.
    #[inline]
    pub fn remap(&self, index: usize) -> Option<usize> {
        self.lut.get(index).copied().flatten()
    }

    pub fn source_count(&self) -> usize {
        self.lut.len()
    }

    pub fn selected_count(&self) -> usize {
        self.selected
    }

    pub fn is_identity(&self) -> bool {
        self.selected == self.lut.len()
    }

    /// New vector holding the selected entries of `items`. Entries beyond
    /// the selection's source range are dropped.
    pub fn filter<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .zip(&self.lut)
            .filter(|(_, dst)| dst.is_some())
            .map(|(item, _)| item.clone())
            .collect()
    }
}
