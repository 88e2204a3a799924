//! The dense points-by-dimensions matrix that ingestion writes into.

use tracing::warn;

use celldense_core::{CellDenseError, Result, Summarizable};

use crate::buffer::{BufferVisitor, BufferVisitorMut, TypedBuffer};
use crate::element::{Element, ElementType, Scalar};

/// Row-major `rows x columns` matrix backed by a [`TypedBuffer`].
///
/// A new matrix has zero rows. It may be sized exactly once with
/// [`resize`](Self::resize); afterwards the buffer length always equals
/// `rows * columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    columns: usize,
    buffer: TypedBuffer,
}

impl DenseMatrix {
    /// An empty, unsized matrix that will hold `element_type`.
    pub fn new(element_type: ElementType) -> Self {
        Self {
            rows: 0,
            columns: 0,
            buffer: TypedBuffer::new(element_type),
        }
    }

    /// A zero-filled matrix of the given shape.
    pub fn zeroed(element_type: ElementType, rows: usize, columns: usize) -> Self {
        let mut m = Self::new(element_type);
        m.resize(rows, columns);
        m
    }

    /// Size the buffer to `rows x columns`, zero-filled. Only acts while the
    /// matrix has no rows; returns whether the resize happened.
    pub fn resize(&mut self, rows: usize, columns: usize) -> bool {
        if self.rows != 0 {
            warn!(
                current_rows = self.rows,
                current_columns = self.columns,
                rows,
                columns,
                "ignoring resize of a populated dense matrix"
            );
            return false;
        }
        self.rows = rows;
        self.columns = columns;
        self.buffer.clear();
        self.buffer.resize(rows * columns);
        true
    }

    /// Switch the element type. A change discards the contents and leaves a
    /// zero-filled buffer of the current shape.
    pub fn set_element_type(&mut self, element_type: ElementType) {
        if self.buffer.element_type() != element_type {
            self.buffer = TypedBuffer::zeroed(element_type, self.rows * self.columns);
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.buffer.element_type()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &TypedBuffer {
        &self.buffer
    }

    /// Hand the populated buffer over to its new owner.
    pub fn into_buffer(self) -> TypedBuffer {
        self.buffer
    }

    pub fn memory_bytes(&self) -> usize {
        self.buffer.memory_bytes()
    }

    /// Fail unless the buffer holds exactly `rows x self.columns()` elements
    /// laid out over `rows` rows.
    pub fn ensure_sized(&self, rows: usize) -> Result<()> {
        let expected = rows * self.columns;
        if self.rows != rows || self.buffer.len() != expected {
            return Err(CellDenseError::UnsizedDestination {
                expected,
                actual: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Read-only visit of the raw typed buffer.
    pub fn visit<V: BufferVisitor>(&self, visitor: V) -> V::Output {
        self.buffer.visit(visitor)
    }

    /// Writable visit of the raw typed buffer.
    pub fn visit_mut<V: BufferVisitorMut>(&mut self, visitor: V) -> V::Output {
        self.buffer.visit_mut(visitor)
    }

    /// Overwrite one cell with `value` converted to the active type.
    ///
    /// # Panics
    ///
    /// Panics if `row * columns + column` lies outside the buffer.
    pub fn set_point_at(&mut self, row: usize, column: usize, value: f64) {
        let offset = row * self.columns + column;
        self.buffer.visit_mut(SetPoint { offset, value });
    }

    /// Cell value widened to `f64`.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.buffer.get_f64(row * self.columns + column)
    }

    /// One row widened to `f64`.
    pub fn row_f64(&self, row: usize) -> Option<Vec<f64>> {
        if row >= self.rows {
            return None;
        }
        let range = row * self.columns..(row + 1) * self.columns;
        Some(self.visit(CollectRange(range)))
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        self.visit(RowSums(self.columns))
    }

    /// Number of nonzero cells.
    pub fn nnz(&self) -> usize {
        self.visit(CountNonzero)
    }

    /// The active slice as `T`. Panics if `T` is not the active type.
    pub fn as_slice<T: Element>(&self) -> &[T] {
        self.buffer.as_slice()
    }

    pub fn try_as_slice<T: Element>(&self) -> Option<&[T]> {
        self.buffer.try_as_slice()
    }

    /// Copy of this matrix with every cell converted to `element_type`.
    pub fn to_element_type(&self, element_type: ElementType) -> DenseMatrix {
        let mut buffer = TypedBuffer::new(element_type);
        self.visit(ConvertInto(&mut buffer));
        DenseMatrix {
            rows: self.rows,
            columns: self.columns,
            buffer,
        }
    }
}

impl Summarizable for DenseMatrix {
    fn summary(&self) -> String {
        format!(
            "DenseMatrix: {} rows \u{00d7} {} columns ({})",
            self.rows,
            self.columns,
            self.element_type()
        )
    }
}

struct SetPoint {
    offset: usize,
    value: f64,
}

impl BufferVisitorMut for SetPoint {
    type Output = ();
    fn visit<T: Element>(self, values: &mut [T]) {
        values[self.offset] = T::from_f64(self.value);
    }
}

struct CollectRange(std::ops::Range<usize>);

impl BufferVisitor for CollectRange {
    type Output = Vec<f64>;
    fn visit<T: Element>(self, values: &[T]) -> Vec<f64> {
        values[self.0].iter().map(|v| v.to_f64()).collect()
    }
}

struct RowSums(usize);

impl BufferVisitor for RowSums {
    type Output = Vec<f64>;
    fn visit<T: Element>(self, values: &[T]) -> Vec<f64> {
        if self.0 == 0 {
            return Vec::new();
        }
        values
            .chunks(self.0)
            .map(|row| row.iter().map(|v| v.to_f64()).sum())
            .collect()
    }
}

struct ConvertInto<'a>(&'a mut TypedBuffer);

impl BufferVisitor for ConvertInto<'_> {
    type Output = ();
    fn visit<T: Element>(self, values: &[T]) {
        self.0.convert_from(values);
    }
}

struct CountNonzero;

impl BufferVisitor for CountNonzero {
    type Output = usize;
    fn visit<T: Element>(self, values: &[T]) -> usize {
        values.iter().filter(|v| v.to_f64() != 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_only_once() {
        let mut m = DenseMatrix::new(ElementType::UInt8);
        assert!(m.ensure_sized(2).is_err());
        assert!(m.resize(2, 3));
        assert_eq!(m.len(), 6);
        assert!(!m.resize(4, 4));
        assert_eq!(m.shape(), (2, 3));
        assert!(m.ensure_sized(2).is_ok());
        assert!(m.ensure_sized(3).is_err());
    }

    #[test]
    fn point_writes_and_reads() {
        let mut m = DenseMatrix::zeroed(ElementType::Int16, 2, 3);
        m.set_point_at(1, 2, -7.0);
        m.set_point_at(0, 0, 3.0);
        assert_eq!(m.get(1, 2), Some(-7.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.row_f64(0), Some(vec![3.0, 0.0, 0.0]));
        assert_eq!(m.row_sums(), vec![3.0, -7.0]);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.as_slice::<i16>(), &[3, 0, 0, 0, 0, -7]);
    }

    #[test]
    #[should_panic]
    fn point_write_out_of_bounds_panics() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 1, 1);
        m.set_point_at(1, 0, 1.0);
    }

    #[test]
    fn element_type_switch_keeps_shape() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 2, 2);
        m.set_point_at(0, 1, 2.5);
        m.set_element_type(ElementType::Float32);
        assert_eq!(m.get(0, 1), Some(2.5));
        m.set_element_type(ElementType::BFloat16);
        assert_eq!(m.len(), 4);
        assert_eq!(m.get(0, 1), Some(0.0));
    }

    #[test]
    fn conversion_keeps_shape() {
        let mut m = DenseMatrix::zeroed(ElementType::Float32, 2, 2);
        m.set_point_at(1, 0, 200.0);
        let n = m.to_element_type(ElementType::UInt8);
        assert_eq!(n.shape(), (2, 2));
        assert_eq!(n.as_slice::<u8>(), &[0, 0, 200, 0]);
    }

    #[test]
    fn summary_mentions_shape_and_type() {
        let m = DenseMatrix::zeroed(ElementType::UInt16, 3, 4);
        assert_eq!(m.summary(), "DenseMatrix: 3 rows \u{00d7} 4 columns (uint16)");
        assert_eq!(m.memory_bytes(), 24);
    }
}
