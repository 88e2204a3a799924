//! Owned source arrays in whatever element type they were stored on disk.

use half::bf16;

use crate::classify::{self, ValueSummary};
use crate::element::{ElementType, SourceKind};
use crate::transform::Transform;

/// A value array tagged with its on-disk element type.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceArray {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    BFloat16(Vec<bf16>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
}

/// Binds `$v` to the typed vector inside a [`SourceArray`] and evaluates
/// `$body` once per variant.
#[macro_export]
macro_rules! with_source_values {
    ($source:expr, $v:ident => $body:expr) => {
        match $source {
            $crate::SourceArray::Float32($v) => $body,
            $crate::SourceArray::Float64($v) => $body,
            $crate::SourceArray::BFloat16($v) => $body,
            $crate::SourceArray::Int8($v) => $body,
            $crate::SourceArray::Int16($v) => $body,
            $crate::SourceArray::Int32($v) => $body,
            $crate::SourceArray::Int64($v) => $body,
            $crate::SourceArray::UInt8($v) => $body,
            $crate::SourceArray::UInt16($v) => $body,
            $crate::SourceArray::UInt32($v) => $body,
            $crate::SourceArray::UInt64($v) => $body,
        }
    };
}

impl SourceArray {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceArray::Float32(_) => SourceKind::Float32,
            SourceArray::Float64(_) => SourceKind::Float64,
            SourceArray::BFloat16(_) => SourceKind::BFloat16,
            SourceArray::Int8(_) => SourceKind::Int8,
            SourceArray::Int16(_) => SourceKind::Int16,
            SourceArray::Int32(_) => SourceKind::Int32,
            SourceArray::Int64(_) => SourceKind::Int64,
            SourceArray::UInt8(_) => SourceKind::UInt8,
            SourceArray::UInt16(_) => SourceKind::UInt16,
            SourceArray::UInt32(_) => SourceKind::UInt32,
            SourceArray::UInt64(_) => SourceKind::UInt64,
        }
    }

    pub fn len(&self) -> usize {
        with_source_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage type that keeps these values unchanged where possible.
    pub fn storage_type(&self) -> ElementType {
        self.kind().native_storage_type()
    }

    /// Reinterpret 16-bit patterns as bfloat16 values.
    pub fn from_bf16_bits(bits: &[u16]) -> Self {
        SourceArray::BFloat16(bits.iter().map(|&b| bf16::from_bits(b)).collect())
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        with_source_values!(self, v => classify::value_range(v))
    }

    pub fn contains_only_integers(&self) -> bool {
        with_source_values!(self, v => classify::contains_only_integers(v))
    }

    pub fn summarize(&self, transform: Transform) -> ValueSummary {
        with_source_values!(self, v => classify::summarize(v, transform))
    }

    /// Values widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        use crate::element::Scalar;
        with_source_values!(self, v => v.iter().map(|x| x.to_f64()).collect())
    }
}
