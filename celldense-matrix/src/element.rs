//! Element types: the six dense storage types and the wider set of on-disk
//! scalar types that sources may arrive in.

use std::fmt;
use std::str::FromStr;

use half::bf16;

use celldense_core::CellDenseError;

use crate::buffer::TypedBuffer;

/// The closed set of element types a dense buffer may hold.
///
/// Declaration order matches the explicit storage-policy codes `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementType {
    Float32,
    BFloat16,
    Int16,
    UInt16,
    Int8,
    UInt8,
}

impl ElementType {
    /// All storage types in code order.
    pub const ALL: [ElementType; 6] = [
        ElementType::Float32,
        ElementType::BFloat16,
        ElementType::Int16,
        ElementType::UInt16,
        ElementType::Int8,
        ElementType::UInt8,
    ];

    /// Storage type for an explicit policy code, if the code names one.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Bytes per element.
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::Float32 => 4,
            ElementType::BFloat16 | ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int8 | ElementType::UInt8 => 1,
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(self, ElementType::Float32 | ElementType::BFloat16)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Float32 => "float32",
            ElementType::BFloat16 => "bfloat16",
            ElementType::Int16 => "int16",
            ElementType::UInt16 => "uint16",
            ElementType::Int8 => "int8",
            ElementType::UInt8 => "uint8",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = CellDenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == lower)
            .ok_or_else(|| CellDenseError::InvalidInput(format!("unknown element type: {s}")))
    }
}

/// The on-disk scalar kinds a source array may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Float32,
    Float64,
    BFloat16,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl SourceKind {
    /// The dense storage type that holds this kind unchanged, or `Float32`
    /// for kinds outside the storage set.
    pub fn native_storage_type(self) -> ElementType {
        match self {
            SourceKind::BFloat16 => ElementType::BFloat16,
            SourceKind::Int8 => ElementType::Int8,
            SourceKind::Int16 => ElementType::Int16,
            SourceKind::UInt8 => ElementType::UInt8,
            SourceKind::UInt16 => ElementType::UInt16,
            _ => ElementType::Float32,
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            SourceKind::Int8 | SourceKind::UInt8 => 1,
            SourceKind::BFloat16 | SourceKind::Int16 | SourceKind::UInt16 => 2,
            SourceKind::Float32 | SourceKind::Int32 | SourceKind::UInt32 => 4,
            SourceKind::Float64 | SourceKind::Int64 | SourceKind::UInt64 => 8,
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            SourceKind::Float32 | SourceKind::Float64 | SourceKind::BFloat16
        )
    }
}

/// A numeric scalar that can be read as `f64`.
pub trait Scalar: Copy + Send + Sync + PartialOrd + fmt::Debug + 'static {
    const KIND: SourceKind;
    /// Integral types pass every integrality check without inspection.
    const IS_INTEGRAL: bool;

    fn to_f64(self) -> f64;
}

/// A scalar that can also be stored in a [`TypedBuffer`].
pub trait Element: Scalar + Default {
    const TYPE: ElementType;
    /// Smallest representable value.
    const MIN: f64;
    /// Largest representable value.
    const MAX: f64;

    /// Convert into this type. Integers truncate toward zero and saturate at
    /// their bounds (NaN becomes 0); bfloat16 truncates the low mantissa bits.
    fn from_f64(value: f64) -> Self;

    /// `self + value`, converted back into this type.
    #[inline]
    fn accumulate(self, value: f64) -> Self {
        Self::from_f64(self.to_f64() + value)
    }

    fn slice_of(buffer: &TypedBuffer) -> Option<&[Self]>;
    fn slice_of_mut(buffer: &mut TypedBuffer) -> Option<&mut [Self]>;
}

/// Truncating `f64 -> bf16`: narrows to `f32` rounding toward zero, then
/// drops the low 16 bits of the `f32` encoding. Values beyond the `f32`
/// range saturate at its largest finite value.
#[inline]
pub fn bf16_truncate(value: f64) -> bf16 {
    let mut single = value as f32;
    if single.is_nan() {
        return bf16::NAN;
    }
    // `as` rounds to nearest; step back one ulp if that moved away from zero.
    if (single as f64).abs() > value.abs() {
        single = f32::from_bits(single.to_bits() - 1);
    }
    bf16::from_bits((single.to_bits() >> 16) as u16)
}

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident, $integral:expr);* $(;)?) => {
        $(
            impl Scalar for $ty {
                const KIND: SourceKind = SourceKind::$kind;
                const IS_INTEGRAL: bool = $integral;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_scalar! {
    f32 => Float32, false;
    f64 => Float64, false;
    i8 => Int8, true;
    i16 => Int16, true;
    i32 => Int32, true;
    i64 => Int64, true;
    u8 => UInt8, true;
    u16 => UInt16, true;
    u32 => UInt32, true;
    u64 => UInt64, true;
}

impl Scalar for bf16 {
    const KIND: SourceKind = SourceKind::BFloat16;
    const IS_INTEGRAL: bool = false;

    #[inline]
    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $min:expr, $max:expr, |$v:ident| $from:expr) => {
        impl Element for $ty {
            const TYPE: ElementType = ElementType::$variant;
            const MIN: f64 = $min;
            const MAX: f64 = $max;

            #[inline]
            fn from_f64($v: f64) -> Self {
                $from
            }

            fn slice_of(buffer: &TypedBuffer) -> Option<&[Self]> {
                match buffer {
                    TypedBuffer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_of_mut(buffer: &mut TypedBuffer) -> Option<&mut [Self]> {
                match buffer {
                    TypedBuffer::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, Float32, f32::MIN as f64, f32::MAX as f64, |v| v as f32);
impl_element!(bf16, BFloat16, -3.3895313892515355e38, 3.3895313892515355e38, |v| {
    bf16_truncate(v)
});
impl_element!(i16, Int16, i16::MIN as f64, i16::MAX as f64, |v| v as i16);
impl_element!(u16, UInt16, u16::MIN as f64, u16::MAX as f64, |v| v as u16);
impl_element!(i8, Int8, i8::MIN as f64, i8::MAX as f64, |v| v as i8);
impl_element!(u8, UInt8, u8::MIN as f64, u8::MAX as f64, |v| v as u8);
