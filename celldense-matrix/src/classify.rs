//! Range and integrality classification used to pick a storage type.
//!
//! All comparisons happen in `f64`, where every storage-type bound is exact,
//! so signed/unsigned and float/integer pairs compare without wrapping.

use crate::element::{Element, ElementType, Scalar};
use crate::transform::{with_transform_fn, Transform};

/// Whether `[min, max]` fits inside the representable range of `T`.
/// NaN bounds never fit.
pub fn in_range<T: Element>(min: f64, max: f64) -> bool {
    min >= T::MIN && max <= T::MAX
}

/// Whether `value` equals its nearest integer.
#[inline]
pub fn is_integer<S: Scalar>(value: S) -> bool {
    if S::IS_INTEGRAL {
        return true;
    }
    let v = value.to_f64();
    v.round() == v
}

/// Whether every element is integral. Integral types short-circuit.
pub fn contains_only_integers<S: Scalar>(values: &[S]) -> bool {
    if S::IS_INTEGRAL {
        return true;
    }
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        values.par_iter().all(|&v| is_integer(v))
    }
    #[cfg(not(feature = "parallel"))]
    {
        values.iter().all(|&v| is_integer(v))
    }
}

/// Minimum and maximum, ignoring NaN. `None` for empty or all-NaN input.
pub fn value_range<S: Scalar>(values: &[S]) -> Option<(f64, f64)> {
    summarize(values, Transform::None).range()
}

/// Observed range and integrality of a value array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueSummary {
    pub min: f64,
    pub max: f64,
    pub all_integral: bool,
    /// Number of non-NaN values folded into `min`/`max`.
    pub count: usize,
}

impl ValueSummary {
    const EMPTY: ValueSummary = ValueSummary {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        all_integral: true,
        count: 0,
    };

    fn observe(mut self, v: f64) -> Self {
        if v.is_nan() {
            self.all_integral = false;
            return self;
        }
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.all_integral &= v.round() == v;
        self.count += 1;
        self
    }

    fn merge(self, other: Self) -> Self {
        ValueSummary {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            all_integral: self.all_integral && other.all_integral,
            count: self.count + other.count,
        }
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        (self.count > 0).then_some((self.min, self.max))
    }
}

/// Range and integrality of `transform(v)` over all `values`. Zeros are
/// folded in untransformed since every transform fixes zero.
pub fn summarize<S: Scalar>(values: &[S], transform: Transform) -> ValueSummary {
    with_transform_fn!(transform, f => {
        let step = |acc: ValueSummary, v: &S| {
            let x = v.to_f64();
            acc.observe(if x == 0.0 { 0.0 } else { f(x) })
        };
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            values
                .par_iter()
                .fold(|| ValueSummary::EMPTY, step)
                .reduce(|| ValueSummary::EMPTY, ValueSummary::merge)
        }
        #[cfg(not(feature = "parallel"))]
        {
            values.iter().fold(ValueSummary::EMPTY, step)
        }
    })
}

/// Walk the narrowing ladder and return the committed storage type.
///
/// The sign of the minimum selects the candidate family (signed when
/// negative, unsigned otherwise). An integral 8-bit fit wins; otherwise
/// `lossy` commits bfloat16; otherwise a source wider than 16 bits may take
/// an integral 16-bit fit; otherwise `native` is kept.
pub fn select_storage_type(
    summary: &ValueSummary,
    native: ElementType,
    source_bytes: usize,
    lossy: bool,
) -> ElementType {
    let (min, max) = summary.range().unwrap_or((0.0, 0.0));
    let signed = min < 0.0;

    let fits_8 = if signed {
        in_range::<i8>(min, max)
    } else {
        in_range::<u8>(min, max)
    };
    if summary.all_integral && fits_8 {
        return if signed { ElementType::Int8 } else { ElementType::UInt8 };
    }
    if lossy {
        return ElementType::BFloat16;
    }
    if source_bytes > 2 {
        let fits_16 = if signed {
            in_range::<i16>(min, max)
        } else {
            in_range::<u16>(min, max)
        };
        if summary.all_integral && fits_16 {
            return if signed { ElementType::Int16 } else { ElementType::UInt16 };
        }
    }
    native
}
