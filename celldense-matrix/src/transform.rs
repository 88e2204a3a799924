//! Element-wise value transforms and counts-per-million row normalization.

use std::fmt;
use std::str::FromStr;

use celldense_core::{CellDenseError, Result};

/// Target row sum for counts-per-million normalization.
pub const CPM_SCALE: f64 = 1e6;

/// A monotonic per-element transform applied while copying values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Transform {
    #[default]
    None,
    /// `log2(1 + v)`
    Log,
    /// `sqrt(v)`; negative input yields NaN.
    Sqrt,
    /// `asinh(v / scale)`
    Arcsinh { scale: f64 },
}

impl Transform {
    pub const DEFAULT_ARCSINH_SCALE: f64 = 5.0;
    pub const ARCSINH_SCALE_RANGE: (f64, f64) = (1.0, 100.0);

    /// Arcsinh with a validated scale divisor in `[1, 100]`.
    pub fn arcsinh(scale: f64) -> Result<Self> {
        let (lo, hi) = Self::ARCSINH_SCALE_RANGE;
        if !(lo..=hi).contains(&scale) {
            return Err(CellDenseError::InvalidInput(format!(
                "arcsinh scale must lie in [{lo}, {hi}], got {scale}"
            )));
        }
        Ok(Transform::Arcsinh { scale })
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Transform::None => value,
            Transform::Log => (1.0 + value).log2(),
            Transform::Sqrt => value.sqrt(),
            Transform::Arcsinh { scale } => (value / scale).asinh(),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Transform::None)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::None => f.write_str("none"),
            Transform::Log => f.write_str("log"),
            Transform::Sqrt => f.write_str("sqrt"),
            Transform::Arcsinh { scale } => write!(f, "arcsinh:{scale}"),
        }
    }
}

impl FromStr for Transform {
    type Err = CellDenseError;

    /// Accepts `none`, `log`, `sqrt`, `arcsinh` and `arcsinh:<scale>`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((n, a)) => (n, Some(a)),
            None => (lower.as_str(), None),
        };
        match (name, arg) {
            ("none", None) => Ok(Transform::None),
            ("log", None) | ("log2", None) => Ok(Transform::Log),
            ("sqrt", None) => Ok(Transform::Sqrt),
            ("arcsinh", None) => Transform::arcsinh(Self::DEFAULT_ARCSINH_SCALE),
            ("arcsinh", Some(a)) => {
                let scale: f64 = a.parse().map_err(|_| {
                    CellDenseError::InvalidInput(format!("invalid arcsinh scale: {a}"))
                })?;
                Transform::arcsinh(scale)
            }
            _ => Err(CellDenseError::InvalidInput(format!(
                "unknown transform: {s}"
            ))),
        }
    }
}

/// Counts-per-million value for one element of a row with sum `row_sum`.
/// Zero values and zero-sum rows map to 0.
#[inline]
pub fn cpm(value: f64, row_sum: f64) -> f64 {
    if value == 0.0 || row_sum == 0.0 {
        0.0
    } else {
        CPM_SCALE * value / row_sum
    }
}

/// Binds `$f` to a monomorphic closure for `$transform` and evaluates
/// `$body`, so hot loops see a static call instead of a per-element match.
macro_rules! with_transform_fn {
    ($transform:expr, $f:ident => $body:expr) => {
        match $transform {
            $crate::transform::Transform::None => {
                let $f = |v: f64| v;
                $body
            }
            $crate::transform::Transform::Log => {
                let $f = |v: f64| (1.0 + v).log2();
                $body
            }
            $crate::transform::Transform::Sqrt => {
                let $f = |v: f64| v.sqrt();
                $body
            }
            $crate::transform::Transform::Arcsinh { scale } => {
                let $f = move |v: f64| (v / scale).asinh();
                $body
            }
        }
    };
}

pub(crate) use with_transform_fn;
