//! Array element types.

use std::fmt::Debug;

use nalgebra::RealField;
use ndarray::NdFloat;
use num_traits::NumAssign;

/// Element type of a quantizable array.
///
/// Every element can be compared through a [`Distance`](crate::distance::Distance),
/// which operates on `f64` values. Clustering-based quantizers need
/// arithmetic on means, which is performed in the associated `Float`
/// type. Those quantizers are only available when `IS_FLOAT` holds.
pub trait Element: Copy + Debug + PartialOrd + NumAssign + Send + Sync + 'static {
    /// Floating point type used for training.
    type Float: Element + NdFloat + RealField;

    /// `true` for floating point element types.
    const IS_FLOAT: bool;

    /// Convert the element to `f64` for distance computations.
    fn as_f64(self) -> f64;

    /// Convert the element to the training type.
    fn to_float(self) -> Self::Float;

    /// Convert a value of the training type back to an element.
    fn from_float(v: Self::Float) -> Self;
}

impl Element for f32 {
    type Float = f32;

    const IS_FLOAT: bool = true;

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn to_float(self) -> f32 {
        self
    }

    #[inline]
    fn from_float(v: f32) -> Self {
        v
    }
}

impl Element for f64 {
    type Float = f64;

    const IS_FLOAT: bool = true;

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }

    #[inline]
    fn to_float(self) -> f64 {
        self
    }

    #[inline]
    fn from_float(v: f64) -> Self {
        v
    }
}

macro_rules! integer_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                type Float = f64;

                const IS_FLOAT: bool = false;

                #[inline]
                fn as_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn to_float(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_float(v: f64) -> Self {
                    v.round() as $t
                }
            }
        )*
    };
}

integer_element!(i8, i16, i32, i64, u8, u16, u32, u64);
