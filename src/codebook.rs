//! Codebooks of prototype vectors.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};

use crate::distance::Distance;
use crate::element::Element;
use crate::error::QuantizationError;
use crate::kmeans::cluster_assignments;

/// Width of the unsigned integers used to store codes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CodeWidth {
    U8,
    U16,
    U32,
    U64,
}

impl CodeWidth {
    /// Number of bits in a code.
    pub fn bits(self) -> u32 {
        match self {
            CodeWidth::U8 => 8,
            CodeWidth::U16 => 16,
            CodeWidth::U32 => 32,
            CodeWidth::U64 => 64,
        }
    }

    /// Number of distinct codes that can be represented.
    pub fn capacity(self) -> u128 {
        1u128 << self.bits()
    }
}

impl fmt::Display for CodeWidth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}

/// Find the narrowest code width that can hold *k* codes.
///
/// Codes are `0..k`, so *k* codes fit in *w* bits when *k ≤ 2^w*.
/// The narrowest width is 8 bits.
pub fn quantized_eltype(k: usize) -> CodeWidth {
    [CodeWidth::U8, CodeWidth::U16, CodeWidth::U32]
        .iter()
        .copied()
        .find(|width| k as u128 <= width.capacity())
        .unwrap_or(CodeWidth::U64)
}

/// Unsigned integer type used for codes.
pub trait Code: Copy + fmt::Debug + Eq + Hash + Ord + Send + Sync + 'static {
    /// Width of this code type.
    const WIDTH: CodeWidth;

    /// Construct a code from an index.
    ///
    /// The index must be representable in the code type.
    fn from_index(index: usize) -> Self;

    /// Convert the code to an index.
    fn index(self) -> usize;
}

macro_rules! code_impl {
    ($t:ty, $width:expr) => {
        impl Code for $t {
            const WIDTH: CodeWidth = $width;

            #[inline]
            fn from_index(index: usize) -> Self {
                debug_assert!(index as u128 <= <$t>::max_value() as u128);
                index as $t
            }

            #[inline]
            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

code_impl!(u8, CodeWidth::U8);
code_impl!(u16, CodeWidth::U16);
code_impl!(u32, CodeWidth::U32);
code_impl!(u64, CodeWidth::U64);

/// Check that `n_prototypes` codes can be stored in `U`.
pub(crate) fn check_code_width<U>(n_prototypes: usize) -> Result<(), QuantizationError>
where
    U: Code,
{
    if quantized_eltype(n_prototypes) > U::WIDTH {
        return Err(QuantizationError::CodeWidthTooNarrow {
            n_prototypes,
            width: U::WIDTH,
        });
    }

    Ok(())
}

/// A codebook.
///
/// A codebook holds prototype vectors as the columns of `vectors` and
/// the code of each prototype. Codes are kept in ascending order, so
/// that the *i*-th code identifies the *i*-th column.
#[derive(Clone, Debug)]
pub struct CodeBook<U, A> {
    codes: Vec<U>,
    vectors: Array2<A>,
    codemap: HashMap<U, usize>,
}

// The code map is derived from the codes.
impl<U, A> PartialEq for CodeBook<U, A>
where
    U: PartialEq,
    A: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.codes == other.codes && self.vectors == other.vectors
    }
}

impl<U, A> CodeBook<U, A>
where
    U: Code,
    A: Element,
{
    /// Construct a codebook from codes and prototypes.
    ///
    /// `vectors` holds one prototype per column, `codes` one code per
    /// prototype. Codes must be distinct.
    pub fn new(codes: Vec<U>, vectors: Array2<A>) -> Result<Self, QuantizationError> {
        if codes.len() != vectors.ncols() {
            return Err(QuantizationError::CodeCountMismatch {
                n_codes: codes.len(),
                n_prototypes: vectors.ncols(),
            });
        }

        let mut order = (0..codes.len()).collect::<Vec<_>>();
        order.sort_unstable_by_key(|&idx| codes[idx]);

        let sorted_codes = order.iter().map(|&idx| codes[idx]).collect::<Vec<_>>();
        if let Some(pair) = sorted_codes.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(QuantizationError::DuplicateCode {
                code: pair[0].index() as u64,
            });
        }

        let vectors = vectors.select(Axis(1), &order);
        Ok(Self::from_sorted(sorted_codes, vectors))
    }

    /// Construct a codebook from prototypes, using the codes `0..k`.
    pub fn from_prototypes(vectors: Array2<A>) -> Result<Self, QuantizationError> {
        check_code_width::<U>(vectors.ncols())?;
        let codes = (0..vectors.ncols()).map(U::from_index).collect();
        Ok(Self::from_sorted(codes, vectors))
    }

    fn from_sorted(codes: Vec<U>, vectors: Array2<A>) -> Self {
        let codemap = codes
            .iter()
            .enumerate()
            .map(|(idx, &code)| (code, idx))
            .collect();

        CodeBook {
            codes,
            vectors,
            codemap,
        }
    }

    /// Get the codes.
    pub fn codes(&self) -> &[U] {
        &self.codes
    }

    /// Get the prototypes, one per column.
    pub fn vectors(&self) -> ArrayView2<A> {
        self.vectors.view()
    }

    /// Get the mapping from codes to prototype columns.
    pub fn codemap(&self) -> &HashMap<U, usize> {
        &self.codemap
    }

    /// Dimensionality of the prototypes.
    pub fn dim(&self) -> usize {
        self.vectors.nrows()
    }

    /// Number of prototypes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if the codebook has no prototypes.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Get the prototype of a code.
    pub fn prototype(&self, code: U) -> Result<ArrayView1<A>, QuantizationError> {
        let idx = self.column_of(code)?;
        Ok(self.vectors.column(idx))
    }

    fn column_of(&self, code: U) -> Result<usize, QuantizationError> {
        self.codemap
            .get(&code)
            .copied()
            .ok_or(QuantizationError::CodeNotFound {
                code: code.index() as u64,
            })
    }

    /// Encode the columns of `x`.
    ///
    /// Each column is replaced by the code of the nearest prototype under
    /// `distance`. If several prototypes are equally near, the lowest code
    /// is used. Fails if the number of rows of `x` differs from the
    /// prototype dimensionality.
    pub fn encode<S, D>(
        &self,
        x: ArrayBase<S, Ix2>,
        distance: &D,
    ) -> Result<Array1<U>, QuantizationError>
    where
        S: Data<Elem = A>,
        D: Distance,
    {
        if self.is_empty() {
            return Err(QuantizationError::IncorrectNPrototypes);
        }

        if x.nrows() != self.dim() {
            return Err(QuantizationError::SubspaceDimensionMismatch {
                expected: self.dim(),
                found: x.nrows(),
            });
        }

        Ok(
            cluster_assignments(self.vectors.t(), x.view(), Axis(1), distance)
                .into_iter()
                .map(|idx| self.codes[idx])
                .collect(),
        )
    }

    /// Reconstruct vectors from codes.
    ///
    /// Returns a matrix with the prototype of the *i*-th code as its
    /// *i*-th column.
    pub fn decode<S>(&self, codes: ArrayBase<S, Ix1>) -> Result<Array2<A>, QuantizationError>
    where
        S: Data<Elem = U>,
    {
        let mut reconstruction = Array2::zeros((self.dim(), codes.len()));
        for (&code, mut column) in codes.iter().zip(reconstruction.axis_iter_mut(Axis(1))) {
            column.assign(&self.vectors.column(self.column_of(code)?));
        }

        Ok(reconstruction)
    }

    /// Convert the prototypes to another element type.
    pub fn map<B, F>(self, f: F) -> CodeBook<U, B>
    where
        F: FnMut(A) -> B,
    {
        CodeBook {
            codes: self.codes,
            vectors: self.vectors.mapv(f),
            codemap: self.codemap,
        }
    }
}
