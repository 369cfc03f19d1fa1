use std::ops::Range;

use ndarray::{
    s, Array, Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Dimension, ErrorKind, ShapeError,
};

use super::{build_quantizer, ArrayQuantizer, QuantizerOptions};
use crate::codebook::{quantized_eltype, Code, CodeWidth};
use crate::distance::Distance;
use crate::element::Element;
use crate::error::QuantizationError;

/// A quantized vector or matrix.
///
/// The array stores an *m × n* code matrix, where column *j* holds the
/// codes of the *j*-th sample (matrix column or vector element). Values
/// are reconstructed on access, the array is read-only.
#[derive(Clone, Debug)]
pub struct QuantizedArray<U, A, D, Dm>
where
    A: Element,
{
    quantizer: ArrayQuantizer<U, A, D, Dm>,
    data: Array2<U>,
    dims: Dm,
}

impl<U, A, D, Dm> QuantizedArray<U, A, D, Dm>
where
    U: Code,
    A: Element,
    D: Distance,
    Dm: Dimension,
{
    /// Quantize an array.
    ///
    /// Builds a quantizer from `aa` and encodes `aa` with it.
    pub fn new<S>(
        aa: &ArrayBase<S, Dm>,
        options: &QuantizerOptions,
        distance: D,
    ) -> Result<Self, QuantizationError>
    where
        S: Data<Elem = A>,
    {
        let quantizer = build_quantizer(aa, options, distance)?;
        let data = quantizer.quantize_data(aa)?;

        Ok(QuantizedArray {
            quantizer,
            data,
            dims: aa.raw_dim(),
        })
    }

    /// Construct a quantized array from a quantizer and a code matrix.
    ///
    /// `dims` is the shape of the encoded array. Fails if the code matrix
    /// does not match the quantizer or the shape, or contains codes that
    /// are not in the codebooks.
    pub fn from_parts(
        quantizer: ArrayQuantizer<U, A, D, Dm>,
        data: Array2<U>,
        dims: Dm,
    ) -> Result<Self, QuantizationError> {
        let shape = dims.slice();
        let n_vars = super::nvars(shape)?;
        if n_vars != quantizer.nvars() {
            return Err(QuantizationError::VariableCountMismatch {
                expected: quantizer.nvars(),
                found: n_vars,
            });
        }

        if data.nrows() != quantizer.codebooks().len() {
            return Err(QuantizationError::CodebookCountMismatch {
                expected: quantizer.codebooks().len(),
                found: data.nrows(),
            });
        }

        let n_samples = shape[shape.len() - 1];
        if data.ncols() != n_samples {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }

        for (codebook, codes) in quantizer.codebooks().iter().zip(data.outer_iter()) {
            if let Some(&code) = codes
                .iter()
                .find(|&&code| !codebook.codemap().contains_key(&code))
            {
                return Err(QuantizationError::CodeNotFound {
                    code: code.index() as u64,
                });
            }
        }

        Ok(QuantizedArray {
            quantizer,
            data,
            dims,
        })
    }

    /// Get the code matrix.
    pub fn data(&self) -> ArrayView2<U> {
        self.data.view()
    }

    /// Get the quantizer.
    pub fn quantizer(&self) -> &ArrayQuantizer<U, A, D, Dm> {
        &self.quantizer
    }

    /// Width of the codes.
    pub fn code_width(&self) -> CodeWidth {
        U::WIDTH
    }

    /// Get the shape of the array.
    pub fn shape(&self) -> &[usize] {
        self.dims.slice()
    }

    /// Rank of the array.
    pub fn ndim(&self) -> usize {
        self.dims.ndim()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dims.size()
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Reconstruct a single element.
    pub fn get(&self, index: &[usize]) -> Result<A, QuantizationError> {
        let out_of_bounds = || QuantizationError::IndexOutOfBounds {
            index: index.to_owned(),
            shape: self.shape().to_owned(),
        };

        if index.len() != self.ndim() || index.iter().zip(self.shape()).any(|(&i, &n)| i >= n) {
            return Err(out_of_bounds());
        }

        let (var, sample) = match *index {
            [sample] => (0, sample),
            [var, sample] => (var, sample),
            _ => return Err(out_of_bounds()),
        };

        Ok(self.column(sample)?[var])
    }

    /// Reconstruct the variables of a single sample.
    ///
    /// For matrices, this is the *j*-th column. For vectors, the result
    /// holds the *j*-th element.
    pub fn column(&self, j: usize) -> Result<Array1<A>, QuantizationError> {
        self.check_sample(j)?;
        Ok(self
            .decode_samples(j..j + 1)?
            .index_axis_move(Axis(1), 0))
    }

    /// Reconstruct a single variable over all samples.
    ///
    /// For matrices, this is the *i*-th row. A vector only has row 0.
    pub fn row(&self, i: usize) -> Result<Array1<A>, QuantizationError> {
        if i >= self.quantizer.nvars() {
            return Err(QuantizationError::IndexOutOfBounds {
                index: vec![i],
                shape: self.shape().to_owned(),
            });
        }

        Ok(self
            .decode_samples(0..self.n_samples())?
            .index_axis_move(Axis(0), i))
    }

    /// Reconstruct a contiguous range of samples.
    ///
    /// The result has the shape of the array, with the last axis
    /// restricted to `range`.
    pub fn slice_columns(&self, range: Range<usize>) -> Result<Array<A, Dm>, QuantizationError> {
        if range.start > range.end || range.end > self.n_samples() {
            return Err(QuantizationError::IndexOutOfBounds {
                index: vec![range.start, range.end],
                shape: self.shape().to_owned(),
            });
        }

        let decoded = self.decode_samples(range)?;

        let mut dims = self.dims.clone();
        let last = dims.ndim() - 1;
        dims[last] = decoded.ncols();

        Ok(decoded.into_shape(dims)?)
    }

    /// Reconstruct the whole array.
    pub fn to_array(&self) -> Result<Array<A, Dm>, QuantizationError> {
        self.slice_columns(0..self.n_samples())
    }

    fn check_sample(&self, j: usize) -> Result<(), QuantizationError> {
        if j >= self.n_samples() {
            return Err(QuantizationError::IndexOutOfBounds {
                index: vec![j],
                shape: self.shape().to_owned(),
            });
        }

        Ok(())
    }

    fn decode_samples(&self, range: Range<usize>) -> Result<Array2<A>, QuantizationError> {
        self.quantizer
            .decode_data(self.data.slice(s![.., range]))
    }
}

/// A quantized array with the narrowest code type for its codebooks.
#[derive(Clone, Debug)]
pub enum Quantized<A, D, Dm>
where
    A: Element,
{
    U8(QuantizedArray<u8, A, D, Dm>),
    U16(QuantizedArray<u16, A, D, Dm>),
    U32(QuantizedArray<u32, A, D, Dm>),
    U64(QuantizedArray<u64, A, D, Dm>),
}

macro_rules! forward {
    ($self:ident, $array:ident => $e:expr) => {
        match $self {
            Quantized::U8($array) => $e,
            Quantized::U16($array) => $e,
            Quantized::U32($array) => $e,
            Quantized::U64($array) => $e,
        }
    };
}

impl<A, D, Dm> Quantized<A, D, Dm>
where
    A: Element,
    D: Distance,
    Dm: Dimension,
{
    /// Width of the codes.
    pub fn code_width(&self) -> CodeWidth {
        forward!(self, array => array.code_width())
    }

    /// Get the shape of the array.
    pub fn shape(&self) -> &[usize] {
        forward!(self, array => array.shape())
    }

    /// Rank of the array.
    pub fn ndim(&self) -> usize {
        forward!(self, array => array.ndim())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        forward!(self, array => array.len())
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        forward!(self, array => array.is_empty())
    }

    /// Number of codebooks.
    pub fn n_codebooks(&self) -> usize {
        forward!(self, array => array.quantizer().codebooks().len())
    }

    pub fn get(&self, index: &[usize]) -> Result<A, QuantizationError> {
        forward!(self, array => array.get(index))
    }

    pub fn column(&self, j: usize) -> Result<Array1<A>, QuantizationError> {
        forward!(self, array => array.column(j))
    }

    pub fn row(&self, i: usize) -> Result<Array1<A>, QuantizationError> {
        forward!(self, array => array.row(i))
    }

    pub fn slice_columns(&self, range: Range<usize>) -> Result<Array<A, Dm>, QuantizationError> {
        forward!(self, array => array.slice_columns(range))
    }

    pub fn to_array(&self) -> Result<Array<A, Dm>, QuantizationError> {
        forward!(self, array => array.to_array())
    }
}

/// Quantize a vector or matrix.
///
/// The code type is the narrowest unsigned integer type that holds
/// `options.k` codes, see [`quantized_eltype`].
pub fn quantize<A, S, Dm, D>(
    aa: &ArrayBase<S, Dm>,
    options: &QuantizerOptions,
    distance: D,
) -> Result<Quantized<A, D, Dm>, QuantizationError>
where
    A: Element,
    S: Data<Elem = A>,
    Dm: Dimension,
    D: Distance,
{
    Ok(match quantized_eltype(options.k) {
        CodeWidth::U8 => Quantized::U8(QuantizedArray::new(aa, options, distance)?),
        CodeWidth::U16 => Quantized::U16(QuantizedArray::new(aa, options, distance)?),
        CodeWidth::U32 => Quantized::U32(QuantizedArray::new(aa, options, distance)?),
        CodeWidth::U64 => Quantized::U64(QuantizedArray::new(aa, options, distance)?),
    })
}
