use ndarray::ShapeError;
use thiserror::Error;

use crate::codebook::CodeWidth;

/// Quantization error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum QuantizationError {
    #[error("The number of prototypes per codebook must be >= 1")]
    IncorrectNPrototypes,

    #[error("The number of codebooks must be >= 1")]
    IncorrectNCodebooks,

    #[error("The number of quantization iterations must be >= 1")]
    IncorrectNIterations,

    #[error("Only vectors and matrices can be quantized, array has rank {}", rank)]
    UnsupportedRank { rank: usize },

    #[error(
        "The number of codebooks ({}) exceeds the number of variables ({})",
        n_codebooks,
        n_vars
    )]
    TooManyCodebooks { n_codebooks: usize, n_vars: usize },

    #[error(
        "Cannot pick {} prototypes from {} samples",
        n_prototypes,
        n_samples
    )]
    TooManyPrototypes {
        n_prototypes: usize,
        n_samples: usize,
    },

    #[error("Unknown quantization method: {}", _0)]
    UnknownMethod(String),

    #[error("Quantization method '{}' requires floating point elements", method)]
    NonFloatElement { method: String },

    #[error("Sample {} contains a NaN or infinite element", sample)]
    NonFiniteElement { sample: usize },

    #[error("{} prototypes do not fit in {} codes", n_prototypes, width)]
    CodeWidthTooNarrow {
        n_prototypes: usize,
        width: CodeWidth,
    },

    #[error("Code {} occurs more than once in the codebook", code)]
    DuplicateCode { code: u64 },

    #[error(
        "The number of codes ({}) does not match the number of prototypes ({})",
        n_codes,
        n_prototypes
    )]
    CodeCountMismatch { n_codes: usize, n_prototypes: usize },

    #[error("Code {} is not in the codebook", code)]
    CodeNotFound { code: u64 },

    #[error(
        "Array has {} variables, the quantizer was built for {}",
        found,
        expected
    )]
    VariableCountMismatch { expected: usize, found: usize },

    #[error(
        "Subspace has {} dimensions, the codebook prototypes have {}",
        found,
        expected
    )]
    SubspaceDimensionMismatch { expected: usize, found: usize },

    #[error(
        "Code matrix has {} rows, the quantizer has {} codebooks",
        found,
        expected
    )]
    CodebookCountMismatch { expected: usize, found: usize },

    #[error("Index {:?} is out of bounds for shape {:?}", index, shape)]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Cannot initialize random number generator for quantization")]
    ConstructRng(#[source] rand::Error),
}
