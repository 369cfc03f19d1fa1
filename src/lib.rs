//! Lossy compression of vectors and matrices through quantization.
//!
//! The samples (columns) of a matrix are replaced by codes that refer to
//! prototypes in small codebooks. Codebooks can be sampled from the
//! data, or learned with product quantization, optimized product
//! quantization or residual vector quantization. See the
//! [`quantizer`] module for the entry points.

pub mod codebook;

pub mod codebooks;

pub mod distance;

pub mod element;

pub mod error;

pub mod kmeans;

pub mod linalg;

pub mod quantizer;

pub use crate::codebook::{quantized_eltype, CodeBook, CodeWidth};
pub use crate::codebooks::{Method, Quantization};
pub use crate::error::QuantizationError;
pub use crate::quantizer::{
    build_quantizer, quantize, ArrayQuantizer, Quantized, QuantizedArray, QuantizerOptions,
};
