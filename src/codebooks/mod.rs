//! Codebook construction.
//!
//! Four algorithms build codebooks from a training matrix with variables
//! along the rows and samples along the columns:
//!
//! * [`sampling_codebooks`]: random samples as prototypes.
//! * [`pq_codebooks`]: product quantization (Jégou et al., 2011).
//! * [`opq_codebooks`]: optimized product quantization, or 'cartesian'
//!   k-means (Ge et al., 2013).
//! * [`rvq_codebooks`]: residual vector quantization (Chen et al., 2010).
//!
//! The first three partition the variables into contiguous row ranges
//! (see [`rowrange`]) with one codebook per range. Residual quantization
//! builds codebooks over all variables, each quantizing the residual of
//! the codebooks before it.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use ndarray::ArrayView2;

use crate::error::QuantizationError;

mod opq;
pub use self::opq::opq_codebooks;

mod pq;
pub use self::pq::pq_codebooks;

mod rvq;
pub use self::rvq::rvq_codebooks;

mod sampling;
pub use self::sampling::sampling_codebooks;

/// How the codebooks of a quantizer combine into a reconstruction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Quantization {
    /// Codebooks quantize successive residuals of all variables, their
    /// prototypes are summed.
    Additive,

    /// Codebooks quantize disjoint ranges of variables, their prototypes
    /// are concatenated.
    Orthogonal,
}

/// Codebook construction algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    /// Random sampling of prototypes.
    Sample,

    /// k-means clustering of variable ranges.
    Pq,

    /// 'Cartesian' k-means clustering of rotated variable ranges.
    Opq,

    /// Residual k-means clustering.
    Rvq,
}

impl Method {
    /// Get the quantization family of the method.
    pub fn quantization(self) -> Quantization {
        match self {
            Method::Rvq => Quantization::Additive,
            Method::Sample | Method::Pq | Method::Opq => Quantization::Orthogonal,
        }
    }

    /// Returns `true` if the method computes prototypes as means, which
    /// requires floating point elements.
    pub fn requires_float(self) -> bool {
        !matches!(self, Method::Sample)
    }

    /// Returns `true` if the method uses iterative clustering.
    pub fn is_iterative(self) -> bool {
        self.requires_float()
    }

    fn name(self) -> &'static str {
        match self {
            Method::Sample => "sample",
            Method::Pq => "pq",
            Method::Opq => "opq",
            Method::Rvq => "rvq",
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Sample
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = QuantizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sample" => Ok(Method::Sample),
            "pq" => Ok(Method::Pq),
            "opq" => Ok(Method::Opq),
            "rvq" => Ok(Method::Rvq),
            _ => Err(QuantizationError::UnknownMethod(s.to_owned())),
        }
    }
}

/// Get the *i*-th of *m* contiguous ranges that split `0..n`.
///
/// The ranges differ in length by at most one, the remainder of
/// *n / m* is assigned to the first ranges. For example, splitting
/// 10 variables in 3 ranges gives `0..4`, `4..7` and `7..10`.
pub fn rowrange(n: usize, m: usize, i: usize) -> Range<usize> {
    assert!(m > 0, "Cannot split into zero ranges");
    assert!(i < m, "Range index {} out of bounds for {} ranges", i, m);

    let len = n / m;
    let remainder = n % m;
    let start = i * len + i.min(remainder);
    let end = start + len + usize::from(i < remainder);

    start..end
}

/// Check the parameters shared by all codebook algorithms.
///
/// `partitioned` indicates that the variables of `instances` are split
/// over the codebooks.
pub(crate) fn check_codebook_invariants<A>(
    instances: ArrayView2<A>,
    n_prototypes: usize,
    n_codebooks: usize,
    partitioned: bool,
) -> Result<(), QuantizationError> {
    if n_prototypes == 0 {
        return Err(QuantizationError::IncorrectNPrototypes);
    }

    if n_codebooks == 0 {
        return Err(QuantizationError::IncorrectNCodebooks);
    }

    if partitioned && n_codebooks > instances.nrows() {
        return Err(QuantizationError::TooManyCodebooks {
            n_codebooks,
            n_vars: instances.nrows(),
        });
    }

    if n_prototypes > instances.ncols() {
        return Err(QuantizationError::TooManyPrototypes {
            n_prototypes,
            n_samples: instances.ncols(),
        });
    }

    Ok(())
}

pub(crate) fn check_iterations(max_iterations: usize) -> Result<(), QuantizationError> {
    if max_iterations == 0 {
        return Err(QuantizationError::IncorrectNIterations);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::{check_codebook_invariants, rowrange, Method, Quantization};
    use crate::error::QuantizationError;

    #[test]
    fn rowrange_uneven_split() {
        let ranges = (0..3).map(|i| rowrange(10, 3, i)).collect::<Vec<_>>();
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn rowrange_tiles_variables() {
        for n in 1..40 {
            for m in 1..=n {
                let mut next = 0;
                let mut prev_len = usize::max_value();
                for i in 0..m {
                    let range = rowrange(n, m, i);
                    assert_eq!(range.start, next);
                    assert!(!range.is_empty());
                    assert!(range.len() <= prev_len);
                    prev_len = range.len();
                    next = range.end;
                }
                assert_eq!(next, n);
            }
        }
    }

    #[test]
    #[should_panic]
    fn rowrange_index_out_of_bounds() {
        rowrange(10, 3, 3);
    }

    #[test]
    fn method_from_str() {
        assert_eq!("sample".parse::<Method>().unwrap(), Method::Sample);
        assert_eq!("PQ".parse::<Method>().unwrap(), Method::Pq);
        assert_eq!("opq".parse::<Method>().unwrap(), Method::Opq);
        assert_eq!(" rvq".parse::<Method>().unwrap(), Method::Rvq);
        assert!(matches!(
            "kmeans".parse::<Method>(),
            Err(QuantizationError::UnknownMethod(ref name)) if name == "kmeans"
        ));
        assert_eq!(Method::Opq.to_string(), "opq");
    }

    #[test]
    fn method_quantization() {
        assert_eq!(Method::Sample.quantization(), Quantization::Orthogonal);
        assert_eq!(Method::Pq.quantization(), Quantization::Orthogonal);
        assert_eq!(Method::Opq.quantization(), Quantization::Orthogonal);
        assert_eq!(Method::Rvq.quantization(), Quantization::Additive);
        assert!(!Method::Sample.requires_float());
        assert!(Method::Rvq.requires_float());
    }

    #[test]
    fn invariants() {
        let x = Array2::<f32>::zeros((4, 10));
        assert!(check_codebook_invariants(x.view(), 10, 4, true).is_ok());
        assert!(matches!(
            check_codebook_invariants(x.view(), 0, 1, true),
            Err(QuantizationError::IncorrectNPrototypes)
        ));
        assert!(matches!(
            check_codebook_invariants(x.view(), 1, 0, true),
            Err(QuantizationError::IncorrectNCodebooks)
        ));
        assert!(matches!(
            check_codebook_invariants(x.view(), 2, 5, true),
            Err(QuantizationError::TooManyCodebooks {
                n_codebooks: 5,
                n_vars: 4
            })
        ));
        assert!(check_codebook_invariants(x.view(), 2, 5, false).is_ok());
        assert!(matches!(
            check_codebook_invariants(x.view(), 11, 1, true),
            Err(QuantizationError::TooManyPrototypes {
                n_prototypes: 11,
                n_samples: 10
            })
        ));
    }
}
