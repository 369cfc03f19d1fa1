use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::codebooks::Method;
use crate::error::QuantizationError;

/// Seed used by clustering methods when no seed is set.
const DEFAULT_SEED: u64 = 42;

/// Quantizer construction options.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QuantizerOptions {
    /// Number of prototypes per codebook.
    pub k: usize,

    /// Number of codebooks. For orthogonal methods this is the number
    /// of variable ranges, for residual quantization the number of
    /// layers.
    pub m: usize,

    /// Codebook construction method.
    pub method: Method,

    /// Maximum number of k-means iterations, ignored by sampling.
    pub maxiter: usize,

    /// Seed of the random number generator.
    ///
    /// Without a seed, sampling draws prototypes from entropy, while the
    /// clustering methods use a fixed seed.
    pub seed: Option<u64>,
}

impl Default for QuantizerOptions {
    fn default() -> Self {
        QuantizerOptions {
            k: 256,
            m: 1,
            method: Method::default(),
            maxiter: 25,
            seed: None,
        }
    }
}

impl QuantizerOptions {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    /// Use a fixed seed, making every method reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check that the options describe a valid quantizer.
    pub fn validate(&self) -> Result<(), QuantizationError> {
        if self.k == 0 {
            return Err(QuantizationError::IncorrectNPrototypes);
        }

        if self.m == 0 {
            return Err(QuantizationError::IncorrectNCodebooks);
        }

        if self.method.is_iterative() && self.maxiter == 0 {
            return Err(QuantizationError::IncorrectNIterations);
        }

        Ok(())
    }

    pub(crate) fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None if self.method.is_iterative() => ChaCha8Rng::seed_from_u64(DEFAULT_SEED),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
