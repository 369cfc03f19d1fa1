use std::iter;

use log::info;
use ndarray::{s, ArrayView2, Axis, NdFloat};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::{check_codebook_invariants, check_iterations, rowrange};
use crate::codebook::{check_code_width, Code, CodeBook};
use crate::distance::Distance;
use crate::element::Element;
use crate::error::QuantizationError;
use crate::kmeans::train_centroids;

/// Build product quantization codebooks (Jégou et al., 2011).
///
/// The variables (rows) of `instances` are split in `n_codebooks`
/// ranges. The codebook of each range consists of `n_prototypes`
/// centroids, obtained by k-means clustering of the instances (columns)
/// restricted to that range. Clustering stops after `max_iterations`
/// iterations or when assignments no longer change.
///
/// `rng` is used for picking the initial centroids of each codebook.
/// Codebooks are trained in parallel, each with an RNG seeded from
/// `rng`, so we require a cryptographic RNG to avoid correlations
/// between the seeded RNGs. Training is deterministic for a given
/// `rng` state.
pub fn pq_codebooks<U, A, D, R>(
    instances: ArrayView2<A>,
    n_prototypes: usize,
    n_codebooks: usize,
    distance: &D,
    max_iterations: usize,
    rng: &mut R,
) -> Result<Vec<CodeBook<U, A>>, QuantizationError>
where
    U: Code,
    A: Element + NdFloat,
    D: Distance,
    R: CryptoRng + RngCore,
{
    check_codebook_invariants(instances, n_prototypes, n_codebooks, true)?;
    check_iterations(max_iterations)?;
    check_code_width::<U>(n_prototypes)?;

    let n_vars = instances.nrows();

    let rngs = iter::repeat_with(|| ChaCha8Rng::from_rng(&mut *rng))
        .take(n_codebooks)
        .collect::<Result<Vec<_>, _>>()
        .map_err(QuantizationError::ConstructRng)?;

    rngs.into_par_iter()
        .enumerate()
        .map(|(idx, mut rng)| {
            info!("Training PQ codebook {}", idx);

            let rows = rowrange(n_vars, n_codebooks, idx);
            let centroids = train_centroids(
                instances.slice(s![rows, ..]),
                Axis(1),
                n_prototypes,
                max_iterations,
                distance,
                &mut rng,
            );

            CodeBook::from_prototypes(centroids.reversed_axes())
        })
        .collect()
}
