use log::info;
use ndarray::{s, ArrayView2, Axis};
use rand::seq::index;
use rand::Rng;

use super::{check_codebook_invariants, rowrange};
use crate::codebook::{check_code_width, Code, CodeBook};
use crate::element::Element;
use crate::error::QuantizationError;

/// Build codebooks by sampling prototypes.
///
/// The variables (rows) of `instances` are split in `n_codebooks`
/// ranges. For each range, `n_prototypes` distinct instances (columns)
/// are sampled with `rng` and used as the prototypes of the range's
/// codebook. Codes are assigned in sampling order.
///
/// Sampling does not compute new values, so it works for any element
/// type. Fails when more prototypes are requested than there are
/// instances.
pub fn sampling_codebooks<U, A, R>(
    instances: ArrayView2<A>,
    n_prototypes: usize,
    n_codebooks: usize,
    rng: &mut R,
) -> Result<Vec<CodeBook<U, A>>, QuantizationError>
where
    U: Code,
    A: Element,
    R: Rng,
{
    check_codebook_invariants(instances, n_prototypes, n_codebooks, true)?;
    check_code_width::<U>(n_prototypes)?;

    let (n_vars, n_instances) = instances.dim();

    (0..n_codebooks)
        .map(|idx| {
            info!("Sampling codebook {}", idx);

            let rows = rowrange(n_vars, n_codebooks, idx);
            let sampled = index::sample(&mut *rng, n_instances, n_prototypes).into_vec();
            let prototypes = instances.slice(s![rows, ..]).select(Axis(1), &sampled);
            CodeBook::from_prototypes(prototypes)
        })
        .collect()
}
