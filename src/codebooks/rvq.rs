use log::info;
use ndarray::{ArrayView2, Axis, NdFloat};
use rand::Rng;

use super::{check_codebook_invariants, check_iterations};
use crate::codebook::{check_code_width, Code, CodeBook};
use crate::distance::Distance;
use crate::element::Element;
use crate::error::QuantizationError;
use crate::kmeans::train_centroids;

/// Build residual vector quantization codebooks (Chen et al., 2010).
///
/// Each codebook spans all variables (rows) of `instances`. The first
/// codebook clusters the instances, every following codebook clusters
/// the residuals that remain after subtracting the reconstructions of
/// the codebooks before it. An instance is reconstructed as the sum of
/// its prototypes.
///
/// Codebooks are trained one after another, since each depends on the
/// residuals of its predecessors.
pub fn rvq_codebooks<U, A, D, R>(
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
    R: Rng,
{
    check_codebook_invariants(instances, n_prototypes, n_codebooks, false)?;
    check_iterations(max_iterations)?;
    check_code_width::<U>(n_prototypes)?;

    let mut residuals = instances.to_owned();
    let mut codebooks = Vec::with_capacity(n_codebooks);

    for layer in 0..n_codebooks {
        info!("Training RVQ codebook {}", layer);

        let centroids = train_centroids(
            residuals.view(),
            Axis(1),
            n_prototypes,
            max_iterations,
            distance,
            &mut *rng,
        );
        let codebook = CodeBook::from_prototypes(centroids.reversed_axes())?;

        let codes = codebook.encode(residuals.view(), distance)?;
        residuals -= &codebook.decode(codes)?;

        codebooks.push(codebook);
    }

    Ok(codebooks)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, ArrayView2};
    use ndarray_rand::RandomExt;
    use rand::distributions::Uniform;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::rvq_codebooks;
    use crate::codebook::CodeBook;
    use crate::distance::SquaredEuclidean;
    use crate::error::QuantizationError;

    fn test_instances() -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        Array2::random_using((8, 200), Uniform::new(0., 1.), &mut rng)
    }

    fn train(instances: ArrayView2<f64>, k: usize, m: usize, seed: u64) -> Vec<CodeBook<u8, f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rvq_codebooks(instances, k, m, &SquaredEuclidean, 10, &mut rng).unwrap()
    }

    /// Total squared error of additive reconstructions.
    fn squared_error(instances: ArrayView2<f64>, codebooks: &[CodeBook<u8, f64>]) -> f64 {
        let mut residuals = instances.to_owned();
        for codebook in codebooks {
            let codes = codebook.encode(residuals.view(), &SquaredEuclidean).unwrap();
            residuals -= &codebook.decode(codes).unwrap();
        }

        residuals.iter().map(|v| v * v).sum()
    }

    #[test]
    fn codebooks_span_all_variables() {
        let instances = test_instances();
        let codebooks = train(instances.view(), 16, 3, 1);
        assert_eq!(codebooks.len(), 3);
        assert!(codebooks.iter().all(|cb| cb.dim() == 8 && cb.len() == 16));
    }

    #[test]
    fn residual_error_does_not_increase() {
        let instances = test_instances();
        let codebooks = train(instances.view(), 16, 4, 1);

        let errors = (0..=codebooks.len())
            .map(|n| squared_error(instances.view(), &codebooks[..n]))
            .collect::<Vec<_>>();
        for pair in errors.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9);
        }
        assert!(errors[4] < errors[0]);
    }

    #[test]
    fn more_codebooks_than_variables() {
        let instances = test_instances();
        assert_eq!(train(instances.view(), 4, 10, 1).len(), 10);
    }

    #[test]
    fn rvq_is_deterministic() {
        let instances = test_instances();
        assert_eq!(
            train(instances.view(), 8, 3, 5),
            train(instances.view(), 8, 3, 5)
        );
    }

    #[test]
    fn rvq_rejects_too_many_prototypes() {
        let instances = test_instances();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(matches!(
            rvq_codebooks::<u8, _, _, _>(instances.view(), 201, 2, &SquaredEuclidean, 5, &mut rng),
            Err(QuantizationError::TooManyPrototypes { .. })
        ));
    }
}
