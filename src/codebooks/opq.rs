use log::{info, warn};
use nalgebra::RealField;
use ndarray::{s, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, NdFloat};
use ordered_float::OrderedFloat;
use rand::Rng;
use rayon::prelude::*;

use super::{check_codebook_invariants, check_iterations, rowrange};
use crate::codebook::{check_code_width, Code, CodeBook};
use crate::distance::Distance;
use crate::element::Element;
use crate::error::QuantizationError;
use crate::kmeans::{cluster_assignments, InitialCentroids, KMeansIteration, RandomInstanceCentroids};
use crate::linalg::{Covariance, Eigh, Svd};

/// Build optimized product quantization codebooks (Ge et al., 2013).
///
/// Optimized product quantization, also known as 'cartesian' k-means,
/// learns an orthonormal *n_vars × n_vars* projection *P* together with
/// the codebooks. The variables of the projected instances *Pᵀ X* are
/// split in `n_codebooks` ranges, like in product quantization. The
/// projection balances variances over the ranges and reduces the
/// correlation between them.
///
/// The projection is initialized by allocating the eigenvectors of the
/// covariance matrix to the ranges, such that the products of their
/// eigenvalues are balanced. Each of the `max_iterations` iterations
/// performs one k-means step per range, followed by an orthogonal
/// Procrustes update of the projection.
///
/// Returns the codebooks, whose prototypes live in the projected space,
/// and the projection. Instances must be projected (*Pᵀ x*) before they
/// are encoded, reconstructions are mapped back with *P*.
pub fn opq_codebooks<U, A, D, R>(
    instances: ArrayView2<A>,
    n_prototypes: usize,
    n_codebooks: usize,
    distance: &D,
    max_iterations: usize,
    rng: &mut R,
) -> Result<(Vec<CodeBook<U, A>>, Array2<A>), QuantizationError>
where
    U: Code,
    A: Element + NdFloat + RealField,
    D: Distance,
    R: Rng,
{
    check_codebook_invariants(instances, n_prototypes, n_codebooks, true)?;
    check_iterations(max_iterations)?;
    check_code_width::<U>(n_prototypes)?;

    let n_vars = instances.nrows();

    // Find initial projection matrix, which will be refined iteratively.
    let mut projection = create_projection_matrix(instances, n_codebooks);
    let rx = projection.t().dot(&instances);

    // Pick centroids.
    let mut centroids = (0..n_codebooks)
        .map(|idx| {
            let rows = rowrange(n_vars, n_codebooks, idx);
            RandomInstanceCentroids::new(&mut *rng).initial_centroids(
                rx.slice(s![rows, ..]),
                Axis(1),
                n_prototypes,
            )
        })
        .collect::<Vec<_>>();

    // Iteratively refine the clusters and the projection matrix.
    for iteration in 0..max_iterations {
        info!("OPQ train iteration {}", iteration);
        train_iteration(&mut projection, &mut centroids, instances, distance);
    }

    // Align the centroids with the final projection.
    let rx = projection.t().dot(&instances);
    update_subquantizers(&mut centroids, rx.view(), distance);

    let codebooks = centroids
        .into_iter()
        .map(|centroids| CodeBook::from_prototypes(centroids.reversed_axes()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((codebooks, projection))
}

fn train_iteration<A, D>(
    projection: &mut Array2<A>,
    centroids: &mut [Array2<A>],
    instances: ArrayView2<A>,
    distance: &D,
) where
    A: Element + NdFloat + RealField,
    D: Distance,
{
    // Perform one iteration of cluster updates, using regular k-means.
    let rx = projection.t().dot(&instances);
    update_subquantizers(centroids, rx.view(), distance);

    // Do a quantization -> reconstruction roundtrip in the projected space.
    let reconstructed = reconstruct_projected(centroids, rx.view(), distance);

    // Find the new projection matrix using the instances and their
    // (projected) reconstructions. See (the text below) Eq 7 in
    // Ge et al., 2013.
    match instances.dot(&reconstructed.t()).svd() {
        Some((u, _, vt)) => *projection = u.dot(&vt),
        None => warn!("SVD did not converge, keeping the previous projection"),
    }
}

fn update_subquantizers<A, D>(centroids: &mut [Array2<A>], instances: ArrayView2<A>, distance: &D)
where
    A: Element + NdFloat,
    D: Distance,
{
    let n_vars = instances.nrows();
    let n_codebooks = centroids.len();

    centroids
        .par_iter_mut()
        .enumerate()
        .for_each(|(idx, sq_centroids)| {
            let rows = rowrange(n_vars, n_codebooks, idx);
            instances
                .slice(s![rows, ..])
                .kmeans_iteration(Axis(1), sq_centroids.view_mut(), distance);
        });
}

fn reconstruct_projected<A, D>(
    centroids: &[Array2<A>],
    instances: ArrayView2<A>,
    distance: &D,
) -> Array2<A>
where
    A: Element + NdFloat,
    D: Distance,
{
    let n_vars = instances.nrows();
    let mut reconstructed = Array2::zeros(instances.raw_dim());

    for (idx, sq_centroids) in centroids.iter().enumerate() {
        let rows = rowrange(n_vars, centroids.len(), idx);
        let assignments = cluster_assignments(
            sq_centroids.view(),
            instances.slice(s![rows.clone(), ..]),
            Axis(1),
            distance,
        );

        for (mut reconstruction, assignment) in reconstructed
            .slice_mut(s![rows, ..])
            .axis_iter_mut(Axis(1))
            .zip(assignments)
        {
            reconstruction.assign(&sq_centroids.row(assignment));
        }
    }

    reconstructed
}

/// Create the initial projection matrix.
///
/// The columns of the projection are eigenvectors of the covariance
/// matrix of `instances`. Eigenvectors are allocated to the variable
/// ranges of the codebooks by `bucket_eigenvalues`, so that the
/// projected variables of the *i*-th range are the *i*-th bucket.
pub(crate) fn create_projection_matrix<A>(instances: ArrayView2<A>, n_codebooks: usize) -> Array2<A>
where
    A: NdFloat + RealField,
{
    info!(
        "Creating projection matrix ({} instances, {} dimensions, {} codebooks)",
        instances.ncols(),
        instances.nrows(),
        n_codebooks
    );

    let n_vars = instances.nrows();

    // Compute the covariance matrix.
    let cov = instances.covariance(Axis(1));

    // Find eigenvalues/vectors. The covariance matrix is positive
    // semi-definite, clamp rounding errors below zero.
    let (eigen_values, eigen_vectors) = cov.eigh();
    let eigen_values = eigen_values.mapv(|v| if v < A::zero() { A::zero() } else { v });

    let capacities = (0..n_codebooks)
        .map(|idx| rowrange(n_vars, n_codebooks, idx).len())
        .collect::<Vec<_>>();
    let buckets = bucket_eigenvalues(eigen_values.view(), &capacities);

    let mut transformations = Array2::zeros((n_vars, n_vars));
    for (idx, direction_idx) in buckets.into_iter().flatten().enumerate() {
        transformations
            .index_axis_mut(Axis(1), idx)
            .assign(&eigen_vectors.index_axis(Axis(1), direction_idx));
    }

    transformations
}

/// Distribute eigenvalues over buckets.
///
/// Bucket *i* receives exactly `capacities[i]` eigenvalues. Eigenvalues
/// are assigned from large to small, each to the non-full bucket with
/// the smallest product of eigenvalues.
fn bucket_eigenvalues<S, A>(eigenvalues: ArrayBase<S, Ix1>, capacities: &[usize]) -> Vec<Vec<usize>>
where
    S: Data<Elem = A>,
    A: NdFloat,
{
    assert!(
        !capacities.is_empty(),
        "Cannot distribute eigenvalues over zero buckets."
    );
    assert_eq!(
        eigenvalues.len(),
        capacities.iter().sum::<usize>(),
        "The number of eigenvalues should be equal to the total bucket capacity."
    );

    let mut eigenvalue_indices: Vec<usize> = (0..eigenvalues.len()).collect();
    eigenvalue_indices
        .sort_unstable_by(|l, r| OrderedFloat(eigenvalues[*l]).cmp(&OrderedFloat(eigenvalues[*r])));

    if eigenvalue_indices.is_empty() {
        return vec![vec![]; capacities.len()];
    }

    // Only handle positive values, to switch to log-space. This is
    // ok for our purposes, since we only eigendecompose covariance
    // matrices.
    assert!(
        eigenvalues[eigenvalue_indices[0]] >= A::zero(),
        "Bucketing is only supported for positive eigenvalues."
    );

    // Do eigenvalue multiplication in log-space to avoid over/underflow.
    let mut eigenvalues = eigenvalues.map(|&v| (v + A::epsilon()).ln());

    // Make values positive, this is so that we can treat eigenvalues
    // (0,1] and [1,] in the same manner.
    let smallest = eigenvalues
        .iter()
        .cloned()
        .min_by_key(|&v| OrderedFloat(v))
        .unwrap_or_else(A::zero);
    eigenvalues.map_mut(|v| *v -= smallest);

    let mut assignments = vec![vec![]; capacities.len()];
    let mut products = vec![A::zero(); capacities.len()];

    while let Some(eigenvalue_idx) = eigenvalue_indices.pop() {
        // Find non-full bucket with the smallest product.
        let (idx, _) = assignments
            .iter()
            .enumerate()
            .filter(|(idx, a)| a.len() < capacities[*idx])
            .min_by_key(|(idx, _)| OrderedFloat(products[*idx]))
            .expect("Eigenvalue left without a bucket");

        assignments[idx].push(eigenvalue_idx);
        products[idx] += eigenvalues[eigenvalue_idx];
    }

    assignments
}
