//! K-means clustering.

use log::debug;
use ndarray::parallel::prelude::*;
use ndarray::{
    Array1, Array2, ArrayBase, ArrayView2, ArrayViewMut2, Axis, Data, Ix1, Ix2, NdFloat,
};
use rand::seq::index;
use rand::Rng;

use crate::distance::Distance;
use crate::element::Element;

/// Initial centroid selection.
pub trait InitialCentroids<A> {
    /// Pick *k* initial centroids for k-mean clustering.
    ///
    /// The initial centroid selection can use the provided `data`, where
    /// instances are along `instance_axis`.
    ///
    /// Implementations return a matrix with centroids as rows.
    fn initial_centroids<S>(
        &mut self,
        data: ArrayBase<S, Ix2>,
        instance_axis: Axis,
        k: usize,
    ) -> Array2<A>
    where
        S: Data<Elem = A>;
}

/// Pick random data set instances as centroids.
pub struct RandomInstanceCentroids<R>(R);

impl<R> RandomInstanceCentroids<R>
where
    R: Rng,
{
    /// Construct `RandomInstanceCentroids` from a random number generator.
    pub fn new(rng: R) -> Self {
        RandomInstanceCentroids(rng)
    }
}

impl<A, R> InitialCentroids<A> for RandomInstanceCentroids<R>
where
    A: Element,
    R: Rng,
{
    fn initial_centroids<S>(
        &mut self,
        data: ArrayBase<S, Ix2>,
        instance_axis: Axis,
        k: usize,
    ) -> Array2<A>
    where
        S: Data<Elem = A>,
    {
        let n_instances = data.len_of(instance_axis);
        assert!(
            k <= n_instances,
            "Cannot pick {} distinct centroids from {} instances",
            k,
            n_instances
        );

        // Use random instances as centroids. Index sampling is ordered by
        // the RNG state, so a seeded RNG gives reproducible centroids.
        let initial_indices = index::sample(&mut self.0, n_instances, k);

        let mut centroids = Array2::zeros((k, data.len() / n_instances));
        for (idx, mut centroid) in initial_indices.iter().zip(centroids.outer_iter_mut()) {
            centroid.assign(&data.index_axis(instance_axis, idx));
        }

        centroids
    }
}

/// k-means stopping conditions.
pub trait StopCondition {
    /// Returns `true` when k-means clustering should stop.
    fn should_stop(&mut self, iteration: usize, loss: f64) -> bool;
}

/// Condition that stops clustering after N iterations.
#[derive(Copy, Clone, Debug)]
pub struct NIterationsCondition(pub usize);

impl StopCondition for NIterationsCondition {
    fn should_stop(&mut self, iteration: usize, _loss: f64) -> bool {
        iteration >= self.0
    }
}

/// Find the nearest centroid of an instance and its distance.
///
/// Centroids are rows of `centroids`. When several centroids are
/// equally near, the one with the lowest index is returned.
pub fn nearest_centroid<A, S, D>(
    centroids: ArrayView2<A>,
    instance: ArrayBase<S, Ix1>,
    distance: &D,
) -> (usize, f64)
where
    A: Element,
    S: Data<Elem = A>,
    D: Distance,
{
    let mut nearest = (0, f64::INFINITY);
    for (idx, centroid) in centroids.outer_iter().enumerate() {
        let dist = distance.distance(centroid, instance.view());
        if dist < nearest.1 {
            nearest = (idx, dist);
        }
    }

    nearest
}

/// Find nearest cluster centroid for each instance.
///
/// Find nearest centroid for each instance along `instance_axis` of
/// `instances`. Returns for each instance the index of the nearest
/// cluster centroid. Instances are assigned in parallel.
pub fn cluster_assignments<A, D>(
    centroids: ArrayView2<A>,
    instances: ArrayView2<A>,
    instance_axis: Axis,
    distance: &D,
) -> Vec<usize>
where
    A: Element,
    D: Distance,
{
    nearest_centroids(centroids, instances, instance_axis, distance)
        .into_iter()
        .map(|(idx, _)| idx)
        .collect()
}

fn nearest_centroids<A, D>(
    centroids: ArrayView2<A>,
    instances: ArrayView2<A>,
    instance_axis: Axis,
    distance: &D,
) -> Vec<(usize, f64)>
where
    A: Element,
    D: Distance,
{
    instances
        .axis_iter(instance_axis)
        .into_par_iter()
        .map(|instance| nearest_centroid(centroids, instance, distance))
        .collect()
}

/// Update centroids to the mean of the assigned data points.
///
/// `instance_axis` is the instance axis of `data`. The centroids
/// are row-based. `assignments` contains an assignment for each
/// data point. Centroids without assigned instances are left unchanged.
fn update_centroids<A>(
    mut centroids: ArrayViewMut2<A>,
    data: ArrayView2<A>,
    instance_axis: Axis,
    assignments: &[usize],
) where
    A: NdFloat,
{
    assert_eq!(
        assignments.len(),
        data.len_of(instance_axis),
        "The number of assignments should be equal to the number of instances."
    );

    let mut sums = Array2::zeros(centroids.raw_dim());
    let mut centroid_counts = Array1::<A>::zeros(centroids.nrows());

    for (instance, &assignment) in data.axis_iter(instance_axis).zip(assignments) {
        let mut sum = sums.index_axis_mut(Axis(0), assignment);
        sum += &instance;
        centroid_counts[assignment] += A::one();
    }

    for ((mut centroid, sum), &count) in centroids
        .outer_iter_mut()
        .zip(sums.outer_iter())
        .zip(centroid_counts.iter())
    {
        if count > A::zero() {
            centroid.assign(&(&sum / count));
        }
    }
}

/// A single k-means iteration.
pub trait KMeansIteration<A> {
    /// Assign instances to their nearest centroids and move each centroid
    /// to the mean of its instances.
    ///
    /// Returns the mean distance of the instances to their centroids
    /// before the update.
    fn kmeans_iteration<D>(
        &self,
        instance_axis: Axis,
        centroids: ArrayViewMut2<A>,
        distance: &D,
    ) -> f64
    where
        D: Distance;
}

impl<S, A> KMeansIteration<A> for ArrayBase<S, Ix2>
where
    S: Data<Elem = A>,
    A: Element + NdFloat,
{
    fn kmeans_iteration<D>(
        &self,
        instance_axis: Axis,
        mut centroids: ArrayViewMut2<A>,
        distance: &D,
    ) -> f64
    where
        D: Distance,
    {
        let nearest = nearest_centroids(centroids.view(), self.view(), instance_axis, distance);
        let assignments = nearest.iter().map(|&(idx, _)| idx).collect::<Vec<_>>();
        update_centroids(
            centroids.view_mut(),
            self.view(),
            instance_axis,
            &assignments,
        );

        mean_loss(&nearest)
    }
}

/// Lloyd-style k-means with given initial centroids.
pub trait KMeansWithCentroids<A> {
    /// Cluster the instances along `instance_axis`, refining `centroids`.
    ///
    /// Clustering alternates assignment and centroid updates until the
    /// assignments no longer change or `stop_condition` is met. Returns
    /// the mean distance of the instances to their nearest centroid.
    fn kmeans_with_centroids<C, D>(
        &self,
        instance_axis: Axis,
        centroids: ArrayViewMut2<A>,
        stop_condition: C,
        distance: &D,
    ) -> f64
    where
        C: StopCondition,
        D: Distance;
}

impl<S, A> KMeansWithCentroids<A> for ArrayBase<S, Ix2>
where
    S: Data<Elem = A>,
    A: Element + NdFloat,
{
    fn kmeans_with_centroids<C, D>(
        &self,
        instance_axis: Axis,
        mut centroids: ArrayViewMut2<A>,
        mut stop_condition: C,
        distance: &D,
    ) -> f64
    where
        C: StopCondition,
        D: Distance,
    {
        let mut previous_assignments: Option<Vec<usize>> = None;
        let mut iteration = 0;

        loop {
            let nearest = nearest_centroids(centroids.view(), self.view(), instance_axis, distance);
            let loss = mean_loss(&nearest);
            let assignments = nearest.into_iter().map(|(idx, _)| idx).collect::<Vec<_>>();

            if previous_assignments.as_ref() == Some(&assignments) {
                debug!("k-means converged after {} iterations", iteration);
                return loss;
            }

            if stop_condition.should_stop(iteration, loss) {
                debug!("k-means stopped after {} iterations, loss: {}", iteration, loss);
                return loss;
            }

            update_centroids(
                centroids.view_mut(),
                self.view(),
                instance_axis,
                &assignments,
            );

            previous_assignments = Some(assignments);
            iteration += 1;
        }
    }
}

/// Train *k* centroids on instances along `instance_axis`.
///
/// The centroids are initialized with random instances and refined
/// for at most `max_iterations` k-means iterations. Returns the
/// centroids as rows.
pub fn train_centroids<A, D, R>(
    instances: ArrayView2<A>,
    instance_axis: Axis,
    k: usize,
    max_iterations: usize,
    distance: &D,
    rng: &mut R,
) -> Array2<A>
where
    A: Element + NdFloat,
    D: Distance,
    R: Rng,
{
    let mut centroids =
        RandomInstanceCentroids::new(rng).initial_centroids(instances, instance_axis, k);
    instances.kmeans_with_centroids(
        instance_axis,
        centroids.view_mut(),
        NIterationsCondition(max_iterations),
        distance,
    );
    centroids
}

fn mean_loss(nearest: &[(usize, f64)]) -> f64 {
    if nearest.is_empty() {
        return 0.;
    }

    nearest.iter().map(|&(_, dist)| dist).sum::<f64>() / nearest.len() as f64
}
