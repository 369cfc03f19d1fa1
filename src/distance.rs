//! Pairwise distances between vectors.

use ndarray::{ArrayBase, Data, Ix1};

use crate::element::Element;

/// Pairwise distance between two vectors of equal length.
///
/// A distance should be non-negative and symmetric, it does not have
/// to be a metric. Distances are evaluated concurrently during
/// training and encoding, so implementations must be free of side
/// effects.
pub trait Distance: Sync {
    /// Compute the distance between `a` and `b`.
    fn distance<A, S1, S2>(&self, a: ArrayBase<S1, Ix1>, b: ArrayBase<S2, Ix1>) -> f64
    where
        A: Element,
        S1: Data<Elem = A>,
        S2: Data<Elem = A>;
}

/// Squared euclidean distance.
///
/// This is the default distance. It yields the same nearest prototypes
/// as the euclidean distance without taking square roots.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SquaredEuclidean;

impl Distance for SquaredEuclidean {
    fn distance<A, S1, S2>(&self, a: ArrayBase<S1, Ix1>, b: ArrayBase<S2, Ix1>) -> f64
    where
        A: Element,
        S1: Data<Elem = A>,
        S2: Data<Elem = A>,
    {
        debug_assert_eq!(a.len(), b.len(), "Vector length mismatch");
        a.iter()
            .zip(b.iter())
            .map(|(&a, &b)| {
                let diff = a.as_f64() - b.as_f64();
                diff * diff
            })
            .sum()
    }
}

/// Euclidean distance.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Euclidean;

impl Distance for Euclidean {
    fn distance<A, S1, S2>(&self, a: ArrayBase<S1, Ix1>, b: ArrayBase<S2, Ix1>) -> f64
    where
        A: Element,
        S1: Data<Elem = A>,
        S2: Data<Elem = A>,
    {
        SquaredEuclidean.distance(a, b).sqrt()
    }
}

/// City block (Manhattan) distance.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Cityblock;

impl Distance for Cityblock {
    fn distance<A, S1, S2>(&self, a: ArrayBase<S1, Ix1>, b: ArrayBase<S2, Ix1>) -> f64
    where
        A: Element,
        S1: Data<Elem = A>,
        S2: Data<Elem = A>,
    {
        debug_assert_eq!(a.len(), b.len(), "Vector length mismatch");
        a.iter()
            .zip(b.iter())
            .map(|(&a, &b)| (a.as_f64() - b.as_f64()).abs())
            .sum()
    }
}

/// Chebyshev (maximum coordinate) distance.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Chebyshev;

impl Distance for Chebyshev {
    fn distance<A, S1, S2>(&self, a: ArrayBase<S1, Ix1>, b: ArrayBase<S2, Ix1>) -> f64
    where
        A: Element,
        S1: Data<Elem = A>,
        S2: Data<Elem = A>,
    {
        debug_assert_eq!(a.len(), b.len(), "Vector length mismatch");
        a.iter()
            .zip(b.iter())
            .map(|(&a, &b)| (a.as_f64() - b.as_f64()).abs())
            .fold(0., f64::max)
    }
}

/// Cosine distance, *1 - cos(a, b)*.
///
/// The distance between a zero vector and any other vector is 1.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CosineDistance;

impl Distance for CosineDistance {
    fn distance<A, S1, S2>(&self, a: ArrayBase<S1, Ix1>, b: ArrayBase<S2, Ix1>) -> f64
    where
        A: Element,
        S1: Data<Elem = A>,
        S2: Data<Elem = A>,
    {
        debug_assert_eq!(a.len(), b.len(), "Vector length mismatch");

        let (mut dot, mut norm_a, mut norm_b) = (0., 0., 0.);
        for (&a, &b) in a.iter().zip(b.iter()) {
            let (a, b) = (a.as_f64(), b.as_f64());
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        if norm_a == 0. || norm_b == 0. {
            return 1.;
        }

        (1. - dot / (norm_a.sqrt() * norm_b.sqrt())).max(0.)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::{Chebyshev, Cityblock, CosineDistance, Distance, Euclidean, SquaredEuclidean};

    #[test]
    fn squared_euclidean_distance() {
        let a = array![1., 2., 3.];
        let b = array![2., 0., 3.];
        assert_abs_diff_eq!(SquaredEuclidean.distance(a.view(), b.view()), 5.);
        assert_abs_diff_eq!(Euclidean.distance(a.view(), b.view()), 5f64.sqrt());
    }

    #[test]
    fn integer_distances() {
        let a = array![1i32, -2, 3];
        let b = array![4i32, 2, 3];
        assert_abs_diff_eq!(SquaredEuclidean.distance(a.view(), b.view()), 25.);
        assert_abs_diff_eq!(Cityblock.distance(a.view(), b.view()), 7.);
        assert_abs_diff_eq!(Chebyshev.distance(a.view(), b.view()), 4.);
    }

    #[test]
    fn distances_are_symmetric() {
        let a = array![0.5f32, -1., 2.];
        let b = array![1f32, 1., -1.];
        assert_abs_diff_eq!(
            Cityblock.distance(a.view(), b.view()),
            Cityblock.distance(b.view(), a.view())
        );
        assert_abs_diff_eq!(
            CosineDistance.distance(a.view(), b.view()),
            CosineDistance.distance(b.view(), a.view())
        );
    }

    #[test]
    fn cosine_distance() {
        let a = array![1., 0.];
        let b = array![0., 2.];
        let c = array![3., 0.];
        let zero = array![0., 0.];
        assert_abs_diff_eq!(CosineDistance.distance(a.view(), b.view()), 1.);
        assert_abs_diff_eq!(CosineDistance.distance(a.view(), c.view()), 0.);
        assert_abs_diff_eq!(CosineDistance.distance(a.view(), zero.view()), 1.);
    }
}
