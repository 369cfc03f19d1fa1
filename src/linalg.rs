//! Various linear algebra utility traits.

use nalgebra::{DMatrix, RealField, Scalar};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2, NdFloat};

/// Trait for computing covariance matrices.
pub trait Covariance<A> {
    /// Compute the covariance matrix the matrix.
    ///
    /// Consider an *n × m* matrix A. If *n* is the observation axis and
    /// *m* the variable axis, then this method returns an *m × m* covariance
    /// matrix *C*. *C_ij* is the the covariance between variables *i* and *j*
    /// and *C_ii* the variance of variable *i*.
    ///
    /// With a single observation the unnormalized scatter matrix is
    /// returned.
    fn covariance(self, observation_axis: Axis) -> Array2<A>;
}

impl<S, A> Covariance<A> for ArrayBase<S, Ix2>
where
    S: Data<Elem = A>,
    A: NdFloat,
{
    fn covariance(self, observation_axis: Axis) -> Array2<A> {
        let n_observations = self.len_of(observation_axis);
        let as_float = |n: usize| A::from(n.max(1)).unwrap_or_else(A::one);

        // Center the data
        let means = self.sum_axis(observation_axis) / as_float(n_observations);
        let mut centered = self.to_owned();
        centered
            .axis_iter_mut(observation_axis)
            .for_each(|mut o| o -= &means);

        let normalization = as_float(n_observations.saturating_sub(1));

        // Compute the covariance matrix.
        if observation_axis == Axis(0) {
            centered.t().dot(&centered.map(|v| *v / normalization))
        } else {
            centered.dot(&centered.t().map(|v| *v / normalization))
        }
    }
}

/// Eigen-decomposition of symmetric matrices.
pub trait Eigh<A> {
    /// Decompose a symmetric *n × n* matrix.
    ///
    /// Returns the eigenvalues and a matrix with the corresponding
    /// orthonormal eigenvectors as columns. Eigenvalues are not sorted.
    fn eigh(&self) -> (Array1<A>, Array2<A>);
}

impl<S, A> Eigh<A> for ArrayBase<S, Ix2>
where
    S: Data<Elem = A>,
    A: NdFloat + RealField,
{
    fn eigh(&self) -> (Array1<A>, Array2<A>) {
        assert_eq!(
            self.nrows(),
            self.ncols(),
            "Eigen-decomposition requires a square matrix"
        );

        let eigen = to_dmatrix(self).symmetric_eigen();
        (
            eigen.eigenvalues.iter().cloned().collect(),
            from_dmatrix(&eigen.eigenvectors),
        )
    }
}

/// Singular value decomposition.
pub trait Svd<A> {
    /// Decompose an *n × m* matrix into *U S Vᵀ*.
    ///
    /// Returns *U*, the singular values *S* and *Vᵀ*, or `None` if the
    /// decomposition does not provide the singular vectors.
    fn svd(&self) -> Option<(Array2<A>, Array1<A>, Array2<A>)>;
}

impl<S, A> Svd<A> for ArrayBase<S, Ix2>
where
    S: Data<Elem = A>,
    A: NdFloat + RealField,
{
    fn svd(&self) -> Option<(Array2<A>, Array1<A>, Array2<A>)> {
        let svd = to_dmatrix(self).svd(true, true);
        let u = svd.u?;
        let v_t = svd.v_t?;

        Some((
            from_dmatrix(&u),
            svd.singular_values.iter().cloned().collect(),
            from_dmatrix(&v_t),
        ))
    }
}

fn to_dmatrix<S, A>(m: &ArrayBase<S, Ix2>) -> DMatrix<A>
where
    S: Data<Elem = A>,
    A: Scalar,
{
    DMatrix::from_fn(m.nrows(), m.ncols(), |row, col| m[[row, col]].clone())
}

fn from_dmatrix<A>(m: &DMatrix<A>) -> Array2<A>
where
    A: Scalar,
{
    Array2::from_shape_fn(m.shape(), |(row, col)| m[(row, col)].clone())
}
