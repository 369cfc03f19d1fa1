//! Array quantizers.
//!
//! An [`ArrayQuantizer`] is built from a vector or matrix and encodes
//! arrays with the same number of variables into a code matrix. For
//! matrices, the variables are the rows and each column is a sample.
//! A vector is a single variable.

use log::info;
use ndarray::{
    s, Array2, ArrayBase, ArrayView, ArrayView2, Axis, CowArray, Data, Dimension, Ix1, Ix2,
};

use crate::codebook::{check_code_width, Code, CodeBook};
use crate::codebooks::{
    opq_codebooks, pq_codebooks, rowrange, rvq_codebooks, sampling_codebooks, Method, Quantization,
};
use crate::distance::Distance;
use crate::element::Element;
use crate::error::QuantizationError;

mod array;
pub use self::array::{quantize, Quantized, QuantizedArray};

mod options;
pub use self::options::QuantizerOptions;

/// Get the number of variables of an array with the given shape.
///
/// The number of variables is 1 for vectors and the number of rows
/// for matrices.
pub fn nvars(shape: &[usize]) -> Result<usize, QuantizationError> {
    match shape.len() {
        1 => Ok(1),
        2 => Ok(shape[0]),
        rank => Err(QuantizationError::UnsupportedRank { rank }),
    }
}

/// View a vector or matrix as a matrix with variables as rows.
fn as_matrix<A, D>(aa: ArrayView<A, D>) -> Result<ArrayView2<A>, QuantizationError>
where
    D: Dimension,
{
    match aa.ndim() {
        1 => Ok(aa.into_dimensionality::<Ix1>()?.insert_axis(Axis(0))),
        2 => Ok(aa.into_dimensionality::<Ix2>()?),
        rank => Err(QuantizationError::UnsupportedRank { rank }),
    }
}

/// Quantizer for vectors and matrices.
///
/// The quantizer holds the codebooks learned from a training array,
/// `U` is the type of the codes. Orthogonal quantizers split the
/// variables in contiguous ranges, with one codebook per range.
/// Additive quantizers have codebooks over all variables that encode
/// successive residuals.
///
/// Optimized product quantizers also hold an orthonormal rotation.
/// Arrays are rotated before encoding and reconstructions are rotated
/// back after decoding.
#[derive(Clone, Debug)]
pub struct ArrayQuantizer<U, A, D, Dm>
where
    A: Element,
{
    quantization: Quantization,
    method: Method,
    dims: Dm,
    codebooks: Vec<CodeBook<U, A>>,
    k: usize,
    distance: D,
    rotation: Option<Array2<A::Float>>,
}

/// Build a quantizer from a training array.
///
/// `aa` must be a vector or a matrix. The codebooks are constructed
/// with `options.method`. Parameters are validated before any
/// training takes place. Training data with NaN or infinite elements
/// is rejected.
pub fn build_quantizer<U, A, S, Dm, D>(
    aa: &ArrayBase<S, Dm>,
    options: &QuantizerOptions,
    distance: D,
) -> Result<ArrayQuantizer<U, A, D, Dm>, QuantizationError>
where
    U: Code,
    A: Element,
    S: Data<Elem = A>,
    Dm: Dimension,
    D: Distance,
{
    options.validate()?;

    let x = as_matrix(aa.view())?;
    check_code_width::<U>(options.k)?;

    let method = options.method;
    if method.requires_float() && !A::IS_FLOAT {
        return Err(QuantizationError::NonFloatElement {
            method: method.to_string(),
        });
    }

    if let Some(sample) = x
        .axis_iter(Axis(1))
        .position(|sample| sample.iter().any(|v| !v.as_f64().is_finite()))
    {
        return Err(QuantizationError::NonFiniteElement { sample });
    }

    let (n_vars, n_samples) = x.dim();
    if method.quantization() == Quantization::Orthogonal && options.m > n_vars {
        return Err(QuantizationError::TooManyCodebooks {
            n_codebooks: options.m,
            n_vars,
        });
    }

    if options.k > n_samples {
        return Err(QuantizationError::TooManyPrototypes {
            n_prototypes: options.k,
            n_samples,
        });
    }

    info!(
        "Building {} quantizer: {} variables, {} samples, k = {}, m = {}, {} codes",
        method,
        n_vars,
        n_samples,
        options.k,
        options.m,
        U::WIDTH
    );

    let mut rng = options.rng();
    let (codebooks, rotation) = match method {
        Method::Sample => (
            sampling_codebooks(x, options.k, options.m, &mut rng)?,
            None,
        ),
        Method::Pq => {
            let x = x.mapv(A::to_float);
            let codebooks = pq_codebooks(
                x.view(),
                options.k,
                options.m,
                &distance,
                options.maxiter,
                &mut rng,
            )?;
            (from_float_codebooks::<U, A>(codebooks), None)
        }
        Method::Opq => {
            let x = x.mapv(A::to_float);
            let (codebooks, rotation) = opq_codebooks(
                x.view(),
                options.k,
                options.m,
                &distance,
                options.maxiter,
                &mut rng,
            )?;
            (from_float_codebooks::<U, A>(codebooks), Some(rotation))
        }
        Method::Rvq => {
            let x = x.mapv(A::to_float);
            let codebooks = rvq_codebooks(
                x.view(),
                options.k,
                options.m,
                &distance,
                options.maxiter,
                &mut rng,
            )?;
            (from_float_codebooks::<U, A>(codebooks), None)
        }
    };

    Ok(ArrayQuantizer {
        quantization: method.quantization(),
        method,
        dims: aa.raw_dim(),
        codebooks,
        k: options.k,
        distance,
        rotation,
    })
}

fn from_float_codebooks<U, A>(codebooks: Vec<CodeBook<U, A::Float>>) -> Vec<CodeBook<U, A>>
where
    U: Code,
    A: Element,
{
    codebooks
        .into_iter()
        .map(|codebook| codebook.map(A::from_float))
        .collect()
}

/// Multiply by a matrix in the training type.
fn transform<A, S>(matrix: ArrayView2<A::Float>, x: ArrayBase<S, Ix2>) -> Array2<A>
where
    A: Element,
    S: Data<Elem = A>,
{
    matrix.dot(&x.mapv(A::to_float)).mapv(A::from_float)
}

impl<U, A, D, Dm> ArrayQuantizer<U, A, D, Dm>
where
    U: Code,
    A: Element,
    D: Distance,
    Dm: Dimension,
{
    /// Get the codebooks.
    ///
    /// Codebooks are ordered by variable range for orthogonal quantizers
    /// and by layer for additive quantizers.
    pub fn codebooks(&self) -> &[CodeBook<U, A>] {
        &self.codebooks
    }

    /// Get the distance used for training and encoding.
    pub fn distance(&self) -> &D {
        &self.distance
    }

    /// Get the shape of the training array.
    pub fn dims(&self) -> &Dm {
        &self.dims
    }

    /// Number of prototypes per codebook.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Get the construction method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Number of variables of the arrays that can be encoded.
    pub fn nvars(&self) -> usize {
        match self.dims.ndim() {
            1 => 1,
            _ => self.dims[0],
        }
    }

    /// Get the quantization family.
    pub fn quantization(&self) -> Quantization {
        self.quantization
    }

    /// Get the rotation of an optimized product quantizer.
    pub fn rotation(&self) -> Option<ArrayView2<A::Float>> {
        self.rotation.as_ref().map(|rotation| rotation.view())
    }

    /// Encode an array.
    ///
    /// `aa` must have the same number of variables as the training
    /// array. Returns an *m × n* code matrix, where *m* is the number
    /// of codebooks and *n* the number of samples in `aa`. Samples with
    /// NaN elements have no nearest prototype and get the first code.
    pub fn quantize_data<S, E>(&self, aa: &ArrayBase<S, E>) -> Result<Array2<U>, QuantizationError>
    where
        S: Data<Elem = A>,
        E: Dimension,
    {
        let x = as_matrix(aa.view())?;
        self.check_nvars(x.nrows())?;

        let mut data = Array2::from_elem((self.codebooks.len(), x.ncols()), U::from_index(0));

        match self.quantization {
            Quantization::Orthogonal => {
                let x = match &self.rotation {
                    Some(rotation) => CowArray::from(transform::<A, _>(rotation.t(), x)),
                    None => CowArray::from(x),
                };

                for (idx, (codebook, mut codes)) in self
                    .codebooks
                    .iter()
                    .zip(data.outer_iter_mut())
                    .enumerate()
                {
                    let rows = rowrange(x.nrows(), self.codebooks.len(), idx);
                    codes.assign(&codebook.encode(x.slice(s![rows, ..]), &self.distance)?);
                }
            }
            Quantization::Additive => {
                let mut residuals = x.to_owned();
                for (codebook, mut codes) in self.codebooks.iter().zip(data.outer_iter_mut()) {
                    let layer_codes = codebook.encode(residuals.view(), &self.distance)?;
                    residuals -= &codebook.decode(layer_codes.view())?;
                    codes.assign(&layer_codes);
                }
            }
        }

        Ok(data)
    }

    /// Encode an array and wrap it in a quantized array.
    pub fn quantize<S>(&self, aa: &ArrayBase<S, Dm>) -> Result<QuantizedArray<U, A, D, Dm>, QuantizationError>
    where
        S: Data<Elem = A>,
        D: Clone,
    {
        let data = self.quantize_data(aa)?;
        QuantizedArray::from_parts(self.clone(), data, aa.raw_dim())
    }

    /// Reconstruct samples from a code matrix.
    ///
    /// Returns a matrix with the variables as rows and a reconstructed
    /// sample for each column of `data`.
    pub fn decode_data<S>(&self, data: ArrayBase<S, Ix2>) -> Result<Array2<A>, QuantizationError>
    where
        S: Data<Elem = U>,
    {
        self.check_codebook_count(data.nrows())?;

        let n_vars = self.nvars();
        let mut reconstruction = Array2::zeros((n_vars, data.ncols()));

        match self.quantization {
            Quantization::Orthogonal => {
                for (idx, (codebook, codes)) in
                    self.codebooks.iter().zip(data.outer_iter()).enumerate()
                {
                    let rows = rowrange(n_vars, self.codebooks.len(), idx);
                    reconstruction
                        .slice_mut(s![rows, ..])
                        .assign(&codebook.decode(codes)?);
                }

                if let Some(rotation) = &self.rotation {
                    reconstruction = transform::<A, _>(rotation.view(), reconstruction);
                }
            }
            Quantization::Additive => {
                for (codebook, codes) in self.codebooks.iter().zip(data.outer_iter()) {
                    reconstruction += &codebook.decode(codes)?;
                }
            }
        }

        Ok(reconstruction)
    }

    fn check_nvars(&self, found: usize) -> Result<(), QuantizationError> {
        if found != self.nvars() {
            return Err(QuantizationError::VariableCountMismatch {
                expected: self.nvars(),
                found,
            });
        }

        Ok(())
    }

    fn check_codebook_count(&self, found: usize) -> Result<(), QuantizationError> {
        if found != self.codebooks.len() {
            return Err(QuantizationError::CodebookCountMismatch {
                expected: self.codebooks.len(),
                found,
            });
        }

        Ok(())
    }

    /// Mean distance between the samples of `aa` and their
    /// reconstructions.
    pub fn mean_reconstruction_distance<S, E>(
        &self,
        aa: &ArrayBase<S, E>,
    ) -> Result<f64, QuantizationError>
    where
        S: Data<Elem = A>,
        E: Dimension,
    {
        let x = as_matrix(aa.view())?;
        let reconstruction = self.decode_data(self.quantize_data(&x)?)?;

        if x.ncols() == 0 {
            return Ok(0.);
        }

        Ok(x.axis_iter(Axis(1))
            .zip(reconstruction.axis_iter(Axis(1)))
            .map(|(sample, reconstruction)| self.distance.distance(sample, reconstruction))
            .sum::<f64>()
            / x.ncols() as f64)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array, Array1, Array2, IxDyn};
    use ndarray_rand::RandomExt;
    use rand::distributions::Uniform;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{build_quantizer, nvars, ArrayQuantizer, QuantizerOptions};
    use crate::codebooks::{Method, Quantization};
    use crate::distance::{Euclidean, SquaredEuclidean};
    use crate::error::QuantizationError;

    fn test_matrix() -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        Array2::random_using((6, 100), Uniform::new(0., 1.), &mut rng)
    }

    fn options(method: Method) -> QuantizerOptions {
        QuantizerOptions::default()
            .with_method(method)
            .with_k(16)
            .with_m(3)
            .with_maxiter(10)
            .with_seed(1)
    }

    fn build(
        x: &Array2<f64>,
        method: Method,
    ) -> ArrayQuantizer<u8, f64, SquaredEuclidean, ndarray::Ix2> {
        build_quantizer(x, &options(method), SquaredEuclidean).unwrap()
    }

    #[test]
    fn nvars_of_shapes() {
        assert_eq!(nvars(&[10]).unwrap(), 1);
        assert_eq!(nvars(&[6, 10]).unwrap(), 6);
        assert!(matches!(
            nvars(&[2, 3, 4]),
            Err(QuantizationError::UnsupportedRank { rank: 3 })
        ));
    }

    #[test]
    fn quantize_vector_by_sampling() {
        let v = Array1::from((1..=10).collect::<Vec<i32>>());
        let options = QuantizerOptions::default().with_k(2).with_seed(1);
        let quantizer: ArrayQuantizer<u8, _, _, _> =
            build_quantizer(&v, &options, SquaredEuclidean).unwrap();

        assert_eq!(quantizer.nvars(), 1);
        assert_eq!(quantizer.codebooks().len(), 1);
        assert_eq!(quantizer.codebooks()[0].vectors().dim(), (1, 2));

        let data = quantizer.quantize_data(&v).unwrap();
        assert_eq!(data.dim(), (1, 10));
        assert!(data.iter().all(|&code| code < 2));

        let prototypes = quantizer.codebooks()[0].vectors();
        assert_ne!(prototypes[[0, 0]], prototypes[[0, 1]]);
        assert!(prototypes.iter().all(|p| v.iter().any(|x| x == p)));
    }

    #[test]
    fn quantize_matrix_by_sampling() {
        let x = Array2::from_shape_vec((6, 10), (0..60).map(f64::from).collect()).unwrap();
        let options = QuantizerOptions::default().with_k(5).with_m(2).with_seed(1);
        let quantizer: ArrayQuantizer<u8, _, _, _> =
            build_quantizer(&x, &options, SquaredEuclidean).unwrap();

        let data = quantizer.quantize_data(&x).unwrap();
        assert_eq!(data.dim(), (2, 10));
        assert!(data.iter().all(|&code| code < 5));
        assert!(quantizer.codebooks().iter().all(|cb| cb.dim() == 3));
    }

    #[test]
    fn sampling_all_samples_is_lossless() {
        let x = array![[1., 2., 3., 4.], [8., 7., 6., 5.], [0., 1., 0., 1.]];
        let options = QuantizerOptions::default().with_k(4).with_m(2).with_seed(9);
        let quantizer: ArrayQuantizer<u8, _, _, _> =
            build_quantizer(&x, &options, SquaredEuclidean).unwrap();

        let reconstruction = quantizer
            .decode_data(quantizer.quantize_data(&x).unwrap())
            .unwrap();
        assert_eq!(reconstruction, x);
    }

    #[test]
    fn rejects_unsupported_rank() {
        let x = Array::<f64, _>::zeros(IxDyn(&[2, 3, 4]));
        assert!(matches!(
            build_quantizer::<u8, _, _, _, _>(&x, &options(Method::Sample), SquaredEuclidean),
            Err(QuantizationError::UnsupportedRank { rank: 3 })
        ));
    }

    #[test]
    fn dynamic_rank_matrix() {
        let x = test_matrix().into_dyn();
        let quantizer =
            build_quantizer::<u8, _, _, _, _>(&x, &options(Method::Pq), SquaredEuclidean).unwrap();
        assert_eq!(quantizer.nvars(), 6);
        assert_eq!(quantizer.quantize_data(&x).unwrap().dim(), (3, 100));
    }

    #[test]
    fn rejects_non_float_clustering() {
        let x = Array2::<i32>::zeros((4, 20));
        for &method in &[Method::Pq, Method::Opq, Method::Rvq] {
            assert!(matches!(
                build_quantizer::<u8, _, _, _, _>(&x, &options(method), SquaredEuclidean),
                Err(QuantizationError::NonFloatElement { .. })
            ));
        }
    }

    #[test]
    fn rejects_non_finite_elements() {
        let mut x = test_matrix();
        x[[2, 17]] = f64::NAN;
        for &method in &[Method::Sample, Method::Pq, Method::Opq, Method::Rvq] {
            assert!(matches!(
                build_quantizer::<u8, _, _, _, _>(&x, &options(method), SquaredEuclidean),
                Err(QuantizationError::NonFiniteElement { sample: 17 })
            ));
        }

        let mut x = test_matrix();
        x[[0, 3]] = f64::INFINITY;
        assert!(matches!(
            build_quantizer::<u8, _, _, _, _>(&x, &options(Method::Opq), SquaredEuclidean),
            Err(QuantizationError::NonFiniteElement { sample: 3 })
        ));
    }

    #[test]
    fn sampling_builds_without_iterations() {
        let x = test_matrix();
        let quantizer = build_quantizer::<u8, _, _, _, _>(
            &x,
            &options(Method::Sample).with_maxiter(0),
            SquaredEuclidean,
        )
        .unwrap();
        assert_eq!(quantizer.k(), 16);
    }

    #[test]
    fn rejects_unknown_method() {
        assert!(matches!(
            "kmeans".parse::<Method>(),
            Err(QuantizationError::UnknownMethod(_))
        ));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let x = test_matrix();
        assert!(matches!(
            build_quantizer::<u8, _, _, _, _>(
                &x,
                &options(Method::Pq).with_m(7),
                SquaredEuclidean
            ),
            Err(QuantizationError::TooManyCodebooks {
                n_codebooks: 7,
                n_vars: 6
            })
        ));
        assert!(matches!(
            build_quantizer::<u8, _, _, _, _>(
                &x,
                &options(Method::Sample).with_k(101),
                SquaredEuclidean
            ),
            Err(QuantizationError::TooManyPrototypes {
                n_prototypes: 101,
                n_samples: 100
            })
        ));
        assert!(matches!(
            build_quantizer::<u8, _, _, _, _>(
                &x,
                &options(Method::Sample).with_k(0),
                SquaredEuclidean
            ),
            Err(QuantizationError::IncorrectNPrototypes)
        ));
        assert!(matches!(
            build_quantizer::<u8, _, _, _, _>(
                &x,
                &options(Method::Pq).with_k(300),
                SquaredEuclidean
            ),
            Err(QuantizationError::CodeWidthTooNarrow { .. })
        ));
    }

    #[test]
    fn rvq_allows_more_layers_than_variables() {
        let x = test_matrix();
        let quantizer = build(&x, Method::Rvq);
        let layered: ArrayQuantizer<u8, _, _, _> =
            build_quantizer(&x, &options(Method::Rvq).with_m(8), SquaredEuclidean).unwrap();
        assert_eq!(quantizer.quantization(), Quantization::Additive);
        assert_eq!(layered.codebooks().len(), 8);
        assert!(layered.codebooks().iter().all(|cb| cb.dim() == 6));
    }

    #[test]
    fn rejects_variable_count_mismatch() {
        let x = test_matrix();
        let quantizer = build(&x, Method::Pq);
        assert!(matches!(
            quantizer.quantize_data(&Array2::<f64>::zeros((5, 10))),
            Err(QuantizationError::VariableCountMismatch {
                expected: 6,
                found: 5
            })
        ));
        assert!(matches!(
            quantizer.decode_data(Array2::<u8>::zeros((2, 10))),
            Err(QuantizationError::CodebookCountMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn encoding_is_idempotent() {
        let x = test_matrix();
        for &method in &[Method::Sample, Method::Pq, Method::Opq] {
            let quantizer = build(&x, method);
            let codes = quantizer.quantize_data(&x).unwrap();
            let reconstruction = quantizer.decode_data(codes.view()).unwrap();
            assert_eq!(quantizer.quantize_data(&reconstruction).unwrap(), codes);
        }
    }

    #[test]
    fn clustering_is_deterministic() {
        let x = test_matrix();
        for &method in &[Method::Pq, Method::Opq, Method::Rvq] {
            let first = build(&x, method);
            let second = build(&x, method);
            assert_eq!(first.codebooks(), second.codebooks());
            assert_eq!(
                first.quantize_data(&x).unwrap(),
                second.quantize_data(&x).unwrap()
            );
        }
    }

    #[test]
    fn clustering_is_deterministic_without_seed() {
        let x = test_matrix();
        let options = QuantizerOptions::default()
            .with_method(Method::Pq)
            .with_k(8)
            .with_m(2);
        let first: ArrayQuantizer<u8, _, _, _> =
            build_quantizer(&x, &options, SquaredEuclidean).unwrap();
        let second: ArrayQuantizer<u8, _, _, _> =
            build_quantizer(&x, &options, SquaredEuclidean).unwrap();
        assert_eq!(first.codebooks(), second.codebooks());
    }

    #[test]
    fn additive_quantization_rederives_residuals() {
        let x = test_matrix();
        let quantizer = build(&x, Method::Rvq);

        // Encode the first columns on their own, the codes must not
        // depend on the training residuals or other columns.
        let head = x.slice(ndarray::s![.., ..10]).to_owned();
        let all_codes = quantizer.quantize_data(&x).unwrap();
        let head_codes = quantizer.quantize_data(&head).unwrap();
        assert_eq!(head_codes, all_codes.slice(ndarray::s![.., ..10]));

        let mut residuals = head.clone();
        for (codebook, codes) in quantizer.codebooks().iter().zip(head_codes.outer_iter()) {
            assert_eq!(
                codebook.encode(residuals.view(), &SquaredEuclidean).unwrap(),
                codes
            );
            residuals -= &codebook.decode(codes).unwrap();
        }
    }

    #[test]
    fn opq_rotation_is_orthonormal() {
        let x = test_matrix();
        let quantizer = build(&x, Method::Opq);
        let rotation = quantizer.rotation().unwrap();
        assert_abs_diff_eq!(
            rotation.t().dot(&rotation),
            Array2::<f64>::eye(6),
            epsilon = 1e-8
        );
        assert!(build(&x, Method::Pq).rotation().is_none());
    }

    #[test]
    fn more_prototypes_reduce_loss() {
        let x = test_matrix();
        for &method in &[Method::Pq, Method::Opq, Method::Rvq] {
            let coarse: ArrayQuantizer<u8, _, _, _> =
                build_quantizer(&x, &options(method).with_k(2), Euclidean).unwrap();
            let fine: ArrayQuantizer<u8, _, _, _> =
                build_quantizer(&x, &options(method).with_k(64), Euclidean).unwrap();
            assert!(
                fine.mean_reconstruction_distance(&x).unwrap()
                    < coarse.mean_reconstruction_distance(&x).unwrap()
            );
        }
    }
}
