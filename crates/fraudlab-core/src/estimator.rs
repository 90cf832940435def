use crate::dtype::Float;
use crate::error::{TensorError, TensorResult};
use crate::tensor::Tensor;

/// Supervised classifier with a uniform fit/predict surface.
///
/// Every model in the bank implements this, so the pipeline can hold a
/// heterogeneous roster as `Box<dyn Estimator>`.
pub trait Estimator {
    /// Short algorithm name, e.g. `"GaussianNB"`.
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()>;

    /// Hard 0/1 label predictions, one per row of `x`.
    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>>;

    /// Probability of the positive class, for models that produce one.
    fn predict_proba(&self, _x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        None
    }
}

/// Unsupervised column transform (projection, scaling).
pub trait Transformer {
    fn fit(&mut self, x: &Tensor<f64>) -> TensorResult<()>;
    fn transform(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>>;
    fn fit_transform(&mut self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Check a feature matrix is 2D, non-empty and finite.
/// Returns `(n_samples, n_features)`.
pub fn validate_features<T: Float>(x: &Tensor<T>) -> TensorResult<(usize, usize)> {
    let n = x.nrows()?;
    let p = x.ncols()?;
    if n == 0 || p == 0 {
        return Err(TensorError::EmptyTensor);
    }
    if let Some((row, col)) = x.first_non_finite() {
        return Err(TensorError::NonFinite { row, col });
    }
    Ok((n, p))
}

/// Check a training pair: valid features and a finite target vector of
/// matching length.
pub fn validate_training_set<T: Float>(x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<(usize, usize)> {
    let (n, p) = validate_features(x)?;
    if y.ndim() != 1 || y.numel() != n {
        return Err(TensorError::ShapeMismatch {
            expected: vec![n],
            got: y.shape_vec(),
        });
    }
    if let Some((row, _)) = y.first_non_finite() {
        return Err(TensorError::NonFinite { row, col: p });
    }
    Ok((n, p))
}

/// Check every label is exactly 0 or 1.
pub fn validate_binary_labels<T: Float>(y: &Tensor<T>) -> TensorResult<()> {
    match y
        .data()
        .iter()
        .position(|&v| v != T::ZERO && v != T::ONE)
    {
        Some(i) => Err(TensorError::InvalidOperation(format!(
            "label at row {} is {}, expected 0 or 1",
            i,
            y.data()[i]
        ))),
        None => Ok(()),
    }
}

/// Check a prediction input has the feature count seen during fit.
pub fn validate_predict_input<T: Float>(x: &Tensor<T>, n_features: usize) -> TensorResult<usize> {
    let n = x.nrows()?;
    let p = x.ncols()?;
    if p != n_features {
        return Err(TensorError::DimensionMismatch(format!(
            "model was fitted on {} features, got {}",
            n_features, p
        )));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_training_set() {
        let x: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let y = Tensor::from_slice(&[0.0, 1.0]);
        assert_eq!(validate_training_set(&x, &y).unwrap(), (2, 2));

        let short = Tensor::from_slice(&[0.0]);
        assert!(matches!(
            validate_training_set(&x, &short),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let x: Tensor<f64> =
            Tensor::from_vec2d(&[vec![1.0, f64::INFINITY], vec![3.0, 4.0]]).unwrap();
        assert_eq!(
            validate_features(&x),
            Err(TensorError::NonFinite { row: 0, col: 1 })
        );
    }

    #[test]
    fn test_binary_labels() {
        assert!(validate_binary_labels(&Tensor::from_slice(&[0.0, 1.0, 1.0])).is_ok());
        assert!(validate_binary_labels(&Tensor::from_slice(&[0.0, 2.0])).is_err());
    }

    #[test]
    fn test_empty_features_rejected() {
        let x: Tensor<f64> = Tensor::zeros(vec![0, 3]);
        assert_eq!(validate_features(&x), Err(TensorError::EmptyTensor));
    }
}
