use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_binary_labels, validate_predict_input, validate_training_set};
use fraudlab_core::{Estimator, Float, Tensor, TensorError};
use tracing::debug;

/// Logistic Regression: binary classification via batch gradient descent
/// on the L2-penalized log-loss.
///
/// The objective is `mean(log_loss) + ||w||² / (2 · C · n)`; the bias is
/// not penalized. Smaller `c` means stronger regularization.
pub struct LogisticRegression<T: Float> {
    pub weights: Option<Tensor<T>>,
    pub bias: Option<T>,
    pub c: T,
    pub learning_rate: T,
    pub max_iter: usize,
    pub tol: T,
    /// Iterations run by the last `fit`.
    pub n_iter: usize,
}

impl<T: Float> LogisticRegression<T> {
    pub fn new(learning_rate: T, max_iter: usize) -> Self {
        LogisticRegression {
            weights: None,
            bias: None,
            c: T::ONE,
            learning_rate,
            max_iter,
            tol: T::from_f64(1e-6),
            n_iter: 0,
        }
    }

    /// Inverse regularization strength.
    pub fn with_c(mut self, c: T) -> Self {
        self.c = c;
        self
    }

    pub fn with_tol(mut self, tol: T) -> Self {
        self.tol = tol;
        self
    }

    fn sigmoid_val(z: T) -> T {
        T::ONE / (T::ONE + (-z).exp())
    }

    fn linear(w: &[T], b: T, row: &[T]) -> T {
        w.iter().zip(row).fold(b, |z, (&wj, &xj)| z + wj * xj)
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        if !(self.c > T::ZERO) {
            return Err(TensorError::InvalidOperation("C must be positive".into()));
        }
        let (n, p) = validate_training_set(x, y)?;
        let n_t = T::from_usize(n);
        let penalty = T::ONE / (self.c * n_t);

        let mut w = vec![T::ZERO; p];
        let mut b = T::ZERO;
        self.n_iter = 0;

        for _ in 0..self.max_iter {
            self.n_iter += 1;
            let mut dw = vec![T::ZERO; p];
            let mut db = T::ZERO;

            for (row, &yi) in x.rows()?.zip(y.data()) {
                let error = Self::sigmoid_val(Self::linear(&w, b, row)) - yi;
                for (g, &xj) in dw.iter_mut().zip(row) {
                    *g += error * xj;
                }
                db += error;
            }

            let mut max_grad = (db / n_t).abs();
            for (wj, g) in w.iter_mut().zip(&dw) {
                let grad = *g / n_t + penalty * *wj;
                *wj -= self.learning_rate * grad;
                max_grad = max_grad.max(grad.abs());
            }
            b -= self.learning_rate * (db / n_t);

            if max_grad < self.tol {
                break;
            }
        }
        debug!(iterations = self.n_iter, "logistic regression fitted");

        self.weights = Some(Tensor::from_slice(&w));
        self.bias = Some(b);
        Ok(())
    }

    /// Probability of label 1 for every row.
    pub fn predict_proba(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let w = self.weights.as_ref().ok_or(TensorError::NotFitted)?;
        validate_predict_input(x, w.numel())?;
        let b = self.bias.unwrap_or(T::ZERO);
        let proba: Vec<T> = x
            .rows()?
            .map(|row| Self::sigmoid_val(Self::linear(w.data(), b, row)))
            .collect();
        Ok(Tensor::from_slice(&proba))
    }

    /// Class labels; probabilities strictly above one half map to 1.
    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        Ok(self
            .predict_proba(x)?
            .apply(|p| if p > T::HALF { T::ONE } else { T::ZERO }))
    }
}

impl Estimator for LogisticRegression<f64> {
    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()> {
        validate_binary_labels(y)?;
        LogisticRegression::fit(self, x, y)
    }

    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        LogisticRegression::predict(self, x)
    }

    fn predict_proba(&self, x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        Some(LogisticRegression::predict_proba(self, x))
    }
}
