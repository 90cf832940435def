use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_binary_labels, validate_predict_input, validate_training_set};
use fraudlab_core::{Estimator, Float, Tensor, TensorError};

/// Gaussian Naive Bayes classifier.
///
/// Per-class feature means and variances; every variance is inflated by
/// `var_smoothing` times the largest feature variance of the training set.
pub struct GaussianNB<T: Float> {
    pub var_smoothing: f64,
    pub class_priors: Vec<T>,
    pub class_means: Vec<Vec<T>>,
    pub class_vars: Vec<Vec<T>>,
    pub n_classes: usize,
    pub n_features: usize,
}

impl<T: Float> GaussianNB<T> {
    pub fn new() -> Self {
        GaussianNB {
            var_smoothing: 1e-9,
            class_priors: Vec::new(),
            class_means: Vec::new(),
            class_vars: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn with_var_smoothing(mut self, var_smoothing: f64) -> Self {
        self.var_smoothing = var_smoothing;
        self
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        let (n, p) = validate_training_set(x, y)?;
        self.n_features = p;

        let max_label = y.data().iter().map(|v| v.to_f64().round() as usize).max().unwrap_or(0);
        self.n_classes = max_label + 1;

        self.class_means = vec![vec![T::ZERO; p]; self.n_classes];
        self.class_vars = vec![vec![T::ZERO; p]; self.n_classes];
        let mut class_counts = vec![0usize; self.n_classes];

        for (i, row) in x.rows()?.enumerate() {
            let cls = y.data()[i].to_f64().round() as usize;
            class_counts[cls] += 1;
            for (m, &v) in self.class_means[cls].iter_mut().zip(row) {
                *m += v;
            }
        }
        for (c, &count) in class_counts.iter().enumerate() {
            if count > 0 {
                let cnt = T::from_usize(count);
                for m in self.class_means[c].iter_mut() {
                    *m /= cnt;
                }
            }
        }

        for (i, row) in x.rows()?.enumerate() {
            let cls = y.data()[i].to_f64().round() as usize;
            for j in 0..p {
                let diff = row[j] - self.class_means[cls][j];
                self.class_vars[cls][j] += diff * diff;
            }
        }

        // Smoothing epsilon from the overall per-feature variance.
        let overall_mean = x.mean_axis(0)?;
        let mut max_var = T::ZERO;
        for j in 0..p {
            let mu = overall_mean.data()[j];
            let var = x.rows()?.map(|row| (row[j] - mu) * (row[j] - mu)).sum::<T>() / T::from_usize(n);
            max_var = max_var.max(var);
        }
        let epsilon = T::from_f64(self.var_smoothing) * max_var;
        let floor = T::from_f64(1e-12);

        for (c, &count) in class_counts.iter().enumerate() {
            if count > 0 {
                let cnt = T::from_usize(count);
                for v in self.class_vars[c].iter_mut() {
                    *v = (*v / cnt + epsilon).max(floor);
                }
            }
        }

        self.class_priors = class_counts
            .iter()
            .map(|&c| T::from_usize(c) / T::from_usize(n))
            .collect();
        Ok(())
    }

    /// Unnormalized log-posterior of every class for one row. Classes
    /// absent from training get negative infinity.
    fn joint_log_likelihood(&self, row: &[T]) -> Vec<T> {
        let log_two_pi = (T::TWO * T::PI).ln();
        (0..self.n_classes)
            .map(|c| {
                if self.class_priors[c] <= T::ZERO {
                    return T::NEG_INFINITY;
                }
                let mut log_prob = self.class_priors[c].ln();
                for j in 0..self.n_features {
                    let var = self.class_vars[c][j];
                    let diff = row[j] - self.class_means[c][j];
                    // log N(x|μ,σ²) = -0.5 * (log(2π) + log(σ²) + (x-μ)²/σ²)
                    log_prob -= T::HALF * (log_two_pi + var.ln() + diff * diff / var);
                }
                log_prob
            })
            .collect()
    }

    fn check_fitted(&self, x: &Tensor<T>) -> TensorResult<()> {
        if self.n_classes == 0 {
            return Err(TensorError::NotFitted);
        }
        validate_predict_input(x, self.n_features).map(|_| ())
    }

    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.check_fitted(x)?;
        let mut predictions = Vec::with_capacity(x.nrows()?);
        for row in x.rows()? {
            let jll = self.joint_log_likelihood(row);
            let mut best = 0;
            for (c, &v) in jll.iter().enumerate() {
                if v > jll[best] {
                    best = c;
                }
            }
            predictions.push(T::from_usize(best));
        }
        Ok(Tensor::from_slice(&predictions))
    }

    /// Posterior probability of class 1 (log-sum-exp normalized).
    pub fn predict_proba(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.check_fitted(x)?;
        let mut proba = Vec::with_capacity(x.nrows()?);
        for row in x.rows()? {
            let jll = self.joint_log_likelihood(row);
            let max = jll.iter().copied().fold(T::NEG_INFINITY, T::max);
            let total: T = jll.iter().map(|&v| (v - max).exp()).sum();
            let positive = jll.get(1).map(|&v| (v - max).exp()).unwrap_or(T::ZERO);
            proba.push(positive / total);
        }
        Ok(Tensor::from_slice(&proba))
    }
}

impl<T: Float> Default for GaussianNB<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for GaussianNB<f64> {
    fn name(&self) -> &'static str {
        "GaussianNB"
    }

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()> {
        validate_binary_labels(y)?;
        GaussianNB::fit(self, x, y)
    }

    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        GaussianNB::predict(self, x)
    }

    fn predict_proba(&self, x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        Some(GaussianNB::predict_proba(self, x))
    }
}
