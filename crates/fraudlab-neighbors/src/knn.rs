use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_binary_labels, validate_predict_input, validate_training_set};
use fraudlab_core::{Estimator, Float, Tensor, TensorError};

use crate::search::{DistanceMetric, NearestNeighbors};

/// K-Nearest Neighbors Classifier with uniform majority voting.
///
/// Vote ties go to the lower class label.
pub struct KNNClassifier<T: Float> {
    pub k: usize,
    pub metric: DistanceMetric,
    index: NearestNeighbors<T>,
    y_train: Option<Tensor<T>>,
    n_features: usize,
    pub n_classes: usize,
}

impl<T: Float> KNNClassifier<T> {
    pub fn new(k: usize, metric: DistanceMetric) -> Self {
        KNNClassifier {
            k,
            metric,
            index: NearestNeighbors::new(metric),
            y_train: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        if self.k == 0 {
            return Err(TensorError::InvalidOperation("k must be at least 1".into()));
        }
        let (_, p) = validate_training_set(x, y)?;
        self.index = NearestNeighbors::new(self.metric);
        self.index.fit(x)?;
        self.y_train = Some(y.clone());
        self.n_features = p;
        let max_label = y.data().iter().map(|v| v.to_f64().round() as usize).max().unwrap_or(0);
        self.n_classes = max_label + 1;
        Ok(())
    }

    fn votes(&self, row: &[T]) -> TensorResult<Vec<usize>> {
        let y_train = self.y_train.as_ref().ok_or(TensorError::NotFitted)?;
        let mut votes = vec![0usize; self.n_classes];
        for (j, _) in self.index.kneighbors(row, self.k, None)? {
            let cls = y_train.data()[j].to_f64().round() as usize;
            if cls < self.n_classes {
                votes[cls] += 1;
            }
        }
        Ok(votes)
    }

    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        validate_predict_input(x, self.n_features)?;
        let mut predictions = Vec::with_capacity(x.nrows()?);
        for row in x.rows()? {
            let votes = self.votes(row)?;
            let mut best = 0;
            for (cls, &count) in votes.iter().enumerate() {
                if count > votes[best] {
                    best = cls;
                }
            }
            predictions.push(T::from_usize(best));
        }
        Ok(Tensor::from_slice(&predictions))
    }

    /// Fraction of the k neighbours carrying label 1.
    pub fn predict_proba(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        validate_predict_input(x, self.n_features)?;
        let mut proba = Vec::with_capacity(x.nrows()?);
        for row in x.rows()? {
            let votes = self.votes(row)?;
            let total: usize = votes.iter().sum();
            let positive = votes.get(1).copied().unwrap_or(0);
            proba.push(if total == 0 {
                T::ZERO
            } else {
                T::from_usize(positive) / T::from_usize(total)
            });
        }
        Ok(Tensor::from_slice(&proba))
    }
}

impl Estimator for KNNClassifier<f64> {
    fn name(&self) -> &'static str {
        "KNeighborsClassifier"
    }

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()> {
        validate_binary_labels(y)?;
        KNNClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        KNNClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        Some(KNNClassifier::predict_proba(self, x))
    }
}
