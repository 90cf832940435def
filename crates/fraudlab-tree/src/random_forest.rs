use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_binary_labels, validate_predict_input, validate_training_set};
use fraudlab_core::{Estimator, Float, Tensor, TensorError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::decision_tree::{DecisionTreeClassifier, MaxFeatures};

/// Random Forest Classifier: bagged decision trees with per-split
/// feature subsampling. Predictions average the trees' leaf probabilities.
pub struct RandomForestClassifier<T: Float> {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
    trees: Vec<DecisionTreeClassifier<T>>,
    n_features: usize,
}

impl<T: Float> RandomForestClassifier<T> {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        RandomForestClassifier {
            n_estimators,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        if self.n_estimators == 0 {
            return Err(TensorError::InvalidOperation(
                "n_estimators must be at least 1".into(),
            ));
        }
        let (n, p) = validate_training_set(x, y)?;
        self.n_features = p;

        let mut base_rng = StdRng::seed_from_u64(self.seed);
        self.trees.clear();

        for _ in 0..self.n_estimators {
            let tree_seed: u64 = base_rng.gen();
            let mut tree = DecisionTreeClassifier::new(self.max_depth, self.min_samples_split, self.min_samples_leaf)
                .with_max_features(self.max_features)
                .with_seed(tree_seed);

            if self.bootstrap {
                let sample: Vec<usize> = (0..n).map(|_| base_rng.gen_range(0..n)).collect();
                let x_sub = x.select_rows(&sample)?;
                let y_sub = y.select_rows(&sample)?;
                tree.fit(&x_sub, &y_sub)?;
            } else {
                tree.fit(x, y)?;
            }
            self.trees.push(tree);
        }
        debug!(trees = self.trees.len(), rows = n, "random forest fitted");
        Ok(())
    }

    /// Mean over trees of each tree's leaf probability for label 1.
    pub fn predict_proba(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        if self.trees.is_empty() {
            return Err(TensorError::NotFitted);
        }
        let n = validate_predict_input(x, self.n_features)?;
        let mut sums = vec![T::ZERO; n];
        for tree in &self.trees {
            let proba = tree.predict_proba(x)?;
            for (s, &p) in sums.iter_mut().zip(proba.data()) {
                *s += p;
            }
        }
        let count = T::from_usize(self.trees.len());
        let averaged: Vec<T> = sums.into_iter().map(|s| s / count).collect();
        Ok(Tensor::from_slice(&averaged))
    }

    /// Label 1 where the averaged probability exceeds one half.
    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        Ok(self
            .predict_proba(x)?
            .apply(|p| if p > T::HALF { T::ONE } else { T::ZERO }))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Estimator for RandomForestClassifier<f64> {
    fn name(&self) -> &'static str {
        "RandomForestClassifier"
    }

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()> {
        validate_binary_labels(y)?;
        RandomForestClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        RandomForestClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        Some(RandomForestClassifier::predict_proba(self, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusters() -> (Tensor<f64>, Tensor<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let d = i as f64 * 0.1;
            rows.push(vec![d, 1.0 - d, 0.5]);
            labels.push(0.0);
            rows.push(vec![5.0 + d, 6.0 - d, 0.5]);
            labels.push(1.0);
        }
        (Tensor::from_vec2d(&rows).unwrap(), Tensor::from_slice(&labels))
    }

    #[test]
    fn test_random_forest() {
        let (x, y) = clusters();
        let mut rf = RandomForestClassifier::new(10, 4);
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.n_trees(), 10);
        assert_eq!(rf.predict(&x).unwrap().data(), y.data());
    }

    #[test]
    fn test_random_forest_is_deterministic() {
        let (x, y) = clusters();
        let fit = || {
            let mut rf = RandomForestClassifier::new(5, 3).with_seed(9);
            rf.fit(&x, &y).unwrap();
            rf.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_proba_in_unit_interval() {
        let (x, y) = clusters();
        let mut rf = RandomForestClassifier::new(7, 2).with_bootstrap(false);
        rf.fit(&x, &y).unwrap();
        for &p in rf.predict_proba(&x).unwrap().data() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = clusters();
        let mut rf: RandomForestClassifier<f64> = RandomForestClassifier::new(0, 3);
        assert!(rf.fit(&x, &y).is_err());
        assert_eq!(rf.predict(&x), Err(TensorError::NotFitted));
    }
}
