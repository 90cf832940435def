use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_binary_labels, validate_predict_input, validate_training_set};
use fraudlab_core::{Estimator, Float, Tensor, TensorError};
use tracing::debug;

use crate::decision_tree::DecisionTreeRegressor;

fn sigmoid<T: Float>(z: T) -> T {
    T::ONE / (T::ONE + (-z).exp())
}

/// Gradient Boosted Trees for Binary Classification.
///
/// Minimizes log-loss. Each tree is grown on the residuals
/// `y - sigmoid(F(x))` and its leaves take the Newton step
/// `sum(r) / sum(p * (1 - p))` over the rows they hold. Predictions are
/// log-odds turned into probabilities with the sigmoid.
pub struct GradientBoostingClassifier<T: Float> {
    pub n_estimators: usize,
    pub learning_rate: T,
    pub max_depth: usize,
    pub min_samples_split: usize,
    trees: Vec<DecisionTreeRegressor<T>>,
    initial_log_odds: T,
    n_features: usize,
}

impl<T: Float> GradientBoostingClassifier<T> {
    pub fn new(n_estimators: usize, learning_rate: T, max_depth: usize) -> Self {
        GradientBoostingClassifier {
            n_estimators,
            learning_rate,
            max_depth: if max_depth == 0 { 3 } else { max_depth },
            min_samples_split: 2,
            trees: Vec::new(),
            initial_log_odds: T::ZERO,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        let (n, p) = validate_training_set(x, y)?;
        self.n_features = p;

        // Prior log-odds, clamped so a single-class target stays finite.
        let pos: T = y.data().iter().copied().sum();
        let eps = T::from_f64(1e-6);
        let p_pos = (pos / T::from_usize(n)).max(eps).min(T::ONE - eps);
        self.initial_log_odds = (p_pos / (T::ONE - p_pos)).ln();

        let mut log_odds = vec![self.initial_log_odds; n];
        self.trees.clear();

        for _ in 0..self.n_estimators {
            let probs: Vec<T> = log_odds.iter().map(|&f| sigmoid(f)).collect();
            let residuals: Vec<T> = y.data().iter().zip(&probs).map(|(&yi, &pi)| yi - pi).collect();
            let newton_step = |indices: &[usize]| {
                let num: T = indices.iter().map(|&i| residuals[i]).sum();
                let den: T = indices.iter().map(|&i| probs[i] * (T::ONE - probs[i])).sum();
                if den <= T::from_f64(1e-12) {
                    T::ZERO
                } else {
                    num / den
                }
            };

            let mut tree = DecisionTreeRegressor::new(self.max_depth, self.min_samples_split, 1);
            tree.fit_with_leaves(x, &Tensor::from_slice(&residuals), newton_step)?;

            let update = tree.predict(x)?;
            for (f, &u) in log_odds.iter_mut().zip(update.data()) {
                *f += self.learning_rate * u;
            }
            self.trees.push(tree);
        }
        debug!(trees = self.trees.len(), initial_log_odds = self.initial_log_odds.to_f64(), "gradient boosting fitted");
        Ok(())
    }

    /// Raw ensemble output `F(x)` in log-odds.
    pub fn decision_function(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        if self.n_features == 0 {
            return Err(TensorError::NotFitted);
        }
        let n = validate_predict_input(x, self.n_features)?;
        let mut log_odds = vec![self.initial_log_odds; n];
        for tree in &self.trees {
            let update = tree.predict(x)?;
            for (f, &u) in log_odds.iter_mut().zip(update.data()) {
                *f += self.learning_rate * u;
            }
        }
        Ok(Tensor::from_slice(&log_odds))
    }

    pub fn predict_proba(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        Ok(self.decision_function(x)?.apply(sigmoid))
    }

    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        Ok(self
            .predict_proba(x)?
            .apply(|p| if p > T::HALF { T::ONE } else { T::ZERO }))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Estimator for GradientBoostingClassifier<f64> {
    fn name(&self) -> &'static str {
        "GradientBoostingClassifier"
    }

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()> {
        validate_binary_labels(y)?;
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        Some(GradientBoostingClassifier::predict_proba(self, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_boosting_classifier() {
        let x = Tensor::from_vec2d(&[
            vec![0.0, 0.0], vec![0.5, 0.2], vec![1.0, 0.4], vec![0.3, 0.9],
            vec![4.0, 4.0], vec![4.5, 3.8], vec![5.0, 4.4], vec![4.2, 5.1],
        ]).unwrap();
        let y = Tensor::from_slice(&[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let mut gb = GradientBoostingClassifier::new(30, 0.1, 2);
        gb.fit(&x, &y).unwrap();
        assert_eq!(gb.n_trees(), 30);
        assert_eq!(gb.predict(&x).unwrap().data(), y.data());

        let proba = gb.predict_proba(&x).unwrap();
        assert!(proba.data()[0] < 0.2);
        assert!(proba.data()[7] > 0.8);
    }

    #[test]
    fn test_first_tree_takes_newton_step() {
        let x = Tensor::from_vec2d(&[vec![0.0], vec![1.0], vec![4.0], vec![5.0]]).unwrap();
        let y = Tensor::from_slice(&[0.0, 0.0, 1.0, 1.0]);
        let mut gb = GradientBoostingClassifier::new(1, 1.0, 1);
        gb.fit(&x, &y).unwrap();
        // prior p = 0.5: each leaf holds residuals of +-0.5 with p(1-p) = 0.25
        let f = gb.decision_function(&x).unwrap();
        assert!((f.data()[0] + 2.0).abs() < 1e-9);
        assert!((f.data()[3] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_class_stays_finite() {
        let x = Tensor::from_vec2d(&[vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let y = Tensor::from_slice(&[0.0, 0.0, 0.0]);
        let mut gb = GradientBoostingClassifier::new(5, 0.1, 3);
        gb.fit(&x, &y).unwrap();
        let f = gb.decision_function(&x).unwrap();
        assert!(f.first_non_finite().is_none());
        assert_eq!(gb.predict(&x).unwrap().data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unfitted() {
        let gb: GradientBoostingClassifier<f64> = GradientBoostingClassifier::new(5, 0.1, 3);
        let x = Tensor::from_vec2d(&[vec![0.0]]).unwrap();
        assert_eq!(gb.predict(&x), Err(TensorError::NotFitted));
    }
}
