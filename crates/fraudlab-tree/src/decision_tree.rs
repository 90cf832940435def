use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_binary_labels, validate_predict_input, validate_training_set};
use fraudlab_core::{Estimator, Float, Tensor, TensorError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How many features each split may consider.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
    Log2,
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    /// Number of candidate features out of `n_features`, at least 1.
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (f * n_features as f64).floor() as usize,
            MaxFeatures::Count(c) => c,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// A node in a fitted tree.
#[derive(Debug, Clone)]
enum TreeNode<T: Float> {
    /// Rows with `x[feature_idx] <= threshold` go left.
    Split {
        feature_idx: usize,
        threshold: T,
        left: Box<TreeNode<T>>,
        right: Box<TreeNode<T>>,
    },
    /// `value` is the predicted label (classifier) or mean target
    /// (regressor); `proba` is the share of label-1 rows reaching the leaf.
    Leaf { value: T, proba: T },
}

impl<T: Float> TreeNode<T> {
    fn descend(&self, row: &[T]) -> (T, T) {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, proba } => return (*value, *proba),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Row indices ordered by the value of one feature.
fn sorted_by_feature<T: Float>(x: &Tensor<T>, indices: &[usize], feature: usize) -> TensorResult<Vec<(T, usize)>> {
    let mut sorted = Vec::with_capacity(indices.len());
    for &i in indices {
        sorted.push((x.get(&[i, feature])?, i));
    }
    sorted.sort_by(|a, b| a.0.to_f64().total_cmp(&b.0.to_f64()));
    Ok(sorted)
}

/// Midpoint threshold between two adjacent distinct values, falling back
/// to the lower value when rounding would put `next` on the left.
fn midpoint<T: Float>(value: T, next: T) -> T {
    let mid = (value + next) / T::TWO;
    if mid >= next || !mid.is_finite() {
        value
    } else {
        mid
    }
}

fn partition<T: Float>(x: &Tensor<T>, indices: &[usize], feature: usize, threshold: T) -> TensorResult<(Vec<usize>, Vec<usize>)> {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in indices {
        if x.get(&[i, feature])? <= threshold {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    Ok((left, right))
}

fn candidate_features(n_features: usize, max_features: MaxFeatures, rng: &mut StdRng) -> Vec<usize> {
    let k = max_features.resolve(n_features);
    let mut features: Vec<usize> = (0..n_features).collect();
    if k < n_features {
        features.shuffle(rng);
        features.truncate(k);
        features.sort_unstable();
    }
    features
}

struct SplitChoice<T> {
    feature: usize,
    threshold: T,
    impurity: f64,
}

/// Decision Tree Classifier using CART (Gini impurity).
///
/// Supports depth limiting and random feature subsampling at every split.
pub struct DecisionTreeClassifier<T: Float> {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
    tree: Option<TreeNode<T>>,
    pub n_classes: usize,
    n_features: usize,
}

impl<T: Float> DecisionTreeClassifier<T> {
    pub fn new(max_depth: usize, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        DecisionTreeClassifier {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: min_samples_leaf.max(1),
            max_features: MaxFeatures::All,
            seed: 42,
            tree: None,
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        let (n, p) = validate_training_set(x, y)?;
        let max_label = y.data().iter().map(|v| v.to_f64().round() as usize).max().unwrap_or(0);
        self.n_classes = max_label.max(1) + 1;
        self.n_features = p;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let indices: Vec<usize> = (0..n).collect();
        self.tree = Some(self.build_tree(x, y, &indices, 0, &mut rng)?);
        Ok(())
    }

    fn class_of(&self, y: &Tensor<T>, i: usize) -> usize {
        (y.data()[i].to_f64().round() as usize).min(self.n_classes - 1)
    }

    fn class_counts(&self, y: &Tensor<T>, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.class_of(y, i)] += 1;
        }
        counts
    }

    fn leaf(&self, counts: &[usize]) -> TreeNode<T> {
        let total: usize = counts.iter().sum();
        let mut best = 0;
        for (c, &count) in counts.iter().enumerate() {
            if count > counts[best] {
                best = c;
            }
        }
        let proba = if total == 0 {
            T::ZERO
        } else {
            T::from_usize(counts[1]) / T::from_usize(total)
        };
        TreeNode::Leaf {
            value: T::from_usize(best),
            proba,
        }
    }

    fn build_tree(
        &self,
        x: &Tensor<T>,
        y: &Tensor<T>,
        indices: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> TensorResult<TreeNode<T>> {
        let counts = self.class_counts(y, indices);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.max_depth || indices.len() < self.min_samples_split {
            return Ok(self.leaf(&counts));
        }

        let features = candidate_features(self.n_features, self.max_features, rng);
        let Some(choice) = self.best_split(x, y, indices, &counts, &features)? else {
            return Ok(self.leaf(&counts));
        };

        let (left_idx, right_idx) = partition(x, indices, choice.feature, choice.threshold)?;
        let left = self.build_tree(x, y, &left_idx, depth + 1, rng)?;
        let right = self.build_tree(x, y, &right_idx, depth + 1, rng)?;
        Ok(TreeNode::Split {
            feature_idx: choice.feature,
            threshold: choice.threshold,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn best_split(
        &self,
        x: &Tensor<T>,
        y: &Tensor<T>,
        indices: &[usize],
        totals: &[usize],
        features: &[usize],
    ) -> TensorResult<Option<SplitChoice<T>>> {
        let n = indices.len();
        let mut best: Option<SplitChoice<T>> = None;

        for &feature in features {
            let sorted = sorted_by_feature(x, indices, feature)?;
            let mut left_counts = vec![0usize; self.n_classes];

            for pos in 0..n - 1 {
                let (value, i) = sorted[pos];
                left_counts[self.class_of(y, i)] += 1;
                let next = sorted[pos + 1].0;
                if !(next > value) {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let mut sq_left = 0.0;
                let mut sq_right = 0.0;
                for (c, &lc) in left_counts.iter().enumerate() {
                    let rc = totals[c] - lc;
                    sq_left += (lc as f64 / n_left as f64).powi(2);
                    sq_right += (rc as f64 / n_right as f64).powi(2);
                }
                let impurity =
                    (n_left as f64 * (1.0 - sq_left) + n_right as f64 * (1.0 - sq_right)) / n as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity - 1e-12) {
                    best = Some(SplitChoice {
                        feature,
                        threshold: midpoint(value, next),
                        impurity,
                    });
                }
            }
        }
        Ok(best)
    }

    fn root(&self, x: &Tensor<T>) -> TensorResult<&TreeNode<T>> {
        let tree = self.tree.as_ref().ok_or(TensorError::NotFitted)?;
        validate_predict_input(x, self.n_features)?;
        Ok(tree)
    }

    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let tree = self.root(x)?;
        let preds: Vec<T> = x.rows()?.map(|row| tree.descend(row).0).collect();
        Ok(Tensor::from_slice(&preds))
    }

    /// Share of label-1 training rows in the leaf each row falls into.
    pub fn predict_proba(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let tree = self.root(x)?;
        let proba: Vec<T> = x.rows()?.map(|row| tree.descend(row).1).collect();
        Ok(Tensor::from_slice(&proba))
    }

    /// Depth of the fitted tree (0 for a single leaf).
    pub fn depth(&self) -> Option<usize> {
        self.tree.as_ref().map(TreeNode::depth)
    }

    pub fn n_leaves(&self) -> Option<usize> {
        self.tree.as_ref().map(TreeNode::n_leaves)
    }
}

impl Estimator for DecisionTreeClassifier<f64> {
    fn name(&self) -> &'static str {
        "DecisionTreeClassifier"
    }

    fn fit(&mut self, x: &Tensor<f64>, y: &Tensor<f64>) -> TensorResult<()> {
        validate_binary_labels(y)?;
        DecisionTreeClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        DecisionTreeClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Tensor<f64>) -> Option<TensorResult<Tensor<f64>>> {
        Some(DecisionTreeClassifier::predict_proba(self, x))
    }
}

/// Decision Tree Regressor using CART (squared-error criterion). Used as
/// the base learner of gradient boosting.
pub struct DecisionTreeRegressor<T: Float> {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    tree: Option<TreeNode<T>>,
    n_features: usize,
}

impl<T: Float> DecisionTreeRegressor<T> {
    pub fn new(max_depth: usize, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        DecisionTreeRegressor {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: min_samples_leaf.max(1),
            tree: None,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> TensorResult<()> {
        self.fit_with_leaves(x, y, |indices| {
            if indices.is_empty() {
                T::ZERO
            } else {
                indices.iter().map(|&i| y.data()[i]).sum::<T>() / T::from_usize(indices.len())
            }
        })
    }

    /// Grow the tree on `y` with the squared-error criterion, then set each
    /// leaf to `leaf_value` of the training row indices that reach it.
    pub fn fit_with_leaves<F>(&mut self, x: &Tensor<T>, y: &Tensor<T>, leaf_value: F) -> TensorResult<()>
    where
        F: Fn(&[usize]) -> T,
    {
        let (n, p) = validate_training_set(x, y)?;
        self.n_features = p;
        let indices: Vec<usize> = (0..n).collect();
        self.tree = Some(self.build_tree(x, y, &indices, 0, &leaf_value)?);
        Ok(())
    }

    fn leaf(indices: &[usize], leaf_value: &dyn Fn(&[usize]) -> T) -> TreeNode<T> {
        let value = leaf_value(indices);
        TreeNode::Leaf { value, proba: value }
    }

    fn build_tree(
        &self,
        x: &Tensor<T>,
        y: &Tensor<T>,
        indices: &[usize],
        depth: usize,
        leaf_value: &dyn Fn(&[usize]) -> T,
    ) -> TensorResult<TreeNode<T>> {
        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return Ok(Self::leaf(indices, leaf_value));
        }
        let Some(choice) = self.best_split(x, y, indices)? else {
            return Ok(Self::leaf(indices, leaf_value));
        };
        let (left_idx, right_idx) = partition(x, indices, choice.feature, choice.threshold)?;
        let left = self.build_tree(x, y, &left_idx, depth + 1, leaf_value)?;
        let right = self.build_tree(x, y, &right_idx, depth + 1, leaf_value)?;
        Ok(TreeNode::Split {
            feature_idx: choice.feature,
            threshold: choice.threshold,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn best_split(&self, x: &Tensor<T>, y: &Tensor<T>, indices: &[usize]) -> TensorResult<Option<SplitChoice<T>>> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y.data()[i].to_f64()).sum();
        let total_sq: f64 = indices.iter().map(|&i| y.data()[i].to_f64().powi(2)).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;
        if parent_sse <= 1e-12 {
            return Ok(None);
        }

        let mut best: Option<SplitChoice<T>> = None;
        for feature in 0..self.n_features {
            let sorted = sorted_by_feature(x, indices, feature)?;
            let mut sum_left = 0.0;
            let mut sq_left = 0.0;
            for pos in 0..n - 1 {
                let (value, i) = sorted[pos];
                let yi = y.data()[i].to_f64();
                sum_left += yi;
                sq_left += yi * yi;
                let next = sorted[pos + 1].0;
                if !(next > value) {
                    continue;
                }
                let n_left = (pos + 1) as f64;
                let n_right = (n - pos - 1) as f64;
                if (pos + 1) < self.min_samples_leaf || (n - pos - 1) < self.min_samples_leaf {
                    continue;
                }
                let sum_right = total_sum - sum_left;
                let sq_right = total_sq - sq_left;
                let sse = (sq_left - sum_left * sum_left / n_left)
                    + (sq_right - sum_right * sum_right / n_right);
                if best.as_ref().map_or(true, |b| sse < b.impurity - 1e-12) {
                    best = Some(SplitChoice {
                        feature,
                        threshold: midpoint(value, next),
                        impurity: sse,
                    });
                }
            }
        }
        Ok(best)
    }

    pub fn predict(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let tree = self.tree.as_ref().ok_or(TensorError::NotFitted)?;
        validate_predict_input(x, self.n_features)?;
        let preds: Vec<T> = x.rows()?.map(|row| tree.descend(row).0).collect();
        Ok(Tensor::from_slice(&preds))
    }
}
