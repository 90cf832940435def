use fraudlab_core::Estimator;
use fraudlab_data::TransactionDataset;
use fraudlab_linear::LogisticRegression;
use fraudlab_naive_bayes::GaussianNB;
use fraudlab_neighbors::{DistanceMetric, KNNClassifier};
use fraudlab_tree::{DecisionTreeClassifier, GradientBoostingClassifier, MaxFeatures, RandomForestClassifier};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveBayesParams {
    pub var_smoothing: f64,
}

impl Default for NaiveBayesParams {
    fn default() -> Self {
        NaiveBayesParams { var_smoothing: 1e-9 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        DecisionTreeParams {
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        RandomForestParams {
            n_estimators: 50,
            max_depth: 4,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    /// Inverse L2 regularization strength.
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        LogisticParams {
            c: 1.0,
            learning_rate: 0.1,
            max_iter: 500,
            tol: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnParams {
    pub k: usize,
    pub metric: DistanceMetric,
}

impl Default for KnnParams {
    fn default() -> Self {
        KnnParams {
            k: 7,
            metric: DistanceMetric::Euclidean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        GradientBoostingParams {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
        }
    }
}

/// Recipe for one roster entry. In TOML, `kind` selects the model and the
/// remaining keys override its defaults:
///
/// ```toml
/// [[models.roster]]
/// kind = "random_forest"
/// n_estimators = 20
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    NaiveBayes(NaiveBayesParams),
    DecisionTree(DecisionTreeParams),
    RandomForest(RandomForestParams),
    LogisticRegression(LogisticParams),
    Knn(KnnParams),
    GradientBoosting(GradientBoostingParams),
}

impl ModelSpec {
    /// Stable identifier used in tables, logs and errors.
    pub fn id(&self) -> &'static str {
        match self {
            ModelSpec::NaiveBayes(_) => "naive_bayes",
            ModelSpec::DecisionTree(_) => "decision_tree",
            ModelSpec::RandomForest(_) => "random_forest",
            ModelSpec::LogisticRegression(_) => "logistic_regression",
            ModelSpec::Knn(_) => "knn",
            ModelSpec::GradientBoosting(_) => "gradient_boosting",
        }
    }

    /// A fresh, unfitted estimator.
    pub fn build(&self) -> Box<dyn Estimator> {
        match self {
            ModelSpec::NaiveBayes(p) => Box::new(GaussianNB::<f64>::new().with_var_smoothing(p.var_smoothing)),
            ModelSpec::DecisionTree(p) => Box::new(
                DecisionTreeClassifier::<f64>::new(p.max_depth, p.min_samples_split, p.min_samples_leaf)
                    .with_max_features(p.max_features)
                    .with_seed(p.seed),
            ),
            ModelSpec::RandomForest(p) => Box::new(
                RandomForestClassifier::<f64>::new(p.n_estimators, p.max_depth)
                    .with_max_features(p.max_features)
                    .with_bootstrap(p.bootstrap)
                    .with_seed(p.seed),
            ),
            ModelSpec::LogisticRegression(p) => Box::new(
                LogisticRegression::<f64>::new(p.learning_rate, p.max_iter)
                    .with_c(p.c)
                    .with_tol(p.tol),
            ),
            ModelSpec::Knn(p) => Box::new(KNNClassifier::<f64>::new(p.k, p.metric)),
            ModelSpec::GradientBoosting(p) => Box::new(GradientBoostingClassifier::<f64>::new(
                p.n_estimators,
                p.learning_rate,
                p.max_depth,
            )),
        }
    }

    /// The six models every run trains unless configured otherwise.
    pub fn default_roster() -> Vec<ModelSpec> {
        vec![
            ModelSpec::NaiveBayes(NaiveBayesParams::default()),
            ModelSpec::DecisionTree(DecisionTreeParams::default()),
            ModelSpec::RandomForest(RandomForestParams::default()),
            ModelSpec::LogisticRegression(LogisticParams::default()),
            ModelSpec::Knn(KnnParams::default()),
            ModelSpec::GradientBoosting(GradientBoostingParams::default()),
        ]
    }

    /// Build and fit a fresh estimator on `data`.
    pub fn fit(&self, data: &TransactionDataset) -> PipelineResult<Box<dyn Estimator>> {
        let mut model = self.build();
        model
            .fit(data.features(), data.labels())
            .map_err(|source| PipelineError::Fit {
                model: self.id().to_string(),
                source,
            })?;
        Ok(model)
    }
}

/// A fitted model and the roster id it was built from.
pub struct TrainedModel {
    pub id: &'static str,
    pub estimator: Box<dyn Estimator>,
}

/// Fitted models, in roster order.
pub struct ModelBank {
    models: Vec<TrainedModel>,
}

impl ModelBank {
    /// Fit every spec on the same training data. The first failing model
    /// aborts the whole bank.
    pub fn train(specs: &[ModelSpec], train: &TransactionDataset) -> PipelineResult<Self> {
        let mut models = Vec::with_capacity(specs.len());
        for spec in specs {
            let estimator = spec.fit(train)?;
            debug!(model = spec.id(), algorithm = estimator.name(), rows = train.len(), "model trained");
            models.push(TrainedModel {
                id: spec.id(),
                estimator,
            });
        }
        Ok(ModelBank { models })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainedModel> {
        self.models.iter()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Estimator> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.estimator.as_ref())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl From<Vec<TrainedModel>> for ModelBank {
    fn from(models: Vec<TrainedModel>) -> Self {
        ModelBank { models }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};
    use fraudlab_core::TensorError;
    use fraudlab_datasets::toy_transactions;
    use fraudlab_metrics::accuracy;

    #[test]
    fn test_default_roster_order() {
        let ids: Vec<&str> = ModelSpec::default_roster().iter().map(ModelSpec::id).collect();
        assert_eq!(
            ids,
            vec!["naive_bayes", "decision_tree", "random_forest", "logistic_regression", "knn", "gradient_boosting"]
        );
    }

    #[test]
    fn test_build_names() {
        let names: Vec<&str> = ModelSpec::default_roster().iter().map(|s| s.build().name()).collect();
        assert_eq!(names[0], "GaussianNB");
        assert_eq!(names[4], "KNeighborsClassifier");
    }

    #[test]
    fn test_bank_trains_every_model() {
        let train = toy_transactions(12, 12).unwrap();
        let bank = ModelBank::train(&ModelSpec::default_roster(), &train).unwrap();
        assert_eq!(bank.len(), 6);
        for model in bank.iter() {
            let pred = model.estimator.predict(train.features()).unwrap();
            let acc = accuracy(train.labels(), &pred).unwrap();
            assert!(acc >= 0.9, "{} scored {}", model.id, acc);
        }
        assert!(bank.get("knn").is_some());
        assert!(bank.get("svm").is_none());
    }

    #[test]
    fn test_bank_fails_fast_with_model_name() {
        let train = toy_transactions(4, 4).unwrap();
        let specs = vec![
            ModelSpec::NaiveBayes(NaiveBayesParams::default()),
            ModelSpec::Knn(KnnParams { k: 0, ..KnnParams::default() }),
            ModelSpec::GradientBoosting(GradientBoostingParams::default()),
        ];
        match ModelBank::train(&specs, &train) {
            Err(PipelineError::Fit { model, .. }) => assert_eq!(model, "knn"),
            other => panic!("expected a fit error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_non_finite_training_data_rejected() {
        let mut rows = vec![vec![0.0; 2]; 4];
        rows[2][1] = f64::NAN;
        let ds = TransactionDataset::from_rows(vec!["a".into(), "b".into()], &rows, &[0.0, 1.0, 0.0, 1.0]).unwrap();
        let err = ModelSpec::LogisticRegression(LogisticParams::default()).fit(&ds).err();
        assert!(matches!(
            err,
            Some(PipelineError::Fit { source: TensorError::NonFinite { row: 2, col: 1 }, .. })
        ));
    }

    #[test]
    fn test_spec_from_toml() {
        let spec: ModelSpec = Config::builder()
            .add_source(File::from_str("kind = \"random_forest\"\nn_estimators = 20\n", FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(
            spec,
            ModelSpec::RandomForest(RandomForestParams {
                n_estimators: 20,
                ..RandomForestParams::default()
            })
        );
    }
}
