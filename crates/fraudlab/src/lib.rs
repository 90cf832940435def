//! # fraudlab
//!
//! Imbalanced-classification evaluation for credit-card fraud detection,
//! written in pure Rust.
//!
//! ## Modules
//!
//! - **core**: tensor storage, error type, `Estimator` and `Transformer` traits
//! - **data**: `TransactionDataset`, class labels and the CSV schema
//! - **io**: CSV loading with schema checks, CSV and JSON writers
//! - **datasets**: synthetic transaction tables for tests and demos
//! - **preprocessing**: dedupe, PCA, RobustScaler, SMOTE, train/test split, stratified k-fold
//! - **neighbors**: nearest-neighbour search and KNN classifier
//! - **naive_bayes**: Gaussian NB
//! - **tree**: decision tree, random forest, gradient boosting
//! - **linear**: L2-regularized logistic regression
//! - **metrics**: accuracy, per-class precision/recall/F1, weighted F1, average precision
//! - **pipeline**: configuration, model roster, holdout and cross-validation, `run`

/// Tensor storage and estimator traits.
pub use fraudlab_core as core;

/// Transaction records and schema.
pub use fraudlab_data as data;

/// I/O utilities.
pub use fraudlab_io as io;

/// Synthetic datasets.
pub use fraudlab_datasets as datasets;

/// Data preprocessing.
pub use fraudlab_preprocessing as preprocessing;

/// Nearest neighbors.
pub use fraudlab_neighbors as neighbors;

/// Naive Bayes classifiers.
pub use fraudlab_naive_bayes as naive_bayes;

/// Tree-based models.
pub use fraudlab_tree as tree;

/// Linear models.
pub use fraudlab_linear as linear;

/// Evaluation metrics.
pub use fraudlab_metrics as metrics;

/// End-to-end workflow.
pub use fraudlab_pipeline as pipeline;

pub use fraudlab_pipeline::{run, run_on, PipelineConfig, PipelineError, PipelineReport};
