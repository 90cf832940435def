//! Stage orchestration: load, dedupe, transform, balance, split, train,
//! evaluate.

use fraudlab_data::{ClassCounts, DatasetSummary, TransactionDataset, AMOUNT_COLUMN, TIME_COLUMN};
use fraudlab_io::{load_transactions, write_json_report};
use fraudlab_preprocessing::{dedupe, train_test_split, DedupeReport, FeatureTransformer, Smote};
use serde::Serialize;
use tracing::info;

use crate::error::PipelineResult;
use crate::evaluate::{cross_validate, cross_validate_with, evaluate_holdout, CvTable, HoldoutTable};
use crate::models::ModelBank;
use crate::settings::PipelineConfig;

/// Everything a run produced, in stage order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Input as loaded, before any stage ran.
    pub loaded: DatasetSummary,
    /// `None` when cleaning is disabled.
    pub dedupe: Option<DedupeReport>,
    pub balanced: ClassCounts,
    pub train_rows: usize,
    pub test_rows: usize,
    pub holdout: HoldoutTable,
    pub cv: CvTable,
}

/// Load the configured CSV and run every stage on it. Writes the JSON
/// report when `output.report` is set.
pub fn run(config: &PipelineConfig) -> PipelineResult<PipelineReport> {
    config.validate()?;
    info!(path = %config.data.path.display(), "loading transactions");
    let dataset = load_transactions(&config.data.path)?;
    let report = run_on(dataset, config)?;
    if let Some(path) = &config.output.report {
        write_json_report(path, &report)?;
    }
    Ok(report)
}

/// Run every stage after loading on an in-memory dataset.
pub fn run_on(dataset: TransactionDataset, config: &PipelineConfig) -> PipelineResult<PipelineReport> {
    config.validate()?;
    let loaded = dataset.summary(&[TIME_COLUMN, AMOUNT_COLUMN])?;
    info!(rows = loaded.rows, counts = %loaded.counts, "loaded");

    let (dataset, dedupe_report) = if config.cleaning.enabled {
        let (cleaned, report) = dedupe(&dataset)?;
        (cleaned, Some(report))
    } else {
        info!("cleaning disabled");
        (dataset, None)
    };

    let dataset = if config.transform.enabled {
        let mut transformer = FeatureTransformer::new(config.transform.columns.clone(), config.transform.order);
        let transformed = transformer.fit_transform(&dataset)?;
        info!(columns = ?config.transform.columns, order = ?config.transform.order, "transformed");
        transformed
    } else {
        dataset
    };

    let smote = Smote::new(config.balance.k_neighbors, config.balance.seed);
    let balanced = smote.balance(&dataset)?;
    let balanced_counts = balanced.class_counts();
    info!(counts = %balanced_counts, "balanced");

    let split = train_test_split(&balanced, config.split.test_fraction, config.split.seed)?;
    info!(train = split.train.len(), test = split.test.len(), "split");

    let roster = &config.models.roster;
    let bank = ModelBank::train(roster, &split.train)?;
    info!(models = bank.len(), "models trained");

    let holdout = evaluate_holdout(&bank, &split.test)?;
    info!(models = holdout.rows.len(), "holdout evaluated");

    let folds = config.evaluation.cv_folds;
    let cv = if config.evaluation.rebalance_per_fold {
        cross_validate_with(roster, &dataset, folds, Some(&smote))?
    } else {
        cross_validate(roster, &balanced, folds)?
    };
    info!(folds, rebalanced_per_fold = cv.rebalanced_per_fold, "cross-validation done");

    Ok(PipelineReport {
        loaded,
        dedupe: dedupe_report,
        balanced: balanced_counts,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        holdout,
        cv,
    })
}
