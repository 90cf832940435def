use fraudlab_core::Estimator;
use fraudlab_data::TransactionDataset;
use fraudlab_metrics::{accuracy, average_precision, f1_weighted, precision_class, recall_class};
use fraudlab_preprocessing::{Smote, StratifiedKFold};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ModelBank, ModelSpec};

const FRAUD: usize = 1;

/// Holdout metrics of one model. Precision and recall are for the fraud
/// class only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldoutScore {
    pub model: String,
    pub accuracy: f64,
    pub f1_weighted: f64,
    pub precision: f64,
    pub recall: f64,
    /// Area under the precision-recall curve, for models with probabilities.
    pub auprc: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoldoutTable {
    pub rows: Vec<HoldoutScore>,
}

impl HoldoutTable {
    pub fn get(&self, model: &str) -> Option<&HoldoutScore> {
        self.rows.iter().find(|r| r.model == model)
    }
}

impl fmt::Display for HoldoutTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<22}{:>10}{:>13}{:>11}{:>9}{:>9}",
            "model", "accuracy", "f1_weighted", "precision", "recall", "auprc"
        )?;
        for r in &self.rows {
            let auprc = r.auprc.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
            writeln!(
                f,
                "{:<22}{:>10.4}{:>13.4}{:>11.4}{:>9.4}{:>9}",
                r.model, r.accuracy, r.f1_weighted, r.precision, r.recall, auprc
            )?;
        }
        Ok(())
    }
}

/// Per-fold accuracies of one model and their mean and population
/// standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvScore {
    pub model: String,
    pub fold_accuracies: Vec<f64>,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
}

impl CvScore {
    pub fn from_folds(model: &str, fold_accuracies: Vec<f64>) -> Self {
        let n = fold_accuracies.len().max(1) as f64;
        let mean = fold_accuracies.iter().sum::<f64>() / n;
        let var = fold_accuracies.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        CvScore {
            model: model.to_string(),
            fold_accuracies,
            mean_accuracy: mean,
            std_accuracy: var.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CvTable {
    pub folds: usize,
    /// Whether training folds were oversampled separately.
    pub rebalanced_per_fold: bool,
    pub rows: Vec<CvScore>,
}

impl CvTable {
    pub fn get(&self, model: &str) -> Option<&CvScore> {
        self.rows.iter().find(|r| r.model == model)
    }
}

impl fmt::Display for CvTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<22}", "model")?;
        for fold in 0..self.folds {
            write!(f, "{:>9}", format!("fold{}", fold + 1))?;
        }
        writeln!(f, "{:>9}{:>9}", "mean", "std")?;
        for r in &self.rows {
            write!(f, "{:<22}", r.model)?;
            for acc in &r.fold_accuracies {
                write!(f, "{:>9.4}", acc)?;
            }
            writeln!(f, "{:>9.4}{:>9.4}", r.mean_accuracy, r.std_accuracy)?;
        }
        Ok(())
    }
}

fn fit_error(model: &str) -> impl FnOnce(fraudlab_core::TensorError) -> PipelineError + '_ {
    move |source| PipelineError::Fit {
        model: model.to_string(),
        source,
    }
}

fn score(id: &str, model: &dyn Estimator, test: &TransactionDataset) -> PipelineResult<HoldoutScore> {
    let y = test.labels();
    let pred = model.predict(test.features()).map_err(fit_error(id))?;
    let auprc = match model.predict_proba(test.features()) {
        Some(proba) => Some(average_precision(y, &proba.map_err(fit_error(id))?)?),
        None => None,
    };
    Ok(HoldoutScore {
        model: id.to_string(),
        accuracy: accuracy(y, &pred)?,
        f1_weighted: f1_weighted(y, &pred, 2)?,
        precision: precision_class(y, &pred, FRAUD)?,
        recall: recall_class(y, &pred, FRAUD)?,
        auprc,
    })
}

/// Score every trained model on the test set, in roster order.
pub fn evaluate_holdout(bank: &ModelBank, test: &TransactionDataset) -> PipelineResult<HoldoutTable> {
    let mut rows = Vec::with_capacity(bank.len());
    for trained in bank.iter() {
        let row = score(trained.id, trained.estimator.as_ref(), test)?;
        debug!(model = trained.id, accuracy = row.accuracy, "holdout scored");
        rows.push(row);
    }
    Ok(HoldoutTable { rows })
}

/// Stratified k-fold accuracy of each spec on `dataset`, fitting a fresh
/// model per fold.
pub fn cross_validate(specs: &[ModelSpec], dataset: &TransactionDataset, folds: usize) -> PipelineResult<CvTable> {
    cross_validate_with(specs, dataset, folds, None)
}

/// Like [`cross_validate`], but when `rebalance` is given every training
/// fold is oversampled with it before fitting. Test folds keep their
/// original class mix.
pub fn cross_validate_with(
    specs: &[ModelSpec],
    dataset: &TransactionDataset,
    folds: usize,
    rebalance: Option<&Smote>,
) -> PipelineResult<CvTable> {
    let splits = StratifiedKFold::new(folds).split(dataset.labels())?;

    // fold datasets are shared across specs
    let mut prepared = Vec::with_capacity(splits.len());
    for (train_idx, test_idx) in &splits {
        let mut train = dataset.select(train_idx)?;
        if let Some(smote) = rebalance {
            train = smote.balance(&train)?;
        }
        prepared.push((train, dataset.select(test_idx)?));
    }

    let mut rows = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut accuracies = Vec::with_capacity(folds);
        for (fold, (train, test)) in prepared.iter().enumerate() {
            let model = spec.fit(train)?;
            let pred = model.predict(test.features()).map_err(fit_error(spec.id()))?;
            let acc = accuracy(test.labels(), &pred)?;
            debug!(model = spec.id(), fold, accuracy = acc, "fold scored");
            accuracies.push(acc);
        }
        rows.push(CvScore::from_folds(spec.id(), accuracies));
    }
    Ok(CvTable {
        folds,
        rebalanced_per_fold: rebalance.is_some(),
        rows,
    })
}
