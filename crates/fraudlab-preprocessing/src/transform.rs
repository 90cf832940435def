use fraudlab_core::{Tensor, TensorError, TensorResult, Transformer};
use fraudlab_data::{TransactionDataset, AMOUNT_COLUMN, TIME_COLUMN};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pca::PCA;
use crate::scaler::RobustScaler;

/// Order of the two steps applied to the transformed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOrder {
    /// Project with PCA, then fit and apply the scaler on the projection.
    #[default]
    ProjectThenScale,
    /// Scale the raw columns, then project the scaled values.
    ScaleThenProject,
}

/// Decorrelates and rescales a subset of columns (by default `Time` and
/// `Amount`), writing the result back into the same column positions.
pub struct FeatureTransformer {
    pub columns: Vec<String>,
    pub order: TransformOrder,
    pca: PCA<f64>,
    scaler: RobustScaler<f64>,
    indices: Vec<usize>,
}

impl FeatureTransformer {
    pub fn new(columns: Vec<String>, order: TransformOrder) -> Self {
        let k = columns.len();
        FeatureTransformer {
            columns,
            order,
            pca: PCA::new(k),
            scaler: RobustScaler::new(),
            indices: Vec::new(),
        }
    }

    fn resolve(&self, dataset: &TransactionDataset) -> TensorResult<Vec<usize>> {
        if self.columns.is_empty() {
            return Err(TensorError::InvalidOperation(
                "no columns to transform".into(),
            ));
        }
        self.columns
            .iter()
            .map(|name| {
                dataset.column_index(name).ok_or_else(|| {
                    TensorError::InvalidOperation(format!("unknown column \"{}\"", name))
                })
            })
            .collect()
    }

    fn steps(&self) -> [&dyn Transformer; 2] {
        match self.order {
            TransformOrder::ProjectThenScale => [&self.pca as &dyn Transformer, &self.scaler],
            TransformOrder::ScaleThenProject => [&self.scaler as &dyn Transformer, &self.pca],
        }
    }

    fn steps_mut(&mut self) -> [&mut dyn Transformer; 2] {
        match self.order {
            TransformOrder::ProjectThenScale => [&mut self.pca as &mut dyn Transformer, &mut self.scaler],
            TransformOrder::ScaleThenProject => [&mut self.scaler as &mut dyn Transformer, &mut self.pca],
        }
    }

    /// Fit both steps on the selected columns of `dataset`.
    pub fn fit(&mut self, dataset: &TransactionDataset) -> TensorResult<()> {
        if dataset.is_empty() {
            return Err(TensorError::EmptyTensor);
        }
        self.indices = self.resolve(dataset)?;
        let mut current = dataset.features().select_cols(&self.indices)?;
        for step in self.steps_mut() {
            current = step.fit_transform(&current)?;
        }
        debug!(
            columns = ?self.columns,
            order = ?self.order,
            explained_variance_ratio = ?self.pca.explained_variance_ratio(),
            "feature transform fitted"
        );
        Ok(())
    }

    fn apply(&self, sub: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        self.steps()
            .iter()
            .try_fold(sub.clone(), |current, step| step.transform(&current))
    }

    /// Return `dataset` with the selected columns replaced by their
    /// transformed values. Other columns and the labels are untouched.
    pub fn transform(&self, dataset: &TransactionDataset) -> TensorResult<TransactionDataset> {
        if self.indices.is_empty() {
            return Err(TensorError::NotFitted);
        }
        if dataset.is_empty() {
            return Err(TensorError::EmptyTensor);
        }
        let sub = dataset.features().select_cols(&self.indices)?;
        let out = self.apply(&sub)?;

        let mut features = dataset.features().clone();
        for (k, &j) in self.indices.iter().enumerate() {
            features.set_col(j, out.col(k)?.data())?;
        }
        dataset.clone().with_features(features)
    }

    pub fn fit_transform(&mut self, dataset: &TransactionDataset) -> TensorResult<TransactionDataset> {
        self.fit(dataset)?;
        self.transform(dataset)
    }
}

impl Default for FeatureTransformer {
    fn default() -> Self {
        FeatureTransformer::new(
            vec![TIME_COLUMN.to_string(), AMOUNT_COLUMN.to_string()],
            TransformOrder::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fraudlab_datasets::make_transactions;

    fn median(mut v: Vec<f64>) -> f64 {
        v.sort_by(f64::total_cmp);
        crate::scaler::percentile(&v, 0.5)
    }

    #[test]
    fn test_only_target_columns_change() {
        let ds = make_transactions(60, 10, 3).unwrap();
        let mut ft = FeatureTransformer::default();
        let out = ft.fit_transform(&ds).unwrap();

        assert_eq!(out.len(), ds.len());
        assert_eq!(out.labels(), ds.labels());
        assert_eq!(out.columns(), ds.columns());
        let time = ds.column_index(TIME_COLUMN).unwrap();
        let amount = ds.column_index(AMOUNT_COLUMN).unwrap();
        for j in 0..ds.n_features() {
            let changed = out.features().col(j).unwrap() != ds.features().col(j).unwrap();
            assert_eq!(changed, j == time || j == amount, "column {}", j);
        }
    }

    #[test]
    fn test_project_then_scale_is_median_centered() {
        let ds = make_transactions(40, 5, 11).unwrap();
        let mut ft = FeatureTransformer::new(
            vec![TIME_COLUMN.into(), AMOUNT_COLUMN.into()],
            TransformOrder::ProjectThenScale,
        );
        let out = ft.fit_transform(&ds).unwrap();
        for name in [TIME_COLUMN, AMOUNT_COLUMN] {
            let j = out.column_index(name).unwrap();
            let col = out.features().col(j).unwrap().data().to_vec();
            assert_abs_diff_eq!(median(col), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scale_then_project_is_mean_centered() {
        let ds = make_transactions(40, 5, 11).unwrap();
        let mut ft = FeatureTransformer::new(
            vec![TIME_COLUMN.into(), AMOUNT_COLUMN.into()],
            TransformOrder::ScaleThenProject,
        );
        let out = ft.fit_transform(&ds).unwrap();
        let j = out.column_index(TIME_COLUMN).unwrap();
        let col = out.features().col(j).unwrap();
        let mean = col.data().iter().sum::<f64>() / col.numel() as f64;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_matches_manual_chain() {
        let ds = make_transactions(30, 6, 4).unwrap();
        let cols = vec![TIME_COLUMN.to_string(), AMOUNT_COLUMN.to_string()];
        let mut ft = FeatureTransformer::new(cols.clone(), TransformOrder::ScaleThenProject);
        let out = ft.fit_transform(&ds).unwrap();

        let idx: Vec<usize> = cols.iter().map(|c| ds.column_index(c).unwrap()).collect();
        let sub = ds.features().select_cols(&idx).unwrap();
        let mut scaler = RobustScaler::<f64>::new();
        let mut pca = PCA::<f64>::new(2);
        let steps: [&mut dyn Transformer; 2] = [&mut scaler, &mut pca];
        let mut expected = sub;
        for step in steps {
            expected = step.fit_transform(&expected).unwrap();
        }
        for (k, &j) in idx.iter().enumerate() {
            let got = out.features().col(j).unwrap();
            let want = expected.col(k).unwrap();
            for (a, b) in got.data().iter().zip(want.data()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_errors() {
        let ds = make_transactions(5, 1, 1).unwrap();
        let mut ft = FeatureTransformer::new(vec!["Velocity".into()], TransformOrder::default());
        assert!(matches!(ft.fit(&ds), Err(TensorError::InvalidOperation(_))));

        let ft = FeatureTransformer::default();
        assert_eq!(ft.transform(&ds), Err(TensorError::NotFitted));

        let empty = ds.select(&[]).unwrap();
        let mut ft = FeatureTransformer::default();
        assert_eq!(ft.fit(&empty), Err(TensorError::EmptyTensor));
    }
}
