use fraudlab_core::{Tensor, TensorError, TensorResult};
use fraudlab_data::TransactionDataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

/// A train/test partition of a dataset, with the row indices each side
/// was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub train: TransactionDataset,
    pub test: TransactionDataset,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Split a dataset into training and test sets.
///
/// Row indices are shuffled with `seed`; the first `round(n * test_fraction)`
/// shuffled indices form the test set and the rest the training set. No
/// stratification is applied.
pub fn train_test_split(dataset: &TransactionDataset, test_fraction: f64, seed: u64) -> TensorResult<DatasetSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TensorError::InvalidOperation(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let n = dataset.len();
    let n_test = (n as f64 * test_fraction).round() as usize;
    if n_test == 0 || n_test >= n {
        return Err(TensorError::InvalidOperation(format!(
            "test_fraction {} leaves an empty side when splitting {} rows",
            test_fraction, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();
    debug!(train = train_indices.len(), test = test_indices.len(), "split dataset");

    Ok(DatasetSplit {
        train: dataset.select(&train_indices)?,
        test: dataset.select(&test_indices)?,
        train_indices,
        test_indices,
    })
}

/// Stratified K-Folds cross-validator without shuffling.
///
/// Each fold keeps roughly the class proportions of the whole set. Rows
/// are dealt to folds in their original order, so the folds are fully
/// determined by the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        StratifiedKFold { n_splits }
    }

    /// Fold number of every row.
    ///
    /// The per-fold quota of each class comes from dealing the label-sorted
    /// rows round-robin over the folds; each class then fills its quotas
    /// fold by fold in row order.
    pub fn assign(&self, y: &Tensor<f64>) -> TensorResult<Vec<usize>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(TensorError::InvalidOperation(format!(
                "n_splits must be at least 2, got {}",
                k
            )));
        }
        let labels: Vec<usize> = y.data().iter().map(|v| v.round() as usize).collect();
        let mut classes = labels.clone();
        classes.sort_unstable();
        classes.dedup();

        let counts: Vec<usize> = classes
            .iter()
            .map(|c| labels.iter().filter(|&&l| l == *c).count())
            .collect();
        let largest = counts.iter().copied().max().unwrap_or(0);
        if largest < k {
            return Err(TensorError::InsufficientSamples {
                required: k,
                available: largest,
            });
        }
        if let Some(&smallest) = counts.iter().min() {
            if smallest < k {
                warn!(smallest, n_splits = k, "least populated class has fewer members than folds");
            }
        }

        // quota[fold][class]: class members among sorted positions fold, fold + k, ...
        let mut quota = vec![vec![0usize; classes.len()]; k];
        let mut position = 0;
        for (c, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                quota[position % k][c] += 1;
                position += 1;
            }
        }

        let mut folds = vec![0usize; labels.len()];
        for (c, class) in classes.iter().enumerate() {
            let mut fold = 0;
            let mut used = 0;
            for (i, _) in labels.iter().enumerate().filter(|&(_, &l)| l == *class) {
                while used == quota[fold][c] {
                    fold += 1;
                    used = 0;
                }
                folds[i] = fold;
                used += 1;
            }
        }
        Ok(folds)
    }

    /// `(train_indices, test_indices)` for each fold, both ascending.
    pub fn split(&self, y: &Tensor<f64>) -> TensorResult<Vec<(Vec<usize>, Vec<usize>)>> {
        let folds = self.assign(y)?;
        Ok((0..self.n_splits)
            .map(|f| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..folds.len()).partition(|&i| folds[i] == f);
                (train, test)
            })
            .collect())
    }
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        StratifiedKFold::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlab_data::ClassCounts;
    use fraudlab_datasets::toy_transactions;
    use std::collections::HashSet;

    #[test]
    fn test_train_test_split_sizes() {
        let ds = toy_transactions(10, 10).unwrap();
        let split = train_test_split(&ds, 0.3, 42).unwrap();
        assert_eq!(split.train.len(), 14);
        assert_eq!(split.test.len(), 6);
        assert_eq!(split.test, ds.select(&split.test_indices).unwrap());
    }

    #[test]
    fn test_split_disjoint_and_complete() {
        let ds = toy_transactions(23, 9).unwrap();
        let split = train_test_split(&ds, 0.25, 7).unwrap();
        let train: HashSet<usize> = split.train_indices.iter().copied().collect();
        let test: HashSet<usize> = split.test_indices.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), ds.len());
        assert_eq!(train.union(&test).count(), ds.len());
    }

    #[test]
    fn test_split_deterministic() {
        let ds = toy_transactions(15, 5).unwrap();
        assert_eq!(
            train_test_split(&ds, 0.3, 42).unwrap(),
            train_test_split(&ds, 0.3, 42).unwrap()
        );
    }

    #[test]
    fn test_split_rejects_bad_fractions() {
        let ds = toy_transactions(2, 1).unwrap();
        assert!(train_test_split(&ds, 0.0, 1).is_err());
        assert!(train_test_split(&ds, 1.0, 1).is_err());
        // 3 * 0.1 rounds to an empty test set
        assert!(train_test_split(&ds, 0.1, 1).is_err());
    }

    #[test]
    fn test_stratified_fold_assignment() {
        let y = Tensor::from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let skf = StratifiedKFold::new(2);
        assert_eq!(skf.assign(&y).unwrap(), vec![0, 0, 0, 1, 1, 1, 0, 0, 1, 1]);
        let folds = skf.split(&y).unwrap();
        assert_eq!(folds[0].1, vec![0, 1, 2, 6, 7]);
        assert_eq!(folds[0].0, vec![3, 4, 5, 8, 9]);
    }

    #[test]
    fn test_stratified_folds_balanced() {
        let ds = toy_transactions(10, 10).unwrap();
        let folds = StratifiedKFold::default().split(ds.labels()).unwrap();
        assert_eq!(folds.len(), 5);
        let mut seen = HashSet::new();
        for (train, test) in &folds {
            assert_eq!(train.len(), 16);
            assert_eq!(ds.select(test).unwrap().class_counts(), ClassCounts { legit: 2, fraud: 2 });
            for &i in test {
                assert!(seen.insert(i));
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_stratified_too_many_folds() {
        let y = Tensor::from_slice(&[0.0, 1.0, 0.0]);
        assert!(matches!(
            StratifiedKFold::new(3).assign(&y),
            Err(TensorError::InsufficientSamples { required: 3, available: 2 })
        ));
        assert!(StratifiedKFold::new(1).assign(&y).is_err());
    }
}
