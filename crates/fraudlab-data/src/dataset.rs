use fraudlab_core::estimator::validate_binary_labels;
use fraudlab_core::{Tensor, TensorError, TensorResult};
use serde::Serialize;
use std::fmt;

/// Transaction class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Legit,
    Fraud,
}

impl Class {
    pub fn value(self) -> f64 {
        match self {
            Class::Legit => 0.0,
            Class::Fraud => 1.0,
        }
    }

    /// Interpret a stored label. Datasets only hold 0.0 and 1.0.
    pub fn from_label(v: f64) -> Self {
        if v == 1.0 {
            Class::Fraud
        } else {
            Class::Legit
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Legit => write!(f, "legit"),
            Class::Fraud => write!(f, "fraud"),
        }
    }
}

/// Row counts per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassCounts {
    pub legit: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.legit + self.fraud
    }

    pub fn get(&self, class: Class) -> usize {
        match class {
            Class::Legit => self.legit,
            Class::Fraud => self.fraud,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.legit == self.fraud
    }

    /// The class with fewer rows. Ties resolve to `Fraud`.
    pub fn minority(&self) -> Class {
        if self.legit < self.fraud {
            Class::Legit
        } else {
            Class::Fraud
        }
    }

    pub fn fraud_ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.fraud as f64 / self.total() as f64
        }
    }
}

impl fmt::Display for ClassCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "legit={} fraud={} ({:.3}% fraud)",
            self.legit,
            self.fraud,
            self.fraud_ratio() * 100.0
        )
    }
}

/// Descriptive statistics of one feature column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Shape and class balance of a dataset, plus stats for selected columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub counts: ClassCounts,
    pub columns: Vec<ColumnStats>,
}

/// An ordered table of transactions: a `[n, p]` feature matrix, an `[n]`
/// label vector of 0/1 values and the feature column names.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDataset {
    features: Tensor<f64>,
    labels: Tensor<f64>,
    columns: Vec<String>,
}

impl TransactionDataset {
    /// Labels must be exactly 0.0 or 1.0.
    pub fn new(features: Tensor<f64>, labels: Tensor<f64>, columns: Vec<String>) -> TensorResult<Self> {
        let n = features.nrows()?;
        let p = features.ncols()?;
        if labels.ndim() != 1 || labels.numel() != n {
            return Err(TensorError::ShapeMismatch {
                expected: vec![n],
                got: labels.shape_vec(),
            });
        }
        if columns.len() != p {
            return Err(TensorError::DimensionMismatch(format!(
                "{} column names for {} feature columns",
                columns.len(),
                p
            )));
        }
        validate_binary_labels(&labels)?;
        Ok(TransactionDataset {
            features,
            labels,
            columns,
        })
    }

    /// Build a dataset from per-row feature vectors and labels.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>], labels: &[f64]) -> TensorResult<Self> {
        let features = if rows.is_empty() {
            Tensor::zeros(vec![0, columns.len()])
        } else {
            Tensor::from_vec2d(rows)?
        };
        TransactionDataset::new(features, Tensor::from_slice(labels), columns)
    }

    pub fn features(&self) -> &Tensor<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Tensor<f64> {
        &self.labels
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Replace the feature matrix, keeping labels and column names.
    pub fn with_features(self, features: Tensor<f64>) -> TensorResult<Self> {
        TransactionDataset::new(features, self.labels, self.columns)
    }

    pub fn len(&self) -> usize {
        self.labels.numel()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, i: usize) -> TensorResult<&[f64]> {
        self.features.row(i)
    }

    pub fn label(&self, i: usize) -> TensorResult<Class> {
        self.labels.get(&[i]).map(Class::from_label)
    }

    /// New dataset holding rows `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> TensorResult<Self> {
        Ok(TransactionDataset {
            features: self.features.select_rows(indices)?,
            labels: self.labels.select_rows(indices)?,
            columns: self.columns.clone(),
        })
    }

    /// Append the rows of `other` after the rows of `self`.
    pub fn concat(&self, other: &TransactionDataset) -> TensorResult<Self> {
        if self.columns != other.columns {
            return Err(TensorError::InvalidOperation(
                "cannot concatenate datasets with different columns".to_string(),
            ));
        }
        Ok(TransactionDataset {
            features: self.features.vstack(&other.features)?,
            labels: self.labels.vstack(&other.labels)?,
            columns: self.columns.clone(),
        })
    }

    pub fn class_counts(&self) -> ClassCounts {
        let fraud = self.labels.data().iter().filter(|&&v| v == 1.0).count();
        ClassCounts {
            legit: self.len() - fraud,
            fraud,
        }
    }

    /// Row indices of each class, in original order: `(legit, fraud)`.
    pub fn partition_by_label(&self) -> (Vec<usize>, Vec<usize>) {
        let mut legit = Vec::new();
        let mut fraud = Vec::new();
        for (i, &v) in self.labels.data().iter().enumerate() {
            match Class::from_label(v) {
                Class::Legit => legit.push(i),
                Class::Fraud => fraud.push(i),
            }
        }
        (legit, fraud)
    }

    pub fn indices_of(&self, class: Class) -> Vec<usize> {
        let (legit, fraud) = self.partition_by_label();
        match class {
            Class::Legit => legit,
            Class::Fraud => fraud,
        }
    }

    /// Row count, class balance and min/max/mean of the named columns.
    /// Unknown column names are skipped.
    pub fn summary(&self, columns: &[&str]) -> TensorResult<DatasetSummary> {
        let mut stats = Vec::with_capacity(columns.len());
        for &name in columns {
            let Some(j) = self.column_index(name) else {
                continue;
            };
            let col = self.features.col(j)?;
            let values = col.data();
            if values.is_empty() {
                continue;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            stats.push(ColumnStats {
                name: name.to_string(),
                min,
                max,
                mean,
            });
        }
        Ok(DatasetSummary {
            rows: self.len(),
            counts: self.class_counts(),
            columns: stats,
        })
    }
}
