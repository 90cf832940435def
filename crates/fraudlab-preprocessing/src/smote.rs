use fraudlab_core::{TensorError, TensorResult};
use fraudlab_data::TransactionDataset;
use fraudlab_neighbors::{DistanceMetric, NearestNeighbors};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

/// Synthetic Minority Over-sampling Technique.
///
/// Brings the minority class up to the majority count by interpolating
/// between minority rows and their nearest minority neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smote {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Smote { k_neighbors, seed }
    }

    /// Return `dataset` followed by the synthetic minority rows that make
    /// both classes equally large. An already balanced dataset comes back
    /// unchanged.
    ///
    /// Each synthetic row is `x + gap * (n - x)` for a uniformly chosen
    /// minority row `x`, one of its `k_neighbors` nearest minority rows `n`
    /// and `gap` in `[0, 1)`.
    pub fn balance(&self, dataset: &TransactionDataset) -> TensorResult<TransactionDataset> {
        if self.k_neighbors == 0 {
            return Err(TensorError::InvalidOperation(
                "k_neighbors must be at least 1".into(),
            ));
        }
        if dataset.is_empty() {
            return Err(TensorError::EmptyTensor);
        }

        let counts = dataset.class_counts();
        if counts.is_balanced() {
            warn!(rows = dataset.len(), "dataset already balanced, nothing to oversample");
            return Ok(dataset.clone());
        }

        let minority = counts.minority();
        let n_min = counts.get(minority);
        let n_synthetic = counts.total() - 2 * n_min;
        if n_min < self.k_neighbors + 1 {
            return Err(TensorError::InsufficientSamples {
                required: self.k_neighbors + 1,
                available: n_min,
            });
        }

        let minority_x = dataset.features().select_rows(&dataset.indices_of(minority))?;
        let mut index = NearestNeighbors::new(DistanceMetric::Euclidean);
        index.fit(&minority_x)?;
        let neighbours = index.kneighbors_graph(self.k_neighbors)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows = Vec::with_capacity(n_synthetic);
        for _ in 0..n_synthetic {
            let i = rng.gen_range(0..n_min);
            let j = neighbours[i][rng.gen_range(0..neighbours[i].len())];
            let gap: f64 = rng.gen();
            let x = minority_x.row(i)?;
            let nb = minority_x.row(j)?;
            rows.push(x.iter().zip(nb).map(|(&a, &b)| a + gap * (b - a)).collect::<Vec<f64>>());
        }

        let labels = vec![minority.value(); n_synthetic];
        let synthetic = TransactionDataset::from_rows(dataset.columns().to_vec(), &rows, &labels)?;
        let balanced = dataset.concat(&synthetic)?;
        info!(
            minority = %minority,
            original = n_min,
            synthetic = n_synthetic,
            total = balanced.len(),
            "oversampled minority class"
        );
        Ok(balanced)
    }
}

impl Default for Smote {
    fn default() -> Self {
        Smote::new(5, 42)
    }
}
