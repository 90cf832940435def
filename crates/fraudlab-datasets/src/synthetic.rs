use fraudlab_core::TensorResult;
use fraudlab_data::{feature_columns, TransactionDataset, FEATURE_COLUMNS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seconds covered by the public two-day transaction capture.
const TIME_SPAN: f64 = 172_792.0;

/// Principal components whose means shift for fraudulent rows.
const FRAUD_SHIFTED: [usize; 6] = [3, 4, 10, 12, 14, 17];

fn standard_normal(rng: &mut StdRng) -> f64 {
    // Box-Muller
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn synthetic_row(rng: &mut StdRng, fraud: bool) -> Vec<f64> {
    let mut row = Vec::with_capacity(FEATURE_COLUMNS.len());
    row.push((rng.gen::<f64>() * TIME_SPAN).floor());
    for v in 1..=28 {
        let shift = if fraud && FRAUD_SHIFTED.contains(&v) {
            if v % 2 == 0 { -4.0 } else { 3.0 }
        } else {
            0.0
        };
        row.push(standard_normal(rng) + shift);
    }
    // Log-normal amounts, fraud skewed towards small card-testing charges.
    let (mu, sigma) = if fraud { (2.0, 1.5) } else { (3.5, 1.2) };
    let amount = (mu + sigma * standard_normal(rng)).exp();
    row.push((amount * 100.0).round() / 100.0);
    row
}

/// Generate a credit-card-like transaction table with `n_legit` legitimate
/// rows followed by `n_fraud` fraudulent rows. Same seed, same table.
pub fn make_transactions(n_legit: usize, n_fraud: usize, seed: u64) -> TensorResult<TransactionDataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_legit + n_fraud);
    let mut labels = Vec::with_capacity(n_legit + n_fraud);
    for i in 0..n_legit + n_fraud {
        let fraud = i >= n_legit;
        rows.push(synthetic_row(&mut rng, fraud));
        labels.push(if fraud { 1.0 } else { 0.0 });
    }
    TransactionDataset::from_rows(feature_columns(), &rows, &labels)
}

/// Small hand-checkable table: every row is distinct, legitimate rows sit
/// near the origin and fraudulent rows near 10 in every feature.
pub fn toy_transactions(n_legit: usize, n_fraud: usize) -> TensorResult<TransactionDataset> {
    let p = FEATURE_COLUMNS.len();
    let mut rows = Vec::with_capacity(n_legit + n_fraud);
    let mut labels = Vec::with_capacity(n_legit + n_fraud);
    for i in 0..n_legit {
        rows.push((0..p).map(|j| i as f64 * 0.1 + j as f64 * 0.01).collect());
        labels.push(0.0);
    }
    for i in 0..n_fraud {
        rows.push((0..p).map(|j| 10.0 + i as f64 * 0.3 + j as f64 * 0.01).collect());
        labels.push(1.0);
    }
    TransactionDataset::from_rows(feature_columns(), &rows, &labels)
}

/// Append exact copies of the given rows, labels included.
pub fn with_duplicates(dataset: &TransactionDataset, rows: &[usize]) -> TensorResult<TransactionDataset> {
    dataset.concat(&dataset.select(rows)?)
}
