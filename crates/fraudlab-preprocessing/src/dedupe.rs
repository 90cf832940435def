use std::collections::HashSet;
use std::fmt;

use fraudlab_core::{Float, TensorResult};
use fraudlab_data::{Class, ClassCounts, TransactionDataset};
use serde::Serialize;
use tracing::info;

/// Class counts before and after duplicate removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DedupeReport {
    pub before: ClassCounts,
    pub after: ClassCounts,
}

impl DedupeReport {
    pub fn removed(&self) -> usize {
        self.before.total() - self.after.total()
    }

    pub fn removed_of(&self, class: Class) -> usize {
        self.before.get(class) - self.after.get(class)
    }
}

impl fmt::Display for DedupeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "legit {} -> {}, fraud {} -> {}",
            self.before.legit, self.after.legit, self.before.fraud, self.after.fraud
        )
    }
}

/// Remove exact-duplicate feature rows within each class.
///
/// The first occurrence of a row survives and the surviving rows keep
/// their relative order. Two rows with identical features but different
/// labels are both kept. Values compare bitwise, with `-0.0 == 0.0`.
pub fn dedupe(dataset: &TransactionDataset) -> TensorResult<(TransactionDataset, DedupeReport)> {
    let mut seen_legit: HashSet<Vec<u64>> = HashSet::new();
    let mut seen_fraud: HashSet<Vec<u64>> = HashSet::new();
    let mut keep = Vec::with_capacity(dataset.len());

    for i in 0..dataset.len() {
        let key: Vec<u64> = dataset.row(i)?.iter().map(|v| v.canonical_bits()).collect();
        let seen = match dataset.label(i)? {
            Class::Legit => &mut seen_legit,
            Class::Fraud => &mut seen_fraud,
        };
        if seen.insert(key) {
            keep.push(i);
        }
    }

    let cleaned = dataset.select(&keep)?;
    let report = DedupeReport {
        before: dataset.class_counts(),
        after: cleaned.class_counts(),
    };
    info!(
        legit_before = report.before.legit,
        legit_after = report.after.legit,
        fraud_before = report.before.fraud,
        fraud_after = report.after.fraud,
        "removed duplicate rows"
    );
    Ok((cleaned, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlab_datasets::{toy_transactions, with_duplicates};

    fn two_col(rows: &[[f64; 2]], labels: &[f64]) -> TransactionDataset {
        let rows: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
        TransactionDataset::from_rows(vec!["a".into(), "b".into()], &rows, labels).unwrap()
    }

    #[test]
    fn test_dedupe_keeps_first_and_order() {
        let ds = two_col(
            &[[1.0, 2.0], [3.0, 4.0], [1.0, 2.0], [5.0, 6.0], [3.0, 4.0]],
            &[0.0, 0.0, 0.0, 1.0, 0.0],
        );
        let (clean, report) = dedupe(&ds).unwrap();
        assert_eq!(clean, ds.select(&[0, 1, 3]).unwrap());
        assert_eq!(report.removed(), 2);
        assert_eq!(report.removed_of(Class::Legit), 2);
        assert_eq!(report.after, ClassCounts { legit: 2, fraud: 1 });
    }

    #[test]
    fn test_no_cross_class_dedupe() {
        let ds = two_col(&[[1.0, 1.0], [1.0, 1.0]], &[0.0, 1.0]);
        let (clean, report) = dedupe(&ds).unwrap();
        assert_eq!(clean.len(), 2);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn test_signed_zero_is_a_duplicate() {
        let ds = two_col(&[[0.0, 1.0], [-0.0, 1.0]], &[1.0, 1.0]);
        let (clean, _) = dedupe(&ds).unwrap();
        assert_eq!(clean.len(), 1);
    }

    #[test]
    fn test_dedupe_idempotent_and_unique() {
        let base = toy_transactions(12, 4).unwrap();
        let noisy = with_duplicates(&base, &[0, 3, 3, 13, 15, 7]).unwrap();
        let (once, report) = dedupe(&noisy).unwrap();
        assert_eq!(once, base);
        assert_eq!(report.removed(), 6);
        assert!(once.len() <= noisy.len());

        let (twice, report) = dedupe(&once).unwrap();
        assert_eq!(twice, once);
        assert_eq!(report.removed(), 0);

        let mut keys = HashSet::new();
        for i in 0..once.len() {
            let key: Vec<u64> = once.row(i).unwrap().iter().map(|v| v.canonical_bits()).collect();
            assert!(keys.insert((once.labels().data()[i] as u8, key)));
        }
    }

    #[test]
    fn test_empty_dataset() {
        let ds = two_col(&[], &[]);
        let (clean, report) = dedupe(&ds).unwrap();
        assert!(clean.is_empty());
        assert_eq!(report, DedupeReport::default());
    }
}
