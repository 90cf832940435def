use fraudlab_core::error::TensorResult;
use fraudlab_core::{Float, Tensor, TensorError};

// Every ratio below returns 0.0 when its denominator is zero.

fn check_lengths<T: Float>(y_true: &Tensor<T>, y_other: &Tensor<T>) -> TensorResult<usize> {
    if y_true.numel() != y_other.numel() {
        return Err(TensorError::ShapeMismatch {
            expected: y_true.shape_vec(),
            got: y_other.shape_vec(),
        });
    }
    if y_true.numel() == 0 {
        return Err(TensorError::EmptyTensor);
    }
    Ok(y_true.numel())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn label<T: Float>(v: T) -> usize {
    v.to_f64().round() as usize
}

/// Compute accuracy: fraction of correct predictions.
pub fn accuracy<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>) -> TensorResult<f64> {
    let n = check_lengths(y_true, y_pred)?;
    let correct = y_true
        .data()
        .iter()
        .zip(y_pred.data())
        .filter(|(&a, &b)| label(a) == label(b))
        .count();
    Ok(ratio(correct, n))
}

/// Confusion matrix `m[true][pred]` of shape `[n_classes, n_classes]`.
/// Labels outside `0..n_classes` are skipped.
pub fn confusion_matrix<T: Float>(
    y_true: &Tensor<T>,
    y_pred: &Tensor<T>,
    n_classes: usize,
) -> TensorResult<Vec<Vec<usize>>> {
    check_lengths(y_true, y_pred)?;
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.data().iter().zip(y_pred.data()) {
        let (ti, pi) = (label(t), label(p));
        if ti < n_classes && pi < n_classes {
            matrix[ti][pi] += 1;
        }
    }
    Ok(matrix)
}

/// `(tp, fp, fn)` counts for one class treated as positive.
fn class_counts<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>, class: usize) -> TensorResult<(usize, usize, usize)> {
    check_lengths(y_true, y_pred)?;
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in y_true.data().iter().zip(y_pred.data()) {
        match (label(t) == class, label(p) == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    Ok((tp, fp, fn_))
}

/// Precision for a specific class.
pub fn precision_class<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>, class: usize) -> TensorResult<f64> {
    let (tp, fp, _) = class_counts(y_true, y_pred, class)?;
    Ok(ratio(tp, tp + fp))
}

/// Recall for a specific class.
pub fn recall_class<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>, class: usize) -> TensorResult<f64> {
    let (tp, _, fn_) = class_counts(y_true, y_pred, class)?;
    Ok(ratio(tp, tp + fn_))
}

/// F1 score for a specific class.
pub fn f1_score_class<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>, class: usize) -> TensorResult<f64> {
    let p = precision_class(y_true, y_pred, class)?;
    let r = recall_class(y_true, y_pred, class)?;
    Ok(if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) })
}

/// Per-class F1 averaged with weights equal to each class's support in
/// `y_true`.
pub fn f1_weighted<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>, n_classes: usize) -> TensorResult<f64> {
    let n = check_lengths(y_true, y_pred)?;
    let mut support = vec![0usize; n_classes];
    for &t in y_true.data() {
        if let Some(s) = support.get_mut(label(t)) {
            *s += 1;
        }
    }
    let mut total = 0.0;
    for (class, &s) in support.iter().enumerate() {
        if s > 0 {
            total += s as f64 * f1_score_class(y_true, y_pred, class)?;
        }
    }
    Ok(total / n as f64)
}

/// Average precision (area under the precision-recall curve, step-wise)
/// of `scores` ranking label-1 rows ahead of label-0 rows.
///
/// `AP = Σ (R_k − R_{k−1}) · P_k` over distinct score thresholds, highest
/// first. Returns 0.0 when `y_true` has no positive rows.
pub fn average_precision<T: Float>(y_true: &Tensor<T>, scores: &Tensor<T>) -> TensorResult<f64> {
    check_lengths(y_true, scores)?;
    if let Some((row, _)) = scores.first_non_finite() {
        return Err(TensorError::NonFinite { row, col: 0 });
    }
    let total_pos = y_true.data().iter().filter(|&&t| label(t) == 1).count();
    if total_pos == 0 {
        return Ok(0.0);
    }

    let mut ranked: Vec<(f64, bool)> = scores
        .data()
        .iter()
        .zip(y_true.data())
        .map(|(&s, &t)| (s.to_f64(), label(t) == 1))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut ap = 0.0;
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut i = 0;
    while i < ranked.len() {
        // rows sharing a score enter the curve together
        let score = ranked[i].0;
        while i < ranked.len() && ranked[i].0 == score {
            if ranked[i].1 {
                tp += 1;
            }
            seen += 1;
            i += 1;
        }
        let recall = ratio(tp, total_pos);
        ap += (recall - prev_recall) * ratio(tp, seen);
        prev_recall = recall;
    }
    Ok(ap)
}
