use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_features, validate_predict_input};
use fraudlab_core::{Float, Tensor, TensorError, Transformer};

/// Percentile `q` (in `[0, 1]`) of sorted values, linearly interpolated
/// between the two nearest order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Scale features with statistics that are robust to outliers.
///
/// Each column is centered on its median and divided by its interquartile
/// range (q75 - q25). A column with zero IQR is only centered.
pub struct RobustScaler<T: Float> {
    pub center: Option<Tensor<T>>,
    pub scale: Option<Tensor<T>>,
}

impl<T: Float> RobustScaler<T> {
    pub fn new() -> Self {
        RobustScaler {
            center: None,
            scale: None,
        }
    }

    pub fn fit(&mut self, x: &Tensor<T>) -> TensorResult<()> {
        let (_, p) = validate_features(x)?;
        let mut center = Vec::with_capacity(p);
        let mut scale = Vec::with_capacity(p);
        for j in 0..p {
            let mut values: Vec<f64> = x.col(j)?.data().iter().map(|v| v.to_f64()).collect();
            values.sort_by(f64::total_cmp);
            let iqr = percentile(&values, 0.75) - percentile(&values, 0.25);
            center.push(T::from_f64(percentile(&values, 0.5)));
            scale.push(if iqr.abs() < f64::EPSILON { T::ONE } else { T::from_f64(iqr) });
        }
        self.center = Some(Tensor::from_slice(&center));
        self.scale = Some(Tensor::from_slice(&scale));
        Ok(())
    }

    pub fn transform(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let center = self.center.as_ref().ok_or(TensorError::NotFitted)?;
        let scale = self.scale.as_ref().ok_or(TensorError::NotFitted)?;
        let n = validate_predict_input(x, center.numel())?;

        let mut out = Vec::with_capacity(x.numel());
        for row in x.rows()? {
            for ((&v, &c), &s) in row.iter().zip(center.data()).zip(scale.data()) {
                out.push((v - c) / s);
            }
        }
        Tensor::new(out, vec![n, center.numel()])
    }

    pub fn fit_transform(&mut self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.fit(x)?;
        self.transform(x)
    }
}

impl<T: Float> Default for RobustScaler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for RobustScaler<f64> {
    fn fit(&mut self, x: &Tensor<f64>) -> TensorResult<()> {
        RobustScaler::fit(self, x)
    }

    fn transform(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        RobustScaler::transform(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_percentile_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(percentile(&v, 0.5), 2.5);
        assert_abs_diff_eq!(percentile(&v, 0.25), 1.75);
        assert_abs_diff_eq!(percentile(&v, 0.75), 3.25);
        assert_abs_diff_eq!(percentile(&[7.0], 0.9), 7.0);
    }

    #[test]
    fn test_robust_scaler() {
        let x: Tensor<f64> = Tensor::from_vec2d(&[
            vec![1.0, 10.0],
            vec![2.0, 10.0],
            vec![3.0, 10.0],
            vec![4.0, 10.0],
            vec![100.0, 10.0],
        ]).unwrap();
        let mut scaler = RobustScaler::new();
        let z = scaler.fit_transform(&x).unwrap();

        // median 3, IQR 4 - 2
        assert_abs_diff_eq!(z.get(&[0, 0]).unwrap(), -1.0);
        assert_abs_diff_eq!(z.get(&[2, 0]).unwrap(), 0.0);
        assert_abs_diff_eq!(z.get(&[4, 0]).unwrap(), 48.5);
        // constant column: centered, scale 1
        assert_abs_diff_eq!(z.get(&[3, 1]).unwrap(), 0.0);
        assert_eq!(scaler.scale.unwrap().data()[1], 1.0);
    }

    #[test]
    fn test_unfitted_and_width() {
        let scaler: RobustScaler<f64> = RobustScaler::new();
        let x = Tensor::from_vec2d(&[vec![1.0, 2.0]]).unwrap();
        assert_eq!(scaler.transform(&x), Err(TensorError::NotFitted));

        let mut scaler = RobustScaler::new();
        scaler.fit(&x).unwrap();
        let narrow = Tensor::from_vec2d(&[vec![1.0]]).unwrap();
        assert!(scaler.transform(&narrow).is_err());
    }
}
