use fraudlab_core::error::TensorResult;
use fraudlab_core::estimator::{validate_features, validate_predict_input};
use fraudlab_core::{Float, Tensor, TensorError, Transformer};

const MAX_ITER: usize = 1000;
const CONVERGENCE_TOL: f64 = 1e-12;

/// Principal Component Analysis (PCA).
///
/// Projects mean-centered data onto the top-k eigenvectors of the sample
/// covariance matrix (`n - 1` denominator). Eigenvectors come from power
/// iteration with deflation (pure Rust, no external BLAS). Each component
/// is signed so that its largest-magnitude loading is positive.
pub struct PCA<T: Float> {
    pub n_components: usize,
    pub components: Option<Tensor<T>>, // [n_components, n_features]
    pub explained_variance: Option<Vec<f64>>,
    pub mean: Option<Tensor<T>>,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

/// Remove the projections of `v` onto every vector in `basis`.
fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let proj = dot(v, b);
        for (x, &bj) in v.iter_mut().zip(b) {
            *x -= proj * bj;
        }
    }
}

/// A unit starting vector orthogonal to the components found so far.
fn start_vector(p: usize, found: &[Vec<f64>]) -> Vec<f64> {
    let mut v: Vec<f64> = (0..p).map(|i| (i as f64 + 1.0).sin()).collect();
    orthogonalize(&mut v, found);
    if normalize(&mut v) > 1e-8 {
        return v;
    }
    for j in 0..p {
        let mut e = vec![0.0; p];
        e[j] = 1.0;
        orthogonalize(&mut e, found);
        if normalize(&mut e) > 1e-8 {
            return e;
        }
    }
    v
}

fn mat_vec(m: &[f64], v: &[f64]) -> Vec<f64> {
    let p = v.len();
    (0..p).map(|i| dot(&m[i * p..(i + 1) * p], v)).collect()
}

impl<T: Float> PCA<T> {
    pub fn new(n_components: usize) -> Self {
        PCA {
            n_components,
            components: None,
            explained_variance: None,
            mean: None,
        }
    }

    pub fn fit(&mut self, x: &Tensor<T>) -> TensorResult<()> {
        if self.n_components == 0 {
            return Err(TensorError::InvalidOperation(
                "n_components must be at least 1".into(),
            ));
        }
        let (n, p) = validate_features(x)?;
        let k = self.n_components.min(p);

        // 1. Center the data
        let mean = x.mean_axis(0)?;
        let centered: Vec<Vec<f64>> = x
            .rows()?
            .map(|row| {
                row.iter()
                    .zip(mean.data())
                    .map(|(&v, &m)| (v - m).to_f64())
                    .collect()
            })
            .collect();

        // 2. Sample covariance C = XᵀX / (n - 1)
        let denom = n.saturating_sub(1).max(1) as f64;
        let mut cov = vec![0.0; p * p];
        for row in &centered {
            for i in 0..p {
                for j in i..p {
                    cov[i * p + j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in i..p {
                cov[i * p + j] /= denom;
                cov[j * p + i] = cov[i * p + j];
            }
        }

        // 3. Power iteration on the deflated matrix
        let mut deflated = cov.clone();
        let mut found: Vec<Vec<f64>> = Vec::with_capacity(k);
        let mut eigenvalues = Vec::with_capacity(k);

        for _ in 0..k {
            let mut v = start_vector(p, &found);
            for _ in 0..MAX_ITER {
                let mut w = mat_vec(&deflated, &v);
                orthogonalize(&mut w, &found);
                if normalize(&mut w) < CONVERGENCE_TOL {
                    // no variance left outside the found subspace
                    break;
                }
                let delta: f64 = w.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
                v = w;
                if delta < CONVERGENCE_TOL {
                    break;
                }
            }

            // Sign: largest-magnitude loading positive
            let mut pivot = 0;
            for j in 1..p {
                if v[j].abs() > v[pivot].abs() {
                    pivot = j;
                }
            }
            if v[pivot] < 0.0 {
                for x in v.iter_mut() {
                    *x = -*x;
                }
            }

            let lambda = dot(&v, &mat_vec(&cov, &v)).max(0.0);
            for i in 0..p {
                for j in 0..p {
                    deflated[i * p + j] -= lambda * v[i] * v[j];
                }
            }
            eigenvalues.push(lambda);
            found.push(v);
        }

        let components_data: Vec<T> = found.iter().flatten().map(|&v| T::from_f64(v)).collect();
        self.components = Some(Tensor::new(components_data, vec![k, p])?);
        self.explained_variance = Some(eigenvalues);
        self.mean = Some(mean);
        Ok(())
    }

    /// Project rows onto the fitted components: `[n, p] -> [n, k]`.
    pub fn transform(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let mean = self.mean.as_ref().ok_or(TensorError::NotFitted)?;
        let components = self.components.as_ref().ok_or(TensorError::NotFitted)?;
        let p = mean.numel();
        let n = validate_predict_input(x, p)?;

        let mut centered = Vec::with_capacity(n * p);
        for row in x.rows()? {
            for (&v, &m) in row.iter().zip(mean.data()) {
                centered.push(v - m);
            }
        }
        let centered = Tensor::new(centered, vec![n, p])?;

        // X_new = X_centered @ componentsᵀ
        centered.matmul(&components.t()?)
    }

    pub fn fit_transform(&mut self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Explained variance ratio of each component relative to the
    /// variance captured by all fitted components.
    pub fn explained_variance_ratio(&self) -> Option<Vec<f64>> {
        self.explained_variance.as_ref().map(|ev| {
            let total: f64 = ev.iter().sum();
            if total > 0.0 {
                ev.iter().map(|&v| v / total).collect()
            } else {
                vec![0.0; ev.len()]
            }
        })
    }
}

impl Transformer for PCA<f64> {
    fn fit(&mut self, x: &Tensor<f64>) -> TensorResult<()> {
        PCA::fit(self, x)
    }

    fn transform(&self, x: &Tensor<f64>) -> TensorResult<Tensor<f64>> {
        PCA::transform(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn correlated() -> Tensor<f64> {
        Tensor::from_vec2d(&[
            vec![2.5, 2.4],
            vec![0.5, 0.7],
            vec![2.2, 2.9],
            vec![1.9, 2.2],
            vec![3.1, 3.0],
            vec![2.3, 2.7],
            vec![2.0, 1.6],
            vec![1.0, 1.1],
            vec![1.5, 1.6],
            vec![1.1, 0.9],
        ]).unwrap()
    }

    #[test]
    fn test_pca() {
        let x = correlated();
        let mut pca = PCA::new(2);
        let projected = pca.fit_transform(&x).unwrap();
        assert_eq!(projected.shape_vec(), vec![10, 2]);

        let ev = pca.explained_variance.as_ref().unwrap();
        assert_abs_diff_eq!(ev[0], 1.28402771, epsilon = 1e-6);
        assert_abs_diff_eq!(ev[1], 0.0490833989, epsilon = 1e-6);

        let comps = pca.components.as_ref().unwrap();
        assert_abs_diff_eq!(comps.get(&[0, 0]).unwrap(), 0.6778734, epsilon = 1e-5);
        assert_abs_diff_eq!(comps.get(&[0, 1]).unwrap(), 0.7351787, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_centered_and_uncorrelated() {
        let x = correlated();
        let mut pca = PCA::new(2);
        let z = pca.fit_transform(&x).unwrap();
        let mean = z.mean_axis(0).unwrap();
        assert_abs_diff_eq!(mean.data()[0], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(mean.data()[1], 0.0, epsilon = 1e-10);
        let cross: f64 = z.rows().unwrap().map(|r| r[0] * r[1]).sum();
        assert_abs_diff_eq!(cross, 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_sign_convention() {
        // anti-correlated columns: the dominant loading must come out positive
        let x = Tensor::from_vec2d(&[
            vec![1.0, -1.0], vec![2.0, -2.1], vec![3.0, -2.9], vec![4.0, -4.2],
        ]).unwrap();
        let mut pca = PCA::new(2);
        pca.fit(&x).unwrap();
        let comps = pca.components.unwrap();
        for c in 0..2 {
            let row = comps.row(c).unwrap();
            let pivot = if row[0].abs() >= row[1].abs() { row[0] } else { row[1] };
            assert!(pivot > 0.0);
        }
    }

    #[test]
    fn test_degenerate_column() {
        let x = Tensor::from_vec2d(&[vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]]).unwrap();
        let mut pca = PCA::new(2);
        let z = pca.fit_transform(&x).unwrap();
        assert!(z.first_non_finite().is_none());
        let ev = pca.explained_variance.unwrap();
        assert_abs_diff_eq!(ev[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ev[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_errors() {
        let mut pca: PCA<f64> = PCA::new(2);
        let x = correlated();
        assert_eq!(pca.transform(&x), Err(TensorError::NotFitted));
        let empty: Tensor<f64> = Tensor::zeros(vec![0, 2]);
        assert_eq!(pca.fit(&empty), Err(TensorError::EmptyTensor));
    }
}
