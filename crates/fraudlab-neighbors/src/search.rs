use fraudlab_core::error::TensorResult;
use fraudlab_core::{Float, Tensor, TensorError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Distance metric for neighbor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    /// Distance between two equal-length rows. Euclidean returns the
    /// squared distance, which orders neighbors identically.
    pub fn rank_distance<T: Float>(self, a: &[T], b: &[T]) -> T {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(&x, &y)| (x - y).abs()).sum(),
        }
    }
}

fn by_distance_then_index<T: Float>(a: &(T, usize), b: &(T, usize)) -> Ordering {
    a.0.to_f64()
        .total_cmp(&b.0.to_f64())
        .then_with(|| a.1.cmp(&b.1))
}

/// Brute-force k-nearest-neighbor index over the rows of a matrix.
///
/// Ties on distance are broken by the lower row index so results are
/// fully deterministic.
#[derive(Debug, Clone)]
pub struct NearestNeighbors<T: Float> {
    pub metric: DistanceMetric,
    points: Option<Tensor<T>>,
}

impl<T: Float> NearestNeighbors<T> {
    pub fn new(metric: DistanceMetric) -> Self {
        NearestNeighbors {
            metric,
            points: None,
        }
    }

    pub fn fit(&mut self, x: &Tensor<T>) -> TensorResult<()> {
        x.ncols()?;
        self.points = Some(x.clone());
        Ok(())
    }

    pub fn n_points(&self) -> usize {
        self.points
            .as_ref()
            .and_then(|p| p.nrows().ok())
            .unwrap_or(0)
    }

    /// The `k` indexed points closest to `query`, nearest first, as
    /// `(index, rank_distance)`. `exclude` drops one index from the
    /// candidates (the query point itself when searching the index).
    pub fn kneighbors(&self, query: &[T], k: usize, exclude: Option<usize>) -> TensorResult<Vec<(usize, T)>> {
        let points = self.points.as_ref().ok_or(TensorError::NotFitted)?;
        let p = points.ncols()?;
        if query.len() != p {
            return Err(TensorError::DimensionMismatch(format!(
                "query has {} features, index has {}",
                query.len(),
                p
            )));
        }

        let mut dists: Vec<(T, usize)> = points
            .rows()?
            .enumerate()
            .filter(|(j, _)| Some(*j) != exclude)
            .map(|(j, row)| (self.metric.rank_distance(query, row), j))
            .collect();

        let k = k.min(dists.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < dists.len() {
            dists.select_nth_unstable_by(k - 1, by_distance_then_index);
            dists.truncate(k);
        }
        dists.sort_by(by_distance_then_index);
        Ok(dists.into_iter().map(|(d, j)| (j, d)).collect())
    }

    /// For every indexed point, the indices of its `k` nearest other points.
    pub fn kneighbors_graph(&self, k: usize) -> TensorResult<Vec<Vec<usize>>> {
        let points = self.points.as_ref().ok_or(TensorError::NotFitted)?;
        points
            .rows()?
            .enumerate()
            .map(|(i, row)| {
                self.kneighbors(row, k, Some(i))
                    .map(|nn| nn.into_iter().map(|(j, _)| j).collect())
            })
            .collect()
    }
}
