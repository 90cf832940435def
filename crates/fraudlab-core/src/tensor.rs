use crate::dtype::Float;
use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense numeric storage for feature matrices and label vectors.
///
/// Data lives in a flat contiguous `Vec<T>` in row-major order. A feature
/// matrix has shape `[n_samples, n_features]`; a label vector has shape
/// `[n_samples]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> TensorResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![T::ZERO; s.numel()],
            shape: s,
        }
    }

    /// Create a 1-D tensor from a slice.
    pub fn from_slice(data: &[T]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: Shape::vector(data.len()),
        }
    }

    /// Create a 2-D tensor from a nested slice.
    pub fn from_vec2d(data: &[Vec<T>]) -> TensorResult<Self> {
        if data.is_empty() {
            return Ok(Tensor::zeros(vec![0, 0]));
        }
        let rows = data.len();
        let cols = data[0].len();
        if let Some(bad) = data.iter().find(|r| r.len() != cols) {
            return Err(TensorError::ShapeMismatch {
                expected: vec![cols],
                got: vec![bad.len()],
            });
        }
        let flat: Vec<T> = data.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::new(flat, vec![rows, cols])
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn require_matrix(&self, op: &str) -> TensorResult<(usize, usize)> {
        match self.shape.dims() {
            [rows, cols] => Ok((*rows, *cols)),
            _ => Err(TensorError::InvalidOperation(format!(
                "{}() requires a 2D tensor, got shape {}",
                op, self.shape
            ))),
        }
    }

    /// Number of rows of a matrix, or the length of a vector.
    pub fn nrows(&self) -> TensorResult<usize> {
        self.shape.dim(0)
    }

    /// Number of columns of a matrix.
    pub fn ncols(&self) -> TensorResult<usize> {
        self.require_matrix("ncols").map(|(_, c)| c)
    }

    fn offset(&self, indices: &[usize]) -> TensorResult<usize> {
        let dims = self.shape.dims();
        if indices.len() != dims.len() {
            return Err(TensorError::DimensionMismatch(format!(
                "expected {} indices, got {}",
                dims.len(),
                indices.len()
            )));
        }
        let mut offset = 0;
        for (axis, (&idx, &size)) in indices.iter().zip(dims.iter()).enumerate() {
            if idx >= size {
                return Err(TensorError::IndexOutOfBounds {
                    index: idx,
                    axis,
                    size,
                });
            }
            offset = offset * size + idx;
        }
        Ok(offset)
    }

    /// Get element at multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> TensorResult<T> {
        Ok(self.data[self.offset(indices)?])
    }

    /// Set element at multi-dimensional index.
    pub fn set(&mut self, indices: &[usize], value: T) -> TensorResult<()> {
        let offset = self.offset(indices)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Borrow row `i` of a matrix.
    pub fn row(&self, i: usize) -> TensorResult<&[T]> {
        let (rows, cols) = self.require_matrix("row")?;
        if i >= rows {
            return Err(TensorError::IndexOutOfBounds {
                index: i,
                axis: 0,
                size: rows,
            });
        }
        Ok(&self.data[i * cols..(i + 1) * cols])
    }

    /// Iterate over the rows of a matrix.
    pub fn rows(&self) -> TensorResult<impl Iterator<Item = &[T]> + '_> {
        let (rows, cols) = self.require_matrix("rows")?;
        Ok((0..rows).map(move |i| &self.data[i * cols..(i + 1) * cols]))
    }

    /// Copy column `j` of a matrix into a 1-D tensor.
    pub fn col(&self, j: usize) -> TensorResult<Tensor<T>> {
        let (rows, cols) = self.require_matrix("col")?;
        if j >= cols {
            return Err(TensorError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: cols,
            });
        }
        let data: Vec<T> = (0..rows).map(|i| self.data[i * cols + j]).collect();
        Ok(Tensor::from_slice(&data))
    }

    /// Overwrite column `j` of a matrix with the values of `values`.
    pub fn set_col(&mut self, j: usize, values: &[T]) -> TensorResult<()> {
        let (rows, cols) = self.require_matrix("set_col")?;
        if j >= cols {
            return Err(TensorError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: cols,
            });
        }
        if values.len() != rows {
            return Err(TensorError::ShapeMismatch {
                expected: vec![rows],
                got: vec![values.len()],
            });
        }
        for (i, &v) in values.iter().enumerate() {
            self.data[i * cols + j] = v;
        }
        Ok(())
    }

    // ─── Selection & Stacking ───────────────────────────────────────────────

    /// Gather rows (matrix) or elements (vector) in the order given.
    pub fn select_rows(&self, indices: &[usize]) -> TensorResult<Tensor<T>> {
        let rows = self.nrows()?;
        let width = if self.ndim() == 1 { 1 } else { self.ncols()? };
        let mut data = Vec::with_capacity(indices.len() * width);
        for &i in indices {
            if i >= rows {
                return Err(TensorError::IndexOutOfBounds {
                    index: i,
                    axis: 0,
                    size: rows,
                });
            }
            data.extend_from_slice(&self.data[i * width..(i + 1) * width]);
        }
        let mut shape = self.shape_vec();
        shape[0] = indices.len();
        Tensor::new(data, shape)
    }

    /// Gather columns of a matrix in the order given.
    pub fn select_cols(&self, indices: &[usize]) -> TensorResult<Tensor<T>> {
        let (rows, cols) = self.require_matrix("select_cols")?;
        if let Some(&bad) = indices.iter().find(|&&j| j >= cols) {
            return Err(TensorError::IndexOutOfBounds {
                index: bad,
                axis: 1,
                size: cols,
            });
        }
        let mut data = Vec::with_capacity(rows * indices.len());
        for i in 0..rows {
            for &j in indices {
                data.push(self.data[i * cols + j]);
            }
        }
        Tensor::new(data, vec![rows, indices.len()])
    }

    /// Append the rows of `other` below `self`. Vectors are concatenated.
    pub fn vstack(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        if self.ndim() == 0
            || self.ndim() != other.ndim()
            || self.shape.dims()[1..] != other.shape.dims()[1..]
        {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape_vec(),
                got: other.shape_vec(),
            });
        }
        let mut data = Vec::with_capacity(self.numel() + other.numel());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        let mut shape = self.shape_vec();
        shape[0] += other.shape.dims()[0];
        Tensor::new(data, shape)
    }

    // ─── Linear Algebra ─────────────────────────────────────────────────────

    /// Transpose a matrix.
    pub fn t(&self) -> TensorResult<Tensor<T>> {
        let (rows, cols) = self.require_matrix("t")?;
        let mut data = vec![T::ZERO; self.numel()];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = self.data[i * cols + j];
            }
        }
        Ok(Tensor {
            data,
            shape: self.shape.transposed()?,
        })
    }

    /// Matrix multiply of two 2D tensors.
    pub fn matmul(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let (m, k) = self.require_matrix("matmul")?;
        let (k2, n) = other.require_matrix("matmul")?;
        if k != k2 {
            return Err(TensorError::DimensionMismatch(format!(
                "matmul: inner dimensions must match, got {} and {}",
                k, k2
            )));
        }
        let mut data = vec![T::ZERO; m * n];
        for i in 0..m {
            for p in 0..k {
                let a = self.data[i * k + p];
                for j in 0..n {
                    data[i * n + j] += a * other.data[p * n + j];
                }
            }
        }
        Tensor::new(data, vec![m, n])
    }

    // ─── Reductions ─────────────────────────────────────────────────────────

    /// Column means of a matrix (axis 0) or row means (axis 1).
    pub fn mean_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        let (rows, cols) = self.require_matrix("mean_axis")?;
        match axis {
            0 => {
                if rows == 0 {
                    return Err(TensorError::EmptyTensor);
                }
                let mut sums = vec![T::ZERO; cols];
                for row in self.data.chunks_exact(cols.max(1)) {
                    for (s, &v) in sums.iter_mut().zip(row) {
                        *s += v;
                    }
                }
                let n = T::from_usize(rows);
                Ok(Tensor::from_slice(
                    &sums.into_iter().map(|s| s / n).collect::<Vec<_>>(),
                ))
            }
            1 => {
                if cols == 0 {
                    return Err(TensorError::EmptyTensor);
                }
                let n = T::from_usize(cols);
                let means: Vec<T> = (0..rows)
                    .map(|i| self.data[i * cols..(i + 1) * cols].iter().copied().sum::<T>() / n)
                    .collect();
                Ok(Tensor::from_slice(&means))
            }
            _ => Err(TensorError::InvalidAxis { axis, ndim: 2 }),
        }
    }

    // ─── Element-wise ───────────────────────────────────────────────────────

    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> Tensor<T> {
        Tensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Position of the first NaN or infinite value as `(row, col)`.
    /// Vectors report column 0.
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        let width = match self.shape.dims() {
            [_, cols] => (*cols).max(1),
            _ => 1,
        };
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|pos| (pos / width, pos % width))
    }
}

impl<T: Float> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data == other.data
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl<T: Float> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape.dims() {
            [_, cols] if *cols > 0 => {
                writeln!(f, "tensor([")?;
                for row in self.data.chunks_exact(*cols) {
                    let cells: Vec<String> = row.iter().map(|v| format!("{:.4}", v)).collect();
                    writeln!(f, "  [{}],", cells.join(", "))?;
                }
                write!(f, "], shape={})", self.shape)
            }
            _ => {
                let cells: Vec<String> = self.data.iter().map(|v| format!("{:.4}", v)).collect();
                write!(f, "tensor([{}], shape={})", cells.join(", "), self.shape)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Tensor<f64> {
        Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap()
    }

    #[test]
    fn test_creation() {
        let t: Tensor<f64> = Tensor::zeros(vec![2, 3]);
        assert_eq!(t.shape_vec(), vec![2, 3]);
        assert!(Tensor::<f64>::new(vec![1.0, 2.0], vec![3]).is_err());
        assert!(Tensor::<f64>::from_vec2d(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_row_col_access() {
        let t = sample();
        assert_eq!(t.row(1).unwrap(), &[3.0, 4.0]);
        assert_eq!(t.col(1).unwrap().data(), &[2.0, 4.0, 6.0]);
        assert!(t.row(3).is_err());
        assert_eq!(t.get(&[2, 0]).unwrap(), 5.0);
    }

    #[test]
    fn test_set_col() {
        let mut t = sample();
        t.set_col(0, &[9.0, 8.0, 7.0]).unwrap();
        assert_eq!(t.data(), &[9.0, 2.0, 8.0, 4.0, 7.0, 6.0]);
        assert!(t.set_col(0, &[1.0]).is_err());
    }

    #[test]
    fn test_select_and_stack() {
        let t = sample();
        let picked = t.select_rows(&[2, 0]).unwrap();
        assert_eq!(picked.data(), &[5.0, 6.0, 1.0, 2.0]);

        let stacked = picked.vstack(&t).unwrap();
        assert_eq!(stacked.shape_vec(), vec![5, 2]);

        let labels = Tensor::from_slice(&[0.0, 1.0, 1.0]);
        assert_eq!(labels.select_rows(&[1, 0]).unwrap().data(), &[1.0, 0.0]);

        let second = t.select_cols(&[1]).unwrap();
        assert_eq!(second.data(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_matmul_and_transpose() {
        let t = sample();
        let gram = t.t().unwrap().matmul(&t).unwrap();
        assert_eq!(gram.shape_vec(), vec![2, 2]);
        assert_eq!(gram.data(), &[35.0, 44.0, 44.0, 56.0]);
    }

    #[test]
    fn test_mean_axis() {
        let t = sample();
        let cols = t.mean_axis(0).unwrap();
        for (got, want) in cols.data().iter().zip([3.0, 4.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        let rows = t.mean_axis(1).unwrap();
        for (got, want) in rows.data().iter().zip([1.5, 3.5, 5.5]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_first_non_finite() {
        let mut t = sample();
        assert_eq!(t.first_non_finite(), None);
        t.set(&[2, 1], f64::NAN).unwrap();
        assert_eq!(t.first_non_finite(), Some((2, 1)));
    }
}
