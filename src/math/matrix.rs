use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

/// Dense row-major matrix. RBM weights are stored as (visible × hidden).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix{
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix{
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix{
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    /// Samples every entry from N(0, std_dev²).
    pub fn gaussian<R: Rng>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = sample_standard_normal(rng) * std_dev;
            }
        }
        res
    }

    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let cols = data.first().map_or(0, |row| row.len());
        Matrix {
            rows: data.len(),
            cols,
            data
        }
    }

    /// Row vector times matrix: `v · W`, one value per column.
    pub fn vec_mul(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.rows, "vector length must match the row count");
        let mut res = vec![0.0; self.cols];
        for (row, &x) in self.data.iter().zip(v) {
            if x == 0.0 {
                continue;
            }
            for (acc, &w) in res.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        res
    }

    /// Matrix times column vector: `W · h`, one value per row.
    pub fn mul_vec(&self, h: &[f64]) -> Vec<f64> {
        assert_eq!(h.len(), self.cols, "vector length must match the column count");
        self.data.iter()
            .map(|row| row.iter().zip(h).map(|(w, x)| w * x).sum())
            .collect()
    }

    /// Accumulates `scale * left ⊗ right` in place.
    pub fn add_outer(&mut self, left: &[f64], right: &[f64], scale: f64) {
        debug_assert_eq!(left.len(), self.rows);
        debug_assert_eq!(right.len(), self.cols);
        for (row, &l) in self.data.iter_mut().zip(left) {
            let l = l * scale;
            for (x, &r) in row.iter_mut().zip(right) {
                *x += l * r;
            }
        }
    }

    /// Combines two same-shape matrices entry by entry, writing into `self`.
    pub fn zip_apply<F>(&mut self, other: &Matrix, functor: F)
    where
        F: Fn(f64, f64) -> f64,
    {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "Matrices are of incorrect sizes"
        );
        for (row, other_row) in self.data.iter_mut().zip(&other.data) {
            for (x, &y) in row.iter_mut().zip(other_row) {
                *x = functor(*x, y);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major iteration over every entry.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.data.iter_mut().flatten()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
pub fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // Both uniforms live in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
