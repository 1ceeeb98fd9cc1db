//! Row-major dense feature matrix

use serde::{Deserialize, Serialize};

/// Dense `f64` matrix stored row by row.
///
/// Row `i` occupies `data[i * n_cols..(i + 1) * n_cols]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl DenseMatrix {
    /// Build from a row-major buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != n_rows * n_cols`.
    #[must_use]
    pub fn from_row_major(data: Vec<f64>, n_rows: usize, n_cols: usize) -> Self {
        assert_eq!(data.len(), n_rows * n_cols, "buffer does not match shape");
        Self {
            data,
            n_rows,
            n_cols,
        }
    }

    /// Interleave equally long columns into rows.
    #[must_use]
    pub fn from_columns(n_rows: usize, columns: &[Vec<f64>]) -> Self {
        let n_cols = columns.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in 0..n_rows {
            for col in columns {
                data.push(col[row]);
            }
        }
        Self::from_row_major(data, n_rows, n_cols)
    }

    /// Number of rows
    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns
    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// One row as a slice
    #[must_use]
    pub fn row(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.n_cols..(idx + 1) * self.n_cols]
    }

    /// Iterate rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Single value
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    /// Copy of one column
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows).map(|row| self.get(row, col)).collect()
    }

    /// Mutable access to the row-major buffer
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}
