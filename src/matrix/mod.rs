use crate::prelude::*;
use std::ops::{Index, IndexMut, RangeInclusive};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

pub mod ops;

const CELL_BYTES: usize = std::mem::size_of::<f64>();

/// Dense row-major matrix.
#[derive(Debug, PartialEq, Clone)]
pub struct Matrix<T> {
    data: Vec<T>,
    dim: (usize, usize),
}

impl<T: Default + Clone> Matrix<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::default(); rows * cols],
            dim: (rows, cols),
        }
    }
}

impl<T> Matrix<T> {
    pub fn from_array<const R: usize, const C: usize>(arr: [[T; C]; R]) -> Self {
        let mut data = Vec::with_capacity(R * C);

        for row in arr {
            for x in row {
                data.push(x);
            }
        }

        Self { data, dim: (R, C) }
    }

    /// Column vector `(len, 1)` that takes ownership of the buffer.
    pub fn from_column(col: Vec<T>) -> Self {
        Self {
            dim: (col.len(), 1),
            data: col,
        }
    }

    pub fn from_vec(vec: Vec<Vec<T>>) -> Result<Self> {
        let rows = vec.len();
        let cols = vec.first().map(|row| row.len()).unwrap_or(0);

        let mut data = Vec::new();
        for row in vec {
            if cols != row.len() {
                return Err(Error::DimensionErr);
            }

            for x in row {
                data.push(x);
            }
        }

        Ok(Self {
            data,
            dim: (rows, cols),
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn rows(&self) -> usize {
        self.dim.0
    }

    pub fn cols(&self) -> usize {
        self.dim.1
    }

    pub fn to_vec(self) -> Vec<Vec<T>> {
        let cols = self.cols();
        let mut data = self.data;
        let mut res = Vec::with_capacity(self.dim.0);
        while !data.is_empty() {
            res.push(data.drain(..cols).collect());
        }
        res
    }

    /// Applies a function to every element of the matrix
    pub fn apply<F: Fn(T) -> T>(&mut self, f: F)
    where
        T: Default,
    {
        for x in &mut self.data {
            let old = std::mem::take(x);
            let _ = std::mem::replace(x, f(old));
        }
    }

    /// Overwrites every cell with the generator's value for its position.
    pub fn fill<F: FnMut(usize, usize) -> T>(&mut self, mut f: F) {
        let cols = self.cols();
        for (i, x) in self.data.iter_mut().enumerate() {
            *x = f(i / cols, i % cols);
        }
    }
}

impl Matrix<f64> {
    /// Fills with independent draws from a symmetric uniform range.
    pub fn randomize_uniform<R: Rng + ?Sized>(&mut self, rng: &mut R, range: RangeInclusive<f64>) {
        let die = Uniform::from(range);
        self.fill(|_, _| die.sample(rng));
    }

    /// Fills with Gaussian draws scaled by fan-in and fan-out,
    /// `sigma = sqrt(2 / (fan_in + fan_out))`.
    pub fn randomize_xavier<R: Rng + ?Sized>(&mut self, rng: &mut R, fan_in: usize, fan_out: usize) {
        let sigma = (2.0 / (fan_in + fan_out) as f64).sqrt();
        let gauss = Normal::new(0.0, sigma).expect("sigma is positive");
        self.fill(|_, _| gauss.sample(rng));
    }

    /// Flat little-endian doubles in row-major order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * CELL_BYTES);
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Rebuilds a matrix of known shape from [`Matrix::to_bytes`] output.
    /// The buffer must hold exactly `rows * cols` doubles.
    pub fn from_bytes(rows: usize, cols: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != rows * cols * CELL_BYTES {
            return Err(Error::DimensionErr);
        }

        let data = bytes
            .chunks_exact(CELL_BYTES)
            .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("chunk is CELL_BYTES wide")))
            .collect();

        Ok(Self {
            data,
            dim: (rows, cols),
        })
    }

    /// Position and value of the largest cell; ties go to the first
    /// occurrence in row-major order.
    pub fn max_cell(&self) -> (usize, usize, f64) {
        let mut best = (0, 0, f64::NEG_INFINITY);
        for r in 0..self.rows() {
            for c in 0..self.cols() {
                let value = self[(r, c)];
                if value > best.2 {
                    best = (r, c, value);
                }
            }
        }
        best
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        &self.data[i * self.cols() + j]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        let idx = i * self.cols() + j;
        &mut self.data[idx]
    }
}

impl From<Matrix<i32>> for Matrix<f64> {
    fn from(value: Matrix<i32>) -> Self {
        Self {
            dim: value.dim(),
            data: value.data.into_iter().map(|x| x as f64).collect(),
        }
    }
}

/// Read/write view over several matrices' cells as one logical
/// `(total_cells, 1)` column vector.
///
/// Reads and writes delegate to the owning matrix by offset; nothing is
/// copied. Used to address a network's whole parameter set flatly.
pub struct SharedColumn<'a> {
    parts: Vec<&'a mut Matrix<f64>>,
    rows: usize,
}

impl<'a> SharedColumn<'a> {
    pub fn new(parts: Vec<&'a mut Matrix<f64>>) -> Self {
        let rows = parts.iter().map(|m| m.rows() * m.cols()).sum();
        Self { parts, rows }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        1
    }

    fn locate(&self, row: usize) -> Result<(usize, usize, usize)> {
        let mut row = row;
        for (part, m) in self.parts.iter().enumerate() {
            let cells = m.rows() * m.cols();
            if row < cells {
                return Ok((part, row / m.cols(), row % m.cols()));
            }
            row -= cells;
        }
        Err(Error::DimensionErr)
    }

    pub fn get(&self, row: usize) -> Result<f64> {
        let (part, r, c) = self.locate(row)?;
        Ok(self.parts[part][(r, c)])
    }

    pub fn set(&mut self, row: usize, value: f64) -> Result<()> {
        let (part, r, c) = self.locate(row)?;
        self.parts[part][(r, c)] = value;
        Ok(())
    }

    /// Applies a function to every cell of every constituent matrix.
    pub fn apply<F: Fn(f64) -> f64>(&mut self, f: F) {
        for m in &mut self.parts {
            m.apply(&f);
        }
    }

    /// Owned `(rows, 1)` snapshot of the current cell values.
    pub fn to_matrix(&self) -> Matrix<f64> {
        let mut data = Vec::with_capacity(self.rows);
        for m in &self.parts {
            for r in 0..m.rows() {
                for c in 0..m.cols() {
                    data.push(m[(r, c)]);
                }
            }
        }
        Matrix::from_column(data)
    }
}
