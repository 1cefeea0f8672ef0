use super::Matrix;
use crate::prelude::*;
use std::ops::{Add, AddAssign, Mul, Sub};

pub trait Dot<I> {
    type Output;
    fn dot(self, rhs: I) -> Result<Self::Output>;
}

pub trait Transpose {
    fn transpose(&self) -> Self;
}

impl<T: Default + Copy> Transpose for Matrix<T> {
    fn transpose(&self) -> Self {
        let mut transposed = Matrix::new(self.cols(), self.rows());

        for row in 0..self.rows() {
            for col in 0..self.cols() {
                transposed[(col, row)] = self[(row, col)];
            }
        }
        transposed
    }
}

impl<'a, T> Dot<&Matrix<T>> for &'a Matrix<T>
where
    T: Mul<Output = T> + Default + AddAssign + Copy,
{
    type Output = Matrix<T>;
    fn dot(self, rhs: &Matrix<T>) -> Result<Self::Output> {
        if self.cols() != rhs.rows() {
            return Err(Error::DimensionErr);
        }

        let mut data = Vec::with_capacity(self.rows() * rhs.cols());

        for lhs_row in 0..self.rows() {
            for rhs_col in 0..rhs.cols() {
                let mut sum = T::default();
                for n in 0..self.cols() {
                    sum += self[(lhs_row, n)] * rhs[(n, rhs_col)]
                }
                data.push(sum);
            }
        }

        Ok(Matrix {
            data,
            dim: (self.rows(), rhs.cols()),
        })
    }
}

/// Matrix product as an operator; same contract as [`Dot::dot`].
impl<'a, T> Mul for &'a Matrix<T>
where
    T: Mul<Output = T> + Default + AddAssign + Copy,
{
    type Output = Result<Matrix<T>>;
    fn mul(self, rhs: Self) -> Self::Output {
        self.dot(rhs)
    }
}

/// Adds two matrices element-wise.
impl<'a, T> Add for &'a Matrix<T>
where
    &'a T: Add<Output = T>,
{
    type Output = Result<Matrix<T>>;
    fn add(self, rhs: Self) -> Self::Output {
        if self.dim != rhs.dim {
            return Err(Error::DimensionErr);
        }

        let mut data = Vec::with_capacity(self.rows() * self.cols());
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                data.push(&self[(row, col)] + &rhs[(row, col)])
            }
        }

        Ok(Matrix {
            data,
            dim: self.dim,
        })
    }
}

/// Subs two matrices element-wise.
impl<'a, T> Sub for &'a Matrix<T>
where
    &'a T: Sub<Output = T>,
{
    type Output = Result<Matrix<T>>;
    fn sub(self, rhs: Self) -> Self::Output {
        if self.dim != rhs.dim {
            return Err(Error::DimensionErr);
        }

        let mut data = Vec::with_capacity(self.rows() * self.cols());
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                data.push(&self[(row, col)] - &rhs[(row, col)])
            }
        }

        Ok(Matrix {
            data,
            dim: self.dim,
        })
    }
}

impl<T> Matrix<T>
where
    T: Mul<Output = T> + Copy,
{
    /// Element-wise product in place; shapes must match exactly.
    pub fn hadamard(&mut self, other: &Matrix<T>) -> Result<()> {
        if self.dim != other.dim {
            return Err(Error::DimensionErr);
        }

        for row in 0..self.rows() {
            for col in 0..self.cols() {
                self[(row, col)] = self[(row, col)] * other[(row, col)];
            }
        }
        Ok(())
    }
}

impl<T: Clone> Matrix<T> {
    /// Copy of the half-open column range `[begin, end)`.
    pub fn select_columns(&self, begin: usize, end: usize) -> Result<Matrix<T>> {
        if begin > end || end > self.cols() {
            return Err(Error::DimensionErr);
        }

        let mut data = Vec::with_capacity(self.rows() * (end - begin));
        for row in 0..self.rows() {
            for col in begin..end {
                data.push(self[(row, col)].clone());
            }
        }

        Ok(Matrix {
            data,
            dim: (self.rows(), end - begin),
        })
    }

    /// Vertical concatenation; column counts must agree.
    pub fn combine_rows(top: &Matrix<T>, bottom: &Matrix<T>) -> Result<Matrix<T>> {
        if top.cols() != bottom.cols() {
            return Err(Error::DimensionErr);
        }

        let mut data = Vec::with_capacity((top.rows() + bottom.rows()) * top.cols());
        data.extend(top.data.iter().cloned());
        data.extend(bottom.data.iter().cloned());

        Ok(Matrix {
            data,
            dim: (top.rows() + bottom.rows(), top.cols()),
        })
    }

    /// Horizontal concatenation; row counts must agree.
    pub fn combine_columns(left: &Matrix<T>, right: &Matrix<T>) -> Result<Matrix<T>> {
        if left.rows() != right.rows() {
            return Err(Error::DimensionErr);
        }

        let mut data = Vec::with_capacity(left.rows() * (left.cols() + right.cols()));
        for row in 0..left.rows() {
            for col in 0..left.cols() {
                data.push(left[(row, col)].clone());
            }
            for col in 0..right.cols() {
                data.push(right[(row, col)].clone());
            }
        }

        Ok(Matrix {
            data,
            dim: (left.rows(), left.cols() + right.cols()),
        })
    }
}
