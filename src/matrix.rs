//! Small row-major matrix with a compile-time element capacity

use core::ops::{Index, IndexMut};

use heapless::Vec;
use nalgebra::SMatrix;

use crate::error::ParamError;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<const CAP: usize> {
    rows: usize,
    cols: usize,
    data: Vec<f32, CAP>,
}

impl<const CAP: usize> Matrix<CAP> {
    /// Zero-filled `rows x cols` matrix
    pub fn zeros(rows: usize, cols: usize) -> Result<Self, ParamError> {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Result<Self, ParamError> {
        let len = rows.checked_mul(cols).ok_or(ParamError::CapacityExceeded)?;
        if len == 0 {
            return Err(ParamError::EmptyBuffer);
        }
        let mut data = Vec::new();
        data.resize(len, value)
            .map_err(|_| ParamError::CapacityExceeded)?;
        Ok(Self { rows, cols, data })
    }

    pub fn identity(n: usize) -> Result<Self, ParamError> {
        let mut m = Self::zeros(n, n)?;
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        Ok(m)
    }

    /// Builds from row-major values
    pub fn from_slice(rows: usize, cols: usize, values: &[f32]) -> Result<Self, ParamError> {
        let len = rows.checked_mul(cols).ok_or(ParamError::DimensionMismatch)?;
        if len != values.len() {
            return Err(ParamError::DimensionMismatch);
        }
        if values.is_empty() {
            return Err(ParamError::EmptyBuffer);
        }
        let data = Vec::from_slice(values).map_err(|_| ParamError::CapacityExceeded)?;
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn same_shape(&self, other: &Self) -> Result<(), ParamError> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(ParamError::DimensionMismatch);
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self, ParamError> {
        self.same_shape(other)?;
        let mut out = self.clone();
        out.data
            .iter_mut()
            .zip(other.data.iter())
            .for_each(|(a, b)| *a += b);
        Ok(out)
    }

    pub fn sub(&self, other: &Self) -> Result<Self, ParamError> {
        self.same_shape(other)?;
        let mut out = self.clone();
        out.data
            .iter_mut()
            .zip(other.data.iter())
            .for_each(|(a, b)| *a -= b);
        Ok(out)
    }

    /// Matrix product, `self.cols` must equal `other.rows`
    pub fn mul(&self, other: &Self) -> Result<Self, ParamError> {
        if self.cols != other.rows {
            return Err(ParamError::DimensionMismatch);
        }
        let mut out = Self::zeros(self.rows, other.cols)?;
        for r in 0..self.rows {
            for c in 0..other.cols {
                out[(r, c)] = (0..self.cols).map(|k| self[(r, k)] * other[(k, c)]).sum::<f32>();
            }
        }
        Ok(out)
    }

    pub fn scale(&self, factor: f32) -> Self {
        let mut out = self.clone();
        out.data.iter_mut().for_each(|v| *v *= factor);
        out
    }

    pub fn transpose(&self) -> Self {
        let mut out = self.clone();
        out.rows = self.cols;
        out.cols = self.rows;
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.data[c * self.rows + r] = self.data[r * self.cols + c];
            }
        }
        out
    }

    pub fn from_nalgebra<const R: usize, const C: usize>(
        m: &SMatrix<f32, R, C>,
    ) -> Result<Self, ParamError> {
        let mut out = Self::zeros(R, C)?;
        for r in 0..R {
            for c in 0..C {
                out[(r, c)] = m[(r, c)];
            }
        }
        Ok(out)
    }

    pub fn to_nalgebra<const R: usize, const C: usize>(
        &self,
    ) -> Result<SMatrix<f32, R, C>, ParamError> {
        if self.rows != R || self.cols != C {
            return Err(ParamError::DimensionMismatch);
        }
        Ok(SMatrix::from_fn(|r, c| self[(r, c)]))
    }
}

impl<const CAP: usize> Index<(usize, usize)> for Matrix<CAP> {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        assert!(row < self.rows && col < self.cols);
        &self.data[row * self.cols + col]
    }
}

impl<const CAP: usize> IndexMut<(usize, usize)> for Matrix<CAP> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        assert!(row < self.rows && col < self.cols);
        &mut self.data[row * self.cols + col]
    }
}
