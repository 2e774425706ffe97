//! Masked matrix multiplication.
//!
//! `result[r, c] += scaling_constant · Σₓ self[r, x] · other[x, c]`
//!
//! A term is included only if neither `self[r, x]` nor `other[x, c]` is
//! excluded by its mask. Without masks the sums come from the dispatched CPU
//! kernels; both paths add the terms in the same order, so an all-false mask
//! gives the same bits as no mask at all.

use crate::error::MatrixError;
use crate::layout::Layout;
use crate::matrix::Matrix;
use crate::procedure::{self, Operation};

use super::dispatch;
use super::engine::{ensure_shape, iteration_mask};

impl<L: Layout> Matrix<L> {
    /// Matrix product `self · other`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self.columns() != other.rows()`,
    /// and [`MatrixError::ConflictingCollaborator`] for distinct factories.
    ///
    /// # Example
    /// ```
    /// use briny_matrix::matrix;
    /// let a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    /// let i = matrix!([[1.0, 0.0], [0.0, 1.0]]);
    /// assert!(a.dot(&i).unwrap().equals(&a));
    /// ```
    pub fn dot(&self, other: &Self) -> Result<Self, MatrixError> {
        self.check_inner_extent(other)?;
        let mut result = Self::new(self.rows(), other.columns());
        self.dot_into(other, &mut result)?;
        Ok(result)
    }

    /// Accumulates `self · other` into `result`.
    ///
    /// # Errors
    /// As for [`Matrix::dot`], plus a dimension mismatch if `result` is not
    /// `self.rows() × other.columns()`.
    pub fn dot_into(&self, other: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.check_inner_extent(other)?;
        ensure_shape("dot", (self.rows(), other.columns()), result.shape())?;
        let factory = self.synchronized_factory(Some(other))?;

        let (m, k, n) = (self.rows(), self.columns(), other.columns());
        let scaling = self.scaling_constant;
        match (iteration_mask(self), iteration_mask(other)) {
            (None, None) => {
                log::trace!("dot {m}x{k} · {k}x{n} ({})", dispatch::path_name());
                let sums = dispatch::dot(&self.to_vec(), &other.to_vec(), m, k, n);
                for row in 0..m {
                    for column in 0..n {
                        result.increment_value(row, column, scaling * sums[row * n + column]);
                    }
                }
            }
            (first, second) => {
                log::trace!("dot {m}x{k} · {k}x{n} (masked)");
                for row in 0..m {
                    for column in 0..n {
                        let mut sum = 0.0;
                        for x in 0..k {
                            if first.is_some_and(|mask| mask.excludes(row, x))
                                || second.is_some_and(|mask| mask.excludes(x, column))
                            {
                                continue;
                            }
                            sum += self.value(row, x) * other.value(x, column);
                        }
                        result.increment_value(row, column, scaling * sum);
                    }
                }
            }
        }

        procedure::record(factory, Operation::Dot, self, Some(other), result);
        Ok(())
    }

    /// `other` must have one row per column of `self`.
    fn check_inner_extent(&self, other: &Self) -> Result<(), MatrixError> {
        ensure_shape("dot", (self.columns(), other.columns()), other.shape())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MatrixError;
    use crate::mask::Mask;

    #[test]
    fn inner_extent_must_match() {
        let a = crate::matrix!([[1.0, 2.0, 3.0]]);
        let b = crate::matrix!([[1.0, 2.0]]);
        assert_eq!(a.dot(&b).unwrap_err(), MatrixError::dimensions("dot", (3, 2), (1, 2)));
    }

    #[test]
    fn masked_terms_are_dropped() {
        let mut a = crate::matrix!([[1.0, 2.0], [3.0, 4.0]]);
        let b = crate::matrix!([[10.0], [100.0]]);
        let mut mask: Mask = Mask::new(2, 2);
        mask.set_mask(0, 1, true);
        mask.set_row_mask(1, true);
        a.set_mask(mask).unwrap();
        assert_eq!(a.dot(&b).unwrap().to_vec(), vec![10.0, 0.0]);
    }

    #[test]
    fn dot_into_accumulates() {
        let a = crate::matrix!([[1.0, 1.0]]);
        let b = crate::matrix!([[2.0], [3.0]]);
        let mut result = crate::matrix!([[1.0]]);
        a.dot_into(&b, &mut result).unwrap();
        assert_eq!(result.value(0, 0), 6.0);
    }
}
