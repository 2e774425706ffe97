//! Column-vector softmax, Gumbel-softmax and the softmax Jacobian.
//!
//! All three operate on a single column. Masked rows take no part in the max
//! or the normalizing sum and their result cells keep their previous value.

use rand::Rng;

use crate::error::MatrixError;
use crate::layout::Layout;
use crate::matrix::Matrix;

use super::engine::{ensure_shape, for_each_cell, iteration_mask};

/// Offset added inside both logarithms of the Gumbel noise.
const GUMBEL_EPSILON: f64 = 1e-7;

/// `−ln(−ln(u + ε) + ε)`
fn gumbel_noise<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u: f64 = rng.random();
    -(-(u + GUMBEL_EPSILON).ln() + GUMBEL_EPSILON).ln()
}

/// `ln(σ(x))`, computed without overflowing for large `|x|`.
fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

impl<L: Layout> Matrix<L> {
    fn ensure_column_vector(&self, operation: &'static str) -> Result<(), MatrixError> {
        ensure_shape(operation, (self.rows(), 1), self.shape())
    }

    /// Exponentiates `logits` after subtracting their max, normalizes, and
    /// writes the unmasked rows into `result`.
    fn write_normalized(&self, result: &Self, logits: &[f64]) {
        let mask = iteration_mask(self);
        let mut maximum = f64::NEG_INFINITY;
        for_each_cell(self.rows(), 1, mask, None, |row, _| maximum = maximum.max(logits[row]));

        let mut exponentials = vec![0.0; logits.len()];
        let mut sum = 0.0;
        for_each_cell(self.rows(), 1, mask, None, |row, _| {
            exponentials[row] = (logits[row] - maximum).exp();
            sum += exponentials[row];
        });

        for_each_cell(self.rows(), 1, mask, None, |row, _| {
            result.set_value(row, 0, exponentials[row] / sum);
        });
    }

    /// Softmax of a column vector.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` has more than one column.
    pub fn softmax(&self) -> Result<Self, MatrixError> {
        let mut result = Self::new(self.rows(), self.columns());
        self.softmax_into(&mut result)?;
        Ok(result)
    }

    /// Softmax of a column vector into `result`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` is not a column vector or
    /// `result` has a different shape.
    pub fn softmax_into(&self, result: &mut Self) -> Result<(), MatrixError> {
        self.ensure_column_vector("softmax")?;
        ensure_shape("softmax", self.shape(), result.shape())?;
        let logits = self.to_vec();
        self.write_normalized(result, &logits);
        Ok(())
    }

    /// Gumbel-softmax of a column vector at temperature `tau`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` is not a column vector and
    /// [`MatrixError::InvalidConfiguration`] if `tau` is not positive.
    pub fn gumbel_softmax(&self, tau: f64) -> Result<Self, MatrixError> {
        self.gumbel_softmax_with_rng(tau, &mut rand::rng())
    }

    /// [`Matrix::gumbel_softmax`] drawing noise from `rng`.
    pub fn gumbel_softmax_with_rng<R: Rng + ?Sized>(&self, tau: f64, rng: &mut R) -> Result<Self, MatrixError> {
        let mut result = Self::new(self.rows(), self.columns());
        self.gumbel_softmax_into(tau, &mut result, rng)?;
        Ok(result)
    }

    /// Gumbel-softmax into `result`.
    ///
    /// Each unmasked logit becomes `(ln σ(x) + g) / τ` with Gumbel noise `g`
    /// before the usual softmax normalization.
    ///
    /// # Errors
    /// As for [`Matrix::gumbel_softmax`], plus a dimension mismatch on `result`.
    pub fn gumbel_softmax_into<R: Rng + ?Sized>(
        &self,
        tau: f64,
        result: &mut Self,
        rng: &mut R,
    ) -> Result<(), MatrixError> {
        if tau.is_nan() || tau <= 0.0 {
            return Err(MatrixError::InvalidConfiguration(format!(
                "gumbel-softmax temperature must be positive, got {tau}"
            )));
        }
        self.ensure_column_vector("gumbel_softmax")?;
        ensure_shape("gumbel_softmax", self.shape(), result.shape())?;
        let mut logits = vec![0.0; self.rows()];
        for_each_cell(self.rows(), 1, iteration_mask(self), None, |row, _| {
            logits[row] = (log_sigmoid(self.value(row, 0)) + gumbel_noise(rng)) / tau;
        });
        self.write_normalized(result, &logits);
        Ok(())
    }

    /// Jacobian-style gradient of a softmax output column.
    ///
    /// Entry `(i, j)` is `δᵢⱼ − self[i]`. Columns belonging to masked input rows
    /// are left untouched.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` is not a column vector.
    pub fn softmax_gradient(&self) -> Result<Self, MatrixError> {
        let mut result = Self::new(self.rows(), self.rows());
        self.softmax_gradient_into(&mut result)?;
        Ok(result)
    }

    /// [`Matrix::softmax_gradient`] into a `rows × rows` `result`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` is not a column vector or
    /// `result` is not square with `self.rows()` rows.
    pub fn softmax_gradient_into(&self, result: &mut Self) -> Result<(), MatrixError> {
        self.ensure_column_vector("softmax_gradient")?;
        let rows = self.rows();
        ensure_shape("softmax_gradient", (rows, rows), result.shape())?;
        for_each_cell(rows, 1, iteration_mask(self), None, |column, _| {
            for row in 0..rows {
                let delta = if row == column { 1.0 } else { 0.0 };
                result.set_value(row, column, delta - self.value(row, 0));
            }
        });
        Ok(())
    }
}
