//! Reductions and statistics
//!
//! Every reduction makes a single masked pass that accumulates a running value
//! and the number of cells visited. Empty passes (everything masked) reduce to
//! zero rather than NaN.
//!
//! The `*_as_matrix` variants wrap the value in a scalar matrix and report the
//! reduction to the attached [`ProcedureFactory`](crate::ProcedureFactory);
//! the plain `f64` variants are silent.

use crate::error::MatrixError;
use crate::layout::Layout;
use crate::mask::Mask;
use crate::matrix::Matrix;
use crate::procedure::{self, Operation};

use super::engine::{for_each_cell, iteration_mask};

fn nonzero_or_one(value: f64) -> f64 {
    if value == 0.0 { 1.0 } else { value }
}

impl<L: Layout> Matrix<L> {
    /// Folds `f` over every unmasked value, returning the accumulator and the
    /// number of cells visited.
    fn fold_unmasked<A: Copy>(&self, init: A, f: impl Fn(A, f64) -> A) -> (A, usize) {
        let mut accumulator = init;
        let mut count = 0;
        for_each_cell(self.rows(), self.columns(), iteration_mask(self), None, |row, column| {
            accumulator = f(accumulator, self.value(row, column));
            count += 1;
        });
        (accumulator, count)
    }

    /// Number of unmasked cells.
    pub fn count(&self) -> usize {
        self.fold_unmasked((), |(), _| ()).1
    }

    /// Sum of unmasked values.
    pub fn sum(&self) -> f64 {
        self.fold_unmasked(0.0, |acc, x| acc + x).0
    }

    /// Mean of unmasked values, or `0` if every cell is masked.
    pub fn mean(&self) -> f64 {
        let (sum, count) = self.fold_unmasked(0.0, |acc, x| acc + x);
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    /// Population variance of unmasked values.
    pub fn variance(&self) -> f64 {
        self.variance_with_mean(self.mean())
    }

    /// `Σ(x − mean)² / count` over unmasked values, with a precomputed `mean`.
    pub fn variance_with_mean(&self, mean: f64) -> f64 {
        let (squares, count) = self.fold_unmasked(0.0, |acc, x| acc + (x - mean).powi(2));
        if count == 0 { 0.0 } else { squares / count as f64 }
    }

    /// Sample standard deviation of unmasked values.
    pub fn standard_deviation(&self) -> f64 {
        self.standard_deviation_with_mean(self.mean())
    }

    /// `√(Σ(x − mean)² / (count − 1))`, or `0` for fewer than two cells.
    pub fn standard_deviation_with_mean(&self, mean: f64) -> f64 {
        let (squares, count) = self.fold_unmasked(0.0, |acc, x| acc + (x - mean).powi(2));
        if count <= 1 {
            0.0
        } else {
            (squares / (count - 1) as f64).sqrt()
        }
    }

    /// `(Σ|x|^p)^(1/p)` over unmasked values.
    pub fn norm(&self, p: f64) -> f64 {
        let (sum, _) = self.fold_unmasked(0.0, |acc, x| acc + x.abs().powf(p));
        sum.powf(1.0 / p)
    }

    /// Mean information content `−Σ x·log₂x / count` over unmasked values.
    ///
    /// Zero values contribute nothing; a fully masked matrix has entropy `0`.
    pub fn entropy(&self) -> f64 {
        let (sum, count) = self.fold_unmasked(0.0, |acc, x| {
            if x == 0.0 { acc } else { acc + x * x.log2() }
        });
        if count == 0 { 0.0 } else { -sum / count as f64 }
    }

    fn recorded_scalar(&self, operation: Operation<'_>, value: f64) -> Self {
        let mut result = Self::scalar(value);
        procedure::record(self.procedure_factory.clone(), operation, self, None, &mut result);
        result
    }

    /// [`Matrix::sum`] as a recorded scalar matrix.
    pub fn sum_as_matrix(&self) -> Self {
        self.recorded_scalar(Operation::Sum, self.sum())
    }

    /// [`Matrix::mean`] as a recorded scalar matrix.
    pub fn mean_as_matrix(&self) -> Self {
        self.recorded_scalar(Operation::Mean, self.mean())
    }

    /// [`Matrix::variance`] as a recorded scalar matrix.
    pub fn variance_as_matrix(&self) -> Self {
        self.recorded_scalar(Operation::Variance, self.variance())
    }

    /// [`Matrix::standard_deviation`] as a recorded scalar matrix.
    pub fn standard_deviation_as_matrix(&self) -> Self {
        self.recorded_scalar(Operation::StandardDeviation, self.standard_deviation())
    }

    /// [`Matrix::norm`] as a recorded scalar matrix.
    pub fn norm_as_matrix(&self, p: f64) -> Self {
        self.recorded_scalar(Operation::Norm(p), self.norm(p))
    }

    /// [`Matrix::entropy`] as a recorded scalar matrix.
    pub fn entropy_as_matrix(&self) -> Self {
        self.recorded_scalar(Operation::Entropy, self.entropy())
    }

    /// First unmasked cell, in row-major order, for which `better(candidate, best)` holds.
    fn extreme(&self, better: impl Fn(f64, f64) -> bool) -> Option<((usize, usize), f64)> {
        let mut best: Option<((usize, usize), f64)> = None;
        for_each_cell(self.rows(), self.columns(), iteration_mask(self), None, |row, column| {
            let value = self.value(row, column);
            match best {
                Some((_, current)) if !better(value, current) => {}
                _ => best = Some(((row, column), value)),
            }
        });
        best
    }

    /// Position of the smallest unmasked value; ties keep the first one found.
    pub fn argmin(&self) -> Option<(usize, usize)> {
        self.extreme(|candidate, best| candidate < best).map(|(position, _)| position)
    }

    /// Position of the largest unmasked value; ties keep the first one found.
    pub fn argmax(&self) -> Option<(usize, usize)> {
        self.extreme(|candidate, best| candidate > best).map(|(position, _)| position)
    }

    /// Smallest unmasked value.
    pub fn min_value(&self) -> Option<f64> {
        self.extreme(|candidate, best| candidate < best).map(|(_, value)| value)
    }

    /// Largest unmasked value.
    pub fn max_value(&self) -> Option<f64> {
        self.extreme(|candidate, best| candidate > best).map(|(_, value)| value)
    }

    /// `(x − mean) / standard_deviation` for every unmasked cell.
    ///
    /// A zero deviation only centres the values.
    pub fn normalize(&self) -> Self {
        let mean = self.mean();
        let deviation = nonzero_or_one(self.standard_deviation_with_mean(mean));
        self.apply(|x| (x - mean) / deviation)
    }

    /// Normalizes `self` in place.
    pub fn normalize_in_place(&mut self) {
        let mean = self.mean();
        let deviation = nonzero_or_one(self.standard_deviation_with_mean(mean));
        self.apply_in_place(|x| (x - mean) / deviation);
    }

    /// Rescales unmasked values linearly onto `[new_min, new_max]`.
    ///
    /// A zero value range is treated as `1`.
    pub fn min_max(&self, new_min: f64, new_max: f64) -> Self {
        let minimum = self.min_value().unwrap_or(0.0);
        let maximum = self.max_value().unwrap_or(0.0);
        let delta = nonzero_or_one(maximum - minimum);
        self.apply(|x| (x - minimum) / delta * (new_max - new_min) + new_min)
    }

    /// `current · β + self · (1 − β)`, or a copy of `self` with no current average.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the shapes differ, and
    /// [`MatrixError::CloningFailure`] if `self` cannot be copied.
    pub fn exponential_moving_average(&self, current: Option<&Self>, beta: f64) -> Result<Self, MatrixError> {
        match current {
            None => self.copy(),
            Some(current) => {
                let decayed = current.multiply(&Self::scalar(beta))?;
                decayed.add(&self.multiply(&Self::scalar(1.0 - beta))?)
            }
        }
    }

    /// Rescales all values by `threshold / √norm(2)` when that root exceeds `threshold`.
    ///
    /// # Errors
    /// [`MatrixError::CloningFailure`] if no clipping is needed and `self`
    /// cannot be copied.
    pub fn gradient_clip(&self, threshold: f64) -> Result<Self, MatrixError> {
        let magnitude = self.norm(2.0).sqrt();
        if magnitude > threshold {
            log::trace!("clipping gradient of magnitude {magnitude} to {threshold}");
            Ok(self.apply(|x| x * threshold / magnitude))
        } else {
            self.copy()
        }
    }

    /// Clips `self` in place; see [`Matrix::gradient_clip`].
    pub fn gradient_clip_in_place(&mut self, threshold: f64) {
        let magnitude = self.norm(2.0).sqrt();
        if magnitude > threshold {
            self.multiply_by(threshold / magnitude);
        }
    }

    /// Inverted dropout: scales kept values by `1 / (1 − p)` and masks each
    /// row of the result with probability `p`.
    ///
    /// # Errors
    /// [`MatrixError::InvalidProbability`] if `probability` is outside `[0, 1]`.
    pub fn dropout(&self, probability: f64) -> Result<Self, MatrixError> {
        let mask = Mask::with_probability(self.rows(), self.columns(), probability)?;
        self.dropout_with_mask(mask)
    }

    /// [`Matrix::dropout`] with a reproducible mask.
    ///
    /// # Errors
    /// As for [`Matrix::dropout`].
    pub fn dropout_with_seed(&self, probability: f64, seed: u64) -> Result<Self, MatrixError> {
        let mut mask = Mask::with_seed(self.rows(), self.columns(), seed);
        mask.set_probability(probability)?;
        self.dropout_with_mask(mask)
    }

    fn dropout_with_mask(&self, mut mask: Mask<L>) -> Result<Self, MatrixError> {
        let keep = 1.0 - mask.probability();
        let mut result = self.apply(|x| if keep == 0.0 { f64::INFINITY } else { x / keep });
        mask.mask_row_by_probability();
        result.set_mask(mask)?;
        Ok(result)
    }
}
