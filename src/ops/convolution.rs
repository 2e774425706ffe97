//! Convolution and cross-correlation.
//!
//! # Sliding Windows
//!
//! Both modes slide a filter over `self` and write one output cell per window
//! position. Convolution reads the filter flipped in both dimensions;
//! cross-correlation reads it as is. That flip is the only difference between
//! the two, so both run through one implementation.
//!
//! ## Parameters
//!
//! - Filter extents come from the filter matrix.
//! - `stride` and `dilation` come from the sliding-window configuration of
//!   the matrix the operation is called on (see [`Matrix::set_stride`]).
//! - The output is `(rows − filter_rows + 1) × (columns − filter_columns + 1)`;
//!   only cells whose row and column are multiples of `stride` are written.
//! - A filter tap takes part only if its (possibly flipped) filter index is a
//!   multiple of `dilation` in both dimensions.
//!
//! ## Gradients
//!
//! The gradient operations are called on the output gradient. They scatter
//! into their result by accumulation, since neighbouring windows overlap:
//!
//! - input gradient: `in[r+i, c+j] += filter[f(i), f(j)] · g[r, c]`
//! - filter gradient: `filter[f(i), f(j)] += input[r+i, c+j] · g[r, c]`
//!
//! where `f` flips the index in convolution mode.
//!
//! ## Example
//!
//! ```rust
//! use briny_matrix::matrix;
//!
//! let input = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
//! let filter = matrix!([[1.0, 0.0], [0.0, -1.0]]);
//! let output = input.crosscorrelate(&filter).unwrap();
//! assert_eq!(output.to_vec(), vec![-4.0, -4.0, -4.0, -4.0]);
//! ```

use crate::error::{MatrixError, Shape};
use crate::layout::Layout;
use crate::matrix::Matrix;
use crate::procedure::{self, Operation};

use super::cpu::Correlation;
use super::dispatch;
use super::engine::{ensure_shape, iteration_mask};

impl<L: Layout> Matrix<L> {
    fn correlation(&self, filter_rows: usize, filter_columns: usize, output: Shape, flip: bool) -> Correlation {
        Correlation {
            input_columns: self.columns(),
            filter_rows,
            filter_columns,
            output_rows: output.0,
            output_columns: output.1,
            stride: self.stride(),
            dilation: self.dilation(),
            flip,
        }
    }

    /// Output extents of sliding `filter` over `self`.
    fn window_output(&self, filter: &Self, operation: &'static str) -> Result<Shape, MatrixError> {
        if filter.rows() == 0 || filter.columns() == 0 || filter.rows() > self.rows() || filter.columns() > self.columns() {
            return Err(MatrixError::dimensions(operation, self.shape(), filter.shape()));
        }
        Ok((self.rows() - filter.rows() + 1, self.columns() - filter.columns() + 1))
    }

    fn convolution_operation(&self, filter: &Self, flip: bool) -> (&'static str, Operation<'static>) {
        let parameters = self.sliding_window().with_filter(filter.rows(), filter.columns());
        if flip {
            ("convolve", Operation::Convolve(parameters))
        } else {
            ("crosscorrelate", Operation::Crosscorrelate(parameters))
        }
    }

    fn correlate_into(&self, filter: &Self, result: &mut Self, flip: bool) -> Result<(), MatrixError> {
        let (name, operation) = self.convolution_operation(filter, flip);
        let output = self.window_output(filter, name)?;
        ensure_shape(name, output, result.shape())?;
        let factory = self.synchronized_factory(Some(filter))?;

        let geometry = self.correlation(filter.rows(), filter.columns(), output, flip);
        let scaling = self.scaling_constant;
        match (iteration_mask(self), iteration_mask(filter)) {
            (None, None) => {
                log::trace!("{name} {:?} by {:?} ({})", self.shape(), filter.shape(), dispatch::path_name());
                let sums = dispatch::correlate(&self.to_vec(), &filter.to_vec(), &geometry);
                for row in (0..output.0).step_by(geometry.stride) {
                    for column in (0..output.1).step_by(geometry.stride) {
                        result.set_value(row, column, scaling * sums[row * output.1 + column]);
                    }
                }
            }
            (input_mask, filter_mask) => {
                log::trace!("{name} {:?} by {:?} (masked)", self.shape(), filter.shape());
                for row in (0..output.0).step_by(geometry.stride) {
                    for column in (0..output.1).step_by(geometry.stride) {
                        let mut sum = 0.0;
                        for i in 0..geometry.filter_rows {
                            let fi = geometry.filter_row(i);
                            if !geometry.is_tap(fi) {
                                continue;
                            }
                            for j in 0..geometry.filter_columns {
                                let fj = geometry.filter_column(j);
                                if !geometry.is_tap(fj)
                                    || input_mask.is_some_and(|mask| mask.excludes(row + i, column + j))
                                    || filter_mask.is_some_and(|mask| mask.excludes(fi, fj))
                                {
                                    continue;
                                }
                                sum += self.value(row + i, column + j) * filter.value(fi, fj);
                            }
                        }
                        result.set_value(row, column, scaling * sum);
                    }
                }
            }
        }

        procedure::record(factory, operation, self, Some(filter), result);
        Ok(())
    }

    fn correlate(&self, filter: &Self, flip: bool) -> Result<Self, MatrixError> {
        let (name, _) = self.convolution_operation(filter, flip);
        let (rows, columns) = self.window_output(filter, name)?;
        let mut result = Self::new(rows, columns);
        self.correlate_into(filter, &mut result, flip)?;
        Ok(result)
    }

    /// Convolves `self` with `filter`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the filter is larger than `self`
    /// and [`MatrixError::ConflictingCollaborator`] for distinct factories.
    pub fn convolve(&self, filter: &Self) -> Result<Self, MatrixError> {
        self.correlate(filter, true)
    }

    /// Convolves `self` with `filter` into `result`, overwriting the
    /// stride-aligned cells.
    ///
    /// # Errors
    /// As for [`Matrix::convolve`], plus a dimension mismatch on `result`.
    pub fn convolve_into(&self, filter: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.correlate_into(filter, result, true)
    }

    /// Cross-correlates `self` with `filter`.
    ///
    /// # Errors
    /// As for [`Matrix::convolve`].
    pub fn crosscorrelate(&self, filter: &Self) -> Result<Self, MatrixError> {
        self.correlate(filter, false)
    }

    /// Cross-correlates `self` with `filter` into `result`.
    ///
    /// # Errors
    /// As for [`Matrix::convolve_into`].
    pub fn crosscorrelate_into(&self, filter: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.correlate_into(filter, result, false)
    }

    /// Visits every stride-aligned, unmasked output-gradient cell and every
    /// dilation-aligned filter tap: `visit(row, column, i, j, fi, fj, g)`.
    fn scatter(&self, geometry: &Correlation, mut visit: impl FnMut(usize, usize, usize, usize, usize, usize, f64)) {
        let mask = iteration_mask(self);
        for row in (0..self.rows()).step_by(geometry.stride) {
            for column in (0..self.columns()).step_by(geometry.stride) {
                if mask.is_some_and(|mask| mask.excludes(row, column)) {
                    continue;
                }
                let gradient = self.value(row, column);
                for i in 0..geometry.filter_rows {
                    let fi = geometry.filter_row(i);
                    if !geometry.is_tap(fi) {
                        continue;
                    }
                    for j in 0..geometry.filter_columns {
                        let fj = geometry.filter_column(j);
                        if geometry.is_tap(fj) {
                            visit(row, column, i, j, fi, fj, gradient);
                        }
                    }
                }
            }
        }
    }

    fn input_gradient_into(&self, filter: &Self, result: &mut Self, flip: bool) -> Result<(), MatrixError> {
        if filter.rows() == 0 || filter.columns() == 0 {
            return Err(MatrixError::dimensions("input_gradient", (1, 1), filter.shape()));
        }
        let expected = (self.rows() + filter.rows() - 1, self.columns() + filter.columns() - 1);
        ensure_shape("input_gradient", expected, result.shape())?;
        let geometry = self.correlation(filter.rows(), filter.columns(), self.shape(), flip);
        let filter_mask = iteration_mask(filter);
        log::trace!("input gradient {:?} by {:?}", self.shape(), filter.shape());
        self.scatter(&geometry, |row, column, i, j, fi, fj, gradient| {
            if filter_mask.is_some_and(|mask| mask.excludes(fi, fj)) {
                return;
            }
            result.increment_value(row + i, column + j, filter.value(fi, fj) * gradient);
        });
        Ok(())
    }

    fn input_gradient(&self, filter: &Self, flip: bool) -> Result<Self, MatrixError> {
        let rows = (self.rows() + filter.rows()).saturating_sub(1);
        let columns = (self.columns() + filter.columns()).saturating_sub(1);
        let mut result = Self::new(rows, columns);
        self.input_gradient_into(filter, &mut result, flip)?;
        Ok(result)
    }

    fn filter_gradient_into(&self, input: &Self, result: &mut Self, flip: bool) -> Result<(), MatrixError> {
        let filter_shape = input.window_output(self, "filter_gradient")?;
        ensure_shape("filter_gradient", filter_shape, result.shape())?;
        let geometry = self.correlation(filter_shape.0, filter_shape.1, self.shape(), flip);
        let input_mask = iteration_mask(input);
        log::trace!("filter gradient {:?} over {:?}", self.shape(), input.shape());
        self.scatter(&geometry, |row, column, i, j, fi, fj, gradient| {
            if input_mask.is_some_and(|mask| mask.excludes(row + i, column + j)) {
                return;
            }
            result.increment_value(fi, fj, input.value(row + i, column + j) * gradient);
        });
        Ok(())
    }

    fn filter_gradient(&self, input: &Self, flip: bool) -> Result<Self, MatrixError> {
        let (rows, columns) = input.window_output(self, "filter_gradient")?;
        let mut result = Self::new(rows, columns);
        self.filter_gradient_into(input, &mut result, flip)?;
        Ok(result)
    }

    /// Gradient of a convolution with respect to its input, with `self` as the
    /// output gradient.
    ///
    /// # Returns
    /// A `(rows + filter_rows − 1) × (columns + filter_columns − 1)` matrix.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `filter` is empty.
    pub fn convolution_input_gradient(&self, filter: &Self) -> Result<Self, MatrixError> {
        self.input_gradient(filter, true)
    }

    /// Accumulates [`Matrix::convolution_input_gradient`] into `result`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `result` has the wrong shape.
    pub fn convolution_input_gradient_into(&self, filter: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.input_gradient_into(filter, result, true)
    }

    /// Gradient of a cross-correlation with respect to its input.
    ///
    /// # Errors
    /// As for [`Matrix::convolution_input_gradient`].
    pub fn crosscorrelation_input_gradient(&self, filter: &Self) -> Result<Self, MatrixError> {
        self.input_gradient(filter, false)
    }

    pub fn crosscorrelation_input_gradient_into(&self, filter: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.input_gradient_into(filter, result, false)
    }

    /// Gradient of a convolution with respect to its filter, with `self` as
    /// the output gradient and `input` as the forward input.
    ///
    /// # Returns
    /// A `(input.rows − rows + 1) × (input.columns − columns + 1)` matrix.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` is larger than `input`.
    pub fn convolution_filter_gradient(&self, input: &Self) -> Result<Self, MatrixError> {
        self.filter_gradient(input, true)
    }

    pub fn convolution_filter_gradient_into(&self, input: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.filter_gradient_into(input, result, true)
    }

    /// Gradient of a cross-correlation with respect to its filter.
    ///
    /// # Errors
    /// As for [`Matrix::convolution_filter_gradient`].
    pub fn crosscorrelation_filter_gradient(&self, input: &Self) -> Result<Self, MatrixError> {
        self.filter_gradient(input, false)
    }

    pub fn crosscorrelation_filter_gradient_into(&self, input: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.filter_gradient_into(input, result, false)
    }
}
