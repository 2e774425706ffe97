//! Positional and average pooling.
//!
//! The pool window is the filter size of the pooled matrix
//! ([`Matrix::set_filter_size`]), and windows advance by its stride. The output
//! has one cell per window origin, `(rows − pool_rows + 1) × (columns −
//! pool_columns + 1)`, of which only the stride-aligned cells are written.
//!
//! Max, random and cyclic pooling are positional: each output cell copies one
//! input cell of its window, and the chosen cells are recorded in
//! [`GradientPositions`]. They differ only in how that cell is picked:
//!
//! - **max**: the first strictly largest unmasked value, in row-major order;
//! - **random**: uniformly among the unmasked cells of the window;
//! - **cyclic**: a cursor that walks the window down each column and then
//!   across, advancing once per output cell and skipping masked cells.
//!
//! [`Matrix::positional_pool_gradient`] routes every output gradient to the
//! recorded cell, whichever selection produced it.

use rand::Rng;

use crate::error::{MatrixError, Shape};
use crate::layout::Layout;
use crate::mask::Mask;
use crate::matrix::Matrix;
use crate::procedure::{self, Operation, WindowParameters};

use super::engine::{ensure_shape, iteration_mask};

/// Input cell selected by one pooling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientPosition {
    pub row: usize,
    pub column: usize,
}

/// Selected input cells of a positional pool pass, one slot per output cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradientPositions {
    input_shape: Shape,
    output_shape: Shape,
    positions: Vec<Option<GradientPosition>>,
}

impl GradientPositions {
    fn new(input_shape: Shape, output_shape: Shape) -> Self {
        Self {
            input_shape,
            output_shape,
            positions: vec![None; output_shape.0 * output_shape.1],
        }
    }

    /// Extents of the pooled input.
    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    /// Extents of the pooled output.
    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    /// Selection of output cell `(row, column)`, if that window had one.
    pub fn get(&self, row: usize, column: usize) -> Option<GradientPosition> {
        if row >= self.output_shape.0 || column >= self.output_shape.1 {
            return None;
        }
        self.positions[row * self.output_shape.1 + column]
    }

    fn set(&mut self, row: usize, column: usize, position: GradientPosition) {
        self.positions[row * self.output_shape.1 + column] = Some(position);
    }
}

impl<L: Layout> Matrix<L> {
    /// Output extents of pooling `self` with its configured window.
    fn pool_output(&self, operation: &'static str) -> Result<Shape, MatrixError> {
        let (pool_rows, pool_columns) = self.filter_size();
        if pool_rows > self.rows() || pool_columns > self.columns() {
            return Err(MatrixError::dimensions(operation, self.shape(), (pool_rows, pool_columns)));
        }
        Ok((self.rows() - pool_rows + 1, self.columns() - pool_columns + 1))
    }

    /// Max-pools `self`.
    ///
    /// # Returns
    /// The pooled matrix and the winning input cell of every window.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the pool window exceeds `self`.
    ///
    /// # Example
    /// ```
    /// use briny_matrix::matrix;
    /// let mut input = matrix!([[1.0, 5.0], [3.0, 2.0]]);
    /// input.set_filter_size(2, 2).unwrap();
    /// let (output, positions) = input.max_pool().unwrap();
    /// assert_eq!(output.value(0, 0), 5.0);
    /// assert_eq!(positions.get(0, 0).map(|p| (p.row, p.column)), Some((0, 1)));
    /// ```
    pub fn max_pool(&self) -> Result<(Self, GradientPositions), MatrixError> {
        let (rows, columns) = self.pool_output("max_pool")?;
        let mut result = Self::new(rows, columns);
        let positions = self.max_pool_into(&mut result)?;
        Ok((result, positions))
    }

    /// Max-pools `self` into `result`, overwriting the stride-aligned cells.
    ///
    /// A window whose cells are all masked writes zero and records no winner.
    ///
    /// # Errors
    /// As for [`Matrix::max_pool`], plus a dimension mismatch on `result`.
    pub fn max_pool_into(&self, result: &mut Self) -> Result<GradientPositions, MatrixError> {
        self.positional_pool_into("max_pool", Operation::MaxPool, result, |window| {
            let mut best: Option<(GradientPosition, f64)> = None;
            for position in window.available() {
                let value = window.value(position);
                if best.is_none_or(|(_, maximum)| value > maximum) {
                    best = Some((position, value));
                }
            }
            best.map(|(position, _)| position)
        })
    }

    /// Pools `self` by picking one unmasked cell of every window at random.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the pool window exceeds `self`.
    pub fn random_pool(&self) -> Result<(Self, GradientPositions), MatrixError> {
        self.random_pool_with_rng(&mut rand::rng())
    }

    /// [`Matrix::random_pool`] drawing from `rng`.
    ///
    /// # Errors
    /// As for [`Matrix::random_pool`].
    pub fn random_pool_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(Self, GradientPositions), MatrixError> {
        let (rows, columns) = self.pool_output("random_pool")?;
        let mut result = Self::new(rows, columns);
        let positions = self.random_pool_into(&mut result, rng)?;
        Ok((result, positions))
    }

    /// Random-pools `self` into `result`, overwriting the stride-aligned cells.
    ///
    /// # Errors
    /// As for [`Matrix::random_pool`], plus a dimension mismatch on `result`.
    pub fn random_pool_into<R: Rng + ?Sized>(
        &self,
        result: &mut Self,
        rng: &mut R,
    ) -> Result<GradientPositions, MatrixError> {
        self.positional_pool_into("random_pool", Operation::RandomPool, result, |window| {
            let candidates: Vec<GradientPosition> = window.available().collect();
            if candidates.is_empty() {
                return None;
            }
            Some(candidates[rng.random_range(0..candidates.len())])
        })
    }

    /// Pools `self` by taking the cell under a cursor that cycles through
    /// the window positions.
    ///
    /// The cursor starts at the window origin for every call and moves down
    /// the window column, then on to the next column, once per written output
    /// cell. Masked cells are skipped.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the pool window exceeds `self`.
    ///
    /// # Example
    /// ```
    /// use briny_matrix::matrix;
    /// let mut input = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    /// input.set_filter_size(2, 2).unwrap();
    /// let (output, _) = input.cyclic_pool().unwrap();
    /// assert_eq!(output.to_vec(), vec![1.0, 5.0]);
    /// ```
    pub fn cyclic_pool(&self) -> Result<(Self, GradientPositions), MatrixError> {
        let (rows, columns) = self.pool_output("cyclic_pool")?;
        let mut result = Self::new(rows, columns);
        let positions = self.cyclic_pool_into(&mut result)?;
        Ok((result, positions))
    }

    /// Cyclic-pools `self` into `result`, overwriting the stride-aligned cells.
    ///
    /// # Errors
    /// As for [`Matrix::cyclic_pool`], plus a dimension mismatch on `result`.
    pub fn cyclic_pool_into(&self, result: &mut Self) -> Result<GradientPositions, MatrixError> {
        let (pool_rows, pool_columns) = self.filter_size();
        let mut cursor = (0, 0);
        let advance = move |(row, column): (usize, usize)| {
            if row + 1 < pool_rows {
                (row + 1, column)
            } else {
                (0, (column + 1) % pool_columns)
            }
        };
        self.positional_pool_into("cyclic_pool", Operation::CyclicPool, result, |window| {
            for _ in 0..pool_rows * pool_columns {
                if window.is_available(cursor.0, cursor.1) {
                    let position = window.position(cursor.0, cursor.1);
                    cursor = advance(cursor);
                    return Some(position);
                }
                cursor = advance(cursor);
            }
            None
        })
    }

    /// Walks every stride-aligned window of `self`, writes the value of the
    /// cell `select` picks and records the pick.
    fn positional_pool_into(
        &self,
        name: &'static str,
        operation: fn(WindowParameters) -> Operation<'static>,
        result: &mut Self,
        mut select: impl FnMut(&PoolWindow<'_, L>) -> Option<GradientPosition>,
    ) -> Result<GradientPositions, MatrixError> {
        let output = self.pool_output(name)?;
        ensure_shape(name, output, result.shape())?;
        let factory = self.synchronized_factory(None)?;

        let (pool_rows, pool_columns) = self.filter_size();
        let stride = self.stride();
        log::trace!("{name} {:?} with {pool_rows}x{pool_columns} window", self.shape());
        let mut positions = GradientPositions::new(self.shape(), output);
        for row in (0..output.0).step_by(stride) {
            for column in (0..output.1).step_by(stride) {
                let window = PoolWindow {
                    input: self,
                    mask: iteration_mask(self),
                    row,
                    column,
                    rows: pool_rows,
                    columns: pool_columns,
                };
                match select(&window) {
                    Some(position) => {
                        result.set_value(row, column, window.value(position));
                        positions.set(row, column, position);
                    }
                    None => {
                        log::warn!("{name} window at ({row}, {column}) is fully masked");
                        result.set_value(row, column, 0.0);
                    }
                }
            }
        }

        procedure::record(factory, operation(self.sliding_window()), self, None, result);
        Ok(positions)
    }

    /// Routes the output gradient `self` back to the recorded winners.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` does not match the pooled
    /// output recorded in `positions`.
    pub fn max_pool_gradient(&self, positions: &GradientPositions) -> Result<Self, MatrixError> {
        self.positional_pool_gradient(positions)
    }

    /// Routes the output gradient `self` of any positional pool back to the
    /// input cells recorded in `positions`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `self` does not match the pooled
    /// output recorded in `positions`.
    pub fn positional_pool_gradient(&self, positions: &GradientPositions) -> Result<Self, MatrixError> {
        let (rows, columns) = positions.input_shape();
        let mut result = Self::new(rows, columns);
        self.positional_pool_gradient_into(positions, &mut result)?;
        Ok(result)
    }

    /// Accumulates the positional pool gradient into `result`.
    ///
    /// Gradients of masked output cells are dropped.
    ///
    /// # Errors
    /// As for [`Matrix::positional_pool_gradient`], plus a dimension mismatch
    /// if `result` is not shaped like the pooled input.
    pub fn positional_pool_gradient_into(
        &self,
        positions: &GradientPositions,
        result: &mut Self,
    ) -> Result<(), MatrixError> {
        ensure_shape("pool_gradient", positions.output_shape(), self.shape())?;
        ensure_shape("pool_gradient", positions.input_shape(), result.shape())?;
        let mask = iteration_mask(self);
        for row in 0..self.rows() {
            for column in 0..self.columns() {
                if mask.is_some_and(|mask| mask.excludes(row, column)) {
                    continue;
                }
                if let Some(position) = positions.get(row, column) {
                    result.increment_value(position.row, position.column, self.value(row, column));
                }
            }
        }
        Ok(())
    }

    /// Average-pools `self`.
    ///
    /// Masked cells contribute nothing to the sum; the divisor is always the
    /// full window size.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the pool window exceeds `self`.
    pub fn average_pool(&self) -> Result<Self, MatrixError> {
        let (rows, columns) = self.pool_output("average_pool")?;
        let mut result = Self::new(rows, columns);
        self.average_pool_into(&mut result)?;
        Ok(result)
    }

    /// Average-pools `self` into `result`, overwriting the stride-aligned cells.
    ///
    /// # Errors
    /// As for [`Matrix::average_pool`], plus a dimension mismatch on `result`.
    pub fn average_pool_into(&self, result: &mut Self) -> Result<(), MatrixError> {
        let output = self.pool_output("average_pool")?;
        ensure_shape("average_pool", output, result.shape())?;
        let factory = self.synchronized_factory(None)?;

        let (pool_rows, pool_columns) = self.filter_size();
        let size = (pool_rows * pool_columns) as f64;
        let mask = iteration_mask(self);
        for row in (0..output.0).step_by(self.stride()) {
            for column in (0..output.1).step_by(self.stride()) {
                let mut sum = 0.0;
                for input_row in row..row + pool_rows {
                    for input_column in column..column + pool_columns {
                        if mask.is_some_and(|mask| mask.excludes(input_row, input_column)) {
                            continue;
                        }
                        sum += self.value(input_row, input_column);
                    }
                }
                result.set_value(row, column, sum / size);
            }
        }

        let parameters = self.sliding_window();
        procedure::record(factory, Operation::AveragePool(parameters), self, None, result);
        Ok(())
    }

    /// Spreads the output gradient `self` evenly over every pooling window.
    ///
    /// The window and stride are read from `self`, which must carry the same
    /// sliding-window configuration as the pooled input.
    ///
    /// # Returns
    /// A `(rows + pool_rows − 1) × (columns + pool_columns − 1)` matrix.
    pub fn average_pool_gradient(&self) -> Self {
        let (pool_rows, pool_columns) = self.filter_size();
        let result = Self::new(self.rows() + pool_rows - 1, self.columns() + pool_columns - 1);
        self.write_average_pool_gradient(&result);
        result
    }

    /// Accumulates the average-pool gradient into `result`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `result` is not shaped like the
    /// pooled input.
    pub fn average_pool_gradient_into(&self, result: &mut Self) -> Result<(), MatrixError> {
        let (pool_rows, pool_columns) = self.filter_size();
        let expected = (self.rows() + pool_rows - 1, self.columns() + pool_columns - 1);
        ensure_shape("average_pool_gradient", expected, result.shape())?;
        self.write_average_pool_gradient(result);
        Ok(())
    }

    fn write_average_pool_gradient(&self, result: &Self) {
        let (pool_rows, pool_columns) = self.filter_size();
        let size = (pool_rows * pool_columns) as f64;
        let mask = iteration_mask(self);
        for row in (0..self.rows()).step_by(self.stride()) {
            for column in (0..self.columns()).step_by(self.stride()) {
                if mask.is_some_and(|mask| mask.excludes(row, column)) {
                    continue;
                }
                let share = self.value(row, column) / size;
                for input_row in row..row + pool_rows {
                    for input_column in column..column + pool_columns {
                        result.increment_value(input_row, input_column, share);
                    }
                }
            }
        }
    }
}

/// One pooling window of an input matrix.
struct PoolWindow<'m, L: Layout> {
    input: &'m Matrix<L>,
    mask: Option<&'m Mask<L>>,
    row: usize,
    column: usize,
    rows: usize,
    columns: usize,
}

impl<L: Layout> PoolWindow<'_, L> {
    /// Input position of window cell `(i, j)`.
    fn position(&self, i: usize, j: usize) -> GradientPosition {
        GradientPosition {
            row: self.row + i,
            column: self.column + j,
        }
    }

    fn is_available(&self, i: usize, j: usize) -> bool {
        !self
            .mask
            .is_some_and(|mask| mask.excludes(self.row + i, self.column + j))
    }

    /// Unmasked positions of the window in row-major order.
    fn available(&self) -> impl Iterator<Item = GradientPosition> + '_ {
        (0..self.rows)
            .flat_map(move |i| (0..self.columns).map(move |j| (i, j)))
            .filter(|&(i, j)| self.is_available(i, j))
            .map(|(i, j)| self.position(i, j))
    }

    fn value(&self, position: GradientPosition) -> f64 {
        self.input.value(position.row, position.column)
    }
}
