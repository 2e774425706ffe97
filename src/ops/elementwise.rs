//! Elementwise operations
//!
//! Unary maps write `scaling_constant · f(x)` for every cell the engine visits;
//! binary maps write `scaling_constant · f(x, y)`. Cells skipped because of a
//! mask keep whatever the result already held, which is zero for the
//! allocating variants.
//!
//! ## Broadcasting
//!
//! When exactly one operand is a scalar matrix its single value is paired with
//! every cell of the other operand, and iteration follows the non-scalar
//! operand's mask.
//!
//! ## Variants
//!
//! Each operation comes in three shapes:
//! - `op(&self, ..) -> Matrix`: allocates a zeroed result
//! - `op_into(&self, .., &mut result)`: writes into a caller-supplied matrix
//! - `op_in_place(&mut self, ..)`: writes back into `self`
//!
//! The arithmetic operations and the named-function applications report
//! themselves to the attached [`ProcedureFactory`](crate::ProcedureFactory);
//! raw closure maps do not.

use crate::error::{MatrixError, Shape};
use crate::functions::{BinaryFunction, BinaryFunctionType, UnaryFunction};
use crate::layout::Layout;
use crate::matrix::Matrix;
use crate::procedure::{self, Operation};

use super::engine::{ensure_shape, for_each_cell, iteration_mask, path_name};

fn divide(x: f64, y: f64) -> f64 {
    if y == 0.0 { f64::INFINITY } else { x / y }
}

impl<L: Layout> Matrix<L> {
    /// Result shape of a binary operation with scalar broadcasting.
    fn broadcast_shape(&self, other: &Self, operation: &'static str) -> Result<(Shape, bool), MatrixError> {
        match (self.is_scalar(), other.is_scalar()) {
            (true, true) => Ok(((1, 1), true)),
            (true, false) => Ok((other.shape(), false)),
            (false, true) => Ok((self.shape(), false)),
            (false, false) => {
                ensure_shape(operation, self.shape(), other.shape())?;
                Ok((self.shape(), false))
            }
        }
    }

    fn broadcast_result(&self, other: &Self, operation: &'static str) -> Result<Self, MatrixError> {
        let ((rows, columns), scalar) = self.broadcast_shape(other, operation)?;
        Ok(if scalar { Self::scalar(0.0) } else { Self::new(rows, columns) })
    }

    /// Maps every unmasked cell through `f` into a new matrix.
    pub fn apply(&self, f: impl Fn(f64) -> f64) -> Self {
        let result = self.zeros_like();
        self.write_unary(&result, f);
        result
    }

    /// Maps every unmasked cell through `f` into `result`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `result` has a different shape.
    pub fn apply_into(&self, result: &mut Self, f: impl Fn(f64) -> f64) -> Result<(), MatrixError> {
        ensure_shape("apply", self.shape(), result.shape())?;
        self.write_unary(result, f);
        Ok(())
    }

    /// Maps every unmasked cell of `self` through `f` in place.
    pub fn apply_in_place(&mut self, f: impl Fn(f64) -> f64) {
        let target = self.reference();
        self.write_unary(&target, f);
    }

    fn write_unary(&self, result: &Self, f: impl Fn(f64) -> f64) {
        let mask = iteration_mask(self);
        log::trace!("apply over {:?} ({})", self.shape(), path_name(mask, None));
        let scaling = self.scaling_constant;
        for_each_cell(self.rows(), self.columns(), mask, None, |row, column| {
            result.set_value(row, column, scaling * f(self.value(row, column)));
        });
    }

    /// Combines `self` and `other` cell by cell through `f` into a new matrix.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if neither operand is a scalar and
    /// the shapes differ.
    pub fn apply_bi(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Result<Self, MatrixError> {
        let result = self.broadcast_result(other, "apply_bi")?;
        self.write_binary(other, &result, f);
        Ok(result)
    }

    /// Combines `self` and `other` cell by cell through `f` into `result`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the operands do not broadcast or
    /// `result` does not match the broadcast shape.
    pub fn apply_bi_into(
        &self,
        other: &Self,
        result: &mut Self,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<(), MatrixError> {
        let (shape, _) = self.broadcast_shape(other, "apply_bi")?;
        ensure_shape("apply_bi", shape, result.shape())?;
        self.write_binary(other, result, f);
        Ok(())
    }

    fn write_binary(&self, other: &Self, result: &Self, f: impl Fn(f64, f64) -> f64) {
        let (first, second) = (iteration_mask(self), iteration_mask(other));
        let (rows, columns) = result.shape();
        log::trace!("apply_bi over {:?} ({})", (rows, columns), path_name(first, second));
        let scaling = self.scaling_constant;
        for_each_cell(rows, columns, first, second, |row, column| {
            let value = f(self.value(row, column), other.value(row, column));
            result.set_value(row, column, scaling * value);
        });
    }

    /// Checks shapes and factories, writes, then records `operation`.
    fn recorded_binary_into(
        &self,
        other: &Self,
        result: &mut Self,
        operation: Operation<'_>,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<(), MatrixError> {
        let (shape, _) = self.broadcast_shape(other, operation.name())?;
        ensure_shape(operation.name(), shape, result.shape())?;
        let factory = self.synchronized_factory(Some(other))?;
        self.write_binary(other, result, f);
        procedure::record(factory, operation, self, Some(other), result);
        Ok(())
    }

    fn recorded_binary(&self, other: &Self, operation: Operation<'_>, f: impl Fn(f64, f64) -> f64) -> Result<Self, MatrixError> {
        let mut result = self.broadcast_result(other, operation.name())?;
        self.recorded_binary_into(other, &mut result, operation, f)?;
        Ok(result)
    }

    fn recorded_binary_in_place(
        &mut self,
        other: &Self,
        operation: Operation<'_>,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<(), MatrixError> {
        let mut target = self.reference();
        self.recorded_binary_into(other, &mut target, operation, f)?;
        self.procedure_factory = target.procedure_factory.take();
        Ok(())
    }

    /// `self + other`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] for incompatible shapes and
    /// [`MatrixError::ConflictingCollaborator`] for distinct factories.
    pub fn add(&self, other: &Self) -> Result<Self, MatrixError> {
        self.recorded_binary(other, Operation::Add, |x, y| x + y)
    }

    pub fn add_into(&self, other: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.recorded_binary_into(other, result, Operation::Add, |x, y| x + y)
    }

    pub fn add_in_place(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.recorded_binary_in_place(other, Operation::Add, |x, y| x + y)
    }

    /// `self − other`.
    ///
    /// # Errors
    /// As for [`Matrix::add`].
    pub fn subtract(&self, other: &Self) -> Result<Self, MatrixError> {
        self.recorded_binary(other, Operation::Subtract, |x, y| x - y)
    }

    pub fn subtract_into(&self, other: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.recorded_binary_into(other, result, Operation::Subtract, |x, y| x - y)
    }

    pub fn subtract_in_place(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.recorded_binary_in_place(other, Operation::Subtract, |x, y| x - y)
    }

    /// Cell-wise `self × other`.
    ///
    /// # Errors
    /// As for [`Matrix::add`].
    pub fn multiply(&self, other: &Self) -> Result<Self, MatrixError> {
        self.recorded_binary(other, Operation::Multiply, |x, y| x * y)
    }

    pub fn multiply_into(&self, other: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.recorded_binary_into(other, result, Operation::Multiply, |x, y| x * y)
    }

    pub fn multiply_in_place(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.recorded_binary_in_place(other, Operation::Multiply, |x, y| x * y)
    }

    /// Cell-wise `self ÷ other`; a zero divisor yields `+∞`.
    ///
    /// # Errors
    /// As for [`Matrix::add`].
    pub fn divide(&self, other: &Self) -> Result<Self, MatrixError> {
        self.recorded_binary(other, Operation::Divide, divide)
    }

    pub fn divide_into(&self, other: &Self, result: &mut Self) -> Result<(), MatrixError> {
        self.recorded_binary_into(other, result, Operation::Divide, divide)
    }

    pub fn divide_in_place(&mut self, other: &Self) -> Result<(), MatrixError> {
        self.recorded_binary_in_place(other, Operation::Divide, divide)
    }

    /// Adds `value` to every unmasked cell.
    pub fn increment_by(&mut self, value: f64) {
        self.apply_in_place(|x| x + value);
    }

    /// Subtracts `value` from every unmasked cell.
    pub fn decrement_by(&mut self, value: f64) {
        self.apply_in_place(|x| x - value);
    }

    /// Multiplies every unmasked cell by `value`.
    pub fn multiply_by(&mut self, value: f64) {
        self.apply_in_place(|x| x * value);
    }

    /// Divides every unmasked cell by `value`; a zero divisor yields `+∞`.
    pub fn divide_by(&mut self, value: f64) {
        self.apply_in_place(|x| divide(x, value));
    }

    /// Applies a named unary function and records it.
    pub fn apply_function(&self, function: &UnaryFunction) -> Result<Self, MatrixError> {
        let mut result = self.zeros_like();
        self.apply_function_into(function, &mut result)?;
        Ok(result)
    }

    /// Applies a named unary function into `result` and records it.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `result` has a different shape.
    pub fn apply_function_into(&self, function: &UnaryFunction, result: &mut Self) -> Result<(), MatrixError> {
        ensure_shape("unary_function", self.shape(), result.shape())?;
        let factory = self.synchronized_factory(None)?;
        self.write_unary(result, |x| function.value(x));
        procedure::record(factory, Operation::UnaryFunction(function), self, None, result);
        Ok(())
    }

    /// Applies a named binary function and records it.
    ///
    /// # Errors
    /// As for [`Matrix::add`].
    pub fn apply_bi_function(&self, other: &Self, function: &BinaryFunction) -> Result<Self, MatrixError> {
        self.recorded_binary(other, Operation::BinaryFunction(function), |x, y| function.value(x, y))
    }

    pub fn apply_bi_function_into(
        &self,
        other: &Self,
        function: &BinaryFunction,
        result: &mut Self,
    ) -> Result<(), MatrixError> {
        self.recorded_binary_into(other, result, Operation::BinaryFunction(function), |x, y| {
            function.value(x, y)
        })
    }

    /// Raises every cell to `exponent`.
    pub fn power(&self, exponent: f64) -> Result<Self, MatrixError> {
        let pow = BinaryFunction::new(BinaryFunctionType::Pow)?;
        self.apply_bi_function(&Self::scalar(exponent), &pow)
    }

    /// Cell-wise maximum of `self` and `other`.
    pub fn max(&self, other: &Self) -> Result<Self, MatrixError> {
        let max = BinaryFunction::new(BinaryFunctionType::Max)?;
        self.apply_bi_function(other, &max)
    }

    /// Cell-wise minimum of `self` and `other`.
    pub fn min(&self, other: &Self) -> Result<Self, MatrixError> {
        let min = BinaryFunction::new(BinaryFunctionType::Min)?;
        self.apply_bi_function(other, &min)
    }

    /// Sign of `self` times `other`, cell by cell. Zero has sign zero.
    pub fn sgnmul(&self, other: &Self) -> Result<Self, MatrixError> {
        self.apply_bi(other, |x, y| {
            let sign = if x == 0.0 { 0.0 } else { x.signum() };
            sign * y
        })
    }

    /// Multi-label classification with the default threshold of `0.5`.
    pub fn classify(&self) -> Result<Self, MatrixError> {
        self.classify_with_threshold(0.5)
    }

    /// Labels every unmasked cell `1` if it reaches `threshold`, else `0`.
    ///
    /// Labels are not scaled by the scaling constant.
    ///
    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] for a NaN threshold.
    pub fn classify_with_threshold(&self, threshold: f64) -> Result<Self, MatrixError> {
        let mut result = self.zeros_like();
        self.classify_into(threshold, &mut result)?;
        Ok(result)
    }

    /// Writes the labels of [`Matrix::classify_with_threshold`] into `result`.
    ///
    /// # Errors
    /// As for [`Matrix::classify_with_threshold`], plus a dimension mismatch
    /// on `result`.
    pub fn classify_into(&self, threshold: f64, result: &mut Self) -> Result<(), MatrixError> {
        if threshold.is_nan() {
            return Err(MatrixError::InvalidConfiguration("classification threshold is NaN".into()));
        }
        ensure_shape("classify", self.shape(), result.shape())?;
        let factory = self.synchronized_factory(None)?;
        let mask = iteration_mask(self);
        for_each_cell(self.rows(), self.columns(), mask, None, |row, column| {
            let label = if self.value(row, column) < threshold { 0.0 } else { 1.0 };
            result.set_value(row, column, label);
        });
        procedure::record(factory, Operation::Classify(threshold), self, None, result);
        Ok(())
    }
}
