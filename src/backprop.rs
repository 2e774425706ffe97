//! Differentiable operations with paired backward closures.
//!
//! # Forward/Backward Pairs
//!
//! Each function here runs a forward operation and returns its output together
//! with a closure that maps `dL/d(output)` to the gradient(s) of the inputs,
//! built from the matching gradient operation on [`Matrix`].
//!
//! ## Autograd Pattern
//!
//! 1. **Inputs** are borrowed matrices; the closure borrows them for as long as it lives.
//! 2. **Forward Pass** computes and returns the output matrix.
//! 3. **Backward Pass** is an `Fn` closure, so it may be called once per incoming gradient.
//! 4. **Recording**: the forward pass reports itself to an attached
//!    [`ProcedureFactory`](crate::ProcedureFactory); the backward pass runs on
//!    detached views and reports nothing.
//!
//! ## Usage Guidelines
//!
//! - Shape problems surface as [`MatrixError`] from either pass.
//! - Sliding-window gradients read the stride, dilation and pool size of the
//!   forward input, whatever the incoming gradient carries.
//!
//! ## Example
//!
//! ```rust
//! use briny_matrix::{backprop, matrix};
//!
//! let a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
//! let b = matrix!([[1.0], [1.0]]);
//! let (out, back) = backprop::dot(&a, &b).unwrap();
//! assert_eq!(out.to_vec(), vec![3.0, 7.0]);
//! let (grad_a, grad_b) = back(&matrix!([[1.0], [1.0]])).unwrap();
//! assert_eq!(grad_a.to_vec(), vec![1.0, 1.0, 1.0, 1.0]);
//! assert_eq!(grad_b.to_vec(), vec![4.0, 6.0]);
//! ```

use crate::error::MatrixError;
use crate::functions::{BinaryFunction, UnaryFunction, UnaryFunctionType};
use crate::layout::Layout;
use crate::matrix::Matrix;

/// Result of a backward pass with respect to two inputs.
pub type GradientPair<L> = Result<(Matrix<L>, Matrix<L>), MatrixError>;

/// View of `matrix` without a procedure factory.
fn detached<L: Layout>(matrix: &Matrix<L>) -> Matrix<L> {
    let mut view = matrix.reference();
    view.unset_procedure_factory();
    view
}

/// View of the incoming gradient carrying the sliding window of `input`.
fn windowed<L: Layout>(gradient: &Matrix<L>, input: &Matrix<L>) -> Result<Matrix<L>, MatrixError> {
    let mut view = detached(gradient);
    view.set_sliding_window(input.sliding_window())?;
    Ok(view)
}

/// Matrix product `a · b`.
///
/// # Returns
/// - `out`: `a.rows() × b.columns()` product.
/// - `back`: closure mapping `dL/d(out)` to `(g · bᵀ, aᵀ · g)`.
///
/// # Errors
/// [`MatrixError::DimensionMismatch`] if the inner extents differ.
pub fn dot<'a, L: Layout>(
    a: &'a Matrix<L>,
    b: &'a Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> GradientPair<L> + 'a), MatrixError> {
    let out = a.dot(b)?;
    let back = move |gradient: &Matrix<L>| -> GradientPair<L> {
        let gradient = detached(gradient);
        let grad_a = gradient.dot(&detached(b).transpose())?;
        let grad_b = detached(a).transpose().dot(&gradient)?;
        Ok((grad_a, grad_b))
    };
    Ok((out, back))
}

/// Convolution of `input` with `filter`.
///
/// # Returns
/// - `out`: the convolution.
/// - `back`: closure mapping `dL/d(out)` to `(dL/d(input), dL/d(filter))`.
///
/// # Errors
/// As for [`Matrix::convolve`].
pub fn convolve<'a, L: Layout>(
    input: &'a Matrix<L>,
    filter: &'a Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> GradientPair<L> + 'a), MatrixError> {
    let out = input.convolve(filter)?;
    let back = move |gradient: &Matrix<L>| -> GradientPair<L> {
        let gradient = windowed(gradient, input)?;
        let grad_input = gradient.convolution_input_gradient(&detached(filter))?;
        let grad_filter = gradient.convolution_filter_gradient(&detached(input))?;
        Ok((grad_input, grad_filter))
    };
    Ok((out, back))
}

/// Cross-correlation of `input` with `filter`.
///
/// # Errors
/// As for [`Matrix::crosscorrelate`].
pub fn crosscorrelate<'a, L: Layout>(
    input: &'a Matrix<L>,
    filter: &'a Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> GradientPair<L> + 'a), MatrixError> {
    let out = input.crosscorrelate(filter)?;
    let back = move |gradient: &Matrix<L>| -> GradientPair<L> {
        let gradient = windowed(gradient, input)?;
        let grad_input = gradient.crosscorrelation_input_gradient(&detached(filter))?;
        let grad_filter = gradient.crosscorrelation_filter_gradient(&detached(input))?;
        Ok((grad_input, grad_filter))
    };
    Ok((out, back))
}

/// Max pooling with the window configured on `input`.
///
/// # Returns
/// - `out`: the pooled matrix.
/// - `back`: closure routing `dL/d(out)` to the winning input cells.
///
/// # Errors
/// As for [`Matrix::max_pool`].
pub fn max_pool<L: Layout>(
    input: &Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError>), MatrixError> {
    let (out, positions) = input.max_pool()?;
    let back = move |gradient: &Matrix<L>| detached(gradient).max_pool_gradient(&positions);
    Ok((out, back))
}

/// Random pooling with the window configured on `input`.
///
/// The backward closure routes `dL/d(out)` to the cells drawn in the forward
/// pass.
///
/// # Errors
/// As for [`Matrix::random_pool`].
pub fn random_pool<L: Layout>(
    input: &Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError>), MatrixError> {
    let (out, positions) = input.random_pool()?;
    let back = move |gradient: &Matrix<L>| detached(gradient).positional_pool_gradient(&positions);
    Ok((out, back))
}

/// Cyclic pooling with the window configured on `input`.
///
/// # Errors
/// As for [`Matrix::cyclic_pool`].
pub fn cyclic_pool<L: Layout>(
    input: &Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError>), MatrixError> {
    let (out, positions) = input.cyclic_pool()?;
    let back = move |gradient: &Matrix<L>| detached(gradient).positional_pool_gradient(&positions);
    Ok((out, back))
}

/// Average pooling with the window configured on `input`.
///
/// # Errors
/// As for [`Matrix::average_pool`].
pub fn average_pool<'a, L: Layout>(
    input: &'a Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError> + 'a), MatrixError> {
    let out = input.average_pool()?;
    let back = move |gradient: &Matrix<L>| -> Result<Matrix<L>, MatrixError> {
        Ok(windowed(gradient, input)?.average_pool_gradient())
    };
    Ok((out, back))
}

/// Softmax of a column vector.
///
/// # Returns
/// - `out`: the softmax.
/// - `back`: closure applying the softmax Jacobian of `out` to `dL/d(out)`.
///
/// # Errors
/// As for [`Matrix::softmax`], plus [`MatrixError::CloningFailure`] if the
/// output cannot be saved for the backward pass.
pub fn softmax<L: Layout>(
    input: &Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError>), MatrixError> {
    let out = input.softmax()?;
    let saved = detached(&out.copy()?);
    let back = move |gradient: &Matrix<L>| -> Result<Matrix<L>, MatrixError> {
        saved.softmax_gradient()?.dot(&detached(gradient))
    };
    Ok((out, back))
}

/// A named unary function.
///
/// Softmax kinds differentiate through their output; every other kind through
/// its input.
///
/// # Errors
/// As for [`UnaryFunction::apply`].
pub fn unary<'a, L: Layout>(
    function: &'a UnaryFunction,
    input: &Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError> + 'a), MatrixError> {
    let out = function.apply(input)?;
    let saved = match function.kind() {
        UnaryFunctionType::Softmax | UnaryFunctionType::GumbelSoftmax { .. } => detached(&out.copy()?),
        _ => detached(&input.copy()?),
    };
    let back = move |gradient: &Matrix<L>| function.gradient(&saved, &detached(gradient));
    Ok((out, back))
}

/// A named binary function such as a loss, differentiated with respect to
/// `first`.
///
/// # Errors
/// As for [`BinaryFunction::apply`].
pub fn binary<'a, L: Layout>(
    function: &'a BinaryFunction,
    first: &'a Matrix<L>,
    second: &'a Matrix<L>,
) -> Result<(Matrix<L>, impl Fn(&Matrix<L>) -> Result<Matrix<L>, MatrixError> + 'a), MatrixError> {
    let out = function.apply(first, second)?;
    let back = move |gradient: &Matrix<L>| {
        function.gradient(&detached(first), &detached(second), &detached(gradient))
    };
    Ok((out, back))
}
