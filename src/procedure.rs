//! Hook for an external expression recorder.
//!
//! A [`ProcedureFactory`] observes high-level matrix operations so that a
//! separate component can build a differentiable procedure from them. The
//! matrix engine never reads anything back from the factory: attaching one
//! changes no numeric result.
//!
//! ## Contract
//!
//! - A factory is attached per matrix with [`Matrix::set_procedure_factory`].
//! - After computing its result, every recorded operation emits exactly one
//!   [`Expression`] to the factory of its operands.
//! - If two operands carry different factories the operation fails with
//!   [`MatrixError::ConflictingCollaborator`] before writing anything.
//! - If only one operand carries a factory, the result adopts it.

use std::rc::Rc;

use crate::error::MatrixError;
use crate::functions::{BinaryFunction, UnaryFunction};
use crate::layout::{Layout, RowMajor};
use crate::matrix::Matrix;

/// Sliding-window configuration of a matrix.
///
/// Reported with convolution and pooling expressions. For convolution the
/// filter extents are those of the filter matrix; for pooling they are the
/// pool window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParameters {
    pub stride: usize,
    pub dilation: usize,
    pub filter_rows: usize,
    pub filter_columns: usize,
}

impl Default for WindowParameters {
    fn default() -> Self {
        Self {
            stride: 1,
            dilation: 1,
            filter_rows: 1,
            filter_columns: 1,
        }
    }
}

impl WindowParameters {
    /// Same stride and dilation with different filter extents.
    pub fn with_filter(self, filter_rows: usize, filter_columns: usize) -> Self {
        Self {
            filter_rows,
            filter_columns,
            ..self
        }
    }
}

/// Identity of a recorded operation, with its operation-specific parameters.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Add,
    Subtract,
    Multiply,
    Divide,
    Dot,
    Convolve(WindowParameters),
    Crosscorrelate(WindowParameters),
    MaxPool(WindowParameters),
    RandomPool(WindowParameters),
    CyclicPool(WindowParameters),
    AveragePool(WindowParameters),
    Flatten,
    Unflatten,
    Classify(f64),
    Sum,
    Mean,
    Variance,
    StandardDeviation,
    Norm(f64),
    Entropy,
    UnaryFunction(&'a UnaryFunction),
    BinaryFunction(&'a BinaryFunction),
}

impl Operation<'_> {
    /// Short lowercase name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Dot => "dot",
            Operation::Convolve(_) => "convolve",
            Operation::Crosscorrelate(_) => "crosscorrelate",
            Operation::MaxPool(_) => "max_pool",
            Operation::RandomPool(_) => "random_pool",
            Operation::CyclicPool(_) => "cyclic_pool",
            Operation::AveragePool(_) => "average_pool",
            Operation::Flatten => "flatten",
            Operation::Unflatten => "unflatten",
            Operation::Classify(_) => "classify",
            Operation::Sum => "sum",
            Operation::Mean => "mean",
            Operation::Variance => "variance",
            Operation::StandardDeviation => "standard_deviation",
            Operation::Norm(_) => "norm",
            Operation::Entropy => "entropy",
            Operation::UnaryFunction(_) => "unary_function",
            Operation::BinaryFunction(_) => "binary_function",
        }
    }
}

/// One recorded operation: its identity, operands and result.
pub struct Expression<'a, L: Layout = RowMajor> {
    pub operation: Operation<'a>,
    pub first: &'a Matrix<L>,
    pub second: Option<&'a Matrix<L>>,
    pub result: &'a Matrix<L>,
}

/// Passive observer of matrix operations.
pub trait ProcedureFactory<L: Layout = RowMajor> {
    /// Called once per recorded operation, after the result is computed.
    fn create_expression(&self, expression: &Expression<'_, L>);
}

/// Shared handle to an attached factory.
pub type SharedProcedureFactory<L = RowMajor> = Rc<dyn ProcedureFactory<L>>;

/// Picks the factory both operands agree on.
pub(crate) fn synchronize<L: Layout>(
    first: Option<&SharedProcedureFactory<L>>,
    second: Option<&SharedProcedureFactory<L>>,
) -> Result<Option<SharedProcedureFactory<L>>, MatrixError> {
    match (first, second) {
        (Some(a), Some(b)) if !Rc::ptr_eq(a, b) => Err(MatrixError::ConflictingCollaborator),
        (Some(a), _) => Ok(Some(Rc::clone(a))),
        (None, b) => Ok(b.cloned()),
    }
}

/// Attaches `factory` to `result` and emits the expression.
pub(crate) fn record<L: Layout>(
    factory: Option<SharedProcedureFactory<L>>,
    operation: Operation<'_>,
    first: &Matrix<L>,
    second: Option<&Matrix<L>>,
    result: &mut Matrix<L>,
) {
    let Some(factory) = factory else {
        return;
    };
    log::trace!("recording {} expression", operation.name());
    result.procedure_factory = Some(Rc::clone(&factory));
    factory.create_expression(&Expression {
        operation,
        first,
        second,
        result: &*result,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Names(RefCell<Vec<&'static str>>);

    impl ProcedureFactory for Names {
        fn create_expression(&self, expression: &Expression<'_>) {
            self.0.borrow_mut().push(expression.operation.name());
        }
    }

    #[test]
    fn synchronize_rejects_distinct_factories() {
        let a: SharedProcedureFactory = Rc::new(Names::default());
        let b: SharedProcedureFactory = Rc::new(Names::default());
        assert_eq!(
            synchronize(Some(&a), Some(&b)).err(),
            Some(MatrixError::ConflictingCollaborator)
        );
        assert!(synchronize(Some(&a), Some(&a)).is_ok());
    }

    #[test]
    fn synchronize_adopts_the_only_factory() {
        let a: SharedProcedureFactory = Rc::new(Names::default());
        let picked = synchronize(None, Some(&a)).unwrap().unwrap();
        assert!(Rc::ptr_eq(&picked, &a));
        assert!(synchronize::<RowMajor>(None, None).unwrap().is_none());
    }

    #[test]
    fn record_attaches_factory_to_result() {
        let names = Rc::new(Names::default());
        let shared: SharedProcedureFactory = names.clone();
        let a: Matrix = Matrix::new(1, 1);
        let mut result: Matrix = Matrix::new(1, 1);
        record(Some(shared), Operation::Sum, &a, None, &mut result);
        assert!(result.procedure_factory().is_some());
        assert_eq!(*names.0.borrow(), vec!["sum"]);
    }
}
