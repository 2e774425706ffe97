//! Named scalar functions with derivatives.
//!
//! [`UnaryFunction`] covers activations and elementary functions;
//! [`BinaryFunction`] covers losses and two-argument elementwise functions.
//! Each pairs a forward closure with its derivative so the same value can
//! drive both the forward pass and the gradient. Applying a named function to
//! a matrix reports the function identity to the attached
//! [`ProcedureFactory`](crate::ProcedureFactory).
//!
//! ## Example
//!
//! ```rust
//! use briny_matrix::{matrix, UnaryFunction, UnaryFunctionType};
//!
//! let relu = UnaryFunction::new(UnaryFunctionType::relu()).unwrap();
//! let x = matrix!([[-1.0], [2.0]]);
//! let y = relu.apply(&x).unwrap();
//! assert_eq!(y.to_vec(), vec![0.0, 2.0]);
//! ```

use core::f64::consts::PI;
use core::fmt;
use std::rc::Rc;

use crate::error::MatrixError;
use crate::layout::Layout;
use crate::matrix::Matrix;

/// Scalar map `x ↦ f(x)`.
pub type UnaryOperation = dyn Fn(f64) -> f64;
/// Scalar map `(x, y) ↦ f(x, y)`.
pub type BinaryOperation = dyn Fn(f64, f64) -> f64;

/// Catalogue of built-in unary functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryFunctionType {
    Abs,
    Cos,
    Cosh,
    Exp,
    Log,
    Log10,
    Sgn,
    Sin,
    Sinh,
    Sqrt,
    Cbrt,
    MulInv,
    Tan,
    Tanh,
    Linear,
    Sigmoid,
    Swish,
    HardSigmoid,
    BipolarSigmoid,
    TanhSig,
    TanhAppr,
    HardTanh,
    SoftPlus,
    SoftSign,
    /// Leaky rectifier: `alpha·x` below `threshold`, `x` otherwise.
    Relu { threshold: f64, alpha: f64 },
    ReluCos,
    ReluSin,
    Elu { threshold: f64, alpha: f64 },
    Selu { threshold: f64, alpha: f64, lambda: f64 },
    Gelu,
    /// Column-vector softmax; applied through [`Matrix::softmax`].
    Softmax,
    /// Column-vector Gumbel-softmax with temperature `tau`.
    GumbelSoftmax { tau: f64 },
    Gaussian,
    SinAct,
    Logit,
    /// Caller-supplied function; build it with [`UnaryFunction::custom`].
    Custom,
}

impl UnaryFunctionType {
    /// Plain rectifier.
    pub fn relu() -> Self {
        Self::Relu { threshold: 0.0, alpha: 0.0 }
    }

    pub fn elu() -> Self {
        Self::Elu { threshold: 0.0, alpha: 1.0 }
    }

    pub fn selu() -> Self {
        Self::Selu { threshold: 0.0, alpha: 1.6732, lambda: 1.0507 }
    }

    pub fn gumbel_softmax() -> Self {
        Self::GumbelSoftmax { tau: 2.75 }
    }
}

/// A unary function together with its derivative.
#[derive(Clone)]
pub struct UnaryFunction {
    kind: UnaryFunctionType,
    function: Rc<UnaryOperation>,
    derivative: Rc<UnaryOperation>,
}

impl fmt::Debug for UnaryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryFunction").field("kind", &self.kind).finish_non_exhaustive()
    }
}

fn unary(f: impl Fn(f64) -> f64 + 'static) -> Rc<UnaryOperation> {
    Rc::new(f)
}

impl UnaryFunction {
    /// Builds a catalogue function.
    ///
    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] for [`UnaryFunctionType::Custom`]
    /// or a non-positive Gumbel temperature.
    pub fn new(kind: UnaryFunctionType) -> Result<Self, MatrixError> {
        use UnaryFunctionType as T;
        let (function, derivative) = match kind {
            T::Abs => (unary(f64::abs), unary(|x| x / x.abs())),
            T::Cos => (unary(f64::cos), unary(|x| -x.sin())),
            T::Cosh => (unary(f64::cosh), unary(f64::sinh)),
            T::Exp => (unary(f64::exp), unary(f64::exp)),
            T::Log => (unary(f64::ln), unary(|x| 1.0 / x)),
            T::Log10 => (unary(f64::log10), unary(|x| 1.0 / (10f64.ln() * x))),
            T::Sgn => (unary(signum), unary(|_| 0.0)),
            T::Sin => (unary(f64::sin), unary(f64::cos)),
            T::Sinh => (unary(f64::sinh), unary(f64::cosh)),
            T::Sqrt => (unary(f64::sqrt), unary(|x| 1.0 / (2.0 * x.sqrt()))),
            T::Cbrt => (unary(f64::cbrt), unary(|x| 1.0 / (3.0 * (x * x).cbrt()))),
            T::MulInv => (unary(|x| 1.0 / x), unary(|x| -1.0 / (x * x))),
            T::Tan => (unary(f64::tan), unary(|x| 1.0 + x.tan().powi(2))),
            T::Tanh => (unary(f64::tanh), unary(|x| 1.0 - x.tanh().powi(2))),
            T::Linear => (unary(|x| x), unary(|_| 1.0)),
            T::Sigmoid => (
                unary(|x| 1.0 / (1.0 + (-x).exp())),
                unary(|x| x.exp() / (1.0 + x.exp()).powi(2)),
            ),
            T::Swish => (
                unary(|x| x / (1.0 + (-x).exp())),
                unary(|x| x.exp() * (x.exp() + x + 1.0) / (1.0 + x.exp()).powi(2)),
            ),
            T::HardSigmoid => (
                unary(|x| (0.125 * x + 0.5).clamp(0.0, 1.0)),
                unary(|x| if !(-4.0..=4.0).contains(&x) { 0.0 } else { 0.125 }),
            ),
            T::BipolarSigmoid => (
                unary(|x| 2.0 / (1.0 + (-x).exp()) - 1.0),
                unary(|x| 2.0 * x.exp() / (x.exp() + 1.0).powi(2)),
            ),
            T::TanhSig => (
                unary(|x| 2.0 / ((-2.0 * x).exp() + 1.0) - 1.0),
                unary(|x| 4.0 * (2.0 * x).exp() / ((2.0 * x).exp() + 1.0).powi(2)),
            ),
            T::TanhAppr => (
                unary(|x| ((2.0 * x).exp() - 1.0) / ((2.0 * x).exp() + 1.0)),
                unary(|x| 4.0 * (2.0 * x).exp() / ((2.0 * x).exp() + 1.0).powi(2)),
            ),
            T::HardTanh => (
                unary(|x| (0.5 * x).clamp(-1.0, 1.0)),
                unary(|x| if !(-2.0..=2.0).contains(&x) { 0.0 } else { 0.5 }),
            ),
            T::SoftPlus => (
                unary(|x| (1.0 + x.exp()).ln()),
                unary(|x| 1.0 / (1.0 + (-x).exp())),
            ),
            T::SoftSign => (
                unary(|x| x / (x.abs() + 1.0)),
                unary(|x| 1.0 / (x.abs() + 1.0).powi(2)),
            ),
            T::Relu { threshold, alpha } => (
                unary(move |x| if x < threshold { alpha * x } else { x }),
                unary(move |x| if x < threshold { alpha } else { 1.0 }),
            ),
            T::ReluCos => (
                unary(|x| x.max(0.0) + x.cos()),
                unary(|x| (if x < 0.0 { 0.0 } else { 1.0 }) - x.sin()),
            ),
            T::ReluSin => (
                unary(|x| x.max(0.0) + x.sin()),
                unary(|x| (if x < 0.0 { 0.0 } else { 1.0 }) + x.cos()),
            ),
            T::Elu { threshold, alpha } => (
                unary(move |x| if x < threshold { alpha * (x.exp() - 1.0) } else { x }),
                unary(move |x| if x < threshold { alpha * x.exp() } else { 1.0 }),
            ),
            T::Selu { threshold, alpha, lambda } => (
                unary(move |x| if x < threshold { lambda * alpha * (x.exp() - 1.0) } else { lambda * x }),
                unary(move |x| if x < threshold { lambda * alpha * x.exp() } else { lambda }),
            ),
            T::Gelu => (unary(gelu), unary(gelu_derivative)),
            T::Softmax => (unary(|_| 1.0), unary(|_| 1.0)),
            T::GumbelSoftmax { tau } => {
                if tau.is_nan() || tau <= 0.0 {
                    return Err(MatrixError::InvalidConfiguration(format!(
                        "gumbel softmax temperature must be positive, got {tau}"
                    )));
                }
                (unary(|_| 1.0), unary(|_| 1.0))
            }
            T::Gaussian => (
                unary(|x| (-x * x / 2.0).exp()),
                unary(|x| -2.0 * x * (-x * x / 2.0).exp()),
            ),
            T::SinAct => (
                unary(|x| {
                    if x < -0.5 * PI {
                        -1.0
                    } else if x > 0.5 * PI {
                        1.0
                    } else {
                        x.sin()
                    }
                }),
                unary(|x| if x.abs() > 0.5 * PI { 0.0 } else { x.cos() }),
            ),
            T::Logit => (
                unary(|x| (x / (1.0 - x)).ln()),
                unary(|x| -1.0 / ((x - 1.0) * x)),
            ),
            T::Custom => {
                return Err(MatrixError::InvalidConfiguration(
                    "custom unary functions are built with UnaryFunction::custom".into(),
                ));
            }
        };
        Ok(Self { kind, function, derivative })
    }

    /// Wraps a caller-supplied function and derivative.
    pub fn custom(
        function: impl Fn(f64) -> f64 + 'static,
        derivative: impl Fn(f64) -> f64 + 'static,
    ) -> Self {
        Self {
            kind: UnaryFunctionType::Custom,
            function: Rc::new(function),
            derivative: Rc::new(derivative),
        }
    }

    pub fn kind(&self) -> UnaryFunctionType {
        self.kind
    }

    /// `f(x)`.
    #[inline]
    pub fn value(&self, x: f64) -> f64 {
        (self.function)(x)
    }

    /// `f'(x)`.
    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        (self.derivative)(x)
    }

    /// Applies the function to `input`.
    ///
    /// Softmax variants dispatch to the column-vector operations; every other
    /// kind goes through [`Matrix::apply_function`].
    pub fn apply<L: Layout>(&self, input: &Matrix<L>) -> Result<Matrix<L>, MatrixError> {
        match self.kind {
            UnaryFunctionType::Softmax => input.softmax(),
            UnaryFunctionType::GumbelSoftmax { tau } => input.gumbel_softmax(tau),
            _ => input.apply_function(self),
        }
    }

    /// Gradient with respect to `input` given `dL/d(output)`.
    ///
    /// For softmax variants `input` must be the softmax output; the result is
    /// its Jacobian applied to the output gradient.
    pub fn gradient<L: Layout>(
        &self,
        input: &Matrix<L>,
        output_gradient: &Matrix<L>,
    ) -> Result<Matrix<L>, MatrixError> {
        match self.kind {
            UnaryFunctionType::Softmax | UnaryFunctionType::GumbelSoftmax { .. } => {
                input.softmax_gradient()?.dot(output_gradient)
            }
            _ => output_gradient.multiply(&input.apply(|x| self.derivative(x))),
        }
    }
}

fn signum(x: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x.signum() }
}

fn gelu(x: f64) -> f64 {
    0.5 * x * (1.0 + ((2.0 / PI).sqrt() * (x + 0.044715 * x.powi(3))).tanh())
}

fn gelu_derivative(x: f64) -> f64 {
    let inner = (2.0 / PI).sqrt() * (x + 0.044715 * x.powi(3));
    0.5 * (1.0 + inner.tanh())
        + x * (0.134145 * x * x + 1.0) * (1.0 / inner.cosh()).powi(2) / (2.0 * PI).sqrt()
}

/// Catalogue of built-in binary functions.
///
/// For losses the first argument is the prediction and the second the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryFunctionType {
    MeanSquaredError,
    MeanSquaredLogarithmicError,
    MeanAbsoluteError,
    MeanAbsolutePercentageError,
    CrossEntropy,
    KullbackLeibler,
    NegativeLogLikelihood,
    Poisson,
    Hinge { margin: f64 },
    SquaredHinge,
    Huber { delta: f64 },
    DirectGradient,
    PolicyGradient,
    Pow,
    Max,
    Min,
    /// Caller-supplied function; build it with [`BinaryFunction::custom`].
    Custom,
}

impl BinaryFunctionType {
    pub fn hinge() -> Self {
        Self::Hinge { margin: 1.0 }
    }

    pub fn huber() -> Self {
        Self::Huber { delta: 1.0 }
    }
}

/// A binary function together with its derivative in the first argument.
#[derive(Clone)]
pub struct BinaryFunction {
    kind: BinaryFunctionType,
    function: Rc<BinaryOperation>,
    derivative: Rc<BinaryOperation>,
}

impl fmt::Debug for BinaryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryFunction").field("kind", &self.kind).finish_non_exhaustive()
    }
}

fn binary(f: impl Fn(f64, f64) -> f64 + 'static) -> Rc<BinaryOperation> {
    Rc::new(f)
}

impl BinaryFunction {
    /// Builds a catalogue function.
    ///
    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] for [`BinaryFunctionType::Custom`].
    pub fn new(kind: BinaryFunctionType) -> Result<Self, MatrixError> {
        use BinaryFunctionType as T;
        let (function, derivative) = match kind {
            T::MeanSquaredError => (
                binary(|x, y| 0.5 * (x - y).powi(2)),
                binary(|x, y| x - y),
            ),
            T::MeanSquaredLogarithmicError => (
                binary(|x, y| ((y + 1.0).ln() - (x + 1.0).ln()).powi(2)),
                binary(|x, y| -2.0 * ((y + 1.0).ln() - (x + 1.0).ln()) / (y + 1.0)),
            ),
            T::MeanAbsoluteError => (
                binary(|x, y| (x - y).abs()),
                binary(|x, y| signum(x - y)),
            ),
            T::MeanAbsolutePercentageError => (
                binary(|x, y| 100.0 * ((x - y) / y).abs()),
                binary(|x, y| 100.0 * (x - y) / (y.abs() * (x - y).abs())),
            ),
            T::CrossEntropy => (binary(|x, y| -(y * x.ln())), binary(|x, y| -(y / x))),
            T::KullbackLeibler => (
                binary(|x, y| y * y.ln() - y * x.ln()),
                binary(|x, y| -(y / x)),
            ),
            T::NegativeLogLikelihood => (binary(|x, _| -x.ln()), binary(|x, _| -1.0 / x)),
            T::Poisson => (binary(|x, y| x - y * x.ln()), binary(|x, y| 1.0 - y / x)),
            T::Hinge { margin } => (
                binary(move |x, y| (margin - y * x).max(0.0)),
                binary(move |x, y| if margin - y * x <= 0.0 { 0.0 } else { -y }),
            ),
            T::SquaredHinge => (
                binary(|x, y| if 1.0 - y * x <= 0.0 { 0.0 } else { (1.0 - y * x).powi(2) }),
                binary(|x, y| if 1.0 - y * x <= 0.0 { 0.0 } else { -2.0 * y * (1.0 - y * x) }),
            ),
            T::Huber { delta } => (
                binary(move |x, y| {
                    let error = (x - y).abs();
                    if error <= delta { 0.5 * error * error } else { delta * error - 0.5 * delta * delta }
                }),
                binary(move |x, y| if (x - y).abs() <= delta { x - y } else { delta * signum(x - y) }),
            ),
            T::DirectGradient => (binary(|_, _| 0.0), binary(|_, y| y)),
            T::PolicyGradient => (binary(|_, _| 0.0), binary(|x, y| -x.ln() * y)),
            T::Pow => (binary(f64::powf), binary(|x, y| y * x.powf(y - 1.0))),
            T::Max => (binary(f64::max), binary(|_, _| 1.0)),
            T::Min => (binary(f64::min), binary(|_, _| 1.0)),
            T::Custom => {
                return Err(MatrixError::InvalidConfiguration(
                    "custom binary functions are built with BinaryFunction::custom".into(),
                ));
            }
        };
        Ok(Self { kind, function, derivative })
    }

    /// Wraps a caller-supplied function and derivative.
    pub fn custom(
        function: impl Fn(f64, f64) -> f64 + 'static,
        derivative: impl Fn(f64, f64) -> f64 + 'static,
    ) -> Self {
        Self {
            kind: BinaryFunctionType::Custom,
            function: Rc::new(function),
            derivative: Rc::new(derivative),
        }
    }

    pub fn kind(&self) -> BinaryFunctionType {
        self.kind
    }

    #[inline]
    pub fn value(&self, x: f64, y: f64) -> f64 {
        (self.function)(x, y)
    }

    #[inline]
    pub fn derivative(&self, x: f64, y: f64) -> f64 {
        (self.derivative)(x, y)
    }

    /// Applies the function cell by cell to `first` and `second`.
    pub fn apply<L: Layout>(&self, first: &Matrix<L>, second: &Matrix<L>) -> Result<Matrix<L>, MatrixError> {
        first.apply_bi_function(second, self)
    }

    /// Gradient with respect to `first` given `dL/d(output)`.
    pub fn gradient<L: Layout>(
        &self,
        first: &Matrix<L>,
        second: &Matrix<L>,
        output_gradient: &Matrix<L>,
    ) -> Result<Matrix<L>, MatrixError> {
        output_gradient.multiply(&first.apply_bi(second, |x, y| self.derivative(x, y))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn relu_parameters_shape_the_negative_side() {
        let leaky = UnaryFunction::new(UnaryFunctionType::Relu { threshold: 0.0, alpha: 0.1 }).unwrap();
        assert_relative_eq!(leaky.value(-2.0), -0.2);
        assert_relative_eq!(leaky.derivative(-2.0), 0.1);
        assert_relative_eq!(leaky.value(3.0), 3.0);
    }

    #[test]
    fn sigmoid_derivative_matches_finite_difference() {
        let sigmoid = UnaryFunction::new(UnaryFunctionType::Sigmoid).unwrap();
        let h = 1e-6;
        let numeric = (sigmoid.value(0.3 + h) - sigmoid.value(0.3 - h)) / (2.0 * h);
        assert_relative_eq!(sigmoid.derivative(0.3), numeric, epsilon = 1e-8);
    }

    #[test]
    fn gelu_derivative_matches_finite_difference() {
        let gelu = UnaryFunction::new(UnaryFunctionType::Gelu).unwrap();
        let h = 1e-6;
        for x in [-1.5, -0.2, 0.0, 0.7, 2.0] {
            let numeric = (gelu.value(x + h) - gelu.value(x - h)) / (2.0 * h);
            assert_relative_eq!(gelu.derivative(x), numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn custom_kind_requires_custom_constructor() {
        assert!(UnaryFunction::new(UnaryFunctionType::Custom).is_err());
        assert!(BinaryFunction::new(BinaryFunctionType::Custom).is_err());
        let square = UnaryFunction::custom(|x| x * x, |x| 2.0 * x);
        assert_eq!(square.kind(), UnaryFunctionType::Custom);
        assert_relative_eq!(square.derivative(3.0), 6.0);
    }

    #[test]
    fn non_positive_gumbel_temperature_is_rejected() {
        assert!(UnaryFunction::new(UnaryFunctionType::GumbelSoftmax { tau: 0.0 }).is_err());
        assert!(UnaryFunction::new(UnaryFunctionType::gumbel_softmax()).is_ok());
    }

    #[test]
    fn huber_switches_to_linear_beyond_delta() {
        let huber = BinaryFunction::new(BinaryFunctionType::huber()).unwrap();
        assert_relative_eq!(huber.value(0.5, 0.0), 0.125);
        assert_relative_eq!(huber.value(3.0, 0.0), 2.5);
        assert_relative_eq!(huber.derivative(3.0, 0.0), 1.0);
    }

    #[test]
    fn mean_squared_error_gradient_is_difference() {
        let mse = BinaryFunction::new(BinaryFunctionType::MeanSquaredError).unwrap();
        assert_relative_eq!(mse.value(3.0, 1.0), 2.0);
        assert_relative_eq!(mse.derivative(3.0, 1.0), 2.0);
    }
}
