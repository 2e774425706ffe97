//! briny_matrix: masked, layout-generic dense matrices for numerical work.
//!
//! Built for neural-network style computation on small to medium matrices,
//! with explicit shape errors and manual backpropagation closures.
//!
//! # Features
//!
//! - Row-major and column-major matrices over shared storage, with zero-copy
//!   transpose, slice and reference views.
//! - Optional masks that hide cells, rows or columns from every operation.
//! - Element-wise maps, matrix products, convolution, cross-correlation,
//!   pooling, softmax and the gradients of each.
//! - A per-matrix scaling constant and sliding-window configuration.
//! - Optional recording of every operation into a [`ProcedureFactory`].
//!
//! # Modules
//!
//! - [`backend`]: runtime choice between sequential and parallel kernels.
//! - [`backprop`]: forward operations paired with backward closures.
//!
//! Everything else is re-exported at the crate root.
//!
//! # Example
//!
//! ```rust
//! use briny_matrix::{matrix, Mask, Matrix};
//!
//! let mut a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
//! let b = matrix!([[1.0, 1.0], [1.0, 1.0]]);
//! assert_eq!(a.add(&b).unwrap().to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
//!
//! let mut mask: Mask = Mask::new(2, 2);
//! mask.set_row_mask(1, true);
//! a.set_mask(mask).unwrap();
//! assert_eq!(a.sum(), 3.0);
//!
//! let t: Matrix = a.transpose();
//! assert_eq!(t.shape(), (2, 2));
//! ```

pub mod backend;
pub mod backprop;
mod error;
mod functions;
mod init;
mod layout;
mod mask;
mod matrix;
mod ops;
mod procedure;
mod storage;

pub use error::{MatrixError, Shape};
pub use functions::{
    BinaryFunction, BinaryFunctionType, BinaryOperation, UnaryFunction, UnaryFunctionType,
    UnaryOperation,
};
pub use init::Initialization;
pub use layout::{ColumnMajor, Layout, RowMajor};
pub use mask::Mask;
pub use matrix::Matrix;
pub use ops::pool::{GradientPosition, GradientPositions};
pub use procedure::{Expression, Operation, ProcedureFactory, SharedProcedureFactory, WindowParameters};
