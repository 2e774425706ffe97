//! Error type shared by every fallible matrix operation.

use thiserror::Error;

/// A `(rows, columns)` pair used in error reports.
pub type Shape = (usize, usize);

/// An error type for matrix and mask operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    /// Operand or result extents are incompatible with the requested operation.
    #[error("dimension mismatch in {operation}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        operation: &'static str,
        expected: Shape,
        found: Shape,
    },

    /// A masking probability outside `[0, 1]`.
    #[error("masking probability must be between 0 and 1, got {0}")]
    InvalidProbability(f64),

    /// Two operands are attached to different procedure factories.
    #[error("operands are attached to conflicting procedure factories")]
    ConflictingCollaborator,

    /// Copying or referencing the underlying storage failed.
    #[error("cloning failed: {0}")]
    CloningFailure(String),

    /// Slice bounds fall outside the matrix or are inverted.
    #[error("invalid slice ({start_row}, {start_column})..=({end_row}, {end_column}) of {rows}x{columns} matrix")]
    InvalidSlice {
        start_row: usize,
        start_column: usize,
        end_row: usize,
        end_column: usize,
        rows: usize,
        columns: usize,
    },

    /// A sliding-window or sampling parameter has an unusable value.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl MatrixError {
    pub(crate) fn dimensions(operation: &'static str, expected: Shape, found: Shape) -> Self {
        log::trace!("{operation}: dimension mismatch {expected:?} vs {found:?}");
        Self::DimensionMismatch {
            operation,
            expected,
            found,
        }
    }
}
