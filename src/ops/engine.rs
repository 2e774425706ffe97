//! Masked Operation Engine
//!
//! Every masking-aware operation walks its target region through
//! [`for_each_cell`]. Cells are visited in row-major order; before a cell is
//! handed to the visitor, both participants' masks are checked row first,
//! then cell, then column. Without any mask the region is walked
//! unconditionally, which visits exactly the cells the masked walk would with
//! an all-false mask.

use crate::error::{MatrixError, Shape};
use crate::layout::Layout;
use crate::mask::Mask;
use crate::matrix::Matrix;

/// Walks `[0, rows) × [0, columns)`, skipping cells excluded by either mask.
pub(crate) fn for_each_cell<L: Layout>(
    rows: usize,
    columns: usize,
    first: Option<&Mask<L>>,
    second: Option<&Mask<L>>,
    mut visit: impl FnMut(usize, usize),
) {
    if first.is_none() && second.is_none() {
        for row in 0..rows {
            for column in 0..columns {
                visit(row, column);
            }
        }
        return;
    }

    let masks = [first, second];
    for row in 0..rows {
        if masks.iter().flatten().any(|mask| mask.is_row_masked(row)) {
            continue;
        }
        for column in 0..columns {
            if masks.iter().flatten().any(|mask| mask.is_masked(row, column)) {
                continue;
            }
            if masks.iter().flatten().any(|mask| mask.is_column_masked(column)) {
                continue;
            }
            visit(row, column);
        }
    }
}

/// Fails unless `found` equals `expected`.
pub(crate) fn ensure_shape(operation: &'static str, expected: Shape, found: Shape) -> Result<(), MatrixError> {
    if expected != found {
        return Err(MatrixError::dimensions(operation, expected, found));
    }
    Ok(())
}

/// Mask that governs iteration over `matrix`; scalars never mask.
#[inline]
pub(crate) fn iteration_mask<L: Layout>(matrix: &Matrix<L>) -> Option<&Mask<L>> {
    if matrix.is_scalar() { None } else { matrix.mask() }
}

/// Label for trace logging.
pub(crate) fn path_name<L: Layout>(first: Option<&Mask<L>>, second: Option<&Mask<L>>) -> &'static str {
    if first.is_some() || second.is_some() { "masked" } else { "unmasked" }
}
