//! Shared dense buffers and logical-to-physical index translation.
//!
//! [`Storage`] is a reference-counted handle to a flat `f64` buffer. Cloning
//! the handle aliases the buffer; that is how transposed, sliced and reference
//! views share data with their source. [`Addressing`] holds everything needed to
//! turn a logical `(row, column)` into a buffer offset: the physical extents,
//! the slice origin and extent, the transpose flag and the scalar flag.

use core::cell::RefCell;
use core::marker::PhantomData;
use std::rc::Rc;

use crate::error::MatrixError;
use crate::layout::Layout;

/// Aliasable handle to a flat buffer of values.
#[derive(Debug, Clone)]
pub(crate) struct Storage(Rc<RefCell<Vec<f64>>>);

impl Storage {
    pub(crate) fn from_vec(data: Vec<f64>) -> Self {
        Self(Rc::new(RefCell::new(data)))
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> f64 {
        self.0.borrow()[index]
    }

    #[inline]
    pub(crate) fn set(&self, index: usize, value: f64) {
        self.0.borrow_mut()[index] = value;
    }

    pub(crate) fn ptr_eq(&self, other: &Storage) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Runs `f` over an immutable view of the whole buffer.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&[f64]) -> R) -> Result<R, MatrixError> {
        let data = self
            .0
            .try_borrow()
            .map_err(|err| MatrixError::CloningFailure(err.to_string()))?;
        Ok(f(&data))
    }
}

/// Index translation for one logical view of a [`Storage`] buffer.
///
/// `rows`/`columns` and the offsets are expressed in physical (untransposed)
/// coordinates; [`Addressing::rows`] and [`Addressing::columns`] report the
/// logical extents.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Addressing<L: Layout> {
    buffer_rows: usize,
    buffer_columns: usize,
    row_offset: usize,
    column_offset: usize,
    rows: usize,
    columns: usize,
    transposed: bool,
    scalar: bool,
    _layout: PhantomData<L>,
}

impl<L: Layout> Addressing<L> {
    pub(crate) fn dense(rows: usize, columns: usize) -> Self {
        Self {
            buffer_rows: rows,
            buffer_columns: columns,
            row_offset: 0,
            column_offset: 0,
            rows,
            columns,
            transposed: false,
            scalar: false,
            _layout: PhantomData,
        }
    }

    pub(crate) fn scalar() -> Self {
        Self {
            scalar: true,
            ..Self::dense(1, 1)
        }
    }

    #[inline]
    pub(crate) fn rows(&self) -> usize {
        if self.transposed { self.columns } else { self.rows }
    }

    #[inline]
    pub(crate) fn columns(&self) -> usize {
        if self.transposed { self.rows } else { self.columns }
    }

    pub(crate) fn is_scalar(&self) -> bool {
        self.scalar
    }

    pub(crate) fn is_transposed(&self) -> bool {
        self.transposed
    }

    pub(crate) fn is_sliced(&self) -> bool {
        self.row_offset != 0
            || self.column_offset != 0
            || self.rows != self.buffer_rows
            || self.columns != self.buffer_columns
    }

    /// Buffer offset of logical `(row, column)`.
    ///
    /// Scalars ignore the coordinates so they can broadcast.
    ///
    /// # Panics
    /// Panics if the coordinates lie outside the logical extents.
    #[inline]
    pub(crate) fn index(&self, row: usize, column: usize) -> usize {
        if self.scalar {
            return L::offset(self.row_offset, self.column_offset, self.buffer_rows, self.buffer_columns);
        }
        assert!(
            row < self.rows() && column < self.columns(),
            "index ({row}, {column}) out of bounds for {}x{} matrix",
            self.rows(),
            self.columns()
        );
        let (row, column) = self.physical(row, column);
        L::offset(row, column, self.buffer_rows, self.buffer_columns)
    }

    /// Buffer `(row, column)` of logical `(row, column)`, without bounds checks.
    #[inline]
    pub(crate) fn physical(&self, row: usize, column: usize) -> (usize, usize) {
        let (row, column) = if self.transposed { (column, row) } else { (row, column) };
        (self.row_offset + row, self.column_offset + column)
    }

    pub(crate) fn transposed(self) -> Self {
        Self {
            transposed: !self.transposed,
            ..self
        }
    }

    /// Narrows the view to a logical sub-region.
    pub(crate) fn sliced(self, start_row: usize, start_column: usize, rows: usize, columns: usize) -> Self {
        let (start_row, start_column, rows, columns) = if self.transposed {
            (start_column, start_row, columns, rows)
        } else {
            (start_row, start_column, rows, columns)
        };
        Self {
            row_offset: self.row_offset + start_row,
            column_offset: self.column_offset + start_column,
            rows,
            columns,
            ..self
        }
    }

    /// Drops any slice, exposing the whole buffer again.
    pub(crate) fn unsliced(self) -> Self {
        Self {
            row_offset: 0,
            column_offset: 0,
            rows: self.buffer_rows,
            columns: self.buffer_columns,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ColumnMajor, RowMajor};

    #[test]
    fn transpose_swaps_logical_extents_and_indices() {
        let a: Addressing<RowMajor> = Addressing::dense(2, 3);
        let t = a.transposed();
        assert_eq!((t.rows(), t.columns()), (3, 2));
        assert_eq!(t.index(2, 1), a.index(1, 2));
    }

    #[test]
    fn slice_offsets_are_applied_before_layout() {
        let a: Addressing<ColumnMajor> = Addressing::dense(4, 4);
        let s = a.sliced(1, 2, 2, 2);
        assert_eq!(s.index(0, 0), ColumnMajor::offset(1, 2, 4, 4));
        assert!(s.is_sliced());
        assert!(!s.unsliced().is_sliced());
    }

    #[test]
    fn slice_of_transposed_view_maps_back_to_physical_region() {
        let a: Addressing<RowMajor> = Addressing::dense(3, 4);
        let s = a.transposed().sliced(1, 0, 2, 3);
        assert_eq!((s.rows(), s.columns()), (2, 3));
        assert_eq!(s.index(0, 2), a.index(2, 1));
    }

    #[test]
    fn physical_coordinates_undo_transpose_and_slice() {
        let a: Addressing<RowMajor> = Addressing::dense(3, 4);
        let s = a.sliced(1, 1, 2, 3).transposed();
        assert_eq!(s.physical(2, 1), (2, 3));
    }

    #[test]
    fn scalar_ignores_coordinates() {
        let a: Addressing<RowMajor> = Addressing::scalar();
        assert_eq!(a.index(5, 9), 0);
    }
}
