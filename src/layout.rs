//! Storage layout tags.
//!
//! A [`Layout`] decides how a physical `(row, column)` pair maps to a flat buffer
//! offset. Both [`Matrix`](crate::Matrix) and [`Mask`](crate::Mask) are
//! parameterized by the same tag, so a mask built for one layout can never be
//! attached to a matrix stored in another.

use core::fmt::Debug;

/// Maps physical coordinates to a flat buffer offset.
pub trait Layout: Copy + Default + Debug + Send + Sync + 'static {
    /// Offset of `(row, column)` in a buffer holding `rows × columns` values.
    fn offset(row: usize, column: usize, rows: usize, columns: usize) -> usize;
}

/// Rows are contiguous. This is the default layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowMajor;

/// Columns are contiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMajor;

impl Layout for RowMajor {
    #[inline]
    fn offset(row: usize, column: usize, _rows: usize, columns: usize) -> usize {
        row * columns + column
    }
}

impl Layout for ColumnMajor {
    #[inline]
    fn offset(row: usize, column: usize, rows: usize, _columns: usize) -> usize {
        column * rows + row
    }
}
