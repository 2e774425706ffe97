//! Core matrix data structure.
//!
//! # Dense Matrices
//!
//! This module defines [`Matrix`], a dense two-dimensional array of `f64` values
//! together with the configuration every operation reads:
//! sliding-window settings, an optional [`Mask`], a scaling constant and an
//! optional [`ProcedureFactory`](crate::ProcedureFactory).
//!
//! It supports:
//! - Construction from extents, literals, closures or an [`Initialization`] scheme
//! - Element access addressed by logical `(row, column)`
//! - Zero-copy transpose, slice and reference views over shared storage
//! - Deep copies that detach from the source buffer
//! - Vertical and horizontal concatenation
//!
//! ## Design Highlights
//! - Storage is an `Rc<RefCell<Vec<f64>>>` handle, so aliasing between a matrix
//!   and its views is explicit in the type and limited to one thread
//! - Transposition flips a flag; every access goes through one index translation
//! - A scalar matrix is logically `1×1` and broadcasts in binary operations
//! - The [`Layout`] tag is shared with the attached mask
//!
//! ## Limitations
//! - Two-dimensional only
//! - Out-of-range element access panics, like slice indexing
//!
//! ## Example
//!
//! ```rust
//! use briny_matrix::matrix;
//!
//! let a = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
//! let t = a.transpose();
//! assert_eq!((t.rows(), t.columns()), (3, 2));
//! t.set_value(2, 0, 9.0);
//! assert_eq!(a.value(0, 2), 9.0);
//! ```

use core::fmt;

use rand::Rng;

use crate::error::{MatrixError, Shape};
use crate::init::Initialization;
use crate::layout::{Layout, RowMajor};
use crate::mask::Mask;
use crate::procedure::{self, Operation, SharedProcedureFactory, WindowParameters};
use crate::storage::{Addressing, Storage};

/// A dense `f64` matrix with optional mask and recorder.
///
/// Matrices are not `Clone`: use [`Matrix::reference`] for an aliasing view or
/// [`Matrix::copy`] for independent storage.
pub struct Matrix<L: Layout = RowMajor> {
    pub(crate) storage: Storage,
    pub(crate) addressing: Addressing<L>,
    pub(crate) window: WindowParameters,
    pub(crate) scaling_constant: f64,
    pub(crate) mask: Option<Mask<L>>,
    pub(crate) procedure_factory: Option<SharedProcedureFactory<L>>,
    name: Option<String>,
}

impl<L: Layout> fmt::Debug for Matrix<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("name", &self.name)
            .field("rows", &self.rows())
            .field("columns", &self.columns())
            .field("scalar", &self.is_scalar())
            .field("transposed", &self.is_transposed())
            .field("data", &self.to_vec())
            .field("masked", &self.mask.is_some())
            .finish_non_exhaustive()
    }
}

impl<L: Layout> Matrix<L> {
    fn from_parts(storage: Storage, addressing: Addressing<L>) -> Self {
        Self {
            storage,
            addressing,
            window: WindowParameters::default(),
            scaling_constant: 1.0,
            mask: None,
            procedure_factory: None,
            name: None,
        }
    }

    /// Creates a zero-filled `rows × columns` matrix.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self::from_parts(
            Storage::from_vec(vec![0.0; rows * columns]),
            Addressing::dense(rows, columns),
        )
    }

    /// Creates a scalar matrix that broadcasts in binary operations.
    pub fn scalar(value: f64) -> Self {
        Self::from_parts(Storage::from_vec(vec![value]), Addressing::scalar())
    }

    /// Creates a matrix from row-major `data`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `data.len() != rows * columns`.
    pub fn from_vec(rows: usize, columns: usize, data: Vec<f64>) -> Result<Self, MatrixError> {
        if data.len() != rows * columns {
            return Err(MatrixError::dimensions("from_vec", (rows, columns), (data.len(), 1)));
        }
        let matrix = Self::new(rows, columns);
        for (index, value) in data.into_iter().enumerate() {
            matrix.set_value(index / columns, index % columns, value);
        }
        Ok(matrix)
    }

    /// Creates a matrix from equally long rows.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the rows are ragged.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, MatrixError> {
        let columns = rows.first().map_or(0, |row| row.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * columns);
        for row in rows {
            let row = row.as_ref();
            if row.len() != columns {
                return Err(MatrixError::dimensions("from_rows", (1, columns), (1, row.len())));
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), columns, data)
    }

    /// Creates a matrix whose cells are produced by `initializer(row, column)`.
    pub fn with_initializer(rows: usize, columns: usize, initializer: impl FnMut(usize, usize) -> f64) -> Self {
        let mut matrix = Self::new(rows, columns);
        matrix.initialize_with(initializer);
        matrix
    }

    /// Creates a matrix filled according to `initialization`.
    ///
    /// `inputs`/`outputs` feed the convolutional variants.
    pub fn with_initialization(
        rows: usize,
        columns: usize,
        initialization: Initialization,
        inputs: usize,
        outputs: usize,
    ) -> Self {
        let mut matrix = Self::new(rows, columns);
        matrix.initialize(initialization, inputs, outputs, &mut rand::rng());
        matrix
    }

    /// Creates a zero matrix with the logical extents of `self`.
    ///
    /// Scalars produce scalars.
    pub fn zeros_like(&self) -> Self {
        if self.is_scalar() {
            Self::scalar(0.0)
        } else {
            Self::new(self.rows(), self.columns())
        }
    }

    /// Attaches a descriptive name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Logical row count.
    #[inline]
    pub fn rows(&self) -> usize {
        self.addressing.rows()
    }

    /// Logical column count.
    #[inline]
    pub fn columns(&self) -> usize {
        self.addressing.columns()
    }

    /// `(rows, columns)`.
    #[inline]
    pub fn shape(&self) -> Shape {
        (self.rows(), self.columns())
    }

    /// Number of logical cells.
    pub fn size(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn is_scalar(&self) -> bool {
        self.addressing.is_scalar()
    }

    pub fn is_transposed(&self) -> bool {
        self.addressing.is_transposed()
    }

    /// Value at logical `(row, column)`.
    ///
    /// # Panics
    /// Panics if the position is out of bounds for a non-scalar matrix.
    #[inline]
    pub fn value(&self, row: usize, column: usize) -> f64 {
        self.storage.get(self.addressing.index(row, column))
    }

    /// Writes `value` at logical `(row, column)`.
    ///
    /// Takes `&self` because storage may be shared with views.
    #[inline]
    pub fn set_value(&self, row: usize, column: usize, value: f64) {
        self.storage.set(self.addressing.index(row, column), value);
    }

    pub fn increment_value(&self, row: usize, column: usize, value: f64) {
        self.set_value(row, column, self.value(row, column) + value);
    }

    pub fn decrement_value(&self, row: usize, column: usize, value: f64) {
        self.set_value(row, column, self.value(row, column) - value);
    }

    pub fn multiply_value(&self, row: usize, column: usize, value: f64) {
        self.set_value(row, column, self.value(row, column) * value);
    }

    pub fn divide_value(&self, row: usize, column: usize, value: f64) {
        self.set_value(row, column, self.value(row, column) / value);
    }

    /// Logical contents in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut data = Vec::with_capacity(self.size());
        for row in 0..self.rows() {
            for column in 0..self.columns() {
                data.push(self.value(row, column));
            }
        }
        data
    }

    /// Fills every logical cell with `initializer(row, column)`.
    pub fn initialize_with(&mut self, mut initializer: impl FnMut(usize, usize) -> f64) {
        for row in 0..self.rows() {
            for column in 0..self.columns() {
                self.set_value(row, column, initializer(row, column));
            }
        }
    }

    /// Fills every logical cell according to `initialization`.
    pub fn initialize<R: Rng + ?Sized>(
        &mut self,
        initialization: Initialization,
        inputs: usize,
        outputs: usize,
        rng: &mut R,
    ) {
        let (rows, columns) = self.shape();
        let scale = initialization.scale(rows, columns, inputs, outputs);
        self.initialize_with(|row, column| initialization.sample(rng, row, column, scale));
    }

    /// Sets every logical cell to `value`.
    pub fn initialize_to_value(&mut self, value: f64) {
        self.initialize_with(|_, _| value);
    }

    /// Sets every logical cell to zero.
    pub fn reset(&mut self) {
        self.initialize_to_value(0.0);
    }

    /// Copies the values of `other` into `self`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the shapes differ.
    pub fn set_equal_to(&mut self, other: &Self) -> Result<(), MatrixError> {
        if self.shape() != other.shape() {
            return Err(MatrixError::dimensions("set_equal_to", self.shape(), other.shape()));
        }
        let values = other.to_vec();
        let columns = self.columns();
        for (index, value) in values.into_iter().enumerate() {
            self.set_value(index / columns, index % columns, value);
        }
        Ok(())
    }

    /// True if both matrices have the same shape and values.
    pub fn equals(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.to_vec() == other.to_vec()
    }

    /// Stride of sliding-window operations.
    pub fn stride(&self) -> usize {
        self.window.stride
    }

    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] if `stride` is zero.
    pub fn set_stride(&mut self, stride: usize) -> Result<(), MatrixError> {
        self.window.stride = non_zero("stride", stride)?;
        Ok(())
    }

    pub fn dilation(&self) -> usize {
        self.window.dilation
    }

    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] if `dilation` is zero.
    pub fn set_dilation(&mut self, dilation: usize) -> Result<(), MatrixError> {
        self.window.dilation = non_zero("dilation", dilation)?;
        Ok(())
    }

    /// Pooling window extents `(rows, columns)`.
    pub fn filter_size(&self) -> Shape {
        (self.window.filter_rows, self.window.filter_columns)
    }

    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] if either extent is zero.
    pub fn set_filter_size(&mut self, rows: usize, columns: usize) -> Result<(), MatrixError> {
        let rows = non_zero("filter row size", rows)?;
        self.window.filter_columns = non_zero("filter column size", columns)?;
        self.window.filter_rows = rows;
        Ok(())
    }

    /// Replaces stride, dilation and filter size at once.
    ///
    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] if any field is zero.
    pub fn set_sliding_window(&mut self, window: WindowParameters) -> Result<(), MatrixError> {
        non_zero("stride", window.stride)?;
        non_zero("dilation", window.dilation)?;
        non_zero("filter row size", window.filter_rows)?;
        non_zero("filter column size", window.filter_columns)?;
        self.window = window;
        Ok(())
    }

    pub fn sliding_window(&self) -> WindowParameters {
        self.window
    }

    pub fn scaling_constant(&self) -> f64 {
        self.scaling_constant
    }

    /// Multiplies every value written by elementwise, dot and convolution results.
    pub fn set_scaling_constant(&mut self, scaling_constant: f64) {
        self.scaling_constant = scaling_constant;
    }

    pub fn unset_scaling_constant(&mut self) {
        self.scaling_constant = 1.0;
    }

    pub fn mask(&self) -> Option<&Mask<L>> {
        self.mask.as_ref()
    }

    pub fn mask_mut(&mut self) -> Option<&mut Mask<L>> {
        self.mask.as_mut()
    }

    /// Attaches `mask`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the mask does not cover the
    /// logical extents of the matrix.
    pub fn set_mask(&mut self, mask: Mask<L>) -> Result<(), MatrixError> {
        let found = (mask.rows(), mask.columns());
        if found != self.shape() {
            return Err(MatrixError::dimensions("set_mask", self.shape(), found));
        }
        self.mask = Some(mask);
        Ok(())
    }

    /// Returns the attached mask, attaching an empty one first if needed.
    pub fn ensure_mask(&mut self) -> &mut Mask<L> {
        let (rows, columns) = self.shape();
        self.mask.get_or_insert_with(|| Mask::new(rows, columns))
    }

    /// Detaches and returns the mask.
    pub fn unset_mask(&mut self) -> Option<Mask<L>> {
        self.mask.take()
    }

    /// Attaches a recorder that will be notified of operations on this matrix.
    pub fn set_procedure_factory(&mut self, factory: SharedProcedureFactory<L>) {
        self.procedure_factory = Some(factory);
    }

    pub fn unset_procedure_factory(&mut self) {
        self.procedure_factory = None;
    }

    pub fn procedure_factory(&self) -> Option<&SharedProcedureFactory<L>> {
        self.procedure_factory.as_ref()
    }

    /// Factory agreed by `self` and `other`.
    pub(crate) fn synchronized_factory(
        &self,
        other: Option<&Self>,
    ) -> Result<Option<SharedProcedureFactory<L>>, MatrixError> {
        procedure::synchronize(
            self.procedure_factory.as_ref(),
            other.and_then(|other| other.procedure_factory.as_ref()),
        )
    }

    fn view(&self, addressing: Addressing<L>, mask: Option<Mask<L>>) -> Self {
        Self {
            storage: self.storage.clone(),
            addressing,
            window: self.window,
            scaling_constant: self.scaling_constant,
            mask,
            procedure_factory: self.procedure_factory.clone(),
            name: self.name.clone(),
        }
    }

    /// A view sharing storage, mask and configuration with `self`.
    ///
    /// Writes through either handle are visible through the other, and so are
    /// mask flags.
    pub fn reference(&self) -> Self {
        self.view(self.addressing, self.mask.clone())
    }

    /// A transposed view sharing storage with `self`.
    ///
    /// The mask, if any, is shared and read transposed.
    pub fn transpose(&self) -> Self {
        self.view(self.addressing.transposed(), self.mask.as_ref().map(Mask::transpose))
    }

    /// True if `self` and `other` read and write the same buffer.
    pub fn shares_storage(&self, other: &Self) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    /// Deep copy with its own storage.
    ///
    /// The copy is untransposed and unsliced; its logical contents equal those
    /// of `self`. The mask, if any, is copied too.
    ///
    /// # Errors
    /// [`MatrixError::CloningFailure`] if the source buffer is mutably borrowed.
    pub fn copy(&self) -> Result<Self, MatrixError> {
        let (rows, columns) = self.shape();
        let addressing = if self.is_scalar() {
            Addressing::scalar()
        } else {
            Addressing::dense(rows, columns)
        };
        let data = self.storage.read(|source| {
            let mut data = vec![0.0; rows * columns];
            for row in 0..rows {
                for column in 0..columns {
                    data[addressing.index(row, column)] = source[self.addressing.index(row, column)];
                }
            }
            data
        })?;
        Ok(Self {
            storage: Storage::from_vec(data),
            addressing,
            window: self.window,
            scaling_constant: self.scaling_constant,
            mask: self.mask.as_ref().map(Mask::copy),
            procedure_factory: self.procedure_factory.clone(),
            name: self.name.clone(),
        })
    }

    /// A view of the inclusive region `(start_row, start_column)..=(end_row, end_column)`.
    ///
    /// # Errors
    /// [`MatrixError::InvalidSlice`] if the bounds are inverted or out of range.
    pub fn slice(
        &self,
        start_row: usize,
        start_column: usize,
        end_row: usize,
        end_column: usize,
    ) -> Result<Self, MatrixError> {
        let (rows, columns) = self.shape();
        if self.is_scalar() || start_row > end_row || start_column > end_column || end_row >= rows || end_column >= columns {
            return Err(MatrixError::InvalidSlice {
                start_row,
                start_column,
                end_row,
                end_column,
                rows,
                columns,
            });
        }
        let slice_rows = end_row - start_row + 1;
        let slice_columns = end_column - start_column + 1;
        let addressing = self.addressing.sliced(start_row, start_column, slice_rows, slice_columns);
        let mask = self
            .mask
            .as_ref()
            .map(|mask| mask.region(start_row, start_column, slice_rows, slice_columns));
        Ok(self.view(addressing, mask))
    }

    /// Widens a sliced view back to the whole underlying buffer.
    ///
    /// A mask is widened the same way.
    pub fn unslice(&mut self) {
        if !self.addressing.is_sliced() {
            return;
        }
        self.addressing = self.addressing.unsliced();
        self.mask = self.mask.as_ref().map(Mask::unsliced);
        log::trace!("unsliced {:?} to {:?}", self.name, self.shape());
    }

    /// Stacks `other` below `self`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the column counts differ.
    pub fn concatenate_vertical(&self, other: &Self) -> Result<Self, MatrixError> {
        if self.columns() != other.columns() {
            return Err(MatrixError::dimensions("concatenate_vertical", self.shape(), other.shape()));
        }
        let rows = self.rows();
        Ok(Self::with_initializer(rows + other.rows(), self.columns(), |row, column| {
            if row < rows {
                self.value(row, column)
            } else {
                other.value(row - rows, column)
            }
        }))
    }

    /// Places `other` to the right of `self`.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if the row counts differ.
    pub fn concatenate_horizontal(&self, other: &Self) -> Result<Self, MatrixError> {
        if self.rows() != other.rows() {
            return Err(MatrixError::dimensions("concatenate_horizontal", self.shape(), other.shape()));
        }
        let columns = self.columns();
        Ok(Self::with_initializer(self.rows(), columns + other.columns(), |row, column| {
            if column < columns {
                self.value(row, column)
            } else {
                other.value(row, column - columns)
            }
        }))
    }
}

impl<L: Layout> Matrix<L> {
    /// Splits `self` into the rows above `at` and the rows from `at` on.
    ///
    /// Inverse of [`Matrix::concatenate_vertical`]; both parts own new storage.
    ///
    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] unless `0 < at < rows`.
    pub fn split_vertical(&self, at: usize) -> Result<(Self, Self), MatrixError> {
        if at == 0 || at >= self.rows() {
            return Err(MatrixError::InvalidConfiguration(format!(
                "vertical split at {at} outside 1..{}",
                self.rows()
            )));
        }
        let columns = self.columns();
        let top = Self::with_initializer(at, columns, |row, column| self.value(row, column));
        let bottom = Self::with_initializer(self.rows() - at, columns, |row, column| self.value(row + at, column));
        Ok((top, bottom))
    }

    /// Splits `self` into the columns left of `at` and the columns from `at` on.
    ///
    /// Inverse of [`Matrix::concatenate_horizontal`].
    ///
    /// # Errors
    /// [`MatrixError::InvalidConfiguration`] unless `0 < at < columns`.
    pub fn split_horizontal(&self, at: usize) -> Result<(Self, Self), MatrixError> {
        if at == 0 || at >= self.columns() {
            return Err(MatrixError::InvalidConfiguration(format!(
                "horizontal split at {at} outside 1..{}",
                self.columns()
            )));
        }
        let rows = self.rows();
        let left = Self::with_initializer(rows, at, |row, column| self.value(row, column));
        let right = Self::with_initializer(rows, self.columns() - at, |row, column| self.value(row, column + at));
        Ok((left, right))
    }

    /// Column vector of every logical value in row-major order.
    ///
    /// Values are copied whether or not they are masked; the result carries
    /// no mask.
    pub fn flatten(&self) -> Result<Self, MatrixError> {
        self.reshaped("flatten", Operation::Flatten, (self.size(), 1))
    }

    /// Inverse of [`Matrix::flatten`]: refills a `rows × columns` matrix in
    /// row-major order.
    ///
    /// # Errors
    /// [`MatrixError::DimensionMismatch`] if `rows * columns` differs from the
    /// number of cells of `self`.
    pub fn unflatten(&self, rows: usize, columns: usize) -> Result<Self, MatrixError> {
        if rows * columns != self.size() {
            return Err(MatrixError::dimensions("unflatten", (self.size(), 1), (rows, columns)));
        }
        self.reshaped("unflatten", Operation::Unflatten, (rows, columns))
    }

    fn reshaped(
        &self,
        name: &'static str,
        operation: Operation<'_>,
        (rows, columns): Shape,
    ) -> Result<Self, MatrixError> {
        let factory = self.synchronized_factory(None)?;
        let mut result = Self::from_vec(rows, columns, self.to_vec())?;
        result.window = self.window;
        log::trace!("{name} {:?} to {:?}", self.shape(), (rows, columns));
        procedure::record(factory, operation, self, None, &mut result);
        Ok(result)
    }
}

fn non_zero(what: &str, value: usize) -> Result<usize, MatrixError> {
    if value == 0 {
        return Err(MatrixError::InvalidConfiguration(format!("{what} must be at least 1")));
    }
    Ok(value)
}

impl<L: Layout> PartialEq for Matrix<L> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// Defines a row-major matrix from nested literal arrays.
///
/// A bare literal produces a scalar matrix.
///
/// # Panics
/// Panics if the rows are ragged.
///
/// # Example
/// ```
/// use briny_matrix::matrix;
/// let m = matrix!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(m.shape(), (2, 2));
/// let s = matrix!(5.0);
/// assert!(s.is_scalar());
/// ```
#[macro_export]
macro_rules! matrix {
    ($lit:literal) => {
        $crate::Matrix::<$crate::RowMajor>::scalar($lit)
    };

    ([ $( [ $( $value:expr ),* $(,)? ] ),+ $(,)? ]) => {{
        let rows: ::std::vec::Vec<::std::vec::Vec<f64>> = vec![ $( vec![ $( $value ),* ] ),+ ];
        match $crate::Matrix::<$crate::RowMajor>::from_rows(&rows) {
            Ok(matrix) => matrix,
            Err(err) => panic!("ragged matrix literal: {err}"),
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ColumnMajor;

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Matrix::<RowMajor>::from_vec(2, 2, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, MatrixError::DimensionMismatch { operation: "from_vec", .. }));
    }

    #[test]
    fn column_major_matrix_reads_logically() {
        let m = Matrix::<ColumnMajor>::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert_eq!(m.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.transpose().to_vec(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn slice_is_a_view_with_inclusive_bounds() {
        let m = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let s = m.slice(1, 1, 2, 2).unwrap();
        assert_eq!(s.to_vec(), vec![5.0, 6.0, 8.0, 9.0]);
        s.set_value(0, 0, 50.0);
        assert_eq!(m.value(1, 1), 50.0);
        assert!(m.slice(2, 0, 1, 0).is_err());
        assert!(m.slice(0, 0, 3, 0).is_err());
    }

    #[test]
    fn unslice_restores_full_extent() {
        let m = matrix!([[1.0, 2.0], [3.0, 4.0]]);
        let mut s = m.slice(1, 0, 1, 1).unwrap();
        s.unslice();
        assert_eq!(s.shape(), (2, 2));
        assert!(s.mask().is_none());
    }

    #[test]
    fn copy_detaches_storage() {
        let m = matrix!([[1.0, 2.0], [3.0, 4.0]]);
        let c = m.transpose().copy().unwrap();
        assert!(!c.shares_storage(&m));
        assert!(!c.is_transposed());
        assert_eq!(c.to_vec(), vec![1.0, 3.0, 2.0, 4.0]);
        c.set_value(0, 0, 10.0);
        assert_eq!(m.value(0, 0), 1.0);
    }

    #[test]
    fn set_mask_checks_logical_extents() {
        let mut m: Matrix = Matrix::new(2, 3);
        assert!(m.set_mask(Mask::new(3, 2)).is_err());
        assert!(m.set_mask(Mask::new(2, 3)).is_ok());
        let t = m.transpose();
        assert_eq!(t.mask().map(|mask| (mask.rows(), mask.columns())), Some((3, 2)));
    }

    #[test]
    fn views_share_the_source_mask() {
        let mut m = matrix!([[1.0, 2.0], [3.0, 4.0]]);
        m.ensure_mask();
        let mut view = m.reference();
        if let Some(mask) = view.mask_mut() {
            mask.set_mask(0, 0, true);
        }
        assert!(m.mask().is_some_and(|mask| mask.is_masked(0, 0)));

        let t = m.transpose();
        if let Some(mask) = m.mask_mut() {
            mask.set_row_mask(1, true);
        }
        assert!(t.mask().is_some_and(|mask| mask.is_column_masked(1)));

        let mut s = m.slice(1, 0, 1, 1).unwrap();
        assert!(s.mask().is_some_and(|mask| mask.is_row_masked(0)));
        s.unslice();
        assert!(s.mask().is_some_and(|mask| mask.is_masked(0, 0)));

        let c = m.copy().unwrap();
        assert!(c.mask().is_some_and(|mask| !mask.shares_flags(m.mask().unwrap())));
    }

    #[test]
    fn split_undoes_concatenation() {
        let a = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let (left, right) = a.split_horizontal(1).unwrap();
        assert_eq!(left.to_vec(), vec![1.0, 4.0]);
        assert_eq!(left.concatenate_horizontal(&right).unwrap(), a);
        let (top, bottom) = a.split_vertical(1).unwrap();
        assert_eq!(bottom.to_vec(), vec![4.0, 5.0, 6.0]);
        assert_eq!(top.concatenate_vertical(&bottom).unwrap(), a);
        assert!(a.split_vertical(2).is_err());
        assert!(a.split_horizontal(0).is_err());
    }

    #[test]
    fn flatten_and_unflatten_follow_row_major_order() {
        let m = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let flat = m.transpose().flatten().unwrap();
        assert_eq!(flat.shape(), (6, 1));
        assert_eq!(flat.to_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        let back = m.flatten().unwrap().unflatten(2, 3).unwrap();
        assert_eq!(back, m);
        assert!(!back.shares_storage(&m));
        assert!(matches!(
            flat.unflatten(4, 2),
            Err(MatrixError::DimensionMismatch { operation: "unflatten", .. })
        ));
    }

    #[test]
    fn zero_stride_is_rejected() {
        let mut m: Matrix = Matrix::new(2, 2);
        assert!(m.set_stride(0).is_err());
        assert!(m.set_filter_size(2, 0).is_err());
        assert_eq!(m.filter_size(), (1, 1));
    }

    #[test]
    fn concatenation_checks_shared_extent() {
        let a = matrix!([[1.0, 2.0]]);
        let b = matrix!([[3.0, 4.0]]);
        let v = a.concatenate_vertical(&b).unwrap();
        assert_eq!(v.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        let h = a.concatenate_horizontal(&b).unwrap();
        assert_eq!(h.shape(), (1, 4));
        assert!(a.concatenate_horizontal(&matrix!([[1.0], [2.0]])).is_err());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_range_access_panics() {
        let m: Matrix = Matrix::new(2, 2);
        m.value(2, 0);
    }
}
