//! Boolean occupancy masks.
//!
//! # Masks
//!
//! A [`Mask`] marks matrix positions that every masking-aware operation must
//! skip. It answers three queries, which the iteration engine evaluates in a
//! fixed order:
//!
//! 1. **Row mask**: the whole row is excluded.
//! 2. **Cell mask**: the single `(row, column)` cell is excluded.
//! 3. **Column mask**: the whole column is excluded.
//!
//! Row and column masks are stored separately from the cell grid so that
//! structurally masked rows and columns cost one lookup instead of one per cell.
//!
//! ## Bernoulli sampling
//!
//! Each mask carries a masking `probability` in `[0, 1]` and its own seedable
//! RNG. [`Mask::mask_by_probability`] resamples every cell independently,
//! masking it with the configured probability; probability `0` leaves the mask
//! empty and `1` masks everything. The row and column variants resample the
//! row and column masks the same way.
//!
//! ## Sharing
//!
//! A `Mask` is a handle, like the storage of a matrix: cloning it, transposing
//! it or taking a region of it yields another view of the same flags, the same
//! probability and the same RNG. Every view of a matrix therefore sees the
//! mask of its source, and a flag set through one view is visible through all
//! of them. [`Mask::copy`] detaches.
//!
//! ## Layout
//!
//! `Mask<L>` shares its [`Layout`] tag with the matrix it is attached to, so a
//! mask can only be attached to a matrix with the same storage layout.
//!
//! ## Example
//!
//! ```rust
//! use briny_matrix::Mask;
//!
//! let mut mask: Mask = Mask::with_seed(2, 3, 7);
//! mask.set_probability(1.0).unwrap();
//! mask.mask_by_probability();
//! assert!(mask.is_masked(1, 2));
//! mask.reset();
//! assert!(!mask.is_masked(1, 2));
//! ```

use core::cell::RefCell;
use std::rc::Rc;

use briny::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::MatrixError;
use crate::layout::{Layout, RowMajor};
use crate::storage::Addressing;

/// Unchecked masking probability awaiting validation.
struct Probability(f64);

impl Validate for Probability {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.0) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Validates `probability` and returns it unchanged.
pub(crate) fn checked_probability(probability: f64) -> Result<f64, MatrixError> {
    let trusted = TrustedData::new(Probability(probability))
        .map_err(|_| MatrixError::InvalidProbability(probability))?;
    Ok(trusted.into_inner().0)
}

/// Flags and sampling state shared by every view of one mask.
///
/// Flags are kept in physical (buffer) coordinates.
#[derive(Debug, Clone)]
struct MaskState {
    cells: Vec<bool>,
    row_mask: Vec<bool>,
    column_mask: Vec<bool>,
    probability: f64,
    rng: StdRng,
}

/// Row, column and cell exclusion flags over a `rows × columns` grid.
///
/// Cloning aliases the flags; see [`Mask::copy`] for an independent mask.
#[derive(Debug, Clone)]
pub struct Mask<L: Layout = RowMajor> {
    state: Rc<RefCell<MaskState>>,
    addressing: Addressing<L>,
}

impl<L: Layout> Mask<L> {
    /// Creates an empty mask with an entropy-seeded RNG.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self::with_rng(rows, columns, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates an empty mask whose sampling is reproducible from `seed`.
    pub fn with_seed(rows: usize, columns: usize, seed: u64) -> Self {
        Self::with_rng(rows, columns, StdRng::seed_from_u64(seed))
    }

    /// Creates an empty mask with a validated masking probability.
    pub fn with_probability(rows: usize, columns: usize, probability: f64) -> Result<Self, MatrixError> {
        let mut mask = Self::new(rows, columns);
        mask.set_probability(probability)?;
        Ok(mask)
    }

    fn with_rng(rows: usize, columns: usize, rng: StdRng) -> Self {
        let state = MaskState {
            cells: vec![false; rows * columns],
            row_mask: vec![false; rows],
            column_mask: vec![false; columns],
            probability: 0.0,
            rng,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            addressing: Addressing::dense(rows, columns),
        }
    }

    /// Number of rows covered by the mask.
    pub fn rows(&self) -> usize {
        self.addressing.rows()
    }

    /// Number of columns covered by the mask.
    pub fn columns(&self) -> usize {
        self.addressing.columns()
    }

    /// Current masking probability.
    pub fn probability(&self) -> f64 {
        self.state.borrow().probability
    }

    /// Sets the masking probability.
    ///
    /// # Errors
    /// [`MatrixError::InvalidProbability`] if `probability` is outside `[0, 1]`
    /// or NaN. The previous probability is kept in that case.
    pub fn set_probability(&mut self, probability: f64) -> Result<(), MatrixError> {
        self.state.borrow_mut().probability = checked_probability(probability)?;
        Ok(())
    }

    /// Reseeds the sampling RNG.
    pub fn reseed(&mut self, seed: u64) {
        self.state.borrow_mut().rng = StdRng::seed_from_u64(seed);
    }

    /// True if `self` and `other` are views of the same flags.
    pub fn shares_flags(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Physical row flag slot of logical row `row`, as `(is_row_flag, index)`.
    #[inline]
    fn row_slot(&self, row: usize) -> (bool, usize) {
        assert!(row < self.rows(), "mask row {row} out of bounds for {} rows", self.rows());
        let (physical_row, physical_column) = self.addressing.physical(row, 0);
        if self.addressing.is_transposed() {
            (false, physical_column)
        } else {
            (true, physical_row)
        }
    }

    /// Physical flag slot of logical column `column`, as `(is_row_flag, index)`.
    #[inline]
    fn column_slot(&self, column: usize) -> (bool, usize) {
        assert!(
            column < self.columns(),
            "mask column {column} out of bounds for {} columns",
            self.columns()
        );
        let (physical_row, physical_column) = self.addressing.physical(0, column);
        if self.addressing.is_transposed() {
            (true, physical_row)
        } else {
            (false, physical_column)
        }
    }

    fn line_flag(&self, (is_row, index): (bool, usize)) -> bool {
        let state = self.state.borrow();
        if is_row { state.row_mask[index] } else { state.column_mask[index] }
    }

    fn set_line_flag(&self, (is_row, index): (bool, usize), masked: bool) {
        let mut state = self.state.borrow_mut();
        if is_row {
            state.row_mask[index] = masked;
        } else {
            state.column_mask[index] = masked;
        }
    }

    /// Returns true if the single cell is masked.
    ///
    /// # Panics
    /// Panics if the position lies outside the mask.
    #[inline]
    pub fn is_masked(&self, row: usize, column: usize) -> bool {
        let index = self.addressing.index(row, column);
        self.state.borrow().cells[index]
    }

    /// Returns true if the whole row is masked.
    #[inline]
    pub fn is_row_masked(&self, row: usize) -> bool {
        self.line_flag(self.row_slot(row))
    }

    /// Returns true if the whole column is masked.
    #[inline]
    pub fn is_column_masked(&self, column: usize) -> bool {
        self.line_flag(self.column_slot(column))
    }

    /// Row, cell and column checks combined, in that order.
    #[inline]
    pub fn excludes(&self, row: usize, column: usize) -> bool {
        self.is_row_masked(row) || self.is_masked(row, column) || self.is_column_masked(column)
    }

    /// Sets the cell flag at `(row, column)`.
    pub fn set_mask(&mut self, row: usize, column: usize, masked: bool) {
        let index = self.addressing.index(row, column);
        self.state.borrow_mut().cells[index] = masked;
    }

    /// Sets the whole-row flag.
    pub fn set_row_mask(&mut self, row: usize, masked: bool) {
        self.set_line_flag(self.row_slot(row), masked);
    }

    /// Sets the whole-column flag.
    pub fn set_column_mask(&mut self, column: usize, masked: bool) {
        self.set_line_flag(self.column_slot(column), masked);
    }

    #[inline]
    fn sample(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let probability = state.probability;
        state.rng.random::<f64>() < probability
    }

    /// Resamples every cell flag of this view with the configured probability.
    pub fn mask_by_probability(&mut self) {
        let mut masked = 0;
        for row in 0..self.rows() {
            for column in 0..self.columns() {
                let flag = self.sample();
                self.set_mask(row, column, flag);
                masked += usize::from(flag);
            }
        }
        log::debug!(
            "resampled {}x{} cell mask (p = {}): {masked} masked",
            self.rows(),
            self.columns(),
            self.probability()
        );
    }

    /// Resamples every row flag of this view with the configured probability.
    pub fn mask_row_by_probability(&mut self) {
        for row in 0..self.rows() {
            let flag = self.sample();
            self.set_row_mask(row, flag);
        }
        log::debug!("resampled {} row flags (p = {})", self.rows(), self.probability());
    }

    /// Resamples every column flag of this view with the configured probability.
    pub fn mask_column_by_probability(&mut self) {
        for column in 0..self.columns() {
            let flag = self.sample();
            self.set_column_mask(column, flag);
        }
        log::debug!("resampled {} column flags (p = {})", self.columns(), self.probability());
    }

    /// Clears every cell, row and column flag of this view.
    pub fn reset(&mut self) {
        for row in 0..self.rows() {
            self.set_row_mask(row, false);
            for column in 0..self.columns() {
                self.set_mask(row, column, false);
            }
        }
        for column in 0..self.columns() {
            self.set_column_mask(column, false);
        }
    }

    /// Returns true if no flag of any kind is set within this view.
    pub fn is_empty(&self) -> bool {
        let lines = (0..self.rows()).any(|row| self.is_row_masked(row))
            || (0..self.columns()).any(|column| self.is_column_masked(column));
        !lines && !self.positions().any(|(row, column)| self.is_masked(row, column))
    }

    /// Number of cells excluded by the combined row, cell and column checks.
    pub fn excluded_count(&self) -> usize {
        self.positions().filter(|&(row, column)| self.excludes(row, column)).count()
    }

    fn positions(&self) -> impl Iterator<Item = (usize, usize)> {
        let columns = self.columns();
        (0..self.rows()).flat_map(move |row| (0..columns).map(move |column| (row, column)))
    }

    /// A view with rows and columns swapped, sharing flags with `self`.
    pub fn transpose(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            addressing: self.addressing.transposed(),
        }
    }

    /// A view of `[start_row, start_row + rows) × [start_column, start_column + columns)`.
    pub(crate) fn region(&self, start_row: usize, start_column: usize, rows: usize, columns: usize) -> Self {
        Self {
            state: Rc::clone(&self.state),
            addressing: self.addressing.sliced(start_row, start_column, rows, columns),
        }
    }

    /// Widens a region view back to the whole flag grid.
    pub(crate) fn unsliced(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            addressing: self.addressing.unsliced(),
        }
    }

    /// Independent mask with the flags, probability and RNG state of this view.
    pub fn copy(&self) -> Self {
        let rng = self.state.borrow().rng.clone();
        let mut copy = Self::with_rng(self.rows(), self.columns(), rng);
        copy.state.borrow_mut().probability = self.probability();
        for row in 0..self.rows() {
            copy.set_row_mask(row, self.is_row_masked(row));
            for column in 0..self.columns() {
                copy.set_mask(row, column, self.is_masked(row, column));
            }
        }
        for column in 0..self.columns() {
            copy.set_column_mask(column, self.is_column_masked(column));
        }
        copy
    }
}
