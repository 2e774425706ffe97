//! Dense CPU kernels
//!
//! # CPU Kernels
//!
//! This module holds the inner loops of the unmasked fast paths. Kernels work
//! on row-major `&[f64]` snapshots of the logical matrix contents and return a
//! fresh row-major buffer; callers scatter that buffer into the result matrix
//! one cell at a time, so a kernel never touches shared storage.
//!
//! ## Features
//!
//! - Sequential and [`rayon`](https://docs.rs/rayon) parallel variants of every kernel
//! - Both variants run the same per-row routine, so they agree bit for bit
//!
//! ## Implemented Kernels
//!
//! - `dot`: inner products of rows and columns, `m×k · k×n`
//! - `correlate`: stride-aligned sliding-window sums for convolution and
//!   cross-correlation
//!
//! ## Design Goals
//!
//! - Deterministic results regardless of the thread pool's scheduling
//! - Modular: kernels are separate from backend dispatching

use rayon::prelude::*;

/// Geometry of one convolution or cross-correlation pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Correlation {
    pub input_columns: usize,
    pub filter_rows: usize,
    pub filter_columns: usize,
    pub output_rows: usize,
    pub output_columns: usize,
    pub stride: usize,
    pub dilation: usize,
    /// Convolution flips the filter in both dimensions.
    pub flip: bool,
}

impl Correlation {
    /// Filter row read by tap `i`.
    #[inline]
    pub fn filter_row(&self, i: usize) -> usize {
        if self.flip { self.filter_rows - 1 - i } else { i }
    }

    /// Filter column read by tap `j`.
    #[inline]
    pub fn filter_column(&self, j: usize) -> usize {
        if self.flip { self.filter_columns - 1 - j } else { j }
    }

    /// True if a filter index takes part under the configured dilation.
    #[inline]
    pub fn is_tap(&self, filter_index: usize) -> bool {
        filter_index % self.dilation == 0
    }
}

#[inline]
fn dot_row(a: &[f64], b: &[f64], k: usize, n: usize, i: usize, row: &mut [f64]) {
    for (j, out) in row.iter_mut().enumerate() {
        let mut sum = 0.0;
        for l in 0..k {
            sum += a[i * k + l] * b[l * n + j];
        }
        *out = sum;
    }
}

/// Computes `A × B` for row-major `A: m×k` and `B: k×n`.
///
/// # Panics
/// - If the buffer lengths disagree with the given extents.
pub(crate) fn dot(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    assert_eq!(a.len(), m * k, "dot: left operand length mismatch");
    assert_eq!(b.len(), k * n, "dot: right operand length mismatch");
    let mut out = vec![0.0; m * n];
    if n == 0 {
        return out;
    }
    out.chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| dot_row(a, b, k, n, i, row));
    out
}

/// Parallel [`dot`], one output row per rayon task.
///
/// # Panics
/// - If the buffer lengths disagree with the given extents.
pub(crate) fn par_dot(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    assert_eq!(a.len(), m * k, "dot: left operand length mismatch");
    assert_eq!(b.len(), k * n, "dot: right operand length mismatch");
    let mut out = vec![0.0; m * n];
    if n == 0 {
        return out;
    }
    out.par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| dot_row(a, b, k, n, i, row));
    out
}

#[inline]
fn correlate_row(input: &[f64], filter: &[f64], geometry: &Correlation, r: usize, row: &mut [f64]) {
    if r % geometry.stride != 0 {
        return;
    }
    for c in (0..geometry.output_columns).step_by(geometry.stride) {
        let mut sum = 0.0;
        for i in 0..geometry.filter_rows {
            let fi = geometry.filter_row(i);
            if !geometry.is_tap(fi) {
                continue;
            }
            for j in 0..geometry.filter_columns {
                let fj = geometry.filter_column(j);
                if !geometry.is_tap(fj) {
                    continue;
                }
                sum += input[(r + i) * geometry.input_columns + c + j]
                    * filter[fi * geometry.filter_columns + fj];
            }
        }
        row[c] = sum;
    }
}

/// Sliding-window sums over a row-major input.
///
/// Only stride-aligned output cells are computed; the rest stay zero.
pub(crate) fn correlate(input: &[f64], filter: &[f64], geometry: &Correlation) -> Vec<f64> {
    let mut out = vec![0.0; geometry.output_rows * geometry.output_columns];
    if geometry.output_columns == 0 {
        return out;
    }
    out.chunks_mut(geometry.output_columns)
        .enumerate()
        .for_each(|(r, row)| correlate_row(input, filter, geometry, r, row));
    out
}

/// Parallel [`correlate`], one output row per rayon task.
pub(crate) fn par_correlate(input: &[f64], filter: &[f64], geometry: &Correlation) -> Vec<f64> {
    let mut out = vec![0.0; geometry.output_rows * geometry.output_columns];
    if geometry.output_columns == 0 {
        return out;
    }
    out.par_chunks_mut(geometry.output_columns)
        .enumerate()
        .for_each(|(r, row)| correlate_row(input, filter, geometry, r, row));
    out
}
