//! Kernel Dispatch Layer
//!
//! This module selects the sequential or parallel CPU kernel at runtime for
//! each unmasked fast path, based on the global [`Backend`].
//!
//! # Design Highlights
//! - **Pluggable**: a new backend only needs one more match arm per kernel
//! - **Minimal overhead**: one atomic load per operation
//! - **Deterministic**: every backend returns the same bits
//!
//! # Example
//! ```rust
//! use briny_matrix::backend::{set_backend, Backend};
//! use briny_matrix::matrix;
//!
//! set_backend(Backend::Parallel);
//! let a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
//! let b = matrix!([[5.0], [6.0]]);
//! assert_eq!(a.dot(&b).unwrap().to_vec(), vec![17.0, 39.0]);
//! set_backend(Backend::Sequential);
//! ```

use crate::backend::{Backend, get_backend};

use super::cpu::{self, Correlation};

/// Dispatches `A × B` to the selected backend.
pub(crate) fn dot(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    match get_backend() {
        Backend::Parallel => cpu::par_dot(a, b, m, k, n),
        Backend::Sequential => cpu::dot(a, b, m, k, n),
    }
}

/// Dispatches a sliding-window pass to the selected backend.
pub(crate) fn correlate(input: &[f64], filter: &[f64], geometry: &Correlation) -> Vec<f64> {
    match get_backend() {
        Backend::Parallel => cpu::par_correlate(input, filter, geometry),
        Backend::Sequential => cpu::correlate(input, filter, geometry),
    }
}

/// Name of the active backend for trace logging.
pub(crate) fn path_name() -> &'static str {
    match get_backend() {
        Backend::Parallel => "parallel",
        Backend::Sequential => "unmasked",
    }
}
