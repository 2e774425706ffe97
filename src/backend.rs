//! Execution backend selection.
//!
//! This module defines how the unmasked fast paths of the heavier kernels are
//! executed and provides functions to set and get the current backend.
//!
//! # Supported Backends
//!
//! - `Sequential`: plain nested loops on the calling thread (default).
//! - `Parallel`: output rows are distributed over the `rayon` thread pool.
//!
//! The backend is stored globally using an `AtomicU8`, enabling fast
//! switching between modes at runtime.
//!
//! # Scope
//!
//! Only kernels with no mask on any participant consult the backend: the dot
//! product and forward convolution / cross-correlation. Masked iteration is
//! always sequential. Both backends produce bit-identical results, because each
//! output cell is still reduced in the same order by a single thread.

use core::sync::atomic::{AtomicU8, Ordering};

/// Enumeration of supported execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// Single-threaded execution (default).
    #[default]
    Sequential = 0,
    /// Row-parallel execution on the `rayon` global pool.
    Parallel,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sequential),
            1 => Ok(Self::Parallel),
            _ => Err(()),
        }
    }
}

/// Internal global state for the active backend.
static GLOBAL_BACKEND: AtomicU8 = AtomicU8::new(Backend::Sequential as u8);

/// Sets the active backend for unmasked kernels.
///
/// # Example
///
/// ```
/// use briny_matrix::backend::{set_backend, get_backend, Backend};
/// set_backend(Backend::Parallel);
/// assert_eq!(get_backend(), Backend::Parallel);
/// set_backend(Backend::Sequential);
/// ```
pub fn set_backend(b: Backend) {
    log::debug!("switching execution backend to {b:?}");
    GLOBAL_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the currently active execution backend.
///
/// If the stored value is invalid, defaults to [`Backend::Sequential`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}
