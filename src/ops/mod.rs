//! # Matrix Operations
//!
//! Every operation on [`Matrix`](crate::Matrix) lives in one of these
//! submodules as an inherent `impl` block. They share one iteration discipline:
//! walk the target region in row-major order and skip whatever either
//! participant's mask excludes.
//!
//! ## Submodules
//!
//! - [`engine`]: the masked iteration walk and shared shape checks
//! - [`elementwise`]: unary and binary maps, arithmetic, named functions
//! - [`reduce`]: sums, moments, norms, extremes and derived transforms
//! - [`softmax`]: column-vector softmax, Gumbel-softmax and their gradient
//! - [`dot`]: masked matrix multiplication
//! - [`convolution`]: convolution, cross-correlation and their gradients
//! - [`pool`]: max, random, cyclic and average pooling and their gradients
//! - [`cpu`]: dense kernels for the unmasked fast paths
//! - [`dispatch`]: runtime choice between sequential and parallel kernels
//!
//! ## Error Ordering
//!
//! Shape and collaborator checks run before the first write, so a failed
//! operation leaves its result untouched.
//!
//! ## Notes
//!
//! - Only unmasked dot products and forward convolutions consult the
//!   [`backend`](crate::backend); every other path is sequential
//! - All backends produce the same bits for the same inputs

pub(crate) mod convolution;
pub(crate) mod cpu;
pub(crate) mod dispatch;
pub(crate) mod dot;
pub(crate) mod elementwise;
pub(crate) mod engine;
pub(crate) mod pool;
pub(crate) mod reduce;
pub(crate) mod softmax;
