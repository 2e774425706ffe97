//! Parameter initialization schemes.
//!
//! Each [`Initialization`] variant draws one value per cell. The fan-based
//! schemes derive their spread from the matrix extents; the `*Conv` variants
//! use caller-supplied input and output counts instead, since a filter's own
//! extents say nothing about the layer it belongs to.
//!
//! With `u ~ U[0, 1)` and `g ~ N(0, 1)`:
//!
//! | Scheme  | Normal            | Uniform                   |
//! |---------|-------------------|---------------------------|
//! | Xavier  | `g·√(2/(r+c))`    | `(2u−1)·√(6/(r+c))`       |
//! | He      | `g·√(2/r)`        | `(2u−1)·√(6/r)`           |
//! | LeCun   | `g·√(1/r)`        | `(2u−1)·√(3/r)`           |

use rand::Rng;
use rand_distr::StandardNormal;

/// How to fill a freshly created matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Initialization {
    #[default]
    Zero,
    One,
    Random,
    Identity,
    NormalXavier,
    UniformXavier,
    NormalHe,
    UniformHe,
    NormalLecun,
    UniformLecun,
    NormalXavierConv,
    UniformXavierConv,
    NormalHeConv,
    UniformHeConv,
    NormalLecunConv,
    UniformLecunConv,
}

impl Initialization {
    /// Spread of the distribution for a `rows × columns` matrix.
    ///
    /// Returns `1.0` for the schemes that do not scale.
    pub fn scale(&self, rows: usize, columns: usize, inputs: usize, outputs: usize) -> f64 {
        let (sum, fan) = if self.is_convolutional() {
            ((inputs + outputs) as f64, outputs as f64)
        } else {
            ((rows + columns) as f64, rows as f64)
        };
        match self {
            Self::NormalXavier | Self::NormalXavierConv => (2.0 / sum).sqrt(),
            Self::UniformXavier | Self::UniformXavierConv => (6.0 / sum).sqrt(),
            Self::NormalHe | Self::NormalHeConv => (2.0 / fan).sqrt(),
            Self::UniformHe | Self::UniformHeConv => (6.0 / fan).sqrt(),
            Self::NormalLecun | Self::NormalLecunConv => (1.0 / fan).sqrt(),
            Self::UniformLecun | Self::UniformLecunConv => (3.0 / fan).sqrt(),
            Self::Zero | Self::One | Self::Random | Self::Identity => 1.0,
        }
    }

    /// Draws the value of cell `(row, column)` given a precomputed `scale`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, row: usize, column: usize, scale: f64) -> f64 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::Random => rng.random::<f64>(),
            Self::Identity => {
                if row == column {
                    1.0
                } else {
                    0.0
                }
            }
            Self::NormalXavier
            | Self::NormalHe
            | Self::NormalLecun
            | Self::NormalXavierConv
            | Self::NormalHeConv
            | Self::NormalLecunConv => {
                let g: f64 = rng.sample(StandardNormal);
                g * scale
            }
            Self::UniformXavier
            | Self::UniformHe
            | Self::UniformLecun
            | Self::UniformXavierConv
            | Self::UniformHeConv
            | Self::UniformLecunConv => (2.0 * rng.random::<f64>() - 1.0) * scale,
        }
    }

    fn is_convolutional(&self) -> bool {
        matches!(
            self,
            Self::NormalXavierConv
                | Self::UniformXavierConv
                | Self::NormalHeConv
                | Self::UniformHeConv
                | Self::NormalLecunConv
                | Self::UniformLecunConv
        )
    }
}
