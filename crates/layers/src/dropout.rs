//! Inverted dropout gated by an explicit training flag.
//!
//! The caller owns the train/inference decision and passes it to every
//! forward call; there is no hidden mode state on the layer itself. In
//! inference mode the layer is the identity function.

use candle_core::{Error, Result, Tensor};
use candle_nn::ops;

/// Elementwise dropout with inverted scaling (survivors scaled by 1/(1-p)).
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    /// Creates a dropout layer; `p` must lie in `[0, 1)`.
    pub fn new(p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::Msg(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }
        Ok(Self { p })
    }

    /// Returns the configured drop probability.
    pub fn p(&self) -> f32 {
        self.p
    }

    /// Applies dropout when `train` is set, otherwise returns the input as-is.
    pub fn forward(&self, hidden: &Tensor, train: bool) -> Result<Tensor> {
        if train && self.p > 0.0 {
            ops::dropout(hidden, self.p)
        } else {
            Ok(hidden.clone())
        }
    }
}
