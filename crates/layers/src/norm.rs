//! Layer normalisation over the last axis.
//!
//! Inputs follow the `(batch, seq, hidden)` convention. Statistics (mean,
//! variance) are computed along the hidden axis only, then a learned
//! elementwise affine transform is applied. The affine parameters start at
//! gain = 1 and bias = 0 so a freshly built layer is a pure standardisation.

use candle_core::{DType, Device, Result, Tensor, Var, D};

use crate::checks;

/// Configuration shared by normalisation layers.
#[derive(Debug, Clone, PartialEq)]
pub struct NormConfig {
    /// Size of the hidden dimension being normalised.
    pub hidden_size: usize,
    /// Numeric stabiliser added to the variance before the square root.
    pub epsilon: f64,
}

impl NormConfig {
    /// Creates a configuration with the default epsilon.
    pub fn new(hidden_size: usize) -> Self {
        Self {
            hidden_size,
            epsilon: 1e-5,
        }
    }
}

/// LayerNorm with learnable scale and shift parameters.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    config: NormConfig,
    weight: Option<Var>,
    bias: Option<Var>,
}

impl LayerNorm {
    /// Builds an affine LayerNorm with gain initialised to 1 and bias to 0.
    pub fn new(config: NormConfig, dtype: DType, device: &Device) -> Result<Self> {
        let weight = Var::from_tensor(&Tensor::ones(config.hidden_size, dtype, device)?)?;
        let bias = Var::from_tensor(&Tensor::zeros(config.hidden_size, dtype, device)?)?;
        Ok(Self {
            config,
            weight: Some(weight),
            bias: Some(bias),
        })
    }

    /// Builds a LayerNorm without affine parameters (gain = 1, bias = 0).
    pub fn without_affine(config: NormConfig) -> Self {
        Self {
            config,
            weight: None,
            bias: None,
        }
    }

    /// Returns the configuration so callers can check shape compatibility.
    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    /// Restores the affine parameters to their initial values.
    pub fn reset_parameters(&self) -> Result<()> {
        if let Some(weight) = &self.weight {
            let ones = Tensor::ones(self.config.hidden_size, weight.dtype(), weight.device())?;
            weight.set(&ones)?;
        }
        if let Some(bias) = &self.bias {
            let zeros = Tensor::zeros(self.config.hidden_size, bias.dtype(), bias.device())?;
            bias.set(&zeros)?;
        }
        Ok(())
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = Vec::new();
        if let Some(weight) = &self.weight {
            params.push((format!("{scope}.weight"), weight.clone()));
        }
        if let Some(bias) = &self.bias {
            params.push((format!("{scope}.bias"), bias.clone()));
        }
        params
    }

    /// Applies the normalisation to a `(batch, seq, hidden)` tensor.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden(hidden, self.config.hidden_size)?;

        let hidden_size = self.config.hidden_size as f64;
        let mean = (hidden.sum_keepdim(D::Minus1)? / hidden_size)?;
        let centered = hidden.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden_size)?;
        let denom = (variance + self.config.epsilon)?.sqrt()?;
        let mut normalized = centered.broadcast_div(&denom)?;

        if let Some(weight) = &self.weight {
            normalized = normalized.broadcast_mul(weight.as_tensor())?;
        }
        if let Some(bias) = &self.bias {
            normalized = normalized.broadcast_add(bias.as_tensor())?;
        }
        Ok(normalized)
    }
}
