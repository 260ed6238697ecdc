//! Dense affine projections with explicit initialisation policies.
//!
//! Linear layers accept inputs shaped `(batch, seq, in_dim)` or `(rows,
//! in_dim)` and return the same layout with the last axis mapped to
//! `out_dim`. Parameters live in [`Var`] storage so an external optimizer can
//! update them between forward passes; the forward pass itself never mutates
//! them.

use candle_core::{DType, Device, Error, Result, Tensor, Var};

use crate::checks;

/// Configuration for a dense projection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Output feature dimension.
    pub output_dim: usize,
    /// Whether a learnable bias vector should be applied.
    pub bias: bool,
}

impl LinearConfig {
    /// Creates a configuration for a biased projection.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: true,
        }
    }
}

/// Supported weight initialisation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearInit {
    /// Xavier/Glorot uniform initialisation over fan-in and fan-out.
    XavierUniform,
    /// Xavier/Glorot normal initialisation.
    XavierNormal,
}

impl LinearInit {
    /// Samples a `(out_dim, in_dim)` weight tensor under this policy.
    pub fn sample(&self, shape: (usize, usize), device: &Device, dtype: DType) -> Result<Tensor> {
        let (out_dim, in_dim) = shape;
        let (fan_in, fan_out) = (in_dim as f64, out_dim as f64);
        let weight = match self {
            LinearInit::XavierUniform => {
                let bound = (6.0f64 / (fan_in + fan_out)).sqrt();
                Tensor::rand(-bound as f32, bound as f32, shape, device)?
            }
            LinearInit::XavierNormal => {
                let std = (2.0f64 / (fan_in + fan_out)).sqrt();
                Tensor::randn(0f32, std as f32, shape, device)?
            }
        };
        if dtype == DType::F32 {
            Ok(weight)
        } else {
            weight.to_dtype(dtype)
        }
    }
}

/// Dense affine projection with optional bias.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    init: LinearInit,
    weight: Var,
    bias: Option<Var>,
}

impl Linear {
    /// Builds a linear layer with freshly sampled weights following `init`.
    pub fn with_init(
        config: LinearConfig,
        init: LinearInit,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let weight = init.sample((config.output_dim, config.input_dim), device, dtype)?;
        let bias = if config.bias {
            Some(Var::from_tensor(&Tensor::zeros(
                config.output_dim,
                dtype,
                device,
            )?)?)
        } else {
            None
        };
        Ok(Self {
            config,
            init,
            weight: Var::from_tensor(&weight)?,
            bias,
        })
    }

    /// Returns the static configuration used to validate inputs.
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Returns a clone of the underlying weight tensor.
    pub fn weight(&self) -> Tensor {
        self.weight.as_tensor().clone()
    }

    /// Returns a clone of the bias tensor if present.
    pub fn bias(&self) -> Option<Tensor> {
        self.bias.as_ref().map(|b| b.as_tensor().clone())
    }

    /// Re-samples the weight under the construction policy and zeroes the bias.
    pub fn reset_parameters(&self) -> Result<()> {
        let shape = (self.config.output_dim, self.config.input_dim);
        let fresh = self
            .init
            .sample(shape, self.weight.device(), self.weight.dtype())?;
        self.weight.set(&fresh)?;
        if let Some(bias) = &self.bias {
            let zeros = Tensor::zeros(self.config.output_dim, bias.dtype(), bias.device())?;
            bias.set(&zeros)?;
        }
        Ok(())
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = vec![(format!("{scope}.weight"), self.weight.clone())];
        if let Some(bias) = &self.bias {
            params.push((format!("{scope}.bias"), bias.clone()));
        }
        params
    }

    /// Applies the projection to a rank-2 or rank-3 input.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let weight_t = self.weight.as_tensor().t()?;
        let dims = hidden.dims();

        let mut output = match dims {
            [batch, seq, hidden_dim] => {
                if *hidden_dim != self.config.input_dim {
                    return Err(Error::Msg(format!(
                        "expected last dim {} but received {}",
                        self.config.input_dim, hidden_dim
                    )));
                }
                checks::expect_batch_seq_hidden(hidden, self.config.input_dim)?;
                let flat = hidden.reshape((*batch * *seq, self.config.input_dim))?;
                let proj = flat.matmul(&weight_t)?;
                proj.reshape((*batch, *seq, self.config.output_dim))?
            }
            [rows, hidden_dim] => {
                if *hidden_dim != self.config.input_dim {
                    return Err(Error::Msg(format!(
                        "expected last dim {} but received {}",
                        self.config.input_dim, hidden_dim
                    )));
                }
                hidden.matmul(&weight_t)?
            }
            _ => {
                return Err(Error::Msg(
                    "linear expects input shaped [B, T, H_in] or [T, H_in]".to_string(),
                ))
            }
        };

        if let Some(bias) = &self.bias {
            output = output.broadcast_add(bias.as_tensor())?;
        }
        Ok(output)
    }
}
