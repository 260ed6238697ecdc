//! Trainable token embedding table.

use candle_core::{bail, DType, Device, Result, Tensor, Var};

use crate::provider::{lookup, TokenVectorSource};

/// Configuration for building a token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbeddingConfig {
    /// Size of the vocabulary (number of distinct tokens).
    pub vocab_size: usize,
    /// Dimensionality of each embedding vector.
    pub hidden_dim: usize,
    /// Token id reserved for padding positions.
    pub padding_id: u32,
    /// Storage dtype used for the underlying parameters and outputs.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

/// Learnable token embedding table, sampled from `N(0, 1)` at construction.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Var,
}

impl TokenEmbedding {
    pub fn new(config: TokenEmbeddingConfig) -> Result<Self> {
        if config.vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if config.hidden_dim == 0 {
            bail!("token embedding requires hidden_dim > 0");
        }
        if config.padding_id as usize >= config.vocab_size {
            bail!(
                "padding id {} is outside the vocabulary of size {}",
                config.padding_id,
                config.vocab_size
            );
        }

        let shape = (config.vocab_size, config.hidden_dim);
        let initial = Var::randn(0f32, 1f32, shape, &config.device)?;
        let weight = if initial.dtype() == config.dtype {
            initial
        } else {
            let cast = initial.to_dtype(config.dtype)?;
            Var::from_tensor(&cast)?
        };

        Ok(Self { config, weight })
    }

    /// Returns the embedding configuration.
    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    /// Returns a clone of the underlying weight tensor.
    pub fn weight(&self) -> Tensor {
        self.weight.as_tensor().clone()
    }

    /// Re-samples the table from `N(0, 1)`.
    pub fn reset_parameters(&self) -> Result<()> {
        let shape = (self.config.vocab_size, self.config.hidden_dim);
        let fresh = Tensor::randn(0f32, 1f32, shape, &self.config.device)?
            .to_dtype(self.config.dtype)?;
        self.weight.set(&fresh)
    }
}

impl TokenVectorSource for TokenEmbedding {
    fn hidden_dim(&self) -> usize {
        self.config.hidden_dim
    }

    fn padding_id(&self) -> u32 {
        self.config.padding_id
    }

    fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        lookup(
            self.weight.as_tensor(),
            token_ids,
            self.config.vocab_size,
        )
    }

    fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let prefix = if scope.is_empty() { "embedding" } else { scope };
        vec![(format!("{prefix}.weight"), self.weight.clone())]
    }
}
