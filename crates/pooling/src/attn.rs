//! Scaled dot-product attention between a learned query bank and token keys.

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::ops::softmax_last_dim;
use layers::{Linear, LinearConfig, LinearInit};

use crate::errors::PoolingError;
use crate::masks::MASK_DTYPE;

/// Structural configuration for the pooling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolingConfig {
    /// Width of the query, key, and value vectors.
    pub model_dim: usize,
    /// Number of parallel attention heads.
    pub num_heads: usize,
}

impl PoolingConfig {
    pub fn new(model_dim: usize, num_heads: usize) -> Self {
        Self {
            model_dim,
            num_heads,
        }
    }

    /// Per-head dimension; only meaningful after [`Self::validate`] passes.
    pub fn head_dim(&self) -> usize {
        self.model_dim / self.num_heads
    }

    /// Validates structural invariants.
    pub fn validate(&self) -> Result<(), PoolingError> {
        if self.model_dim == 0 {
            return Err(PoolingError::shape("model_dim must be greater than zero"));
        }
        if self.num_heads == 0 {
            return Err(PoolingError::shape("num_heads must be greater than zero"));
        }
        if self.model_dim % self.num_heads != 0 {
            return Err(PoolingError::shape(format!(
                "model_dim ({}) must be divisible by num_heads ({})",
                self.model_dim, self.num_heads
            )));
        }
        Ok(())
    }
}

/// Multi-head attention that pools token representations under a query bank.
///
/// Queries are shared across the batch: the same `[num_queries, model_dim]`
/// bank attends over every batch element. Keys and values always gain one
/// appended all-zero entry so at least one unmasked position exists.
#[derive(Debug, Clone)]
pub struct QueryAttentionPooling {
    config: PoolingConfig,
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
}

impl QueryAttentionPooling {
    /// Builds the kernel with Xavier-uniform in/out projections.
    pub fn new(config: PoolingConfig, dtype: DType, device: &Device) -> Result<Self, PoolingError> {
        config.validate()?;
        let proj = || -> Result<Linear, PoolingError> {
            let cfg = LinearConfig::new(config.model_dim, config.model_dim);
            Ok(Linear::with_init(
                cfg,
                LinearInit::XavierUniform,
                dtype,
                device,
            )?)
        };
        Ok(Self {
            config,
            q_proj: proj()?,
            k_proj: proj()?,
            v_proj: proj()?,
            out_proj: proj()?,
        })
    }

    /// Returns the structural configuration.
    pub fn config(&self) -> &PoolingConfig {
        &self.config
    }

    /// Re-samples every projection under the construction policy.
    pub fn reset_parameters(&self) -> Result<(), PoolingError> {
        self.q_proj.reset_parameters()?;
        self.k_proj.reset_parameters()?;
        self.v_proj.reset_parameters()?;
        self.out_proj.reset_parameters()?;
        Ok(())
    }

    /// Returns the trainable parameters with a scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = Vec::new();
        params.extend(self.q_proj.named_parameters(&format!("{scope}.q_proj")));
        params.extend(self.k_proj.named_parameters(&format!("{scope}.k_proj")));
        params.extend(self.v_proj.named_parameters(&format!("{scope}.v_proj")));
        params.extend(self.out_proj.named_parameters(&format!("{scope}.out_proj")));
        params
    }

    /// Pools `tokens` under `queries`, discarding the attention weights.
    ///
    /// - `queries`: `[num_queries, model_dim]`
    /// - `tokens`: `[batch, seq_len, model_dim]`
    /// - `mask`: optional additive mask `[batch, 1|heads, num_queries, seq_len + 1]`
    ///
    /// Returns `[batch, num_queries, model_dim]`.
    pub fn forward(
        &self,
        queries: &Tensor,
        tokens: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor, PoolingError> {
        let (pooled, _) = self.forward_with_weights(queries, tokens, mask)?;
        Ok(pooled)
    }

    /// Same as [`Self::forward`] but also returns the attention weights
    /// shaped `[batch, heads, num_queries, seq_len + 1]`, for inspection in
    /// test harnesses.
    pub fn forward_with_weights(
        &self,
        queries: &Tensor,
        tokens: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<(Tensor, Tensor), PoolingError> {
        let (num_queries, query_dim) = queries.dims2().map_err(|_| {
            PoolingError::shape("queries must have shape [num_queries, model_dim]")
        })?;
        let (batch, seq_len, token_dim) = tokens.dims3().map_err(|_| {
            PoolingError::shape("tokens must have shape [batch, seq_len, model_dim]")
        })?;
        let model_dim = self.config.model_dim;
        if query_dim != model_dim || token_dim != model_dim {
            return Err(PoolingError::shape(format!(
                "expected model_dim {model_dim}, got queries dim {query_dim} and tokens dim {token_dim}"
            )));
        }
        if batch == 0 || seq_len == 0 || num_queries == 0 {
            return Err(PoolingError::shape(
                "batch, seq_len, and num_queries must be non-zero",
            ));
        }
        if tokens.dtype() != queries.dtype() {
            return Err(PoolingError::shape(format!(
                "queries dtype {:?} does not match tokens dtype {:?}",
                queries.dtype(),
                tokens.dtype()
            )));
        }

        let heads = self.config.num_heads;
        let head_dim = self.config.head_dim();
        let k_len = seq_len + 1;

        // The query bank is identical for every batch element, so project it
        // once and broadcast over the batch afterwards.
        let q = self.q_proj.forward(queries)?;
        let q = q
            .reshape((num_queries, heads, head_dim))?
            .transpose(0, 1)?
            .contiguous()?
            .unsqueeze(0)?
            .broadcast_as((batch, heads, num_queries, head_dim))?
            .contiguous()?;

        let k = self.split_heads(&self.k_proj.forward(tokens)?, batch, seq_len)?;
        let v = self.split_heads(&self.v_proj.forward(tokens)?, batch, seq_len)?;

        // Always-present zero attention key/value pair.
        let zero = Tensor::zeros((batch, heads, 1, head_dim), k.dtype(), k.device())?;
        let k = Tensor::cat(&[&k, &zero], 2)?;
        let v = Tensor::cat(&[&v, &zero], 2)?;

        if let Some(mask) = mask {
            self.validate_mask(mask, batch, num_queries, k_len)?;
        }

        let scale = 1.0 / (head_dim as f64).sqrt();
        let mut scores = q
            .matmul(&k.transpose(2, 3)?.contiguous()?)?
            .affine(scale, 0.0)?;
        if let Some(mask) = mask {
            scores = scores.broadcast_add(mask)?;
        }

        let probs = softmax_last_dim(&scores)?;
        let context = probs.matmul(&v)?;
        let context = context
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, num_queries, model_dim))?;
        let pooled = self.out_proj.forward(&context)?;
        Ok((pooled, probs))
    }

    fn split_heads(
        &self,
        projected: &Tensor,
        batch: usize,
        seq_len: usize,
    ) -> Result<Tensor, PoolingError> {
        let heads = self.config.num_heads;
        let head_dim = self.config.head_dim();
        Ok(projected
            .reshape((batch, seq_len, heads, head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    fn validate_mask(
        &self,
        mask: &Tensor,
        batch: usize,
        num_queries: usize,
        k_len: usize,
    ) -> Result<(), PoolingError> {
        if mask.dtype() != MASK_DTYPE {
            return Err(PoolingError::shape(format!(
                "mask expects dtype {MASK_DTYPE:?}, got {:?}",
                mask.dtype()
            )));
        }
        let heads = self.config.num_heads;
        let (mb, mh, mq, mk) = mask.dims4().map_err(|_| {
            PoolingError::shape("mask must have shape [batch, heads|1, num_queries, k_len]")
        })?;
        if mb != batch || mq != num_queries || mk != k_len || (mh != 1 && mh != heads) {
            return Err(PoolingError::shape(format!(
                "mask shape mismatch: expected [{batch}, 1|{heads}, {num_queries}, {k_len}] got [{mb}, {mh}, {mq}, {mk}]"
            )));
        }
        Ok(())
    }
}
