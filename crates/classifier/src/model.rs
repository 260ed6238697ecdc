//! The assembled classification head.

use candle_core::{DType, Tensor, Var, D};
use embedding::TokenVectorSource;
use layers::{Dropout, LayerNorm, Linear, LinearConfig, LinearInit, NormConfig};
use pooling::masks::key_padding_mask;
use pooling::{PoolingConfig, QueryAttentionPooling};

use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, Result};

/// Attention-pooled sentence classifier.
///
/// Owns one learned query vector per label plus the pooling, normalisation,
/// and projection parameters. All parameters are exposed through
/// [`Self::named_parameters`] so an external optimizer can update them
/// between forward calls; a forward call itself never mutates them.
pub struct SentenceClassifier {
    config: ClassifierConfig,
    embedding: Box<dyn TokenVectorSource>,
    class_queries: Var,
    pooling: QueryAttentionPooling,
    norm: LayerNorm,
    dropout: Dropout,
    proj: Linear,
}

impl SentenceClassifier {
    /// Builds the head around an injected token-vector source.
    pub fn new(config: ClassifierConfig, embedding: Box<dyn TokenVectorSource>) -> Result<Self> {
        config.validate()?;
        if embedding.hidden_dim() != config.model_dim {
            return Err(ClassifierError::Configuration(format!(
                "embedding source produces dim {} but model_dim is {}",
                embedding.hidden_dim(),
                config.model_dim
            )));
        }

        let class_queries = Var::randn(
            0f32,
            1f32,
            (config.num_labels, config.model_dim),
            &config.device,
        )?;
        let class_queries = if class_queries.dtype() == config.dtype {
            class_queries
        } else {
            Var::from_tensor(&class_queries.to_dtype(config.dtype)?)?
        };

        let pooling = QueryAttentionPooling::new(
            PoolingConfig::new(config.model_dim, config.num_heads),
            config.dtype,
            &config.device,
        )?;
        let norm = LayerNorm::new(
            NormConfig {
                hidden_size: config.model_dim,
                epsilon: config.ln_eps,
            },
            config.dtype,
            &config.device,
        )?;
        let dropout = Dropout::new(config.dropout_p)?;
        let proj = Linear::with_init(
            LinearConfig::new(config.model_dim, 1),
            LinearInit::XavierUniform,
            config.dtype,
            &config.device,
        )?;

        log::info!(
            "classifier init num_labels={} model_dim={} num_heads={} dropout_p={} padding_id={}",
            config.num_labels,
            config.model_dim,
            config.num_heads,
            config.dropout_p,
            embedding.padding_id()
        );

        Ok(Self {
            config,
            embedding,
            class_queries,
            pooling,
            norm,
            dropout,
            proj,
        })
    }

    /// Returns the head configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Returns a clone of the class query bank, shaped `[num_labels, model_dim]`.
    pub fn class_queries(&self) -> Tensor {
        self.class_queries.as_tensor().clone()
    }

    /// Re-initialises every learned parameter of the head.
    ///
    /// Class queries are re-sampled from `N(0, 1)`, the scalar projection
    /// from Xavier uniform with a zeroed bias, the attention projections
    /// under their own policy, and the norm affine back to gain 1 / bias 0.
    /// The embedding source is left untouched.
    pub fn reset_parameters(&self) -> Result<()> {
        let fresh = Tensor::randn(
            0f32,
            1f32,
            (self.config.num_labels, self.config.model_dim),
            &self.config.device,
        )?
        .to_dtype(self.config.dtype)?;
        self.class_queries.set(&fresh)?;
        self.pooling.reset_parameters()?;
        self.norm.reset_parameters()?;
        self.proj.reset_parameters()?;
        Ok(())
    }

    /// Every trainable parameter of the head, including the embedding's.
    pub fn named_parameters(&self) -> Vec<(String, Var)> {
        let mut params = vec![("class_queries".to_string(), self.class_queries.clone())];
        params.extend(self.pooling.named_parameters("attn"));
        params.extend(self.norm.named_parameters("ln_q"));
        params.extend(self.proj.named_parameters("proj"));
        params.extend(self.embedding.named_parameters("embedding"));
        params
    }

    /// Scores a `[batch, seq]` batch of token ids, returning `[batch, num_labels]`.
    ///
    /// `train` enables the two dropout sites (embedding output and
    /// normalised pooled representation); pass `false` for deterministic
    /// inference.
    pub fn forward(&self, token_ids: &Tensor, train: bool) -> Result<Tensor> {
        let (tokens, mask) = self.embed(token_ids)?;
        let tokens = self.dropout.forward(&tokens, train)?;

        let pooled =
            self.pooling
                .forward(self.class_queries.as_tensor(), &tokens, mask.as_ref())?;

        let normalized = self.norm.forward(&pooled)?;
        let normalized = self.dropout.forward(&normalized, train)?;

        let scores = self.proj.forward(&normalized)?;
        Ok(scores.squeeze(D::Minus1)?)
    }

    /// Attention weights `[batch, heads, num_labels, seq + 1]` for a batch,
    /// computed in inference mode. Intended for test harnesses; the forward
    /// pass itself never materialises them for callers.
    pub fn attention_weights(&self, token_ids: &Tensor) -> Result<Tensor> {
        let (tokens, mask) = self.embed(token_ids)?;
        let (_, probs) = self.pooling.forward_with_weights(
            self.class_queries.as_tensor(),
            &tokens,
            mask.as_ref(),
        )?;
        Ok(probs)
    }

    /// Runs the embedding source and derives the key-padding mask.
    ///
    /// The mask is `None` when no sequence in the batch contains padding.
    fn embed(&self, token_ids: &Tensor) -> Result<(Tensor, Option<Tensor>)> {
        let (batch, seq_len) = token_ids.dims2().map_err(|_| {
            ClassifierError::ShapeMismatch(format!(
                "token_ids must have shape [batch, seq], got {:?}",
                token_ids.dims()
            ))
        })?;

        let padding_id = self.embedding.padding_id() as i64;
        let ids = token_ids.to_dtype(DType::I64)?.to_vec2::<i64>()?;
        let padding: Vec<Vec<bool>> = ids
            .iter()
            .map(|row| row.iter().map(|id| *id == padding_id).collect())
            .collect();
        let has_padding = padding.iter().flatten().any(|p| *p);

        let tokens = self.embedding.forward(token_ids)?;
        let dims = tokens.dims();
        if dims != [batch, seq_len, self.config.model_dim] {
            return Err(ClassifierError::ShapeMismatch(format!(
                "embedding source returned {:?}, expected [{batch}, {seq_len}, {}]",
                dims, self.config.model_dim
            )));
        }

        let mask = if has_padding {
            Some(key_padding_mask(
                &self.config.device,
                &padding,
                self.config.num_labels,
            )?)
        } else {
            None
        };
        Ok((tokens, mask))
    }
}
