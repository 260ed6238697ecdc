//! Multi-head query-attention pooling.
//!
//! A fixed bank of learned query vectors attends over a batch of token
//! representations shaped `[batch, seq_len, model_dim]` and produces one
//! pooled vector per query per batch element. An all-zero key/value pair is
//! always appended before masking, so the softmax stays well defined even
//! when every real position of a sequence is masked out.
//!
//! Attention weights are computed with the numerically stable softmax from
//! `candle_nn` (per-row maximum subtracted before exponentiation) and are
//! discarded unless the caller explicitly asks for them via
//! [`QueryAttentionPooling::forward_with_weights`].

pub mod attn;
pub mod errors;
pub mod masks;

pub use attn::{PoolingConfig, QueryAttentionPooling};
pub use errors::PoolingError;
