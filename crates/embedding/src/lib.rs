//! Token-vector sources for the classification head.
//!
//! The classifier only depends on the [`TokenVectorSource`] capability:
//! something that maps a `[batch, seq]` tensor of token ids to `[batch, seq,
//! hidden]` vectors and declares which id is padding. Two concrete variants
//! are provided: a trainable lookup table and a frozen table loaded from a
//! safetensors file.

pub mod pretrained;
pub mod provider;
pub mod table;

pub use pretrained::PretrainedEmbedding;
pub use provider::TokenVectorSource;
pub use table::{TokenEmbedding, TokenEmbeddingConfig};
