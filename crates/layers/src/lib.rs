//! Building blocks for the attention-pooled classification head.
//!
//! This crate hosts the small trainable layers assembled by the classifier
//! crate: layer normalisation, dense affine projections with explicit
//! initialisation policies, and inverted dropout. Everything is built on
//! `candle_core` tensors following the `(batch, seq, hidden)` layout.

pub mod checks;
pub mod dropout;
pub mod linear;
pub mod norm;

pub use dropout::Dropout;
pub use linear::{Linear, LinearConfig, LinearInit};
pub use norm::{LayerNorm, NormConfig};
