//! Sentence-level classification head built on query-attention pooling.
//!
//! A bank of learned class queries (one per label) attends over the
//! padding-masked token vectors of each sequence, and each pooled vector is
//! layer-normalised and projected to a scalar, yielding one score per label
//! per batch element. Token vectors come from any
//! [`embedding::TokenVectorSource`], injected at construction.
//!
//! The forward pass is a pure function of the token ids and the learned
//! parameters; training/inference mode is an explicit argument, not hidden
//! object state.

pub mod config;
pub mod error;
pub mod model;

pub use config::ClassifierConfig;
pub use error::{ClassifierError, Result};
pub use model::SentenceClassifier;
