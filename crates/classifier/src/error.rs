//! Error types surfaced by the classification head.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Construction-time rejection of an inconsistent configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Forward-time rejection of tensors whose dimensions disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error(transparent)]
    Pooling(#[from] pooling::PoolingError),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}
