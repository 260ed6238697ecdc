//! Error types emitted by the pooling kernel.

use thiserror::Error;

/// Pooling-specific error category.
#[derive(Debug, Error)]
pub enum PoolingError {
    /// The supplied tensor shapes do not align with the documented contract.
    #[error("invalid tensor shape: {context}")]
    InvalidShape { context: String },
    /// A tensor-backend failure propagated to the caller.
    #[error("{0}")]
    Backend(#[from] candle_core::Error),
}

impl PoolingError {
    pub(crate) fn shape(context: impl Into<String>) -> Self {
        Self::InvalidShape {
            context: context.into(),
        }
    }
}
