use candle_core::{DType, Device};

use crate::error::ClassifierError;

/// Default width of the pooled representation.
pub const DEFAULT_MODEL_DIM: usize = 2048;
/// Default number of attention heads used by the pooling stage.
pub const DEFAULT_NUM_HEADS: usize = 16;
/// Default drop probability applied around the pooled representation.
pub const DEFAULT_DROPOUT_P: f32 = 0.5;

/// High-level configuration for assembling the classification head.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub num_labels: usize,
    pub model_dim: usize,
    pub num_heads: usize,
    pub dropout_p: f32,
    pub ln_eps: f64,
    pub dtype: DType,
    pub device: Device,
}

impl ClassifierConfig {
    /// Creates a configuration with the stock hyperparameters.
    pub fn new(num_labels: usize, device: Device) -> Self {
        Self {
            num_labels,
            model_dim: DEFAULT_MODEL_DIM,
            num_heads: DEFAULT_NUM_HEADS,
            dropout_p: DEFAULT_DROPOUT_P,
            ln_eps: 1e-5,
            dtype: DType::F32,
            device,
        }
    }

    /// Validates structural invariants before any parameter is allocated.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.num_labels == 0 {
            return Err(ClassifierError::Configuration(
                "num_labels must be greater than zero".to_string(),
            ));
        }
        if self.model_dim == 0 {
            return Err(ClassifierError::Configuration(
                "model_dim must be greater than zero".to_string(),
            ));
        }
        if self.num_heads == 0 {
            return Err(ClassifierError::Configuration(
                "num_heads must be greater than zero".to_string(),
            ));
        }
        if self.model_dim % self.num_heads != 0 {
            return Err(ClassifierError::Configuration(format!(
                "model_dim ({}) must be divisible by num_heads ({})",
                self.model_dim, self.num_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout_p) {
            return Err(ClassifierError::Configuration(format!(
                "dropout_p must be in [0, 1), got {}",
                self.dropout_p
            )));
        }
        if self.ln_eps <= 0.0 {
            return Err(ClassifierError::Configuration(
                "ln_eps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
