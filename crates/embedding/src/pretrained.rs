//! Frozen embedding table loaded from a safetensors file.
//!
//! Stands in for a pretrained sub-model: the table is read once from disk
//! and never updated, so [`TokenVectorSource::named_parameters`] stays empty
//! and an external optimizer has nothing to touch here.

use std::path::Path;

use candle_core::{safetensors, Device, Error, Result, Tensor};

use crate::provider::{lookup, TokenVectorSource};

/// Tensor name expected inside the safetensors file.
const WEIGHT_KEY: &str = "weight";

/// Read-only embedding table backed by pretrained weights.
#[derive(Debug, Clone)]
pub struct PretrainedEmbedding {
    weight: Tensor,
    vocab_size: usize,
    hidden_dim: usize,
    padding_id: u32,
}

impl PretrainedEmbedding {
    /// Loads the `"weight"` tensor from a safetensors file at `path`.
    pub fn load<P: AsRef<Path>>(path: P, padding_id: u32, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        let tensors = safetensors::load(path, device)?;
        let weight = tensors.get(WEIGHT_KEY).ok_or_else(|| {
            Error::Msg(format!(
                "safetensors file {} is missing the '{WEIGHT_KEY}' tensor",
                path.display()
            ))
        })?;
        let (vocab_size, hidden_dim) = weight.dims2()?;
        if padding_id as usize >= vocab_size {
            return Err(Error::Msg(format!(
                "padding id {padding_id} is outside the vocabulary of size {vocab_size}"
            )));
        }

        log::info!(
            "embedding::pretrained loaded path={} vocab={} hidden={} dtype={:?}",
            path.display(),
            vocab_size,
            hidden_dim,
            weight.dtype()
        );

        Ok(Self {
            weight: weight.clone(),
            vocab_size,
            hidden_dim,
            padding_id,
        })
    }

    /// Wraps an already materialised `[vocab, hidden]` table.
    pub fn from_weight(weight: Tensor, padding_id: u32) -> Result<Self> {
        let (vocab_size, hidden_dim) = weight.dims2()?;
        if padding_id as usize >= vocab_size {
            return Err(Error::Msg(format!(
                "padding id {padding_id} is outside the vocabulary of size {vocab_size}"
            )));
        }
        Ok(Self {
            weight,
            vocab_size,
            hidden_dim,
            padding_id,
        })
    }

    /// Returns a clone of the frozen weight tensor.
    pub fn weight(&self) -> Tensor {
        self.weight.clone()
    }
}

impl TokenVectorSource for PretrainedEmbedding {
    fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    fn padding_id(&self) -> u32 {
        self.padding_id
    }

    fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        lookup(&self.weight, token_ids, self.vocab_size)
    }
}
