//! The capability the classifier depends on, plus shared lookup plumbing.

use candle_core::{DType, Error, Result, Tensor, Var};
use layers::checks;

/// Produces per-token vectors given token ids and exposes a padding id.
///
/// Implementations must be pure with respect to their parameters: a forward
/// call never mutates state, so concurrent forwards on one source are safe.
pub trait TokenVectorSource: Send + Sync {
    /// Dimensionality of the vectors this source produces.
    fn hidden_dim(&self) -> usize;

    /// The token id that marks padding positions.
    fn padding_id(&self) -> u32;

    /// Maps `[batch, seq]` integer token ids to `[batch, seq, hidden]` vectors.
    fn forward(&self, token_ids: &Tensor) -> Result<Tensor>;

    /// Trainable parameters, empty for frozen sources.
    fn named_parameters(&self, _scope: &str) -> Vec<(String, Var)> {
        Vec::new()
    }
}

/// Validates a `[batch, seq]` integer id tensor.
pub(crate) fn validate_token_ids(token_ids: &Tensor) -> Result<()> {
    checks::expect_rank(token_ids, 2)?;
    let dims = token_ids.dims();
    if dims[0] == 0 || dims[1] == 0 {
        return Err(Error::Msg(
            "token_ids must have non-zero batch and seq dimensions".to_string(),
        ));
    }
    if !token_ids.dtype().is_int() {
        return Err(Error::Msg(format!(
            "token_ids expected integer dtype but received {:?}",
            token_ids.dtype()
        )));
    }
    Ok(())
}

/// Gathers rows of `weight` for each id, reshaping to `[batch, seq, hidden]`.
pub(crate) fn lookup(weight: &Tensor, token_ids: &Tensor, vocab_size: usize) -> Result<Tensor> {
    validate_token_ids(token_ids)?;
    let dims = token_ids.dims().to_vec();
    let hidden_dim = weight.dims()[1];

    let flat = token_ids.to_dtype(DType::I64)?.flatten_all()?;
    let min_id = flat.min_all()?.to_scalar::<i64>()?;
    if min_id < 0 {
        return Err(Error::Msg(format!(
            "encountered negative token id {min_id}"
        )));
    }
    let max_id = flat.max_all()?.to_scalar::<i64>()?;
    if max_id >= vocab_size as i64 {
        return Err(Error::Msg(format!(
            "token id {max_id} exceeds vocab size {vocab_size}"
        )));
    }

    let gathered = weight.index_select(&flat, 0)?;
    let mut output_dims = dims;
    output_dims.push(hidden_dim);
    gathered.reshape(output_dims)
}
