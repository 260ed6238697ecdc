//! Lightweight validation helpers shared across layer components.
//!
//! These routines provide concise shape assertions that can be wired into
//! constructors or forward paths. They return `candle_core::Result<()>` so
//! call sites can propagate errors without panicking.

use candle_core::{Error, Result, Tensor};

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims().to_vec();
    if actual.as_slice() == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "expected shape {:?}, got {:?}",
            expected, actual
        )))
    }
}

/// Ensures a tensor has the expected number of dimensions.
pub fn expect_rank(tensor: &Tensor, rank: usize) -> Result<()> {
    if tensor.rank() == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "expected rank {}, got shape {:?}",
            rank,
            tensor.dims()
        )))
    }
}

/// Validates the `(batch, seq, hidden)` convention with a known hidden size.
pub fn expect_batch_seq_hidden(tensor: &Tensor, hidden: usize) -> Result<()> {
    let dims = tensor.dims().to_vec();
    match dims.as_slice() {
        [batch, seq, actual_hidden] if *actual_hidden == hidden => {
            if *batch == 0 || *seq == 0 {
                Err(Error::Msg(
                    "batch/seq dimensions must be non-zero".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        _ => Err(Error::Msg(format!(
            "expected (batch, seq, {}) layout, got {:?}",
            hidden, dims
        ))),
    }
}
