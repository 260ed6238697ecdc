//! Builders for additive key-padding masks.
//!
//! Masks are additive `f32` tensors shaped `[batch, 1, q_len, k_len + 1]`:
//! zero where a key may be attended, negative infinity where it must be
//! ignored. The extra trailing column covers the always-present zero
//! attention key, which is never masked.

use candle_core::{DType, Device, Result, Tensor};

/// Dtype shared by all additive masks.
pub const MASK_DTYPE: DType = DType::F32;

/// Builds a key-padding mask from per-position padding indicators.
///
/// Each inner slice corresponds to a batch element; `true` marks a padded
/// (masked) key position. All slices must share the same length.
pub fn key_padding_mask(
    device: &Device,
    padding: &[Vec<bool>],
    q_len: usize,
) -> Result<Tensor> {
    let batch = padding.len();
    let k_len = padding.first().map(|row| row.len()).unwrap_or(0);
    for row in padding {
        assert_eq!(row.len(), k_len, "all padding rows must share k_len");
    }

    // k_len + 1 keys: the last column is the zero-attention key.
    let total = batch * q_len * (k_len + 1);
    let mut data = vec![0f32; total];
    for (b, row) in padding.iter().enumerate() {
        for q in 0..q_len {
            let row_start = ((b * q_len) + q) * (k_len + 1);
            for (k, &is_padding) in row.iter().enumerate() {
                if is_padding {
                    data[row_start + k] = f32::NEG_INFINITY;
                }
            }
        }
    }

    Tensor::from_vec(data, (batch, 1, q_len, k_len + 1), device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_key_column_is_never_masked() -> Result<()> {
        let device = Device::Cpu;
        let padding = vec![vec![false, true, true], vec![true, true, true]];
        let mask = key_padding_mask(&device, &padding, 2)?;
        assert_eq!(mask.dims(), &[2, 1, 2, 4]);

        let flat = mask.flatten_all()?.to_vec1::<f32>()?;
        for (idx, value) in flat.iter().enumerate() {
            let col = idx % 4;
            if col == 3 {
                assert_eq!(*value, 0.0, "zero key masked at {idx}");
            }
        }
        Ok(())
    }

    #[test]
    fn padded_positions_receive_negative_infinity() -> Result<()> {
        let device = Device::Cpu;
        let padding = vec![vec![false, false, true, true]];
        let mask = key_padding_mask(&device, &padding, 3)?;
        let flat = mask.flatten_all()?.to_vec1::<f32>()?;
        for q in 0..3 {
            let row = &flat[q * 5..(q + 1) * 5];
            assert_eq!(row[0], 0.0);
            assert_eq!(row[1], 0.0);
            assert_eq!(row[2], f32::NEG_INFINITY);
            assert_eq!(row[3], f32::NEG_INFINITY);
            assert_eq!(row[4], 0.0);
        }
        Ok(())
    }
}
