use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var};
use classifier::{ClassifierConfig, ClassifierError, SentenceClassifier};
use embedding::{PretrainedEmbedding, TokenEmbedding, TokenEmbeddingConfig, TokenVectorSource};

const PADDING_ID: u32 = 0;

fn build_config(num_labels: usize) -> ClassifierConfig {
    let mut config = ClassifierConfig::new(num_labels, Device::Cpu);
    config.model_dim = 8;
    config.num_heads = 2;
    config
}

fn build_table(hidden_dim: usize) -> Result<Box<dyn TokenVectorSource>> {
    let table = TokenEmbedding::new(TokenEmbeddingConfig {
        vocab_size: 12,
        hidden_dim,
        padding_id: PADDING_ID,
        dtype: DType::F32,
        device: Device::Cpu,
    })?;
    Ok(Box::new(table))
}

fn build_classifier(num_labels: usize) -> Result<SentenceClassifier> {
    Ok(SentenceClassifier::new(
        build_config(num_labels),
        build_table(8)?,
    )?)
}

/// Batch of two sequences with lengths [4, 2], padded to length 4.
fn build_batch() -> Result<Tensor> {
    Ok(Tensor::from_slice(
        &[2i64, 3, 4, 5, 6, 7, 0, 0],
        (2, 4),
        &Device::Cpu,
    )?)
}

#[test]
fn scores_have_one_scalar_per_label() -> Result<()> {
    let head = build_classifier(3)?;
    let scores = head.forward(&build_batch()?, false)?;

    assert_eq!(scores.dims(), &[2, 3]);
    assert_eq!(scores.dtype(), DType::F32);
    let values = scores.flatten_all()?.to_vec1::<f32>()?;
    assert!(values.iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn padded_positions_contribute_no_attention() -> Result<()> {
    let head = build_classifier(3)?;
    let probs = head.attention_weights(&build_batch()?)?;

    // [batch=2, heads=2, labels=3, keys=4+1]
    assert_eq!(probs.dims(), &[2, 2, 3, 5]);
    let flat = probs.flatten_all()?.to_vec1::<f32>()?;

    let (b, k_len) = (1, 5);
    for h in 0..2 {
        for label in 0..3 {
            for k in [2, 3] {
                let idx = (((b * 2 + h) * 3) + label) * k_len + k;
                assert!(flat[idx] < 1e-6, "padded key got weight {}", flat[idx]);
            }
        }
    }

    // Weights still normalise to 1 per (batch, head, label) row.
    let sums = probs
        .sum(candle_core::D::Minus1)?
        .flatten_all()?
        .to_vec1::<f32>()?;
    assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
    Ok(())
}

#[test]
fn token_order_does_not_change_scores() -> Result<()> {
    let head = build_classifier(3)?;
    let scores = head.forward(&build_batch()?, false)?;

    // Swap the first two real tokens of the fully valid sequence.
    let swapped = Tensor::from_slice(&[3i64, 2, 4, 5, 6, 7, 0, 0], (2, 4), &Device::Cpu)?;
    let scores_swapped = head.forward(&swapped, false)?;

    let diff = scores
        .sub(&scores_swapped)?
        .abs()?
        .max_all()?
        .to_vec0::<f32>()?;
    assert!(diff < 1e-5, "scores moved by {diff} under permutation");
    Ok(())
}

#[test]
fn inference_is_deterministic() -> Result<()> {
    let head = build_classifier(4)?;
    let batch = build_batch()?;

    let first = head.forward(&batch, false)?;
    let second = head.forward(&batch, false)?;
    let diff = first.sub(&second)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert_eq!(diff, 0.0);
    Ok(())
}

#[test]
fn fully_padded_sequence_still_scores() -> Result<()> {
    let head = build_classifier(3)?;
    let batch = Tensor::from_slice(&[2i64, 3, 4, 5, 0, 0, 0, 0], (2, 4), &Device::Cpu)?;

    let scores = head.forward(&batch, false)?;
    assert_eq!(scores.dims(), &[2, 3]);
    let values = scores.flatten_all()?.to_vec1::<f32>()?;
    assert!(values.iter().all(|v| v.is_finite()));

    // The degenerate row leans entirely on the zero-attention key.
    let probs = head.attention_weights(&batch)?;
    let flat = probs.flatten_all()?.to_vec1::<f32>()?;
    let (b, k_len) = (1, 5);
    for h in 0..2 {
        for label in 0..3 {
            let idx = (((b * 2 + h) * 3) + label) * k_len + 4;
            assert!((flat[idx] - 1.0).abs() < 1e-5);
        }
    }
    Ok(())
}

#[test]
fn training_mode_applies_dropout_but_stays_well_formed() -> Result<()> {
    let head = build_classifier(3)?;
    let scores = head.forward(&build_batch()?, true)?;
    assert_eq!(scores.dims(), &[2, 3]);
    let values = scores.flatten_all()?.to_vec1::<f32>()?;
    assert!(values.iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn construction_rejects_invalid_configs() -> Result<()> {
    let err = SentenceClassifier::new(build_config(0), build_table(8)?);
    assert!(matches!(err, Err(ClassifierError::Configuration(_))));

    let mut config = build_config(3);
    config.num_heads = 3; // 8 % 3 != 0
    let err = SentenceClassifier::new(config, build_table(8)?);
    assert!(matches!(err, Err(ClassifierError::Configuration(_))));

    let mut config = build_config(3);
    config.dropout_p = 1.5;
    let err = SentenceClassifier::new(config, build_table(8)?);
    assert!(matches!(err, Err(ClassifierError::Configuration(_))));
    Ok(())
}

#[test]
fn construction_rejects_mismatched_embedding_width() -> Result<()> {
    let err = SentenceClassifier::new(build_config(3), build_table(12)?);
    assert!(matches!(err, Err(ClassifierError::Configuration(_))));
    Ok(())
}

/// Source that declares one width but produces another, exercising the
/// forward-time shape check.
struct LyingSource {
    inner: TokenEmbedding,
}

impl TokenVectorSource for LyingSource {
    fn hidden_dim(&self) -> usize {
        8
    }

    fn padding_id(&self) -> u32 {
        PADDING_ID
    }

    fn forward(&self, token_ids: &Tensor) -> candle_core::Result<Tensor> {
        self.inner.forward(token_ids)
    }
}

#[test]
fn forward_rejects_inconsistent_embedding_output() -> Result<()> {
    let inner = TokenEmbedding::new(TokenEmbeddingConfig {
        vocab_size: 12,
        hidden_dim: 4,
        padding_id: PADDING_ID,
        dtype: DType::F32,
        device: Device::Cpu,
    })?;
    let head = SentenceClassifier::new(build_config(3), Box::new(LyingSource { inner }))?;

    let err = head.forward(&build_batch()?, false);
    assert!(matches!(err, Err(ClassifierError::ShapeMismatch(_))));
    Ok(())
}

#[test]
fn forward_rejects_non_matrix_token_ids() -> Result<()> {
    let head = build_classifier(3)?;
    let ids = Tensor::from_slice(&[1i64, 2, 3], 3, &Device::Cpu)?;
    let err = head.forward(&ids, false);
    assert!(matches!(err, Err(ClassifierError::ShapeMismatch(_))));
    Ok(())
}

#[test]
fn frozen_pretrained_source_is_interchangeable() -> Result<()> {
    let device = Device::Cpu;
    let weight = Tensor::randn(0f32, 1.0, (12, 8), &device)?;
    let frozen = PretrainedEmbedding::from_weight(weight, PADDING_ID)?;

    let head = SentenceClassifier::new(build_config(3), Box::new(frozen))?;
    let scores = head.forward(&build_batch()?, false)?;
    assert_eq!(scores.dims(), &[2, 3]);

    // Frozen source contributes nothing to the trainable parameter set.
    let names: Vec<String> = head
        .named_parameters()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert!(!names.iter().any(|n| n.starts_with("embedding")));
    Ok(())
}

#[test]
fn parameters_cover_every_stage() -> Result<()> {
    let head = build_classifier(3)?;
    let params = head.named_parameters();
    let names: Vec<&str> = params.iter().map(|(name, _)| name.as_str()).collect();

    assert!(names.contains(&"class_queries"));
    for proj in ["q_proj", "k_proj", "v_proj", "out_proj"] {
        assert!(names.contains(&format!("attn.{proj}.weight").as_str()));
        assert!(names.contains(&format!("attn.{proj}.bias").as_str()));
    }
    assert!(names.contains(&"ln_q.weight"));
    assert!(names.contains(&"ln_q.bias"));
    assert!(names.contains(&"proj.weight"));
    assert!(names.contains(&"proj.bias"));
    assert!(names.contains(&"embedding.weight"));
    assert_eq!(params.len(), 14);

    let queries = head.class_queries();
    assert_eq!(queries.dims(), &[3, 8]);
    Ok(())
}

#[test]
fn reset_resamples_the_learned_state() -> Result<()> {
    let head = build_classifier(3)?;
    let batch = build_batch()?;
    let before = head.forward(&batch, false)?;

    head.reset_parameters()?;
    let after = head.forward(&batch, false)?;

    assert_eq!(after.dims(), &[2, 3]);
    let diff = before.sub(&after)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert!(diff > 0.0, "reset left every parameter unchanged");

    // External updates through the exposed Vars flow into the next forward.
    let params = head.named_parameters();
    let (_, queries) = params
        .iter()
        .find(|(name, _)| name == "class_queries")
        .unwrap();
    let zeros = Tensor::zeros(queries.dims().to_vec(), DType::F32, &Device::Cpu)?;
    Var::set(queries, &zeros)?;
    let moved = head.forward(&batch, false)?;
    let diff = after.sub(&moved)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert!(diff > 0.0);
    Ok(())
}
