//! Unsupervised model-selection criteria.
//!
//! The full benchmark suites (word similarity, word translation) live
//! outside this crate; what lives here is derivable from the induction
//! stack alone and is what the trainer checkpoints on.

use candle_core::Tensor;

use crate::config::{BuildPolicy, DictionaryConfig, InductionMethod};
use crate::error::{AlignError, AlignResult};
use crate::induction::build_pairwise;
use crate::training::Discriminator;
use crate::types::gather_rows;

/// Dictionary size (and rank cap) used by the mean-cosine criterion.
const CRITERION_SIZE: usize = 10_000;

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Metrics error: {}", e),
    }
}

/// Mean-cosine model-selection criterion.
///
/// Induces a source→target dictionary from the mapped, normalized
/// embeddings (capped at [`CRITERION_SIZE`] pairs, no confidence
/// threshold) and returns the mean cosine similarity of the matched
/// rows. Higher is better; it tracks word-translation accuracy closely
/// enough to select checkpoints without any labelled resource.
///
/// Returns `Ok(None)` when no dictionary could be induced; the caller
/// skips this evaluation rather than failing.
pub fn mean_cosine_criterion(
    src_emb: &Tensor,
    tgt_emb: &Tensor,
    method: &InductionMethod,
) -> AlignResult<Option<f32>> {
    let config = DictionaryConfig {
        method: *method,
        build: BuildPolicy::SourceToTarget,
        max_rank: CRITERION_SIZE,
        max_size: CRITERION_SIZE,
        min_size: 0,
        threshold: 0.0,
    };
    let dictionary = match build_pairwise(src_emb, tgt_emb, &config, None, None)? {
        Some(dictionary) => dictionary,
        None => {
            tracing::warn!("Mean-cosine criterion skipped: no dictionary induced");
            return Ok(None);
        }
    };

    let pairs = &dictionary.pairs()[..dictionary.len().min(CRITERION_SIZE)];
    let sources: Vec<usize> = pairs.iter().map(|p| p[0]).collect();
    let targets: Vec<usize> = pairs.iter().map(|p| p[1]).collect();
    let src_rows = gather_rows(src_emb, &sources)?;
    let tgt_rows = gather_rows(tgt_emb, &targets)?;

    let mean = src_rows
        .mul(&tgt_rows)
        .map_err(map_candle)?
        .sum(1)
        .map_err(map_candle)?
        .mean_all()
        .map_err(map_candle)?
        .to_scalar::<f32>()
        .map_err(map_candle)?;
    tracing::info!(
        "Mean cosine ({} method, S2T build, {} max size): {:.5}",
        method,
        CRITERION_SIZE,
        mean
    );
    Ok(Some(mean))
}

/// Discriminator calibration over two mapped embedding sets.
#[derive(Debug, Clone)]
pub struct DiscriminatorStats {
    /// Mean prediction on mapped source vectors.
    pub src_pred: f32,
    /// Mean prediction on target vectors.
    pub tgt_pred: f32,
    /// Size-weighted classification accuracy (sources scored ≥ 0.5,
    /// targets < 0.5).
    pub accuracy: f32,
}

/// Probe the discriminator's predictions over full embedding matrices,
/// batched to bound memory.
pub fn discriminator_accuracy(
    discriminator: &Discriminator,
    src_emb: &Tensor,
    tgt_emb: &Tensor,
) -> AlignResult<DiscriminatorStats> {
    let src_preds = batched_predictions(discriminator, src_emb)?;
    let tgt_preds = batched_predictions(discriminator, tgt_emb)?;

    let src_pred = mean(&src_preds);
    let tgt_pred = mean(&tgt_preds);
    let src_correct = src_preds.iter().filter(|&&p| p >= 0.5).count();
    let tgt_correct = tgt_preds.iter().filter(|&&p| p < 0.5).count();
    let total = src_preds.len() + tgt_preds.len();
    let accuracy = if total == 0 {
        0.0
    } else {
        (src_correct + tgt_correct) as f32 / total as f32
    };

    tracing::info!(
        "Discriminator source / target predictions: {:.5} / {:.5}, accuracy {:.5}",
        src_pred,
        tgt_pred,
        accuracy
    );
    Ok(DiscriminatorStats {
        src_pred,
        tgt_pred,
        accuracy,
    })
}

fn batched_predictions(discriminator: &Discriminator, emb: &Tensor) -> AlignResult<Vec<f32>> {
    let (rows, _) = emb.dims2().map_err(map_candle)?;
    let mut preds = Vec::with_capacity(rows);
    let mut start = 0;
    while start < rows {
        let len = (rows - start).min(crate::scoring::SCORE_BATCH);
        let batch = emb.narrow(0, start, len).map_err(map_candle)?;
        preds.extend(
            discriminator
                .predict(&batch)?
                .to_vec1::<f32>()
                .map_err(map_candle)?,
        );
        start += len;
    }
    Ok(preds)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdversarialConfig;
    use candle_core::Device;

    #[test]
    fn test_mean_cosine_identical_spaces_is_one() {
        // Identical normalized spaces: every induced pair has cosine 1.
        let data = vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let emb = Tensor::from_vec(data, (3, 3), &Device::Cpu).unwrap();
        let mean =
            mean_cosine_criterion(&emb, &emb, &InductionMethod::NearestNeighbor)
                .unwrap()
                .unwrap();
        assert!((mean - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_discriminator_accuracy_bounds() {
        let config = AdversarialConfig {
            dis_layers: 1,
            dis_hidden: 8,
            ..Default::default()
        };
        let disc = Discriminator::new(4, &config, &Device::Cpu, 5).unwrap();
        let src = Tensor::ones((10, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
        let tgt = Tensor::zeros((6, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
        let stats = discriminator_accuracy(&disc, &src, &tgt).unwrap();
        assert!((0.0..=1.0).contains(&stats.accuracy));
        assert!((0.0..=1.0).contains(&stats.src_pred));
        assert!((0.0..=1.0).contains(&stats.tgt_pred));
    }
}
