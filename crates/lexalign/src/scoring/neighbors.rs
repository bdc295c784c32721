//! Top-2 nearest-neighbor search in the three scoring modes.

use candle_core::Tensor;

use crate::config::InductionMethod;
use crate::error::{AlignError, AlignResult};
use crate::scoring::csls::average_neighbor_similarity;

/// Query rows processed per matmul. Bounds peak memory of the score
/// matrices; has no effect on results.
pub const SCORE_BATCH: usize = 128;

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Scoring error: {}", e),
    }
}

/// Per-query top-2 scores and reference indices, each row sorted
/// descending. `scores.len() == targets.len()` always holds.
#[derive(Debug, Clone)]
pub struct Top2 {
    pub scores: Vec<[f32; 2]>,
    pub targets: Vec<[usize; 2]>,
}

impl Top2 {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Best two entries of a score row, descending.
fn top2_row(row: &[f32]) -> ([f32; 2], [usize; 2]) {
    let mut scores = [f32::NEG_INFINITY; 2];
    let mut targets = [0usize; 2];
    for (j, &v) in row.iter().enumerate() {
        if v > scores[0] {
            scores[1] = scores[0];
            targets[1] = targets[0];
            scores[0] = v;
            targets[0] = j;
        } else if v > scores[1] {
            scores[1] = v;
            targets[1] = j;
        }
    }
    (scores, targets)
}

/// Merge a candidate into a running top-2 accumulator.
fn merge_candidate(scores: &mut [f32; 2], targets: &mut [usize; 2], score: f32, target: usize) {
    if score > scores[0] {
        scores[1] = scores[0];
        targets[1] = targets[0];
        scores[0] = score;
        targets[0] = target;
    } else if score > scores[1] {
        scores[1] = score;
        targets[1] = target;
    }
}

/// Compute each query row's two best reference rows under `method`.
///
/// `query_limit` restricts scoring to the first `n` query rows (used by
/// induction when a rank cap is active). The inverted softmax ignores
/// the limit: its normalization is over the incoming scores of each
/// reference word across *all* queries, so every query row participates.
pub fn top2_neighbors(
    queries: &Tensor,
    refs: &Tensor,
    method: &InductionMethod,
    query_limit: Option<usize>,
) -> AlignResult<Top2> {
    let (n_queries, _) = queries.dims2().map_err(map_candle)?;
    let (n_refs, _) = refs.dims2().map_err(map_candle)?;
    if n_refs < 2 {
        return Err(AlignError::InvalidInput {
            message: format!("top-2 search needs at least 2 reference rows, got {}", n_refs),
        });
    }

    match method {
        InductionMethod::NearestNeighbor => {
            let n_src = query_limit.unwrap_or(n_queries).min(n_queries);
            dot_product_top2(queries, refs, n_src, None, None)
        }
        InductionMethod::InvertedSoftmax { beta } => {
            inverted_softmax_top2(queries, refs, *beta)
        }
        InductionMethod::Csls { neighbors } => {
            let n_src = query_limit.unwrap_or(n_queries).min(n_queries);
            let query_prefix = queries.narrow(0, 0, n_src).map_err(map_candle)?;
            let avg_query = average_neighbor_similarity(&query_prefix, refs, *neighbors)?;
            // Reference-side statistics use the full query set.
            let avg_ref = average_neighbor_similarity(refs, queries, *neighbors)?;
            dot_product_top2(queries, refs, n_src, Some(&avg_query), Some(&avg_ref))
        }
    }
}

/// Batched dot-product scoring with an optional CSLS correction:
/// `2·q·r − avg_query(i) − avg_ref(j)` when both penalty vectors are
/// supplied, plain `q·r` otherwise.
fn dot_product_top2(
    queries: &Tensor,
    refs: &Tensor,
    n_src: usize,
    avg_query: Option<&[f32]>,
    avg_ref: Option<&[f32]>,
) -> AlignResult<Top2> {
    let refs_t = refs.t().map_err(map_candle)?;
    let (n_refs, _) = refs.dims2().map_err(map_candle)?;
    let device = queries.device();

    let avg_ref_row = match avg_ref {
        Some(avg) => Some(
            Tensor::from_vec(avg.to_vec(), (1, n_refs), device).map_err(map_candle)?,
        ),
        None => None,
    };

    let mut scores = Vec::with_capacity(n_src);
    let mut targets = Vec::with_capacity(n_src);
    let mut start = 0;
    while start < n_src {
        let len = (n_src - start).min(SCORE_BATCH);
        let batch = queries.narrow(0, start, len).map_err(map_candle)?;
        let mut batch_scores = batch.matmul(&refs_t).map_err(map_candle)?;

        if let (Some(avg_q), Some(avg_r)) = (avg_query, &avg_ref_row) {
            let q_col = Tensor::from_vec(
                avg_q[start..start + len].to_vec(),
                (len, 1),
                device,
            )
            .map_err(map_candle)?;
            batch_scores = batch_scores
                .affine(2.0, 0.0)
                .map_err(map_candle)?
                .broadcast_sub(&q_col)
                .map_err(map_candle)?
                .broadcast_sub(avg_r)
                .map_err(map_candle)?;
        }

        for row in batch_scores.to_vec2::<f32>().map_err(map_candle)? {
            let (s, t) = top2_row(&row);
            scores.push(s);
            targets.push(t);
        }
        start += len;
    }
    Ok(Top2 { scores, targets })
}

/// Inverted softmax scoring, batched over *reference* rows.
///
/// Each reference batch's exponentiated scores are normalized by their
/// column sums over all queries, so each reference word distributes one
/// unit of probability mass across the query set; per-query results are
/// merged into a running global top-2.
fn inverted_softmax_top2(queries: &Tensor, refs: &Tensor, beta: f32) -> AlignResult<Top2> {
    let (n_queries, _) = queries.dims2().map_err(map_candle)?;
    let (n_refs, _) = refs.dims2().map_err(map_candle)?;

    let mut scores = vec![[f32::NEG_INFINITY; 2]; n_queries];
    let mut targets = vec![[0usize; 2]; n_queries];

    let mut start = 0;
    while start < n_refs {
        let len = (n_refs - start).min(SCORE_BATCH);
        let batch = refs.narrow(0, start, len).map_err(map_candle)?;
        let raw = queries
            .matmul(&batch.t().map_err(map_candle)?)
            .map_err(map_candle)?;
        let exp = raw
            .affine(beta as f64, 0.0)
            .map_err(map_candle)?
            .exp()
            .map_err(map_candle)?;
        let col_sums = exp.sum_keepdim(0).map_err(map_candle)?;
        let normalized = exp.broadcast_div(&col_sums).map_err(map_candle)?;

        for (qi, row) in normalized
            .to_vec2::<f32>()
            .map_err(map_candle)?
            .into_iter()
            .enumerate()
        {
            for (c, v) in row.into_iter().enumerate() {
                merge_candidate(&mut scores[qi], &mut targets[qi], v, start + c);
            }
        }
        start += len;
    }
    Ok(Top2 { scores, targets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn tensor(data: &[f32], rows: usize, cols: usize) -> Tensor {
        Tensor::from_vec(data.to_vec(), (rows, cols), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_top2_row_descending() {
        let (s, t) = top2_row(&[0.1, 0.9, 0.5]);
        assert_eq!(t, [1, 2]);
        assert!(s[0] >= s[1]);
    }

    #[test]
    fn test_nn_finds_best_pair() {
        let queries = tensor(&[1.0, 0.0, 0.0, 1.0], 2, 2);
        let refs = tensor(&[0.9, 0.1, 0.1, 0.9, 0.5, 0.5], 3, 2);
        let top2 = top2_neighbors(&queries, &refs, &InductionMethod::NearestNeighbor, None).unwrap();
        assert_eq!(top2.len(), 2);
        assert_eq!(top2.targets[0][0], 0);
        assert_eq!(top2.targets[1][0], 1);
    }

    #[test]
    fn test_query_limit_restricts_rows() {
        let queries = tensor(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3, 2);
        let refs = tensor(&[1.0, 0.0, 0.0, 1.0], 2, 2);
        let top2 =
            top2_neighbors(&queries, &refs, &InductionMethod::NearestNeighbor, Some(2)).unwrap();
        assert_eq!(top2.len(), 2);
    }

    #[test]
    fn test_inverted_softmax_ignores_query_limit() {
        let queries = tensor(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3, 2);
        let refs = tensor(&[1.0, 0.0, 0.0, 1.0], 2, 2);
        let method = InductionMethod::InvertedSoftmax { beta: 10.0 };
        let top2 = top2_neighbors(&queries, &refs, &method, Some(1)).unwrap();
        assert_eq!(top2.len(), 3);
    }

    #[test]
    fn test_inverted_softmax_batching_invariant() {
        // More reference rows than one batch would hold is exercised via
        // the same math on a small set: scores must be valid
        // probabilities per reference column.
        let queries = tensor(&[1.0, 0.0, 0.0, 1.0], 2, 2);
        let refs = tensor(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3, 2);
        let method = InductionMethod::InvertedSoftmax { beta: 1.0 };
        let top2 = top2_neighbors(&queries, &refs, &method, None).unwrap();
        for row in &top2.scores {
            assert!(row[0] > 0.0 && row[0] <= 1.0);
            assert!(row[0] >= row[1]);
        }
    }

    #[test]
    fn test_csls_penalizes_hubs() {
        // Reference row 2 is similar to everything (a hub); CSLS must
        // prefer the specific match over the hub.
        let queries = tensor(&[1.0, 0.0, 0.0, 1.0], 2, 2);
        let refs = tensor(&[0.95, 0.1, 0.1, 0.95, 0.9, 0.9], 3, 2);
        let nn = top2_neighbors(&queries, &refs, &InductionMethod::NearestNeighbor, None).unwrap();
        let csls =
            top2_neighbors(&queries, &refs, &InductionMethod::Csls { neighbors: 2 }, None).unwrap();
        // The specific match must stay on top, and the hub's penalty must
        // widen the confidence margin relative to plain dot products.
        assert_eq!(csls.targets[0][0], nn.targets[0][0]);
        let nn_margin = nn.scores[0][0] - nn.scores[0][1];
        let csls_margin = csls.scores[0][0] - csls.scores[0][1];
        assert!(csls_margin > nn_margin, "{} vs {}", csls_margin, nn_margin);
    }

    #[test]
    fn test_too_few_references_rejected() {
        let queries = tensor(&[1.0, 0.0], 1, 2);
        let refs = tensor(&[1.0, 0.0], 1, 2);
        assert!(
            top2_neighbors(&queries, &refs, &InductionMethod::NearestNeighbor, None).is_err()
        );
    }
}
