//! Neighbor-density statistics for CSLS.

use candle_core::Tensor;

use crate::error::{AlignError, AlignResult};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("CSLS error: {}", e),
    }
}

/// Mean similarity of each row of `rows_of` to its `k` nearest neighbors
/// among the rows of `against` (dot products, batched).
///
/// This is the hubness penalty of CSLS: rows sitting in dense regions of
/// the other space get a high average and are penalized accordingly.
pub fn average_neighbor_similarity(
    rows_of: &Tensor,
    against: &Tensor,
    k: usize,
) -> AlignResult<Vec<f32>> {
    if k == 0 {
        return Err(AlignError::InvalidInput {
            message: "CSLS neighbor count must be positive".to_string(),
        });
    }
    let (n, _) = rows_of.dims2().map_err(map_candle)?;
    let (m, _) = against.dims2().map_err(map_candle)?;
    let k = k.min(m);
    let against_t = against.t().map_err(map_candle)?;

    let mut averages = Vec::with_capacity(n);
    let mut start = 0;
    while start < n {
        let len = (n - start).min(super::SCORE_BATCH);
        let batch = rows_of.narrow(0, start, len).map_err(map_candle)?;
        let scores = batch.matmul(&against_t).map_err(map_candle)?;
        for mut row in scores.to_vec2::<f32>().map_err(map_candle)? {
            if k < row.len() {
                row.select_nth_unstable_by(k - 1, |a, b| {
                    b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            let top_sum: f32 = row[..k].iter().sum();
            averages.push(top_sum / k as f32);
        }
        start += len;
    }
    Ok(averages)
}
