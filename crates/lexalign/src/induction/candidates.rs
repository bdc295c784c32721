//! Candidate pair selection: confidence ranking and filtering.

use crate::config::DictionaryConfig;
use crate::scoring::Top2;

/// Sentinel margin that exempts force-kept pairs from the confidence
/// threshold.
const KEEP_MARGIN: f32 = 1e9;

/// Turn top-2 scores into a ranked, filtered pair list.
///
/// Each query contributes the pair `(query_index, best_target)` with
/// confidence margin `top1 − top2`. Pairs are stable-sorted by margin
/// descending, then filtered in this exact order:
///
/// 1. rank cap: drop pairs where either index exceeds `max_rank`;
/// 2. size cap: truncate to `max_size`;
/// 3. min-size override: the first `min_size` *remaining* pairs get the
///    sentinel margin, so the threshold can never drop them (`min_size`
///    is therefore bounded by `max_size` when both are set);
/// 4. confidence threshold: drop pairs whose margin is not above it.
pub fn select_pairs(top2: &Top2, config: &DictionaryConfig) -> Vec<[usize; 2]> {
    let mut entries: Vec<([usize; 2], f32)> = top2
        .scores
        .iter()
        .zip(top2.targets.iter())
        .enumerate()
        .map(|(query, (scores, targets))| ([query, targets[0]], scores[0] - scores[1]))
        .collect();

    // Stable sort: ties keep their original (query-index) order.
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if config.max_rank > 0 {
        entries.retain(|(pair, _)| pair[0].max(pair[1]) <= config.max_rank);
    }

    if config.max_size > 0 {
        entries.truncate(config.max_size);
    }

    if config.min_size > 0 {
        for entry in entries.iter_mut().take(config.min_size) {
            entry.1 = KEEP_MARGIN;
        }
    }

    if config.threshold > 0.0 {
        let total = entries.len();
        entries.retain(|(_, margin)| *margin > config.threshold);
        tracing::info!(
            "Selected {} / {} pairs above the confidence threshold.",
            entries.len(),
            total
        );
    }

    entries.into_iter().map(|(pair, _)| pair).collect()
}
