//! Pairwise dictionary construction from directional candidate sets.

use std::collections::BTreeSet;

use candle_core::Tensor;

use crate::config::{BuildPolicy, DictionaryConfig};
use crate::error::AlignResult;
use crate::induction::get_candidates;
use crate::types::PairwiseDictionary;

/// Build a bilingual dictionary between two (already mapped and
/// normalized) embedding matrices.
///
/// Candidate sets can be passed in to avoid recomputation; `backward`
/// candidates are expected in raw reversed orientation
/// `(target, source)`; the builder swaps the columns back.
///
/// Returns `Ok(None)` when the intersection policy produces no pairs:
/// the dictionary is absent for this round and the caller must skip the
/// dependent step. This is a recoverable condition, not an error.
///
/// Set-combined results (union/intersection) are sorted ascending so
/// repeated builds are deterministic; directional results keep their
/// confidence ranking.
pub fn build_pairwise(
    src_emb: &Tensor,
    tgt_emb: &Tensor,
    config: &DictionaryConfig,
    forward: Option<Vec<[usize; 2]>>,
    backward: Option<Vec<[usize; 2]>>,
) -> AlignResult<Option<PairwiseDictionary>> {
    tracing::info!("Building the training dictionary ({}) ...", config.build);

    let forward_candidates = |precomputed: Option<Vec<[usize; 2]>>| match precomputed {
        Some(candidates) => Ok(candidates),
        None => get_candidates(src_emb, tgt_emb, config),
    };
    // Swapped back into (source, target) orientation.
    let backward_candidates = |precomputed: Option<Vec<[usize; 2]>>| {
        let raw = match precomputed {
            Some(candidates) => candidates,
            None => get_candidates(tgt_emb, src_emb, config)?,
        };
        Ok::<_, crate::error::AlignError>(raw.into_iter().map(|[t, s]| [s, t]).collect::<Vec<_>>())
    };

    let pairs = match config.build {
        BuildPolicy::SourceToTarget => forward_candidates(forward)?,
        BuildPolicy::TargetToSource => backward_candidates(backward)?,
        BuildPolicy::Union | BuildPolicy::Intersection => {
            let forward: BTreeSet<(usize, usize)> = forward_candidates(forward)?
                .into_iter()
                .map(|[a, b]| (a, b))
                .collect();
            let backward: BTreeSet<(usize, usize)> = backward_candidates(backward)?
                .into_iter()
                .map(|[a, b]| (a, b))
                .collect();
            let combined: Vec<[usize; 2]> = if config.build == BuildPolicy::Union {
                forward.union(&backward).map(|&(a, b)| [a, b]).collect()
            } else {
                forward
                    .intersection(&backward)
                    .map(|&(a, b)| [a, b])
                    .collect()
            };
            if config.build == BuildPolicy::Intersection && combined.is_empty() {
                tracing::warn!("Empty intersection, no dictionary for this round");
                return Ok(None);
            }
            combined
        }
    };

    tracing::info!("New training dictionary of {} pairs.", pairs.len());
    Ok(Some(PairwiseDictionary::new(pairs)))
}
