//! Dictionary induction: from similarity scores to bilingual and
//! multilingual index dictionaries.
//!
//! Pipeline: score ([`crate::scoring`]) → rank and filter candidate pairs
//! ([`candidates`]) → combine directions into a pairwise dictionary
//! ([`pairwise`]) → merge language pairs into one multilingual dictionary
//! ([`cross_match`]).

mod candidates;
mod cross_match;
mod pairwise;

pub use candidates::select_pairs;
pub use cross_match::cross_match;
pub use pairwise::build_pairwise;

use candle_core::Tensor;

use crate::config::{DictionaryConfig, InductionMethod};
use crate::error::AlignResult;
use crate::scoring::top2_neighbors;

/// Score `queries` against `refs` and return ranked, filtered candidate
/// pairs `(query_index, reference_index)`.
///
/// The rank cap limits the scored query rows for the dot-product modes;
/// the inverted softmax always scores every query (its normalization
/// needs them) and relies on the selector's rank filter instead.
pub fn get_candidates(
    queries: &Tensor,
    refs: &Tensor,
    config: &DictionaryConfig,
) -> AlignResult<Vec<[usize; 2]>> {
    let limit = if config.max_rank > 0
        && !matches!(config.method, InductionMethod::InvertedSoftmax { .. })
    {
        Some(config.max_rank)
    } else {
        None
    };
    let top2 = top2_neighbors(queries, refs, &config.method, limit)?;
    Ok(select_pairs(&top2, config))
}
