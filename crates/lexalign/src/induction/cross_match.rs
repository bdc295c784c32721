//! Merging pairwise dictionaries into one multilingual dictionary.

use std::collections::BTreeMap;

use crate::error::{AlignError, AlignResult};
use crate::types::{Lang, MultilingualDictionary, PairwiseDictionary};

/// Merge one pairwise dictionary per target language (all sharing the
/// same source vocabulary) into a single multilingual dictionary.
///
/// For every row `(s, t₁)` of the first language's dictionary:
///
/// 1. if `s` appears as a source in *every* language's dictionary, emit
///    `(s, first-match per language)`; when a source maps to several
///    targets within one dictionary only the first row (table-scan
///    order) is taken;
/// 2. otherwise, if a `bridge` dictionary between the first two target
///    languages is supplied and `t₁` appears as a bridge source, emit
///    `(s, t₁, bridged_target)`.
///
/// With a bridge, a second pass over the *last* language's dictionary
/// recovers rows whose source is absent from the first language's
/// dictionary but whose target appears as a bridge target, emitting
/// `(s, bridged_source, t_last)`.
///
/// Output rows may repeat; no deduplication is performed.
pub fn cross_match(
    lang_list: &[Lang],
    dicts: &BTreeMap<Lang, PairwiseDictionary>,
    bridge: Option<&PairwiseDictionary>,
) -> AlignResult<MultilingualDictionary> {
    let first_lang = lang_list.first().ok_or_else(|| AlignError::InvalidInput {
        message: "cross-matching needs at least one target language".to_string(),
    })?;
    for lang in lang_list {
        if !dicts.contains_key(lang) {
            return Err(AlignError::UnknownLanguage {
                lang: lang.to_string(),
            });
        }
    }
    let first = &dicts[first_lang];
    let last = &dicts[lang_list.last().unwrap_or(first_lang)];

    let mut rows: Vec<Vec<usize>> = Vec::new();

    for pair in first.pairs() {
        let source = pair[0];
        // Present as a source in every dictionary: take the first match
        // per language. Absent anywhere: fall through to the bridge.
        let first_matches: Option<Vec<usize>> = lang_list
            .iter()
            .map(|lang| dicts[lang].first_target_of(source))
            .collect();
        if let Some(matches) = first_matches {
            let mut row = vec![source];
            row.extend(matches);
            rows.push(row);
        } else if let Some(bridge) = bridge {
            if let Some(bridged) = bridge.first_target_of(pair[1]) {
                rows.push(vec![source, pair[1], bridged]);
            }
        }
    }

    if let Some(bridge) = bridge {
        // Recover sources only reachable through the bridge's far side.
        for pair in last.pairs() {
            let source = pair[0];
            if !first.contains_source(source) {
                if let Some(bridged_source) = bridge.first_source_of(pair[1]) {
                    rows.push(vec![source, bridged_source, pair[1]]);
                }
            }
        }
    }

    tracing::info!("New combined dictionary of {} rows.", rows.len());
    Ok(MultilingualDictionary::new(rows))
}
