//! Word-pair dictionary loading and synthetic seed dictionaries.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{AlignError, AlignResult};
use crate::types::{PairwiseDictionary, Vocabulary};

/// Load a plain-text dictionary of whitespace-separated word pairs,
/// mapping words to indices through the two vocabularies.
///
/// Pairs with a word unknown to either vocabulary are dropped (counted
/// and logged). An entirely empty result is an error: a seed dictionary
/// that matches nothing cannot anchor an alignment.
pub fn load_dictionary(
    path: &Path,
    src_vocab: &Vocabulary,
    tgt_vocab: &Vocabulary,
) -> AlignResult<PairwiseDictionary> {
    let file = File::open(path)?;
    let mut pairs: Vec<[usize; 2]> = Vec::new();
    let mut unknown = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (src_word, tgt_word) = match (fields.next(), fields.next()) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                return Err(AlignError::ParseError {
                    message: format!(
                        "{}:{}: expected two whitespace-separated words",
                        path.display(),
                        line_no + 1
                    ),
                })
            }
        };
        match (src_vocab.index(src_word), tgt_vocab.index(tgt_word)) {
            (Some(s), Some(t)) => pairs.push([s, t]),
            _ => unknown += 1,
        }
    }

    if unknown > 0 {
        tracing::warn!(
            "{}: dropped {} pairs with out-of-vocabulary words",
            path.display(),
            unknown
        );
    }
    if pairs.is_empty() {
        return Err(AlignError::InvalidInput {
            message: format!("{}: no dictionary pair survived vocabulary lookup", path.display()),
        });
    }
    tracing::info!(
        "Loaded {} dictionary pairs from {}",
        pairs.len(),
        path.display()
    );
    Ok(PairwiseDictionary::new(pairs))
}

/// Synthesize a seed dictionary from words spelled identically in both
/// vocabularies. Pairs are ordered by source index.
pub fn identical_char_dictionary(
    src_vocab: &Vocabulary,
    tgt_vocab: &Vocabulary,
) -> PairwiseDictionary {
    let pairs: Vec<[usize; 2]> = src_vocab
        .iter()
        .filter_map(|(src_id, word)| tgt_vocab.index(word).map(|tgt_id| [src_id, tgt_id]))
        .collect();
    tracing::info!("Found {} identical-string pairs", pairs.len());
    PairwiseDictionary::new(pairs)
}

/// Synthesize a seed dictionary from numeral tokens (digits only)
/// present in both vocabularies. Pairs are ordered by source index.
pub fn identical_num_dictionary(
    src_vocab: &Vocabulary,
    tgt_vocab: &Vocabulary,
) -> PairwiseDictionary {
    let pairs: Vec<[usize; 2]> = src_vocab
        .iter()
        .filter(|(_, word)| !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|(src_id, word)| tgt_vocab.index(word).map(|tgt_id| [src_id, tgt_id]))
        .collect();
    tracing::info!("Found {} identical-numeral pairs", pairs.len());
    PairwiseDictionary::new(pairs)
}
