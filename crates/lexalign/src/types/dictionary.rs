//! Dictionaries: index correspondences between embedding spaces.

use serde::{Deserialize, Serialize};

/// An ordered list of `(source_index, target_index)` pairs for one
/// language pair.
///
/// Construction policies deduplicate exact pairs where they use set
/// semantics, but the same source index may still appear with several
/// targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairwiseDictionary {
    pairs: Vec<[usize; 2]>,
}

impl PairwiseDictionary {
    pub fn new(pairs: Vec<[usize; 2]>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[[usize; 2]] {
        &self.pairs
    }

    /// Source-index column.
    pub fn sources(&self) -> Vec<usize> {
        self.pairs.iter().map(|p| p[0]).collect()
    }

    /// Target-index column.
    pub fn targets(&self) -> Vec<usize> {
        self.pairs.iter().map(|p| p[1]).collect()
    }

    pub fn contains_source(&self, source: usize) -> bool {
        self.pairs.iter().any(|p| p[0] == source)
    }

    pub fn contains_target(&self, target: usize) -> bool {
        self.pairs.iter().any(|p| p[1] == target)
    }

    /// First target paired with `source`, in table-scan order.
    ///
    /// When a source maps to several targets only the first row wins;
    /// cross-matching relies on this exact tie-break.
    pub fn first_target_of(&self, source: usize) -> Option<usize> {
        self.pairs.iter().find(|p| p[0] == source).map(|p| p[1])
    }

    /// First source paired with `target`, in table-scan order (reverse
    /// lookup used by bridge recovery).
    pub fn first_source_of(&self, target: usize) -> Option<usize> {
        self.pairs.iter().find(|p| p[1] == target).map(|p| p[0])
    }
}

impl From<Vec<[usize; 2]>> for PairwiseDictionary {
    fn from(pairs: Vec<[usize; 2]>) -> Self {
        Self::new(pairs)
    }
}

/// A multilingual dictionary: each row is `(source, target₁, target₂, …)`
/// with one column per target language.
///
/// Rows may repeat; cross-matching does not deduplicate them. Consumers
/// that need unique rows must handle that themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultilingualDictionary {
    rows: Vec<Vec<usize>>,
}

impl MultilingualDictionary {
    pub fn new(rows: Vec<Vec<usize>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Extract one column (0 = source indices, `i ≥ 1` = the i-th target
    /// language). Rows too short for the column are skipped.
    pub fn column(&self, index: usize) -> Vec<usize> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index).copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let dict = PairwiseDictionary::new(vec![[0, 5], [0, 7], [1, 2]]);
        assert_eq!(dict.first_target_of(0), Some(5));
        assert_eq!(dict.first_source_of(2), Some(1));
        assert_eq!(dict.first_target_of(9), None);
    }

    #[test]
    fn test_columns() {
        let dict = MultilingualDictionary::new(vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(dict.column(0), vec![0, 3]);
        assert_eq!(dict.column(2), vec![2, 5]);
    }

    #[test]
    fn test_duplicate_rows_are_kept() {
        let dict = MultilingualDictionary::new(vec![vec![0, 1], vec![0, 1]]);
        assert_eq!(dict.len(), 2);
    }
}
