//! Word ↔ index table for one language.

use std::collections::HashMap;

use crate::error::{AlignError, AlignResult};

/// Bidirectional word/index table. The index of a word is its row in the
/// language's embedding matrix and is stable for the lifetime of the
/// vocabulary.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    id2word: Vec<String>,
    word2id: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary from an ordered word list.
    ///
    /// Duplicate words are rejected: embedding rows must map one-to-one
    /// onto words.
    pub fn new(words: Vec<String>) -> AlignResult<Self> {
        let mut word2id = HashMap::with_capacity(words.len());
        for (id, word) in words.iter().enumerate() {
            if word2id.insert(word.clone(), id).is_some() {
                return Err(AlignError::InvalidInput {
                    message: format!("duplicate word '{}' in vocabulary", word),
                });
            }
        }
        Ok(Self {
            id2word: words,
            word2id,
        })
    }

    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    /// Index of `word`, if present.
    pub fn index(&self, word: &str) -> Option<usize> {
        self.word2id.get(word).copied()
    }

    /// Word at `id`, if in range.
    pub fn word(&self, id: usize) -> Option<&str> {
        self.id2word.get(id).map(|w| w.as_str())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word2id.contains_key(word)
    }

    /// Iterate `(index, word)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.id2word.iter().enumerate().map(|(i, w)| (i, w.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(words: &[&str]) -> Vocabulary {
        Vocabulary::new(words.iter().map(|w| w.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let v = vocab(&["the", "cat", "sat"]);
        assert_eq!(v.len(), 3);
        assert_eq!(v.index("cat"), Some(1));
        assert_eq!(v.word(2), Some("sat"));
        assert_eq!(v.index("dog"), None);
        assert_eq!(v.word(3), None);
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = Vocabulary::new(vec!["a".to_string(), "a".to_string()]);
        assert!(matches!(result, Err(AlignError::InvalidInput { .. })));
    }
}
