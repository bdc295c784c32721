//! Core data types: languages, vocabularies, embedding spaces, and the
//! dictionaries produced by induction.

mod dictionary;
mod language;
mod space;
mod vocabulary;

pub use dictionary::{MultilingualDictionary, PairwiseDictionary};
pub use language::Lang;
pub use space::{l2_normalize_rows, EmbeddingSpace};
pub use vocabulary::Vocabulary;

pub(crate) use space::gather_rows;
