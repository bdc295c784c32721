//! File formats: text embedding files, word-pair dictionaries, and
//! mapping checkpoints.

pub mod checkpoint;
pub mod dictionary;
pub mod embeddings;
