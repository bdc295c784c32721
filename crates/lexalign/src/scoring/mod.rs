//! Batched similarity search between two embedding spaces.
//!
//! Produces, for each query row, its two best reference indices and
//! scores under one of three scoring modes: plain dot product, inverted
//! softmax, or CSLS. Work is chunked into fixed-size row batches purely
//! to bound peak memory; results are independent of the batching.

mod csls;
mod neighbors;

pub use csls::average_neighbor_similarity;
pub use neighbors::{top2_neighbors, Top2, SCORE_BATCH};
