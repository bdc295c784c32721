//! Adversarial training and Procrustes refinement orchestration.
//!
//! The trainer drives the full cycle: discriminator steps shape the
//! source mapping adversarially, the induction stack rebuilds the
//! training dictionary from the current mapped embeddings, and the
//! Procrustes solver re-projects the mappings onto the orthogonal
//! manifold from the refreshed correspondences.

mod discriminator;
mod sgd;
mod trainer;

pub use discriminator::Discriminator;
pub use sgd::{clip_vars, Sgd};
pub use trainer::{EpochStats, RefinementStats, Trainer, TrainingHistory};
