//! Alignment solvers: closed-form orthogonal Procrustes for two spaces
//! and the iterative generalized variant for N spaces against a shared
//! group-average reference.

mod procrustes;
pub mod svd;

pub use procrustes::{
    generalized_procrustes, procrustes, GPA_ITERATIONS,
};
