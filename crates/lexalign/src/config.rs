//! Configuration surface for dictionary induction and mapping training.
//!
//! All knobs are plain serde-derived structs with `Default` impls and
//! builder-style setters. The string forms accepted by [`InductionMethod`]
//! and [`BuildPolicy`] (`nn`, `invsm_beta_30`, `csls_knn_10`, `S2T&T2S`, ...)
//! match the conventional command-line spellings so external drivers can
//! pass them through unchanged.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlignError;

/// Similarity scoring mode used for nearest-neighbor dictionary induction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InductionMethod {
    /// Raw dot-product nearest neighbor.
    NearestNeighbor,
    /// Inverted softmax: target-side-normalized similarity, reduces hubness.
    InvertedSoftmax { beta: f32 },
    /// Cross-domain similarity local scaling with `neighbors` nearest
    /// neighbors on each side.
    Csls { neighbors: usize },
}

impl FromStr for InductionMethod {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "nn" {
            return Ok(Self::NearestNeighbor);
        }
        if let Some(beta) = s.strip_prefix("invsm_beta_") {
            let beta: f32 = beta.parse().map_err(|_| AlignError::ParseError {
                message: format!("invalid inverted softmax beta in '{}'", s),
            })?;
            return Ok(Self::InvertedSoftmax { beta });
        }
        if let Some(knn) = s.strip_prefix("csls_knn_") {
            let neighbors: usize = knn.parse().map_err(|_| AlignError::ParseError {
                message: format!("invalid CSLS neighbor count in '{}'", s),
            })?;
            return Ok(Self::Csls { neighbors });
        }
        Err(AlignError::ParseError {
            message: format!("unknown induction method '{}'", s),
        })
    }
}

impl fmt::Display for InductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NearestNeighbor => write!(f, "nn"),
            Self::InvertedSoftmax { beta } => write!(f, "invsm_beta_{}", beta),
            Self::Csls { neighbors } => write!(f, "csls_knn_{}", neighbors),
        }
    }
}

/// Policy combining source→target and target→source candidate sets into
/// one pairwise dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildPolicy {
    /// Source→target candidates only.
    SourceToTarget,
    /// Target→source candidates only (columns swapped back).
    TargetToSource,
    /// Set union of both directions.
    Union,
    /// Set intersection of both directions. May be empty, which is a
    /// recoverable absent-dictionary condition.
    Intersection,
}

impl BuildPolicy {
    /// Whether source→target candidates are needed.
    pub fn uses_forward(&self) -> bool {
        matches!(self, Self::SourceToTarget | Self::Union | Self::Intersection)
    }

    /// Whether target→source candidates are needed.
    pub fn uses_backward(&self) -> bool {
        matches!(self, Self::TargetToSource | Self::Union | Self::Intersection)
    }
}

impl FromStr for BuildPolicy {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S2T" => Ok(Self::SourceToTarget),
            "T2S" => Ok(Self::TargetToSource),
            "S2T|T2S" => Ok(Self::Union),
            "S2T&T2S" => Ok(Self::Intersection),
            _ => Err(AlignError::ParseError {
                message: format!("unknown build policy '{}'", s),
            }),
        }
    }
}

impl fmt::Display for BuildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SourceToTarget => "S2T",
            Self::TargetToSource => "T2S",
            Self::Union => "S2T|T2S",
            Self::Intersection => "S2T&T2S",
        };
        write!(f, "{}", s)
    }
}

/// Dictionary induction configuration.
///
/// The filters apply in a fixed order: rank cap, then size cap, then the
/// min-size override, then the confidence threshold. `0` disables a cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryConfig {
    /// Scoring mode.
    pub method: InductionMethod,
    /// Direction-combination policy.
    pub build: BuildPolicy,
    /// Drop pairs where either index exceeds this rank (0 = off).
    pub max_rank: usize,
    /// Keep at most this many pairs (0 = off).
    pub max_size: usize,
    /// Always keep the first `min_size` pairs regardless of the
    /// confidence threshold (0 = off).
    pub min_size: usize,
    /// Drop pairs whose top1−top2 confidence margin is below this value
    /// (0 = off).
    pub threshold: f32,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            method: InductionMethod::Csls { neighbors: 10 },
            build: BuildPolicy::SourceToTarget,
            max_rank: 15_000,
            max_size: 0,
            min_size: 0,
            threshold: 0.0,
        }
    }
}

impl DictionaryConfig {
    pub fn with_method(mut self, method: InductionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_build(mut self, build: BuildPolicy) -> Self {
        self.build = build;
        self
    }

    pub fn with_max_rank(mut self, max_rank: usize) -> Self {
        self.max_rank = max_rank;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Adversarial training configuration (discriminator + mapping steps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialConfig {
    /// Number of hidden layers in the discriminator.
    pub dis_layers: usize,
    /// Hidden layer width.
    pub dis_hidden: usize,
    /// Dropout on hidden activations.
    pub dis_dropout: f32,
    /// Dropout on the discriminator input.
    pub dis_input_dropout: f32,
    /// Label smoothing coefficient for discriminator targets.
    pub dis_smooth: f32,
    /// Weight of the adversarial (fooling) loss on the mapping. `0`
    /// disables the mapping step entirely.
    pub dis_lambda: f32,
    /// Clip discriminator weights to `[-c, c]` after each step (0 = off).
    pub dis_clip_weights: f32,
    /// Discriminator steps per mapping step.
    pub dis_steps: usize,
    /// Sample adversarial batches from the most frequent `n` words
    /// (0 = whole vocabulary).
    pub dis_most_frequent: usize,
    /// Discriminator SGD learning rate.
    pub dis_lr: f64,
    /// Mapping SGD learning rate.
    pub map_lr: f64,
    /// Strength of the soft orthogonality relaxation applied after each
    /// mapping step.
    pub map_beta: f32,
    /// Adversarial batch size (per side).
    pub batch_size: usize,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            dis_layers: 2,
            dis_hidden: 2048,
            dis_dropout: 0.0,
            dis_input_dropout: 0.1,
            dis_smooth: 0.1,
            dis_lambda: 1.0,
            dis_clip_weights: 0.0,
            dis_steps: 5,
            dis_most_frequent: 75_000,
            dis_lr: 0.1,
            map_lr: 0.1,
            map_beta: 0.001,
            batch_size: 32,
        }
    }
}

/// Top-level training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Adversarial epochs to run before refinement.
    pub epochs: usize,
    /// Words processed per adversarial epoch.
    pub epoch_size: usize,
    /// Procrustes refinement rounds after adversarial training.
    pub refinement_rounds: usize,
    /// Whether adversarial training is enabled at all; when false the
    /// trainer runs refinement only (supervised / seed-dictionary mode).
    pub adversarial: bool,
    /// Align every target language against a shared reference (generalized
    /// Procrustes over all spaces) instead of the last target only.
    pub support: bool,
    /// Per-epoch multiplicative learning-rate decay.
    pub lr_decay: f64,
    /// Extra shrink applied after two consecutive non-improving
    /// validation epochs.
    pub lr_shrink: f64,
    /// Learning-rate floor.
    pub min_lr: f64,
    /// Random seed (discriminator batches, parameter init).
    pub seed: u64,
    /// Directory for best-mapping checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Dictionary induction settings used for training-dictionary refresh.
    pub dictionary: DictionaryConfig,
    /// Adversarial step settings.
    pub adversary: AdversarialConfig,
    /// Scoring mode for the mean-cosine validation criterion.
    pub validation_method: InductionMethod,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            epoch_size: 250_000,
            refinement_rounds: 5,
            adversarial: true,
            support: false,
            lr_decay: 0.98,
            lr_shrink: 0.5,
            min_lr: 1e-6,
            seed: 42,
            checkpoint_dir: PathBuf::from("checkpoints"),
            dictionary: DictionaryConfig::default(),
            adversary: AdversarialConfig::default(),
            validation_method: InductionMethod::Csls { neighbors: 10 },
        }
    }
}

impl TrainingConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_epoch_size(mut self, epoch_size: usize) -> Self {
        self.epoch_size = epoch_size;
        self
    }

    pub fn with_refinement_rounds(mut self, rounds: usize) -> Self {
        self.refinement_rounds = rounds;
        self
    }

    pub fn with_support(mut self, support: bool) -> Self {
        self.support = support;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    pub fn with_dictionary(mut self, dictionary: DictionaryConfig) -> Self {
        self.dictionary = dictionary;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip() {
        for s in ["nn", "invsm_beta_30", "csls_knn_10"] {
            let method: InductionMethod = s.parse().unwrap();
            assert_eq!(method.to_string(), s);
        }
    }

    #[test]
    fn test_method_parses_fractional_beta() {
        let method: InductionMethod = "invsm_beta_0.5".parse().unwrap();
        assert_eq!(method, InductionMethod::InvertedSoftmax { beta: 0.5 });
    }

    #[test]
    fn test_method_rejects_garbage() {
        assert!("csls_knn_x".parse::<InductionMethod>().is_err());
        assert!("euclidean".parse::<InductionMethod>().is_err());
    }

    #[test]
    fn test_build_policy_round_trip() {
        for s in ["S2T", "T2S", "S2T|T2S", "S2T&T2S"] {
            let policy: BuildPolicy = s.parse().unwrap();
            assert_eq!(policy.to_string(), s);
        }
    }

    #[test]
    fn test_build_policy_directions() {
        assert!(BuildPolicy::SourceToTarget.uses_forward());
        assert!(!BuildPolicy::SourceToTarget.uses_backward());
        assert!(BuildPolicy::Intersection.uses_forward());
        assert!(BuildPolicy::Intersection.uses_backward());
    }

    #[test]
    fn test_training_config_defaults() {
        let config = TrainingConfig::default();
        assert!(config.adversarial);
        assert!(!config.support);
        assert_eq!(config.adversary.dis_steps, 5);
        assert!((config.lr_decay - 0.98).abs() < 1e-12);
    }
}
