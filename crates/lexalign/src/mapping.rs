//! Per-language linear mappings into the shared space.
//!
//! Each language owns a square `(dim, dim)` matrix applied as `x · Wᵀ`.
//! The matrix starts at the identity and is mutated in place by the
//! Procrustes solver (exact SVD re-projection) and by adversarial
//! gradient steps (followed by the soft orthogonality relaxation).

use std::collections::BTreeMap;

use candle_core::{Device, Tensor, Var};

use crate::error::{AlignError, AlignResult};
use crate::types::{l2_normalize_rows, EmbeddingSpace, Lang};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Mapping error: {}", e),
    }
}

/// A trainable orthogonal-ish mapping for one language.
pub struct Mapping {
    lang: Lang,
    weight: Var,
    dim: usize,
}

impl Mapping {
    /// Create an identity-initialized mapping.
    pub fn identity(lang: Lang, dim: usize, device: &Device) -> AlignResult<Self> {
        let mut data = vec![0.0f32; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        let weight = Tensor::from_vec(data, (dim, dim), device).map_err(map_candle)?;
        let weight = Var::from_tensor(&weight).map_err(map_candle)?;
        Ok(Self { lang, weight, dim })
    }

    pub fn lang(&self) -> &Lang {
        &self.lang
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The current weight matrix.
    pub fn weight(&self) -> Tensor {
        self.weight.as_tensor().clone()
    }

    /// The trainable variable, for optimizer registration.
    pub fn var(&self) -> &Var {
        &self.weight
    }

    /// Apply the mapping to a batch of row vectors: `x · Wᵀ`.
    ///
    /// The result keeps the autograd graph through the weight, so
    /// adversarial losses can back-propagate into it.
    pub fn apply(&self, x: &Tensor) -> AlignResult<Tensor> {
        let wt = self.weight.as_tensor().t().map_err(map_candle)?;
        x.matmul(&wt).map_err(map_candle)
    }

    /// Install a new weight matrix. Fails on any shape disagreement:
    /// a mismatch means the checkpoint or solver output belongs to a
    /// different model.
    pub fn set_weight(&self, weight: &Tensor) -> AlignResult<()> {
        let actual = weight.dims2().map_err(map_candle)?;
        if actual != (self.dim, self.dim) {
            return Err(AlignError::ShapeMismatch {
                expected: (self.dim, self.dim),
                actual,
            });
        }
        self.weight.set(weight).map_err(map_candle)
    }

    /// Soft orthogonality relaxation: `W ← (1+β)W − β·W(WᵀW)`.
    ///
    /// First-order step toward the orthogonal manifold, applied after
    /// each adversarial mapping update. Distinct from the exact SVD
    /// re-projection performed by the Procrustes solver.
    pub fn relax_toward_orthogonal(&self, beta: f32) -> AlignResult<()> {
        if beta <= 0.0 {
            return Ok(());
        }
        let beta = beta as f64;
        let w = self.weight.as_tensor().detach();
        let wtw = w
            .t()
            .map_err(map_candle)?
            .matmul(&w)
            .map_err(map_candle)?;
        let correction = w.matmul(&wtw).map_err(map_candle)?;
        let updated = w
            .affine(1.0 + beta, 0.0)
            .map_err(map_candle)?
            .sub(&correction.affine(beta, 0.0).map_err(map_candle)?)
            .map_err(map_candle)?;
        self.weight.set(&updated).map_err(map_candle)
    }
}

/// One language's state: its (fixed) embedding space and its (trainable)
/// mapping.
pub struct LanguageState {
    pub space: EmbeddingSpace,
    pub mapping: Mapping,
}

impl LanguageState {
    /// Mapped and row-normalized embeddings, the view dictionary
    /// induction runs on.
    pub fn mapped_normalized(&self) -> AlignResult<Tensor> {
        let mapped = self.mapping.apply(self.space.matrix())?.detach();
        l2_normalize_rows(&mapped)
    }
}

/// The full set of languages in an alignment run: one source, one or more
/// targets, each with its own state.
///
/// Validated at construction: every configured language must have a
/// state, every state must belong to a configured language, and all
/// spaces must share one embedding dimension.
pub struct LanguageSet {
    source: Lang,
    targets: Vec<Lang>,
    states: BTreeMap<Lang, LanguageState>,
    dim: usize,
}

impl LanguageSet {
    pub fn new(
        source: Lang,
        targets: Vec<Lang>,
        states: BTreeMap<Lang, LanguageState>,
    ) -> AlignResult<Self> {
        if targets.is_empty() {
            return Err(AlignError::InvalidInput {
                message: "at least one target language is required".to_string(),
            });
        }
        for (i, lang) in targets.iter().enumerate() {
            if *lang == source || targets[..i].contains(lang) {
                return Err(AlignError::InvalidInput {
                    message: format!("duplicate language '{}' in the configured set", lang),
                });
            }
        }
        let mut dim = None;
        for lang in std::iter::once(&source).chain(targets.iter()) {
            let state = states
                .get(lang)
                .ok_or_else(|| AlignError::IncompleteLanguageSet {
                    lang: lang.to_string(),
                })?;
            let state_dim = state.space.dim()?;
            if state.mapping.dim() != state_dim {
                return Err(AlignError::DimensionMismatch {
                    expected: state_dim,
                    actual: state.mapping.dim(),
                });
            }
            match dim {
                None => dim = Some(state_dim),
                Some(d) if d != state_dim => {
                    return Err(AlignError::DimensionMismatch {
                        expected: d,
                        actual: state_dim,
                    })
                }
                Some(_) => {}
            }
        }
        let expected = targets.len() + 1;
        if states.len() != expected {
            let extra = states
                .keys()
                .find(|l| **l != source && !targets.contains(l))
                .map(|l| l.to_string())
                .unwrap_or_default();
            return Err(AlignError::UnknownLanguage { lang: extra });
        }
        let dim = dim.ok_or_else(|| AlignError::InvalidInput {
            message: "empty language set".to_string(),
        })?;
        Ok(Self {
            source,
            targets,
            states,
            dim,
        })
    }

    /// Build a language set with identity mappings from the given spaces.
    /// The first space is the source; the rest are targets in order.
    pub fn from_spaces(spaces: Vec<EmbeddingSpace>, device: &Device) -> AlignResult<Self> {
        if spaces.len() < 2 {
            return Err(AlignError::InvalidInput {
                message: "need a source space and at least one target space".to_string(),
            });
        }
        let source = spaces[0].lang().clone();
        let targets: Vec<Lang> = spaces[1..].iter().map(|s| s.lang().clone()).collect();
        let mut states = BTreeMap::new();
        for space in spaces {
            let lang = space.lang().clone();
            let dim = space.dim()?;
            let mapping = Mapping::identity(lang.clone(), dim, device)?;
            states.insert(lang, LanguageState { space, mapping });
        }
        Self::new(source, targets, states)
    }

    pub fn source(&self) -> &Lang {
        &self.source
    }

    pub fn targets(&self) -> &[Lang] {
        &self.targets
    }

    /// The last configured target language (the adversarial anchor and
    /// the two-space alignment target). The constructor guarantees at
    /// least one target exists.
    pub fn last_target(&self) -> &Lang {
        self.targets.last().expect("validated at construction")
    }

    /// Embedding dimension shared by every space in the set.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Source plus targets, source first.
    pub fn all_langs(&self) -> Vec<Lang> {
        let mut langs = vec![self.source.clone()];
        langs.extend(self.targets.iter().cloned());
        langs
    }

    pub fn state(&self, lang: &Lang) -> AlignResult<&LanguageState> {
        self.states
            .get(lang)
            .ok_or_else(|| AlignError::UnknownLanguage {
                lang: lang.to_string(),
            })
    }

    pub fn space(&self, lang: &Lang) -> AlignResult<&EmbeddingSpace> {
        Ok(&self.state(lang)?.space)
    }

    pub fn mapping(&self, lang: &Lang) -> AlignResult<&Mapping> {
        Ok(&self.state(lang)?.mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vocabulary;
    use candle_core::DType;

    fn space(lang: &str, n: usize, dim: usize) -> EmbeddingSpace {
        let words = (0..n).map(|i| format!("{}{}", lang, i)).collect();
        let vocab = Vocabulary::new(words).unwrap();
        let matrix = Tensor::zeros((n, dim), DType::F32, &Device::Cpu).unwrap();
        EmbeddingSpace::new(Lang::new(lang), vocab, matrix).unwrap()
    }

    #[test]
    fn test_identity_mapping_is_identity() {
        let mapping = Mapping::identity(Lang::new("en"), 3, &Device::Cpu).unwrap();
        let x = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], (1, 3), &Device::Cpu).unwrap();
        let y = mapping.apply(&x).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(y[0], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_set_weight_rejects_wrong_shape() {
        let mapping = Mapping::identity(Lang::new("en"), 3, &Device::Cpu).unwrap();
        let bad = Tensor::zeros((2, 3), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            mapping.set_weight(&bad),
            Err(AlignError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_relaxation_fixes_scaled_identity() {
        // For W = c·I the relaxation contracts toward c = 1.
        let mapping = Mapping::identity(Lang::new("en"), 2, &Device::Cpu).unwrap();
        let scaled = Tensor::from_vec(vec![1.1f32, 0.0, 0.0, 1.1], (2, 2), &Device::Cpu).unwrap();
        mapping.set_weight(&scaled).unwrap();
        for _ in 0..50 {
            mapping.relax_toward_orthogonal(0.01).unwrap();
        }
        let w = mapping.weight().to_vec2::<f32>().unwrap();
        assert!((w[0][0] - 1.0).abs() < 1e-3, "diagonal was {}", w[0][0]);
        assert!(w[0][1].abs() < 1e-6);
    }

    #[test]
    fn test_language_set_requires_all_states() {
        let spaces = vec![space("en", 4, 8), space("de", 4, 8)];
        let set = LanguageSet::from_spaces(spaces, &Device::Cpu).unwrap();
        assert_eq!(set.source(), &Lang::new("en"));
        assert_eq!(set.targets(), &[Lang::new("de")]);
        assert!(set.state(&Lang::new("ru")).is_err());
    }

    #[test]
    fn test_language_set_rejects_mixed_dims() {
        let spaces = vec![space("en", 4, 8), space("de", 4, 16)];
        assert!(matches!(
            LanguageSet::from_spaces(spaces, &Device::Cpu),
            Err(AlignError::DimensionMismatch { .. })
        ));
    }
}
