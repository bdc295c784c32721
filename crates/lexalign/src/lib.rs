//! Multilingual word-embedding alignment.
//!
//! `lexalign` aligns pretrained word-embedding spaces from several
//! languages into one shared vector space and induces bilingual /
//! multilingual dictionaries from the aligned spaces, with no parallel
//! data required beyond an optional seed dictionary.
//!
//! # Architecture
//!
//! - **[`scoring`]**: batched top-2 similarity search (plain dot
//!   product, inverted softmax, CSLS hubness correction)
//! - **[`induction`]**: candidate ranking and filtering, directional
//!   dictionary building, multilingual cross-matching
//! - **[`solver`]**: two-space orthogonal Procrustes and generalized
//!   Procrustes over N spaces
//! - **[`training`]**: adversarial discriminator/mapping steps and the
//!   orchestrating [`training::Trainer`]
//! - **[`metrics`]**: unsupervised mean-cosine model selection
//! - **[`io`]**: embedding files, dictionary files, mapping checkpoints
//!
//! All tensor work runs on a caller-chosen [`candle_core::Device`]; the
//! pipeline itself is single-threaded and synchronous.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use candle_core::Device;
//! use lexalign::{
//!     io::embeddings::load_embeddings, Lang, LanguageSet, Trainer, TrainingConfig,
//! };
//!
//! # fn run() -> lexalign::AlignResult<()> {
//! let device = Device::Cpu;
//! let src = load_embeddings(Path::new("en.vec"), Lang::new("en"), Some(200_000), false, &device)?;
//! let tgt = load_embeddings(Path::new("de.vec"), Lang::new("de"), Some(200_000), false, &device)?;
//!
//! let languages = LanguageSet::from_spaces(vec![src, tgt], &device)?;
//! let mut trainer = Trainer::new(languages, TrainingConfig::default(), device)?;
//! let history = trainer.fit()?;
//! println!("best validation metric: {}", trainer.best_valid_metric());
//! # let _ = history;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod induction;
pub mod io;
pub mod mapping;
pub mod metrics;
pub mod scoring;
pub mod solver;
pub mod training;
pub mod types;

pub use config::{
    AdversarialConfig, BuildPolicy, DictionaryConfig, InductionMethod, TrainingConfig,
};
pub use error::{AlignError, AlignResult};
pub use mapping::{LanguageSet, LanguageState, Mapping};
pub use training::{Trainer, TrainingHistory};
pub use types::{
    EmbeddingSpace, Lang, MultilingualDictionary, PairwiseDictionary, Vocabulary,
};
