//! Training loop orchestrator.
//!
//! One trainer instance owns the full run state: the language set (fixed
//! embedding spaces + trainable mappings), the discriminator and its
//! optimizer, the mapping optimizer, the current training dictionary,
//! and the best-validation bookkeeping. Each step mutates that state
//! explicitly; there are no ambient globals.
//!
//! Control flow is single-threaded and synchronous. The only early-exit
//! path is a NaN loss, which surfaces as
//! [`AlignError::NumericalDivergence`] before any optimizer step is
//! applied and is never caught internally.

use std::collections::BTreeMap;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrainingConfig;
use crate::error::{AlignError, AlignResult};
use crate::induction::{build_pairwise, cross_match};
use crate::io::checkpoint;
use crate::mapping::LanguageSet;
use crate::metrics::mean_cosine_criterion;
use crate::solver::{generalized_procrustes, procrustes};
use crate::training::discriminator::Discriminator;
use crate::training::sgd::Sgd;
use crate::types::{Lang, MultilingualDictionary};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Trainer error: {}", e),
    }
}

/// Result of one adversarial epoch.
#[derive(Debug, Clone)]
pub struct EpochStats {
    /// Epoch number (0-indexed).
    pub epoch: usize,
    /// Mean discriminator loss across the epoch's steps.
    pub dis_loss: f32,
    /// Words processed by mapping steps.
    pub words: usize,
    /// Validation metric, absent when no dictionary could be induced.
    pub metric: Option<f64>,
    /// Whether this epoch's mappings were checkpointed as best.
    pub is_best: bool,
}

/// Result of one Procrustes refinement round.
#[derive(Debug, Clone)]
pub struct RefinementStats {
    /// Round number (0-indexed).
    pub round: usize,
    /// Rows in the refreshed training dictionary, `None` when the round
    /// was skipped because no dictionary could be built.
    pub dictionary_rows: Option<usize>,
    /// Validation metric after solving.
    pub metric: Option<f64>,
    /// Whether this round's mappings were checkpointed as best.
    pub is_best: bool,
}

/// Accumulated run history.
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochStats>,
    pub refinements: Vec<RefinementStats>,
}

/// Orchestrates adversarial training and Procrustes refinement over a
/// [`LanguageSet`].
pub struct Trainer {
    languages: LanguageSet,
    discriminator: Option<Discriminator>,
    dis_optimizer: Option<Sgd>,
    map_optimizer: Sgd,
    config: TrainingConfig,
    dictionary: Option<MultilingualDictionary>,
    best_valid_metric: f64,
    /// Set once the validation metric has declined; a second consecutive
    /// decline triggers the learning-rate shrink.
    previous_epoch_declined: bool,
    /// Whether the generalized solver has consumed its arbitrary
    /// first-run reference seed.
    gpa_seeded: bool,
    rng: StdRng,
    device: Device,
}

impl Trainer {
    pub fn new(
        languages: LanguageSet,
        config: TrainingConfig,
        device: Device,
    ) -> AlignResult<Self> {
        let (discriminator, dis_optimizer) = if config.adversarial {
            let disc =
                Discriminator::new(languages.dim(), &config.adversary, &device, config.seed)?;
            let params = disc.vars().into_iter().cloned().collect();
            let opt = Sgd::new(params, config.adversary.dis_lr);
            (Some(disc), Some(opt))
        } else {
            (None, None)
        };

        let source_var = languages
            .mapping(&languages.source().clone())?
            .var()
            .clone();
        let map_optimizer = Sgd::new(vec![source_var], config.adversary.map_lr);
        let rng = StdRng::seed_from_u64(config.seed);

        Ok(Self {
            languages,
            discriminator,
            dis_optimizer,
            map_optimizer,
            config,
            dictionary: None,
            best_valid_metric: f64::NEG_INFINITY,
            previous_epoch_declined: false,
            gpa_seeded: false,
            rng,
            device,
        })
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn dictionary(&self) -> Option<&MultilingualDictionary> {
        self.dictionary.as_ref()
    }

    /// The discriminator, when adversarial training is enabled (for
    /// calibration probes).
    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    /// Install a seed dictionary (loaded from file or synthesized by
    /// string identity) as the current training dictionary.
    pub fn set_dictionary(&mut self, dictionary: MultilingualDictionary) {
        self.dictionary = Some(dictionary);
    }

    /// Cross-match per-language seed dictionaries (one per induction
    /// language, optionally a bridge between the first two targets) and
    /// install the result as the training dictionary.
    pub fn seed_from_pairwise(
        &mut self,
        dicts: &BTreeMap<Lang, crate::types::PairwiseDictionary>,
        bridge: Option<&crate::types::PairwiseDictionary>,
    ) -> AlignResult<()> {
        let lang_list = self.induction_langs();
        self.dictionary = Some(cross_match(&lang_list, dicts, bridge)?);
        Ok(())
    }

    pub fn best_valid_metric(&self) -> f64 {
        self.best_valid_metric
    }

    /// Target languages the induction round works on: all of them when
    /// support alignment is enabled, otherwise only the last one.
    fn induction_langs(&self) -> Vec<Lang> {
        if self.config.support {
            self.languages.targets().to_vec()
        } else {
            vec![self.languages.last_target().clone()]
        }
    }

    /// Sample a balanced adversarial batch: mapped source rows followed
    /// by raw target rows, with smoothed labels.
    ///
    /// `for_mapping` keeps the autograd graph through the source
    /// mapping; discriminator steps detach it.
    fn sample_adversarial_batch(&mut self, for_mapping: bool) -> AlignResult<(Tensor, Tensor)> {
        let source_lang = self.languages.source().clone();
        let target_lang = self.languages.last_target().clone();
        let src_len = self.languages.space(&source_lang)?.len();
        let tgt_len = self.languages.space(&target_lang)?.len();

        let most_frequent = self.config.adversary.dis_most_frequent;
        let cap = if most_frequent == 0 {
            0
        } else {
            most_frequent.min(src_len).min(tgt_len)
        };
        let src_range = if cap == 0 { src_len } else { cap };
        let tgt_range = if cap == 0 { tgt_len } else { cap };

        let bs = self.config.adversary.batch_size;
        let src_ids: Vec<usize> = (0..bs).map(|_| self.rng.gen_range(0..src_range)).collect();
        let tgt_ids: Vec<usize> = (0..bs).map(|_| self.rng.gen_range(0..tgt_range)).collect();

        let src_state = self.languages.state(&source_lang)?;
        let src_rows = src_state.space.rows(&src_ids)?;
        let mapped = src_state.mapping.apply(&src_rows)?;
        let mapped = if for_mapping { mapped } else { mapped.detach() };
        let tgt_rows = self.languages.space(&target_lang)?.rows(&tgt_ids)?;

        let x = Tensor::cat(&[&mapped, &tgt_rows], 0).map_err(map_candle)?;

        let smooth = self.config.adversary.dis_smooth;
        let mut labels = vec![1.0 - smooth; bs];
        labels.extend(std::iter::repeat(smooth).take(bs));
        let y = Tensor::from_vec(labels, 2 * bs, &self.device).map_err(map_candle)?;

        Ok((x, y))
    }

    /// One discriminator update. Returns the loss value.
    ///
    /// A NaN loss aborts the run before the optimizer step; the
    /// discriminator weights are left exactly as they were.
    pub fn discriminator_step(&mut self) -> AlignResult<f32> {
        let (x, y) = self.sample_adversarial_batch(false)?;
        let (discriminator, optimizer) = match (&self.discriminator, &self.dis_optimizer) {
            (Some(d), Some(o)) => (d, o),
            _ => {
                return Err(AlignError::InvalidInput {
                    message: "adversarial training is disabled".to_string(),
                })
            }
        };

        let logits = discriminator.forward(&x.detach(), true)?;
        let loss =
            candle_nn::loss::binary_cross_entropy_with_logit(&logits, &y).map_err(map_candle)?;
        let value = loss.to_scalar::<f32>().map_err(map_candle)?;
        if !value.is_finite() {
            tracing::error!("NaN detected (discriminator)");
            return Err(AlignError::NumericalDivergence {
                context: "discriminator loss".to_string(),
            });
        }

        optimizer.step(&loss)?;
        discriminator.clip_weights(self.config.adversary.dis_clip_weights)?;
        Ok(value)
    }

    /// One adversarial fooling step on the source mapping. Returns the
    /// number of words processed (zero when the step is disabled).
    pub fn mapping_step(&mut self) -> AlignResult<usize> {
        let lambda = self.config.adversary.dis_lambda;
        if lambda == 0.0 {
            return Ok(0);
        }
        let (x, y) = self.sample_adversarial_batch(true)?;
        let discriminator =
            self.discriminator
                .as_ref()
                .ok_or_else(|| AlignError::InvalidInput {
                    message: "adversarial training is disabled".to_string(),
                })?;

        let logits = discriminator.forward(&x, false)?;
        let inverted = y.affine(-1.0, 1.0).map_err(map_candle)?;
        let loss = candle_nn::loss::binary_cross_entropy_with_logit(&logits, &inverted)
            .map_err(map_candle)?
            .affine(lambda as f64, 0.0)
            .map_err(map_candle)?;
        let value = loss.to_scalar::<f32>().map_err(map_candle)?;
        if !value.is_finite() {
            tracing::error!("NaN detected (fooling loss)");
            return Err(AlignError::NumericalDivergence {
                context: "fooling loss".to_string(),
            });
        }

        self.map_optimizer.step(&loss)?;
        let source = self.languages.source().clone();
        self.languages
            .mapping(&source)?
            .relax_toward_orthogonal(self.config.adversary.map_beta)?;
        Ok(2 * self.config.adversary.batch_size)
    }

    /// Rebuild the training dictionary from the current mapped and
    /// normalized embeddings.
    ///
    /// Returns `false` (and leaves the previous dictionary in place)
    /// when any pairwise build comes back absent; the caller skips the
    /// dependent solver step for this round.
    pub fn refresh_dictionary(&mut self) -> AlignResult<bool> {
        let source = self.languages.source().clone();
        let src_emb = self.languages.state(&source)?.mapped_normalized()?;
        let lang_list = self.induction_langs();

        let mut dicts = BTreeMap::new();
        for lang in &lang_list {
            let tgt_emb = self.languages.state(lang)?.mapped_normalized()?;
            match build_pairwise(&src_emb, &tgt_emb, &self.config.dictionary, None, None)? {
                Some(dict) => {
                    dicts.insert(lang.clone(), dict);
                }
                None => {
                    tracing::warn!("No dictionary for {} this round, skipping", lang);
                    return Ok(false);
                }
            }
        }

        let bridge = if self.config.support && lang_list.len() > 1 {
            let a = self.languages.state(&lang_list[0])?.mapped_normalized()?;
            let b = self.languages.state(&lang_list[1])?.mapped_normalized()?;
            match build_pairwise(&a, &b, &self.config.dictionary, None, None)? {
                Some(dict) => Some(dict),
                None => {
                    tracing::warn!("No bridge dictionary this round, skipping");
                    return Ok(false);
                }
            }
        } else {
            None
        };

        self.dictionary = Some(cross_match(&lang_list, &dicts, bridge.as_ref())?);
        Ok(true)
    }

    /// Closed-form two-space Procrustes on the current dictionary,
    /// aligning the source onto the last target language.
    pub fn procrustes_step(&mut self) -> AlignResult<()> {
        let lang_list = self.induction_langs();
        let dictionary = self
            .dictionary
            .as_ref()
            .ok_or_else(|| AlignError::InvalidInput {
                message: "no training dictionary available".to_string(),
            })?;
        let target_lang = self.languages.last_target().clone();
        let source = self.languages.source().clone();

        let src_points = self
            .languages
            .space(&source)?
            .rows(&dictionary.column(0))?;
        let tgt_points = self
            .languages
            .space(&target_lang)?
            .rows(&dictionary.column(lang_list.len()))?;

        let w = procrustes(&src_points, &tgt_points)?;
        self.languages.mapping(&source)?.set_weight(&w)
    }

    /// Generalized Procrustes over the source and every induction
    /// language, updating all their mappings in place.
    pub fn generalized_procrustes_step(&mut self) -> AlignResult<()> {
        let lang_list = self.induction_langs();
        let dictionary = self
            .dictionary
            .as_ref()
            .ok_or_else(|| AlignError::InvalidInput {
                message: "no training dictionary available".to_string(),
            })?;
        let source = self.languages.source().clone();

        let mut points = BTreeMap::new();
        let mut mappings = BTreeMap::new();
        points.insert(
            source.clone(),
            self.languages.space(&source)?.rows(&dictionary.column(0))?,
        );
        mappings.insert(source.clone(), self.languages.mapping(&source)?);
        for (i, lang) in lang_list.iter().enumerate() {
            points.insert(
                lang.clone(),
                self.languages
                    .space(lang)?
                    .rows(&dictionary.column(i + 1))?,
            );
            mappings.insert(lang.clone(), self.languages.mapping(lang)?);
        }

        let reference = lang_list.first().ok_or_else(|| AlignError::InvalidInput {
            message: "no target language to align against".to_string(),
        })?;
        let initial_run = !self.gpa_seeded;
        generalized_procrustes(&points, &mappings, reference, initial_run)?;
        self.gpa_seeded = true;
        Ok(())
    }

    /// Mean-cosine validation criterion averaged over the target
    /// languages. `None` when no target produced an induced dictionary;
    /// the evaluation is skipped, not failed.
    pub fn validate(&self) -> AlignResult<Option<f64>> {
        let source = self.languages.source().clone();
        let src_emb = self.languages.state(&source)?.mapped_normalized()?;

        let mut values = Vec::new();
        for lang in self.languages.targets() {
            let tgt_emb = self.languages.state(lang)?.mapped_normalized()?;
            if let Some(value) =
                mean_cosine_criterion(&src_emb, &tgt_emb, &self.config.validation_method)?
            {
                values.push(value as f64);
            }
        }
        if values.is_empty() {
            tracing::warn!("Validation skipped: no induced dictionary for any target");
            return Ok(None);
        }
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }

    /// Checkpoint every language's mapping if `metric` strictly improves
    /// on the best seen so far. Returns whether it did.
    pub fn save_best(&mut self, metric: f64) -> AlignResult<bool> {
        if metric <= self.best_valid_metric {
            return Ok(false);
        }
        self.best_valid_metric = metric;
        tracing::info!("* Best validation metric: {:.5}", metric);
        std::fs::create_dir_all(&self.config.checkpoint_dir)?;
        for lang in self.languages.all_langs() {
            let path = checkpoint::mapping_path(&self.config.checkpoint_dir, &lang);
            checkpoint::save_mapping(self.languages.mapping(&lang)?, &path)?;
        }
        Ok(true)
    }

    /// Reload every language's best mapping from the checkpoint
    /// directory. Shape mismatches are fatal.
    pub fn reload_best(&mut self) -> AlignResult<()> {
        let dim = self.languages.dim();
        for lang in self.languages.all_langs() {
            let path = checkpoint::mapping_path(&self.config.checkpoint_dir, &lang);
            let weight = checkpoint::load_mapping(&path, dim, &self.device)?;
            tracing::info!("* Reloading best mapping from {}", path.display());
            self.languages.mapping(&lang)?.set_weight(&weight)?;
        }
        Ok(())
    }

    /// Export every language's mapped, normalized embeddings as text
    /// `.vec` files (`<lang>.vec`) under `dir`.
    pub fn export(&self, dir: &std::path::Path) -> AlignResult<()> {
        std::fs::create_dir_all(dir)?;
        for lang in self.languages.all_langs() {
            let state = self.languages.state(&lang)?;
            let mapped = state.mapped_normalized()?;
            let path = dir.join(format!("{}.vec", lang));
            crate::io::embeddings::export_embeddings(state.space.vocab(), &mapped, &path)?;
        }
        Ok(())
    }

    /// Per-epoch learning-rate schedule for the mapping optimizer:
    /// unconditional decay, plus the shrink once the validation metric
    /// has declined on two consecutive epochs.
    pub fn update_learning_rate(&mut self, metric: Option<f64>) {
        let old_lr = self.map_optimizer.lr();
        let new_lr = (old_lr * self.config.lr_decay).max(self.config.min_lr);
        if new_lr < old_lr {
            tracing::info!("Decreasing learning rate: {:.8} -> {:.8}", old_lr, new_lr);
            self.map_optimizer.set_lr(new_lr);
        }

        if self.config.lr_shrink < 1.0 {
            if let Some(metric) = metric {
                if metric < self.best_valid_metric {
                    tracing::info!(
                        "Validation metric is smaller than the best: {:.5} vs {:.5}",
                        metric,
                        self.best_valid_metric
                    );
                    if self.previous_epoch_declined {
                        let old_lr = self.map_optimizer.lr();
                        let shrunk = old_lr * self.config.lr_shrink;
                        self.map_optimizer.set_lr(shrunk);
                        tracing::info!("Shrinking the learning rate: {:.5} -> {:.5}", old_lr, shrunk);
                    }
                    self.previous_epoch_declined = true;
                } else {
                    self.previous_epoch_declined = false;
                }
            }
        }
    }

    /// Current mapping learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.map_optimizer.lr()
    }

    /// Run one adversarial epoch: `dis_steps` discriminator updates per
    /// mapping update until `epoch_size` words have been scheduled.
    pub fn adversarial_epoch(&mut self, epoch: usize) -> AlignResult<EpochStats> {
        let bs = self.config.adversary.batch_size;
        let steps = (self.config.epoch_size / (2 * bs)).max(1);

        let mut loss_sum = 0.0f64;
        let mut loss_count = 0usize;
        let mut words = 0usize;
        for _ in 0..steps {
            for _ in 0..self.config.adversary.dis_steps {
                loss_sum += self.discriminator_step()? as f64;
                loss_count += 1;
            }
            words += self.mapping_step()?;
        }
        let dis_loss = if loss_count > 0 {
            (loss_sum / loss_count as f64) as f32
        } else {
            0.0
        };
        tracing::info!(
            "Epoch {}: discriminator loss {:.5}, {} words",
            epoch,
            dis_loss,
            words
        );

        let metric = self.validate()?;
        let is_best = match metric {
            Some(m) => self.save_best(m)?,
            None => false,
        };
        self.update_learning_rate(metric);

        Ok(EpochStats {
            epoch,
            dis_loss,
            words,
            metric,
            is_best,
        })
    }

    /// One refinement round: refresh the dictionary from the current
    /// mappings and re-solve. Uses the generalized solver whenever more
    /// than two spaces take part, the closed-form two-space solver
    /// otherwise.
    pub fn refinement_round(&mut self, round: usize) -> AlignResult<RefinementStats> {
        if !self.refresh_dictionary()? {
            return Ok(RefinementStats {
                round,
                dictionary_rows: None,
                metric: None,
                is_best: false,
            });
        }
        let rows = self.dictionary.as_ref().map(|d| d.len());

        if self.config.support || self.languages.targets().len() > 1 {
            self.generalized_procrustes_step()?;
        } else {
            self.procrustes_step()?;
        }

        let metric = self.validate()?;
        let is_best = match metric {
            Some(m) => self.save_best(m)?,
            None => false,
        };
        tracing::info!(
            "Refinement round {}: {} dictionary rows, metric {:?}",
            round,
            rows.unwrap_or(0),
            metric
        );

        Ok(RefinementStats {
            round,
            dictionary_rows: rows,
            metric,
            is_best,
        })
    }

    /// Full run: adversarial epochs (when enabled) followed by
    /// refinement rounds.
    pub fn fit(&mut self) -> AlignResult<TrainingHistory> {
        let mut history = TrainingHistory::default();

        if self.config.adversarial {
            for epoch in 0..self.config.epochs {
                let stats = self.adversarial_epoch(epoch)?;
                history.epochs.push(stats);
            }
        }

        for round in 0..self.config.refinement_rounds {
            let stats = self.refinement_round(round)?;
            history.refinements.push(stats);
        }

        Ok(history)
    }
}
