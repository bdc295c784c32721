//! Plain SGD over candle `Var`s.
//!
//! The mapping and the discriminator both train with vanilla SGD; the
//! per-epoch decay and the hysteresis shrink live in the trainer, which
//! adjusts the rate through [`Sgd::set_lr`].

use candle_core::{Tensor, Var};

use crate::error::{AlignError, AlignResult};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Optimizer error: {}", e),
    }
}

/// Stochastic gradient descent with a mutable learning rate.
pub struct Sgd {
    params: Vec<Var>,
    lr: f64,
}

impl Sgd {
    pub fn new(params: Vec<Var>, lr: f64) -> Self {
        Self { params, lr }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Backward pass followed by one descent step on every registered
    /// parameter that received a gradient.
    pub fn step(&self, loss: &Tensor) -> AlignResult<()> {
        let grads = loss.backward().map_err(map_candle)?;
        for var in &self.params {
            let grad = match grads.get(var.as_tensor()) {
                Some(g) => g,
                None => continue,
            };
            let update = grad.affine(self.lr, 0.0).map_err(map_candle)?;
            let new_val = var
                .as_tensor()
                .sub(&update)
                .map_err(map_candle)?
                .detach();
            var.set(&new_val).map_err(map_candle)?;
        }
        Ok(())
    }
}

/// Clamp a set of variables elementwise to `[-clip, clip]`.
pub fn clip_vars(vars: &[&Var], clip: f32) -> AlignResult<()> {
    if clip <= 0.0 {
        return Ok(());
    }
    for var in vars {
        let clamped = var
            .as_tensor()
            .clamp(-clip, clip)
            .map_err(map_candle)?
            .detach();
        var.set(&clamped).map_err(map_candle)?;
    }
    Ok(())
}
