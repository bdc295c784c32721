//! Binary classifier distinguishing mapped source vectors from true
//! target vectors.

use candle_core::{Device, Tensor, Var};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AdversarialConfig;
use crate::error::{AlignError, AlignResult};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Discriminator error: {}", e),
    }
}

struct Linear {
    weight: Var,
    bias: Var,
}

impl Linear {
    /// Uniform `±1/√fan_in` initialization from a seeded RNG.
    fn new(fan_in: usize, fan_out: usize, rng: &mut StdRng, device: &Device) -> AlignResult<Self> {
        let bound = 1.0 / (fan_in as f32).sqrt();
        let weight_data: Vec<f32> = (0..fan_out * fan_in)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        let weight = Tensor::from_vec(weight_data, (fan_out, fan_in), device)
            .map_err(map_candle)?;
        let bias_data: Vec<f32> = (0..fan_out).map(|_| rng.gen_range(-bound..bound)).collect();
        let bias = Tensor::from_vec(bias_data, fan_out, device).map_err(map_candle)?;
        Ok(Self {
            weight: Var::from_tensor(&weight).map_err(map_candle)?,
            bias: Var::from_tensor(&bias).map_err(map_candle)?,
        })
    }

    fn forward(&self, x: &Tensor) -> AlignResult<Tensor> {
        let wt = self.weight.as_tensor().t().map_err(map_candle)?;
        x.matmul(&wt)
            .map_err(map_candle)?
            .broadcast_add(self.bias.as_tensor())
            .map_err(map_candle)
    }
}

/// Feed-forward discriminator over embedding vectors.
///
/// Input dropout, `dis_layers` hidden layers with LeakyReLU(0.2) and
/// dropout, and a single-logit output head. The forward pass returns raw
/// logits so the loss can use the numerically stable with-logits form;
/// [`Discriminator::predict`] applies the sigmoid.
pub struct Discriminator {
    layers: Vec<Linear>,
    input_dropout: f32,
    dropout: f32,
}

impl Discriminator {
    pub fn new(
        dim: usize,
        config: &AdversarialConfig,
        device: &Device,
        seed: u64,
    ) -> AlignResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sizes = vec![dim];
        sizes.extend(std::iter::repeat(config.dis_hidden).take(config.dis_layers));
        sizes.push(1);

        let mut layers = Vec::with_capacity(sizes.len() - 1);
        for pair in sizes.windows(2) {
            layers.push(Linear::new(pair[0], pair[1], &mut rng, device)?);
        }
        Ok(Self {
            layers,
            input_dropout: config.dis_input_dropout,
            dropout: config.dis_dropout,
        })
    }

    /// Logits for a batch of vectors, shape `(n,)`.
    ///
    /// `train` enables the dropout layers; evaluation and fooling steps
    /// run the deterministic path.
    pub fn forward(&self, x: &Tensor, train: bool) -> AlignResult<Tensor> {
        let mut h = x.clone();
        if train && self.input_dropout > 0.0 {
            h = candle_nn::ops::dropout(&h, self.input_dropout).map_err(map_candle)?;
        }
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i < last {
                h = leaky_relu(&h, 0.2)?;
                if train && self.dropout > 0.0 {
                    h = candle_nn::ops::dropout(&h, self.dropout).map_err(map_candle)?;
                }
            }
        }
        h.squeeze(1).map_err(map_candle)
    }

    /// Probabilities in `[0, 1]` (eval mode).
    pub fn predict(&self, x: &Tensor) -> AlignResult<Tensor> {
        let logits = self.forward(x, false)?;
        candle_nn::ops::sigmoid(&logits).map_err(map_candle)
    }

    /// All trainable variables, for optimizer registration.
    pub fn vars(&self) -> Vec<&Var> {
        self.layers
            .iter()
            .flat_map(|l| [&l.weight, &l.bias])
            .collect()
    }

    /// Clamp every parameter to `[-clip, clip]`.
    pub fn clip_weights(&self, clip: f32) -> AlignResult<()> {
        crate::training::sgd::clip_vars(&self.vars(), clip)
    }
}

fn leaky_relu(x: &Tensor, slope: f64) -> AlignResult<Tensor> {
    let scaled = x.affine(slope, 0.0).map_err(map_candle)?;
    x.maximum(&scaled).map_err(map_candle)
}
