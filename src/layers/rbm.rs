use std::io::{BufRead, Write};

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::activation::activation::UnitType;
use crate::error::{DbnError, Result};
use crate::layers::{TrainingContext, UnitLayer};
use crate::math::matrix::Matrix;
use crate::optim::momentum::momentum_at;
use crate::persist::{expect_block, write_block};

/// Standard deviation of the initial weights.
const INIT_STD_DEV: f64 = 0.01;

/// Hyperparameters of the contrastive-divergence learning rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbmConfig {
    pub learning_rate: f64,
    pub initial_momentum: f64,
    pub final_momentum: f64,
    pub final_momentum_epoch: usize,
    pub weight_cost: f64,
    /// Mini-batch size of one CD update.
    pub batch_size: usize,
    /// Seed for weight initialization and Gibbs sampling; `None` draws one
    /// from the OS.
    pub seed: Option<u64>,
}

impl Default for RbmConfig {
    fn default() -> Self {
        RbmConfig {
            learning_rate: 0.1,
            initial_momentum: 0.5,
            final_momentum: 0.9,
            final_momentum_epoch: 6,
            weight_cost: 0.0002,
            batch_size: 10,
            seed: None,
        }
    }
}

impl RbmConfig {
    pub fn momentum_at(&self, epoch: usize) -> f64 {
        momentum_at(epoch, self.initial_momentum, self.final_momentum, self.final_momentum_epoch)
    }
}

#[derive(Serialize)]
struct RbmBlockRef<'a> {
    visible: usize,
    hidden: usize,
    weights: &'a Matrix,
    visible_bias: &'a [f64],
    hidden_bias: &'a [f64],
}

#[derive(Deserialize)]
struct RbmBlock {
    visible: usize,
    hidden: usize,
    weights: Matrix,
    visible_bias: Vec<f64>,
    hidden_bias: Vec<f64>,
}

/// Restricted Boltzmann Machine trained with CD-1.
#[derive(Debug)]
pub struct Rbm {
    visible: usize,
    hidden: usize,
    pub visible_unit: UnitType,
    pub hidden_unit: UnitType,
    pub weights: Matrix,
    pub visible_bias: Vec<f64>,
    pub hidden_bias: Vec<f64>,
    pub config: RbmConfig,

    weights_inc: Matrix,
    visible_bias_inc: Vec<f64>,
    hidden_bias_inc: Vec<f64>,
    rng: StdRng,
}

impl Rbm {
    /// Binary-binary RBM.
    pub fn new(visible: usize, hidden: usize, config: RbmConfig) -> Rbm {
        Rbm::with_units(visible, hidden, UnitType::Binary, UnitType::Binary, config)
    }

    pub fn with_units(
        visible: usize,
        hidden: usize,
        visible_unit: UnitType,
        hidden_unit: UnitType,
        config: RbmConfig,
    ) -> Rbm {
        assert!(visible > 0 && hidden > 0, "an RBM needs at least one visible and one hidden unit");

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let weights = Matrix::gaussian(visible, hidden, INIT_STD_DEV, &mut rng);

        Rbm {
            visible,
            hidden,
            visible_unit,
            hidden_unit,
            weights,
            visible_bias: vec![0.0; visible],
            hidden_bias: vec![0.0; hidden],
            config,
            weights_inc: Matrix::zeros(visible, hidden),
            visible_bias_inc: vec![0.0; visible],
            hidden_bias_inc: vec![0.0; hidden],
            rng,
        }
    }

    pub fn hidden_probabilities(&self, visible: &[f64]) -> Vec<f64> {
        self.weights.vec_mul(visible).into_iter()
            .zip(&self.hidden_bias)
            .map(|(x, b)| self.hidden_unit.function(x + b))
            .collect()
    }

    pub fn visible_probabilities(&self, hidden: &[f64]) -> Vec<f64> {
        self.weights.mul_vec(hidden).into_iter()
            .zip(&self.visible_bias)
            .map(|(x, b)| self.visible_unit.function(x + b))
            .collect()
    }

    /// One CD-1 update over a mini-batch.
    fn contrastive_divergence(&mut self, batch: &[Vec<f64>], context: &mut TrainingContext) {
        let n = batch.len() as f64;
        let hidden_unit = self.hidden_unit;

        let mut weights_grad = Matrix::zeros(self.visible, self.hidden);
        let mut visible_grad = vec![0.0; self.visible];
        let mut hidden_grad = vec![0.0; self.hidden];

        for v0 in batch {
            let h0 = self.hidden_probabilities(v0);
            let h0_states: Vec<f64> = h0.iter()
                .map(|&p| hidden_unit.sample(p, &mut self.rng))
                .collect();
            let v1 = self.visible_probabilities(&h0_states);
            let h1 = self.hidden_probabilities(&v1);

            weights_grad.add_outer(v0, &h0, 1.0);
            weights_grad.add_outer(&v1, &h1, -1.0);
            for ((g, a), b) in visible_grad.iter_mut().zip(v0).zip(&v1) {
                *g += a - b;
            }
            for ((g, a), b) in hidden_grad.iter_mut().zip(&h0).zip(&h1) {
                *g += a - b;
            }

            context.reconstruction_error += v0.iter().zip(&v1)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>() / self.visible as f64;
        }

        let lr = self.config.learning_rate;
        let wc = self.config.weight_cost;
        let momentum = context.momentum;

        self.weights_inc.zip_apply(&weights_grad, |inc, g| momentum * inc + lr * g / n);
        self.weights_inc.zip_apply(&self.weights, |inc, w| inc - lr * wc * w);
        self.weights.zip_apply(&self.weights_inc, |w, inc| w + inc);

        for ((inc, g), b) in self.visible_bias_inc.iter_mut().zip(&visible_grad).zip(self.visible_bias.iter_mut()) {
            *inc = momentum * *inc + lr * g / n;
            *b += *inc;
        }
        for ((inc, g), b) in self.hidden_bias_inc.iter_mut().zip(&hidden_grad).zip(self.hidden_bias.iter_mut()) {
            *inc = momentum * *inc + lr * g / n;
            *b += *inc;
        }

        context.batches += 1;
        context.samples += batch.len();
    }
}

impl UnitLayer for Rbm {
    fn input_size(&self) -> usize {
        self.visible
    }

    fn output_size(&self) -> usize {
        self.hidden
    }

    fn preferred_batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    fn parameters(&self) -> usize {
        self.visible * self.hidden + self.visible + self.hidden
    }

    fn describe(&self) -> String {
        format!(
            "RBM({:?}->{:?}): {} -> {}",
            self.visible_unit, self.hidden_unit, self.visible, self.hidden
        )
    }

    fn activate_one(&self, input: &[f64]) -> Vec<f64> {
        self.hidden_probabilities(input)
    }

    fn activate_visible(&self, hidden: &[f64]) -> Vec<f64> {
        self.visible_probabilities(hidden)
    }

    fn init_training(&mut self) {
        self.weights_inc = Matrix::zeros(self.visible, self.hidden);
        self.visible_bias_inc = vec![0.0; self.visible];
        self.hidden_bias_inc = vec![0.0; self.hidden];
    }

    fn init_epoch(&mut self, epoch: usize, context: &mut TrainingContext) {
        context.momentum = self.config.momentum_at(epoch);
    }

    fn train_sub(&mut self, batch: &[Vec<f64>], context: &mut TrainingContext) {
        for chunk in batch.chunks(self.preferred_batch_size()) {
            self.contrastive_divergence(chunk, context);
        }
    }

    fn finalize_epoch(&mut self, epoch: usize, context: &TrainingContext) {
        log::debug!(
            "RBM {}x{}: epoch {} - reconstruction error {:.5} ({} batches)",
            self.visible, self.hidden, epoch, context.mean_error(), context.batches
        );
    }

    /// Gradient layout: weights row-major, then hidden biases. Visible biases
    /// play no part in the feed-forward pass.
    fn backward(&self, input: &[f64], output: &[f64], output_delta: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let dz: Vec<f64> = output.iter().zip(output_delta)
            .map(|(&y, &d)| d * self.hidden_unit.derivative(y))
            .collect();

        let mut gradients = Vec::with_capacity(self.visible * self.hidden + self.hidden);
        for &x in input {
            gradients.extend(dz.iter().map(|d| x * d));
        }
        gradients.extend_from_slice(&dz);

        (gradients, self.weights.mul_vec(&dz))
    }

    fn apply_update(&mut self, update: &[f64], decay: f64) {
        let (weights_update, bias_update) = update.split_at(self.visible * self.hidden);
        for (w, u) in self.weights.iter_mut().zip(weights_update) {
            *w += u - decay * *w;
        }
        for (b, u) in self.hidden_bias.iter_mut().zip(bias_update) {
            *b += u;
        }
    }

    fn store(&self, os: &mut dyn Write) -> Result<()> {
        write_block(os, &RbmBlockRef {
            visible: self.visible,
            hidden: self.hidden,
            weights: &self.weights,
            visible_bias: &self.visible_bias,
            hidden_bias: &self.hidden_bias,
        })
    }

    fn load(&mut self, is: &mut dyn BufRead) -> Result<()> {
        let block: RbmBlock = expect_block(is, "RBM")?;

        if block.visible != self.visible {
            return Err(DbnError::SizeMismatch { what: "RBM visible units", got: block.visible, expected: self.visible });
        }
        if block.hidden != self.hidden {
            return Err(DbnError::SizeMismatch { what: "RBM hidden units", got: block.hidden, expected: self.hidden });
        }
        if block.weights.rows != self.visible || block.weights.cols != self.hidden {
            return Err(DbnError::SizeMismatch { what: "RBM weights", got: block.weights.len(), expected: self.visible * self.hidden });
        }
        if block.visible_bias.len() != self.visible {
            return Err(DbnError::SizeMismatch { what: "RBM visible biases", got: block.visible_bias.len(), expected: self.visible });
        }
        if block.hidden_bias.len() != self.hidden {
            return Err(DbnError::SizeMismatch { what: "RBM hidden biases", got: block.hidden_bias.len(), expected: self.hidden });
        }

        self.weights = block.weights;
        self.visible_bias = block.visible_bias;
        self.hidden_bias = block.hidden_bias;
        Ok(())
    }
}
