pub mod pooling;
pub mod rbm;

pub use pooling::{Pooling, PoolingKind};
pub use rbm::{Rbm, RbmConfig};

use std::io::{BufRead, Write};

use crate::error::Result;

/// Running statistics of one layer's training during a single epoch.
///
/// A fresh context is created at the start of every epoch and dropped at its
/// end; in memory-saving mode it carries state across the big batches.
#[derive(Debug, Clone, Default)]
pub struct TrainingContext {
    /// Momentum in effect for this epoch.
    pub momentum: f64,
    /// Sum of per-sample reconstruction errors.
    pub reconstruction_error: f64,
    /// Mini-batches processed so far.
    pub batches: usize,
    /// Samples processed so far.
    pub samples: usize,
}

impl TrainingContext {
    pub fn mean_error(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.reconstruction_error / self.samples as f64
        }
    }
}

/// One stage of a DBN stack.
///
/// The network only ever talks to its layers through this trait: size
/// queries, the unsupervised training hooks, forward/backward activation and
/// persistence. Layers never see each other.
pub trait UnitLayer: Send + Sync {
    fn input_size(&self) -> usize;
    fn output_size(&self) -> usize;

    /// Pooling layers are never trained nor persisted; they only pass
    /// activations through.
    fn is_pooling(&self) -> bool {
        false
    }

    /// Whether this layer is pretrained when it sits at the top of the stack.
    fn pretrain_last(&self) -> bool {
        true
    }

    /// Mini-batch size of the layer's own learning rule.
    fn preferred_batch_size(&self) -> usize {
        1
    }

    /// Number of learnable parameters.
    fn parameters(&self) -> usize;

    /// One-line human readable summary.
    fn describe(&self) -> String;

    fn convert_sample(&self, sample: &[f64]) -> Vec<f64> {
        sample.to_vec()
    }

    fn convert_input(&self, samples: &[Vec<f64>]) -> Vec<Vec<f64>> {
        samples.iter().map(|s| self.convert_sample(s)).collect()
    }

    /// Output activation probabilities for one input.
    fn activate_one(&self, input: &[f64]) -> Vec<f64>;

    fn activate_many(&self, inputs: &[Vec<f64>]) -> Vec<Vec<f64>> {
        inputs.iter().map(|input| self.activate_one(input)).collect()
    }

    /// Hidden probabilities given a visible vector.
    fn activate_hidden(&self, visible: &[f64]) -> Vec<f64> {
        self.activate_one(visible)
    }

    /// Visible reconstruction given a hidden vector.
    fn activate_visible(&self, hidden: &[f64]) -> Vec<f64>;

    fn init_training(&mut self) {}

    fn init_epoch(&mut self, _epoch: usize, _context: &mut TrainingContext) {}

    /// Trains on one slice of the epoch's data.
    fn train_sub(&mut self, batch: &[Vec<f64>], context: &mut TrainingContext);

    fn finalize_epoch(&mut self, _epoch: usize, _context: &TrainingContext) {}

    fn finalize_training(&mut self) {}

    /// Full-batch unsupervised training; returns the last epoch's mean error.
    ///
    /// Memory-saving pretraining drives the same hooks one big batch at a
    /// time, so both paths see the same sequence of updates.
    fn train(&mut self, data: &[Vec<f64>], max_epochs: usize) -> f64 {
        self.init_training();

        let mut error = 0.0;
        for epoch in 0..max_epochs {
            let mut context = TrainingContext::default();
            self.init_epoch(epoch, &mut context);
            self.train_sub(data, &mut context);
            self.finalize_epoch(epoch, &context);
            error = context.mean_error();
        }

        self.finalize_training();
        error
    }

    /// Backpropagates `output_delta` (∂E/∂output) through the layer.
    ///
    /// Returns the parameter gradients, flattened in the layer's own order
    /// (`parameters()` values), and ∂E/∂input.
    fn backward(&self, input: &[f64], output: &[f64], output_delta: &[f64]) -> (Vec<f64>, Vec<f64>);

    /// Adds `update` to the parameters and shrinks the weights by `decay`.
    ///
    /// The empty default only suits parameter-free layers, whose `backward`
    /// returns no gradients.
    fn apply_update(&mut self, _update: &[f64], _decay: f64) {}

    /// Writes the layer's parameter block. Parameter-free layers write
    /// nothing.
    fn store(&self, os: &mut dyn Write) -> Result<()>;

    /// Reads back what `store` wrote.
    fn load(&mut self, is: &mut dyn BufRead) -> Result<()>;
}
