use std::io::{BufRead, Write};

use crate::classifier::svm::SvmModel;
use crate::error::{DbnError, Result};
use crate::layers::{TrainingContext, UnitLayer};
use crate::math::encoding::{argmax, one_hot};
use crate::network::config::DbnConfig;
use crate::persist::{read_block, write_block};
use crate::train::fine_tune::{FineTuner, SgdFineTuner};
use crate::train::parallel::ParallelMap;
use crate::train::watcher::{DbnWatcher, LoggingWatcher};

/// Value placed in the label units of the top layer's input when querying a
/// label-augmented network.
pub const LABEL_PRIOR: f64 = 0.1;

/// A Deep Belief Network: an ordered stack of unit layers, index 0 closest to
/// the raw input.
///
/// Not `Clone`: the stack is trained in place and always handled through a
/// unique reference.
pub struct Dbn {
    pub(super) layers: Vec<Box<dyn UnitLayer>>,
    pub(super) config: DbnConfig,
    pub(super) pool: ParallelMap,
    pub(super) svm_model: Option<SvmModel>,
}

/// Feeds `input` through `layers[..until]`.
fn propagate(layers: &[Box<dyn UnitLayer>], input: &[f64], until: usize) -> Vec<f64> {
    let mut current = input.to_vec();
    for layer in &layers[..until] {
        current = layer.activate_one(&current);
    }
    current
}

/// Appends the one-hot encoding of each sample's label to its activations.
pub(crate) fn augment_with_labels(
    activations: Vec<Vec<f64>>,
    labels: &[usize],
    label_count: usize,
) -> Vec<Vec<f64>> {
    activations.into_iter()
        .zip(labels)
        .map(|(mut a, &label)| {
            a.extend(one_hot(label, label_count));
            a
        })
        .collect()
}

impl Dbn {
    /// Builds a network over `layers`; the worker pool is created here when
    /// `config.parallel` is set.
    pub fn new(layers: Vec<Box<dyn UnitLayer>>, config: DbnConfig) -> Result<Dbn> {
        assert!(!layers.is_empty(), "a DBN needs at least one layer");
        let pool = ParallelMap::new(config.parallel, config.threads)?;
        Ok(Dbn { layers, config, pool, svm_model: None })
    }

    pub fn config(&self) -> &DbnConfig {
        &self.config
    }

    /// Number of layers in the stack.
    pub fn layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> &dyn UnitLayer {
        self.layers[index].as_ref()
    }

    pub fn layer_mut(&mut self, index: usize) -> &mut dyn UnitLayer {
        self.layers[index].as_mut()
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// Width of `full_activation_probabilities`.
    pub fn full_output_size(&self) -> usize {
        self.layers.iter().map(|l| l.output_size()).sum()
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_parallel()
    }

    /// Logs the stack and its total parameter count.
    pub fn display(&self) {
        log::info!("DBN with {} layers", self.layers.len());
        let mut parameters = 0;
        for layer in &self.layers {
            log::info!("\t{}", layer.describe());
            parameters += layer.parameters();
        }
        log::info!("Total parameters: {parameters}");
    }

    /// Checks that every output feeds the next input, for the layer pairs up
    /// to `last`. The pair feeding the top layer must leave room for
    /// `label_units` extra inputs.
    ///
    /// # Panics
    /// Panics on the first mismatching pair.
    pub fn assert_widths(&self, last: usize, label_units: usize) {
        let top = self.layers.len() - 1;
        for i in 0..last.min(top) {
            let extra = if i + 1 == top { label_units } else { 0 };
            let expected = self.layers[i].output_size() + extra;
            let got = self.layers[i + 1].input_size();
            assert_eq!(
                got, expected,
                "layer {} expects {} inputs but layer {} provides {} (+{} label units)",
                i + 1, got, i, self.layers[i].output_size(), extra
            );
        }
    }

    /// Highest index trained by unsupervised pretraining.
    fn last_pretrained(&self) -> usize {
        let top = self.layers.len() - 1;
        if top == 0 || self.layers[top].pretrain_last() {
            top
        } else {
            top - 1
        }
    }

    /// Pretrains every layer unsupervised, reporting through a
    /// `LoggingWatcher`.
    pub fn pretrain(&mut self, samples: &[Vec<f64>], max_epochs: usize) {
        let mut watcher = LoggingWatcher::default();
        self.pretrain_with(samples, max_epochs, &mut watcher);
    }

    /// Pretrains layer by layer, each one learning from the previous layer's
    /// activations. `config.save_memory` selects the big-batch path.
    pub fn pretrain_with<W: DbnWatcher + ?Sized>(
        &mut self,
        samples: &[Vec<f64>],
        max_epochs: usize,
        watcher: &mut W,
    ) {
        let last = self.last_pretrained();
        self.assert_widths(last, 0);

        watcher.pretraining_begin(self, max_epochs);

        if self.config.save_memory {
            log::info!("DBN: Pretraining done in batch mode to save memory");
            self.pretrain_batch(samples, max_epochs, last, watcher);
        } else {
            self.pretrain_full(samples, max_epochs, last, watcher);
        }

        watcher.pretraining_end(self);
    }

    /// Keeps the current layer's whole input and the next one's in memory.
    fn pretrain_full<W: DbnWatcher + ?Sized>(
        &mut self,
        samples: &[Vec<f64>],
        max_epochs: usize,
        last: usize,
        watcher: &mut W,
    ) {
        let mut input = self.layers[0].convert_input(samples);

        for i in 0..=last {
            if !self.layers[i].is_pooling() {
                watcher.pretrain_layer(self, i, self.layers[i].as_ref(), input.len());
                self.layers[i].train(&input, max_epochs);
            }

            if i < last {
                let layer = self.layers[i].as_ref();
                input = self.pool.map(&input, |v| layer.activate_one(v));
            }
        }
    }

    /// Streams the raw samples in big batches. Each batch is converted and
    /// pushed through every layer below the one being trained, for every
    /// epoch of every layer: memory stays bounded by one big batch at the
    /// price of recomputing the lower activations.
    fn pretrain_batch<W: DbnWatcher + ?Sized>(
        &mut self,
        samples: &[Vec<f64>],
        max_epochs: usize,
        last: usize,
        watcher: &mut W,
    ) {
        for i in 0..=last {
            if self.layers[i].is_pooling() {
                continue;
            }

            watcher.pretrain_layer(self, i, self.layers[i].as_ref(), samples.len());

            let big_batch_size = self.config.big_batch_size(self.layers[i].preferred_batch_size());

            self.layers[i].init_training();

            for epoch in 0..max_epochs {
                let mut context = TrainingContext::default();
                self.layers[i].init_epoch(epoch, &mut context);

                for (big_batch, raw) in samples.chunks(big_batch_size).enumerate() {
                    let converted = self.layers[0].convert_input(raw);
                    let batch = if i == 0 {
                        converted
                    } else {
                        let layers = &self.layers;
                        self.pool.map(&converted, |v| propagate(layers, v, i))
                    };

                    self.layers[i].train_sub(&batch, &mut context);

                    log::debug!("DBN: Pretraining batch {big_batch} of layer {i} (epoch {epoch})");
                }

                self.layers[i].finalize_epoch(epoch, &context);
            }

            self.layers[i].finalize_training();
        }
    }

    /// Label-augmented training with a `LoggingWatcher`.
    pub fn train_with_labels(
        &mut self,
        samples: &[Vec<f64>],
        labels: &[usize],
        label_count: usize,
        max_epochs: usize,
    ) {
        let mut watcher = LoggingWatcher::default();
        self.train_with_labels_with(samples, labels, label_count, max_epochs, &mut watcher);
    }

    /// Trains layer by layer like pretraining, except the top layer learns
    /// from the second-to-last layer's activations concatenated with the
    /// one-hot label.
    ///
    /// # Panics
    /// Panics when sample and label counts differ, or when the top layer's
    /// input is not exactly the second-to-last output plus `label_count`.
    pub fn train_with_labels_with<W: DbnWatcher + ?Sized>(
        &mut self,
        samples: &[Vec<f64>],
        labels: &[usize],
        label_count: usize,
        max_epochs: usize,
        watcher: &mut W,
    ) {
        assert_eq!(samples.len(), labels.len(), "There must be the same number of values than labels");
        let top = self.layers.len() - 1;
        assert!(top >= 1, "label-augmented training needs at least two layers");
        assert_eq!(
            self.layers[top].input_size(),
            self.layers[top - 1].output_size() + label_count,
            "There is no room for the labels units"
        );
        self.assert_widths(top, label_count);

        watcher.pretraining_begin(self, max_epochs);

        let mut input = self.layers[0].convert_input(samples);

        for i in 0..=top {
            if !self.layers[i].is_pooling() {
                watcher.pretrain_layer(self, i, self.layers[i].as_ref(), input.len());
                self.layers[i].train(&input, max_epochs);
            }

            if i == top {
                break;
            }

            let next = self.layers[i].activate_many(&input);
            input = if i + 1 == top {
                augment_with_labels(next, labels, label_count)
            } else {
                next
            };
        }

        watcher.pretraining_end(self);
    }

    /// Top layer activations for one raw sample.
    pub fn activation_probabilities(&self, sample: &[f64]) -> Vec<f64> {
        let input = self.layers[0].convert_sample(sample);
        propagate(&self.layers, &input, self.layers.len())
    }

    /// Every layer's activations, concatenated bottom to top.
    pub fn full_activation_probabilities(&self, sample: &[f64]) -> Vec<f64> {
        let mut result = Vec::with_capacity(self.full_output_size());
        let mut current = self.layers[0].convert_sample(sample);
        for layer in &self.layers {
            current = layer.activate_one(&current);
            result.extend_from_slice(&current);
        }
        result
    }

    /// Feature vector handed to classifiers: full or top-only activations,
    /// depending on `config.concatenate`.
    pub fn features(&self, sample: &[f64]) -> Vec<f64> {
        if self.config.concatenate {
            self.full_activation_probabilities(sample)
        } else {
            self.activation_probabilities(sample)
        }
    }

    /// Index of the strongest activation; ties go to the lowest index.
    pub fn predict_label(weights: &[f64]) -> usize {
        argmax(weights)
    }

    pub fn predict(&self, sample: &[f64]) -> usize {
        Dbn::predict_label(&self.activation_probabilities(sample))
    }

    /// Label prediction for networks trained with `train_with_labels`.
    ///
    /// The sample goes up to the top layer with its label units set to
    /// `LABEL_PRIOR`; the top layer then reconstructs its visible units from
    /// its hidden activations and the strongest reconstructed label unit
    /// wins.
    pub fn predict_labels(&self, sample: &[f64], label_count: usize) -> usize {
        let top = self.layers.len() - 1;
        assert!(top >= 1, "label prediction needs at least two layers");
        assert_eq!(
            self.layers[top].input_size(),
            self.layers[top - 1].output_size() + label_count,
            "There is no room for the labels units"
        );

        let mut current = self.layers[0].convert_sample(sample);
        for layer in &self.layers[..top] {
            current = layer.activate_hidden(&current);
        }
        current.resize(current.len() + label_count, LABEL_PRIOR);

        let hidden = self.layers[top].activate_hidden(&current);
        let reconstruction = self.layers[top].activate_visible(&hidden);

        argmax(&reconstruction[reconstruction.len() - label_count..])
    }

    /// Fine-tunes with the bundled `SgdFineTuner`.
    pub fn fine_tune(
        &mut self,
        samples: &[Vec<f64>],
        labels: &[usize],
        max_epochs: usize,
        batch_size: usize,
    ) -> f64 {
        let mut trainer = SgdFineTuner::new();
        self.fine_tune_with(&mut trainer, samples, labels, max_epochs, batch_size)
    }

    pub fn fine_tune_with<T: FineTuner + ?Sized>(
        &mut self,
        trainer: &mut T,
        samples: &[Vec<f64>],
        labels: &[usize],
        max_epochs: usize,
        batch_size: usize,
    ) -> f64 {
        trainer.train(self, samples, labels, max_epochs, batch_size)
    }

    /// Writes one block per non-pooling layer in stack order, then the
    /// classifier model if one was trained or loaded.
    pub fn store(&self, os: &mut dyn Write) -> Result<()> {
        for layer in self.layers.iter().filter(|l| !l.is_pooling()) {
            layer.store(os)?;
        }
        if let Some(model) = &self.svm_model {
            write_block(os, model)?;
        }
        os.flush()?;
        Ok(())
    }

    /// Mirrors `store`. A classifier block after the layers is optional.
    pub fn load_from(&mut self, is: &mut dyn BufRead) -> Result<()> {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            if layer.is_pooling() {
                continue;
            }
            layer.load(is).map_err(|e| match e {
                DbnError::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    DbnError::MissingBlock { index }
                }
                other => other,
            })?;
        }
        self.svm_model = read_block(is)?;
        Ok(())
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.store(&mut writer)
    }

    pub fn load(&mut self, path: &str) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        self.load_from(&mut reader)
    }

}
