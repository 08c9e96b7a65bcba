use std::sync::mpsc;
use std::time::Instant;

use crate::loss::mse::SquaredErrorLoss;
use crate::math::encoding::{argmax, one_hot};
use crate::network::network::Dbn;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::EpochStats;

/// Supervised refinement of an already pretrained network.
pub trait FineTuner {
    /// Trains `dbn` in place and returns the final epoch's error.
    fn train(
        &mut self,
        dbn: &mut Dbn,
        samples: &[Vec<f64>],
        labels: &[usize],
        max_epochs: usize,
        batch_size: usize,
    ) -> f64;
}

/// Mini-batch backpropagation through the whole stack.
///
/// The top layer's output is compared with the one-hot encoding of the label
/// under squared error. Learning rate, momentum schedule and weight cost come
/// from the network's `DbnConfig`.
#[derive(Default)]
pub struct SgdFineTuner {
    /// Optional channel receiving one `EpochStats` per epoch.
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl SgdFineTuner {
    pub fn new() -> Self {
        SgdFineTuner::default()
    }

    pub fn with_progress(progress_tx: mpsc::Sender<EpochStats>) -> Self {
        SgdFineTuner { progress_tx: Some(progress_tx) }
    }
}

impl FineTuner for SgdFineTuner {
    /// # Panics
    /// Panics if `samples` is empty, lengths mismatch, `batch_size == 0` or a
    /// label does not fit the output layer.
    fn train(
        &mut self,
        dbn: &mut Dbn,
        samples: &[Vec<f64>],
        labels: &[usize],
        max_epochs: usize,
        batch_size: usize,
    ) -> f64 {
        assert!(!samples.is_empty(), "samples must not be empty");
        assert_eq!(samples.len(), labels.len(), "There must be the same number of values than labels");
        assert!(batch_size > 0, "batch_size must be at least 1");
        let outputs = dbn.output_size();
        assert!(
            labels.iter().all(|&l| l < outputs),
            "every label must be below the output size ({outputs})"
        );
        dbn.assert_widths(dbn.layers() - 1, 0);

        let config = dbn.config().clone();
        let sgd = Sgd::new(config.learning_rate, config.weight_cost);
        let n_layers = dbn.layers();
        let inputs = dbn.layer(0).convert_input(samples);

        // sized from the first gradients each layer returns
        let mut velocities: Vec<Vec<f64>> = vec![Vec::new(); n_layers];

        let mut last_error = 0.0;

        for epoch in 0..max_epochs {
            let t_start = Instant::now();
            let momentum = config.momentum_at(epoch);
            let mut total_error = 0.0;
            let mut correct = 0;

            for (batch, batch_labels) in inputs.chunks(batch_size).zip(labels.chunks(batch_size)) {
                let mut acc_grads: Vec<Vec<f64>> = vec![Vec::new(); n_layers];

                for (input, &label) in batch.iter().zip(batch_labels) {
                    // activations[i] is the input of layer i
                    let mut activations = Vec::with_capacity(n_layers + 1);
                    activations.push(input.clone());
                    for i in 0..n_layers {
                        let next = dbn.layer(i).activate_one(&activations[i]);
                        activations.push(next);
                    }

                    let output = &activations[n_layers];
                    let target = one_hot(label, output.len());
                    total_error += SquaredErrorLoss::loss(output, &target);
                    if argmax(output) == label {
                        correct += 1;
                    }

                    let mut delta = SquaredErrorLoss::derivative(output, &target);
                    for i in (0..n_layers).rev() {
                        let (gradients, input_delta) =
                            dbn.layer(i).backward(&activations[i], &activations[i + 1], &delta);
                        if acc_grads[i].is_empty() {
                            acc_grads[i] = gradients;
                        } else {
                            for (acc, g) in acc_grads[i].iter_mut().zip(&gradients) {
                                *acc += g;
                            }
                        }
                        delta = input_delta;
                    }
                }

                let inv_batch = 1.0 / batch.len() as f64;
                for (i, mut grads) in acc_grads.into_iter().enumerate() {
                    if grads.is_empty() {
                        continue;
                    }
                    grads.iter_mut().for_each(|g| *g *= inv_batch);
                    if velocities[i].len() != grads.len() {
                        velocities[i] = vec![0.0; grads.len()];
                    }
                    sgd.step(dbn.layer_mut(i), &grads, &mut velocities[i], momentum);
                }
            }

            last_error = total_error / samples.len() as f64;
            let accuracy = correct as f64 / samples.len() as f64;
            let elapsed_ms = t_start.elapsed().as_millis() as u64;

            log::info!(
                "DBN: Fine-tune epoch {}/{} - error {:.5} - accuracy {:.3} ({}ms)",
                epoch + 1, max_epochs, last_error, accuracy, elapsed_ms
            );

            if let Some(ref tx) = self.progress_tx {
                let stats = EpochStats {
                    epoch: epoch + 1,
                    total_epochs: max_epochs,
                    error: last_error,
                    accuracy,
                    elapsed_ms,
                };
                // A dropped receiver only silences progress; training goes on.
                if tx.send(stats).is_err() {
                    self.progress_tx = None;
                }
            }
        }

        last_error
    }
}
