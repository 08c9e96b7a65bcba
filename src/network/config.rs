use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::optim::momentum::momentum_at;

/// Network-wide hyperparameters and training switches.
///
/// Missing JSON fields fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbnConfig {
    /// Fine-tuning learning rate.
    pub learning_rate: f64,
    /// Momentum used before `final_momentum_epoch`.
    pub initial_momentum: f64,
    /// Momentum used from `final_momentum_epoch` onwards.
    pub final_momentum: f64,
    pub final_momentum_epoch: usize,
    /// L2 weight decay applied during fine-tuning.
    pub weight_cost: f64,
    /// Multiplier turning a layer's preferred batch size into a big batch
    /// (memory-saving pretraining only).
    #[serde(alias = "BatchSize")]
    pub batch_size: usize,
    /// Pretrain one big batch at a time instead of materializing every
    /// layer's input.
    pub save_memory: bool,
    /// Feed classifiers the concatenation of every layer's activations.
    pub concatenate: bool,
    /// Rescale every classifier feature column to [0, 1] before training.
    pub scale: bool,
    /// Run per-sample activation maps on a worker pool.
    #[serde(alias = "is_parallel")]
    pub parallel: bool,
    /// Worker count for the pool; `None` uses one per core.
    pub threads: Option<usize>,
}

impl Default for DbnConfig {
    fn default() -> Self {
        DbnConfig {
            learning_rate: 0.77,
            initial_momentum: 0.5,
            final_momentum: 0.9,
            final_momentum_epoch: 6,
            weight_cost: 0.0002,
            batch_size: 1,
            save_memory: false,
            concatenate: false,
            scale: false,
            parallel: false,
            threads: None,
        }
    }
}

impl DbnConfig {
    pub fn momentum_at(&self, epoch: usize) -> f64 {
        momentum_at(epoch, self.initial_momentum, self.final_momentum, self.final_momentum_epoch)
    }

    /// Number of raw samples in one big batch for a layer preferring
    /// `preferred` samples per update.
    pub fn big_batch_size(&self, preferred: usize) -> usize {
        self.batch_size.max(1) * preferred.max(1)
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<DbnConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
