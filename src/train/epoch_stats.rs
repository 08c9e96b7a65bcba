use serde::{Serialize, Deserialize};

/// Per-epoch statistics emitted by `SgdFineTuner`.
///
/// When a progress channel is configured, the fine-tuner sends one value at
/// the end of every completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean squared error over all samples in this epoch.
    pub error: f64,
    /// Fraction of samples whose argmax output matched the label.
    pub accuracy: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
