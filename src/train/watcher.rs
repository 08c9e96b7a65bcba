use std::time::Instant;

use crate::layers::UnitLayer;
use crate::network::network::Dbn;

/// Observer of the pretraining lifecycle.
///
/// Callbacks fire synchronously on the training thread. Every method has an
/// empty default so implementors only pick the events they care about.
pub trait DbnWatcher {
    fn pretraining_begin(&mut self, _dbn: &Dbn, _max_epochs: usize) {}

    /// A layer is about to be trained on `samples` inputs.
    fn pretrain_layer(&mut self, _dbn: &Dbn, _index: usize, _layer: &dyn UnitLayer, _samples: usize) {}

    fn pretraining_end(&mut self, _dbn: &Dbn) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentWatcher;

impl DbnWatcher for SilentWatcher {}

/// Reports the lifecycle through the `log` facade.
#[derive(Debug, Default)]
pub struct LoggingWatcher {
    start: Option<Instant>,
}

impl DbnWatcher for LoggingWatcher {
    fn pretraining_begin(&mut self, dbn: &Dbn, max_epochs: usize) {
        self.start = Some(Instant::now());
        log::info!("DBN: Pretraining {} layers for {} epochs", dbn.layers(), max_epochs);
    }

    fn pretrain_layer(&mut self, _dbn: &Dbn, index: usize, layer: &dyn UnitLayer, samples: usize) {
        log::info!("DBN: Train layer {} ({}) with {} entries", index, layer.describe(), samples);
    }

    fn pretraining_end(&mut self, _dbn: &Dbn) {
        let elapsed = self.start.take().map(|s| s.elapsed().as_secs_f64()).unwrap_or_default();
        log::info!("DBN: Pretraining finished after {elapsed:.3}s");
    }
}
