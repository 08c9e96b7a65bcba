pub mod activation;
pub mod classifier;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod optim;
pub mod persist;
pub mod train;

// Convenience re-exports
pub use activation::activation::UnitType;
pub use error::{DbnError, Result};
pub use layers::{Pooling, PoolingKind, Rbm, RbmConfig, TrainingContext, UnitLayer};
pub use network::{Dbn, DbnConfig, DbnSpec, LayerSpec, LABEL_PRIOR};
pub use train::{DbnWatcher, EpochStats, FineTuner, LoggingWatcher, SgdFineTuner, SilentWatcher};
