pub mod epoch_stats;
pub mod fine_tune;
pub mod parallel;
pub mod watcher;

pub use epoch_stats::EpochStats;
pub use fine_tune::{FineTuner, SgdFineTuner};
pub use parallel::ParallelMap;
pub use watcher::{DbnWatcher, LoggingWatcher, SilentWatcher};
