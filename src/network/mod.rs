pub mod config;
pub mod network;
pub mod spec;
mod svm;

pub use config::DbnConfig;
pub use network::{Dbn, LABEL_PRIOR};
pub use spec::{DbnSpec, LayerSpec};
