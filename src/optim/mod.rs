pub mod momentum;
pub mod sgd;

pub use momentum::momentum_at;
pub use sgd::Sgd;
