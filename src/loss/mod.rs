pub mod mse;

pub use mse::SquaredErrorLoss;
