pub mod activation;

pub use activation::UnitType;
