pub mod encoding;
pub mod matrix;

pub use encoding::{argmax, one_hot};
pub use matrix::Matrix;
