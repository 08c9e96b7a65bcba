pub mod svm;

pub use svm::{check, grid_search, make_problem, predict, train, FeatureScaling, Grid, Problem, SvmModel, SvmParameters};
