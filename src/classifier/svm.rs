//! Linear one-vs-rest SVM trained with Pegasos.
//!
//! Each class gets its own weight vector; the bias is folded in as an extra
//! constant input so it is regularized like any other weight.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::math::encoding::argmax;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParameters {
    /// Regularization strength.
    pub lambda: f64,
    /// Passes over the training set.
    pub epochs: usize,
    /// Seed of the sample order shuffle.
    pub seed: u64,
}

impl Default for SvmParameters {
    fn default() -> Self {
        SvmParameters { lambda: 1e-3, epochs: 50, seed: 0 }
    }
}

/// Feature matrix and labels ready for training.
#[derive(Debug, Clone)]
pub struct Problem {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    /// Column ranges the features were rescaled with, if any.
    pub scaling: Option<FeatureScaling>,
}

impl Problem {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |&l| l + 1)
    }

    pub fn dimensions(&self) -> usize {
        self.features.first().map_or(0, |f| f.len())
    }

    fn subset(&self, indices: &[usize]) -> Problem {
        Problem {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            scaling: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    /// One row per class: feature weights followed by the bias.
    pub weights: Vec<Vec<f64>>,
    /// Applied to raw features before the margins are computed.
    #[serde(default)]
    pub scaling: Option<FeatureScaling>,
}

impl SvmModel {
    pub fn classes(&self) -> usize {
        self.weights.len()
    }

    pub fn decision_values(&self, features: &[f64]) -> Vec<f64> {
        match &self.scaling {
            Some(scaling) => {
                let scaled = scaling.apply(features);
                self.weights.iter().map(|w| margin(w, &scaled)).collect()
            }
            None => self.weights.iter().map(|w| margin(w, features)).collect(),
        }
    }
}

/// Per-column min/max of a training set, mapping each column onto [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl FeatureScaling {
    pub fn fit(features: &[Vec<f64>]) -> FeatureScaling {
        let dims = features.first().map_or(0, |f| f.len());
        let mut min = vec![f64::INFINITY; dims];
        let mut max = vec![f64::NEG_INFINITY; dims];
        for row in features {
            for ((lo, hi), &x) in min.iter_mut().zip(max.iter_mut()).zip(row) {
                *lo = lo.min(x);
                *hi = hi.max(x);
            }
        }
        FeatureScaling { min, max }
    }

    /// Constant columns map to 0. Values outside the fitted range land
    /// outside [0, 1].
    pub fn apply(&self, features: &[f64]) -> Vec<f64> {
        features.iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(&x, (&lo, &hi))| if hi > lo { (x - lo) / (hi - lo) } else { 0.0 })
            .collect()
    }
}

/// Grid of regularization strengths tried by `grid_search`.
#[derive(Debug, Clone)]
pub struct Grid {
    pub lambdas: Vec<f64>,
}

impl Default for Grid {
    fn default() -> Self {
        Grid { lambdas: vec![1e-5, 1e-4, 1e-3, 1e-2, 1e-1] }
    }
}

fn margin(weights: &[f64], features: &[f64]) -> f64 {
    let (w, bias) = weights.split_at(weights.len() - 1);
    w.iter().zip(features).map(|(a, b)| a * b).sum::<f64>() + bias[0]
}

/// Pairs features with labels. With `scale`, every feature column is
/// rescaled to [0, 1] and the fitted ranges are kept in the problem.
pub fn make_problem(labels: &[usize], features: Vec<Vec<f64>>, scale: bool) -> Problem {
    assert_eq!(labels.len(), features.len(), "There must be the same number of values than labels");
    if !scale {
        return Problem { features, labels: labels.to_vec(), scaling: None };
    }

    let scaling = FeatureScaling::fit(&features);
    let features = features.iter().map(|f| scaling.apply(f)).collect();
    Problem { features, labels: labels.to_vec(), scaling: Some(scaling) }
}

/// Validates a problem/parameter pair before training.
pub fn check(problem: &Problem, parameters: &SvmParameters) -> bool {
    if problem.is_empty() || problem.features.len() != problem.labels.len() {
        log::warn!("SVM: empty problem or mismatched labels");
        return false;
    }
    let dims = problem.dimensions();
    if dims == 0 || problem.features.iter().any(|f| f.len() != dims) {
        log::warn!("SVM: feature vectors must share a non-zero width");
        return false;
    }
    if problem.classes() < 2 {
        log::warn!("SVM: at least two classes are needed");
        return false;
    }
    if !(parameters.lambda.is_finite() && parameters.lambda > 0.0) || parameters.epochs == 0 {
        log::warn!("SVM: invalid parameters {parameters:?}");
        return false;
    }
    true
}

pub fn train(problem: &Problem, parameters: &SvmParameters) -> SvmModel {
    let classes = problem.classes();
    let dims = problem.dimensions();
    let lambda = parameters.lambda;

    let mut weights = vec![vec![0.0; dims + 1]; classes];
    let mut rng = StdRng::seed_from_u64(parameters.seed);
    let mut order: Vec<usize> = (0..problem.len()).collect();
    let mut t = 0usize;

    for _ in 0..parameters.epochs {
        order.shuffle(&mut rng);
        for &i in &order {
            t += 1;
            let eta = 1.0 / (lambda * t as f64);
            let shrink = 1.0 - eta * lambda;
            let x = &problem.features[i];

            for (k, w) in weights.iter_mut().enumerate() {
                let y = if problem.labels[i] == k { 1.0 } else { -1.0 };
                let violated = y * margin(w, x) < 1.0;

                w.iter_mut().for_each(|wi| *wi *= shrink);
                if violated {
                    for (wi, xi) in w.iter_mut().zip(x.iter().chain(std::iter::once(&1.0))) {
                        *wi += eta * y * xi;
                    }
                }
            }
        }
    }

    SvmModel { weights, scaling: problem.scaling.clone() }
}

pub fn predict(model: &SvmModel, features: &[f64]) -> usize {
    argmax(&model.decision_values(features))
}

/// Accuracy of `n_fold` cross-validation; sample `i` lands in fold `i % n_fold`.
///
/// # Panics
/// Panics if `n_fold < 2`.
pub fn cross_validation(problem: &Problem, parameters: &SvmParameters, n_fold: usize) -> f64 {
    assert!(n_fold >= 2, "cross-validation needs at least two folds");
    let mut correct = 0;
    for fold in 0..n_fold {
        let (test, training): (Vec<usize>, Vec<usize>) = (0..problem.len()).partition(|i| i % n_fold == fold);
        if test.is_empty() || training.is_empty() {
            continue;
        }
        let model = train(&problem.subset(&training), parameters);
        correct += test.iter()
            .filter(|&&i| predict(&model, &problem.features[i]) == problem.labels[i])
            .count();
    }
    correct as f64 / problem.len() as f64
}

/// Tries every lambda of `grid` and returns the best parameters with their
/// cross-validated accuracy. The first best wins ties.
pub fn grid_search(problem: &Problem, parameters: &SvmParameters, n_fold: usize, grid: &Grid) -> (SvmParameters, f64) {
    let mut best = (parameters.clone(), f64::NEG_INFINITY);
    for &lambda in &grid.lambdas {
        let candidate = SvmParameters { lambda, ..parameters.clone() };
        let accuracy = cross_validation(problem, &candidate, n_fold);
        log::info!("SVM: lambda={lambda:e} -> accuracy {accuracy:.4}");
        if accuracy > best.1 {
            best = (candidate, accuracy);
        }
    }
    best
}
