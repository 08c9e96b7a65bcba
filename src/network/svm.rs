use std::time::Instant;

use crate::classifier::svm::{self, Grid, Problem, SvmModel, SvmParameters};
use crate::network::network::Dbn;

impl Dbn {
    /// Extracts the classifier features of every sample, rescaled per
    /// column when `config.scale` is set.
    pub fn make_problem(&self, samples: &[Vec<f64>], labels: &[usize]) -> Problem {
        let features = self.pool.map(samples, |s| self.features(s));
        svm::make_problem(labels, features, self.config.scale)
    }

    /// Trains the classifier on the network's features.
    ///
    /// Returns `false`, leaving any previous model untouched, when the
    /// problem or parameters do not pass `svm::check`.
    pub fn svm_train(&mut self, samples: &[Vec<f64>], labels: &[usize], parameters: &SvmParameters) -> bool {
        let watch = Instant::now();

        let problem = self.make_problem(samples, labels);
        if !svm::check(&problem, parameters) {
            return false;
        }

        self.svm_model = Some(svm::train(&problem, parameters));

        log::info!("SVM training took {:.3}s", watch.elapsed().as_secs_f64());
        true
    }

    /// Cross-validated search over `grid`; `None` when `svm::check` fails or
    /// `n_fold` is not between 2 and the sample count.
    pub fn svm_grid_search(
        &self,
        samples: &[Vec<f64>],
        labels: &[usize],
        n_fold: usize,
        grid: &Grid,
    ) -> Option<(SvmParameters, f64)> {
        let problem = self.make_problem(samples, labels);
        let parameters = SvmParameters::default();
        if !svm::check(&problem, &parameters) {
            return None;
        }
        if n_fold < 2 || n_fold > problem.len() {
            log::warn!("SVM: cannot run {n_fold}-fold cross-validation on {} samples", problem.len());
            return None;
        }
        Some(svm::grid_search(&problem, &parameters, n_fold, grid))
    }

    /// Class predicted by the trained classifier, if there is one.
    pub fn svm_predict(&self, sample: &[f64]) -> Option<usize> {
        self.svm_model.as_ref().map(|model| svm::predict(model, &self.features(sample)))
    }

    pub fn svm_model(&self) -> Option<&SvmModel> {
        self.svm_model.as_ref()
    }
}
