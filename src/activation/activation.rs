use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::E;

use crate::math::matrix::sample_standard_normal;

/// Kind of stochastic unit on one side of an RBM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Bernoulli units; the mean activation is the logistic sigmoid.
    Binary,
    /// Linear units with unit-variance Gaussian noise.
    Gaussian,
}

impl UnitType {
    /// Mean activation given the total input `x`.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            UnitType::Binary => 1.0 / (1.0 + E.powf(-x)),
            UnitType::Gaussian => x,
        }
    }

    /// Derivative of `function`, expressed in terms of its output `y`.
    pub fn derivative(&self, y: f64) -> f64 {
        match self {
            UnitType::Binary => y * (1.0 - y),
            UnitType::Gaussian => 1.0,
        }
    }

    /// Draws a unit state around the mean activation `mean`.
    pub fn sample<R: Rng>(&self, mean: f64, rng: &mut R) -> f64 {
        match self {
            UnitType::Binary => if rng.gen::<f64>() < mean { 1.0 } else { 0.0 },
            UnitType::Gaussian => mean + sample_standard_normal(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn binary_units_are_sigmoid() {
        assert_eq!(UnitType::Binary.function(0.0), 0.5);
        assert_eq!(UnitType::Binary.derivative(0.5), 0.25);
    }

    #[test]
    fn binary_samples_are_zero_or_one() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let s = UnitType::Binary.sample(0.3, &mut rng);
            assert!(s == 0.0 || s == 1.0);
        }
        assert_eq!(UnitType::Binary.sample(1.0, &mut rng), 1.0);
        assert_eq!(UnitType::Binary.sample(0.0, &mut rng), 0.0);
    }

    #[test]
    fn gaussian_units_are_linear() {
        assert_eq!(UnitType::Gaussian.function(-2.5), -2.5);
        assert_eq!(UnitType::Gaussian.derivative(7.0), 1.0);
    }
}
