/// Squared-error loss used by the fine-tuner against one-hot targets.
pub struct SquaredErrorLoss;

impl SquaredErrorLoss {
    /// Scalar loss: 0.5 * sum((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        0.5 * predicted.iter().zip(expected)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
    }

    /// ∂L/∂predicted: predicted - expected
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected)
            .map(|(a, b)| a - b)
            .collect()
    }
}
