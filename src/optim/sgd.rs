use crate::layers::UnitLayer;

/// Momentum SGD with L2 weight decay, used by the fine-tuner.
pub struct Sgd {
    pub learning_rate: f64,
    pub weight_cost: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64, weight_cost: f64) -> Sgd {
        Sgd { learning_rate, weight_cost }
    }

    /// Folds `gradients` into `velocity` and applies it to `layer`.
    ///
    /// `gradients` and `velocity` follow the layer's own flat parameter order.
    pub fn step(
        &self,
        layer: &mut dyn UnitLayer,
        gradients: &[f64],
        velocity: &mut [f64],
        momentum: f64,
    ) {
        debug_assert_eq!(gradients.len(), velocity.len());
        for (v, g) in velocity.iter_mut().zip(gradients) {
            *v = momentum * *v - self.learning_rate * g;
        }
        layer.apply_update(velocity, self.learning_rate * self.weight_cost);
    }
}
