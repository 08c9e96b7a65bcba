/// Two-phase momentum schedule: `initial` below `final_epoch`, `last` from
/// `final_epoch` onwards.
///
/// Both the RBM learning rule and the fine-tuner recompute their momentum
/// from this at the start of every epoch instead of carrying it as state.
pub fn momentum_at(epoch: usize, initial: f64, last: f64, final_epoch: usize) -> f64 {
    if epoch < final_epoch {
        initial
    } else {
        last
    }
}
