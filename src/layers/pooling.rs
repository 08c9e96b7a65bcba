//! Parameter-free 1-D pooling over non-overlapping windows.
//!
//! Pooling layers sit between RBMs to shrink the representation. They are
//! skipped by every training path and contribute nothing to a saved model.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layers::{TrainingContext, UnitLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingKind {
    Max,
    Average,
}

#[derive(Debug, Clone)]
pub struct Pooling {
    pub kind: PoolingKind,
    input: usize,
    window: usize,
}

impl Pooling {
    pub fn new(kind: PoolingKind, input: usize, window: usize) -> Pooling {
        assert!(window > 0, "pooling window must be at least 1");
        assert!(
            input > 0 && input % window == 0,
            "pooling input ({input}) must be a positive multiple of the window ({window})"
        );
        Pooling { kind, input, window }
    }

    pub fn max(input: usize, window: usize) -> Pooling {
        Pooling::new(PoolingKind::Max, input, window)
    }

    pub fn average(input: usize, window: usize) -> Pooling {
        Pooling::new(PoolingKind::Average, input, window)
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Index of the first maximum inside a window.
fn window_argmax(window: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in window.iter().enumerate() {
        if x > window[best] {
            best = i;
        }
    }
    best
}

impl UnitLayer for Pooling {
    fn input_size(&self) -> usize {
        self.input
    }

    fn output_size(&self) -> usize {
        self.input / self.window
    }

    fn is_pooling(&self) -> bool {
        true
    }

    fn parameters(&self) -> usize {
        0
    }

    fn describe(&self) -> String {
        format!("Pooling({:?}, window {}): {} -> {}", self.kind, self.window, self.input, self.output_size())
    }

    fn activate_one(&self, input: &[f64]) -> Vec<f64> {
        input.chunks(self.window)
            .map(|w| match self.kind {
                PoolingKind::Max => w[window_argmax(w)],
                PoolingKind::Average => w.iter().sum::<f64>() / w.len() as f64,
            })
            .collect()
    }

    /// Spreads every pooled value back over its window.
    fn activate_visible(&self, hidden: &[f64]) -> Vec<f64> {
        hidden.iter()
            .flat_map(|&h| std::iter::repeat(h).take(self.window))
            .collect()
    }

    fn train_sub(&mut self, _batch: &[Vec<f64>], _context: &mut TrainingContext) {}

    fn backward(&self, input: &[f64], _output: &[f64], output_delta: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut input_delta = vec![0.0; self.input];
        for ((w, slot), &d) in input.chunks(self.window)
            .zip(input_delta.chunks_mut(self.window))
            .zip(output_delta)
        {
            match self.kind {
                PoolingKind::Max => slot[window_argmax(w)] = d,
                PoolingKind::Average => slot.iter_mut().for_each(|s| *s = d / self.window as f64),
            }
        }
        (Vec::new(), input_delta)
    }

    fn store(&self, _os: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _is: &mut dyn BufRead) -> Result<()> {
        Ok(())
    }
}
