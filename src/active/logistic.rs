// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! A small logistic-regression optimiser. Spec §1 names "the logistic
//! regression optimiser" as an out-of-scope external collaborator
//! (`rlr.RegularizedLogisticRegression` in the original); this is a
//! deliberately minimal batch gradient-descent fit with L2
//! regularization, just enough to make [`super::regression::RegressionLearner`]
//! exercisable end to end. It is not the subject of this crate's
//! guarantees.

use tracing::instrument;

/// Weights `w` plus bias `b` for `sigmoid(w . x + b)`.
#[derive(Clone, Debug, Default)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    /// L2 penalty strength, mirroring `rlr`'s `alpha=1` default used
    /// throughout `labeler.py`.
    alpha: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self { weights: Vec::new(), bias: 0.0, alpha }
    }

    #[must_use]
    pub fn is_fit(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Batch gradient descent with L2 regularization on the weights
    /// (not the bias). Rows containing `NaN` are skipped — the caller
    /// is expected to have already filled `NaN`s before handing rows
    /// here.
    #[instrument(skip(self, x, y))]
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) {
        if x.is_empty() {
            return;
        }
        let width = x[0].len();
        if self.weights.len() != width {
            self.weights = vec![0.0; width];
            self.bias = 0.0;
        }
        let n = x.len() as f64;
        let learning_rate = 0.1;
        let iterations = 200;
        for _ in 0..iterations {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &label) in x.iter().zip(y) {
                let z: f64 = row.iter().zip(&self.weights).map(|(xi, wi)| xi * wi).sum::<f64>() + self.bias;
                let pred = sigmoid(z);
                let error = pred - label;
                for (g, xi) in grad_w.iter_mut().zip(row) {
                    *g += error * xi;
                }
                grad_b += error;
            }
            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= learning_rate * (g / n + self.alpha * *w / n);
            }
            self.bias -= learning_rate * grad_b / n;
        }
    }

    /// `P(y=1 | x)`. Returns `0.5` (maximal uncertainty) before the
    /// model has ever been fit.
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if !self.is_fit() {
            return 0.5;
        }
        let z: f64 = row.iter().zip(&self.weights).map(|(xi, wi)| xi * wi).sum::<f64>() + self.bias;
        sigmoid(z)
    }
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn test_unfit_model_predicts_maximal_uncertainty() {
        let model = LogisticRegression::new(1.0);
        assert_eq!(model.predict_proba(&[1.0, 2.0]), 0.5);
    }

    #[test]
    fn test_separates_linearly_separable_data() {
        let mut model = LogisticRegression::new(0.01);
        let x = vec![vec![0.0], vec![0.1], vec![0.9], vec![1.0]];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        model.fit(&x, &y);
        assert!(model.predict_proba(&[1.0]) > 0.5);
        assert!(model.predict_proba(&[0.0]) < 0.5);
    }

    #[test]
    fn test_refitting_updates_in_place() {
        let mut model = LogisticRegression::new(0.01);
        model.fit(&[vec![0.0], vec![1.0]], &[0.0, 1.0]);
        let before = model.predict_proba(&[1.0]);
        model.fit(&[vec![0.0], vec![1.0], vec![1.0], vec![1.0]], &[0.0, 1.0, 1.0, 1.0]);
        let after = model.predict_proba(&[1.0]);
        assert!(after >= before);
    }
}
