// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `RegressionLearner`: the logistic sub-learner that scores
//! candidate pairs from their per-field distance vectors. Wraps
//! [`super::logistic::LogisticRegression`] the way `labeler.py`'s
//! `RLRLearner` wraps `rlr.RegularizedLogisticRegression`.

use tracing::instrument;

use super::logistic::LogisticRegression;
use crate::sampling::CandidatePool;

/// spec supplemented behavior 3 (`RLRLearner._bias`): as more labels
/// accumulate, prefer genuinely uncertain examples over ones the model
/// is merely unbalanced about. Kept on `RegressionLearner` itself so
/// the sub-learner is independently testable in single-classifier mode,
/// without requiring a `BlockSubLearner` counterpart.
fn weighted_bias(labels: &[f64]) -> f64 {
    let n = labels.len() as f64;
    if n == 0.0 {
        return 0.5;
    }
    let positive = labels.iter().filter(|&&y| y == 1.0).count() as f64;
    let bias = 1.0 - if positive > 0.0 { positive / n } else { 0.0 };
    let uncertainty_weight = positive.min(n - positive);
    let bias_weight = 10.0;
    (0.5 * uncertainty_weight + bias * bias_weight) / (uncertainty_weight + bias_weight)
}

/// Accumulates `(distance_vector, label)` rows and fits
/// [`LogisticRegression`] on `mark`.
#[derive(Debug, Default)]
pub struct RegressionLearner {
    model: LogisticRegression,
    train_x: Vec<Vec<f64>>,
    train_y: Vec<f64>,
}

impl RegressionLearner {
    #[must_use]
    pub fn new() -> Self {
        Self { model: LogisticRegression::new(1.0), train_x: Vec::new(), train_y: Vec::new() }
    }

    /// Scores every row currently in `pool` by predicted match
    /// probability.
    #[must_use]
    pub fn scores(&self, pool: &CandidatePool) -> Vec<f64> {
        (0..pool.len())
            .map(|i| pool.distance_row(i).map_or(0.5, |row| self.model.predict_proba(row)))
            .collect()
    }

    /// Appends `(distances, labels)` to the accumulated training set
    /// and refits.
    #[instrument(skip(self, distances, labels))]
    pub fn mark(&mut self, distances: &[Vec<f64>], labels: &[bool]) {
        for (row, &label) in distances.iter().zip(labels) {
            self.train_x.push(row.clone());
            self.train_y.push(f64::from(u8::from(label)));
        }
        self.model.fit(&self.train_x, &self.train_y);
    }

    /// The `_bias()`-weighted uncertainty target: closer to 0.5 with few examples, drifting toward
    /// the minority-class rate as more accumulate.
    #[must_use]
    pub fn bias_target(&self) -> f64 {
        weighted_bias(&self.train_y)
    }

    /// Standalone "which candidate should I ask about next" for this
    /// sub-learner alone (used when the caller wants single-classifier
    /// active learning rather than the full disagreement loop): the
    /// candidate whose score is closest to [`RegressionLearner::bias_target`].
    #[must_use]
    pub fn most_uncertain(&self, pool: &CandidatePool) -> Option<usize> {
        if pool.is_empty() {
            return None;
        }
        let target = self.bias_target();
        let scores = self.scores(pool);
        scores
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - target).abs().partial_cmp(&(*b - target).abs()).unwrap())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::distance::{FieldDefinition, FieldKind};
    use crate::distance::DistanceModel;
    use crate::record::{Record, RecordId, Value};
    use std::collections::HashMap;

    fn rec(id: u64, name: &str) -> Record {
        Record::new(RecordId(id)).with_field("name", Value::Text(name.to_string()))
    }

    fn pool() -> CandidatePool {
        let records = vec![rec(1, "john"), rec(2, "jon"), rec(3, "mary")];
        let by_id: HashMap<RecordId, Record> = records.iter().map(|r| (r.id, r.clone())).collect();
        let model = DistanceModel::new(&[FieldDefinition::new("name", FieldKind::String)]).unwrap();
        let ids = vec![(RecordId(1), RecordId(2)), (RecordId(1), RecordId(3))];
        CandidatePool::new(&ids, &by_id, &model)
    }

    #[test]
    fn test_unfit_learner_scores_half_everywhere() {
        let learner = RegressionLearner::new();
        let pool = pool();
        assert_eq!(learner.scores(&pool), vec![0.5, 0.5]);
    }

    #[test]
    fn test_bias_target_is_half_with_no_labels() {
        let learner = RegressionLearner::new();
        assert_eq!(learner.bias_target(), 0.5);
    }

    #[test]
    fn test_mark_refits_and_changes_scores() {
        let mut learner = RegressionLearner::new();
        let pool = pool();
        let distances: Vec<Vec<f64>> = (0..pool.len()).map(|i| pool.distance_row(i).unwrap().to_vec()).collect();
        learner.mark(&distances, &[true, false]);
        let scores = learner.scores(&pool);
        assert_ne!(scores[0], 0.5);
    }
}
