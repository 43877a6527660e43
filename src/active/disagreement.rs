// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `DisagreementLearner`: owns the candidate pool and two
//! sub-learners (a [`super::regression::RegressionLearner`] and a
//! [`BlockSubLearner`]), and picks the next pair to label as the one
//! the two disagree on most.

use rand::Rng;
use tracing::{debug, instrument};

use super::regression::RegressionLearner;
use crate::block_learner::BlockLearner;
use crate::distance::DistanceModel;
use crate::error::{Error, Result};
use crate::predicate::Predicate;
use crate::record::{LabelledPair, Record};
use crate::sampling::CandidatePool;

/// Wraps a [`BlockLearner`] as a binary classifier: scores a candidate as
/// 1 iff any current rule covers it, re-learning its rule set only when
/// newly-labelled matches aren't already covered (`labeler.py
/// BlockLearner.fit_transform`'s `new_uncovered` check — re-running the
/// branch-and-bound search on every label would be correct but wasteful).
pub struct BlockSubLearner {
    block_learner: BlockLearner,
    current_predicates: Vec<Predicate>,
    old_dupes: Vec<LabelledPair>,
}

impl BlockSubLearner {
    #[must_use]
    pub fn new(block_learner: BlockLearner) -> Self {
        Self { block_learner, current_predicates: Vec::new(), old_dupes: Vec::new() }
    }

    #[must_use]
    pub fn scores(&mut self, pool: &CandidatePool) -> Vec<f64> {
        let mut out = Vec::with_capacity(pool.len());
        for i in 0..pool.len() {
            let Some((a, b)) = pool.pair(i) else { continue };
            let covered = self.block_learner.predict(&self.current_predicates, a, b);
            out.push(if covered { 1.0 } else { 0.0 });
        }
        out
    }

    /// `dupes` is the *full* accumulated set of labelled matches so far
    /// (not just newly-added ones, matching `labeler.py`'s
    /// `fit_transform(self.pairs, self.y)` call against the whole
    /// history). Only triggers a re-learn when some match new to this
    /// call isn't already covered by `current_predicates`.
    #[instrument(skip(self, dupes))]
    pub fn mark(&mut self, dupes: &[LabelledPair]) -> Result<()> {
        let new_dupes: Vec<&LabelledPair> = dupes.iter().filter(|p| !self.old_dupes.contains(p)).collect();
        if new_dupes.is_empty() {
            return Ok(());
        }
        let new_uncovered = new_dupes.iter().any(|p| !self.block_learner.predict(&self.current_predicates, &p.a, &p.b));
        if new_uncovered {
            self.current_predicates = self.block_learner.learn(dupes, 1.0)?;
            self.old_dupes = dupes.to_vec();
        }
        Ok(())
    }

    /// Runs one final `learn()` over `dupes` at the caller-chosen
    /// `recall`, optionally restricted to non-indexed predicates.
    pub fn learn_predicates(&mut self, dupes: &[LabelledPair], recall: f64, index_predicates: bool) -> Result<Vec<Predicate>> {
        self.block_learner.learn_restricted(dupes, recall, index_predicates)
    }
}

/// Disagreement-based two-classifier active learner.
pub struct DisagreementLearner {
    candidates: CandidatePool,
    regression: RegressionLearner,
    blocks: BlockSubLearner,
    distance_model: DistanceModel,
    pairs: Vec<(Record, Record)>,
    labels: Vec<bool>,
}

impl DisagreementLearner {
    #[must_use]
    pub fn new(candidates: CandidatePool, block_learner: BlockLearner, distance_model: DistanceModel) -> Self {
        Self {
            candidates,
            regression: RegressionLearner::new(),
            blocks: BlockSubLearner::new(block_learner),
            distance_model,
            pairs: Vec::new(),
            labels: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Reads a uniformly-random pair from the pool without removing it
    /// (`labeler.py DedupeDisagreementLearner.__init__`'s
    /// `random.choice(self.candidates)` used to build the seed pair).
    #[must_use]
    pub fn peek_random(&self, rng: &mut impl Rng) -> Option<(Record, Record)> {
        if self.candidates.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.candidates.len());
        self.candidates.pair(idx).cloned()
    }

    fn dupes(&self) -> Vec<LabelledPair> {
        self.pairs
            .iter()
            .zip(&self.labels)
            .filter(|(_, &label)| label)
            .map(|((a, b), _)| LabelledPair::new(a.clone(), b.clone(), true))
            .collect()
    }

    /// Builds the two-learner score matrix, picks the most-disagreeing
    /// row (or, absent disagreement, the highest-variance row), removes
    /// it from the pool, and returns it.
    ///
    /// # Errors
    /// [`Error::ExhaustedCandidates`] if the pool is empty.
    #[instrument(skip(self))]
    pub fn pop(&mut self) -> Result<(Record, Record)> {
        if self.candidates.is_empty() {
            return Err(Error::ExhaustedCandidates);
        }
        let regression_scores = self.regression.scores(&self.candidates);
        let block_scores = self.blocks.scores(&self.candidates);

        let disagreement: Vec<usize> = (0..regression_scores.len())
            .filter(|&i| (regression_scores[i] > 0.5) != (block_scores[i] > 0.5))
            .collect();

        let idx = if disagreement.is_empty() {
            // Two-score `std` is a monotone function of |a - b|; pick the
            // largest gap directly rather than reproducing the float
            // `std(...).astype(bool)` route.
            (0..regression_scores.len())
                .max_by(|&a, &b| {
                    let gap_a = (regression_scores[a] - block_scores[a]).abs();
                    let gap_b = (regression_scores[b] - block_scores[b]).abs();
                    gap_a.partial_cmp(&gap_b).expect("scores are never NaN")
                })
                .expect("pool checked nonempty above")
        } else {
            let target: f64 = rand::thread_rng().gen();
            *disagreement
                .iter()
                .max_by(|&&a, &&b| {
                    (regression_scores[a] - target).partial_cmp(&(regression_scores[b] - target)).expect("scores are never NaN")
                })
                .expect("checked nonempty above")
        };

        debug!(regression_score = regression_scores[idx], block_covered = block_scores[idx] > 0.5, "popped candidate");
        Ok(self.candidates.remove(idx))
    }

    /// Appends to accumulated training data and refits both
    /// sub-learners.
    #[instrument(skip(self, pairs, labels))]
    pub fn mark(&mut self, pairs: Vec<(Record, Record)>, labels: Vec<bool>) -> Result<()> {
        let mut new_distances = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            new_distances.push(self.distance_model.compute(&a, &b));
            self.pairs.push((a, b));
        }
        self.labels.extend(labels.iter().copied());
        self.regression.mark(&new_distances, &labels);
        self.blocks.mark(&self.dupes())?;
        Ok(())
    }

    /// Returns the final rule set from every match labelled so far.
    ///
    /// # Errors
    /// Propagates errors from [`BlockLearner::learn`].
    pub fn learn_predicates(&mut self, recall: f64, index_predicates: bool) -> Result<Vec<Predicate>> {
        let dupes = self.dupes();
        self.blocks.learn_predicates(&dupes, recall, index_predicates)
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::distance::{FieldDefinition, FieldKind};
    use crate::predicate::SimpleKind;
    use crate::record::{RecordId, Value};
    use crate::sampling::Sample;
    use std::collections::HashMap;

    fn rec(id: u64, name: &str) -> Record {
        Record::new(RecordId(id)).with_field("name", Value::Text(name.to_string()))
    }

    fn learner() -> DisagreementLearner {
        let records = vec![rec(1, "john smith"), rec(2, "john smith"), rec(3, "jane doe"), rec(4, "jane doe")];
        let by_id: HashMap<RecordId, Record> = records.iter().map(|r| (r.id, r.clone())).collect();
        let model = DistanceModel::new(&[FieldDefinition::new("name", FieldKind::String)]).unwrap();
        let ids = vec![
            (RecordId(1), RecordId(2)),
            (RecordId(1), RecordId(3)),
            (RecordId(3), RecordId(4)),
        ];
        let pool = CandidatePool::new(&ids, &by_id, &model);
        let predicates = vec![Predicate::simple(SimpleKind::WholeField, "name")];
        let sample = Sample { records: records.clone(), original_length: records.len() };
        let block_learner = BlockLearner::new_dedupe(predicates, sample, &records);
        DisagreementLearner::new(pool, block_learner, model)
    }

    #[test]
    fn test_pop_exhausts_pool() {
        let mut learner = learner();
        let starting = learner.len();
        for _ in 0..starting {
            learner.pop().unwrap();
        }
        assert!(learner.is_empty());
        assert!(matches!(learner.pop(), Err(Error::ExhaustedCandidates)));
    }

    /// Two independent fields so the block predicate (on `name`) and the
    /// regression feature (on `num`, an exact match) can be steered apart.
    fn rec2(id: u64, name: &str, num: &str) -> Record {
        Record::new(RecordId(id)).with_field("name", Value::Text(name.to_string())).with_field("num", Value::Text(num.to_string()))
    }

    #[test]
    fn test_pop_picks_the_real_disagreeing_pair() {
        let pool_records = vec![
            rec2(1, "alpha", "5"),
            rec2(2, "beta", "5"),
            rec2(3, "gamma", "5"),
            rec2(4, "delta", "9"),
            rec2(5, "same", "5"),
            rec2(6, "same", "5"),
        ];
        let by_id: HashMap<RecordId, Record> = pool_records.iter().map(|r| (r.id, r.clone())).collect();
        let model = DistanceModel::new(&[FieldDefinition::new("num", FieldKind::Exact)]).unwrap();
        let pool_ids =
            vec![(RecordId(1), RecordId(2)), (RecordId(3), RecordId(4)), (RecordId(5), RecordId(6))];
        let pool = CandidatePool::new(&pool_ids, &by_id, &model);
        let expected_pop = pool.pair(0).unwrap().clone();

        let predicates = vec![Predicate::simple(SimpleKind::WholeField, "name")];
        let sample = Sample { records: pool_records.clone(), original_length: pool_records.len() };
        let block_learner = BlockLearner::new_dedupe(predicates, sample, &pool_records);
        let mut learner = DisagreementLearner::new(pool, block_learner, model);

        // Training pairs disjoint from the pool: three matches (same
        // `name`, same `num`) and three non-matches (different `num`),
        // so the block learner covers only same-`name` pairs and the
        // regression model separates on `num` equality.
        let matches: Vec<(Record, Record)> = (0..3)
            .map(|i| {
                let base = 100 + i * 2;
                (rec2(base, &format!("train-m{i}"), "5"), rec2(base + 1, &format!("train-m{i}"), "5"))
            })
            .collect();
        let non_matches: Vec<(Record, Record)> = (0..3)
            .map(|i| {
                let base = 200 + i * 2;
                (rec2(base, &format!("train-n{i}a"), "5"), rec2(base + 1, &format!("train-n{i}b"), "9"))
            })
            .collect();
        let mut pairs = matches;
        pairs.extend(non_matches);
        let labels = vec![true, true, true, false, false, false];
        learner.mark(pairs, labels).unwrap();

        // pair 0: `num` matches (regression high), `name` differs (block
        // false) -> disagreement. pair 1: `num` differs (regression low),
        // `name` differs (block false) -> agreement. pair 2: `num`
        // matches (regression high), `name` matches (block true) ->
        // agreement. Only pair 0 disagrees, so pop() must return it
        // regardless of the random tie-break draw.
        let popped = learner.pop().unwrap();
        assert_eq!(popped, expected_pop);
        assert_eq!(learner.len(), 2);
    }
}
