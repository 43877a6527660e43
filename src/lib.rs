pub mod active;
pub mod block_learner;
pub mod branch_bound;
pub mod cover;
pub mod distance;
pub mod error;
pub mod fingerprinter;
pub mod index;
pub mod predicate;
pub mod record;
pub mod sampling;

use rand::Rng;
use tracing::instrument;

use active::DisagreementLearner;
use block_learner::BlockLearner;
use distance::{DistanceModel, FieldDefinition};
use error::Result;
use predicate::Predicate;
use record::Record;
use sampling::{blocked_random_walk_pairs, uniform_pairs, CandidatePool, Sample};
use std::collections::HashMap;

/// `labeler.py Sample`'s default: the
/// population is first cut down to this size before the (smaller)
/// coverage sample is drawn from it.
pub const DEFAULT_INDEX_SAMPLE_SIZE: usize = 50_000;
/// Dedupe coverage sample size (`labeler.py DedupeSampler`).
pub const DEFAULT_DEDUPE_COVERAGE_SAMPLE_SIZE: usize = 2_000;
/// Per-side record-link coverage sample size (`labeler.py RecordLinkSampler`).
pub const DEFAULT_RECORD_LINK_COVERAGE_SAMPLE_SIZE: usize = 600;
/// Fraction of the initial candidate pool drawn via the blocked random
/// walk rather than uniformly.
pub const DEFAULT_BLOCKED_PROPORTION: f64 = 0.5;

/// Ties together the distance model, block learner, and disagreement
/// learner into the one object a caller drives through a labelling
/// session.
pub struct TrainingSession {
    learner: DisagreementLearner,
}

impl TrainingSession {
    /// Builds a dedupe training session over one population.
    ///
    /// `index_include` names extra pairs
    /// that must be indexed even if the coverage sample would not have
    /// picked them.
    ///
    /// # Errors
    /// `Error::RecordFieldMissing` if a record lacks a field `fields`
    /// declares, `Error::InvalidFieldSpec` if `fields` is malformed.
    #[instrument(skip(records, fields, index_include, rng))]
    pub fn new_dedupe(
        records: Vec<Record>,
        fields: &[FieldDefinition],
        index_include: &[(Record, Record)],
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let distance_model = DistanceModel::new(fields)?;
        for record in &records {
            distance_model.check(record)?;
        }

        let predicates = distance_model.seed_predicates();
        let index_sample = Sample::new(&records, DEFAULT_INDEX_SAMPLE_SIZE, records.len(), rng);
        let mut index_data = index_sample.records.clone();
        for (a, b) in index_include {
            index_data.push(a.clone());
            index_data.push(b.clone());
        }
        let coverage_sample =
            Sample::new(&index_data, DEFAULT_DEDUPE_COVERAGE_SAMPLE_SIZE, records.len(), rng);

        let mut block_learner = BlockLearner::new_dedupe(predicates.clone(), coverage_sample, &index_data);

        let pool = Self::build_pool(&records, &predicates, &distance_model, block_learner.fingerprinter_mut(), rng);
        let mut learner = DisagreementLearner::new(pool, block_learner, distance_model);
        seed(&mut learner, rng)?;
        Ok(Self { learner })
    }

    /// Builds a record-link training session over two populations.
    ///
    /// # Errors
    /// `Error::RecordFieldMissing` if a record lacks a field `fields`
    /// declares, `Error::InvalidFieldSpec` if `fields` is malformed.
    #[instrument(skip(records_a, records_b, fields, index_include, rng))]
    pub fn new_record_link(
        records_a: Vec<Record>,
        records_b: Vec<Record>,
        fields: &[FieldDefinition],
        index_include: &[(Record, Record)],
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let distance_model = DistanceModel::new(fields)?;
        for record in records_a.iter().chain(records_b.iter()) {
            distance_model.check(record)?;
        }

        let predicates = distance_model.seed_predicates();
        let index_sample_b = Sample::new(&records_b, DEFAULT_INDEX_SAMPLE_SIZE, records_b.len(), rng);
        let mut index_data_b = index_sample_b.records.clone();
        for (_, b) in index_include {
            index_data_b.push(b.clone());
        }

        let sample_a = Sample::new(&records_a, DEFAULT_RECORD_LINK_COVERAGE_SAMPLE_SIZE, records_a.len(), rng);
        let sample_b = Sample::new(&index_data_b, DEFAULT_RECORD_LINK_COVERAGE_SAMPLE_SIZE, records_b.len(), rng);

        let mut block_learner = BlockLearner::new_record_link(predicates.clone(), sample_a, sample_b, &index_data_b);

        let all_records: Vec<Record> = records_a.iter().chain(records_b.iter()).cloned().collect();
        let pool = Self::build_pool(&all_records, &predicates, &distance_model, block_learner.fingerprinter_mut(), rng);
        let mut learner = DisagreementLearner::new(pool, block_learner, distance_model);
        seed(&mut learner, rng)?;
        Ok(Self { learner })
    }

    fn build_pool(
        records: &[Record],
        predicates: &[Predicate],
        distance_model: &DistanceModel,
        fingerprinter: &mut fingerprinter::Fingerprinter,
        rng: &mut impl Rng,
    ) -> CandidatePool {
        let total = records.len();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n_blocked = (total as f64 * DEFAULT_BLOCKED_PROPORTION) as usize;
        let n_uniform = total.saturating_sub(n_blocked);
        let mut pair_ids = blocked_random_walk_pairs(records, predicates, fingerprinter, n_blocked, rng);
        pair_ids.extend(uniform_pairs(records, n_uniform, rng));
        let by_id: HashMap<record::RecordId, Record> = records.iter().map(|r| (r.id, r.clone())).collect();
        CandidatePool::new(&pair_ids, &by_id, distance_model)
    }

    /// Returns the next candidate the learner most wants labelled (spec
    /// §4.7 `pop()`).
    ///
    /// # Errors
    /// `Error::ExhaustedCandidates` once the pool is empty.
    pub fn pop(&mut self) -> Result<(Record, Record)> {
        self.learner.pop()
    }

    /// Records a caller's label for previously-popped pairs.
    ///
    /// # Errors
    /// Propagates [`BlockLearner::learn`] errors raised while refitting
    /// the block sub-learner.
    pub fn mark(&mut self, pairs: Vec<(Record, Record)>, labels: Vec<bool>) -> Result<()> {
        self.learner.mark(pairs, labels)
    }

    /// Finalizes the labelled matches accumulated so far into a rule set.
    ///
    /// # Errors
    /// Propagates [`BlockLearner::learn`] errors.
    pub fn learn_predicates(&mut self, recall: f64, index_predicates: bool) -> Result<Vec<Predicate>> {
        self.learner.learn_predicates(recall, index_predicates)
    }

    #[must_use]
    pub fn remaining_candidates(&self) -> usize {
        self.learner.len()
    }
}

/// Seeds the session with an exact-match positive and a random negative
/// before any human labelling happens:
/// `labeler.py`'s `mark([exact_match] * 4 + [random_pair], [1] * 4 + [0])`,
/// reproduced verbatim rather than the single-injection reading spec
/// §4.7 alone would suggest, since `rlr`'s gradient floor needs at least
/// a few positive rows to move off its initial all-zero weights.
fn seed(learner: &mut DisagreementLearner, rng: &mut impl Rng) -> Result<()> {
    let Some(random_pair) = learner.peek_random(rng) else { return Ok(()) };
    let exact_match = (random_pair.0.clone(), random_pair.0.clone());
    let pairs = vec![exact_match.clone(), exact_match.clone(), exact_match.clone(), exact_match, random_pair];
    let labels = vec![true, true, true, true, false];
    learner.mark(pairs, labels)
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::distance::FieldKind;
    use crate::record::{RecordId, Value};
    use rand::SeedableRng;
    use spectral::prelude::*;
    use tracing_test::traced_test;

    fn rec(id: u64, name: &str) -> Record {
        Record::new(RecordId(id)).with_field("name", Value::Text(name.to_string()))
    }

    #[traced_test]
    #[test]
    fn test_dedupe_session_builds_and_pops() {
        let records: Vec<Record> = (0..20).map(|i| rec(i, if i % 2 == 0 { "john smith" } else { "jane doe" })).collect();
        let fields = vec![FieldDefinition::new("name", FieldKind::String)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut session = TrainingSession::new_dedupe(records, &fields, &[], &mut rng).unwrap();
        if session.remaining_candidates() > 0 {
            let popped = session.pop();
            assert_that(&popped).is_ok();
        }
    }

    #[traced_test]
    #[test]
    fn test_missing_field_is_rejected() {
        let records = vec![Record::new(RecordId(1)), Record::new(RecordId(2))];
        let fields = vec![FieldDefinition::new("name", FieldKind::String)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let result = TrainingSession::new_dedupe(records, &fields, &[], &mut rng);
        assert_that(&result).is_err();
    }

    #[traced_test]
    #[test]
    fn test_record_link_session_builds() {
        let records_a: Vec<Record> = (0..10).map(|i| rec(i, "john smith")).collect();
        let records_b: Vec<Record> = (100..110).map(|i| rec(i, "john smith")).collect();
        let fields = vec![FieldDefinition::new("name", FieldKind::String)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let session = TrainingSession::new_record_link(records_a, records_b, &fields, &[], &mut rng);
        assert_that(&session).is_ok();
    }
}
