// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `BlockLearner`: orchestrates coverage construction on a
//! sample, generates compound candidates, estimates per-predicate
//! comparison cost, prunes dominated candidates, and invokes
//! [`crate::branch_bound::BranchBound`]. Dedupe and record-link differ
//! only in how the simple cover and the population-scaling ratio `r` are
//! computed, so both live behind one
//! `SampleStrategy` rather than a class hierarchy.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::branch_bound::{BranchBound, DEFAULT_MAX_CALLS};
use crate::cover::{pairwise_compound_ok, Counter, Cover, Enumerator, PairId};
use crate::error::Result;
use crate::fingerprinter::Fingerprinter;
use crate::predicate::Predicate;
use crate::record::{LabelledPair, Record};
use crate::sampling::Sample;

/// `training.py`'s `OUT_OF_PREDICATES_WARNING`, verbatim in spirit:
/// fewer matches are coverable than `recall` asks for, and the learner
/// falls back to `epsilon = 0` rather than failing the call.
const OUT_OF_PREDICATES_WARNING: &str =
    "Learned rules cover fewer than the requested recall fraction of labelled matches; falling back to maximum achievable coverage";

/// Whether the learner is sampling within one population (dedupe) or
/// across two (record-link) — for record-link, each block keeps
/// `(ids_from_side_1, ids_from_side_2)` separately.
enum SampleStrategy {
    Dedupe { sample: Sample },
    RecordLink { sample_a: Sample, sample_b: Sample },
}

impl SampleStrategy {
    fn ratio(&self) -> f64 {
        match self {
            SampleStrategy::Dedupe { sample } => sample.ratio(),
            SampleStrategy::RecordLink { sample_a, sample_b } => Sample::ratio_record_link(sample_a, sample_b),
        }
    }
}

/// Computes `simple_cover: predicate -> Counter<pair_id>` for the dedupe
/// case: enumerate every intra-block record pair
/// through a single shared [`Enumerator`], discarding predicates whose
/// largest block is the whole sample.
fn dedupe_simple_cover(
    fingerprinter: &mut Fingerprinter,
    predicates: &[Predicate],
    records: &[Record],
    enumerator: &mut Enumerator,
) -> HashMap<Predicate, Counter> {
    let mut cover = HashMap::new();
    let n_records = records.len();
    for predicate in predicates {
        let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
        for record in records {
            let Ok(keys) = fingerprinter.apply(predicate, record, false) else { continue };
            for key in keys {
                blocks.entry(key).or_default().push(record.id.0 as usize);
            }
        }
        if blocks.is_empty() {
            continue;
        }
        let max_cover = blocks.values().map(Vec::len).max().unwrap_or(0);
        if max_cover == n_records {
            continue;
        }
        let mut counter = Counter::new();
        for ids in blocks.values() {
            let mut sorted_ids = ids.clone();
            sorted_ids.sort_unstable();
            sorted_ids.dedup();
            for combo in sorted_ids.iter().combinations(2) {
                let id = enumerator.id_for((*combo[0] as u64).into(), (*combo[1] as u64).into());
                counter.add(id, 1);
            }
        }
        if !counter.is_empty() {
            cover.insert(predicate.clone(), counter);
        }
    }
    cover
}

/// Record-link variant of the simple cover: for each
/// predicate and block key, track which side-1 and side-2 record ids
/// land there, then enumerate the cross product.
fn record_link_simple_cover(
    fingerprinter: &mut Fingerprinter,
    predicates: &[Predicate],
    records_a: &[Record],
    records_b: &[Record],
    enumerator: &mut Enumerator,
) -> HashMap<Predicate, Counter> {
    let mut cover = HashMap::new();
    for predicate in predicates {
        let mut blocks: HashMap<String, (Vec<u64>, Vec<u64>)> = HashMap::new();
        for record in records_b {
            let Ok(keys) = fingerprinter.apply(predicate, record, true) else { continue };
            for key in keys {
                blocks.entry(key).or_default().1.push(record.id.0);
            }
        }
        let live_keys: HashSet<&String> = blocks.keys().collect();
        for record in records_a {
            let Ok(keys) = fingerprinter.apply(predicate, record, false) else { continue };
            for key in keys {
                if live_keys.contains(&key) {
                    blocks.get_mut(&key).expect("key present").0.push(record.id.0);
                }
            }
        }
        let mut counter = Counter::new();
        for (side_a, side_b) in blocks.values() {
            for (&a, &b) in side_a.iter().cartesian_product(side_b.iter()) {
                let id = enumerator.id_for(a.into(), b.into());
                counter.add(id, 1);
            }
        }
        if !counter.is_empty() {
            cover.insert(predicate.clone(), counter);
        }
    }
    cover
}

/// `training.py BlockLearner.comparisons`'s `Compounder`: multiplies
/// component `Counter`s left-to-right with a one-deep memo of the
/// prefix product, so an n-way compound only recomputes the last
/// multiplication.
struct Compounder<'a> {
    simple_cover: &'a HashMap<Predicate, Counter>,
    cached_prefix: Option<(Vec<Predicate>, Counter)>,
}

impl<'a> Compounder<'a> {
    fn new(simple_cover: &'a HashMap<Predicate, Counter>) -> Self {
        Self { simple_cover, cached_prefix: None }
    }

    fn estimate(&mut self, components: &[Predicate]) -> Counter {
        if components.len() == 1 {
            return self.simple_cover.get(&components[0]).cloned().unwrap_or_default();
        }
        let (prefix, last) = components.split_at(components.len() - 1);
        let prefix_counter = if let Some((cached_prefix, cached_counter)) = &self.cached_prefix {
            if cached_prefix.as_slice() == prefix {
                cached_counter.clone()
            } else {
                let fresh = self.estimate(prefix);
                self.cached_prefix = Some((prefix.to_vec(), fresh.clone()));
                fresh
            }
        } else {
            let fresh = self.estimate(prefix);
            self.cached_prefix = Some((prefix.to_vec(), fresh.clone()));
            fresh
        };
        let last_counter = self.simple_cover.get(&last[0]).cloned().unwrap_or_default();
        prefix_counter.mul(&last_counter)
    }
}

/// Enumerates the simples plus every valid compound up to `compound_length`
///, sorted by
/// `repr` for determinism.
fn compound_candidates(simple_cover: &HashMap<Predicate, Counter>, compound_length: usize) -> Vec<Vec<Predicate>> {
    let mut simples: Vec<Predicate> = simple_cover.keys().cloned().collect();
    simples.sort();
    let mut out: Vec<Vec<Predicate>> = simples.iter().map(|p| vec![p.clone()]).collect();
    for size in 2..=compound_length {
        for combo in simples.iter().combinations(size) {
            if !pairwise_compound_ok(&combo) {
                continue;
            }
            out.push(combo.into_iter().cloned().collect());
        }
    }
    out
}

/// Estimates `comparison_count: predicate -> u64` by multiplying
/// component counters and scaling by the strategy's population ratio
/// `r`.
fn estimate_comparisons(
    simple_cover: &HashMap<Predicate, Counter>,
    candidates: &[Vec<Predicate>],
    r: f64,
) -> HashMap<Predicate, u64> {
    let mut compounder = Compounder::new(simple_cover);
    let mut out = HashMap::new();
    for components in candidates {
        let estimate = compounder.estimate(components);
        let scaled = estimate.scaled(r);
        let key = if components.len() == 1 {
            components[0].clone()
        } else {
            match Predicate::compound(components.clone()) {
                Ok(p) => p,
                Err(_) => continue,
            }
        };
        out.insert(key, scaled.total);
    }
    out
}

/// Orchestrates the full rule-learning loop: builds a [`Fingerprinter`]
/// over the given predicate set, indexes the sample, estimates comparison
/// costs, and serves `learn()` calls against freshly-supplied labelled
/// matches.
pub struct BlockLearner {
    fingerprinter: Fingerprinter,
    predicates: Vec<Predicate>,
    comparison_count: HashMap<Predicate, u64>,
    compound_length: usize,
    max_calls: u64,
}

impl BlockLearner {
    /// Dedupe constructor:
    /// `sample` is the coverage sample and `index_data` is the (larger)
    /// population the indexed predicates are built over.
    #[instrument(skip(predicates, sample, index_data))]
    pub fn new_dedupe(predicates: Vec<Predicate>, sample: Sample, index_data: &[Record]) -> Self {
        Self::build(predicates, SampleStrategy::Dedupe { sample }, index_data, None)
    }

    /// Record-link constructor: `sample_a`/`sample_b` are per-side
    /// coverage samples, `index_data_b` is side 2's (larger) population.
    #[instrument(skip(predicates, sample_a, sample_b, index_data_b))]
    pub fn new_record_link(predicates: Vec<Predicate>, sample_a: Sample, sample_b: Sample, index_data_b: &[Record]) -> Self {
        let records_a = sample_a.records.clone();
        Self::build(predicates, SampleStrategy::RecordLink { sample_a, sample_b }, index_data_b, Some(records_a))
    }

    fn build(
        predicates: Vec<Predicate>,
        strategy: SampleStrategy,
        index_data: &[Record],
        record_link_side_a: Option<Vec<Record>>,
    ) -> Self {
        let mut fingerprinter = Fingerprinter::new();
        fingerprinter.index_all(&predicates, index_data.iter());

        let mut enumerator = Enumerator::new();
        let simple_cover = match (&strategy, &record_link_side_a) {
            (SampleStrategy::Dedupe { sample }, _) => {
                dedupe_simple_cover(&mut fingerprinter, &predicates, &sample.records, &mut enumerator)
            }
            (SampleStrategy::RecordLink { sample_b, .. }, Some(records_a)) => {
                record_link_simple_cover(&mut fingerprinter, &predicates, records_a, &sample_b.records, &mut enumerator)
            }
            (SampleStrategy::RecordLink { .. }, None) => unreachable!("record-link strategy always carries side A"),
        };

        let compound_length = 2;
        let candidates = compound_candidates(&simple_cover, compound_length);
        let r = strategy.ratio();
        let comparison_count = estimate_comparisons(&simple_cover, &candidates, r);
        debug!(predicate_count = predicates.len(), comparison_estimates = comparison_count.len(), "BlockLearner initialized");

        Self { fingerprinter, predicates, comparison_count, compound_length, max_calls: DEFAULT_MAX_CALLS }
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn fingerprinter_mut(&mut self) -> &mut Fingerprinter {
        &mut self.fingerprinter
    }

    /// Whether `matches` (the `dupes` the caller has labelled so far)
    /// are fully covered by `current`.
    #[must_use]
    pub fn covers_all(&mut self, predicates: &[Predicate], matches: &[LabelledPair]) -> bool {
        matches.iter().all(|pair| self.predict(predicates, &pair.a, &pair.b))
    }

    /// Scores a single pair under `predicates`: true iff any predicate
    /// produces a shared key for both records.
    #[must_use]
    pub fn predict(&mut self, predicates: &[Predicate], a: &Record, b: &Record) -> bool {
        for predicate in predicates {
            let Ok(keys_a) = self.fingerprinter.apply(predicate, a, false) else { continue };
            if keys_a.is_empty() {
                continue;
            }
            let Ok(keys_b) = self.fingerprinter.apply(predicate, b, true) else { continue };
            if !keys_a.is_disjoint(&keys_b) {
                return true;
            }
        }
        false
    }

    /// Builds a fresh `dupe_cover` from `self.predicates` and `matches`,
    /// compounds, prunes, computes the recall-derived target, and invokes
    /// [`BranchBound`].
    ///
    /// # Errors
    /// Propagates [`crate::error::Error::NotIndexed`] if an indexed
    /// predicate is applied to a record never passed to
    /// [`Fingerprinter::index_all`].
    #[instrument(skip(self, matches))]
    pub fn learn(&mut self, matches: &[LabelledPair], recall: f64) -> Result<Vec<Predicate>> {
        let mut dupe_cover = self.dupe_cover(matches)?;
        dupe_cover.compound(self.compound_length);
        dupe_cover.intersection_update_keys(self.comparison_count.keys());
        dupe_cover.dominators(&self.comparison_count);

        let coverable: HashSet<PairId> = dupe_cover.union_all();
        let uncoverable = matches.len() - coverable.len().min(matches.len());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut epsilon = ((1.0 - recall) * matches.len() as f64).floor() as usize;
        if uncoverable > epsilon {
            warn!(uncoverable, epsilon, "{OUT_OF_PREDICATES_WARNING}");
            epsilon = 0;
        } else {
            epsilon -= uncoverable;
        }

        let target = coverable.len().saturating_sub(epsilon);
        debug!(target, coverable = coverable.len(), uncoverable, "BlockLearner.learn target computed");

        let mut bb = BranchBound::new(target, self.max_calls, self.comparison_count.clone());
        Ok(bb.search(&dupe_cover))
    }

    /// `learn()` restricted to non-indexed predicates when
    /// `index_predicates` is false: swaps
    /// `self.predicates` for the non-indexed subset for the duration of
    /// one `learn()` call, then restores it (`labeler.py
    /// DisagreementLearner.learn_predicates`'s `old_preds` save/restore).
    #[instrument(skip(self, matches))]
    pub fn learn_restricted(&mut self, matches: &[LabelledPair], recall: f64, index_predicates: bool) -> Result<Vec<Predicate>> {
        if index_predicates {
            return self.learn(matches, recall);
        }
        let saved = self.predicates.clone();
        self.predicates = saved.iter().filter(|p| !p.is_indexed()).cloned().collect();
        let result = self.learn(matches, recall);
        self.predicates = saved;
        result
    }

    fn dupe_cover(&mut self, matches: &[LabelledPair]) -> Result<Cover> {
        let mut cover = Cover::new();
        for predicate in self.predicates.clone() {
            let mut covered = HashSet::new();
            for (i, pair) in matches.iter().enumerate() {
                let keys_a = self.fingerprinter.apply(&predicate, &pair.a, false)?;
                if keys_a.is_empty() {
                    continue;
                }
                let keys_b = self.fingerprinter.apply(&predicate, &pair.b, true)?;
                if !keys_a.is_disjoint(&keys_b) {
                    covered.insert(i);
                }
            }
            cover.insert(predicate, covered);
        }
        Ok(cover)
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::predicate::SimpleKind;
    use crate::record::{RecordId, Value};

    fn rec(id: u64, field: &str, value: &str) -> Record {
        Record::new(RecordId(id)).with_field(field, Value::Text(value.to_string()))
    }

    #[test]
    fn test_one_field_exact_match_is_coverable() {
        let predicates = vec![Predicate::simple(SimpleKind::WholeField, "name")];
        let data = vec![rec(1, "name", "john smith"), rec(2, "name", "john smith"), rec(3, "name", "jane doe")];
        let sample = Sample { records: data.clone(), original_length: data.len() };
        let mut learner = BlockLearner::new_dedupe(predicates, sample, &data);

        let matches = vec![LabelledPair::new(data[0].clone(), data[1].clone(), true)];
        let rules = learner.learn(&matches, 1.0).unwrap();
        assert!(!rules.is_empty());
        assert!(learner.predict(&rules, &data[0], &data[1]));
    }

    #[test]
    fn test_compound_needed_when_no_simple_predicate_covers_both() {
        let predicates = vec![
            Predicate::simple(SimpleKind::FirstToken, "first"),
            Predicate::simple(SimpleKind::SameThreeCharStart, "last"),
        ];
        let rec2 = |id, first: &str, last: &str| {
            Record::new(RecordId(id))
                .with_field("first", Value::Text(first.to_string()))
                .with_field("last", Value::Text(last.to_string()))
        };
        let a = rec2(1, "john", "smith");
        let b = rec2(2, "john", "smithe");
        let c = rec2(3, "jon", "smith");
        let d = rec2(4, "john", "smith");
        let data = vec![a.clone(), b.clone(), c.clone(), d.clone()];
        let sample = Sample { records: data.clone(), original_length: data.len() };
        let mut learner = BlockLearner::new_dedupe(predicates, sample, &data);

        let matches = vec![LabelledPair::new(a.clone(), b.clone(), true), LabelledPair::new(c.clone(), d.clone(), true)];
        let rules = learner.learn(&matches, 1.0).unwrap();
        assert!(learner.predict(&rules, &a, &b));
        assert!(learner.predict(&rules, &c, &d));
    }

    #[test]
    fn test_empty_predicates_returns_empty_rules() {
        let data = vec![rec(1, "name", "a"), rec(2, "name", "b")];
        let sample = Sample { records: data.clone(), original_length: data.len() };
        let mut learner = BlockLearner::new_dedupe(vec![], sample, &data);
        let matches = vec![LabelledPair::new(data[0].clone(), data[1].clone(), true)];
        let rules = learner.learn(&matches, 1.0).unwrap();
        assert!(rules.is_empty());
    }
}
