// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Candidate-pair sampling: a blocked random walk
//! over predicates, uniform random pairs over the population, and the
//! two-stage `Sample` trickle-down subsampling carried over from
//! `original_source/dedupe/labeler.py`'s `Sample`.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::instrument;

use crate::distance::DistanceModel;
use crate::fingerprinter::Fingerprinter;
use crate::predicate::Predicate;
use crate::record::{Record, RecordId};

/// Two-stage subsample: `source` (already a subsample of the full
/// population, size `original_length`) is subsampled again down to `size`
/// records. `ratio()` gives the population-to-sample scaling factor spec
/// §4.4 step 4 needs (`r = N(N-1) / (n(n-1))`).
#[derive(Debug, Clone)]
pub struct Sample {
    pub records: Vec<Record>,
    pub original_length: usize,
}

impl Sample {
    #[instrument(skip(source, rng))]
    pub fn new(source: &[Record], size: usize, original_length: usize, rng: &mut impl Rng) -> Self {
        let records = if source.len() <= size {
            source.to_vec()
        } else {
            source.choose_multiple(rng, size).cloned().collect()
        };
        Self { records, original_length }
    }

    #[must_use]
    pub fn ratio(&self) -> f64 {
        let n = self.records.len().max(1) as f64;
        let big_n = self.original_length.max(1) as f64;
        if n <= 1.0 {
            return 1.0;
        }
        (big_n * (big_n - 1.0)) / (n * (n - 1.0))
    }

    /// Record-link variant: `r = (N1/n1) * (N2/n2)`.
    #[must_use]
    pub fn ratio_record_link(sample_a: &Sample, sample_b: &Sample) -> f64 {
        let n1 = sample_a.records.len().max(1) as f64;
        let big_n1 = sample_a.original_length.max(1) as f64;
        let n2 = sample_b.records.len().max(1) as f64;
        let big_n2 = sample_b.original_length.max(1) as f64;
        (big_n1 / n1) * (big_n2 / n2)
    }
}

/// Uniform pair ids over the population.
#[instrument(skip(records, rng))]
pub fn uniform_pairs(records: &[Record], n: usize, rng: &mut impl Rng) -> Vec<(RecordId, RecordId)> {
    let mut out = Vec::with_capacity(n);
    if records.len() < 2 {
        return out;
    }
    for _ in 0..n {
        let i = rng.gen_range(0..records.len());
        let mut j = rng.gen_range(0..records.len());
        while j == i {
            j = rng.gen_range(0..records.len());
        }
        out.push((records[i].id, records[j].id));
    }
    out
}

/// Blocked sample via a random walk over predicates.
/// Picks a random predicate and record, finds records sharing a block key
/// under it, and pairs the seed with a random member of that set.
#[instrument(skip(records, predicates, fingerprinter, rng))]
pub fn blocked_random_walk_pairs(
    records: &[Record],
    predicates: &[Predicate],
    fingerprinter: &mut Fingerprinter,
    n: usize,
    rng: &mut impl Rng,
) -> Vec<(RecordId, RecordId)> {
    let mut out = Vec::new();
    if predicates.is_empty() || records.len() < 2 {
        return out;
    }
    let mut attempts = 0;
    let max_attempts = n.saturating_mul(20).max(50);
    while out.len() < n && attempts < max_attempts {
        attempts += 1;
        let predicate = &predicates[rng.gen_range(0..predicates.len())];
        let seed_idx = rng.gen_range(0..records.len());
        let seed = &records[seed_idx];
        let Ok(seed_keys) = fingerprinter.apply(predicate, seed, false) else { continue };
        if seed_keys.is_empty() {
            continue;
        }
        let mut sharing: Vec<&Record> = Vec::new();
        for other in records {
            if other.id == seed.id {
                continue;
            }
            if let Ok(other_keys) = fingerprinter.apply(predicate, other, false) {
                if !other_keys.is_disjoint(&seed_keys) {
                    sharing.push(other);
                }
            }
        }
        if sharing.is_empty() {
            continue;
        }
        let partner = sharing[rng.gen_range(0..sharing.len())];
        out.push((seed.id, partner.id));
    }
    out
}

/// A pool of unlabelled record pairs plus a row-aligned distance matrix
///; rows are removed together when a pair is
/// popped.
pub struct CandidatePool {
    pairs: Vec<(Record, Record)>,
    distances: Vec<Vec<f64>>,
}

impl CandidatePool {
    #[must_use]
    pub fn new(pair_ids: &[(RecordId, RecordId)], by_id: &HashMap<RecordId, Record>, model: &DistanceModel) -> Self {
        let mut pairs = Vec::new();
        let mut distances = Vec::new();
        for &(a, b) in pair_ids {
            if let (Some(ra), Some(rb)) = (by_id.get(&a), by_id.get(&b)) {
                distances.push(model.compute(ra, rb));
                pairs.push((ra.clone(), rb.clone()));
            }
        }
        Self { pairs, distances }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn pair(&self, idx: usize) -> Option<&(Record, Record)> {
        self.pairs.get(idx)
    }

    #[must_use]
    pub fn distance_row(&self, idx: usize) -> Option<&[f64]> {
        self.distances.get(idx).map(Vec::as_slice)
    }

    /// Removes and returns the pair at `idx`, dropping the matching
    /// distance row.
    pub fn remove(&mut self, idx: usize) -> (Record, Record) {
        self.distances.remove(idx);
        self.pairs.remove(idx)
    }

    pub fn push(&mut self, pair: (Record, Record), distance_row: Vec<f64>) {
        self.pairs.push(pair);
        self.distances.push(distance_row);
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::distance::{FieldDefinition, FieldKind};
    use crate::record::Value;
    use rand::SeedableRng;

    fn rec(id: u64, name: &str) -> Record {
        Record::new(RecordId(id)).with_field("name", Value::Text(name.to_string()))
    }

    #[test]
    fn test_sample_never_exceeds_requested_size() {
        let source: Vec<Record> = (0..10).map(|i| rec(i, "x")).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let sample = Sample::new(&source, 4, 100, &mut rng);
        assert_eq!(sample.records.len(), 4);
    }

    #[test]
    fn test_sample_keeps_source_when_smaller_than_requested_size() {
        let source: Vec<Record> = (0..3).map(|i| rec(i, "x")).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let sample = Sample::new(&source, 10, 100, &mut rng);
        assert_eq!(sample.records.len(), 3);
    }

    #[test]
    fn test_uniform_pairs_never_self_pairs() {
        let records: Vec<Record> = (0..5).map(|i| rec(i, "x")).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let pairs = uniform_pairs(&records, 20, &mut rng);
        assert!(pairs.iter().all(|(a, b)| a != b));
    }

    #[test]
    fn test_candidate_pool_remove_keeps_rows_aligned() {
        let records: Vec<Record> = (0..3).map(|i| rec(i, "x")).collect();
        let by_id: HashMap<RecordId, Record> = records.iter().map(|r| (r.id, r.clone())).collect();
        let model = DistanceModel::new(&[FieldDefinition::new("name", FieldKind::Exact)]).unwrap();
        let ids = vec![(RecordId(0), RecordId(1)), (RecordId(1), RecordId(2))];
        let mut pool = CandidatePool::new(&ids, &by_id, &model);
        assert_eq!(pool.len(), 2);
        pool.remove(0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pair(0).unwrap().0.id, RecordId(1));
    }
}
