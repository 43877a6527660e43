// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `Cover` and `Counter`: the two bookkeeping structures the
//! rest of the learner builds on. `Counter` is a multiset of record-pair
//! ids used for comparison-cost estimation; `Cover` maps a predicate to the
//! set of labelled-pair ids it blocks together. `Enumerator` assigns stable
//! integer ids to unordered record-id pairs.

use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use tracing::instrument;

use crate::predicate::Predicate;
use crate::record::RecordId;

/// A labelled pair id indexes into the caller's match list; a record-pair
/// id is whatever `Enumerator` assigned it.
pub type PairId = usize;

/// Deterministically assigns a stable integer id to each unordered pair of
/// record ids it is asked about, reusing ids for pairs seen before.
#[derive(Debug, Default)]
pub struct Enumerator {
    ids: HashMap<(RecordId, RecordId), PairId>,
    next: PairId,
}

impl Enumerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stable id for `(a, b)`, assigning a fresh one if needed.
    /// The pair is canonicalized (smaller id first) so `(a, b)` and `(b,
    /// a)` always share an id.
    pub fn id_for(&mut self, a: RecordId, b: RecordId) -> PairId {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.ids.insert(key, id);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.next
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}

/// A multiset of pair ids with a precomputed `total`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Counter {
    counts: BTreeMap<PairId, u64>,
    pub total: u64,
}

impl Counter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: PairId, count: u64) {
        *self.counts.entry(id).or_insert(0) += count;
        self.total += count;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: PairId) -> u64 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// `(A*B)[k] = A[k] * B[k]` for `k` in both multisets; `total`
    /// recomputed. Commutative; iterates the smaller multiset for
    /// efficiency — an ordering heuristic only, not a correctness
    /// requirement.
    #[must_use]
    #[instrument(skip(self, other))]
    pub fn mul(&self, other: &Counter) -> Counter {
        let (smaller, larger) = if self.len() <= other.len() { (self, other) } else { (other, self) };
        let mut out = Counter::new();
        for (&id, &count) in &smaller.counts {
            if let Some(&other_count) = larger.counts.get(&id) {
                out.add(id, count * other_count);
            }
        }
        out
    }

    /// Scales every count (and `total`) by a real-valued ratio, used to
    /// project sample-level comparison counts onto the full population
    /// (`r = N(N-1) / (n(n-1))`).
    #[must_use]
    pub fn scaled(&self, r: f64) -> Counter {
        let mut out = Counter::new();
        for (&id, &count) in &self.counts {
            out.add(id, (count as f64 * r).round() as u64);
        }
        out
    }
}

/// `predicate -> set of labelled-pair ids it covers`. Predicates with an
/// empty cover are never stored.
#[derive(Clone, Debug, Default)]
pub struct Cover {
    entries: HashMap<Predicate, HashSet<PairId>>,
}

impl Cover {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, predicate: Predicate, pairs: HashSet<PairId>) {
        if !pairs.is_empty() {
            self.entries.insert(predicate, pairs);
        }
    }

    #[must_use]
    pub fn get(&self, predicate: &Predicate) -> Option<&HashSet<PairId>> {
        self.entries.get(predicate)
    }

    #[must_use]
    pub fn contains(&self, predicate: &Predicate) -> bool {
        self.entries.contains_key(predicate)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Predicate, &HashSet<PairId>)> {
        self.entries.iter()
    }

    /// The union of every stored cover, e.g. the set of labelled pairs
    /// coverable by *some* surviving predicate.
    #[must_use]
    pub fn union_all(&self) -> HashSet<PairId> {
        let mut out = HashSet::new();
        for pairs in self.entries.values() {
            out.extend(pairs.iter().copied());
        }
        out
    }

    /// Enumerates compound predicates of size `2..=k` from the simples
    /// currently stored, keeping only those whose component
    /// `compounds_with` relation permits the combination and whose
    /// intersection cover is nonempty. Iterates predicates sorted by
    /// `repr` for determinism.
    #[instrument(skip(self))]
    pub fn compound(&mut self, k: usize) {
        let mut simples: Vec<Predicate> = self.entries.keys().cloned().collect();
        simples.sort();
        let mut additions: Vec<(Predicate, HashSet<PairId>)> = Vec::new();
        for size in 2..=k {
            for combo in simples.iter().combinations(size) {
                if !pairwise_compound_ok(&combo) {
                    continue;
                }
                let Some(intersection) = intersect_all(&combo, &self.entries) else { continue };
                if intersection.is_empty() {
                    continue;
                }
                let owned: Vec<Predicate> = combo.into_iter().cloned().collect();
                let Ok(compound) = Predicate::compound(owned) else { continue };
                additions.push((compound, intersection));
            }
        }
        for (predicate, pairs) in additions {
            self.entries.insert(predicate, pairs);
        }
    }

    /// Keeps only predicates with a strictly-smaller-or-equal-cost,
    /// superset-cover dominator removed; sorts by `(-cost, |cover|)`
    /// ascending and drops a candidate if a later predicate dominates it.
    #[instrument(skip(self, cost))]
    pub fn dominators(&mut self, cost: &HashMap<Predicate, u64>) {
        let mut keys: Vec<Predicate> = self.entries.keys().cloned().collect();
        keys.sort_by(|a, b| {
            let ca = cost.get(a).copied().unwrap_or(u64::MAX);
            let cb = cost.get(b).copied().unwrap_or(u64::MAX);
            cb.cmp(&ca).then_with(|| self.entries[a].len().cmp(&self.entries[b].len()))
        });
        let mut dropped: HashSet<Predicate> = HashSet::new();
        for i in 0..keys.len() {
            if dropped.contains(&keys[i]) {
                continue;
            }
            let cost_i = cost.get(&keys[i]).copied().unwrap_or(u64::MAX);
            let cover_i = &self.entries[&keys[i]];
            for key_j in keys.iter().skip(i + 1) {
                if dropped.contains(key_j) {
                    continue;
                }
                let cost_j = cost.get(key_j).copied().unwrap_or(u64::MAX);
                let cover_j = &self.entries[key_j];
                if cost_j <= cost_i && cover_j.is_superset(cover_i) {
                    dropped.insert(keys[i].clone());
                    break;
                }
            }
        }
        for predicate in dropped {
            self.entries.remove(&predicate);
        }
    }

    /// Restricts keys to those also present in `other`.
    pub fn intersection_update(&mut self, other: &Cover) {
        self.entries.retain(|predicate, _| other.contains(predicate));
    }

    /// Restricts keys to those present in `keys`, used by `BlockLearner`
    /// when discarding predicates absent from the comparison-count
    /// estimate.
    pub fn intersection_update_keys<'a>(&mut self, keys: impl Iterator<Item = &'a Predicate>) {
        let keep: HashSet<Predicate> = keys.cloned().collect();
        self.entries.retain(|predicate, _| keep.contains(predicate));
    }
}

pub(crate) fn pairwise_compound_ok(combo: &[&Predicate]) -> bool {
    for i in 0..combo.len() {
        for j in (i + 1)..combo.len() {
            if !combo[i].compounds_with(combo[j]) {
                return false;
            }
        }
    }
    true
}

fn intersect_all(combo: &[&Predicate], entries: &HashMap<Predicate, HashSet<PairId>>) -> Option<HashSet<PairId>> {
    let mut iter = combo.iter();
    let first = entries.get(*iter.next()?)?;
    let mut acc = first.clone();
    for predicate in iter {
        let cover = entries.get(*predicate)?;
        acc.retain(|id| cover.contains(id));
        if acc.is_empty() {
            return Some(acc);
        }
    }
    Some(acc)
}
