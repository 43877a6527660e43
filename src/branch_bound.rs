// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `BranchBound`: the rule-selection optimiser. Searches for a
//! minimum-cost tuple of predicates whose union cover reaches `target`
//! labelled pairs, bounded by `max_calls`.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::cover::{Cover, PairId};
use crate::predicate::Predicate;

type Candidates = HashMap<Predicate, HashSet<PairId>>;

/// Default step budget.
pub const DEFAULT_MAX_CALLS: u64 = 2500;

pub struct BranchBound {
    calls: i64,
    target: usize,
    costs: HashMap<Predicate, u64>,
    cheapest: Vec<Predicate>,
    cheapest_score: u64,
    original_cover: Candidates,
}

impl BranchBound {
    #[must_use]
    pub fn new(target: usize, max_calls: u64, costs: HashMap<Predicate, u64>) -> Self {
        Self {
            calls: max_calls as i64,
            target,
            costs,
            cheapest: Vec::new(),
            cheapest_score: 0,
            original_cover: HashMap::new(),
        }
    }

    fn cost_of(&self, p: &Predicate) -> u64 {
        self.costs.get(p).copied().unwrap_or(0)
    }

    /// Runs the search to exhaustion or budget, returning the cheapest
    /// predicate tuple found.
    #[instrument(skip(self, cover))]
    pub fn search(&mut self, cover: &Cover) -> Vec<Predicate> {
        let candidates: Candidates = cover.iter().map(|(p, s)| (p.clone(), s.clone())).collect();
        self.original_cover = candidates.clone();
        self.cheapest = candidates.keys().cloned().collect();
        self.cheapest_score = self.cheapest.iter().map(|p| self.cost_of(p)).sum();
        self.recurse(candidates, Vec::new());
        self.cheapest.clone()
    }

    fn covered_by(&self, partial: &[Predicate]) -> HashSet<PairId> {
        let mut out = HashSet::new();
        for p in partial {
            if let Some(cov) = self.original_cover.get(p) {
                out.extend(cov.iter().copied());
            }
        }
        out
    }

    fn recurse(&mut self, candidates: Candidates, partial: Vec<Predicate>) {
        if self.calls <= 0 {
            return;
        }
        self.calls -= 1;

        let covered = self.covered_by(&partial);
        let score: u64 = partial.iter().map(|p| self.cost_of(p)).sum();

        if covered.len() >= self.target && score < self.cheapest_score {
            self.cheapest = partial;
            self.cheapest_score = score;
            return;
        }

        let window = self.cheapest_score.saturating_sub(score);
        let restricted: Candidates =
            candidates.into_iter().filter(|(p, _)| self.cost_of(p) < window).collect();
        if restricted.is_empty() {
            return;
        }

        let reachable_new: HashSet<PairId> = restricted.values().flat_map(|s| s.iter().copied()).collect();
        let reachable = reachable_new.union(&covered).count();
        if reachable < self.target {
            return;
        }

        let Some(best) = self.select_best(&restricted) else { return };
        let best_cover = restricted[&best].clone();

        let mut including = Candidates::new();
        for (p, cov) in &restricted {
            if *p == best {
                continue;
            }
            let diff: HashSet<PairId> = cov.difference(&best_cover).copied().collect();
            if !diff.is_empty() {
                including.insert(p.clone(), diff);
            }
        }
        let mut partial_with_best = partial.clone();
        partial_with_best.push(best.clone());
        self.recurse(including, partial_with_best);

        if self.calls <= 0 {
            return;
        }

        let best_cost = self.cost_of(&best);
        let mut excluding = restricted;
        excluding.remove(&best);
        excluding.retain(|p, cov| !(best_cost <= self.cost_of(p) && best_cover.is_superset(cov)));
        self.recurse(excluding, partial);
    }

    /// `argmax over p of (|candidates[p]|, -p.count)`, ties broken by
    /// predicate `repr` for determinism.
    fn select_best(&self, candidates: &Candidates) -> Option<Predicate> {
        let mut items: Vec<(&Predicate, &HashSet<PairId>)> = candidates.iter().collect();
        items.sort_by(|(p1, c1), (p2, c2)| {
            let k1 = (c1.len(), -(self.cost_of(p1) as i64));
            let k2 = (c2.len(), -(self.cost_of(p2) as i64));
            k1.cmp(&k2).then_with(|| p1.repr().cmp(p2.repr()))
        });
        items.last().map(|(p, _)| (*p).clone())
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::predicate::SimpleKind;

    fn predicate(name: &str) -> Predicate {
        Predicate::simple(SimpleKind::WholeField, name)
    }

    #[test]
    fn test_budget_cutoff_returns_initial_candidates() {
        let mut cover = Cover::new();
        let p = predicate("a");
        let q = predicate("b");
        cover.insert(p.clone(), HashSet::from([0]));
        cover.insert(q.clone(), HashSet::from([1]));
        let costs = HashMap::from([(p.clone(), 1), (q.clone(), 1)]);
        // target requires both pairs covered, which no single predicate
        // achieves; with a 1-call budget the search cannot find it.
        let mut bb = BranchBound::new(2, 1, costs);
        let result = bb.search(&cover);
        let mut names: Vec<&str> = result.iter().map(Predicate::repr).collect();
        names.sort_unstable();
        assert_eq!(names, vec![p.repr(), q.repr()]);
    }

    #[test]
    fn test_finds_minimum_cost_covering_tuple() {
        let mut cover = Cover::new();
        let cheap = predicate("cheap");
        let expensive = predicate("expensive");
        cover.insert(cheap.clone(), HashSet::from([0, 1]));
        cover.insert(expensive.clone(), HashSet::from([0, 1]));
        let costs = HashMap::from([(cheap.clone(), 1), (expensive.clone(), 100)]);
        let mut bb = BranchBound::new(2, DEFAULT_MAX_CALLS, costs);
        let result = bb.search(&cover);
        assert_eq!(result, vec![cheap]);
    }

    #[test]
    fn test_empty_candidates_returns_empty_tuple() {
        let cover = Cover::new();
        let mut bb = BranchBound::new(0, DEFAULT_MAX_CALLS, HashMap::new());
        let result = bb.search(&cover);
        assert!(result.is_empty());
    }
}
