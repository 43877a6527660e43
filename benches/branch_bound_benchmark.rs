// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

use std::collections::{HashMap, HashSet};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use entity_blocker::branch_bound::{BranchBound, DEFAULT_MAX_CALLS};
use entity_blocker::cover::Cover;
use entity_blocker::predicate::{Predicate, SimpleKind};

/// A cover with `n` predicates, each covering a distinct half of the
/// target set plus a little overlap, to give the search real work to
/// do pruning dominated candidates.
fn overlapping_cover(n: usize, target: usize) -> (Cover, HashMap<Predicate, u64>) {
    let mut cover = Cover::new();
    let mut costs = HashMap::new();
    for i in 0..n {
        let predicate = Predicate::simple(SimpleKind::WholeField, format!("field_{i}"));
        let covered: HashSet<usize> = (i..target).step_by(n.max(1)).chain(0..i.min(target)).collect();
        costs.insert(predicate.clone(), (i as u64) + 1);
        cover.insert(predicate, covered);
    }
    (cover, costs)
}

pub fn benchmark_branch_bound_search(c: &mut Criterion) {
    let (cover, costs) = overlapping_cover(12, 100);
    c.bench_function("branch_bound_search", |b| {
        b.iter(|| {
            let mut bb = BranchBound::new(black_box(80), DEFAULT_MAX_CALLS, costs.clone());
            bb.search(black_box(&cover));
        });
    });
}

criterion_group!(benches, benchmark_branch_bound_search);
criterion_main!(benches);
