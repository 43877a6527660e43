// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use entity_blocker::fingerprinter::Fingerprinter;
use entity_blocker::predicate::{Predicate, SimilarityFamily, SimilarityRole, SimpleKind};
use entity_blocker::record::{Record, RecordId, Value};

fn sample_records(n: u64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new(RecordId(i))
                .with_field("name", Value::Text(format!("john smith the {i}th")))
                .with_field("city", Value::Text("springfield".to_string()))
        })
        .collect()
}

pub fn benchmark_simple_predicate(c: &mut Criterion) {
    let records = sample_records(1_000);
    let predicate = Predicate::simple(SimpleKind::WholeField, "name");
    let mut fp = Fingerprinter::new();
    c.bench_function("simple_predicate_apply", |b| {
        b.iter(|| {
            for record in &records {
                fp.apply(black_box(&predicate), black_box(record), false).unwrap();
            }
        });
    });
}

pub fn benchmark_indexed_predicate(c: &mut Criterion) {
    let records = sample_records(500);
    let predicate = Predicate::indexed(SimilarityFamily::TfidfText, SimilarityRole::Canopy, "name", 0.5).unwrap();
    let mut fp = Fingerprinter::new();
    fp.index_all(std::slice::from_ref(&predicate), records.iter());
    c.bench_function("canopy_predicate_apply", |b| {
        b.iter(|| {
            for record in &records {
                fp.apply(black_box(&predicate), black_box(record), false).unwrap();
            }
        });
    });
}

pub fn benchmark_compound_predicate(c: &mut Criterion) {
    let records = sample_records(500);
    let compound =
        Predicate::compound(vec![Predicate::simple(SimpleKind::FirstToken, "name"), Predicate::simple(SimpleKind::WholeField, "city")])
            .unwrap();
    let mut fp = Fingerprinter::new();
    c.bench_function("compound_predicate_apply", |b| {
        b.iter(|| {
            for record in &records {
                fp.apply(black_box(&compound), black_box(record), false).unwrap();
            }
        });
    });
}

criterion_group!(benches, benchmark_simple_predicate, benchmark_indexed_predicate, benchmark_compound_predicate);
criterion_main!(benches);
