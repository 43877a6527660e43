// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `Fingerprinter`: applies a collection of predicates to a
//! record, yielding block keys. Owns one [`SimilarityIndex`] per `(field,
//! index kind)` and the per-predicate canopy assignment state.

use std::collections::HashMap;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::index::{DocId, LevenshteinIndex, SimilarityIndex, TfIdfIndex};
use crate::predicate::{indexed, BlockKeys, FieldSpec, Predicate, PredicateKind, SimilarityFamily, SimilarityRole};
use crate::record::{Record, RecordId, Value};

type IndexKey = (String, SimilarityFamily);

fn preprocess(family: SimilarityFamily, value: &Value) -> Vec<String> {
    match family {
        SimilarityFamily::TfidfText => indexed::tfidf_text_doc(value),
        SimilarityFamily::TfidfSet => indexed::tfidf_set_doc(value),
        SimilarityFamily::TfidfNGram => indexed::tfidf_ngram_doc(value),
        SimilarityFamily::Levenshtein => indexed::levenshtein_doc(value),
    }
}

fn new_index(family: SimilarityFamily) -> Box<dyn SimilarityIndex> {
    match family {
        SimilarityFamily::Levenshtein => Box::new(LevenshteinIndex::new()),
        SimilarityFamily::TfidfText | SimilarityFamily::TfidfSet | SimilarityFamily::TfidfNGram => {
            Box::new(TfIdfIndex::new())
        }
    }
}

#[derive(Debug, Default)]
pub struct Fingerprinter {
    indexes: HashMap<IndexKey, Box<dyn SimilarityIndex>>,
    /// predicate repr -> (doc_id -> sticky canopy center, `None` if the doc
    /// was queried and found no neighbors).
    canopy: HashMap<String, HashMap<DocId, Option<DocId>>>,
    cache: HashMap<(String, RecordId, bool), BlockKeys>,
}

impl Fingerprinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every distinct value any indexed predicate in `predicates`
    /// would read from `records`, across the whole given predicate
    /// collection including compound components.
    #[instrument(skip(self, predicates, records))]
    pub fn index_all<'r>(&mut self, predicates: &[Predicate], records: impl IntoIterator<Item = &'r Record>) {
        let records: Vec<&Record> = records.into_iter().collect();
        for predicate in predicates {
            self.register_indexes_for(predicate, &records);
        }
    }

    fn register_indexes_for(&mut self, predicate: &Predicate, records: &[&Record]) {
        match predicate.kind() {
            PredicateKind::Compound => {
                for component in predicate.components() {
                    self.register_indexes_for(component, records);
                }
            }
            PredicateKind::Indexed { family, .. } => {
                self.register_one_indexed_family(predicate.field(), *family, records);
            }
            _ => {}
        }
    }

    fn register_one_indexed_family(&mut self, field: &FieldSpec, family: SimilarityFamily, records: &[&Record]) {
        let FieldSpec::Single(field_name) = field else { return };
        let key = (field_name.clone(), family);
        let index = self.indexes.entry(key).or_insert_with(|| new_index(family));
        for record in records {
            let value = record.value_or_null(field_name);
            if value.is_truthy() {
                let doc = preprocess(family, value);
                index.index(&doc);
            }
        }
    }

    /// Precomputes and caches `apply` output for every predicate over both
    /// sides of a record-link training pair collection. For dedupe, pass
    /// the same slice as both sides.
    #[instrument(skip(self, predicates, side_a, side_b))]
    pub fn freeze(&mut self, predicates: &[Predicate], side_a: &[&Record], side_b: &[&Record]) -> Result<()> {
        for predicate in predicates {
            for record in side_a {
                self.apply(predicate, record, true)?;
            }
            for record in side_b {
                self.apply(predicate, record, false)?;
            }
        }
        Ok(())
    }

    /// Applies `predicate` to `record`. `target` distinguishes the index
    /// side (`true`) from the query side (`false`) for record-link search
    /// predicates; dedupe callers may pass either consistently
    /// since both sides share one population.
    ///
    /// # Errors
    /// `Error::NotIndexed` if an indexed predicate is applied to a value
    /// never passed to [`Fingerprinter::index_all`].
    #[instrument(skip(self, record))]
    pub fn apply(&mut self, predicate: &Predicate, record: &Record, target: bool) -> Result<BlockKeys> {
        let cache_key = (predicate.repr().to_string(), record.id, target);
        if let Some(keys) = self.cache.get(&cache_key) {
            return Ok(keys.clone());
        }
        let keys = self.apply_uncached(predicate, record, target)?;
        self.cache.insert(cache_key, keys.clone());
        Ok(keys)
    }

    fn apply_uncached(&mut self, predicate: &Predicate, record: &Record, target: bool) -> Result<BlockKeys> {
        match predicate.kind() {
            PredicateKind::Compound => {
                let mut component_keys = Vec::with_capacity(predicate.components().len());
                for component in predicate.components() {
                    component_keys.push(self.apply(component, record, target)?);
                }
                Ok(Predicate::join_component_keys(&component_keys))
            }
            PredicateKind::Indexed { family, role } => {
                self.apply_indexed(predicate, *family, *role, record, target)
            }
            _ => Ok(predicate.apply_leaf(record)),
        }
    }

    fn apply_indexed(
        &mut self,
        predicate: &Predicate,
        family: SimilarityFamily,
        role: SimilarityRole,
        record: &Record,
        target: bool,
    ) -> Result<BlockKeys> {
        let FieldSpec::Single(field) = predicate.field() else {
            unreachable!("indexed predicates are always single-field")
        };
        let value = record.value_or_null(field);
        if !value.is_truthy() {
            return Ok(BlockKeys::new());
        }
        let doc = preprocess(family, value);
        let threshold = predicate.threshold().expect("indexed predicate carries a threshold");
        let index_key = (field.clone(), family);
        let not_indexed = || Error::NotIndexed { predicate: predicate.repr().to_string() };
        let doc_id = {
            let index = self.indexes.get(&index_key).ok_or_else(not_indexed)?;
            index.doc_to_id(&doc).ok_or_else(not_indexed)?
        };

        match role {
            SimilarityRole::Search => {
                if target {
                    Ok(BlockKeys::from([doc_id.to_string()]))
                } else {
                    let index = self.indexes.get(&index_key).expect("checked above");
                    Ok(index.search(&doc, threshold).into_iter().map(|id| id.to_string()).collect())
                }
            }
            SimilarityRole::Canopy => self.apply_canopy(predicate.repr(), &index_key, &doc, doc_id, threshold),
        }
    }

    /// Canopy call semantics: sticky assignment, first-writer-wins for
    /// members discovered along the way.
    fn apply_canopy(
        &mut self,
        predicate_repr: &str,
        index_key: &IndexKey,
        doc: &[String],
        doc_id: DocId,
        threshold: f64,
    ) -> Result<BlockKeys> {
        if let Some(center) = self.canopy.get(predicate_repr).and_then(|m| m.get(&doc_id)).copied() {
            return Ok(center.map_or_else(BlockKeys::new, |c| BlockKeys::from([c.to_string()])));
        }
        let members = {
            let index = self.indexes.get(index_key).expect("indexed in apply_indexed");
            index.search(doc, threshold)
        };
        let state = self.canopy.entry(predicate_repr.to_string()).or_default();
        for member in &members {
            state.entry(*member).or_insert(Some(doc_id));
        }
        if members.is_empty() {
            state.insert(doc_id, None);
            Ok(BlockKeys::new())
        } else {
            state.insert(doc_id, Some(doc_id));
            Ok(BlockKeys::from([doc_id.to_string()]))
        }
    }
}
