// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Brute-force inverted index + cosine similarity over TF-IDF term
//! weights. No approximation: every candidate sharing at least one term
//! with the query is scored exactly.

use std::collections::{HashMap, HashSet};

use super::{DocId, SimilarityIndex};

#[derive(Debug, Default)]
pub struct TfIdfIndex {
    docs: HashMap<Vec<String>, DocId>,
    by_id: Vec<Vec<String>>,
    postings: HashMap<String, HashSet<DocId>>,
    doc_freq: HashMap<String, usize>,
}

impl TfIdfIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn term_freq(doc: &[String]) -> HashMap<&str, f64> {
        let mut tf: HashMap<&str, f64> = HashMap::new();
        for term in doc {
            *tf.entry(term.as_str()).or_insert(0.0) += 1.0;
        }
        tf
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.by_id.len().max(1) as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        ((n / (1.0 + df)) + 1.0).ln()
    }

    fn vector(&self, doc: &[String]) -> HashMap<String, f64> {
        let tf = Self::term_freq(doc);
        let mut vec: HashMap<String, f64> = tf
            .into_iter()
            .map(|(term, freq)| (term.to_string(), freq * self.idf(term)))
            .collect();
        let norm = vec.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for w in vec.values_mut() {
                *w /= norm;
            }
        }
        vec
    }

    fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
        let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        smaller.iter().map(|(term, w)| w * larger.get(term).unwrap_or(&0.0)).sum()
    }

    fn candidates(&self, doc: &[String]) -> HashSet<DocId> {
        let mut out = HashSet::new();
        for term in doc {
            if let Some(ids) = self.postings.get(term) {
                out.extend(ids.iter().copied());
            }
        }
        out
    }
}

impl SimilarityIndex for TfIdfIndex {
    fn index(&mut self, doc: &[String]) -> DocId {
        if let Some(&id) = self.docs.get(doc) {
            return id;
        }
        let id = self.by_id.len();
        self.by_id.push(doc.to_vec());
        self.docs.insert(doc.to_vec(), id);
        for term in doc.iter().collect::<HashSet<_>>() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            self.postings.entry(term.clone()).or_default().insert(id);
        }
        id
    }

    fn unindex(&mut self, doc: &[String]) {
        let Some(id) = self.docs.remove(doc) else { return };
        for term in doc.iter().collect::<HashSet<_>>() {
            if let Some(ids) = self.postings.get_mut(term) {
                ids.remove(&id);
            }
            if let Some(df) = self.doc_freq.get_mut(term) {
                *df = df.saturating_sub(1);
            }
        }
    }

    fn doc_to_id(&self, doc: &[String]) -> Option<DocId> {
        self.docs.get(doc).copied()
    }

    fn search(&self, doc: &[String], threshold: f64) -> Vec<DocId> {
        let query_vec = self.vector(doc);
        let mut matches: Vec<DocId> = self
            .candidates(doc)
            .into_iter()
            .filter(|&id| {
                let candidate_vec = self.vector(&self.by_id[id]);
                Self::cosine(&query_vec, &candidate_vec) >= threshold
            })
            .collect();
        matches.sort_unstable();
        matches
    }
}
