// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Brute-force neighborhood index by normalized edit distance. No BK-tree
//! or other acceleration — a plain linear scan gives exact results with no
//! approximation guarantees to document.

use std::collections::HashMap;

use super::{DocId, SimilarityIndex};

#[derive(Debug, Default)]
pub struct LevenshteinIndex {
    docs: HashMap<Vec<String>, DocId>,
    by_id: Vec<Vec<String>>,
}

impl LevenshteinIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `1 - distance / max(len_a, len_b)`, clamped to `[0, 1]`; identical
    /// empty strings are maximally similar.
    fn similarity(a: &str, b: &str) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let dist = levenshtein_distance(a, b) as f64;
        let norm = a.chars().count().max(b.chars().count()) as f64;
        (1.0 - dist / norm).max(0.0)
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

impl SimilarityIndex for LevenshteinIndex {
    fn index(&mut self, doc: &[String]) -> DocId {
        if let Some(&id) = self.docs.get(doc) {
            return id;
        }
        let id = self.by_id.len();
        self.by_id.push(doc.to_vec());
        self.docs.insert(doc.to_vec(), id);
        id
    }

    fn unindex(&mut self, doc: &[String]) {
        self.docs.remove(doc);
    }

    fn doc_to_id(&self, doc: &[String]) -> Option<DocId> {
        self.docs.get(doc).copied()
    }

    fn search(&self, doc: &[String], threshold: f64) -> Vec<DocId> {
        let query = doc.join(" ");
        let mut matches: Vec<DocId> = self
            .docs
            .values()
            .copied()
            .filter(|&id| Self::similarity(&query, &self.by_id[id].join(" ")) >= threshold)
            .collect();
        matches.sort_unstable();
        matches
    }
}

#[cfg(test)]
mod should {
    use super::*;

    fn doc(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn test_identical_strings_match_at_any_threshold() {
        let mut idx = LevenshteinIndex::new();
        idx.index(&doc("john smith"));
        assert!(!idx.search(&doc("john smith"), 1.0).is_empty());
    }

    #[test]
    fn test_close_strings_match_at_relaxed_threshold() {
        let mut idx = LevenshteinIndex::new();
        idx.index(&doc("john smith"));
        assert!(!idx.search(&doc("jon smith"), 0.8).is_empty());
    }

    #[test]
    fn test_unrelated_strings_do_not_match() {
        let mut idx = LevenshteinIndex::new();
        idx.index(&doc("john smith"));
        assert!(idx.search(&doc("zzz yyy xxx"), 0.9).is_empty());
    }
}
