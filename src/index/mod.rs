// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Per-field inverted structures: `index`, `unindex`,
//! `search`, `doc_to_id`. Two brute-force implementations are provided so
//! the crate runs end to end without a caller-supplied index; neither makes
//! approximation guarantees beyond a plain linear scan.

pub mod levenshtein;
pub mod tfidf;

pub use levenshtein::LevenshteinIndex;
pub use tfidf::TfIdfIndex;

/// A stable id assigned to each distinct indexed document.
pub type DocId = usize;

/// A preprocessed document is always represented as an ordered token list:
/// for TF-IDF/text predicates the tokens are the bag of words (or sorted
/// n-grams, or sorted set elements); for Levenshtein predicates it is a
/// single-element slice holding the normalized string. Keeping one shape
/// for both lets `Fingerprinter` hold either index behind one trait object.
pub trait SimilarityIndex: std::fmt::Debug + Send + Sync {
    /// Inserts `doc` if not already present, returning its stable id.
    fn index(&mut self, doc: &[String]) -> DocId;

    /// Removes `doc` from the index, if present.
    fn unindex(&mut self, doc: &[String]);

    /// The id previously assigned to `doc` by [`SimilarityIndex::index`], if any.
    fn doc_to_id(&self, doc: &[String]) -> Option<DocId>;

    /// Ids of indexed documents within `threshold` similarity of `doc`,
    /// sorted ascending for determinism.
    fn search(&self, doc: &[String], threshold: f64) -> Vec<DocId>;
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn test_doc_id_stable_across_reindex() {
        let mut idx = TfIdfIndex::new();
        let doc = vec!["a".to_string(), "b".to_string()];
        let id1 = idx.index(&doc);
        let id2 = idx.index(&doc);
        assert_eq!(id1, id2);
    }
}
