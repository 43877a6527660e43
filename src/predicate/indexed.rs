// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Document preprocessors for the indexed predicate families: a
//! preprocessed doc (tokens / raw set / sorted 2-grams) for TF-IDF, and a
//! normalized string for Levenshtein. These run before a doc is handed
//! to a [`crate::index::SimilarityIndex`], so the index itself never sees
//! raw field text.

use std::collections::BTreeSet;

use super::simple::{normalize_whitespace, strip_punc};
use crate::record::Value;

/// TF-IDF-over-text doc: whitespace tokens of the normalized field string.
#[must_use]
pub fn tfidf_text_doc(value: &Value) -> Vec<String> {
    let text = normalize_whitespace(&value.to_string());
    text.split_whitespace().map(str::to_string).collect()
}

/// TF-IDF-over-set doc: the set elements themselves, order-independent.
#[must_use]
pub fn tfidf_set_doc(value: &Value) -> Vec<String> {
    value.as_set().map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

/// TF-IDF-over-ngram doc: sorted 2-grams over the space-stripped string.
#[must_use]
pub fn tfidf_ngram_doc(value: &Value) -> Vec<String> {
    let stripped: String = value.to_string().chars().filter(|c| !c.is_whitespace()).collect();
    let chars: Vec<char> = stripped.chars().collect();
    let grams: BTreeSet<String> = if chars.len() < 2 {
        BTreeSet::new()
    } else {
        (0..=chars.len() - 2).map(|i| chars[i..i + 2].iter().collect()).collect()
    };
    grams.into_iter().collect()
}

/// Levenshtein doc: a single-element doc holding the normalized string
/// (punctuation stripped, whitespace collapsed, lowercased).
#[must_use]
pub fn levenshtein_doc(value: &Value) -> Vec<String> {
    vec![strip_punc(&value.to_string()).split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()]
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn test_tfidf_text_doc_tokenizes() {
        let v = Value::Text("John   Smith".to_string());
        assert_eq!(tfidf_text_doc(&v), vec!["John".to_string(), "Smith".to_string()]);
    }

    #[test]
    fn test_levenshtein_doc_normalizes_case_and_punctuation() {
        let v = Value::Text("John, Smith!".to_string());
        assert_eq!(levenshtein_doc(&v), vec!["john smith".to_string()]);
    }
}
