// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! The predicate algebra: a `Predicate` is a value, not a
//! class hierarchy — two orthogonal tags
//! (`similarity_kind`, `role`) plus a preprocessor dispatch stand in for the
//! source's `Tfidf x {Text,Set,NGram} x {Canopy,Search}` multiple
//! inheritance.

pub mod indexed;
pub mod set_valued;
pub mod simple;

use std::collections::BTreeSet;
use std::fmt;

use crate::record::{Record, Value};

/// A predicate's output: the finite set of block keys a record produces.
/// Empty means the record does not block under this predicate.
pub type BlockKeys = BTreeSet<String>;

/// Which field(s) a predicate reads. Compound predicates report every
/// field read by their components, preserving component order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldSpec {
    Single(String),
    Tuple(Vec<String>),
}

impl FieldSpec {
    fn fields(&self) -> Vec<&str> {
        match self {
            FieldSpec::Single(f) => vec![f.as_str()],
            FieldSpec::Tuple(fs) => fs.iter().map(String::as_str).collect(),
        }
    }

    fn shares_any(&self, other: &FieldSpec) -> bool {
        let mine = self.fields();
        let theirs = other.fields();
        mine.iter().any(|f| theirs.contains(f))
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Single(name) => write!(f, "{name}"),
            FieldSpec::Tuple(names) => write!(f, "({})", names.join(", ")),
        }
    }
}

/// The concrete simple-predicate kinds, excluding the set-valued and
/// `Exists` kinds, which get their own enums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimpleKind {
    WholeField,
    Token,
    FirstToken,
    CommonInteger,
    AlphaNumeric,
    NearInteger,
    HundredInteger,
    HundredIntegerOdd,
    FirstInteger,
    TwoTokens,
    ThreeTokens,
    Fingerprint,
    OneGramFingerprint,
    TwoGramFingerprint,
    FourGram,
    SixGram,
    SameThreeCharStart,
    SameFiveCharStart,
    SameSevenCharStart,
    SuffixArray,
    SortedAcronym,
    DoubleMetaphone,
    MetaphoneToken,
    SortedCharTwoGram,
    SortedCharThreeGram,
    LatLongGrid,
    OrderOfMagnitude,
    RoundTo1,
}

impl SimpleKind {
    fn name(self) -> &'static str {
        match self {
            SimpleKind::WholeField => "wholeField",
            SimpleKind::Token => "token",
            SimpleKind::FirstToken => "firstToken",
            SimpleKind::CommonInteger => "commonInteger",
            SimpleKind::AlphaNumeric => "alphaNumeric",
            SimpleKind::NearInteger => "nearInteger",
            SimpleKind::HundredInteger => "hundredInteger",
            SimpleKind::HundredIntegerOdd => "hundredIntegerOdd",
            SimpleKind::FirstInteger => "firstInteger",
            SimpleKind::TwoTokens => "twoTokens",
            SimpleKind::ThreeTokens => "threeTokens",
            SimpleKind::Fingerprint => "fingerprint",
            SimpleKind::OneGramFingerprint => "oneGramFingerprint",
            SimpleKind::TwoGramFingerprint => "twoGramFingerprint",
            SimpleKind::FourGram => "fourGram",
            SimpleKind::SixGram => "sixGram",
            SimpleKind::SameThreeCharStart => "sameThreeCharStart",
            SimpleKind::SameFiveCharStart => "sameFiveCharStart",
            SimpleKind::SameSevenCharStart => "sameSevenCharStart",
            SimpleKind::SuffixArray => "suffixArray",
            SimpleKind::SortedAcronym => "sortedAcronym",
            SimpleKind::DoubleMetaphone => "doubleMetaphone",
            SimpleKind::MetaphoneToken => "metaphoneToken",
            SimpleKind::SortedCharTwoGram => "sortedCharTwoGram",
            SimpleKind::SortedCharThreeGram => "sortedCharThreeGram",
            SimpleKind::LatLongGrid => "latLongGrid",
            SimpleKind::OrderOfMagnitude => "orderOfMagnitude",
            SimpleKind::RoundTo1 => "roundTo1",
        }
    }

    /// Does this kind read a text field (vs. numeric/lat-long)?
    fn is_textual(self) -> bool {
        !matches!(
            self,
            SimpleKind::LatLongGrid | SimpleKind::OrderOfMagnitude | SimpleKind::RoundTo1
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetKind {
    Whole,
    First,
    Last,
    CardinalityMagnitude,
    EachElement,
}

impl SetKind {
    fn name(self) -> &'static str {
        match self {
            SetKind::Whole => "wholeSet",
            SetKind::First => "firstSetElement",
            SetKind::Last => "lastSetElement",
            SetKind::CardinalityMagnitude => "magnitudeOfCardinality",
            SetKind::EachElement => "commonSetElement",
        }
    }
}

/// The TF-IDF family's document shape: text (tokens), a bare set, or sorted
/// 2-grams. Search/Canopy orthogonally selects the role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimilarityFamily {
    TfidfText,
    TfidfSet,
    TfidfNGram,
    Levenshtein,
}

impl SimilarityFamily {
    fn name(self) -> &'static str {
        match self {
            SimilarityFamily::TfidfText => "TfidfText",
            SimilarityFamily::TfidfSet => "TfidfSet",
            SimilarityFamily::TfidfNGram => "TfidfNGram",
            SimilarityFamily::Levenshtein => "Levenshtein",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimilarityRole {
    Canopy,
    Search,
}

impl SimilarityRole {
    fn name(self) -> &'static str {
        match self {
            SimilarityRole::Canopy => "Canopy",
            SimilarityRole::Search => "Search",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PredicateKind {
    Simple(SimpleKind),
    /// Same `SimpleKind` dispatch, but the field value is normalized
    /// (punctuation stripped, whitespace collapsed) before the transform
    /// runs.
    StringNormalized(SimpleKind),
    SetValued(SetKind),
    Exists,
    Indexed {
        family: SimilarityFamily,
        role: SimilarityRole,
    },
    Compound,
}

/// A predicate: a pure `(record, target) -> block keys` function plus its
/// field binding, `compounds_with` governance, and stable string identity.
/// Identity, equality and hashing all go through `repr`.
#[derive(Clone, Debug)]
pub struct Predicate {
    kind: PredicateKind,
    field: FieldSpec,
    threshold: Option<f64>,
    compounds_with_same_field: bool,
    components: Vec<Predicate>,
    repr: String,
}

impl Predicate {
    #[must_use]
    pub fn simple(kind: SimpleKind, field: impl Into<String>) -> Self {
        let field = field.into();
        let repr = format!("({}, {})", kind.name(), field);
        Self { kind: PredicateKind::Simple(kind), field: FieldSpec::Single(field), threshold: None, compounds_with_same_field: true, components: Vec::new(), repr }
    }

    #[must_use]
    pub fn string_normalized(kind: SimpleKind, field: impl Into<String>, compounds_with_same_field: bool) -> Self {
        let field = field.into();
        let repr = format!("(String{}, {})", kind.name(), field);
        Self {
            kind: PredicateKind::StringNormalized(kind),
            field: FieldSpec::Single(field),
            threshold: None,
            compounds_with_same_field,
            components: Vec::new(),
            repr,
        }
    }

    #[must_use]
    pub fn set_valued(kind: SetKind, field: impl Into<String>) -> Self {
        let field = field.into();
        let repr = format!("({}, {})", kind.name(), field);
        Self { kind: PredicateKind::SetValued(kind), field: FieldSpec::Single(field), threshold: None, compounds_with_same_field: true, components: Vec::new(), repr }
    }

    #[must_use]
    pub fn exists(field: impl Into<String>) -> Self {
        let field = field.into();
        let repr = format!("(Exists, {})", field);
        Self { kind: PredicateKind::Exists, field: FieldSpec::Single(field), threshold: None, compounds_with_same_field: false, components: Vec::new(), repr }
    }

    /// # Errors
    /// Returns `Error::InvalidThreshold` when `threshold` is outside `(0, 1]`.
    pub fn indexed(
        family: SimilarityFamily,
        role: SimilarityRole,
        field: impl Into<String>,
        threshold: f64,
    ) -> crate::error::Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(crate::error::Error::InvalidThreshold(threshold));
        }
        let field = field.into();
        let repr = format!("({}{}: {}, {})", family.name(), role.name(), threshold, field);
        Ok(Self {
            kind: PredicateKind::Indexed { family, role },
            field: FieldSpec::Single(field),
            threshold: Some(threshold),
            compounds_with_same_field: false,
            components: Vec::new(),
            repr,
        })
    }

    /// Builds a conjunctive predicate from `components`, sorted by `repr`
    /// for determinism.
    ///
    /// # Errors
    /// Returns `crate::error::Error::InvalidFieldSpec` if fewer than two
    /// components are given, or any pair of components fails
    /// `compounds_with`.
    pub fn compound(mut components: Vec<Predicate>) -> crate::error::Result<Self> {
        if components.len() < 2 {
            return Err(crate::error::Error::InvalidFieldSpec(
                "compound predicate needs at least two components".to_string(),
            ));
        }
        components.sort_by(|a, b| a.repr.cmp(&b.repr));
        for i in 0..components.len() {
            for j in (i + 1)..components.len() {
                if !components[i].compounds_with(&components[j]) {
                    return Err(crate::error::Error::InvalidFieldSpec(format!(
                        "{} does not compound with {}",
                        components[i].repr, components[j].repr
                    )));
                }
            }
        }
        let fields = components.iter().flat_map(|c| c.field.fields()).map(str::to_string).collect();
        let repr = components.iter().map(|c| c.repr.as_str()).collect::<Vec<_>>().join(" & ");
        Ok(Self {
            kind: PredicateKind::Compound,
            field: FieldSpec::Tuple(fields),
            threshold: None,
            compounds_with_same_field: false,
            components,
            repr,
        })
    }

    #[must_use]
    pub fn repr(&self) -> &str {
        &self.repr
    }

    #[must_use]
    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    #[must_use]
    pub fn field(&self) -> &FieldSpec {
        &self.field
    }

    #[must_use]
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    #[must_use]
    pub fn components(&self) -> &[Predicate] {
        &self.components
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        match &self.kind {
            PredicateKind::Indexed { .. } => true,
            PredicateKind::Compound => self.components.iter().any(Predicate::is_indexed),
            _ => false,
        }
    }

    /// `compounds_with` rules: `Exists` and index predicates never
    /// compound with another predicate on the same field; two index
    /// predicates of identical concrete kind (family + role) on the same
    /// field never compound; `StringPredicate` respects the callee's
    /// `compounds_with_same_field` flag. Otherwise `true`.
    #[must_use]
    pub fn compounds_with(&self, other: &Predicate) -> bool {
        if !self.field.shares_any(&other.field) {
            return true;
        }
        if matches!(self.kind, PredicateKind::Exists) || matches!(other.kind, PredicateKind::Exists) {
            return false;
        }
        if let (PredicateKind::Indexed { family: f1, role: r1 }, PredicateKind::Indexed { family: f2, role: r2 }) =
            (&self.kind, &other.kind)
        {
            if f1 == f2 && r1 == r2 {
                return false;
            }
        }
        if matches!(self.kind, PredicateKind::Indexed { .. }) || matches!(other.kind, PredicateKind::Indexed { .. }) {
            return false;
        }
        self.compounds_with_same_field && other.compounds_with_same_field
    }

    /// Applies a non-indexed leaf predicate to `record`. Indexed leaves and
    /// compounds containing one must go through
    /// [`crate::fingerprinter::Fingerprinter::apply`] instead, since their
    /// output depends on mutable index/canopy state.
    #[must_use]
    pub fn apply_leaf(&self, record: &Record) -> BlockKeys {
        if matches!(self.kind, PredicateKind::Compound) {
            let component_keys: Vec<BlockKeys> =
                self.components.iter().map(|c| c.apply_leaf(record)).collect();
            return Self::join_component_keys(&component_keys);
        }
        let field = match &self.field {
            FieldSpec::Single(f) => f.as_str(),
            FieldSpec::Tuple(_) => return BlockKeys::new(),
        };
        let value = record.value_or_null(field);
        match &self.kind {
            PredicateKind::Exists => BlockKeys::from([if value.is_truthy() { "1" } else { "0" }.to_string()]),
            PredicateKind::SetValued(kind) => {
                let Some(set) = value.as_set() else { return BlockKeys::new() };
                match kind {
                    SetKind::Whole => set_valued::whole_set(set),
                    SetKind::First => set_valued::first_set_element(set),
                    SetKind::Last => set_valued::last_set_element(set),
                    SetKind::CardinalityMagnitude => set_valued::magnitude_of_cardinality(set),
                    SetKind::EachElement => set_valued::common_set_element(set),
                }
            }
            PredicateKind::Simple(kind) => self.apply_simple(*kind, value, false),
            PredicateKind::StringNormalized(kind) => self.apply_simple(*kind, value, true),
            PredicateKind::Indexed { .. } | PredicateKind::Compound => BlockKeys::new(),
        }
    }

    /// Cartesian-joins the per-record key sets of every component — this is
    /// the `apply` of a compound predicate: two records share a joined key
    /// iff they share a key under every component. Components that are
    /// themselves indexed must be resolved by
    /// [`crate::fingerprinter::Fingerprinter`] first and passed in here as
    /// `component_keys`.
    #[must_use]
    pub fn join_component_keys(component_keys: &[BlockKeys]) -> BlockKeys {
        let mut joined: Vec<String> = vec![String::new()];
        for keys in component_keys {
            if keys.is_empty() {
                return BlockKeys::new();
            }
            let mut next = Vec::with_capacity(joined.len() * keys.len());
            for prefix in &joined {
                for key in keys {
                    let combined =
                        if prefix.is_empty() { key.clone() } else { format!("{prefix}:{key}") };
                    next.push(combined);
                }
            }
            joined = next;
        }
        joined.into_iter().collect()
    }

    fn apply_simple(&self, kind: SimpleKind, value: &Value, normalize: bool) -> BlockKeys {
        if matches!(kind, SimpleKind::LatLongGrid) {
            return value.as_lat_long().map_or_else(BlockKeys::new, |(lat, lon)| simple::lat_long_grid(lat, lon, 1));
        }
        if matches!(kind, SimpleKind::OrderOfMagnitude | SimpleKind::RoundTo1) {
            return value.as_real().map_or_else(BlockKeys::new, |n| match kind {
                SimpleKind::OrderOfMagnitude => simple::order_of_magnitude(n),
                SimpleKind::RoundTo1 => simple::round_to_1(n),
                _ => unreachable!(),
            });
        }
        if !value.is_truthy() {
            return BlockKeys::new();
        }
        let text = value.to_string();
        let text = if normalize { simple::normalize_whitespace(&text) } else { text };
        match kind {
            SimpleKind::WholeField => simple::whole_field(&text),
            SimpleKind::Token => simple::token(&text),
            SimpleKind::FirstToken => simple::first_token(&text),
            SimpleKind::CommonInteger => simple::common_integer(&text),
            SimpleKind::AlphaNumeric => simple::alpha_numeric(&text),
            SimpleKind::NearInteger => simple::near_integer(&text),
            SimpleKind::HundredInteger => simple::hundred_integer(&text),
            SimpleKind::HundredIntegerOdd => simple::hundred_integer_odd(&text),
            SimpleKind::FirstInteger => simple::first_integer(&text),
            SimpleKind::TwoTokens => simple::two_tokens(&text),
            SimpleKind::ThreeTokens => simple::three_tokens(&text),
            SimpleKind::Fingerprint => simple::fingerprint(&text),
            SimpleKind::OneGramFingerprint => simple::one_gram_fingerprint(&text),
            SimpleKind::TwoGramFingerprint => simple::two_gram_fingerprint(&text),
            SimpleKind::FourGram => simple::common_four_gram(&text),
            SimpleKind::SixGram => simple::common_six_gram(&text),
            SimpleKind::SameThreeCharStart => simple::same_three_char_start(&text),
            SimpleKind::SameFiveCharStart => simple::same_five_char_start(&text),
            SimpleKind::SameSevenCharStart => simple::same_seven_char_start(&text),
            SimpleKind::SuffixArray => simple::suffix_array(&text),
            SimpleKind::SortedAcronym => simple::sorted_acronym(&text),
            SimpleKind::DoubleMetaphone => simple::double_metaphone(&text),
            SimpleKind::MetaphoneToken => simple::metaphone_token(&text),
            SimpleKind::SortedCharTwoGram => simple::sorted_char_two_gram(&text),
            SimpleKind::SortedCharThreeGram => simple::sorted_char_three_gram(&text),
            SimpleKind::LatLongGrid | SimpleKind::OrderOfMagnitude | SimpleKind::RoundTo1 => unreachable!(),
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}
impl Eq for Predicate {}

impl std::hash::Hash for Predicate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
    }
}

impl PartialOrd for Predicate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Predicate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.repr.cmp(&other.repr)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr)
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::record::RecordId;
    use proptest::prelude::*;

    prop_compose! {
        fn gen_record()(name in "[a-z]{1,12}( [a-z]{1,12}){0,2}") -> Record {
            Record::new(RecordId(1)).with_field("name", Value::Text(name))
        }
    }

    proptest! {
        #[test]
        fn test_predicate_purity(record in gen_record()) {
            // Spec invariant: repeated calls against a frozen (non-indexed)
            // predicate must return equal sets for the same record.
            let predicates = [
                Predicate::simple(SimpleKind::WholeField, "name"),
                Predicate::simple(SimpleKind::Token, "name"),
                Predicate::simple(SimpleKind::Fingerprint, "name"),
            ];
            for p in &predicates {
                let first = p.apply_leaf(&record);
                let second = p.apply_leaf(&record);
                prop_assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_equality_by_representation() {
        let a = Predicate::simple(SimpleKind::WholeField, "name");
        let b = Predicate::simple(SimpleKind::WholeField, "name");
        assert_eq!(a, b);
        let c = Predicate::simple(SimpleKind::WholeField, "other");
        assert_ne!(a, c);
    }

    #[test]
    fn test_exists_never_compounds_same_field() {
        let a = Predicate::exists("name");
        let b = Predicate::simple(SimpleKind::Token, "name");
        assert!(!a.compounds_with(&b));
    }

    #[test]
    fn test_exists_compounds_different_field() {
        let a = Predicate::exists("name");
        let b = Predicate::simple(SimpleKind::Token, "address");
        assert!(a.compounds_with(&b));
    }

    #[test]
    fn test_identical_indexed_kind_same_field_never_compounds() {
        let a = Predicate::indexed(SimilarityFamily::TfidfText, SimilarityRole::Canopy, "name", 0.5).unwrap();
        let b = Predicate::indexed(SimilarityFamily::TfidfText, SimilarityRole::Canopy, "name", 0.8).unwrap();
        assert!(!a.compounds_with(&b));
    }

    #[test]
    fn test_compound_apply_is_cartesian_join() {
        let p1 = Predicate::simple(SimpleKind::FirstToken, "first");
        let p2 = Predicate::simple(SimpleKind::SameThreeCharStart, "last");
        let compound = Predicate::compound(vec![p1, p2]).unwrap();
        let rec = Record::new(RecordId(1))
            .with_field("first", Value::Text("john".to_string()))
            .with_field("last", Value::Text("smith".to_string()));
        let keys = compound.apply_leaf(&rec);
        assert_eq!(keys, BlockKeys::from(["john:smi".to_string()]));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = Predicate::indexed(SimilarityFamily::TfidfText, SimilarityRole::Canopy, "name", 1.5);
        assert!(err.is_err());
    }
}
