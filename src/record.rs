// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! The record data model: a field map whose values may be
//! absent, represented distinctly from "present but empty".

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Field names are plain strings; callers are expected to keep them stable
/// across a training session.
pub type FieldName = String;

/// A stable identifier for a record within one training session. A plain
/// integer rather than a time-ordered id, so that sorting record ids
/// before enumerating pairs is deterministic across runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(v: u64) -> Self {
        RecordId(v)
    }
}

/// A single cell value. `Null` is distinct from an empty `Text`/`Set`: a
/// field can be present-but-empty or genuinely absent.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Set(BTreeSet<String>),
    LatLong(f64, f64),
}

impl Value {
    /// Mirrors Python's `if column:` truthiness test used throughout
    /// `dedupe/predicates.py`: zero numbers, empty strings/sets, and
    /// `Null` are all falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Text(s) => !s.is_empty(),
            Value::Integer(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::Set(s) => !s.is_empty(),
            Value::LatLong(lat, lon) => *lat != 0.0 || *lon != 0.0,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_lat_long(&self) -> Option<(f64, f64)> {
        match self {
            Value::LatLong(lat, lon) => Some((*lat, *lon)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Set(s) => write!(f, "{:?}", s),
            Value::LatLong(lat, lon) => write!(f, "[{}, {}]", lat, lon),
        }
    }
}

/// A record is a field map plus a stable id. Missing fields (key never set)
/// are distinguished from fields whose value is `Value::Null`: the former
/// is a schema mismatch (`Error::RecordFieldMissing`), the latter is normal
/// missing data that predicates and the distance model both handle.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: RecordId,
    fields: HashMap<FieldName, Value>,
}

impl Record {
    #[must_use]
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<FieldName>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn set_field(&mut self, field: impl Into<FieldName>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// `None` means the field was never declared on this record at all
    /// (a schema mismatch); `Some(&Value::Null)` means the field is
    /// declared but its value is absent.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Predicate-facing accessor: a field that was never set reads the same
    /// as one explicitly set to `Value::Null`, matching the permissive dict
    /// access `dedupe.predicates` relies on.
    #[must_use]
    pub fn value_or_null(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// `(record, record, label)`: the set of matches a training
/// session accumulates is the sublist with `label == true`.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelledPair {
    pub a: Record,
    pub b: Record,
    pub label: bool,
}

impl LabelledPair {
    #[must_use]
    pub fn new(a: Record, b: Record, label: bool) -> Self {
        Self { a, b, label }
    }
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn test_null_is_falsy() {
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_zero_is_falsy() {
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Real(0.0).is_truthy());
    }

    #[test]
    fn test_empty_text_is_falsy() {
        assert!(!Value::Text(String::new()).is_truthy());
    }

    #[test]
    fn test_nonempty_text_is_truthy() {
        assert!(Value::Text("hello".to_string()).is_truthy());
    }

    #[test]
    fn test_missing_field_distinct_from_null_value() {
        let rec = Record::new(RecordId(1));
        assert_eq!(rec.get("name"), None);
        let rec = rec.with_field("name", Value::Null);
        assert_eq!(rec.get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_value_or_null_treats_missing_as_null() {
        let rec = Record::new(RecordId(1));
        assert_eq!(rec.value_or_null("name"), &Value::Null);
    }
}
