// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! `DistanceModel`: per-pair distance vectors for the regression
//! sub-learner. The field-type catalog is treated as an external,
//! swappable collaborator — this module defines the `FieldType` interface
//! the core needs plus a small built-in catalog sufficient to exercise the
//! crate end to end.

use std::collections::HashMap;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::predicate::{Predicate, SetKind, SimpleKind};
use crate::record::{Record, Value};

/// A resolved field-type variable: one column of the distance matrix.
/// Mirrors `distances.py`'s `FIELD_CLASSES` members — `compare` is the
/// per-field comparator, `weight`/`has_missing` are the knobs
/// `DistanceModel` threads through, and `predicates` grounds the field in
/// the blocking predicate algebra for non-indexed candidate sampling.
pub trait FieldType: std::fmt::Debug + Send + Sync {
    fn field(&self) -> &str;
    fn variable_name(&self) -> &str {
        self.field()
    }
    fn weight(&self) -> f64 {
        1.0
    }
    fn has_missing(&self) -> bool {
        false
    }
    fn compare(&self, a: &Value, b: &Value) -> f64;
    /// Whether `compare` itself handles missing values. Built-ins are never missing-aware.
    fn handles_missing(&self) -> bool {
        false
    }
    fn is_missing(&self, v: &Value) -> bool {
        !v.is_truthy()
    }
    /// Non-indexed predicates grounding this field type in the blocking
    /// algebra, used for the active learner's initial candidate sampling
    ///.
    fn predicates(&self) -> Vec<Predicate> {
        Vec::new()
    }
}

#[derive(Debug)]
pub struct ExactType {
    pub field: String,
    pub weight: f64,
    pub has_missing: bool,
}

impl FieldType for ExactType {
    fn field(&self) -> &str {
        &self.field
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn has_missing(&self) -> bool {
        self.has_missing
    }
    fn compare(&self, a: &Value, b: &Value) -> f64 {
        f64::from(u8::from(a == b))
    }
    fn predicates(&self) -> Vec<Predicate> {
        vec![Predicate::simple(SimpleKind::WholeField, self.field.clone())]
    }
}

#[derive(Debug)]
pub struct StringType {
    pub field: String,
    pub weight: f64,
    pub has_missing: bool,
}

fn normalized_levenshtein_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];
    for (i, &ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let dist = prev[b_chars.len()] as f64;
    let norm = a_chars.len().max(b_chars.len()) as f64;
    1.0 - dist / norm
}

impl FieldType for StringType {
    fn field(&self) -> &str {
        &self.field
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn has_missing(&self) -> bool {
        self.has_missing
    }
    fn compare(&self, a: &Value, b: &Value) -> f64 {
        normalized_levenshtein_ratio(&a.to_string(), &b.to_string())
    }
    fn predicates(&self) -> Vec<Predicate> {
        vec![
            Predicate::simple(SimpleKind::Token, self.field.clone()),
            Predicate::simple(SimpleKind::FirstToken, self.field.clone()),
            Predicate::simple(SimpleKind::SameThreeCharStart, self.field.clone()),
        ]
    }
}

#[derive(Debug)]
pub struct NumericType {
    pub field: String,
    pub weight: f64,
    pub has_missing: bool,
}

impl FieldType for NumericType {
    fn field(&self) -> &str {
        &self.field
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn has_missing(&self) -> bool {
        self.has_missing
    }
    fn compare(&self, a: &Value, b: &Value) -> f64 {
        match (a.as_real(), b.as_real()) {
            (Some(x), Some(y)) => {
                let diff = (x - y).abs();
                let scale = x.abs().max(y.abs()).max(1.0);
                (1.0 - diff / scale).max(0.0)
            }
            _ => 0.0,
        }
    }
    fn predicates(&self) -> Vec<Predicate> {
        vec![Predicate::simple(SimpleKind::RoundTo1, self.field.clone())]
    }
}

#[derive(Debug)]
pub struct LatLongType {
    pub field: String,
    pub weight: f64,
    pub has_missing: bool,
}

impl FieldType for LatLongType {
    fn field(&self) -> &str {
        &self.field
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn has_missing(&self) -> bool {
        self.has_missing
    }
    fn compare(&self, a: &Value, b: &Value) -> f64 {
        match (a.as_lat_long(), b.as_lat_long()) {
            (Some((alat, alon)), Some((blat, blon))) => {
                let dist = ((alat - blat).powi(2) + (alon - blon).powi(2)).sqrt();
                (-dist).exp()
            }
            _ => 0.0,
        }
    }
    fn predicates(&self) -> Vec<Predicate> {
        vec![Predicate::simple(SimpleKind::LatLongGrid, self.field.clone())]
    }
}

#[derive(Debug)]
pub struct SetType {
    pub field: String,
    pub weight: f64,
    pub has_missing: bool,
}

impl FieldType for SetType {
    fn field(&self) -> &str {
        &self.field
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn has_missing(&self) -> bool {
        self.has_missing
    }
    fn compare(&self, a: &Value, b: &Value) -> f64 {
        match (a.as_set(), b.as_set()) {
            (Some(sa), Some(sb)) if !sa.is_empty() || !sb.is_empty() => {
                let inter = sa.intersection(sb).count() as f64;
                let union = sa.union(sb).count() as f64;
                if union == 0.0 {
                    1.0
                } else {
                    inter / union
                }
            }
            _ => 0.0,
        }
    }
    fn predicates(&self) -> Vec<Predicate> {
        vec![
            Predicate::set_valued(SetKind::Whole, self.field.clone()),
            Predicate::set_valued(SetKind::EachElement, self.field.clone()),
        ]
    }
}

/// One-hot-style expansion: one `CategoricalVariable` per known category
/// value, each scoring 1.0 when both records take that exact category and
/// 0.0 otherwise — the `higher_vars` expansion applied to
/// `FuzzyCategorical`'s `other fields` extra.
#[derive(Debug)]
pub struct CategoricalVariable {
    field: String,
    variable_name: String,
    category: String,
    weight: f64,
    has_missing: bool,
}

impl FieldType for CategoricalVariable {
    fn field(&self) -> &str {
        &self.field
    }
    fn variable_name(&self) -> &str {
        &self.variable_name
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn has_missing(&self) -> bool {
        self.has_missing
    }
    fn compare(&self, a: &Value, b: &Value) -> f64 {
        let is_a = a.as_text() == Some(self.category.as_str());
        let is_b = b.as_text() == Some(self.category.as_str());
        f64::from(u8::from(is_a && is_b))
    }
    fn predicates(&self) -> Vec<Predicate> {
        vec![Predicate::simple(SimpleKind::WholeField, self.field.clone())]
    }
}

/// Input field definition: one entry per modelled field.
#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub field: String,
    pub variable_name: Option<String>,
    pub kind: FieldKind,
    pub weight: f64,
    pub has_missing: bool,
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Exact,
    String,
    Numeric,
    LatLong,
    Set,
    Categorical { categories: Vec<String> },
    Interaction { variables: Vec<String> },
}

impl FieldDefinition {
    #[must_use]
    pub fn new(field: impl Into<String>, kind: FieldKind) -> Self {
        Self { field: field.into(), variable_name: None, kind, weight: 1.0, has_missing: false }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_missing(mut self, has_missing: bool) -> Self {
        self.has_missing = has_missing;
        self
    }
}

struct Interaction {
    indices: Vec<usize>,
    weight: f64,
}

/// Computes per-pair distance vectors: primary variable
/// columns, then interaction columns (product of referenced primaries),
/// then one missing-indicator column per variable with `has_missing`.
pub struct DistanceModel {
    variables: Vec<Box<dyn FieldType>>,
    interactions: Vec<Interaction>,
    missing_indicator_vars: Vec<usize>,
    derived_start: usize,
}

impl DistanceModel {
    /// # Errors
    /// `Error::InvalidFieldSpec` if a definition is malformed or an
    /// `Interaction` references an unknown variable name.
    #[instrument(skip(defs))]
    pub fn new(defs: &[FieldDefinition]) -> Result<Self> {
        let mut variables: Vec<Box<dyn FieldType>> = Vec::new();
        let mut name_to_index: HashMap<String, usize> = HashMap::new();
        let mut pending_interactions: Vec<&FieldDefinition> = Vec::new();

        for def in defs {
            if matches!(def.kind, FieldKind::Interaction { .. }) {
                pending_interactions.push(def);
                continue;
            }
            let var_name = def.variable_name.clone().unwrap_or_else(|| def.field.clone());
            match &def.kind {
                FieldKind::Categorical { categories } => {
                    for category in categories {
                        let variable_name = format!("{var_name}:{category}");
                        let idx = variables.len();
                        name_to_index.insert(variable_name.clone(), idx);
                        variables.push(Box::new(CategoricalVariable {
                            field: def.field.clone(),
                            variable_name,
                            category: category.clone(),
                            weight: def.weight,
                            has_missing: def.has_missing,
                        }));
                    }
                }
                _ => {
                    let idx = variables.len();
                    name_to_index.insert(var_name, idx);
                    variables.push(build_simple_field_type(def)?);
                }
            }
        }

        let derived_start = variables.len();

        let mut interactions = Vec::new();
        for def in pending_interactions {
            let FieldKind::Interaction { variables: names } = &def.kind else { unreachable!() };
            let mut indices = Vec::with_capacity(names.len());
            for name in names {
                let idx = name_to_index.get(name).copied().ok_or_else(|| {
                    Error::InvalidFieldSpec(format!("interaction references unknown variable {name}"))
                })?;
                indices.push(idx);
            }
            interactions.push(Interaction { indices, weight: def.weight });
        }

        let missing_indicator_vars: Vec<usize> =
            (0..variables.len()).filter(|&i| variables[i].has_missing()).collect();

        Ok(Self { variables, interactions, missing_indicator_vars, derived_start })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.variables.len() + self.interactions.len() + self.missing_indicator_vars.len()
    }

    #[must_use]
    pub fn derived_start(&self) -> usize {
        self.derived_start
    }

    /// Validates that `record` carries every field the model reads.
    ///
    /// # Errors
    /// `Error::RecordFieldMissing` if a field is absent from the schema
    /// entirely (not merely `Value::Null`).
    pub fn check(&self, record: &Record) -> Result<()> {
        for variable in &self.variables {
            if !record.has_field(variable.field()) {
                return Err(Error::RecordFieldMissing {
                    record_id: record.id.to_string(),
                    field: variable.field().to_string(),
                });
            }
        }
        Ok(())
    }

    /// All non-indexed predicates grounding the model's fields, used to
    /// seed the active learner's initial candidate sample.
    #[must_use]
    pub fn seed_predicates(&self) -> Vec<Predicate> {
        self.variables.iter().flat_map(|v| v.predicates()).collect()
    }

    /// Computes the distance vector for `(a, b)`.
    #[instrument(skip(self, a, b))]
    pub fn compute(&self, a: &Record, b: &Record) -> Vec<f64> {
        let mut primary_raw = Vec::with_capacity(self.variables.len());
        let mut primary_missing = Vec::with_capacity(self.variables.len());
        for variable in &self.variables {
            let va = a.value_or_null(variable.field());
            let vb = b.value_or_null(variable.field());
            let missing = variable.is_missing(va) || variable.is_missing(vb);
            let raw = if missing && !variable.handles_missing() {
                f64::NAN
            } else {
                variable.compare(va, vb) * variable.weight()
            };
            primary_raw.push(raw);
            primary_missing.push(missing);
        }

        let interaction_raw: Vec<f64> = self
            .interactions
            .iter()
            .map(|interaction| {
                let product: f64 = interaction.indices.iter().map(|&i| primary_raw[i]).product();
                product * interaction.weight
            })
            .collect();

        let mut out: Vec<f64> = primary_raw.iter().chain(interaction_raw.iter()).map(|&v| if v.is_nan() { 0.5 } else { v }).collect();

        for &i in &self.missing_indicator_vars {
            out.push(1.0 - f64::from(u8::from(primary_missing[i])));
        }

        out
    }
}

fn build_simple_field_type(def: &FieldDefinition) -> Result<Box<dyn FieldType>> {
    let field = def.field.clone();
    let weight = def.weight;
    let has_missing = def.has_missing;
    match &def.kind {
        FieldKind::Exact => Ok(Box::new(ExactType { field, weight, has_missing })),
        FieldKind::String => Ok(Box::new(StringType { field, weight, has_missing })),
        FieldKind::Numeric => Ok(Box::new(NumericType { field, weight, has_missing })),
        FieldKind::LatLong => Ok(Box::new(LatLongType { field, weight, has_missing })),
        FieldKind::Set => Ok(Box::new(SetType { field, weight, has_missing })),
        FieldKind::Categorical { .. } | FieldKind::Interaction { .. } => {
            unreachable!("Categorical and Interaction kinds are expanded in DistanceModel::new before this is called")
        }
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::record::RecordId;

    fn rec(id: u64, field: &str, value: Value) -> Record {
        Record::new(RecordId(id)).with_field(field, value)
    }

    #[test]
    fn test_exact_match_scores_one() {
        let model = DistanceModel::new(&[FieldDefinition::new("name", FieldKind::Exact)]).unwrap();
        let a = rec(1, "name", Value::Text("smith".to_string()));
        let b = rec(2, "name", Value::Text("smith".to_string()));
        assert_eq!(model.compute(&a, &b), vec![1.0]);
    }

    #[test]
    fn test_missing_field_produces_half_filled_value() {
        let model = DistanceModel::new(&[FieldDefinition::new("name", FieldKind::Exact).with_missing(true)]).unwrap();
        let a = rec(1, "name", Value::Null);
        let b = rec(2, "name", Value::Text("smith".to_string()));
        let out = model.compute(&a, &b);
        assert_eq!(out[0], 0.5);
        assert_eq!(out[1], 0.0, "present-but-other-missing indicator must read as missing");
    }

    #[test]
    fn test_check_flags_absent_field() {
        let model = DistanceModel::new(&[FieldDefinition::new("name", FieldKind::Exact)]).unwrap();
        let r = Record::new(RecordId(1));
        assert!(matches!(model.check(&r), Err(Error::RecordFieldMissing { .. })));
    }

    #[test]
    fn test_interaction_is_product_of_referenced_primaries() {
        let defs = vec![
            FieldDefinition::new("first", FieldKind::Exact),
            FieldDefinition::new("last", FieldKind::Exact),
            FieldDefinition { field: String::new(), variable_name: None, kind: FieldKind::Interaction { variables: vec!["first".to_string(), "last".to_string()] }, weight: 1.0, has_missing: false },
        ];
        let model = DistanceModel::new(&defs).unwrap();
        let a = Record::new(RecordId(1))
            .with_field("first", Value::Text("john".to_string()))
            .with_field("last", Value::Text("smith".to_string()));
        let b = Record::new(RecordId(2))
            .with_field("first", Value::Text("john".to_string()))
            .with_field("last", Value::Text("smith".to_string()));
        let out = model.compute(&a, &b);
        assert_eq!(out, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_interaction_scales_product_by_its_own_weight() {
        let defs = vec![
            FieldDefinition::new("first", FieldKind::Exact),
            FieldDefinition::new("last", FieldKind::Exact),
            FieldDefinition {
                field: String::new(),
                variable_name: None,
                kind: FieldKind::Interaction { variables: vec!["first".to_string(), "last".to_string()] },
                weight: 2.5,
                has_missing: false,
            },
        ];
        let model = DistanceModel::new(&defs).unwrap();
        let a = Record::new(RecordId(1))
            .with_field("first", Value::Text("john".to_string()))
            .with_field("last", Value::Text("smith".to_string()));
        let b = Record::new(RecordId(2))
            .with_field("first", Value::Text("john".to_string()))
            .with_field("last", Value::Text("smith".to_string()));
        let out = model.compute(&a, &b);
        assert_eq!(out, vec![1.0, 1.0, 2.5]);
    }

    #[test]
    fn test_unknown_interaction_variable_rejected() {
        let defs = vec![FieldDefinition {
            field: String::new(),
            variable_name: None,
            kind: FieldKind::Interaction { variables: vec!["nonexistent".to_string()] },
            weight: 1.0,
            has_missing: false,
        }];
        assert!(matches!(DistanceModel::new(&defs), Err(Error::InvalidFieldSpec(_))));
    }
}
