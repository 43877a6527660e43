// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

use thiserror::Error;

use crate::record::FieldName;

/// Errors the core can raise. `OutOfPredicates` is deliberately absent here:
/// it is a warning condition (logged via `tracing::warn!`), not a fatal one,
/// per the learner's recall fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid field spec: {0}")]
    InvalidFieldSpec(String),

    #[error("record {record_id} lacks field {field} required by the distance model")]
    RecordFieldMissing { record_id: String, field: FieldName },

    #[error("index predicate {predicate} invoked against a value not present in its index")]
    NotIndexed { predicate: String },

    #[error("pop() called with no unlabelled candidates remaining")]
    ExhaustedCandidates,

    #[error("threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
