// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Active learning: a small logistic-regression classifier,
//! a wrapper that turns it into an uncertainty-sampling sub-learner, and
//! the two-classifier disagreement learner that drives labelling.

pub mod disagreement;
pub mod logistic;
pub mod regression;

pub use disagreement::{BlockSubLearner, DisagreementLearner};
pub use logistic::LogisticRegression;
pub use regression::RegressionLearner;
