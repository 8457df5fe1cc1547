// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lightweight static analyses over parsed expressions.
//!
//! Each analysis is a [`Visitor`](crate::traversal::Visitor) driven by
//! [`walk`]; every call builds a fresh visitor, so there is no state shared
//! between calls.

mod conditions;
mod identifiers;
mod lookups;
mod printer;
mod single;

pub use conditions::ConditionCounter;
pub use identifiers::IdentifierCollector;
pub use lookups::{FieldLookup, FieldLookups, LookupValue};
pub use printer::Printer;
pub use single::{FromLiteral, SingleIdentifier, SingleValue};

use crate::ast::Expression;
use crate::traversal::{walk, IdentRepr, SpannedIdent, TraversalError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error("expression is not a single identifier")]
    NotSingleIdentifier,

    #[error("expression is not a single {expected} value")]
    NotSingleValue { expected: &'static str },

    #[error("expected a {expected} value but found {found}")]
    ValueTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Every distinct identifier path in first-seen order.
pub fn identifiers(expression: &Expression) -> Result<Vec<String>, AnalysisError> {
    walk(expression, IdentifierCollector::<String>::new())
}

/// Like [`identifiers`], keeping the position of each first occurrence.
pub fn spanned_identifiers(expression: &Expression) -> Result<Vec<SpannedIdent>, AnalysisError> {
    walk(expression, IdentifierCollector::<SpannedIdent>::new())
}

/// Equality lookups grouped as OR-of-AND groups.
///
/// `model` is the identifier root of the acting model (e.g. `post`). Each
/// inner vector is one OR branch; a branch with no index-safe equality is
/// returned as an empty group.
pub fn field_lookups(
    expression: &Expression,
    model: &str,
) -> Result<Vec<Vec<FieldLookup>>, AnalysisError> {
    walk(expression, FieldLookups::new(model))
}

/// Equality lookups that hold for every row the expression matches.
pub fn definitive_lookups(
    expression: &Expression,
    model: &str,
) -> Result<Vec<FieldLookup>, AnalysisError> {
    let groups = field_lookups(expression, model)?;
    let Some((first, rest)) = groups.split_first() else {
        return Ok(vec![]);
    };

    Ok(first
        .iter()
        .filter(|lookup| rest.iter().all(|group| group.contains(lookup)))
        .cloned()
        .collect())
}

pub fn single_identifier<I: IdentRepr>(expression: &Expression) -> Result<I, AnalysisError> {
    walk(expression, SingleIdentifier::new())
}

pub fn single_value<T: FromLiteral>(expression: &Expression) -> Result<T, AnalysisError> {
    walk(expression, SingleValue::new())
}

pub fn condition_count(expression: &Expression) -> Result<usize, AnalysisError> {
    walk(expression, ConditionCounter::default())
}

/// Canonical source form with only the parentheses precedence requires.
pub fn render(expression: &Expression) -> Result<String, AnalysisError> {
    walk(expression, Printer::default())
}
