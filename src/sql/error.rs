// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::SourceSpan;
use crate::traversal::TraversalError;

/// Reasons a permission cannot be compiled. Any of these aborts the whole
/// predicate; callers must treat them as a denial.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error("unknown model {model}")]
    UnknownModel { model: String },

    #[error("model {model} has no action {action}")]
    UnknownAction { model: String, action: String },

    #[error("{span}: {root} is not a model, enum or ctx")]
    UnknownIdentifierRoot { root: String, span: SourceSpan },

    #[error("{span}: {model} has no field {field}")]
    UnknownField {
        model: String,
        field: String,
        span: SourceSpan,
    },

    #[error("{span}: enum {name} has no value {value}")]
    UnknownEnumValue {
        name: String,
        value: String,
        span: SourceSpan,
    },

    #[error("cannot determine how {model}.{field} joins to its model")]
    UnresolvableRelationship { model: String, field: String },

    #[error("unsupported in permission expressions: {feature}")]
    UnsupportedExpressionFeature { feature: String },

    #[error("compiled {placeholders} placeholders for {values} values")]
    PlaceholderMismatch { placeholders: usize, values: usize },
}

impl CompileError {
    pub(crate) fn unsupported(feature: impl Into<String>) -> Self {
        Self::UnsupportedExpressionFeature {
            feature: feature.into(),
        }
    }
}
