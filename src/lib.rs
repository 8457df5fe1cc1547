// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod analysis;
mod ast;
mod lexer;
mod parser;
pub mod schema;
pub mod sql;
pub mod traversal;

pub use ast::{BinaryOp, Expr, Expression, Literal, UnaryOp};
pub use lexer::{ParseError, SourceSpan};
pub use schema::{Schema, SchemaCatalog};
pub use sql::{
    compile_permission, row_filter, CompileError, CompiledPredicate, QueryParam, RequestContext,
    RowFilter,
};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::lexer::*;
    pub use crate::parser::*;
}
