// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compilation of permission rules into parameterized SQL predicates.
//!
//! [`compile_permission`] turns every rule governing one (model, action) pair
//! into a single `SELECT DISTINCT` statement over the model's table. The
//! statement keeps the primary keys, among a caller-supplied candidate set,
//! of the rows the rules allow:
//!
//! ```sql
//! SELECT DISTINCT "post"."id" FROM "post"
//!   LEFT JOIN "author" AS "post$author" ON "post"."author_id" = "post$author"."id"
//!   WHERE "post$author"."identity_id" IS NOT DISTINCT FROM ?
//!   AND "post"."id" IN (?)
//! ```
//!
//! Placeholders are described by [`QueryParam`]s and resolved against a
//! [`RequestContext`] only when the statement is about to run.

use core::fmt;

use log::error;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaCatalog;

mod bind;
mod compiler;
mod error;
mod identity;
mod joins;

pub use bind::{BindError, RequestContext, RequestIdentity};
pub use compiler::{compile_permission, compile_rules};
pub use error::CompileError;

/// Runtime value a placeholder is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryParam {
    /// Candidate primary keys the predicate is scoped to.
    RecordIds,
    IdentityId,
    IdentityEmail,
    IsAuthenticated,
    Now,
    Header(String),
    Secret(String),
    String(String),
    Number(serde_json::Number),
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordIds => f.write_str("RecordIds"),
            Self::IdentityId => f.write_str("IdentityId"),
            Self::IdentityEmail => f.write_str("IdentityEmail"),
            Self::IsAuthenticated => f.write_str("IsAuthenticated"),
            Self::Now => f.write_str("Now"),
            Self::Header(key) => write!(f, "Header({key})"),
            Self::Secret(key) => write!(f, "Secret({key})"),
            Self::String(s) => write!(f, "String({s})"),
            Self::Number(n) => write!(f, "Number({n})"),
        }
    }
}

/// `LEFT JOIN "<to_table>" AS "<to_alias>" ON "<from_alias>"."<left_column>" = "<to_alias>"."<right_column>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub from_alias: String,
    pub to_table: String,
    pub to_alias: String,
    pub left_column: String,
    pub right_column: String,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LEFT JOIN {} AS {} ON {} = {}",
            quote_identifier(&self.to_table),
            quote_identifier(&self.to_alias),
            column_ref(&self.from_alias, &self.left_column),
            column_ref(&self.to_alias, &self.right_column),
        )
    }
}

/// A compiled row filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPredicate {
    pub sql: String,
    /// One entry per `?` in `sql`, in order. The last is always
    /// [`QueryParam::RecordIds`].
    pub values: Vec<QueryParam>,
    pub joins: Vec<Join>,
}

/// Outcome of [`row_filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// No rule inspects the row; access is decided by roles alone.
    RoleOnly,
    Predicate(CompiledPredicate),
    /// The rules could not be compiled. Nothing may be returned.
    Deny,
}

/// Row filter for serving a request.
///
/// Schemas are validated before they are served, so a compile error here is
/// an internal invariant violation. It is logged and the request is denied.
pub fn row_filter<S: SchemaCatalog + ?Sized>(schema: &S, model: &str, action: &str) -> RowFilter {
    match compile_permission(schema, model, action) {
        Ok(Some(predicate)) => RowFilter::Predicate(predicate),
        Ok(None) => RowFilter::RoleOnly,
        Err(err) => {
            error!("internal error: permission for {model}.{action} failed to compile: {err}");
            RowFilter::Deny
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn column_ref(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_identifier(alias), quote_identifier(column))
}
