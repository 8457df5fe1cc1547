// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt::Write as _;

use super::joins::{JoinResolver, JoinSet};
use super::{column_ref, quote_identifier, CompileError, QueryParam};
use crate::schema::naming::table_name;
use crate::schema::{SchemaCatalog, IDENTITY_MODEL};
use crate::traversal::SpannedIdent;

/// SQL for one operand together with the values its placeholders bind to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Operand {
    pub(crate) sql: String,
    pub(crate) values: Vec<QueryParam>,
    /// A SQL literal that is already a complete boolean condition.
    pub(crate) raw: bool,
}

impl Operand {
    pub(crate) fn raw(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            values: vec![],
            raw: true,
        }
    }

    pub(crate) fn column(sql: String) -> Self {
        Self {
            sql,
            values: vec![],
            raw: false,
        }
    }

    pub(crate) fn param(value: QueryParam) -> Self {
        Self {
            sql: "?".to_string(),
            values: vec![value],
            raw: false,
        }
    }
}

/// Compile a `ctx.` identifier.
pub(crate) fn context_operand<S: SchemaCatalog + ?Sized>(
    schema: &S,
    ident: &SpannedIdent,
) -> Result<Operand, CompileError> {
    let path: Vec<&str> = ident.fragments.iter().skip(1).map(String::as_str).collect();

    let operand = match path.as_slice() {
        ["identity"] | ["identity", "id"] => Operand::param(QueryParam::IdentityId),
        ["identity", "email"] => Operand::param(QueryParam::IdentityEmail),
        ["identity", ..] => backlink_subquery(schema, ident)?,
        // Parameters arrive untyped.
        ["isAuthenticated"] => Operand {
            sql: "?::boolean".to_string(),
            values: vec![QueryParam::IsAuthenticated],
            raw: false,
        },
        ["now"] => Operand::param(QueryParam::Now),
        ["headers", key] => Operand::param(QueryParam::Header(key.to_string())),
        ["secrets", key] => Operand::param(QueryParam::Secret(key.to_string())),
        _ => {
            return Err(CompileError::UnknownField {
                model: "ctx".to_string(),
                field: path.join("."),
                span: ident.span,
            })
        }
    };
    Ok(operand)
}

/// `ctx.identity.<path>` reaching past the identity's own columns.
///
/// The acting model has no relationship to the caller's identity row, so the
/// path is resolved from `Identity` inside a scalar subquery pinned to the
/// caller's identity id.
fn backlink_subquery<S: SchemaCatalog + ?Sized>(
    schema: &S,
    ident: &SpannedIdent,
) -> Result<Operand, CompileError> {
    let identity = schema
        .find_model(IDENTITY_MODEL)
        .ok_or_else(|| CompileError::UnknownModel {
            model: IDENTITY_MODEL.to_string(),
        })?;
    let alias = table_name(IDENTITY_MODEL);

    let mut joins = JoinSet::new();
    let column = JoinResolver::new(schema).resolve(
        identity,
        &alias,
        &ident.fragments[2..],
        ident.span,
        &mut joins,
    )?;

    let mut sql = format!("(SELECT {column} FROM {}", quote_identifier(&alias));
    for join in joins.values() {
        let _ = write!(sql, " {join}");
    }
    let _ = write!(
        sql,
        " WHERE {} IS NOT DISTINCT FROM ?)",
        column_ref(&alias, &schema.primary_key_column(IDENTITY_MODEL))
    );

    Ok(Operand {
        sql,
        values: vec![QueryParam::IdentityId],
        raw: false,
    })
}
