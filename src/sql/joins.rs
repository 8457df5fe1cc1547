// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use indexmap::IndexMap;
use log::trace;

use super::{column_ref, CompileError, Join};
use crate::lexer::SourceSpan;
use crate::schema::naming::{column_name, join_alias, table_name};
use crate::schema::{Field, Model, SchemaCatalog};

/// Joins keyed by alias. An alias names a relationship path, so a path
/// referenced any number of times is joined once.
pub(crate) type JoinSet = IndexMap<String, Join>;

/// Resolves model-rooted identifier paths into column references.
pub(crate) struct JoinResolver<'a, S: ?Sized> {
    schema: &'a S,
}

impl<'a, S: SchemaCatalog + ?Sized> JoinResolver<'a, S> {
    pub(crate) fn new(schema: &'a S) -> Self {
        Self { schema }
    }

    /// Column reference for `path` starting at `model`, which is aliased as
    /// `root_alias`. Joins needed along the way are added to `joins`.
    pub(crate) fn resolve(
        &self,
        model: &'a Model,
        root_alias: &str,
        path: &[String],
        span: SourceSpan,
        joins: &mut JoinSet,
    ) -> Result<String, CompileError> {
        let mut current = model;
        let mut alias = root_alias.to_string();

        for (idx, name) in path.iter().enumerate() {
            let last = idx + 1 == path.len();
            let field = current
                .field(name)
                .ok_or_else(|| CompileError::UnknownField {
                    model: current.name.clone(),
                    field: name.clone(),
                    span,
                })?;

            let Some(target_name) = field.target_model() else {
                if !last {
                    return Err(CompileError::unsupported(format!(
                        "traversing through non-relationship field {}.{name}",
                        current.name
                    )));
                }
                return Ok(column_ref(&alias, &column_name(&field.name)));
            };

            // The foreign key column already identifies the related row.
            if let (true, Some(fk)) = (last, &field.foreign_key) {
                return Ok(column_ref(&alias, &column_name(fk)));
            }

            let target = self
                .schema
                .find_model(target_name)
                .ok_or_else(|| CompileError::UnknownModel {
                    model: target_name.to_string(),
                })?;
            let join = self.join(current, field, target, &alias)?;
            alias = join.to_alias.clone();
            add_join(joins, join);
            current = target;
        }

        Ok(column_ref(&alias, &self.schema.primary_key_column(&current.name)))
    }

    fn join(
        &self,
        model: &Model,
        field: &Field,
        target: &Model,
        alias: &str,
    ) -> Result<Join, CompileError> {
        let (left_column, right_column) = match &field.foreign_key {
            // belongs-to: parent.fk = child.id
            Some(fk) => (
                column_name(fk),
                self.schema.primary_key_column(&target.name),
            ),
            // has-many / has-one: parent.id = child.fk
            None => {
                let fk = field
                    .inverse_field
                    .as_deref()
                    .and_then(|inverse| target.field(inverse))
                    .and_then(|inverse| inverse.foreign_key.as_deref())
                    .ok_or_else(|| CompileError::UnresolvableRelationship {
                        model: model.name.clone(),
                        field: field.name.clone(),
                    })?;
                (
                    self.schema.primary_key_column(&model.name),
                    column_name(fk),
                )
            }
        };

        Ok(Join {
            from_alias: alias.to_string(),
            to_table: table_name(&target.name),
            to_alias: join_alias(alias, &field.name),
            left_column,
            right_column,
        })
    }
}

fn add_join(joins: &mut JoinSet, join: Join) {
    if joins.contains_key(&join.to_alias) {
        trace!("reusing join {}", join.to_alias);
        return;
    }
    trace!("adding join {join}");
    joins.insert(join.to_alias.clone(), join);
}
