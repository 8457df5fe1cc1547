// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt::Write as _;

use log::debug;

use super::identity::{context_operand, Operand};
use super::joins::{JoinResolver, JoinSet};
use super::{column_ref, quote_identifier, CompileError, CompiledPredicate, QueryParam};
use crate::ast::{BinaryOp, Expr, Literal};
use crate::schema::naming::{identifier_root, table_name};
use crate::schema::{Model, PermissionRule, SchemaCatalog};
use crate::traversal::{walk, SpannedIdent, Visitor};

/// Joins and values shared by every rule feeding one predicate.
#[derive(Debug, Default)]
struct Statement {
    joins: JoinSet,
    values: Vec<QueryParam>,
}

#[derive(Debug, Default)]
struct Condition {
    lhs: Option<Operand>,
    op: Option<BinaryOp>,
    rhs: Option<Operand>,
    negated: bool,
}

impl Condition {
    const fn is_open(&self) -> bool {
        self.lhs.is_some() || self.op.is_some()
    }
}

fn sql_operator(op: BinaryOp) -> Result<&'static str, CompileError> {
    Ok(match op {
        BinaryOp::Eq | BinaryOp::In => "IS NOT DISTINCT FROM",
        BinaryOp::Ne => "IS DISTINCT FROM",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        _ => return Err(CompileError::unsupported(format!("operator {op}"))),
    })
}

/// Translates one rule expression into a SQL condition.
struct RuleCompiler<'a, 's, S: ?Sized> {
    schema: &'a S,
    model: &'a Model,
    root: String,
    alias: &'a str,
    statement: &'s mut Statement,
    sql: String,
    condition: Condition,
    pending_not: bool,
}

impl<'a, 's, S: SchemaCatalog + ?Sized> RuleCompiler<'a, 's, S> {
    fn new(schema: &'a S, model: &'a Model, alias: &'a str, statement: &'s mut Statement) -> Self {
        Self {
            schema,
            model,
            root: identifier_root(&model.name),
            alias,
            statement,
            sql: String::new(),
            condition: Condition::default(),
            pending_not: false,
        }
    }

    fn ident_operand(&mut self, ident: &SpannedIdent) -> Result<Operand, CompileError> {
        let root = ident.root();

        if root == self.root {
            let column = JoinResolver::new(self.schema).resolve(
                self.model,
                self.alias,
                &ident.fragments[1..],
                ident.span,
                &mut self.statement.joins,
            )?;
            return Ok(Operand::column(column));
        }

        if root == "ctx" {
            return context_operand(self.schema, ident);
        }

        if let Some(e) = self.schema.find_enum(root) {
            return match &ident.fragments[1..] {
                [value] if e.has_value(value) => Ok(Operand::param(QueryParam::String(value.clone()))),
                rest => Err(CompileError::UnknownEnumValue {
                    name: e.name.clone(),
                    value: rest.join("."),
                    span: ident.span,
                }),
            };
        }

        Err(CompileError::UnknownIdentifierRoot {
            root: root.to_string(),
            span: ident.span,
        })
    }

    fn operand(&mut self, operand: Operand) -> Result<(), CompileError> {
        let negated = std::mem::take(&mut self.pending_not);
        let condition = &mut self.condition;
        condition.negated |= negated;

        let shape = (
            condition.lhs.is_some(),
            condition.op.is_some(),
            condition.rhs.is_some(),
        );
        match shape {
            (false, false, _) => condition.lhs = Some(operand),
            (true, true, false) => condition.rhs = Some(operand),
            _ => return Err(CompileError::unsupported("adjacent operands")),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CompileError> {
        let condition = std::mem::take(&mut self.condition);

        match (condition.lhs, condition.op, condition.rhs) {
            (None, None, None) => {}

            // A bare operand is a condition on its own.
            (Some(lhs), None, None) => {
                if lhs.raw {
                    self.sql.push_str(&lhs.sql);
                } else {
                    let _ = write!(self.sql, "{} IS NOT DISTINCT FROM true", lhs.sql);
                }
                self.statement.values.extend(lhs.values);
            }

            (Some(lhs), Some(op), Some(rhs)) => {
                let _ = write!(self.sql, "{} {} {}", lhs.sql, sql_operator(op)?, rhs.sql);
                self.statement.values.extend(lhs.values);
                self.statement.values.extend(rhs.values);
            }

            _ => return Err(CompileError::unsupported("incomplete comparison")),
        }
        Ok(())
    }
}

impl<S: SchemaCatalog + ?Sized> Visitor for RuleCompiler<'_, '_, S> {
    type Ident = SpannedIdent;
    type Output = String;
    type Error = CompileError;

    fn start_term(&mut self, parenthesis: bool) -> Result<(), Self::Error> {
        if !parenthesis {
            return Ok(());
        }
        if self.condition.is_open() {
            return Err(CompileError::unsupported("grouped comparison operand"));
        }
        // A pending `NOT ` now applies to the whole group.
        self.pending_not = false;
        self.sql.push('(');
        Ok(())
    }

    fn end_term(&mut self, parenthesis: bool) -> Result<(), Self::Error> {
        if parenthesis {
            self.flush()?;
            self.sql.push(')');
        }
        Ok(())
    }

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        self.flush()?;
        self.sql.push_str(" AND ");
        Ok(())
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        self.flush()?;
        self.sql.push_str(" OR ");
        Ok(())
    }

    fn visit_not(&mut self) -> Result<(), Self::Error> {
        if self.condition.is_open() {
            return Err(CompileError::unsupported("negated comparison operand"));
        }
        self.sql.push_str("NOT ");
        self.pending_not = true;
        Ok(())
    }

    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        Err(CompileError::unsupported("arithmetic negation"))
    }

    fn visit_operator(&mut self, op: BinaryOp) -> Result<(), Self::Error> {
        if op.is_arithmetic() {
            return Err(CompileError::unsupported(format!("arithmetic operator {op}")));
        }
        if self.condition.negated {
            return Err(CompileError::unsupported("negated comparison operand"));
        }
        if self.condition.lhs.is_none() || self.condition.op.is_some() {
            return Err(CompileError::unsupported("nested comparison"));
        }
        self.condition.op = Some(op);
        Ok(())
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<(), Self::Error> {
        // Booleans and null stay inline so the statement text is stable.
        let operand = match value {
            Literal::Bool(true) => Operand::raw("true"),
            Literal::Bool(false) => Operand::raw("false"),
            Literal::Null => Operand::raw("null"),
            Literal::String(s) => Operand::param(QueryParam::String(s.clone())),
            Literal::Number(n) => Operand::param(QueryParam::Number(n.clone())),
            Literal::Array(_) => return Err(CompileError::unsupported("array operand")),
        };
        self.operand(operand)
    }

    fn visit_ident(&mut self, ident: SpannedIdent) -> Result<(), Self::Error> {
        let operand = self.ident_operand(&ident)?;
        self.operand(operand)
    }

    fn visit_ident_array(&mut self, _idents: Vec<SpannedIdent>) -> Result<(), Self::Error> {
        Err(CompileError::unsupported("array operand"))
    }

    fn start_function(&mut self, name: &str) -> Result<(), Self::Error> {
        Err(CompileError::unsupported(format!("function call {name}")))
    }

    fn result(mut self) -> Result<Self::Output, Self::Error> {
        self.flush()?;
        Ok(self.sql)
    }
}

/// Compile the rules governing `action` on `model`.
///
/// Returns `Ok(None)` when no rule has an expression: the permission is
/// decided by roles alone and there is nothing to filter.
pub fn compile_permission<S: SchemaCatalog + ?Sized>(
    schema: &S,
    model: &str,
    action: &str,
) -> Result<Option<CompiledPredicate>, CompileError> {
    let model_def = schema
        .find_model(model)
        .ok_or_else(|| CompileError::UnknownModel {
            model: model.to_string(),
        })?;
    let rules = schema
        .permission_rules_for(model, action)
        .ok_or_else(|| CompileError::UnknownAction {
            model: model.to_string(),
            action: action.to_string(),
        })?;

    let predicate = compile_rules(schema, model_def, &rules)?;
    match &predicate {
        Some(p) => debug!(
            "compiled {model}.{action}: {} ({} values, {} joins)",
            p.sql,
            p.values.len(),
            p.joins.len()
        ),
        None => debug!("{model}.{action} is role only"),
    }
    Ok(predicate)
}

/// Compile `rules` into one predicate over `model`'s table.
pub fn compile_rules<S: SchemaCatalog + ?Sized>(
    schema: &S,
    model: &Model,
    rules: &[&PermissionRule],
) -> Result<Option<CompiledPredicate>, CompileError> {
    if rules.iter().all(|r| r.is_role_only()) {
        return Ok(None);
    }
    let expressions: Vec<_> = rules.iter().filter_map(|r| r.expression.as_ref()).collect();

    let table = table_name(&model.name);
    let id = column_ref(&table, &schema.primary_key_column(&model.name));
    let mut statement = Statement::default();

    let mut bodies = vec![];
    for expression in &expressions {
        let body = walk(expression, RuleCompiler::new(schema, model, &table, &mut statement))?;
        let or_rooted = matches!(
            expression.expr(),
            Expr::Binary {
                op: BinaryOp::Or,
                ..
            }
        );
        bodies.push((body, or_rooted));
    }

    // The trailing `AND` must scope every rule.
    let body = match bodies.as_slice() {
        [(body, true)] => format!("({body})"),
        [(body, false)] => body.clone(),
        _ => {
            let bodies: Vec<&str> = bodies.iter().map(|(b, _)| b.as_str()).collect();
            format!("({})", bodies.join(" or "))
        }
    };

    let mut sql = format!("SELECT DISTINCT {id} FROM {}", quote_identifier(&table));
    for join in statement.joins.values() {
        let _ = write!(sql, " {join}");
    }
    let _ = write!(sql, " WHERE {body} AND {id} IN (?)");

    let mut values = statement.values;
    values.push(QueryParam::RecordIds);

    let placeholders = sql.matches('?').count();
    if placeholders != values.len() {
        return Err(CompileError::PlaceholderMismatch {
            placeholders,
            values: values.len(),
        });
    }

    Ok(Some(CompiledPredicate {
        sql,
        values,
        joins: statement.joins.into_values().collect(),
    }))
}
