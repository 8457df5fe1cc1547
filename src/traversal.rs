// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Depth-first traversal of expression trees.
//!
//! [`walk`] turns an [`Expr`] tree into a flat, left-to-right sequence of
//! [`Visitor`] callbacks. Grouping is decided here, from operator precedence
//! and associativity, so every visitor sees the same disambiguated structure
//! no matter how liberally the source text was parenthesized.

use crate::ast::{BinaryOp, Expr, Expression, Literal, UnaryOp};
use crate::lexer::{ParseError, SourceSpan};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TraversalError {
    #[error("unsupported {kind} at {span}")]
    UnsupportedExpressionNode { kind: String, span: SourceSpan },

    #[error("expression could not be parsed: {0}")]
    ExpressionNotParseable(#[from] ParseError),
}

/// Identifier representation handed to visitors.
pub trait IdentRepr: Sized {
    fn from_path(path: &[String], span: SourceSpan) -> Self;

    /// Dotted form used for identity comparisons between occurrences.
    fn dotted(&self) -> String;
}

/// Plain dotted form, e.g. `post.author.id`.
impl IdentRepr for String {
    fn from_path(path: &[String], _span: SourceSpan) -> Self {
        path.join(".")
    }

    fn dotted(&self) -> String {
        self.clone()
    }
}

/// Identifier fragments together with their source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpannedIdent {
    pub fragments: Vec<String>,
    pub span: SourceSpan,
}

impl SpannedIdent {
    pub fn root(&self) -> &str {
        self.fragments.first().map(String::as_str).unwrap_or_default()
    }
}

impl IdentRepr for SpannedIdent {
    fn from_path(path: &[String], span: SourceSpan) -> Self {
        Self {
            fragments: path.to_vec(),
            span,
        }
    }

    fn dotted(&self) -> String {
        self.fragments.join(".")
    }
}

/// Callbacks emitted by [`walk`]. Every method defaults to a no-op so a
/// visitor only implements what it cares about.
pub trait Visitor {
    type Ident: IdentRepr;
    type Output;
    type Error: From<TraversalError>;

    fn start_term(&mut self, _parenthesis: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end_term(&mut self, _parenthesis: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_not(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Unary minus applied to a non-literal operand.
    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Comparison or arithmetic operator between two operands.
    fn visit_operator(&mut self, _op: BinaryOp) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_literal(&mut self, _value: &Literal) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_ident(&mut self, _ident: Self::Ident) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_ident_array(&mut self, _idents: Vec<Self::Ident>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn start_function(&mut self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Emitted between function call arguments.
    fn visit_separator(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end_function(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn result(self) -> Result<Self::Output, Self::Error>;
}

/// Whether `child` must be grouped when it appears as an operand of
/// `parent`. A unary parent (`None`) groups every binary operand.
pub fn needs_parentheses(child: &Expr, parent: Option<BinaryOp>, is_rhs: bool) -> bool {
    let Expr::Binary { op: child_op, .. } = child else {
        return false;
    };

    let Some(parent) = parent else {
        return true;
    };

    let (child_prec, parent_prec) = (child_op.precedence(), parent.precedence());
    child_prec < parent_prec
        || (child_prec == parent_prec && is_rhs && parent.is_left_associative())
}

/// Walk a parsed expression, feeding callbacks to `visitor`, and return the
/// visitor's result.
pub fn walk<V: Visitor>(expression: &Expression, mut visitor: V) -> Result<V::Output, V::Error> {
    walk_node(expression.expr(), false, &mut visitor)?;
    visitor.result()
}

/// Parse `source` and walk it.
pub fn walk_source<V: Visitor>(source: &str, visitor: V) -> Result<V::Output, V::Error> {
    let expression = Expression::parse(source).map_err(TraversalError::from)?;
    walk(&expression, visitor)
}

fn walk_node<V: Visitor>(expr: &Expr, parenthesis: bool, v: &mut V) -> Result<(), V::Error> {
    v.start_term(parenthesis)?;

    match expr {
        Expr::Literal { value, .. } => v.visit_literal(value)?,

        Expr::Ident { span, path } => v.visit_ident(V::Ident::from_path(path, *span))?,

        Expr::Array { span, items } => walk_array(items, *span, v)?,

        Expr::Unary { op, expr, .. } => {
            match op {
                UnaryOp::Not => v.visit_not()?,
                UnaryOp::Neg => v.visit_negate()?,
            }
            walk_node(expr, needs_parentheses(expr, None, false), v)?;
        }

        Expr::Binary { op, lhs, rhs, .. } => {
            walk_node(lhs, needs_parentheses(lhs, Some(*op), false), v)?;
            match op {
                BinaryOp::And => v.visit_and()?,
                BinaryOp::Or => v.visit_or()?,
                _ => v.visit_operator(*op)?,
            }
            walk_node(rhs, needs_parentheses(rhs, Some(*op), true), v)?;
        }

        Expr::Call { name, args, .. } => {
            v.start_function(name)?;
            for (idx, arg) in args.iter().enumerate() {
                if idx > 0 {
                    v.visit_separator()?;
                }
                walk_node(arg, false, v)?;
            }
            v.end_function()?;
        }
    }

    v.end_term(parenthesis)
}

fn walk_array<V: Visitor>(items: &[Expr], span: SourceSpan, v: &mut V) -> Result<(), V::Error> {
    if items.iter().all(|item| matches!(item, Expr::Literal { .. })) {
        let values = items
            .iter()
            .filter_map(|item| match item {
                Expr::Literal { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect();
        return v.visit_literal(&Literal::Array(values));
    }

    if items.iter().all(|item| matches!(item, Expr::Ident { .. })) {
        let idents = items
            .iter()
            .filter_map(|item| match item {
                Expr::Ident { span, path } => Some(V::Ident::from_path(path, *span)),
                _ => None,
            })
            .collect();
        return v.visit_ident_array(idents);
    }

    Err(TraversalError::UnsupportedExpressionNode {
        kind: "mixed array".to_string(),
        span,
    }
    .into())
}
