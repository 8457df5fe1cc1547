// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use permsql::traversal::{walk, walk_source, SpannedIdent, TraversalError, Visitor};
use permsql::*;

/// Rebuilds source text from the callback stream and records every
/// identifier together with its position.
#[derive(Default)]
struct Rebuild {
    out: String,
    idents: Vec<SpannedIdent>,
    calls: Vec<String>,
}

impl Visitor for Rebuild {
    type Ident = SpannedIdent;
    type Output = (String, Vec<SpannedIdent>, Vec<String>);
    type Error = TraversalError;

    fn start_term(&mut self, parenthesis: bool) -> Result<(), Self::Error> {
        if parenthesis {
            self.out.push('(');
        }
        Ok(())
    }

    fn end_term(&mut self, parenthesis: bool) -> Result<(), Self::Error> {
        if parenthesis {
            self.out.push(')');
        }
        Ok(())
    }

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        self.out.push_str(" and ");
        Ok(())
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        self.out.push_str(" or ");
        Ok(())
    }

    fn visit_not(&mut self) -> Result<(), Self::Error> {
        self.out.push_str("not ");
        Ok(())
    }

    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        self.out.push('-');
        Ok(())
    }

    fn visit_operator(&mut self, op: BinaryOp) -> Result<(), Self::Error> {
        self.out.push(' ');
        self.out.push_str(op.symbol());
        self.out.push(' ');
        Ok(())
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<(), Self::Error> {
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn visit_ident(&mut self, ident: SpannedIdent) -> Result<(), Self::Error> {
        self.out.push_str(&ident.fragments.join("."));
        self.idents.push(ident);
        Ok(())
    }

    fn visit_ident_array(&mut self, idents: Vec<SpannedIdent>) -> Result<(), Self::Error> {
        let joined: Vec<String> = idents.iter().map(|i| i.fragments.join(".")).collect();
        self.out.push_str(&format!("[{}]", joined.join(", ")));
        self.idents.extend(idents);
        Ok(())
    }

    fn start_function(&mut self, name: &str) -> Result<(), Self::Error> {
        self.out.push_str(name);
        self.out.push('(');
        self.calls.push(name.to_string());
        Ok(())
    }

    fn visit_separator(&mut self) -> Result<(), Self::Error> {
        self.out.push_str(", ");
        Ok(())
    }

    fn end_function(&mut self) -> Result<(), Self::Error> {
        self.out.push(')');
        Ok(())
    }

    fn result(self) -> Result<Self::Output, Self::Error> {
        Ok((self.out, self.idents, self.calls))
    }
}

fn rebuild(source: &str) -> Result<String> {
    Ok(walk_source(source, Rebuild::default())?.0)
}

#[test]
fn round_trip_adds_no_parentheses() -> Result<()> {
    let source = "1 + 1 * 10 + 10 < 0 and true";
    assert_eq!(rebuild(source)?, source);
    Ok(())
}

#[test]
fn round_trip_keeps_required_parentheses() -> Result<()> {
    let source = "(a == b or a < c) and a > d";
    assert_eq!(rebuild(source)?, source);
    Ok(())
}

#[test]
fn grouping_follows_precedence_not_source() -> Result<()> {
    assert_eq!(rebuild("(1 + 2) * 3")?, "(1 + 2) * 3");
    assert_eq!(rebuild("1 + (2 * 3)")?, "1 + 2 * 3");
    assert_eq!(rebuild("a or (b or c)")?, "a or (b or c)");
    assert_eq!(rebuild("(a or b) or c")?, "a or b or c");
    assert_eq!(rebuild("not (a and b) or c")?, "not (a and b) or c");
    assert_eq!(rebuild("-(x + 1) > 2")?, "-(x + 1) > 2");
    Ok(())
}

#[test]
fn identifiers_carry_source_positions() -> Result<()> {
    let source = "post.author == ctx.identity and\n  post.public == true";
    let (_, idents, _) = walk_source(source, Rebuild::default())?;

    let positions: Vec<(String, u32, u32, u32)> = idents
        .iter()
        .map(|i| (i.fragments.join("."), i.span.line, i.span.column, i.span.offset))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("post.author".to_string(), 1, 1, 0),
            ("ctx.identity".to_string(), 1, 16, 15),
            ("post.public".to_string(), 2, 3, 34),
        ]
    );
    assert_eq!(idents[1].root(), "ctx");
    Ok(())
}

#[test]
fn function_calls_and_arrays() -> Result<()> {
    let source = r#"contains(post.tags, "a", 1) and post.role in [Role.Admin, Role.Owner]"#;
    let (out, idents, calls) = walk_source(source, Rebuild::default())?;
    assert_eq!(out, source);
    assert_eq!(calls, vec!["contains".to_string()]);
    assert_eq!(idents.len(), 3);
    Ok(())
}

#[test]
fn walk_reuses_a_parsed_expression() -> Result<()> {
    let expression = Expression::parse("a.b != null")?;
    let first = walk(&expression, Rebuild::default())?.0;
    let second = walk(&expression, Rebuild::default())?.0;
    assert_eq!(first, second);
    assert_eq!(first, "a.b != null");
    Ok(())
}

#[test]
fn mixed_arrays_are_rejected() {
    let err = walk_source("a in [1, b.c]", Rebuild::default());
    match err {
        Err(TraversalError::UnsupportedExpressionNode { kind, span }) => {
            assert_eq!(kind, "mixed array");
            assert_eq!((span.line, span.column), (1, 6));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn parse_failures_surface_as_traversal_errors() {
    assert!(matches!(
        walk_source("a and", Rebuild::default()),
        Err(TraversalError::ExpressionNotParseable(_))
    ));
}
