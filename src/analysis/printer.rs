// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt::Write as _;

use super::AnalysisError;
use crate::ast::{BinaryOp, Literal, UnaryOp};
use crate::traversal::Visitor;

/// Re-renders an expression in canonical form.
#[derive(Debug, Default)]
pub struct Printer {
    out: String,
}

impl Visitor for Printer {
    type Ident = String;
    type Output = String;
    type Error = AnalysisError;

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
        self.out.push_str(UnaryOp::Not.symbol());
        Ok(())
    }

    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        self.out.push_str(UnaryOp::Neg.symbol());
        Ok(())
    }

    fn visit_operator(&mut self, op: BinaryOp) -> Result<(), Self::Error> {
        let _ = write!(self.out, " {op} ");
        Ok(())
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<(), Self::Error> {
        let _ = write!(self.out, "{value}");
        Ok(())
    }

    fn visit_ident(&mut self, ident: String) -> Result<(), Self::Error> {
        self.out.push_str(&ident);
        Ok(())
    }

    fn visit_ident_array(&mut self, idents: Vec<String>) -> Result<(), Self::Error> {
        let _ = write!(self.out, "[{}]", idents.join(", "));
        Ok(())
    }

    fn start_function(&mut self, name: &str) -> Result<(), Self::Error> {
        let _ = write!(self.out, "{name}(");
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
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::analysis::render;
    use crate::ast::Expression;

    fn round_trip(source: &str) -> String {
        render(&Expression::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn canonical_source_is_stable() {
        for source in [
            "1 + 1 * 10 + 10 < 0 and true",
            "(a == b or a < c) and a > d",
            "not (post.a or post.b)",
            "post.status in [Status.Draft, Status.Live]",
            r#"f(post.a, "x\"y", [1, 2]) == -3"#,
        ] {
            assert_eq!(round_trip(source), source);
        }
    }

    #[test]
    fn normalizes_operators_and_parentheses() {
        assert_eq!(round_trip("((a && b)) || !c"), "a and b or not c");
        assert_eq!(round_trip("a and (b and c)"), "a and (b and c)");
    }
}
