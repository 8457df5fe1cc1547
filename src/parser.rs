// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::lexer::{Lexer, ParseError, SourceSpan, Token, TokenKind};

const KEYWORDS: &[&str] = &["and", "or", "not", "in", "true", "false", "null"];

/// Precedence-climbing parser for schema expressions.
#[derive(Clone)]
pub struct Parser<'source> {
    source: &'source str,
    lexer: Lexer<'source>,
    tok: Token,
    lookahead: Option<Token>,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        let lexer = Lexer::new(source);
        Self {
            source,
            lexer,
            // Replaced by the first real token in parse().
            tok: Token(
                TokenKind::Eof,
                crate::lexer::Span {
                    line: 1,
                    col: 1,
                    start: 0,
                    end: 0,
                },
            ),
            lookahead: None,
        }
    }

    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.source.trim().is_empty() {
            return Err(ParseError::new(
                "empty expression",
                SourceSpan {
                    line: 1,
                    column: 1,
                    offset: 0,
                },
            ));
        }

        self.next_token()?;
        let expr = self.parse_expr(0)?;
        if self.tok.0 != TokenKind::Eof {
            return Err(self.error(&format!("unexpected token '{}'", self.token_text())));
        }
        Ok(expr)
    }

    fn token_text(&self) -> &'source str {
        self.tok.1.text(self.source)
    }

    fn span(&self) -> SourceSpan {
        self.tok.1.source_span()
    }

    fn error(&self, msg: &str) -> ParseError {
        ParseError::new(msg, self.span())
    }

    fn next_token(&mut self) -> Result<(), ParseError> {
        self.tok = match self.lookahead.take() {
            Some(tok) => tok,
            None => self.lexer.next_token()?,
        };
        Ok(())
    }

    fn peek_token(&mut self) -> Result<Token, ParseError> {
        if let Some(tok) = self.lookahead {
            return Ok(tok);
        }
        let tok = self.lexer.next_token()?;
        self.lookahead = Some(tok);
        Ok(tok)
    }

    fn is_symbol(&self, symbol: &str) -> bool {
        self.tok.0 == TokenKind::Symbol && self.token_text() == symbol
    }

    fn expect(&mut self, symbol: &str, context: &str) -> Result<(), ParseError> {
        if !self.is_symbol(symbol) {
            return Err(self.error(&format!(
                "expecting '{symbol}' {context}, found '{}'",
                self.token_text()
            )));
        }
        self.next_token()
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Ident => BinaryOp::from_symbol(self.token_text()),
            _ => None,
        }
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = self.binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            let span = self.span();
            self.next_token()?;

            let next_min = if op.is_left_associative() {
                precedence + 1
            } else {
                precedence
            };
            let rhs = self.parse_expr(next_min)?;
            lhs = Expr::Binary {
                span,
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        let op = match (self.tok.0, self.token_text()) {
            (TokenKind::Ident, "not") | (TokenKind::Symbol, "!") => UnaryOp::Not,
            (TokenKind::Symbol, "-") => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.next_token()?;
        let operand = self.parse_unary()?;

        // Fold negative number literals.
        if let (UnaryOp::Neg, Expr::Literal { value: Literal::Number(n), .. }) = (op, &operand) {
            if let Ok(negated) = serde_json::from_str::<serde_json::Number>(&format!("-{n}")) {
                return Ok(Expr::Literal {
                    span,
                    value: Literal::Number(negated),
                });
            }
        }

        Ok(Expr::Unary {
            span,
            op,
            expr: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        match self.tok.0 {
            TokenKind::Number => {
                let value = serde_json::from_str::<serde_json::Number>(self.token_text())
                    .map_err(|_| self.error("invalid number"))?;
                self.next_token()?;
                Ok(Expr::Literal {
                    span,
                    value: Literal::Number(value),
                })
            }
            TokenKind::String => {
                let value = serde_json::from_str::<String>(self.token_text())
                    .map_err(|e| self.error(&format!("invalid string literal: {e}")))?;
                self.next_token()?;
                Ok(Expr::Literal {
                    span,
                    value: Literal::String(value),
                })
            }
            TokenKind::Symbol if self.is_symbol("(") => {
                self.next_token()?;
                let expr = self.parse_expr(0)?;
                self.expect(")", "to close parenthesized expression")?;
                Ok(expr)
            }
            TokenKind::Symbol if self.is_symbol("[") => self.parse_array(span),
            TokenKind::Ident => match self.token_text() {
                "true" | "false" => {
                    let value = self.token_text() == "true";
                    self.next_token()?;
                    Ok(Expr::Literal {
                        span,
                        value: Literal::Bool(value),
                    })
                }
                "null" => {
                    self.next_token()?;
                    Ok(Expr::Literal {
                        span,
                        value: Literal::Null,
                    })
                }
                text if KEYWORDS.contains(&text) => {
                    Err(self.error(&format!("unexpected keyword '{text}'")))
                }
                _ => self.parse_ident_or_call(span),
            },
            TokenKind::Eof => Err(self.error("unexpected end of expression")),
            _ => Err(self.error(&format!("unexpected token '{}'", self.token_text()))),
        }
    }

    fn parse_ident_or_call(&mut self, span: SourceSpan) -> Result<Expr, ParseError> {
        let mut path = vec![self.token_text().to_string()];
        self.next_token()?;

        while self.is_symbol(".") {
            let next = self.peek_token()?;
            if next.0 != TokenKind::Ident {
                self.next_token()?;
                return Err(self.error("expecting identifier after '.'"));
            }
            self.next_token()?;
            path.push(self.token_text().to_string());
            self.next_token()?;
        }

        if !self.is_symbol("(") {
            return Ok(Expr::Ident { span, path });
        }

        self.next_token()?;
        let mut args = vec![];
        if !self.is_symbol(")") {
            loop {
                args.push(self.parse_expr(0)?);
                if self.is_symbol(",") {
                    self.next_token()?;
                } else {
                    break;
                }
            }
        }
        self.expect(")", "to close function call")?;

        Ok(Expr::Call {
            span,
            name: path.join("."),
            args,
        })
    }

    fn parse_array(&mut self, span: SourceSpan) -> Result<Expr, ParseError> {
        self.next_token()?;
        let mut items = vec![];
        if !self.is_symbol("]") {
            loop {
                items.push(self.parse_expr(0)?);
                if self.is_symbol(",") {
                    self.next_token()?;
                } else {
                    break;
                }
            }
        }
        self.expect("]", "to close array")?;
        Ok(Expr::Array { span, items })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn parse(source: &str) -> Expr {
        Parser::new(source).parse().unwrap()
    }

    fn op_of(expr: &Expr) -> BinaryOp {
        match expr {
            Expr::Binary { op, .. } => *op,
            other => panic!("expected binary expression, got {other:?}"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("a or b and c");
        assert_eq!(op_of(&expr), BinaryOp::Or);
        let Expr::Binary { rhs, .. } = expr else {
            panic!()
        };
        assert_eq!(op_of(&rhs), BinaryOp::And);
    }

    #[test]
    fn arithmetic_is_left_associative() {
        let Expr::Binary { op, lhs, .. } = parse("1 - 2 - 3") else {
            panic!()
        };
        assert_eq!(op, BinaryOp::Sub);
        assert_eq!(op_of(&lhs), BinaryOp::Sub);
    }

    #[test]
    fn not_binds_tighter_than_comparison() {
        let Expr::Binary { op, lhs, .. } = parse("not a == b") else {
            panic!()
        };
        assert_eq!(op, BinaryOp::Eq);
        assert!(matches!(*lhs, Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn identifier_paths_and_calls() {
        assert_eq!(
            parse("post.author.identity"),
            Expr::Ident {
                span: SourceSpan {
                    line: 1,
                    column: 1,
                    offset: 0
                },
                path: vec!["post".into(), "author".into(), "identity".into()],
            }
        );
        let Expr::Call { name, args, .. } = parse("ctx.hasRole(\"admin\", 2)") else {
            panic!()
        };
        assert_eq!(name, "ctx.hasRole");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn negative_numbers_fold() {
        let Expr::Binary { rhs, .. } = parse("post.rating > -5") else {
            panic!()
        };
        assert!(matches!(
            *rhs,
            Expr::Literal { value: Literal::Number(ref n), .. } if n.to_string() == "-5"
        ));
    }

    #[test]
    fn malformed_expressions() {
        for source in [
            "",
            "   ",
            "a ==",
            "== a",
            "(a == b",
            "a == b)",
            "[1, 2",
            "post.",
            "a and",
            "a b",
            "a = b",
            "a & b",
            "in",
        ] {
            assert!(Parser::new(source).parse().is_err(), "{source} parsed");
        }
    }
}
