// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::Serialize;

use super::AnalysisError;
use crate::ast::{BinaryOp, Literal};
use crate::traversal::Visitor;

/// Right-hand side of an equality lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LookupValue {
    Literal(Literal),
    Ident(String),
}

/// `field == value` where `field` is rooted at the acting model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldLookup {
    pub field: String,
    pub value: LookupValue,
}

// OR of AND groups.
type Groups = Vec<Vec<FieldLookup>>;

#[derive(Debug, Default)]
struct Condition {
    lhs: Option<LookupValue>,
    op: Option<BinaryOp>,
    rhs: Option<LookupValue>,
    complex: bool,
    negated: bool,
}

impl Condition {
    const fn is_open(&self) -> bool {
        self.lhs.is_some() || self.op.is_some()
    }
}

#[derive(Debug)]
struct Frame {
    groups: Groups,
    chain: Groups,
    condition: Condition,
    // Closed group not yet known to be a standalone condition.
    closed: Option<Groups>,
    pending_not: bool,
    // Group used as a comparison operand; its lookups are discarded.
    operand: bool,
}

impl Frame {
    fn new(operand: bool) -> Self {
        Self {
            groups: vec![],
            chain: vec![vec![]],
            condition: Condition::default(),
            closed: None,
            pending_not: false,
            operand,
        }
    }
}

/// Extracts index-safe equality lookups as OR-of-AND groups.
#[derive(Debug)]
pub struct FieldLookups {
    model: String,
    frames: Vec<Frame>,
    function_depth: usize,
}

impl FieldLookups {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            frames: vec![Frame::new(false)],
            function_depth: 0,
        }
    }

    fn frame(&mut self) -> &mut Frame {
        // The root frame is never popped.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn operand(&mut self, value: Option<LookupValue>) {
        let frame = self.frame();
        let pending_not = std::mem::take(&mut frame.pending_not);
        let condition = &mut frame.condition;
        condition.negated |= pending_not;

        let shape = (
            condition.lhs.is_some(),
            condition.op.is_some(),
            condition.rhs.is_some(),
        );
        match (value, shape) {
            (Some(value), (false, false, _)) => condition.lhs = Some(value),
            (Some(value), (true, true, false)) => condition.rhs = Some(value),
            _ => condition.complex = true,
        }
    }

    fn lookup(&self, condition: Condition) -> Option<FieldLookup> {
        if condition.complex || condition.negated || condition.op != Some(BinaryOp::Eq) {
            return None;
        }

        let (lhs, rhs) = (condition.lhs?, condition.rhs?);
        let lhs_is_field = matches!(&lhs, LookupValue::Ident(i) if self.is_model_field(i));
        let rhs_is_field = matches!(&rhs, LookupValue::Ident(i) if self.is_model_field(i));
        let (field, value) = match (lhs, rhs) {
            (LookupValue::Ident(field), value) if lhs_is_field => (field, value),
            (value, LookupValue::Ident(field)) if rhs_is_field => (field, value),
            _ => return None,
        };

        // Equality against null or a list is not index-safe.
        if matches!(
            value,
            LookupValue::Literal(Literal::Null) | LookupValue::Literal(Literal::Array(_))
        ) {
            return None;
        }

        let field = if field == self.model {
            format!("{field}.id")
        } else {
            field
        };

        Some(FieldLookup { field, value })
    }

    fn is_model_field(&self, ident: &str) -> bool {
        ident == self.model
            || ident
                .strip_prefix(self.model.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    fn flush(&mut self) {
        let frame = self.frame();
        if let Some(closed) = frame.closed.take() {
            frame.chain = and(&frame.chain, &closed);
        }

        let condition = std::mem::take(&mut self.frame().condition);
        if condition.lhs.is_none() && !condition.complex {
            return;
        }

        let item = match self.lookup(condition) {
            Some(lookup) => vec![vec![lookup]],
            None => vec![vec![]],
        };
        let frame = self.frame();
        frame.chain = and(&frame.chain, &item);
    }

    fn finish(&mut self) -> Option<Frame> {
        self.flush();
        self.frames.pop()
    }
}

fn and(lhs: &Groups, rhs: &Groups) -> Groups {
    let mut out = vec![];
    for left in lhs {
        for right in rhs {
            let mut group = left.clone();
            for lookup in right {
                if !group.contains(lookup) {
                    group.push(lookup.clone());
                }
            }
            out.push(group);
        }
    }
    out
}

fn close(frame: Frame) -> Groups {
    let mut groups = frame.groups;
    groups.extend(frame.chain);
    groups
}

impl Visitor for FieldLookups {
    type Ident = String;
    type Output = Vec<Vec<FieldLookup>>;
    type Error = AnalysisError;

    fn start_term(&mut self, parenthesis: bool) -> Result<(), Self::Error> {
        if parenthesis && self.function_depth == 0 {
            let frame = self.frame();
            let operand = frame.condition.is_open();
            if operand {
                frame.condition.complex = true;
            }
            self.frames.push(Frame::new(operand));
        }
        Ok(())
    }

    fn end_term(&mut self, parenthesis: bool) -> Result<(), Self::Error> {
        if !parenthesis || self.function_depth > 0 || self.frames.len() < 2 {
            return Ok(());
        }

        if let Some(inner) = self.finish() {
            if inner.operand {
                return Ok(());
            }
            let frame = self.frame();
            let item = if std::mem::take(&mut frame.pending_not) {
                vec![vec![]]
            } else {
                close(inner)
            };
            // Merged on the next `and`/`or`/`)`, unless an operator makes
            // the group a comparison operand.
            frame.closed = Some(item);
        }
        Ok(())
    }

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.flush();
        }
        Ok(())
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.flush();
            let frame = self.frame();
            let chain = std::mem::replace(&mut frame.chain, vec![vec![]]);
            frame.groups.extend(chain);
        }
        Ok(())
    }

    fn visit_not(&mut self) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            let frame = self.frame();
            if frame.condition.is_open() {
                frame.condition.complex = true;
            } else {
                frame.pending_not = true;
            }
        }
        Ok(())
    }

    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.frame().condition.complex = true;
        }
        Ok(())
    }

    fn visit_operator(&mut self, op: BinaryOp) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            let frame = self.frame();
            if frame.closed.take().is_some() {
                frame.condition.complex = true;
            }
            let condition = &mut frame.condition;
            if condition.lhs.is_none() || condition.op.is_some() {
                condition.complex = true;
            } else {
                condition.op = Some(op);
            }
        }
        Ok(())
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.operand(Some(LookupValue::Literal(value.clone())));
        }
        Ok(())
    }

    fn visit_ident(&mut self, ident: String) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.operand(Some(LookupValue::Ident(ident)));
        }
        Ok(())
    }

    fn visit_ident_array(&mut self, _idents: Vec<String>) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.operand(None);
        }
        Ok(())
    }

    fn start_function(&mut self, _name: &str) -> Result<(), Self::Error> {
        if self.function_depth == 0 {
            self.operand(None);
        }
        self.function_depth += 1;
        Ok(())
    }

    fn end_function(&mut self) -> Result<(), Self::Error> {
        self.function_depth = self.function_depth.saturating_sub(1);
        Ok(())
    }

    fn result(mut self) -> Result<Self::Output, Self::Error> {
        let groups = self.finish().map(close).unwrap_or_default();
        Ok(groups)
    }
}
