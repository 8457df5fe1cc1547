// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::AnalysisError;
use crate::ast::Literal;
use crate::traversal::Visitor;

/// Counts atomic conditions: the first one, then one per `and`/`or`.
#[derive(Debug, Default)]
pub struct ConditionCounter {
    count: usize,
}

impl ConditionCounter {
    fn first(&mut self) -> Result<(), AnalysisError> {
        if self.count == 0 {
            self.count = 1;
        }
        Ok(())
    }
}

impl Visitor for ConditionCounter {
    type Ident = String;
    type Output = usize;
    type Error = AnalysisError;

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        self.count += 1;
        Ok(())
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        self.count += 1;
        Ok(())
    }

    fn visit_literal(&mut self, _value: &Literal) -> Result<(), Self::Error> {
        self.first()
    }

    fn visit_ident(&mut self, _ident: String) -> Result<(), Self::Error> {
        self.first()
    }

    fn visit_ident_array(&mut self, _idents: Vec<String>) -> Result<(), Self::Error> {
        self.first()
    }

    fn start_function(&mut self, _name: &str) -> Result<(), Self::Error> {
        self.first()
    }

    fn result(self) -> Result<Self::Output, Self::Error> {
        Ok(self.count)
    }
}
