// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use indexmap::IndexMap;

use super::AnalysisError;
use crate::traversal::{IdentRepr, Visitor};

/// Collects distinct identifiers in first-seen order.
#[derive(Debug)]
pub struct IdentifierCollector<I> {
    // Keyed by dotted path.
    idents: IndexMap<String, I>,
}

impl<I> IdentifierCollector<I> {
    pub fn new() -> Self {
        Self {
            idents: IndexMap::new(),
        }
    }
}

impl<I> Default for IdentifierCollector<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: IdentRepr> IdentifierCollector<I> {
    fn add(&mut self, ident: I) {
        self.idents.entry(ident.dotted()).or_insert(ident);
    }
}

impl<I: IdentRepr> Visitor for IdentifierCollector<I> {
    type Ident = I;
    type Output = Vec<I>;
    type Error = AnalysisError;

    fn visit_ident(&mut self, ident: I) -> Result<(), Self::Error> {
        self.add(ident);
        Ok(())
    }

    fn visit_ident_array(&mut self, idents: Vec<I>) -> Result<(), Self::Error> {
        for ident in idents {
            self.add(ident);
        }
        Ok(())
    }

    fn result(self) -> Result<Self::Output, Self::Error> {
        Ok(self.idents.into_values().collect())
    }
}
