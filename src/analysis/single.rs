// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::marker::PhantomData;

use super::AnalysisError;
use crate::ast::{BinaryOp, Literal};
use crate::traversal::{IdentRepr, Visitor};

/// Conversion from a constant expression value.
pub trait FromLiteral: Sized {
    const TYPE_NAME: &'static str;

    fn from_literal(value: &Literal) -> Option<Self>;
}

impl FromLiteral for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_literal(value: &Literal) -> Option<Self> {
        match value {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromLiteral for String {
    const TYPE_NAME: &'static str = "string";

    fn from_literal(value: &Literal) -> Option<Self> {
        match value {
            Literal::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromLiteral for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn from_literal(value: &Literal) -> Option<Self> {
        match value {
            Literal::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

impl FromLiteral for f64 {
    const TYPE_NAME: &'static str = "number";

    fn from_literal(value: &Literal) -> Option<Self> {
        match value {
            Literal::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

impl<T: FromLiteral> FromLiteral for Vec<T> {
    const TYPE_NAME: &'static str = "array";

    fn from_literal(value: &Literal) -> Option<Self> {
        match value {
            Literal::Array(items) => items.iter().map(T::from_literal).collect(),
            _ => None,
        }
    }
}

impl FromLiteral for Literal {
    const TYPE_NAME: &'static str = "literal";

    fn from_literal(value: &Literal) -> Option<Self> {
        Some(value.clone())
    }
}

/// Asserts the expression is exactly one identifier.
#[derive(Debug)]
pub struct SingleIdentifier<I> {
    ident: Option<I>,
    other: bool,
}

impl<I> SingleIdentifier<I> {
    pub const fn new() -> Self {
        Self {
            ident: None,
            other: false,
        }
    }

    fn other(&mut self) -> Result<(), AnalysisError> {
        self.other = true;
        Ok(())
    }
}

impl<I> Default for SingleIdentifier<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: IdentRepr> Visitor for SingleIdentifier<I> {
    type Ident = I;
    type Output = I;
    type Error = AnalysisError;

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_not(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_operator(&mut self, _op: BinaryOp) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_literal(&mut self, _value: &Literal) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_ident(&mut self, ident: I) -> Result<(), Self::Error> {
        if self.ident.is_some() {
            return self.other();
        }
        self.ident = Some(ident);
        Ok(())
    }

    fn visit_ident_array(&mut self, _idents: Vec<I>) -> Result<(), Self::Error> {
        self.other()
    }

    fn start_function(&mut self, _name: &str) -> Result<(), Self::Error> {
        self.other()
    }

    fn result(self) -> Result<Self::Output, Self::Error> {
        match self.ident {
            Some(ident) if !self.other => Ok(ident),
            _ => Err(AnalysisError::NotSingleIdentifier),
        }
    }
}

/// Asserts the expression is one constant of type `T`.
#[derive(Debug)]
pub struct SingleValue<T> {
    value: Option<Literal>,
    other: bool,
    _type: PhantomData<T>,
}

impl<T> SingleValue<T> {
    pub const fn new() -> Self {
        Self {
            value: None,
            other: false,
            _type: PhantomData,
        }
    }

    fn other(&mut self) -> Result<(), AnalysisError> {
        self.other = true;
        Ok(())
    }
}

impl<T> Default for SingleValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromLiteral> Visitor for SingleValue<T> {
    type Ident = String;
    type Output = T;
    type Error = AnalysisError;

    fn visit_and(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_or(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_not(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_negate(&mut self) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_operator(&mut self, _op: BinaryOp) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<(), Self::Error> {
        if self.value.is_some() {
            return self.other();
        }
        self.value = Some(value.clone());
        Ok(())
    }

    fn visit_ident(&mut self, _ident: String) -> Result<(), Self::Error> {
        self.other()
    }

    fn visit_ident_array(&mut self, _idents: Vec<String>) -> Result<(), Self::Error> {
        self.other()
    }

    fn start_function(&mut self, _name: &str) -> Result<(), Self::Error> {
        self.other()
    }

    fn result(self) -> Result<Self::Output, Self::Error> {
        let value = match self.value {
            Some(value) if !self.other => value,
            _ => {
                return Err(AnalysisError::NotSingleValue {
                    expected: T::TYPE_NAME,
                })
            }
        };

        T::from_literal(&value).ok_or(AnalysisError::ValueTypeMismatch {
            expected: T::TYPE_NAME,
            found: value.type_name(),
        })
    }
}
