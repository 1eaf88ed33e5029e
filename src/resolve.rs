//! Value reference resolution.
//!
//! The host IR owns value identity; the codec only reports every use and
//! definition it sees together with the type the text gives it.

use std::collections::HashMap;

use crate::asm::lexer::Span;
use crate::error::ParseError;
use crate::ir::instr::ValueRef;
use crate::ir::types::Type;

pub trait ValueResolver {
    /// Called for every operand after the instruction's types are known.
    fn resolve(&mut self, value: &ValueRef, ty: &Type, span: Span) -> Result<(), ParseError>;

    /// Called for every result name bound by a statement.
    fn define(&mut self, value: &ValueRef, ty: &Type, span: Span) -> Result<(), ParseError>;
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenScope;

impl ValueResolver for OpenScope {
    fn resolve(&mut self, _value: &ValueRef, _ty: &Type, _span: Span) -> Result<(), ParseError> {
        Ok(())
    }

    fn define(&mut self, _value: &ValueRef, _ty: &Type, _span: Span) -> Result<(), ParseError> {
        Ok(())
    }
}

/// Checks that every name is used with one type throughout, and defined at
/// most once. Names used before (or without) a definition are typed by their
/// first use.
#[derive(Debug, Default)]
pub struct TypedScope {
    seen: HashMap<ValueRef, Type>,
    defined: HashMap<ValueRef, Span>,
}

impl TypedScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, value: &ValueRef) -> Option<&Type> {
        self.seen.get(value)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn check(&mut self, value: &ValueRef, ty: &Type, span: Span) -> Result<(), ParseError> {
        match self.seen.get(value) {
            Some(known) if known != ty => Err(ParseError::ValueTypeMismatch {
                name: value.name().to_owned(),
                expected: known.to_string(),
                found: ty.to_string(),
                span,
            }),
            Some(_) => Ok(()),
            None => {
                self.seen.insert(value.clone(), ty.clone());
                Ok(())
            }
        }
    }
}

impl ValueResolver for TypedScope {
    fn resolve(&mut self, value: &ValueRef, ty: &Type, span: Span) -> Result<(), ParseError> {
        self.check(value, ty, span)
    }

    fn define(&mut self, value: &ValueRef, ty: &Type, span: Span) -> Result<(), ParseError> {
        if self.defined.contains_key(value) {
            return Err(ParseError::DuplicateDefinition {
                name: value.name().to_owned(),
                span,
            });
        }
        self.check(value, ty, span)?;
        self.defined.insert(value.clone(), span);
        Ok(())
    }
}
