//! Assembly text codec.
//!
//! Every parser works over a `TokenStream`; every printer appends to a
//! `String`. `Codec` ties them to one type registry and instruction catalog.

pub mod accessor;
pub mod call;
pub mod lexer;
pub mod operands;
pub mod program;
pub mod tags;
pub mod types;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::asm::lexer::{Lexer, Span, TokenStream};
use crate::asm::program::Program;
use crate::diagnostics::DiagnosticSink;
use crate::error::{ParseError, PrintError};
use crate::ir::catalog::{OpCatalog, OpForm};
use crate::ir::instr::{CallBuilder, Instruction, InstructionBuilder};
use crate::ir::types::{Type, TypeRegistry};
use crate::resolve::{OpenScope, ValueResolver};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Accept rotation instructions written without their parameter.
    #[serde(default)]
    pub allow_missing_rotation: bool,
}

/// State threaded through one parse.
pub(crate) struct ParseCtx<'a> {
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) options: &'a ParseOptions,
    pub(crate) resolver: &'a mut dyn ValueResolver,
}

/// Parses one instruction, mnemonic included, and resolves its operands.
pub(crate) fn parse_instruction_at(
    ts: &mut TokenStream<'_>,
    catalog: &OpCatalog,
    cx: &mut ParseCtx<'_>,
) -> Result<Instruction, ParseError> {
    let (name, span) = ts.expect_ident()?;
    let kind = match catalog.get(&name) {
        Some(kind) => kind.clone(),
        None => return Err(ParseError::UnknownInstruction { name, span }),
    };
    let (instr, spans) = match kind.form {
        OpForm::Generic | OpForm::Rotation => operands::parse_generic(ts, kind, span, cx)?,
        OpForm::Call => call::parse_call(ts, kind, span, cx)?,
    };
    resolve_operands(&instr, &spans, &mut *cx.resolver)?;
    trace!("parsed {} with {} operands", instr.mnemonic(), instr.operands().len());
    Ok(instr)
}

fn resolve_operands(
    instr: &Instruction,
    spans: &[Span],
    resolver: &mut dyn ValueResolver,
) -> Result<(), ParseError> {
    for ((value, ty), span) in instr
        .operands()
        .iter()
        .zip(instr.operand_types())
        .zip(spans)
    {
        resolver.resolve(value, ty, *span)?;
    }
    Ok(())
}

/// Prints one instruction in canonical form.
pub fn print_instruction(instr: &Instruction) -> Result<String, PrintError> {
    let mut out = String::new();
    match instr.kind().form {
        OpForm::Generic | OpForm::Rotation => operands::print_generic(&mut out, instr)?,
        OpForm::Call => call::print_call(&mut out, instr)?,
    }
    Ok(out)
}

/// Registry, catalog and options for parsing and printing.
pub struct Codec {
    registry: TypeRegistry,
    catalog: OpCatalog,
    options: ParseOptions,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(OpCatalog::quantum())
    }
}

impl Codec {
    pub fn new(catalog: OpCatalog) -> Self {
        Codec {
            registry: TypeRegistry::new(),
            catalog,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &OpCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses a complete type, e.g. `cgate<2, gate1>`.
    pub fn parse_type(&self, text: &str) -> Result<Type, ParseError> {
        let tokens = Lexer::new(text).tokenize()?;
        let mut ts = TokenStream::new(&tokens);
        let ty = types::parse_type(&mut ts, &self.registry)?;
        ts.expect_eof()?;
        Ok(ty)
    }

    pub fn print_type(&self, ty: &Type) -> String {
        types::print_type(ty)
    }

    pub fn parse_instruction(&self, text: &str) -> Result<Instruction, ParseError> {
        self.parse_instruction_with(text, &mut OpenScope)
    }

    pub fn parse_instruction_with(
        &self,
        text: &str,
        resolver: &mut dyn ValueResolver,
    ) -> Result<Instruction, ParseError> {
        let tokens = Lexer::new(text).tokenize()?;
        let mut ts = TokenStream::new(&tokens);
        let mut cx = self.context(resolver);
        let instr = parse_instruction_at(&mut ts, &self.catalog, &mut cx)?;
        ts.expect_eof()?;
        Ok(instr)
    }

    pub fn print_instruction(&self, instr: &Instruction) -> Result<String, PrintError> {
        print_instruction(instr)
    }

    /// Parses every statement it can, reporting the rest to `sink`.
    pub fn parse_program(
        &self,
        src: &str,
        resolver: &mut dyn ValueResolver,
        sink: &mut dyn DiagnosticSink,
    ) -> Program {
        let mut cx = self.context(resolver);
        program::parse_program(src, &self.catalog, &mut cx, sink)
    }

    pub fn parse_program_strict(
        &self,
        src: &str,
        resolver: &mut dyn ValueResolver,
    ) -> Result<Program, ParseError> {
        let mut cx = self.context(resolver);
        program::parse_program_strict(src, &self.catalog, &mut cx)
    }

    pub fn print_program(&self, program: &Program) -> Result<String, PrintError> {
        program::print_program(program)
    }

    /// Starts building a generic or rotation instruction of kind `mnemonic`.
    pub fn builder(&self, mnemonic: &str) -> Option<InstructionBuilder<'_>> {
        let kind = self.catalog.get(mnemonic)?;
        Some(InstructionBuilder::new(kind.clone(), &self.registry))
    }

    pub fn call_builder(&self, mnemonic: &str, callee: &str, count: i64) -> Option<CallBuilder<'_>> {
        let kind = self.catalog.get(mnemonic)?;
        Some(CallBuilder::new(kind.clone(), &self.registry, callee, count))
    }

    fn context<'a>(&'a self, resolver: &'a mut dyn ValueResolver) -> ParseCtx<'a> {
        ParseCtx {
            registry: &self.registry,
            options: &self.options,
            resolver,
        }
    }
}
