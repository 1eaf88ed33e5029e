//! Statement sequences.
//!
//! ```text
//! %r = q.alloc -> register<4>
//! q.h %r[0] : register<4>
//! %m = q.measure %r[0, 2] : register<4> -> i1
//! ```
//!
//! Line breaks carry no meaning to the grammar. They only matter for error
//! recovery, which resumes at the next line after a failing statement.

use log::debug;
use serde::Serialize;

use crate::asm::lexer::{Lexer, Spanned, Token, TokenStream};
use crate::asm::{parse_instruction_at, print_instruction, ParseCtx};
use crate::diagnostics::DiagnosticSink;
use crate::error::{ParseError, PrintError};
use crate::ir::catalog::OpCatalog;
use crate::ir::instr::{Instruction, ValueRef};

#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub results: Vec<ValueRef>,
    pub instruction: Instruction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

pub(crate) fn parse_statement(
    ts: &mut TokenStream<'_>,
    catalog: &OpCatalog,
    cx: &mut ParseCtx<'_>,
) -> Result<Statement, ParseError> {
    let start = ts.span();
    let mut names = Vec::new();
    if matches!(ts.peek(), Token::Value(_)) {
        loop {
            names.push(ts.expect_value()?);
            if !ts.eat(&Token::Comma) {
                break;
            }
        }
        ts.expect(&Token::Eq)?;
    }

    let instruction = parse_instruction_at(ts, catalog, cx)?;
    if names.len() != instruction.results().len() {
        return Err(ParseError::ResultCountMismatch {
            names: names.len(),
            types: instruction.results().len(),
            span: start.merge(ts.prev_span()),
        });
    }
    for ((name, span), ty) in names.iter().zip(instruction.results()) {
        cx.resolver.define(name, ty, *span)?;
    }

    Ok(Statement {
        results: names.into_iter().map(|(name, _)| name).collect(),
        instruction,
    })
}

/// Stops at the first error.
pub(crate) fn parse_program_strict(
    src: &str,
    catalog: &OpCatalog,
    cx: &mut ParseCtx<'_>,
) -> Result<Program, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut ts = TokenStream::new(&tokens);
    let mut program = Program::default();
    while !ts.at_eof() {
        program.statements.push(parse_statement(&mut ts, catalog, cx)?);
    }
    Ok(program)
}

/// Reports each failing statement to `sink` and carries on with the next line.
pub(crate) fn parse_program(
    src: &str,
    catalog: &OpCatalog,
    cx: &mut ParseCtx<'_>,
    sink: &mut dyn DiagnosticSink,
) -> Program {
    let tokens = tokenize_recovering(src, sink);
    let mut ts = TokenStream::new(&tokens);
    let mut program = Program::default();
    while !ts.at_eof() {
        match parse_statement(&mut ts, catalog, cx) {
            Ok(stmt) => program.statements.push(stmt),
            Err(err) => {
                debug!("skipping statement: {}", err);
                sink.report_error(src, &err);
                ts.skip_past_line(src, err.span().start);
            }
        }
    }
    program
}

// a line that fails to lex is reported, blanked out and lexing starts over
fn tokenize_recovering(src: &str, sink: &mut dyn DiagnosticSink) -> Vec<Spanned<Token>> {
    let mut text = std::borrow::Cow::Borrowed(src);
    loop {
        match Lexer::new(&text).tokenize() {
            Ok(tokens) => return tokens,
            Err(err) => {
                sink.report_error(src, &err);
                let at = (err.span().start as usize).min(text.len());
                let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
                let line_end = text[at..].find('\n').map_or(text.len(), |i| at + i);
                let mut blanked = String::with_capacity(text.len());
                blanked.push_str(&text[..line_start]);
                blanked.extend(std::iter::repeat(' ').take(line_end - line_start));
                blanked.push_str(&text[line_end..]);
                text = std::borrow::Cow::Owned(blanked);
            }
        }
    }
}

pub(crate) fn print_statement(out: &mut String, stmt: &Statement) -> Result<(), PrintError> {
    for (i, name) in stmt.results.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&name.to_string());
    }
    if !stmt.results.is_empty() {
        out.push_str(" = ");
    }
    out.push_str(&print_instruction(&stmt.instruction)?);
    Ok(())
}

pub(crate) fn print_program(program: &Program) -> Result<String, PrintError> {
    let mut out = String::new();
    for stmt in &program.statements {
        print_statement(&mut out, stmt)?;
        out.push('\n');
    }
    Ok(out)
}
