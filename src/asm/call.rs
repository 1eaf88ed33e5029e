//! Call form.
//!
//! ```text
//! q.call @body(2, %a[%i], %b) {inline} : register<4>, qubit -> circuit
//! ```
//!
//! The leading integer is the `count` tag. Each argument may carry an
//! accessor list; all argument operands come first in the record, followed by
//! every accessor reference in textual order.

use std::fmt::Write;
use std::sync::Arc;

use crate::asm::accessor::{parse_accessor_list, print_accessor_list, OperandCursor};
use crate::asm::lexer::{Span, Token, TokenStream};
use crate::asm::tags::{parse_tag_dict, print_tag_dict};
use crate::asm::types::{parse_type, parse_type_list, print_type_list};
use crate::asm::ParseCtx;
use crate::error::{ParseError, PrintError};
use crate::ir::catalog::OpKind;
use crate::ir::instr::{CallGroup, Instruction, Tag, CALLEE, CALL_COUNT};

pub(crate) fn parse_call(
    ts: &mut TokenStream<'_>,
    kind: Arc<OpKind>,
    mnemonic_span: Span,
    cx: &ParseCtx<'_>,
) -> Result<(Instruction, Vec<Span>), ParseError> {
    let callee = match ts.peek() {
        Token::Symbol(name) => {
            ts.advance();
            name.clone()
        }
        _ => return Err(ts.unexpected("callee symbol".to_owned())),
    };

    ts.expect(&Token::LParen)?;
    let count = ts.expect_int()?;
    let mut group = CallGroup::default();
    let mut arg_spans = Vec::new();
    let mut ref_spans = Vec::new();
    while ts.eat(&Token::Comma) {
        let (value, span) = ts.expect_value()?;
        let (list, spans) = parse_accessor_list(ts)?;
        arg_spans.push(span);
        ref_spans.extend(spans);
        group.push(value, list);
    }
    ts.expect_closing(&Token::RParen, ')')?;

    let tags = parse_tag_dict(ts)?;

    let expected = group.arg_count();
    let (types, types_span) = if ts.eat(&Token::Colon) {
        let start = ts.span();
        let types = parse_type_list(ts, cx.registry)?;
        (types, start.merge(ts.prev_span()))
    } else {
        (Vec::new(), ts.span())
    };
    if types.len() != expected {
        return Err(ParseError::OperandTypeCountMismatch {
            expected,
            got: types.len(),
            span: types_span,
        });
    }

    ts.expect(&Token::Arrow)?;
    let result = parse_type(ts, cx.registry)?;

    let instr = group
        .finish(kind, callee, count, types, &cx.registry.index(), tags, result)
        .map_err(|source| ParseError::InvalidType {
            source,
            span: mnemonic_span,
        })?;
    arg_spans.extend(ref_spans);
    Ok((instr, arg_spans))
}

pub(crate) fn print_call(out: &mut String, instr: &Instruction) -> Result<(), PrintError> {
    let mnemonic = instr.mnemonic();
    let callee = instr.callee().ok_or_else(|| PrintError::MissingTag {
        mnemonic: mnemonic.to_owned(),
        name: CALLEE.to_owned(),
    })?;
    let count = match instr.tags().get(CALL_COUNT) {
        Some(Tag::Int(n)) => *n,
        Some(_) => {
            return Err(PrintError::WrongTagKind {
                mnemonic: mnemonic.to_owned(),
                name: CALL_COUNT.to_owned(),
            })
        }
        None => {
            return Err(PrintError::MissingTag {
                mnemonic: mnemonic.to_owned(),
                name: CALL_COUNT.to_owned(),
            })
        }
    };
    if instr.operand_types().len() != instr.operands().len() {
        return Err(PrintError::TypeCountMismatch {
            mnemonic: mnemonic.to_owned(),
            operands: instr.operands().len(),
            types: instr.operand_types().len(),
        });
    }

    let args = instr.call_groups()?;
    write!(out, "{} @{}({}", mnemonic, callee, count)?;
    for arg in &args {
        write!(out, ", {}", arg.value)?;
        let mut cursor = OperandCursor::new(mnemonic, arg.refs);
        print_accessor_list(out, arg.accessors, &mut cursor)?;
        cursor.finish()?;
    }
    out.push(')');

    print_tag_dict(out, mnemonic, instr.tags())?;
    if !args.is_empty() {
        out.push_str(" : ");
        out.push_str(&print_type_list(&instr.operand_types()[..args.len()]));
    }
    if !instr.results().is_empty() {
        out.push_str(" -> ");
        out.push_str(&print_type_list(instr.results()));
    }
    Ok(())
}
