//! Generic operand lists.
//!
//! ```text
//! q.cx %a[0, %n, 1], %b {label = "x"} : register<4>, qubit
//! q.rz(0.5) %q : qubit
//! q.rz(%theta) %r[%i] : f64, register<>
//! ```
//!
//! Operands fill the kind's slots in order. A register slot may be followed
//! by an accessor list whose references become extra `index`-typed operands
//! right after the slot's main operand. The type list names only the
//! non-accessor operands.

use std::sync::Arc;

use log::warn;

use crate::asm::accessor::{parse_accessor_list, print_accessor_list, OperandCursor};
use crate::asm::lexer::{Span, Token, TokenStream};
use crate::asm::tags::{parse_tag_dict, print_tag_dict};
use crate::asm::types::{parse_type_list, print_type_list};
use crate::asm::ParseCtx;
use crate::error::{ConstructionError, ParseError, PrintError};
use crate::ir::catalog::{OpForm, OpKind, SlotKind};
use crate::ir::instr::{AccessorList, Instruction, OperandGroup, RotationParam, SEGMENT_SIZES};

/// Parses everything after the mnemonic of a generic or rotation instruction.
/// Returns the record and the span of every physical operand.
pub(crate) fn parse_generic(
    ts: &mut TokenStream<'_>,
    kind: Arc<OpKind>,
    mnemonic_span: Span,
    cx: &ParseCtx<'_>,
) -> Result<(Instruction, Vec<Span>), ParseError> {
    let mut group = OperandGroup::new(Arc::clone(&kind));
    let mut spans = Vec::new();

    if kind.form == OpForm::Rotation {
        parse_rotation(ts, &kind, mnemonic_span, &mut group, &mut spans, cx)?;
    }

    if let Some((mut value, mut span)) = ts.eat_value() {
        loop {
            let list = match group.next_slot() {
                None => {
                    return Err(ParseError::TooManyOperands {
                        mnemonic: kind.name.clone(),
                        max: kind.operand_slots().len(),
                        span,
                    })
                }
                Some(SlotKind::Register) => {
                    let (list, ref_spans) = parse_accessor_list(ts)?;
                    spans.push(span);
                    spans.extend(ref_spans);
                    list
                }
                Some(SlotKind::Plain) => {
                    if *ts.peek() == Token::LBracket {
                        return Err(ts.unexpected(format!(
                            "',' after {}, which takes no accessor list",
                            value
                        )));
                    }
                    spans.push(span);
                    AccessorList::default()
                }
            };
            group.push(value, list).map_err(|e| construction(e, span))?;

            if !ts.eat(&Token::Comma) {
                break;
            }
            (value, span) = ts.expect_value()?;
        }
    }

    if group.operand_count() < kind.required {
        return Err(ParseError::MissingOperands {
            mnemonic: kind.name.clone(),
            required: kind.required,
            found: group.operand_count(),
            span: ts.span(),
        });
    }

    let tags = parse_tag_dict(ts)?;

    let expected = group.typed_count();
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

    let results = if ts.eat(&Token::Arrow) {
        parse_type_list(ts, cx.registry)?
    } else {
        Vec::new()
    };

    let instr = group
        .finish(types, &cx.registry.index(), tags, results)
        .map_err(|e| construction(e, mnemonic_span))?;
    Ok((instr, spans))
}

fn parse_rotation(
    ts: &mut TokenStream<'_>,
    kind: &OpKind,
    mnemonic_span: Span,
    group: &mut OperandGroup,
    spans: &mut Vec<Span>,
    cx: &ParseCtx<'_>,
) -> Result<(), ParseError> {
    let missing = |span: Span| -> Result<(), ParseError> {
        if cx.options.allow_missing_rotation {
            warn!("'{}' has no rotation parameter, continuing without one", kind.name);
            Ok(())
        } else {
            Err(ParseError::MissingRotationParameter {
                mnemonic: kind.name.clone(),
                span,
            })
        }
    };

    if !ts.eat(&Token::LParen) {
        return missing(mnemonic_span);
    }
    match *ts.peek() {
        Token::Float(angle) => {
            ts.advance();
            group.set_angle(angle);
        }
        Token::Int(n) => {
            ts.advance();
            group.set_angle(n as f64);
        }
        Token::Value(_) => {
            if let Some((value, span)) = ts.eat_value() {
                group.set_angle_value(value);
                spans.push(span);
            }
        }
        Token::RParen => {
            missing(mnemonic_span.merge(ts.span()))?;
        }
        _ => return Err(ts.unexpected("rotation parameter".to_owned())),
    }
    ts.expect_closing(&Token::RParen, ')')?;
    Ok(())
}

fn construction(source: ConstructionError, span: Span) -> ParseError {
    match source {
        ConstructionError::TooManyOperands { mnemonic, max } => ParseError::TooManyOperands { mnemonic, max, span },
        source => ParseError::InvalidType { source, span },
    }
}

pub(crate) fn print_generic(out: &mut String, instr: &Instruction) -> Result<(), PrintError> {
    let kind = instr.kind();
    let mnemonic = instr.mnemonic();
    if instr.operand_types().len() != instr.operands().len() {
        return Err(PrintError::TypeCountMismatch {
            mnemonic: mnemonic.to_owned(),
            operands: instr.operands().len(),
            types: instr.operand_types().len(),
        });
    }
    out.push_str(mnemonic);

    match instr.rotation() {
        Some(RotationParam::Literal(angle)) => out.push_str(&format!("({:?})", angle)),
        Some(RotationParam::Value(value)) => out.push_str(&format!("({})", value)),
        None => {}
    }

    let groups = instr.slot_groups()?;
    // operands whose type is printed; accessor references are implicitly `index`
    let mut typed = Vec::with_capacity(groups.len());
    let mut at = 0usize;
    let mut register = 0usize;
    let mut printed = 0usize;
    let mut ended = false;
    let first = match kind.form {
        OpForm::Rotation => 1,
        OpForm::Generic | OpForm::Call => 0,
    };

    for (i, (slot, group)) in kind.slots.iter().zip(&groups).enumerate() {
        let elems = match slot {
            SlotKind::Register => {
                register += 1;
                instr.accessors(register - 1)?
            }
            SlotKind::Plain => &[],
        };
        let Some(main) = group.main else {
            // unfilled slots may only trail, and carry nothing
            if !group.accessors.is_empty() || !elems.is_empty() {
                return Err(wrong_segments(mnemonic));
            }
            if i >= first {
                ended = true;
            }
            continue;
        };
        typed.push(instr.operand_types()[at].clone());
        at += 1 + group.accessors.len();
        if i < first {
            // the rotation reference was printed in parentheses
            continue;
        }
        if ended {
            return Err(wrong_segments(mnemonic));
        }

        out.push_str(if printed == 0 { " " } else { ", " });
        out.push_str(&main.to_string());
        let mut cursor = OperandCursor::new(mnemonic, group.accessors);
        print_accessor_list(out, elems, &mut cursor)?;
        cursor.finish()?;
        printed += 1;
    }

    print_tag_dict(out, mnemonic, instr.tags())?;
    if !typed.is_empty() {
        out.push_str(" : ");
        out.push_str(&print_type_list(&typed));
    }
    if !instr.results().is_empty() {
        out.push_str(" -> ");
        out.push_str(&print_type_list(instr.results()));
    }
    Ok(())
}

fn wrong_segments(mnemonic: &str) -> PrintError {
    PrintError::WrongTagKind {
        mnemonic: mnemonic.to_owned(),
        name: SEGMENT_SIZES.to_owned(),
    }
}
