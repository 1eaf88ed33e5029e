// slice accessors: `[start, length, stride]`, each a constant or a %value

use std::fmt::Write;

use crate::asm::lexer::{Span, Token, TokenStream};
use crate::error::{ParseError, PrintError};
use crate::ir::instr::{AccessorElem, AccessorList, ValueRef, MAX_ACCESSOR_ELEMS};

/// Parses an optional accessor list. Without a leading `[` nothing is
/// consumed and the empty list is returned. Also yields the span of every
/// reference, in order.
pub fn parse_accessor_list(ts: &mut TokenStream<'_>) -> Result<(AccessorList, Vec<Span>), ParseError> {
    let mut list = AccessorList::default();
    let mut spans = Vec::new();
    if !ts.eat(&Token::LBracket) {
        return Ok((list, spans));
    }
    if ts.eat(&Token::RBracket) {
        return Ok((list, spans));
    }

    loop {
        if let Some((value, span)) = ts.eat_value() {
            list.elems.push(AccessorElem::Dynamic);
            list.refs.push(value);
            spans.push(span);
        } else if let Some(n) = ts.eat_int() {
            list.elems.push(AccessorElem::Constant(n));
        } else {
            return Err(ParseError::ExpectedOperandOrInteger {
                found: ts.peek().to_string(),
                span: ts.span(),
            });
        }

        if list.elems.len() < MAX_ACCESSOR_ELEMS && ts.eat(&Token::Comma) {
            continue;
        }
        ts.expect_closing(&Token::RBracket, ']')?;
        return Ok((list, spans));
    }
}

/// Pulls operands for `Dynamic` accessor elements while printing.
pub(crate) struct OperandCursor<'a> {
    mnemonic: &'a str,
    rest: &'a [ValueRef],
}

impl<'a> OperandCursor<'a> {
    pub(crate) fn new(mnemonic: &'a str, operands: &'a [ValueRef]) -> Self {
        OperandCursor {
            mnemonic,
            rest: operands,
        }
    }

    pub(crate) fn next(&mut self) -> Result<&'a ValueRef, PrintError> {
        let (first, rest) = self.rest.split_first().ok_or_else(|| PrintError::OperandUnderflow {
            mnemonic: self.mnemonic.to_owned(),
        })?;
        self.rest = rest;
        Ok(first)
    }

    /// Fails if operands were left over.
    pub(crate) fn finish(self) -> Result<(), PrintError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(PrintError::OperandOverflow {
                mnemonic: self.mnemonic.to_owned(),
                extra: self.rest.len(),
            })
        }
    }
}

/// Prints `elems`, pulling one operand from `cursor` per `Dynamic` element.
/// An empty list prints nothing.
pub(crate) fn print_accessor_list(
    out: &mut String,
    elems: &[AccessorElem],
    cursor: &mut OperandCursor<'_>,
) -> Result<(), PrintError> {
    if elems.is_empty() {
        return Ok(());
    }
    out.push('[');
    for (i, elem) in elems.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match elem {
            AccessorElem::Constant(n) => write!(out, "{}", n)?,
            AccessorElem::Dynamic => write!(out, "{}", cursor.next()?)?,
        }
    }
    out.push(']');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::Lexer;

    fn parse(src: &str) -> Result<AccessorList, ParseError> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut ts = TokenStream::new(&tokens);
        let (list, _) = parse_accessor_list(&mut ts)?;
        ts.expect_eof()?;
        Ok(list)
    }

    #[test]
    fn mixed_elements() {
        let list = parse("[0, %n, -1]").unwrap();
        assert_eq!(
            list.elems,
            vec![AccessorElem::Constant(0), AccessorElem::Dynamic, AccessorElem::Constant(-1)]
        );
        assert_eq!(list.refs, vec![ValueRef::new("n")]);
    }

    #[test]
    fn absent_and_empty_brackets_agree() {
        assert_eq!(parse("").unwrap(), AccessorList::default());
        assert_eq!(parse("[]").unwrap(), AccessorList::default());
    }

    #[test]
    fn fourth_element_is_a_missing_delimiter_at_the_comma() {
        let src = "[1, 2, 3, 4]";
        let err = parse(src).unwrap_err();
        match err {
            ParseError::MissingDelimiter { delimiter, span, .. } => {
                assert_eq!(delimiter, ']');
                assert_eq!(&src[span.start as usize..span.end as usize], ",");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn bad_element() {
        for src in ["[@f]", "[1, ]", "[1.5]"] {
            assert!(matches!(parse(src), Err(ParseError::ExpectedOperandOrInteger { .. })), "{}", src);
        }
    }

    #[test]
    fn unclosed() {
        assert!(matches!(parse("[1, 2"), Err(ParseError::MissingDelimiter { delimiter: ']', .. })));
    }

    #[test]
    fn printing_pulls_operands_in_order() {
        let ops = [ValueRef::new("i"), ValueRef::new("j")];
        let mut cursor = OperandCursor::new("q.h", &ops);
        let mut out = String::new();
        print_accessor_list(
            &mut out,
            &[AccessorElem::Dynamic, AccessorElem::Constant(2), AccessorElem::Dynamic],
            &mut cursor,
        )
        .unwrap();
        assert_eq!(out, "[%i, 2, %j]");
        cursor.finish().unwrap();
    }

    #[test]
    fn printing_reports_underflow() {
        let mut cursor = OperandCursor::new("q.h", &[]);
        let mut out = String::new();
        let err = print_accessor_list(&mut out, &[AccessorElem::Dynamic], &mut cursor).unwrap_err();
        assert!(matches!(err, PrintError::OperandUnderflow { .. }));
    }
}
