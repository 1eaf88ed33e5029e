// `{name = literal, flag, ...}` dictionaries attached to instructions

use std::fmt::Write;

use crate::asm::lexer::{Token, TokenStream};
use crate::error::{ParseError, PrintError};
use crate::ir::instr::{is_reserved_tag, Tag, TagDict};

/// Parses a user tag dictionary if one starts at the cursor.
pub fn parse_tag_dict(ts: &mut TokenStream<'_>) -> Result<TagDict, ParseError> {
    let mut dict = TagDict::new();
    if !ts.eat(&Token::LBrace) {
        return Ok(dict);
    }
    if ts.eat(&Token::RBrace) {
        return Ok(dict);
    }

    loop {
        let (name, span) = ts.expect_ident()?;
        if is_reserved_tag(&name) {
            return Err(ParseError::ReservedTag { name, span });
        }
        let value = if ts.eat(&Token::Eq) {
            parse_literal(ts)?
        } else {
            Tag::Unit
        };
        if dict.contains(&name) {
            return Err(ParseError::DuplicateTag { name, span });
        }
        dict.insert(name, value);

        if !ts.eat(&Token::Comma) {
            ts.expect_closing(&Token::RBrace, '}')?;
            return Ok(dict);
        }
    }
}

fn parse_literal(ts: &mut TokenStream<'_>) -> Result<Tag, ParseError> {
    let tag = match ts.peek() {
        Token::Int(n) => Tag::Int(*n),
        Token::Float(x) => Tag::Float(*x),
        Token::Str(s) => Tag::Str(s.clone()),
        Token::Symbol(s) => Tag::Symbol(s.clone()),
        Token::Ident(word) if word == "true" => Tag::Bool(true),
        Token::Ident(word) if word == "false" => Tag::Bool(false),
        Token::Ident(word) if word == "unit" => Tag::Unit,
        Token::LBracket => {
            ts.advance();
            let mut items = Vec::new();
            if !ts.eat(&Token::RBracket) {
                loop {
                    items.push(parse_literal(ts)?);
                    if !ts.eat(&Token::Comma) {
                        ts.expect_closing(&Token::RBracket, ']')?;
                        break;
                    }
                }
            }
            return Ok(Tag::Array(items));
        }
        _ => return Err(ts.unexpected("tag value".to_owned())),
    };
    ts.advance();
    Ok(tag)
}

/// Prints the user tags of `dict` as ` {...}`, or nothing when there are none.
pub(crate) fn print_tag_dict(out: &mut String, mnemonic: &str, dict: &TagDict) -> Result<(), PrintError> {
    let mut user = dict.user_tags().peekable();
    if user.peek().is_none() {
        return Ok(());
    }
    out.push_str(" {");
    for (i, (name, tag)) in user.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(name);
        if *tag != Tag::Unit {
            out.push_str(" = ");
            print_literal(out, mnemonic, name, tag)?;
        }
    }
    out.push('}');
    Ok(())
}

fn print_literal(out: &mut String, mnemonic: &str, name: &str, tag: &Tag) -> Result<(), PrintError> {
    match tag {
        Tag::Unit => out.push_str("unit"),
        Tag::Bool(b) => write!(out, "{}", b)?,
        Tag::Int(n) => write!(out, "{}", n)?,
        Tag::Float(x) => write!(out, "{:?}", x)?,
        Tag::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Tag::Symbol(s) => write!(out, "@{}", s)?,
        Tag::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_literal(out, mnemonic, name, item)?;
            }
            out.push(']');
        }
        // structural payloads have no user-facing literal syntax
        Tag::Segments(_) | Tag::Accessors(_) | Tag::AccessorLists(_) => {
            return Err(PrintError::WrongTagKind {
                mnemonic: mnemonic.to_owned(),
                name: name.to_owned(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::Lexer;

    fn parse(src: &str) -> Result<TagDict, ParseError> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut ts = TokenStream::new(&tokens);
        let dict = parse_tag_dict(&mut ts)?;
        ts.expect_eof()?;
        Ok(dict)
    }

    fn reprint(src: &str) -> String {
        let mut out = String::new();
        print_tag_dict(&mut out, "q.h", &parse(src).unwrap()).unwrap();
        out
    }

    #[test]
    fn literals_round_trip_sorted() {
        assert_eq!(
            reprint(r#"{z = 1, label = "a\"b", flag, ratio = 0.25, f = @body, xs = [1, [true, false]]}"#),
            r#" {f = @body, flag, label = "a\"b", ratio = 0.25, xs = [1, [true, false]], z = 1}"#
        );
    }

    #[test]
    fn empty_dict_prints_nothing() {
        assert_eq!(reprint("{}"), "");
        assert_eq!(reprint(""), "");
    }

    #[test]
    fn reserved_and_duplicate_names() {
        assert!(matches!(parse("{operand_segment_sizes = 1}"), Err(ParseError::ReservedTag { .. })));
        assert!(matches!(parse("{accessors_3}"), Err(ParseError::ReservedTag { .. })));
        assert!(matches!(parse("{a = 1, a = 2}"), Err(ParseError::DuplicateTag { .. })));
    }

    #[test]
    fn unclosed_dict() {
        assert!(matches!(parse("{a = 1"), Err(ParseError::MissingDelimiter { delimiter: '}', .. })));
    }

    #[test]
    fn structural_tags_have_no_literal_form() {
        let mut dict = TagDict::new();
        dict.insert("weird", Tag::Segments(vec![1]));
        let mut out = String::new();
        assert!(matches!(
            print_tag_dict(&mut out, "q.h", &dict),
            Err(PrintError::WrongTagKind { .. })
        ));
    }
}
