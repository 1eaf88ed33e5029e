//! Text form of value types.
//!
//! ```text
//! qubit  register<4>  register<>  gate1  gate2  cgate<2, gate1>  cgate<circuit>
//! circuit  index  i1  i64  f32
//! ```

use std::fmt;

use itertools::Itertools;

use crate::asm::lexer::{Span, Token, TokenStream};
use crate::error::ParseError;
use crate::ir::types::{Type, TypeKind, TypeRegistry};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Qubit => write!(f, "qubit"),
            TypeKind::Register { size: Some(n) } => write!(f, "register<{}>", n),
            TypeKind::Register { size: None } => write!(f, "register<>"),
            TypeKind::Gate1 => write!(f, "gate1"),
            TypeKind::Gate2 => write!(f, "gate2"),
            TypeKind::ControlledGate {
                controls: Some(n),
                base,
            } => write!(f, "cgate<{}, {}>", n, base),
            TypeKind::ControlledGate {
                controls: None,
                base,
            } => write!(f, "cgate<{}>", base),
            TypeKind::Circuit => write!(f, "circuit"),
            TypeKind::Index => write!(f, "index"),
            TypeKind::Integer { width } => write!(f, "i{}", width),
            TypeKind::Float { width } => write!(f, "f{}", width),
        }
    }
}

pub fn print_type(ty: &Type) -> String {
    ty.to_string()
}

pub fn print_type_list(types: &[Type]) -> String {
    types.iter().join(", ")
}

/// Parses one type at the cursor.
pub fn parse_type(ts: &mut TokenStream<'_>, registry: &TypeRegistry) -> Result<Type, ParseError> {
    let (keyword, start) = match ts.peek() {
        Token::Ident(word) => {
            let span = ts.advance().span;
            (word.as_str(), span)
        }
        _ => return Err(ts.unexpected("type".to_owned())),
    };

    let kind = match keyword {
        "qubit" => TypeKind::Qubit,
        "gate1" => TypeKind::Gate1,
        "gate2" => TypeKind::Gate2,
        "circuit" => TypeKind::Circuit,
        "index" => TypeKind::Index,
        "register" => {
            open_angle(ts, keyword)?;
            let size = match *ts.peek() {
                Token::Int(n) => {
                    ts.advance();
                    Some(parameter(n, keyword, ts.prev_span())?)
                }
                _ => None,
            };
            close_angle(ts, keyword)?;
            TypeKind::Register { size }
        }
        "cgate" => {
            open_angle(ts, keyword)?;
            let controls = match *ts.peek() {
                Token::Int(n) => {
                    ts.advance();
                    let n = parameter(n, keyword, ts.prev_span())?;
                    if !ts.eat(&Token::Comma) {
                        return Err(malformed(keyword, ts.span()));
                    }
                    Some(n)
                }
                _ => None,
            };
            if !matches!(ts.peek(), Token::Ident(_)) {
                return Err(malformed(keyword, ts.span()));
            }
            let base_span = ts.span();
            let base = parse_type(ts, registry)?;
            close_angle(ts, keyword)?;
            if !base.kind().is_controllable() {
                return Err(ParseError::InvalidBaseType {
                    base: base.to_string(),
                    span: base_span,
                });
            }
            TypeKind::ControlledGate { controls, base }
        }
        word => match scalar_kind(word) {
            Some(kind) => kind,
            None => {
                return Err(ParseError::UnknownType {
                    keyword: word.to_owned(),
                    span: start,
                })
            }
        },
    };

    let span = start.merge(ts.prev_span());
    registry
        .intern(kind)
        .map_err(|source| ParseError::InvalidType { source, span })
}

/// Parses `t ("," t)*`.
pub fn parse_type_list(ts: &mut TokenStream<'_>, registry: &TypeRegistry) -> Result<Vec<Type>, ParseError> {
    let mut types = vec![parse_type(ts, registry)?];
    while ts.eat(&Token::Comma) {
        types.push(parse_type(ts, registry)?);
    }
    Ok(types)
}

// `i<width>` / `f<width>`
fn scalar_kind(word: &str) -> Option<TypeKind> {
    let (prefix, digits) = word.split_at(1.min(word.len()));
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let width = digits.parse::<u32>().ok()?;
    match prefix {
        "i" => Some(TypeKind::Integer { width }),
        "f" => Some(TypeKind::Float { width }),
        _ => None,
    }
}

fn open_angle(ts: &mut TokenStream<'_>, keyword: &str) -> Result<(), ParseError> {
    if ts.eat(&Token::LAngle) {
        Ok(())
    } else {
        Err(malformed(keyword, ts.span()))
    }
}

fn close_angle(ts: &mut TokenStream<'_>, keyword: &str) -> Result<(), ParseError> {
    if ts.eat(&Token::RAngle) {
        Ok(())
    } else {
        Err(malformed(keyword, ts.span()))
    }
}

// negative or oversized parameters cannot be represented at all
fn parameter(n: i64, keyword: &str, span: Span) -> Result<u32, ParseError> {
    u32::try_from(n).map_err(|_| malformed(keyword, span))
}

fn malformed(keyword: &str, span: Span) -> ParseError {
    ParseError::MalformedType {
        keyword: keyword.to_owned(),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::Lexer;

    fn parse(reg: &TypeRegistry, src: &str) -> Result<Type, ParseError> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut ts = TokenStream::new(&tokens);
        let ty = parse_type(&mut ts, reg)?;
        ts.expect_eof()?;
        Ok(ty)
    }

    #[test]
    fn canonical_forms_round_trip() {
        let reg = TypeRegistry::new();
        for src in [
            "qubit",
            "register<4>",
            "register<>",
            "gate1",
            "gate2",
            "cgate<2, gate1>",
            "cgate<gate1>",
            "cgate<7, circuit>",
            "circuit",
            "index",
            "i1",
            "i64",
            "f32",
        ] {
            let ty = parse(&reg, src).unwrap();
            assert_eq!(print_type(&ty), src);
        }
    }

    #[test]
    fn parsing_interns() {
        let reg = TypeRegistry::new();
        let a = parse(&reg, "register<4>").unwrap();
        assert_eq!(a, reg.register(Some(4)).unwrap());
        let b = parse(&reg, "cgate< 2 ,gate1 >").unwrap();
        assert_eq!(b, reg.controlled_gate(Some(2), reg.gate1()).unwrap());
    }

    #[test]
    fn unknown_keyword() {
        let reg = TypeRegistry::new();
        let err = parse(&reg, "qbit").unwrap_err();
        assert!(matches!(err, ParseError::UnknownType { ref keyword, .. } if keyword == "qbit"));
        assert!(matches!(parse(&reg, "x64"), Err(ParseError::UnknownType { .. })));
    }

    #[test]
    fn malformed_parameters() {
        let reg = TypeRegistry::new();
        for src in ["register", "register<4", "register<-2>", "cgate<>", "cgate<2>", "cgate<2 gate1>", "cgate<gate1"] {
            let err = parse(&reg, src).unwrap_err();
            assert!(matches!(err, ParseError::MalformedType { .. }), "{}: {:?}", src, err);
        }
    }

    #[test]
    fn invalid_base_is_reported_after_the_structural_parse() {
        let reg = TypeRegistry::new();
        let err = parse(&reg, "cgate<3, qubit>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidBaseType { ref base, .. } if base == "qubit"));
        let err = parse(&reg, "cgate<register<4>>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidBaseType { ref base, .. } if base == "register<4>"));
    }

    #[test]
    fn constraint_violations_wrap_construction_errors() {
        let reg = TypeRegistry::new();
        for src in ["register<1>", "register<0>", "cgate<0, gate1>", "i0", "f8"] {
            let err = parse(&reg, src).unwrap_err();
            assert!(matches!(err, ParseError::InvalidType { .. }), "{}", src);
        }
    }

    #[test]
    fn type_list() {
        let reg = TypeRegistry::new();
        let tokens = Lexer::new("register<4>, qubit, index").tokenize().unwrap();
        let mut ts = TokenStream::new(&tokens);
        let list = parse_type_list(&mut ts, &reg).unwrap();
        assert_eq!(print_type_list(&list), "register<4>, qubit, index");
    }
}
