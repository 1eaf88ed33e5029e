use serde::Serialize;

use crate::error::ParseError;
use crate::ir::instr::ValueRef;

/// A half-open `[start, end)` byte range in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates a zero-length span at `pos`.
    pub fn at(pos: u32) -> Self {
        Self::new(pos, pos)
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare word: mnemonics (`q.h`), type keywords, tag names, `true`/`false`.
    Ident(String),
    /// `%name`, stored without the sigil.
    Value(String),
    /// `@name`, stored without the sigil.
    Symbol(String),
    Int(i64),
    Float(f64),
    Str(String),

    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    LAngle,   // <
    RAngle,   // >
    Comma,    // ,
    Colon,    // :
    Eq,       // =
    Arrow,    // ->

    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Value(s) => write!(f, "%{}", s),
            Token::Symbol(s) => write!(f, "@{}", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{:?}", n),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LAngle => write!(f, "<"),
            Token::RAngle => write!(f, ">"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Eq => write!(f, "="),
            Token::Arrow => write!(f, "->"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

pub struct Lexer<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Lexes the whole input. The returned vector always ends with `Token::Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Spanned<Token>>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(&b) = self.bytes.get(self.pos) else {
                tokens.push(Spanned {
                    node: Token::Eof,
                    span: Span::at(start as u32),
                });
                return Ok(tokens);
            };

            let node = match b {
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b'[' => self.single(Token::LBracket),
                b']' => self.single(Token::RBracket),
                b'{' => self.single(Token::LBrace),
                b'}' => self.single(Token::RBrace),
                b'<' => self.single(Token::LAngle),
                b'>' => self.single(Token::RAngle),
                b',' => self.single(Token::Comma),
                b':' => self.single(Token::Colon),
                b'=' => self.single(Token::Eq),
                b'-' if self.peek_byte(1) == Some(b'>') => {
                    self.pos += 2;
                    Token::Arrow
                }
                b'-' if self.peek_byte(1).is_some_and(|c| c.is_ascii_digit()) => self.number()?,
                b'0'..=b'9' => self.number()?,
                b'%' => Token::Value(self.sigiled(b'%')?),
                b'@' => Token::Symbol(self.sigiled(b'@')?),
                b'"' => self.string()?,
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    let text = self.take_while(is_word_byte);
                    Token::Ident(text.to_owned())
                }
                _ => {
                    let ch = self.src[start..].chars().next().unwrap_or('\0');
                    return Err(ParseError::UnexpectedChar {
                        ch,
                        span: Span::new(start as u32, (start + ch.len_utf8()) as u32),
                    });
                }
            };

            tokens.push(Spanned {
                node,
                span: Span::new(start as u32, self.pos as u32),
            });
        }
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn single(&mut self, tok: Token) -> Token {
        self.pos += 1;
        tok
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'s str {
        let start = self.pos;
        while self.bytes.get(self.pos).is_some_and(|&c| pred(c)) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    // whitespace plus `//` and `;` line comments
    fn skip_trivia(&mut self) {
        loop {
            match self.bytes.get(self.pos) {
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.peek_byte(1) == Some(b'/') => self.skip_line(),
                Some(b';') => self.skip_line(),
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        while self.bytes.get(self.pos).is_some_and(|&c| c != b'\n') {
            self.pos += 1;
        }
    }

    fn sigiled(&mut self, sigil: u8) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.take_while(is_word_byte);
        if name.is_empty() {
            return Err(ParseError::UnexpectedChar {
                ch: sigil as char,
                span: Span::new(start as u32, start as u32 + 1),
            });
        }
        Ok(name.to_owned())
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        if self.bytes[self.pos] == b'-' {
            self.pos += 1;
        }
        self.take_while(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let digit_at = match self.peek_byte(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self.peek_byte(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += digit_at;
                self.take_while(|c| c.is_ascii_digit());
            }
        }

        let text = &self.src[start..self.pos];
        let span = Span::new(start as u32, self.pos as u32);
        let invalid = || ParseError::InvalidLiteral {
            text: text.to_owned(),
            span,
        };
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| invalid())
        }
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                return Err(ParseError::UnterminatedString {
                    span: Span::new(start as u32, self.pos as u32),
                });
            };
            self.pos += ch.len_utf8();
            match ch {
                '"' => return Ok(Token::Str(out)),
                '\n' => {
                    return Err(ParseError::UnterminatedString {
                        span: Span::new(start as u32, self.pos as u32),
                    })
                }
                '\\' => {
                    let esc_start = self.pos - 1;
                    let escaped = self.src[self.pos..].chars().next();
                    let resolved = match escaped {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        _ => {
                            return Err(ParseError::InvalidLiteral {
                                text: format!("\\{}", escaped.map(String::from).unwrap_or_default()),
                                span: Span::new(esc_start as u32, self.pos as u32 + 1),
                            })
                        }
                    };
                    self.pos += 1;
                    out.push(resolved);
                }
                c => out.push(c),
            }
        }
    }
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b'$'
}

/// Whether `s` lexes as a single identifier (tag names, mnemonics).
pub(crate) fn is_bare_word(s: &str) -> bool {
    s.bytes().next().is_some_and(|c| c.is_ascii_alphabetic() || c == b'_') && s.bytes().all(is_word_byte)
}

/// Whether `s` can follow a `%` or `@` sigil.
pub(crate) fn is_sigil_name(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_word_byte)
}

// --- token cursor ---

/// Forward-only cursor over a lexed token slice, shared by every sub-codec.
pub struct TokenStream<'t> {
    tokens: &'t [Spanned<Token>],
    pos: usize,
}

impl<'t> TokenStream<'t> {
    pub fn new(tokens: &'t [Spanned<Token>]) -> Self {
        debug_assert!(matches!(tokens.last().map(|t| &t.node), Some(Token::Eof)));
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> &'t Token {
        &self.tokens[self.pos].node
    }

    pub fn peek_at(&self, offset: usize) -> &'t Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].node
    }

    pub fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    /// Span of the most recently consumed token.
    pub fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    pub fn advance(&mut self) -> &'t Spanned<Token> {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Consumes the next token if it equals `tok`.
    pub fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, tok: &Token) -> Result<Span, ParseError> {
        if self.peek() == tok {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(format!("'{}'", tok)))
        }
    }

    /// Like `expect`, for closing delimiters: reports `MissingDelimiter`.
    pub fn expect_closing(&mut self, tok: &Token, delimiter: char) -> Result<Span, ParseError> {
        if self.peek() == tok {
            Ok(self.advance().span)
        } else {
            Err(ParseError::MissingDelimiter {
                delimiter,
                found: self.peek().to_string(),
                span: self.span(),
            })
        }
    }

    pub fn eat_value(&mut self) -> Option<(ValueRef, Span)> {
        match self.peek() {
            Token::Value(name) => {
                let span = self.advance().span;
                Some((ValueRef::new(name.clone()), span))
            }
            _ => None,
        }
    }

    pub fn expect_value(&mut self) -> Result<(ValueRef, Span), ParseError> {
        self.eat_value()
            .ok_or_else(|| self.unexpected("value reference".to_owned()))
    }

    pub fn eat_int(&mut self) -> Option<i64> {
        match *self.peek() {
            Token::Int(n) => {
                self.advance();
                Some(n)
            }
            _ => None,
        }
    }

    pub fn expect_int(&mut self) -> Result<i64, ParseError> {
        self.eat_int()
            .ok_or_else(|| self.unexpected("integer".to_owned()))
    }

    pub fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek() {
            Token::Ident(name) => {
                let span = self.advance().span;
                Ok((name.clone(), span))
            }
            _ => Err(self.unexpected("identifier".to_owned())),
        }
    }

    pub fn expect_eof(&self) -> Result<(), ParseError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of input".to_owned()))
        }
    }

    pub fn unexpected(&self, expected: String) -> ParseError {
        ParseError::UnexpectedToken {
            expected,
            found: self.peek().to_string(),
            span: self.span(),
        }
    }

    /// Skips to the first token that starts on a later source line than `from`.
    pub fn skip_past_line(&mut self, src: &str, from: u32) {
        while !self.at_eof() {
            let start = self.span().start as usize;
            let from = (from as usize).min(start);
            if src[from..start].contains('\n') {
                return;
            }
            self.advance();
        }
    }
}
