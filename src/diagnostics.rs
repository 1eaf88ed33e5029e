//! Source positions, diagnostic sinks and rustc-style rendering.

use std::fmt;

use log::error;
use serde::Serialize;

use crate::error::ParseError;

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Converts a byte offset within `source` to a line/column position.
///
/// ```text
/// "abc\ndef\n", byte 4  -> 2:1
/// "hello",      byte 2  -> 1:3
/// ```
pub fn byte_to_line_col(source: &str, byte: u32) -> Position {
    let byte = byte as usize;
    let mut line = 1u32;
    let mut column = 1u32;
    for (i, ch) in source.char_indices() {
        if i >= byte {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    Position { line, column }
}

/// Receives the errors a recovering parse skips over.
pub trait DiagnosticSink {
    fn report(&mut self, position: Position, message: &str);

    fn report_error(&mut self, source: &str, err: &ParseError) {
        let position = byte_to_line_col(source, err.span().start);
        self.report(position, &format!("{} [{}]", err, err.diagnostic_code()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub position: Position,
    pub message: String,
}

/// Keeps every report in order.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    pub entries: Vec<Diagnostic>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl DiagnosticSink for CollectedDiagnostics {
    fn report(&mut self, position: Position, message: &str) {
        self.entries.push(Diagnostic {
            position,
            message: message.to_owned(),
        });
    }
}

/// Forwards reports to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, position: Position, message: &str) {
        error!("{}: {}", position, message);
    }
}

/// Renders every report against its source text, for terminal output.
pub struct RenderSink<'s> {
    source: &'s str,
    path: &'s str,
    pub rendered: Vec<String>,
}

impl<'s> RenderSink<'s> {
    pub fn new(source: &'s str, path: &'s str) -> Self {
        RenderSink {
            source,
            path,
            rendered: Vec::new(),
        }
    }
}

impl DiagnosticSink for RenderSink<'_> {
    fn report(&mut self, position: Position, message: &str) {
        self.rendered
            .push(render_at(self.source, self.path, position, message));
    }
}

/// Renders a diagnostic with a source excerpt and a caret.
///
/// ```text
/// error: missing ']', found ',' [E0202]
///  --> prog.q:3:16
///   |
/// 3 | q.h %r[1, 2, 3, 4]
///   |               ^
/// ```
pub fn render_at(source: &str, path: &str, position: Position, message: &str) -> String {
    let source_line = source
        .lines()
        .nth(position.line.saturating_sub(1) as usize)
        .unwrap_or("");
    let indent = (position.column as usize).saturating_sub(1);
    let line_num = position.line.to_string();
    let gutter = " ".repeat(line_num.len());

    let mut out = format!("error: {}\n", message);
    out.push_str(&format!("{} --> {}:{}\n", gutter, path, position));
    out.push_str(&format!("{} |\n", gutter));
    out.push_str(&format!("{} | {}\n", line_num, source_line));
    out.push_str(&format!("{} | {}^\n", gutter, " ".repeat(indent)));
    out
}

pub fn render_error(source: &str, path: &str, err: &ParseError) -> String {
    let position = byte_to_line_col(source, err.span().start);
    render_at(
        source,
        path,
        position,
        &format!("{} [{}]", err, err.diagnostic_code()),
    )
}
