#![forbid(unsafe_code)]

use miette::Diagnostic;
use tern_ast::Span;
use tern_mir::DebugSource;
use tern_types::ResolveError;
use thiserror::Error;

/// A terminal type error. The declaration it occurred in emits no code;
/// checking continues with the next declaration. Checker bugs (broken
/// internal invariants) panic instead of returning this.
#[derive(Debug, Error, Diagnostic)]
#[error("type error: {message}")]
#[diagnostic(code(tern::check))]
pub struct CheckError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl CheckError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl From<ResolveError> for CheckError {
    fn from(e: ResolveError) -> Self {
        Self {
            message: e.message,
            span: e.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckerOptions {
    /// Stop checking further declarations once this many errors accumulate.
    pub error_limit: usize,
    /// Resolve operator overloads by literal tags before type matching.
    pub literal_dispatch: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            error_limit: 50,
            literal_dispatch: true,
        }
    }
}

/// One reported error row: file, 1-based line, message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagRow {
    pub file: String,
    pub line: u32,
    pub message: String,
}

/// Accumulates errors across declarations and maps spans back to source
/// positions when a source map is available.
#[derive(Debug)]
pub struct Diagnostics {
    source: Option<DebugSource>,
    rows: Vec<DiagRow>,
    limit: usize,
}

impl Diagnostics {
    pub fn new(source: Option<DebugSource>, limit: usize) -> Self {
        Self {
            source,
            rows: Vec::new(),
            limit,
        }
    }

    pub fn record(&mut self, err: &CheckError) {
        let (file, line) = match &self.source {
            Some(src) => (src.file_name.clone(), src.line_col(err.span).line),
            None => ("<unknown>".to_string(), 0),
        };
        self.rows.push(DiagRow {
            file,
            line,
            message: err.message.clone(),
        });
    }

    /// Circuit breaker: true once the error budget is exhausted.
    pub fn tripped(&self) -> bool {
        self.rows.len() >= self.limit
    }

    pub fn rows(&self) -> &[DiagRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_carry_file_and_line() {
        let src = DebugSource::new("m.tern".to_string(), "a\nbb\nccc");
        let mut diags = Diagnostics::new(Some(src), 10);
        diags.record(&CheckError::new(tern_ast::span(2, 1), "boom"));
        assert_eq!(
            diags.rows(),
            &[DiagRow {
                file: "m.tern".to_string(),
                line: 2,
                message: "boom".to_string(),
            }]
        );
    }

    #[test]
    fn breaker_trips_at_limit() {
        let mut diags = Diagnostics::new(None, 2);
        assert!(!diags.tripped());
        diags.record(&CheckError::new(tern_ast::span(0, 0), "one"));
        diags.record(&CheckError::new(tern_ast::span(0, 0), "two"));
        assert!(diags.tripped());
    }
}
