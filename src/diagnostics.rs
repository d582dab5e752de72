use std::{fmt, io::Write};

use thiserror::Error;

use crate::config::Output;

/// Represents a byte span within a unit's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// One-based line and column of `start` within `source`.
    pub fn line_column(&self, source: &str) -> (usize, usize) {
        let prefix = &source[..self.start.min(source.len())];
        let line = prefix.matches('\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(newline) => prefix[newline + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        (line, column)
    }
}

/// Classification of a compile-time diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
}

/// A compile error produced while turning source text into a unit.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Two-valued outcome of every load and run operation.
///
/// A `Failure` always means a diagnostic has already been written.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn is_failure(self) -> bool {
        self == Status::Failure
    }
}

/// Writes `error: <message>` lines to the configured diagnostic stream.
pub struct DiagnosticSink {
    out: Output,
}

impl DiagnosticSink {
    pub fn new(out: Output) -> Self {
        Self { out }
    }

    /// Emits one diagnostic and hands back the uniform failure signal, so call
    /// sites can `return sink.report(..)`.
    pub fn report(&mut self, message: impl fmt::Display) -> Status {
        tracing::debug!(%message, "diagnostic reported");
        let written = writeln!(self.out, "error: {message}").and_then(|_| self.out.flush());
        if let Err(err) = written {
            tracing::warn!(error = %err, "diagnostic stream unavailable");
        }
        Status::Failure
    }
}

/// Errors surfaced by the `jshost` binary.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line editor error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
    #[error("script `{0}` failed")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, HostError>;
