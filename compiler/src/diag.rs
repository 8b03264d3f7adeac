// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by resolve, verify, the hoisting
// pass and the pipeline runner.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // ── Resolve ──
    /// Operand names a value that is not in scope.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Value name defined twice in visible scopes.
    pub const E0002: DiagCode = DiagCode("E0002");
    /// Result index missing, or out of range for its group.
    pub const E0003: DiagCode = DiagCode("E0003");
    /// Attribute key repeated on one operation.
    pub const E0004: DiagCode = DiagCode("E0004");
    /// `func` body declares its own region arguments.
    pub const E0005: DiagCode = DiagCode("E0005");

    // ── Verify ──
    /// Terminator operation is not the last operation of its region.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Operand refers to an erased value.
    pub const E0101: DiagCode = DiagCode("E0101");
    /// Use list disagrees with operand lists.
    pub const E0102: DiagCode = DiagCode("E0102");
    /// Two top-level symbols share a name.
    pub const E0103: DiagCode = DiagCode("E0103");

    // ── Launch hoisting ──
    /// Target dialect is not loaded in the context.
    pub const E0200: DiagCode = DiagCode("E0200");
    /// Inner operation carries a different device.
    pub const E0201: DiagCode = DiagCode("E0201");
    /// Device attribute is not a string.
    pub const E0202: DiagCode = DiagCode("E0202");
    /// Launch operation does not have the expected shape.
    pub const E0203: DiagCode = DiagCode("E0203");
    /// IR rejected a structural mutation.
    pub const E0204: DiagCode = DiagCode("E0204");

    // ── Pipeline ──
    /// Module failed verification after a transformation pass.
    pub const E0600: DiagCode = DiagCode("E0600");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related note ─────────────────────────────────────────────────────────

/// A secondary location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedNote {
    pub span: Option<Span>,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any phase. `span` is absent for IR that was
/// built programmatically rather than parsed.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedNote>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint or related notes.
    pub fn new(level: DiagLevel, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related: Vec::new(),
        }
    }

    pub fn error(span: Option<Span>, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related location.
    pub fn with_related(mut self, span: Option<Span>, label: impl Into<String>) -> Self {
        self.related.push(RelatedNote {
            span,
            label: label.into(),
        });
        self
    }

    /// Render with `file:line:col` prefixes resolved against `source`.
    pub fn render(&self, file: &str, source: &str) -> String {
        let mut out = match self.span {
            Some(span) => {
                let (line, col) = line_col(source, span.start);
                format!("{file}:{line}:{col}: {self}")
            }
            None => format!("{file}: {self}"),
        };
        for note in &self.related {
            match note.span {
                Some(span) => {
                    let (line, col) = line_col(source, span.start);
                    out.push_str(&format!("\n  note: {file}:{line}:{col}: {}", note.label));
                }
                None => out.push_str(&format!("\n  note: {}", note.label)),
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, col)
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}
