use jtl_source::Diagnostic;
use jtl_source::DiagnosticKind;
use jtl_source::Span;
use thiserror::Error;

/// Why the parser rejected a piece of input.
///
/// Never returned to callers directly: the parser converts each error into a
/// [`Diagnostic`] and keeps going.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected {found}")]
    UnexpectedToken { found: String },

    #[error("expected {expected}, found {found}")]
    ExpectedToken { expected: String, found: String },

    #[error("missing end tag '{expected}' for '{tag}'")]
    MissingEndTag { tag: String, expected: String },

    #[error("unexpected '{tag}' tag")]
    UnexpectedEndTag { tag: String },

    #[error("unknown tag '{tag}'")]
    UnknownTag { tag: String },

    #[error("cannot assign to this expression in '{tag}'")]
    InvalidAssignmentTarget { tag: String },
}

impl ParseError {
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ParseError::UnexpectedToken { .. } => DiagnosticKind::UnexpectedToken,
            ParseError::ExpectedToken { .. } => DiagnosticKind::ExpectedToken,
            ParseError::MissingEndTag { .. } => DiagnosticKind::MissingEndTag,
            ParseError::UnexpectedEndTag { .. } => DiagnosticKind::UnexpectedEndTag,
            ParseError::UnknownTag { .. } => DiagnosticKind::UnknownTag,
            ParseError::InvalidAssignmentTarget { .. } => DiagnosticKind::InvalidAssignmentTarget,
        }
    }

    #[must_use]
    pub fn into_diagnostic(self, span: Span) -> Diagnostic {
        Diagnostic::new(self.kind(), self.to_string(), span)
    }
}
