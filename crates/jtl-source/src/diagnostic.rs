use std::fmt;
use std::ops::Deref;

use serde::Serialize;

use crate::Span;

/// How serious a diagnostic is. Hosts decide which severities are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// The pass family a [`DiagnosticKind`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Lexical,
    Syntactic,
    Runtime,
}

/// Every condition the lexer, parser or renderer can report.
///
/// The taxonomy grows by adding variants, never by adding error types; each
/// variant owns a stable code (`L1xx` lexical, `P2xx` syntactic, `R3xx` runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    UnexpectedCharacter,
    UnterminatedExpression,
    UnterminatedBlock,
    UnterminatedString,
    UnterminatedComment,

    UnexpectedToken,
    ExpectedToken,
    MissingEndTag,
    UnexpectedEndTag,
    UnknownTag,
    InvalidAssignmentTarget,

    UnknownVariable,
    UnknownFilter,
    UnknownTest,
    UnknownFunction,
    UnknownMacro,
    InvalidOperand,
    NotIterable,
    NotCallable,
    UnpackMismatch,
    TemplateNotFound,
    TemplateCycle,
    UnknownTagRenderer,
    CallFailed,
    RenderBudgetExceeded,
}

impl DiagnosticKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::UnexpectedCharacter => "L100",
            DiagnosticKind::UnterminatedExpression => "L101",
            DiagnosticKind::UnterminatedBlock => "L102",
            DiagnosticKind::UnterminatedString => "L103",
            DiagnosticKind::UnterminatedComment => "L104",
            DiagnosticKind::UnexpectedToken => "P200",
            DiagnosticKind::ExpectedToken => "P201",
            DiagnosticKind::MissingEndTag => "P202",
            DiagnosticKind::UnexpectedEndTag => "P203",
            DiagnosticKind::UnknownTag => "P204",
            DiagnosticKind::InvalidAssignmentTarget => "P205",
            DiagnosticKind::UnknownVariable => "R300",
            DiagnosticKind::UnknownFilter => "R301",
            DiagnosticKind::UnknownTest => "R302",
            DiagnosticKind::UnknownFunction => "R303",
            DiagnosticKind::UnknownMacro => "R304",
            DiagnosticKind::InvalidOperand => "R305",
            DiagnosticKind::NotIterable => "R306",
            DiagnosticKind::NotCallable => "R307",
            DiagnosticKind::UnpackMismatch => "R308",
            DiagnosticKind::TemplateNotFound => "R309",
            DiagnosticKind::TemplateCycle => "R310",
            DiagnosticKind::UnknownTagRenderer => "R311",
            DiagnosticKind::CallFailed => "R312",
            DiagnosticKind::RenderBudgetExceeded => "R313",
        }
    }

    #[must_use]
    pub fn category(self) -> Category {
        match self.code().as_bytes()[0] {
            b'L' => Category::Lexical,
            b'P' => Category::Syntactic,
            _ => Category::Runtime,
        }
    }

    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::UnknownTagRenderer | DiagnosticKind::UnpackMismatch => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A reportable condition located in template source.
///
/// Diagnostics are values: once created they are never mutated, only
/// collected, merged and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    severity: Severity,
    message: String,
    span: Span,
    /// The template the span points into, when it is not the one being processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            span,
            template: None,
        }
    }

    /// Attribute the diagnostic to the named template.
    #[must_use]
    pub fn in_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.span.start();
        write!(f, "{}[{}] ", self.severity, self.code())?;
        if let Some(template) = &self.template {
            write!(f, "{template}:")?;
        }
        write!(
            f,
            "{}:{}: {}",
            start.line(),
            start.column(),
            self.message
        )
    }
}

/// An append-only diagnostic list, kept in the order problems were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::new(kind, message, span));
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity() == Severity::Error)
    }

    #[must_use]
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.0.iter().filter(|d| d.kind() == kind).count()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Deref for Diagnostics {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    #[test]
    fn test_codes_map_to_categories() {
        assert_eq!(
            DiagnosticKind::UnterminatedString.category(),
            Category::Lexical
        );
        assert_eq!(DiagnosticKind::MissingEndTag.category(), Category::Syntactic);
        assert_eq!(DiagnosticKind::TemplateCycle.category(), Category::Runtime);
    }

    #[test]
    fn test_display_includes_code_and_location() {
        let span = Span::point(Position::new(7, 2, 3));
        let diagnostic = Diagnostic::new(DiagnosticKind::UnknownTag, "unknown tag 'foo'", span);
        assert_eq!(diagnostic.to_string(), "error[P204] 2:3: unknown tag 'foo'");
        assert_eq!(
            diagnostic.in_template("base.html").to_string(),
            "error[P204] base.html:2:3: unknown tag 'foo'"
        );
    }

    #[test]
    fn test_collector_keeps_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(DiagnosticKind::UnknownFilter, "first", Span::default());
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::UnknownTagRenderer, "second", Span::default())
                .with_severity(Severity::Info),
        );
        let messages: Vec<_> = diagnostics.iter().map(Diagnostic::message).collect();
        assert_eq!(messages, ["first", "second"]);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.count_of(DiagnosticKind::UnknownFilter), 1);
    }
}
