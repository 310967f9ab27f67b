use camino::Utf8PathBuf;
use jtl_source::Diagnostic;
use jtl_source::DiagnosticKind;
use jtl_source::Span;
use thiserror::Error;

/// Why the renderer could not evaluate a node.
///
/// Like parse errors, these never escape a render: each one becomes a
/// [`Diagnostic`] and evaluation continues with a neutral value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("undefined variable '{name}'")]
    UnknownVariable { name: String },

    #[error("'{type_name}' value has no attribute '{attr}'")]
    UnknownAttribute { type_name: String, attr: String },

    #[error("'{type_name}' value has no item {index}")]
    UnknownItem { type_name: String, index: String },

    #[error("unknown filter '{name}'")]
    UnknownFilter { name: String },

    #[error("unknown test '{name}'")]
    UnknownTest { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("unknown macro '{name}'")]
    UnknownMacro { name: String },

    #[error("unsupported operand types for '{op}': '{left}' and '{right}'")]
    InvalidOperand {
        op: String,
        left: String,
        right: String,
    },

    #[error("bad operand type for unary '{op}': '{operand}'")]
    InvalidUnaryOperand { op: String, operand: String },

    #[error("division by zero in '{op}'")]
    DivisionByZero { op: String },

    #[error("template name must be a string, found '{type_name}'")]
    InvalidTemplateName { type_name: String },

    #[error("cannot assign to {target}")]
    NotAssignable { target: String },

    #[error("'{type_name}' value is not iterable")]
    NotIterable { type_name: String },

    #[error("'{type_name}' value is not callable")]
    NotCallable { type_name: String },

    #[error("cannot unpack {found} values into {expected} names")]
    UnpackMismatch { expected: usize, found: usize },

    #[error("template '{name}' not found: {reason}")]
    TemplateNotFound { name: String, reason: String },

    #[error("template '{name}' is already being rendered ({chain})")]
    TemplateCycle { name: String, chain: String },

    #[error("no renderer registered for tag '{tag}'")]
    UnknownTagRenderer { tag: String },

    #[error("call to '{name}' failed: {reason}")]
    CallFailed { name: String, reason: String },

    #[error("super() used outside of an overriding block")]
    NoParentBlock,

    #[error("maximum call depth of {depth} exceeded")]
    RecursionLimit { depth: usize },

    #[error("render stopped after {limit} steps")]
    BudgetExceeded { limit: u64 },
}

impl RenderError {
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            RenderError::UnknownVariable { .. }
            | RenderError::UnknownAttribute { .. }
            | RenderError::UnknownItem { .. } => DiagnosticKind::UnknownVariable,
            RenderError::UnknownFilter { .. } => DiagnosticKind::UnknownFilter,
            RenderError::UnknownTest { .. } => DiagnosticKind::UnknownTest,
            RenderError::UnknownFunction { .. } => DiagnosticKind::UnknownFunction,
            RenderError::UnknownMacro { .. } => DiagnosticKind::UnknownMacro,
            RenderError::InvalidOperand { .. }
            | RenderError::InvalidUnaryOperand { .. }
            | RenderError::DivisionByZero { .. }
            | RenderError::InvalidTemplateName { .. }
            | RenderError::NotAssignable { .. } => DiagnosticKind::InvalidOperand,
            RenderError::NotIterable { .. } => DiagnosticKind::NotIterable,
            RenderError::NotCallable { .. } => DiagnosticKind::NotCallable,
            RenderError::UnpackMismatch { .. } => DiagnosticKind::UnpackMismatch,
            RenderError::TemplateNotFound { .. } => DiagnosticKind::TemplateNotFound,
            RenderError::TemplateCycle { .. } => DiagnosticKind::TemplateCycle,
            RenderError::UnknownTagRenderer { .. } => DiagnosticKind::UnknownTagRenderer,
            RenderError::CallFailed { .. }
            | RenderError::NoParentBlock
            | RenderError::RecursionLimit { .. } => DiagnosticKind::CallFailed,
            RenderError::BudgetExceeded { .. } => DiagnosticKind::RenderBudgetExceeded,
        }
    }

    #[must_use]
    pub fn into_diagnostic(self, span: Span) -> Diagnostic {
        Diagnostic::new(self.kind(), self.to_string(), span)
    }
}

/// Why a loader could not produce template source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no template named '{name}'")]
    NotFound { name: String },

    #[error("invalid template name '{name}'")]
    InvalidName { name: String },

    #[error("no loader configured")]
    NoLoader,

    #[error("failed to read '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Whether the template simply does not exist, as opposed to failing to load.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. } | LoadError::NoLoader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_by_zero_is_an_invalid_operand() {
        let diagnostic = RenderError::DivisionByZero {
            op: "/".to_string(),
        }
        .into_diagnostic(Span::default());

        assert_eq!(diagnostic.kind(), DiagnosticKind::InvalidOperand);
        assert_eq!(diagnostic.message(), "division by zero in '/'");
    }

    #[test]
    fn test_unpack_mismatch_is_a_warning() {
        let diagnostic = RenderError::UnpackMismatch {
            expected: 2,
            found: 3,
        }
        .into_diagnostic(Span::default());

        assert_eq!(diagnostic.severity(), jtl_source::Severity::Warning);
        assert_eq!(diagnostic.message(), "cannot unpack 3 values into 2 names");
    }

    #[test]
    fn test_missing_templates_are_distinguished_from_io_failures() {
        let not_found = LoadError::NotFound {
            name: "a.html".to_string(),
        };
        let io = LoadError::Io {
            path: Utf8PathBuf::from("/t/a.html"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(not_found.is_not_found());
        assert!(!io.is_not_found());
    }
}
