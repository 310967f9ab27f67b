//! Source positions, spans and diagnostics shared by every `jtl` pass.
//!
//! The lexer, parser and renderer each return their artifact together with a
//! list of [`Diagnostic`]s. All of them locate problems with the same [`Span`]
//! type so a host can merge the lists and display them without re-sorting.

mod diagnostic;
mod position;
mod render;
mod span;

pub use diagnostic::Category;
pub use diagnostic::Diagnostic;
pub use diagnostic::DiagnosticKind;
pub use diagnostic::Diagnostics;
pub use diagnostic::Severity;
pub use position::LineIndex;
pub use position::Position;
pub use render::DiagnosticRenderer;
pub use span::Span;
