use annotate_snippets::AnnotationKind;
use annotate_snippets::Level;
use annotate_snippets::Renderer;
use annotate_snippets::Snippet;

use crate::Diagnostic;
use crate::Severity;

/// Renders diagnostics as annotated source snippets using `annotate-snippets`.
///
/// Supports two modes:
/// - **Plain**: No ANSI colors, for snapshot tests and piped output
/// - **Styled**: ANSI colors and bold, for terminal display
#[derive(Debug)]
pub struct DiagnosticRenderer {
    renderer: Renderer,
}

impl DiagnosticRenderer {
    #[must_use]
    pub fn plain() -> Self {
        Self {
            renderer: Renderer::plain(),
        }
    }

    #[must_use]
    pub fn styled() -> Self {
        Self {
            renderer: Renderer::styled(),
        }
    }

    /// Render one diagnostic against the source it was reported for.
    ///
    /// Spans that run past the end of `source` are clamped to it.
    #[must_use]
    pub fn render(&self, source: &str, path: &str, diagnostic: &Diagnostic) -> String {
        let level = match diagnostic.severity() {
            Severity::Error => Level::ERROR,
            Severity::Warning => Level::WARNING,
            Severity::Info => Level::INFO,
        };

        let range = diagnostic.span().range();
        let end = range.end.min(source.len());
        let start = range.start.min(end);
        let label = diagnostic.kind().to_string();

        let snippet = Snippet::source(source)
            .path(path)
            .line_start(1)
            .annotation(AnnotationKind::Primary.span(start..end).label(label.as_str()));

        let title = level
            .primary_title(diagnostic.message())
            .id(diagnostic.code())
            .element(snippet);

        let report = &[title];
        self.renderer.render(report)
    }

    /// Render every diagnostic, separated by blank lines, in the order given.
    #[must_use]
    pub fn render_all<'a>(
        &self,
        source: &str,
        path: &str,
        diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
    ) -> String {
        diagnostics
            .into_iter()
            .map(|diagnostic| self.render(source, path, diagnostic))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
