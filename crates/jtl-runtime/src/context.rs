//! Rendering hooks for tags produced by tag extensions.

use jtl_source::Diagnostic;
use jtl_source::DiagnosticKind;
use jtl_source::Span;
use jtl_templates::ast::CustomTag;
use jtl_templates::ast::Expr;
use jtl_templates::ast::Node;

use crate::environment::Environment;
use crate::renderer::Renderer;
use crate::value::Kwargs;
use crate::value::Map;
use crate::value::Value;

/// Renders one kind of [`CustomTag`].
///
/// The returned string is inserted into the output in place of the tag.
pub trait TagRenderer: Send + Sync {
    fn render(&self, ctx: &mut RenderContext<'_, '_>, tag: &CustomTag) -> String;
}

impl<F> TagRenderer for F
where
    F: Fn(&mut RenderContext<'_, '_>, &CustomTag) -> String + Send + Sync,
{
    fn render(&self, ctx: &mut RenderContext<'_, '_>, tag: &CustomTag) -> String {
        self(ctx, tag)
    }
}

/// The view of a running render handed to a [`TagRenderer`].
///
/// Scopes pushed through this handle are always popped before it returns
/// control, so a tag renderer cannot leave the scope stack deeper than it
/// found it.
pub struct RenderContext<'r, 'e> {
    renderer: &'r mut Renderer<'e>,
}

impl<'r, 'e> RenderContext<'r, 'e> {
    pub(crate) fn new(renderer: &'r mut Renderer<'e>) -> Self {
        Self { renderer }
    }

    #[must_use]
    pub fn environment(&self) -> &'e Environment {
        self.renderer.env
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Value {
        self.renderer.eval(expr)
    }

    /// Evaluate the tag's arguments, splitting off keyword arguments.
    pub fn arguments(&mut self, tag: &CustomTag) -> (Vec<Value>, Kwargs) {
        self.renderer.eval_args(&tag.args)
    }

    /// Render nodes in the current scope.
    pub fn render_body(&mut self, body: &[Node]) -> String {
        self.renderer.render_to_string(body)
    }

    /// Render nodes with `bindings` pushed as a new innermost scope.
    pub fn render_body_with(&mut self, bindings: Map, body: &[Node]) -> String {
        self.renderer
            .scoped(bindings, |r| r.render_to_string(body))
    }

    /// Look up a variable without reporting anything if it is missing.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.renderer.resolve(name)
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.renderer
            .push_diagnostic(Diagnostic::new(kind, message, span));
    }

    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.renderer.scope_depth()
    }
}
