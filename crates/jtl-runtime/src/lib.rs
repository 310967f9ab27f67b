//! Rendering of parsed `jtl` templates.
//!
//! [`render`] executes a [`Template`] against a context [`Map`] and an
//! [`Environment`] holding filters, tests, functions, tag renderers, a
//! template [`Loader`] and strict-mode flags. Like parsing, rendering never
//! fails: unresolved names, bad operands and missing templates become
//! [`Diagnostic`]s and evaluation continues with a neutral value.
//!
//! ```
//! use jtl_runtime::{context, Environment};
//!
//! let env = Environment::new();
//! let (output, diagnostics) = env.render_str("hello", "Hello {{ name }}", context([("name", "Ada")]));
//! assert_eq!(output, "Hello Ada");
//! assert!(diagnostics.is_empty());
//! ```

mod cache;
mod context;
mod environment;
mod error;
mod eval;
mod loader;
mod ops;
mod renderer;
mod scope;
mod value;

pub use cache::LoadedTemplate;
pub use cache::MacroTable;
pub use cache::TemplateCache;
pub use context::RenderContext;
pub use context::TagRenderer;
pub use environment::Environment;
pub use environment::FilterFn;
pub use environment::FunctionFn;
pub use environment::StrictMode;
pub use environment::TestFn;
pub use error::LoadError;
pub use error::RenderError;
use jtl_source::Diagnostic;
use jtl_templates::Template;
pub use loader::FileSystemLoader;
pub use loader::Loader;
pub use loader::MapLoader;
pub use ops::compare;
use renderer::Renderer;
pub use scope::ScopeStack;
pub use value::context;
pub use value::CallResult;
pub use value::HostObject;
pub use value::Kwargs;
pub use value::Map;
pub use value::Value;

/// Render `template` with `context` as the outermost scope.
///
/// Templates pulled in by `extends`, `include` and `import` are loaded
/// through the environment's loader and cached for the duration of this call.
#[must_use]
pub fn render(template: &Template, context: Map, env: &Environment) -> (String, Vec<Diagnostic>) {
    let mut cache = TemplateCache::new();
    render_with_cache(template, context, env, &mut cache)
}

/// Like [`render`], reusing and extending `cache` instead of starting empty.
#[must_use]
pub fn render_with_cache(
    template: &Template,
    context: Map,
    env: &Environment,
    cache: &mut TemplateCache,
) -> (String, Vec<Diagnostic>) {
    let mut renderer = Renderer::new(env, std::mem::take(cache), context);
    let output = renderer.render_root(template);
    let (diagnostics, used) = renderer.finish();
    *cache = used;
    (output, diagnostics)
}
