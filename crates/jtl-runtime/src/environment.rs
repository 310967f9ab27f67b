//! Registries and settings shared by every render.
//!
//! An [`Environment`] is built once, then shared read-only. Child
//! environments layer local registrations over a parent and fall back to it
//! for anything they do not define themselves.

use std::fmt;
use std::sync::Arc;

use jtl_source::Diagnostic;
use jtl_templates::TagExtension;
use jtl_templates::TagRegistry;
use jtl_templates::Template;
use rustc_hash::FxHashMap;

use crate::cache::TemplateCache;
use crate::context::TagRenderer;
use crate::loader::Loader;
use crate::renderer::Renderer;
use crate::value::CallResult;
use crate::value::Kwargs;
use crate::value::Map;
use crate::value::Value;

/// `value | name(args)`
pub type FilterFn = dyn Fn(&Value, &[Value], &Kwargs) -> CallResult + Send + Sync;

/// `value is name(args)`. Negation is applied by the renderer.
pub type TestFn = dyn Fn(&Value, &[Value], &Kwargs) -> Result<bool, String> + Send + Sync;

/// `name(args)`
pub type FunctionFn = dyn Fn(&[Value], &Kwargs) -> CallResult + Send + Sync;

/// Which unresolved lookups are reported instead of passed over silently.
///
/// Reported or not, an unresolved lookup never stops the render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrictMode {
    pub undefined: bool,
    pub filters: bool,
    pub tests: bool,
    pub functions: bool,
}

impl StrictMode {
    #[must_use]
    pub fn all() -> Self {
        Self {
            undefined: true,
            filters: true,
            tests: true,
            functions: true,
        }
    }
}

#[derive(Clone, Default)]
pub struct Environment {
    parent: Option<Arc<Environment>>,
    filters: FxHashMap<String, Arc<FilterFn>>,
    tests: FxHashMap<String, Arc<TestFn>>,
    functions: FxHashMap<String, Arc<FunctionFn>>,
    tag_renderers: FxHashMap<String, Arc<dyn TagRenderer>>,
    tags: TagRegistry,
    loader: Option<Arc<dyn Loader>>,
    globals: Map,
    strict: StrictMode,
    max_steps: Option<u64>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment that inherits everything from `parent`.
    ///
    /// Strict flags, the step budget and tag extensions are copied so they
    /// can be changed locally; registries and globals are looked up through
    /// the parent on demand.
    #[must_use]
    pub fn child(parent: &Arc<Environment>) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            tags: parent.tags.clone(),
            strict: parent.strict,
            max_steps: parent.max_steps,
            ..Self::default()
        }
    }

    pub fn add_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value], &Kwargs) -> CallResult + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn add_test<F>(&mut self, name: impl Into<String>, test: F)
    where
        F: Fn(&Value, &[Value], &Kwargs) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.tests.insert(name.into(), Arc::new(test));
    }

    pub fn add_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value], &Kwargs) -> CallResult + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Register a parse hook for `{% name ... %}`.
    pub fn add_tag(&mut self, name: impl Into<String>, extension: impl TagExtension + 'static) {
        self.tags.register(name, extension);
    }

    /// Register how `{% name %}` tags produced by an extension are rendered.
    pub fn add_tag_renderer(
        &mut self,
        name: impl Into<String>,
        renderer: impl TagRenderer + 'static,
    ) {
        self.tag_renderers.insert(name.into(), Arc::new(renderer));
    }

    /// Let registered tag extensions replace built-in tags.
    pub fn allow_tag_override(&mut self, allow: bool) {
        self.tags.allow_override(allow);
    }

    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        self.loader = Some(Arc::new(loader));
    }

    pub fn add_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.insert(name.into(), value.into());
    }

    pub fn set_strict(&mut self, strict: StrictMode) {
        self.strict = strict;
    }

    /// Stop rendering after `max_steps` nodes. `None` means no limit.
    pub fn set_max_steps(&mut self, max_steps: Option<u64>) {
        self.max_steps = max_steps;
    }

    #[must_use]
    pub fn strict(&self) -> StrictMode {
        self.strict
    }

    #[must_use]
    pub fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }

    #[must_use]
    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&FilterFn> {
        self.filters
            .get(name)
            .map(|entry| &**entry)
            .or_else(|| self.parent.as_deref()?.filter(name))
    }

    #[must_use]
    pub fn test(&self, name: &str) -> Option<&TestFn> {
        self.tests
            .get(name)
            .map(|entry| &**entry)
            .or_else(|| self.parent.as_deref()?.test(name))
    }

    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionFn> {
        self.functions
            .get(name)
            .map(|entry| &**entry)
            .or_else(|| self.parent.as_deref()?.function(name))
    }

    #[must_use]
    pub fn tag_renderer(&self, name: &str) -> Option<&dyn TagRenderer> {
        self.tag_renderers
            .get(name)
            .map(|entry| &**entry)
            .or_else(|| self.parent.as_deref()?.tag_renderer(name))
    }

    #[must_use]
    pub fn loader(&self) -> Option<&dyn Loader> {
        self.loader
            .as_deref()
            .or_else(|| self.parent.as_deref()?.loader())
    }

    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals
            .get(name)
            .or_else(|| self.parent.as_deref()?.global(name))
    }

    /// Lex and parse `source` with this environment's tag extensions.
    #[must_use]
    pub fn parse(&self, name: &str, source: &str) -> (Template, Vec<Diagnostic>) {
        jtl_templates::parse_template(name, source, Some(&self.tags))
    }

    /// Parse and render `source` in one go. Parse diagnostics come first.
    #[must_use]
    pub fn render_str(&self, name: &str, source: &str, context: Map) -> (String, Vec<Diagnostic>) {
        let (template, mut diagnostics) = self.parse(name, source);
        let (output, render_diagnostics) = crate::render(&template, context, self);
        diagnostics.extend(render_diagnostics);
        (output, diagnostics)
    }

    /// Load `name` through the loader and render it.
    #[must_use]
    pub fn render_named(&self, name: &str, context: Map) -> (String, Vec<Diagnostic>) {
        let mut cache = TemplateCache::new();
        self.render_named_with_cache(name, context, &mut cache)
    }

    /// Like [`Environment::render_named`], reusing templates parsed by earlier renders.
    #[must_use]
    pub fn render_named_with_cache(
        &self,
        name: &str,
        context: Map,
        cache: &mut TemplateCache,
    ) -> (String, Vec<Diagnostic>) {
        let mut renderer = Renderer::new(self, std::mem::take(cache), context);
        let output = renderer.render_root_named(name);
        let (diagnostics, used) = renderer.finish();
        *cache = used;
        (output, diagnostics)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sorted<V>(map: &FxHashMap<String, V>) -> Vec<&str> {
            let mut names: Vec<_> = map.keys().map(String::as_str).collect();
            names.sort_unstable();
            names
        }

        f.debug_struct("Environment")
            .field("parent", &self.parent.is_some())
            .field("filters", &sorted(&self.filters))
            .field("tests", &sorted(&self.tests))
            .field("functions", &sorted(&self.functions))
            .field("tag_renderers", &sorted(&self.tag_renderers))
            .field("tags", &self.tags)
            .field("loader", &self.loader.is_some())
            .field("globals", &self.globals)
            .field("strict", &self.strict)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(value: &Value, _: &[Value], _: &Kwargs) -> CallResult {
        Ok(Value::from(value.to_string().to_uppercase()))
    }

    #[test]
    fn test_child_falls_back_to_parent() {
        let mut parent = Environment::new();
        parent.add_filter("upper", upper);
        parent.add_global("site", "example.org");
        parent.set_strict(StrictMode::all());
        let parent = Arc::new(parent);

        let mut child = Environment::child(&parent);
        child.add_global("site", "child.org");

        assert!(child.filter("upper").is_some());
        assert_eq!(child.global("site"), Some(&Value::from("child.org")));
        assert_eq!(parent.global("site"), Some(&Value::from("example.org")));
        assert_eq!(child.strict(), StrictMode::all());
    }

    #[test]
    fn test_child_registrations_do_not_leak_into_parent() {
        let parent = Arc::new(Environment::new());
        let mut child = Environment::child(&parent);
        child.add_function("now", |_: &[Value], _: &Kwargs| Ok(Value::from("today")));
        assert!(child.function("now").is_some());
        assert!(parent.function("now").is_none());
    }

    #[test]
    fn test_render_str_reports_parse_then_render_diagnostics() {
        let mut env = Environment::new();
        env.set_strict(StrictMode::all());
        let (output, diagnostics) = env.render_str("t", "{{ missing }}{% bogus %}!", Map::new());
        assert_eq!(output, "!");
        let codes: Vec<_> = diagnostics.iter().map(Diagnostic::code).collect();
        assert_eq!(codes, vec!["P204", "R300"]);
    }

    #[test]
    fn test_debug_lists_registered_names() {
        let mut env = Environment::new();
        env.add_filter("upper", upper);
        let debug = format!("{env:?}");
        assert!(debug.contains("filters: [\"upper\"]"), "{debug}");
    }
}
