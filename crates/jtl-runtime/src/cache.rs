use std::sync::Arc;

use jtl_source::Diagnostic;
use jtl_templates::ast::Block;
use jtl_templates::ast::Macro;
use jtl_templates::ast::Node;
use jtl_templates::visitor::walk_node;
use jtl_templates::Template;
use jtl_templates::Visitor;
use rustc_hash::FxHashMap;

use crate::environment::Environment;
use crate::error::LoadError;

/// Macros defined by one template, by name.
pub type MacroTable = FxHashMap<String, Arc<Macro>>;

/// A parsed template together with what the renderer needs to know about it
/// before executing it.
#[derive(Debug)]
pub struct LoadedTemplate {
    pub name: String,
    pub source: String,
    pub template: Template,
    /// Lexer and parser diagnostics, reported once per render that uses it.
    pub diagnostics: Vec<Diagnostic>,
    pub(crate) blocks: FxHashMap<String, Arc<Block>>,
    pub(crate) macros: Arc<MacroTable>,
}

impl LoadedTemplate {
    #[must_use]
    pub fn new(name: String, source: String, template: Template, diagnostics: Vec<Diagnostic>) -> Self {
        let blocks = collect_blocks(&template);
        let macros = Arc::new(collect_macros(&template));
        Self {
            name,
            source,
            template,
            diagnostics,
            blocks,
            macros,
        }
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn macro_names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }
}

/// Parsed templates by logical name.
///
/// A cache lives for one render unless the caller passes the same cache to
/// several renders. Failed loads are not cached.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: FxHashMap<String, Arc<LoadedTemplate>>,
}

impl TemplateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    /// Return the cached template or load, parse and cache it.
    pub fn get_or_load(
        &mut self,
        env: &Environment,
        name: &str,
    ) -> Result<Arc<LoadedTemplate>, LoadError> {
        if let Some(loaded) = self.templates.get(name) {
            tracing::debug!(template = name, "template cache hit");
            return Ok(Arc::clone(loaded));
        }

        let loader = env.loader().ok_or(LoadError::NoLoader)?;
        let source = loader.load(name)?;
        let (template, diagnostics) = env.parse(name, &source);
        tracing::debug!(
            template = name,
            diagnostics = diagnostics.len(),
            "loaded template"
        );

        let loaded = Arc::new(LoadedTemplate::new(
            name.to_string(),
            source,
            template,
            diagnostics,
        ));
        self.templates
            .insert(name.to_string(), Arc::clone(&loaded));
        Ok(loaded)
    }
}

/// Every `{% block %}` in the template, including nested ones but not those
/// inside macro bodies.
pub(crate) fn collect_blocks(template: &Template) -> FxHashMap<String, Arc<Block>> {
    let mut collector = BlockCollector::default();
    collector.visit_template(template);
    collector.blocks
}

/// Every `{% macro %}` in the template that is not itself nested in a macro.
pub(crate) fn collect_macros(template: &Template) -> MacroTable {
    let mut collector = MacroCollector::default();
    collector.visit_template(template);
    collector.macros
}

#[derive(Default)]
struct BlockCollector {
    blocks: FxHashMap<String, Arc<Block>>,
}

impl Visitor for BlockCollector {
    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::Macro(_) => {}
            Node::Block(block) => {
                self.blocks
                    .entry(block.name.clone())
                    .or_insert_with(|| Arc::new(block.clone()));
                walk_node(self, node);
            }
            _ => walk_node(self, node),
        }
    }
}

#[derive(Default)]
struct MacroCollector {
    macros: MacroTable,
}

impl Visitor for MacroCollector {
    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::Macro(definition) => {
                self.macros
                    .insert(definition.name.clone(), Arc::new(definition.clone()));
            }
            _ => walk_node(self, node),
        }
    }
}
