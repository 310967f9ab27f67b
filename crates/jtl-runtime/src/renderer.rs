//! Tree-walking interpreter for statement nodes.
//!
//! A [`Renderer`] owns everything that is private to one render: the scope
//! stack, the diagnostics, the template cache and the bookkeeping for
//! inheritance, macros and includes. Expression evaluation lives in
//! `eval.rs`.

use std::sync::Arc;

use jtl_source::Diagnostic;
use jtl_source::Diagnostics;
use jtl_source::Span;
use jtl_templates::ast::Block;
use jtl_templates::ast::CallBlock;
use jtl_templates::ast::CustomTag;
use jtl_templates::ast::Expr;
use jtl_templates::ast::For;
use jtl_templates::ast::FromImport;
use jtl_templates::ast::If;
use jtl_templates::ast::Import;
use jtl_templates::ast::Include;
use jtl_templates::ast::Macro;
use jtl_templates::ast::Node;
use jtl_templates::ast::Target;
use jtl_templates::ast::With;
use jtl_templates::Template;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use crate::cache::collect_blocks;
use crate::cache::collect_macros;
use crate::cache::LoadedTemplate;
use crate::cache::MacroTable;
use crate::cache::TemplateCache;
use crate::context::RenderContext;
use crate::environment::Environment;
use crate::error::LoadError;
use crate::error::RenderError;
use crate::scope::ScopeStack;
use crate::value::resolve_index;
use crate::value::Map;
use crate::value::Value;

/// Nesting limit for macro and caller invocations.
pub(crate) const MAX_CALL_DEPTH: usize = 128;

/// A callable macro and the table of its sibling macros.
#[derive(Clone, Debug)]
pub(crate) struct MacroRef {
    pub(crate) definition: Arc<Macro>,
    pub(crate) home: Arc<MacroTable>,
}

/// One level of a block's override chain.
#[derive(Clone, Debug)]
struct BlockRef {
    block: Arc<Block>,
    template: String,
}

/// What `caller()` produces inside a macro invoked from `{% call %}`.
#[derive(Clone, Debug)]
pub(crate) enum CallerFrame {
    /// The call block had no parameters and was rendered up front.
    Rendered(String),
    /// The call block takes parameters and is rendered on each `caller(...)`.
    Deferred(Arc<CallBlock>),
}

/// A path into a local variable for attribute and item assignment.
#[derive(Clone, Debug)]
enum PathKey {
    Attr(String),
    Index(Value),
}

impl PathKey {
    fn key(&self) -> String {
        match self {
            PathKey::Attr(name) => name.clone(),
            PathKey::Index(index) => index.to_string(),
        }
    }

    fn describe(&self) -> String {
        match self {
            PathKey::Attr(name) => format!("attribute '{name}'"),
            PathKey::Index(index) => format!("item {index}"),
        }
    }
}

pub(crate) struct Renderer<'e> {
    pub(crate) env: &'e Environment,
    cache: TemplateCache,
    pub(crate) scopes: ScopeStack,
    diagnostics: Diagnostics,
    /// Templates whose parse diagnostics were already reported.
    reported: FxHashSet<String>,
    /// Macros callable by bare name: defined in the template chain or imported with `from`.
    pub(crate) macros: FxHashMap<String, MacroRef>,
    /// `{% import ... as alias %}` tables.
    pub(crate) namespaces: FxHashMap<String, Arc<MacroTable>>,
    /// Sibling tables of the macros currently executing, innermost last.
    pub(crate) macro_homes: Vec<Arc<MacroTable>>,
    /// Block name to override chain, closest child first.
    overrides: FxHashMap<String, Vec<BlockRef>>,
    /// The block level each active `super()` would step out of.
    super_stack: Vec<(String, usize)>,
    pub(crate) callers: Vec<Option<CallerFrame>>,
    /// Templates being rendered, for cycle detection.
    load_stack: Vec<String>,
    /// Template whose nodes are executing, for attributing diagnostics.
    templates: Vec<String>,
    loop_depth: usize,
    pub(crate) call_depth: usize,
    steps: u64,
    halted: bool,
}

impl<'e> Renderer<'e> {
    pub(crate) fn new(env: &'e Environment, cache: TemplateCache, context: Map) -> Self {
        Self {
            env,
            cache,
            scopes: ScopeStack::new(context),
            diagnostics: Diagnostics::new(),
            reported: FxHashSet::default(),
            macros: FxHashMap::default(),
            namespaces: FxHashMap::default(),
            macro_homes: Vec::new(),
            overrides: FxHashMap::default(),
            super_stack: Vec::new(),
            callers: Vec::new(),
            load_stack: Vec::new(),
            templates: Vec::new(),
            loop_depth: 0,
            call_depth: 0,
            steps: 0,
            halted: false,
        }
    }

    /// Render an already parsed template.
    pub(crate) fn render_root(&mut self, template: &Template) -> String {
        let blocks = collect_blocks(template);
        let macros = Arc::new(collect_macros(template));
        let mut out = String::new();
        self.render_template(template.display_name(), template, &blocks, &macros, &mut out);
        out
    }

    /// Load `name` through the environment's loader and render it.
    pub(crate) fn render_root_named(&mut self, name: &str) -> String {
        let mut out = String::new();
        if let Some(loaded) = self.load(name, Span::default()) {
            self.render_loaded(&loaded, &mut out);
        }
        out
    }

    pub(crate) fn finish(self) -> (Vec<Diagnostic>, TemplateCache) {
        (self.diagnostics.into_vec(), self.cache)
    }

    pub(crate) fn report(&mut self, error: RenderError, span: Span) {
        self.push_diagnostic(error.into_diagnostic(span));
    }

    /// Record a diagnostic, attributing it to the executing template when
    /// that is not the one the render started from.
    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        let diagnostic = match (self.templates.first(), self.templates.last()) {
            (Some(root), Some(current)) if root != current => diagnostic.in_template(current.clone()),
            _ => diagnostic,
        };
        self.diagnostics.push(diagnostic);
    }

    fn render_loaded(&mut self, loaded: &LoadedTemplate, out: &mut String) {
        self.render_template(
            &loaded.name,
            &loaded.template,
            &loaded.blocks,
            &loaded.macros,
            out,
        );
    }

    fn render_template(
        &mut self,
        name: &str,
        template: &Template,
        blocks: &FxHashMap<String, Arc<Block>>,
        macros: &Arc<MacroTable>,
        out: &mut String,
    ) {
        self.load_stack.push(name.to_string());
        self.templates.push(name.to_string());
        self.register_macros(macros, true);

        match template.extends() {
            Some(extends) => {
                self.render_inheritance(name, template, blocks, &extends.template, out);
            }
            None => self.render_nodes(&template.body, out),
        }

        self.templates.pop();
        self.load_stack.pop();
    }

    /// Make every macro in `table` callable by bare name.
    ///
    /// Templates further down an inheritance chain register with `replace`
    /// off, so the closest child's definition wins.
    fn register_macros(&mut self, table: &Arc<MacroTable>, replace: bool) {
        for (name, definition) in table.iter() {
            let entry = MacroRef {
                definition: Arc::clone(definition),
                home: Arc::clone(table),
            };
            if replace {
                self.macros.insert(name.clone(), entry);
            } else {
                self.macros.entry(name.clone()).or_insert(entry);
            }
        }
    }

    /// Walk the `extends` chain up to its root and render the root's body
    /// with every block resolved to the closest override.
    ///
    /// Templates below the root only contribute blocks, macros and their
    /// top-level `set`/`import` statements; their other output is dropped.
    fn render_inheritance(
        &mut self,
        name: &str,
        child: &Template,
        child_blocks: &FxHashMap<String, Arc<Block>>,
        parent: &Expr,
        out: &mut String,
    ) {
        let mut overrides: FxHashMap<String, Vec<BlockRef>> = FxHashMap::default();
        add_blocks(&mut overrides, child_blocks, name);
        self.run_top_level(&child.body);

        let mut parent = parent.clone();
        let mut intermediates = 0;
        let base = loop {
            let Some(parent_name) = self.template_name(&parent) else {
                break None;
            };
            if self.load_stack.contains(&parent_name) {
                self.report_cycle(&parent_name, parent.span());
                break None;
            }
            let Some(loaded) = self.load(&parent_name, parent.span()) else {
                break None;
            };
            self.register_macros(&loaded.macros, false);
            add_blocks(&mut overrides, &loaded.blocks, &loaded.name);

            let Some(next) = loaded.template.extends() else {
                break Some(loaded);
            };
            parent = next.template.clone();
            self.load_stack.push(loaded.name.clone());
            self.templates.push(loaded.name.clone());
            intermediates += 1;
            self.run_top_level(&loaded.template.body);
        };

        if let Some(base) = base {
            tracing::debug!(
                template = name,
                base = %base.name,
                levels = intermediates + 2,
                "resolved extends chain"
            );
            let saved = std::mem::replace(&mut self.overrides, overrides);
            self.load_stack.push(base.name.clone());
            self.templates.push(base.name.clone());
            self.render_nodes(&base.template.body, out);
            self.templates.pop();
            self.load_stack.pop();
            self.overrides = saved;
        }

        for _ in 0..intermediates {
            self.templates.pop();
            self.load_stack.pop();
        }
    }

    /// Execute the statements of a child template that matter outside blocks.
    fn run_top_level(&mut self, body: &[Node]) {
        let mut discarded = String::new();
        for node in body {
            if matches!(
                node,
                Node::Set(_) | Node::SetBlock(_) | Node::Import(_) | Node::FromImport(_)
            ) && self.tick(node.span())
            {
                self.render_node(node, &mut discarded);
            }
        }
    }

    pub(crate) fn render_nodes(&mut self, nodes: &[Node], out: &mut String) {
        for node in nodes {
            if !self.tick(node.span()) {
                return;
            }
            self.render_node(node, out);
        }
    }

    pub(crate) fn render_to_string(&mut self, nodes: &[Node]) -> String {
        let mut out = String::new();
        self.render_nodes(nodes, &mut out);
        out
    }

    /// Count one step against the budget. Returns `false` once rendering must stop.
    fn tick(&mut self, span: Span) -> bool {
        if self.halted {
            return false;
        }
        self.steps += 1;
        match self.env.max_steps() {
            Some(limit) if self.steps > limit => {
                self.halted = true;
                self.report(RenderError::BudgetExceeded { limit }, span);
                false
            }
            _ => true,
        }
    }

    fn render_node(&mut self, node: &Node, out: &mut String) {
        match node {
            Node::Text(text) => out.push_str(&text.content),
            Node::Raw(raw) => out.push_str(&raw.content),
            Node::Output(output) => {
                let value = self.eval(&output.expr);
                out.push_str(&value.to_string());
            }
            Node::If(node) => self.render_if(node, out),
            Node::For(node) => self.render_for(node, out),
            Node::Set(node) => {
                let value = self.eval(&node.value);
                self.assign(&node.target, value);
            }
            Node::SetBlock(node) => {
                let body = self.render_to_string(&node.body);
                let value = self.apply_filters(Value::String(body), &node.filters);
                self.assign(&node.target, value);
            }
            Node::Block(block) => self.render_block(block, out),
            Node::Extends(_) | Node::Macro(_) | Node::Comment(_) => {}
            Node::Include(node) => self.render_include(node, out),
            Node::Import(node) => self.import(node),
            Node::FromImport(node) => self.from_import(node),
            Node::CallBlock(node) => {
                let value = self.eval_call_block(node);
                out.push_str(&value.to_string());
            }
            Node::With(node) => self.render_with(node, out),
            Node::FilterBlock(node) => {
                let body = self.render_to_string(&node.body);
                let value = self.apply_filters(Value::String(body), &node.filters);
                out.push_str(&value.to_string());
            }
            Node::CustomTag(tag) => self.render_custom_tag(tag, out),
        }
    }

    /// Run `f` with `frame` pushed as the innermost scope.
    ///
    /// The frame is popped afterwards whatever `f` reported, so the stack
    /// depth is the same before and after.
    pub(crate) fn scoped<T>(&mut self, frame: Map, f: impl FnOnce(&mut Self) -> T) -> T {
        let depth = self.scopes.depth();
        self.scopes.push(frame);
        let result = f(self);
        self.scopes.pop();
        debug_assert_eq!(self.scopes.depth(), depth);
        result
    }

    fn render_if(&mut self, node: &If, out: &mut String) {
        for branch in &node.branches {
            if self.eval(&branch.test).is_truthy() {
                self.render_nodes(&branch.body, out);
                return;
            }
        }
        if let Some(body) = &node.else_body {
            self.render_nodes(body, out);
        }
    }

    fn render_for(&mut self, node: &For, out: &mut String) {
        let iterable = self.eval(&node.iter);
        let Some(items) = iterable.iterate() else {
            self.report(
                RenderError::NotIterable {
                    type_name: iterable.type_name().to_string(),
                },
                node.iter.span(),
            );
            if let Some(body) = &node.else_body {
                self.render_nodes(body, out);
            }
            return;
        };

        let items = match &node.condition {
            Some(condition) => {
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    let keep = self.scoped(Map::new(), |r| {
                        r.assign(&node.target, item.clone());
                        r.eval(condition).is_truthy()
                    });
                    if keep {
                        kept.push(item);
                    }
                }
                kept
            }
            None => items,
        };

        if items.is_empty() {
            if let Some(body) = &node.else_body {
                self.render_nodes(body, out);
            }
            return;
        }

        self.loop_depth += 1;
        for (index, item) in items.iter().enumerate() {
            let mut frame = Map::new();
            frame.insert("loop".to_string(), loop_info(&items, index, self.loop_depth));
            self.scoped(frame, |r| {
                r.assign(&node.target, item.clone());
                r.render_nodes(&node.body, out);
            });
            if self.halted {
                break;
            }
        }
        self.loop_depth -= 1;
    }

    fn render_with(&mut self, node: &With, out: &mut String) {
        let values: Vec<Value> = node
            .bindings
            .iter()
            .map(|binding| self.eval(&binding.value))
            .collect();
        self.scoped(Map::new(), |r| {
            for (binding, value) in node.bindings.iter().zip(values) {
                r.assign(&binding.target, value);
            }
            r.render_nodes(&node.body, out);
        });
    }

    /// Bind `value` to `target` in the innermost scope.
    pub(crate) fn assign(&mut self, target: &Target, value: Value) {
        match target {
            Target::Name { name, .. } => self.scopes.set(name.clone(), value),
            Target::Tuple { items, span } => {
                if items.is_empty() {
                    return;
                }
                let Some(values) = value.iterate() else {
                    self.report(
                        RenderError::NotIterable {
                            type_name: value.type_name().to_string(),
                        },
                        *span,
                    );
                    for item in items {
                        self.assign(item, Value::Nil);
                    }
                    return;
                };
                if values.len() != items.len() {
                    self.report(
                        RenderError::UnpackMismatch {
                            expected: items.len(),
                            found: values.len(),
                        },
                        *span,
                    );
                }
                let mut values = values.into_iter();
                for item in items {
                    self.assign(item, values.next().unwrap_or_default());
                }
            }
            Target::Attribute {
                value: base,
                attr,
                span,
            } => self.store(base, PathKey::Attr(attr.clone()), value, *span),
            Target::Item {
                value: base,
                index,
                span,
            } => {
                let index = self.eval(index);
                self.store(base, PathKey::Index(index), value, *span);
            }
        }
    }

    /// Assign through an attribute or item path rooted at a local variable.
    fn store(&mut self, base: &Expr, key: PathKey, value: Value, span: Span) {
        let Some((root, mut path)) = self.place(base) else {
            self.report(
                RenderError::NotAssignable {
                    target: key.describe(),
                },
                span,
            );
            return;
        };
        path.push(key);
        let result = match self.scopes.get_mut(&root) {
            Some(slot) => store_at(slot, &path, value),
            None => Err(RenderError::NotAssignable {
                target: format!("'{root}', which is not a local variable"),
            }),
        };
        if let Err(error) = result {
            self.report(error, span);
        }
    }

    fn place(&mut self, expr: &Expr) -> Option<(String, Vec<PathKey>)> {
        match expr {
            Expr::Name(name) => Some((name.name.clone(), Vec::new())),
            Expr::Group(group) => self.place(&group.expr),
            Expr::Attribute(attribute) => {
                let (root, mut path) = self.place(&attribute.value)?;
                path.push(PathKey::Attr(attribute.attr.clone()));
                Some((root, path))
            }
            Expr::Item(item) => {
                let (root, mut path) = self.place(&item.value)?;
                let index = self.eval(&item.index);
                path.push(PathKey::Index(index));
                Some((root, path))
            }
            _ => None,
        }
    }

    fn render_block(&mut self, block: &Block, out: &mut String) {
        let overridden = self
            .overrides
            .get(&block.name)
            .is_some_and(|chain| !chain.is_empty());
        if overridden {
            self.render_block_level(&block.name, 0, out);
        } else {
            self.render_nodes(&block.body, out);
        }
    }

    /// Render level `level` of a block's override chain. Returns `false` if
    /// the chain is not that deep.
    fn render_block_level(&mut self, name: &str, level: usize, out: &mut String) -> bool {
        let Some(entry) = self
            .overrides
            .get(name)
            .and_then(|chain| chain.get(level))
            .cloned()
        else {
            return false;
        };
        self.super_stack.push((name.to_string(), level));
        self.templates.push(entry.template);
        self.render_nodes(&entry.block.body, out);
        self.templates.pop();
        self.super_stack.pop();
        true
    }

    /// `super()`: the enclosing block's body one level up the chain.
    pub(crate) fn call_super(&mut self, span: Span) -> Value {
        if let Some((name, level)) = self.super_stack.last().cloned() {
            let mut out = String::new();
            if self.render_block_level(&name, level + 1, &mut out) {
                return Value::String(out);
            }
        }
        self.report(RenderError::NoParentBlock, span);
        Value::Nil
    }

    fn render_include(&mut self, node: &Include, out: &mut String) {
        let span = node.template.span();
        let candidates = match self.eval(&node.template) {
            Value::String(name) => vec![name],
            Value::Seq(names) => names.iter().map(ToString::to_string).collect(),
            other => {
                self.report(
                    RenderError::InvalidTemplateName {
                        type_name: other.type_name().to_string(),
                    },
                    span,
                );
                return;
            }
        };

        for name in &candidates {
            if self.load_stack.contains(name) {
                self.report_cycle(name, span);
                return;
            }
            match self.try_load(name) {
                Ok(loaded) => {
                    self.render_included(&loaded, node.with_context, out);
                    return;
                }
                Err(error) if error.is_not_found() => {}
                Err(error) => {
                    self.report(
                        RenderError::TemplateNotFound {
                            name: name.clone(),
                            reason: error.to_string(),
                        },
                        span,
                    );
                    return;
                }
            }
        }

        if !node.ignore_missing {
            self.report(
                RenderError::TemplateNotFound {
                    name: candidates.join(", "),
                    reason: "no loader could find it".to_string(),
                },
                span,
            );
        }
    }

    /// Render an included template with its own macros and blocks, sharing
    /// the caller's scopes only `with context`.
    fn render_included(&mut self, loaded: &LoadedTemplate, with_context: bool, out: &mut String) {
        let saved_scopes = (!with_context).then(|| std::mem::take(&mut self.scopes));
        let saved_macros = self.macros.clone();
        let saved_namespaces = self.namespaces.clone();
        let saved_homes = std::mem::take(&mut self.macro_homes);
        let saved_callers = std::mem::take(&mut self.callers);
        let saved_overrides = std::mem::take(&mut self.overrides);
        let saved_super = std::mem::take(&mut self.super_stack);

        self.render_loaded(loaded, out);

        self.super_stack = saved_super;
        self.overrides = saved_overrides;
        self.callers = saved_callers;
        self.macro_homes = saved_homes;
        self.namespaces = saved_namespaces;
        self.macros = saved_macros;
        if let Some(scopes) = saved_scopes {
            self.scopes = scopes;
        }
    }

    /// `{% import "forms.html" as forms %}` exposes the template's macros as `forms.name(...)`.
    fn import(&mut self, node: &Import) {
        let Some(name) = self.template_name(&node.template) else {
            return;
        };
        if let Some(loaded) = self.load(&name, node.template.span()) {
            self.namespaces
                .insert(node.alias.clone(), Arc::clone(&loaded.macros));
        }
    }

    fn from_import(&mut self, node: &FromImport) {
        let Some(name) = self.template_name(&node.template) else {
            return;
        };
        let Some(loaded) = self.load(&name, node.template.span()) else {
            return;
        };
        for import in &node.names {
            match loaded.macros.get(&import.name) {
                Some(definition) => {
                    self.macros.insert(
                        import.local_name().to_string(),
                        MacroRef {
                            definition: Arc::clone(definition),
                            home: Arc::clone(&loaded.macros),
                        },
                    );
                }
                None => self.report(
                    RenderError::UnknownMacro {
                        name: format!("{}.{}", loaded.name, import.name),
                    },
                    import.span,
                ),
            }
        }
    }

    fn eval_call_block(&mut self, node: &CallBlock) -> Value {
        let Expr::Call(call) = &node.call else {
            return self.eval(&node.call);
        };
        let frame = if node.caller_params.is_empty() {
            CallerFrame::Rendered(self.render_to_string(&node.body))
        } else {
            CallerFrame::Deferred(Arc::new(node.clone()))
        };
        self.eval_call(call, Some(frame))
    }

    fn render_custom_tag(&mut self, tag: &CustomTag, out: &mut String) {
        let env = self.env;
        if let Some(renderer) = env.tag_renderer(&tag.name) {
            let rendered = renderer.render(&mut RenderContext::new(self), tag);
            out.push_str(&rendered);
            return;
        }
        self.report(
            RenderError::UnknownTagRenderer {
                tag: tag.name.clone(),
            },
            tag.span,
        );
        if let Some(body) = &tag.body {
            self.render_nodes(body, out);
        }
    }

    /// Evaluate a template name expression, reporting anything but a string.
    fn template_name(&mut self, expr: &Expr) -> Option<String> {
        match self.eval(expr) {
            Value::String(name) => Some(name),
            other => {
                self.report(
                    RenderError::InvalidTemplateName {
                        type_name: other.type_name().to_string(),
                    },
                    expr.span(),
                );
                None
            }
        }
    }

    fn report_cycle(&mut self, name: &str, span: Span) {
        let mut chain = self.load_stack.clone();
        chain.push(name.to_string());
        self.report(
            RenderError::TemplateCycle {
                name: name.to_string(),
                chain: chain.join(" -> "),
            },
            span,
        );
    }

    /// Load through the cache, reporting the template's parse diagnostics
    /// the first time this render uses it.
    fn try_load(&mut self, name: &str) -> Result<Arc<LoadedTemplate>, LoadError> {
        let loaded = self.cache.get_or_load(self.env, name)?;
        if self.reported.insert(name.to_string()) {
            for diagnostic in &loaded.diagnostics {
                self.diagnostics
                    .push(diagnostic.clone().in_template(name));
            }
        }
        Ok(loaded)
    }

    fn load(&mut self, name: &str, span: Span) -> Option<Arc<LoadedTemplate>> {
        match self.try_load(name) {
            Ok(loaded) => Some(loaded),
            Err(error) => {
                self.report(
                    RenderError::TemplateNotFound {
                        name: name.to_string(),
                        reason: error.to_string(),
                    },
                    span,
                );
                None
            }
        }
    }

    pub(crate) fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }
}

fn add_blocks(
    overrides: &mut FxHashMap<String, Vec<BlockRef>>,
    blocks: &FxHashMap<String, Arc<Block>>,
    template: &str,
) {
    for (name, block) in blocks {
        overrides.entry(name.clone()).or_default().push(BlockRef {
            block: Arc::clone(block),
            template: template.to_string(),
        });
    }
}

/// The `loop` variable for iteration `index` of `items`.
fn loop_info(items: &[Value], index: usize, depth: usize) -> Value {
    let length = items.len();
    let mut info = Map::new();
    info.insert("index".to_string(), Value::from(index + 1));
    info.insert("index0".to_string(), Value::from(index));
    info.insert("revindex".to_string(), Value::from(length - index));
    info.insert("revindex0".to_string(), Value::from(length - index - 1));
    info.insert("first".to_string(), Value::Bool(index == 0));
    info.insert("last".to_string(), Value::Bool(index + 1 == length));
    info.insert("length".to_string(), Value::from(length));
    info.insert(
        "previtem".to_string(),
        Value::from(index.checked_sub(1).and_then(|i| items.get(i)).cloned()),
    );
    info.insert(
        "nextitem".to_string(),
        Value::from(items.get(index + 1).cloned()),
    );
    info.insert("depth".to_string(), Value::from(depth));
    info.insert("depth0".to_string(), Value::from(depth - 1));
    Value::Map(info)
}

fn store_at(slot: &mut Value, path: &[PathKey], value: Value) -> Result<(), RenderError> {
    let Some((last, parents)) = path.split_last() else {
        *slot = value;
        return Ok(());
    };
    let mut current = slot;
    for key in parents {
        current = match child_mut(current, key) {
            Some(child) => child,
            None => {
                return Err(RenderError::NotAssignable {
                    target: format!("{} of a missing value", key.describe()),
                })
            }
        };
    }
    match (current, last) {
        (Value::Map(map), key) => {
            map.insert(key.key(), value);
            Ok(())
        }
        (Value::Seq(items), PathKey::Index(index)) => {
            let slot = index
                .as_i64()
                .and_then(|i| resolve_index(i, items.len()))
                .and_then(|i| items.get_mut(i));
            match slot {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(RenderError::NotAssignable {
                    target: format!("{}, which is out of range", last.describe()),
                }),
            }
        }
        (other, key) => Err(RenderError::NotAssignable {
            target: format!("{} of a '{}' value", key.describe(), other.type_name()),
        }),
    }
}

fn child_mut<'v>(value: &'v mut Value, key: &PathKey) -> Option<&'v mut Value> {
    match (value, key) {
        (Value::Map(map), key) => map.get_mut(&key.key()),
        (Value::Seq(items), PathKey::Index(index)) => {
            let index = resolve_index(index.as_i64()?, items.len())?;
            items.get_mut(index)
        }
        _ => None,
    }
}
