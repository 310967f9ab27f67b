//! Registered tag extensions and the handle they parse through.
//!
//! An extension never sees the [`Parser`]. It receives a [`TagParser`],
//! which only exposes token inspection, expression parsing and block-end
//! recovery, so a misbehaving hook can at worst produce a bad node.

use std::fmt;
use std::sync::Arc;

use jtl_source::Diagnostic;
use jtl_source::DiagnosticKind;
use jtl_source::Span;
use rustc_hash::FxHashMap;

use crate::ast::CustomTag;
use crate::ast::Expr;
use crate::ast::Node;
use crate::parser::Parser;
use crate::tokens::Token;

/// Parse hook for one custom tag name.
///
/// Called with the handle positioned just after the tag name. Returning
/// `None` drops the tag from the tree. If the hook stops before the tag's
/// closing `%}`, the parser reports the leftover tokens and skips them.
pub trait TagExtension: Send + Sync {
    fn parse(&self, parser: &mut TagParser<'_, '_>, start: Span) -> Option<Node>;
}

impl<F> TagExtension for F
where
    F: Fn(&mut TagParser<'_, '_>, Span) -> Option<Node> + Send + Sync,
{
    fn parse(&self, parser: &mut TagParser<'_, '_>, start: Span) -> Option<Node> {
        self(parser, start)
    }
}

/// Name-keyed table of tag extensions.
///
/// Built-in tags always win over a registered extension of the same name
/// unless overriding is switched on with [`TagRegistry::allow_override`].
#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: FxHashMap<String, Arc<dyn TagExtension>>,
    allow_override: bool,
}

impl TagRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, extension: impl TagExtension + 'static) {
        self.tags.insert(name.into(), Arc::new(extension));
    }

    /// Let registered extensions replace built-in tags of the same name.
    pub fn allow_override(&mut self, allow: bool) {
        self.allow_override = allow;
    }

    #[must_use]
    pub fn overrides_builtins(&self) -> bool {
        self.allow_override
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TagExtension>> {
        self.tags.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Copy every extension of `other` into this registry, replacing clashes.
    pub fn extend_from(&mut self, other: &TagRegistry) {
        for (name, extension) in &other.tags {
            self.tags.insert(name.clone(), Arc::clone(extension));
        }
        self.allow_override |= other.allow_override;
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("TagRegistry")
            .field("tags", &names)
            .field("allow_override", &self.allow_override)
            .finish()
    }
}

/// A ready-made extension producing [`CustomTag`] nodes.
///
/// Arguments are parsed as a comma-optional expression list. With an end
/// tag, everything up to it becomes the tag's body.
#[derive(Clone, Debug, Default)]
pub struct GenericTag {
    end_tag: Option<String>,
}

impl GenericTag {
    /// A tag without a body, like `{% now "Y" %}`.
    #[must_use]
    pub fn inline() -> Self {
        Self { end_tag: None }
    }

    /// A tag with a body closed by `end_tag`, like `{% cache %}...{% endcache %}`.
    #[must_use]
    pub fn block(end_tag: impl Into<String>) -> Self {
        Self {
            end_tag: Some(end_tag.into()),
        }
    }
}

impl TagExtension for GenericTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>, start: Span) -> Option<Node> {
        let args = parser.parse_expression_until(&[]);
        parser.expect_block_end();
        let body = self
            .end_tag
            .as_deref()
            .map(|end| parser.parse_body_until(&[end]).0);
        Some(Node::CustomTag(CustomTag {
            name: parser.tag_name().to_string(),
            args,
            body,
            span: parser.span_from(start),
        }))
    }
}

/// The restricted view of the parser handed to a [`TagExtension`].
pub struct TagParser<'p, 't> {
    parser: &'p mut Parser<'t>,
    name: String,
    start: Span,
    closed: bool,
}

impl<'p, 't> TagParser<'p, 't> {
    pub(crate) fn new(parser: &'p mut Parser<'t>, name: String, start: Span) -> Self {
        Self {
            parser,
            name,
            start,
            closed: false,
        }
    }

    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.name
    }

    /// The span of the tag's opening `{%`.
    #[must_use]
    pub fn start(&self) -> Span {
        self.start
    }

    #[must_use]
    pub fn current(&self) -> &Token {
        self.parser.peek()
    }

    #[must_use]
    pub fn at_block_end(&self) -> bool {
        self.parser.at_tag_end()
    }

    /// Consume the name token `keyword` if it is next.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.parser.eat_name(keyword)
    }

    pub fn parse_expression(&mut self) -> Expr {
        self.parser.parse_expression()
    }

    /// Parse expressions until the block end or one of the `terminators` keywords.
    ///
    /// Commas between expressions are optional.
    pub fn parse_expression_until(&mut self, terminators: &[&str]) -> Vec<Expr> {
        let mut exprs = Vec::new();
        while !self.parser.at_tag_end() && !self.parser.at_eof() {
            if terminators.iter().any(|t| self.parser.peek().is_name(t)) {
                break;
            }
            let before = self.parser.position();
            exprs.push(self.parser.parse_expression());
            self.parser.eat_comma();
            if self.parser.position() == before {
                break;
            }
        }
        exprs
    }

    /// Consume the closing `%}`, skipping and reporting anything before it.
    pub fn expect_block_end(&mut self) {
        if !self.closed {
            self.parser.expect_block_end();
            self.closed = true;
        }
    }

    /// Parse nodes until one of `end_tags`, consuming that end tag.
    ///
    /// Returns the body and the end tag that closed it. At end of input, or
    /// at an end tag belonging to an enclosing block, a missing-end-tag
    /// diagnostic is reported and `None` is returned.
    pub fn parse_body_until(&mut self, end_tags: &[&str]) -> (Vec<Node>, Option<String>) {
        self.expect_block_end();
        let (body, end) = self.parser.parse_body(end_tags);
        match end {
            Some(end) => {
                self.parser.finish_end_tag();
                (body, Some(end))
            }
            None => {
                let expected = end_tags.first().copied().unwrap_or("end");
                self.parser.missing_end_tag(&self.name, expected, self.start);
                (body, None)
            }
        }
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.parser.push_diagnostic(Diagnostic::new(kind, message, span));
    }

    /// A span from `start` to the end of the last consumed token.
    #[must_use]
    pub fn span_from(&self, start: Span) -> Span {
        self.parser.span_from(start)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}
