use jtl_source::Diagnostic;
use jtl_source::Span;

use crate::ast::Binding;
use crate::ast::Block;
use crate::ast::CallBlock;
use crate::ast::Comment;
use crate::ast::Expr;
use crate::ast::Extends;
use crate::ast::FilterBlock;
use crate::ast::For;
use crate::ast::FromImport;
use crate::ast::If;
use crate::ast::IfBranch;
use crate::ast::Import;
use crate::ast::ImportName;
use crate::ast::Include;
use crate::ast::Macro;
use crate::ast::Node;
use crate::ast::Output;
use crate::ast::Param;
use crate::ast::Raw;
use crate::ast::Set;
use crate::ast::SetBlock;
use crate::ast::Target;
use crate::ast::Template;
use crate::ast::Text;
use crate::ast::Tuple;
use crate::ast::With;
use crate::error::ParseError;
use crate::extension::TagParser;
use crate::extension::TagRegistry;
use crate::recovery::skip_to_sync;
use crate::tokens::Token;
use crate::tokens::TokenKind;

const BUILTIN_TAGS: &[&str] = &[
    "if", "for", "set", "block", "extends", "include", "import", "from", "macro", "call", "with",
    "filter", "raw",
];

/// Recursive-descent parser over a lexed token stream.
///
/// The parser never fails. Each problem becomes a diagnostic and parsing
/// resumes at the next synchronization point: the end of the current tag,
/// or an end tag some open block is waiting for.
pub struct Parser<'t> {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Vec<Diagnostic>,
    tags: Option<&'t TagRegistry>,
    /// End tags of every open block, innermost last.
    end_stack: Vec<Vec<String>>,
}

impl<'t> Parser<'t> {
    #[must_use]
    pub fn new(tokens: Vec<Token>, tags: Option<&'t TagRegistry>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|token| !token.kind().is_trivia())
            .collect();
        if !tokens.last().is_some_and(|t| t.is(TokenKind::Eof)) {
            let end = tokens.last().map(|t| t.span().end()).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", Span::point(end)));
        }
        Self {
            tokens,
            current: 0,
            diagnostics: Vec::new(),
            tags,
            end_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn parse(mut self) -> (Template, Vec<Diagnostic>) {
        let start = self.peek().span();
        let (body, _) = self.parse_body(&[]);
        let end = self.peek().span();
        let template = Template {
            name: None,
            body,
            span: start.cover(end),
        };
        (template, self.diagnostics)
    }

    /// Parse nodes until one of `ends` is the next tag name.
    ///
    /// The end tag is left unconsumed and returned. `None` means the body
    /// stopped at end of input or at an end tag of an enclosing block.
    pub(crate) fn parse_body(&mut self, ends: &[&str]) -> (Vec<Node>, Option<String>) {
        let mut nodes = Vec::new();
        self.end_stack
            .push(ends.iter().map(ToString::to_string).collect());

        let found = loop {
            let token = self.peek();
            match token.kind() {
                TokenKind::Eof => break None,
                TokenKind::Text => {
                    if let Some(text) = self.parse_text() {
                        nodes.push(Node::Text(text));
                    }
                }
                TokenKind::Comment { .. } => nodes.push(self.parse_comment()),
                TokenKind::VariableStart { .. } => nodes.push(self.parse_output()),
                TokenKind::BlockStart { .. } => {
                    let name = self.peek_at(1);
                    if name.is(TokenKind::Name) {
                        let name = name.lexeme();
                        if ends.contains(&name) {
                            break Some(name.to_string());
                        }
                        if self.closes_enclosing(name) {
                            break None;
                        }
                    }
                    if let Some(node) = self.parse_statement() {
                        nodes.push(node);
                    }
                }
                _ => {
                    let found = token.describe();
                    let span = token.span();
                    self.error(ParseError::UnexpectedToken { found }, span);
                    self.advance();
                }
            }
        };

        self.end_stack.pop();
        (nodes, found)
    }

    fn closes_enclosing(&self, name: &str) -> bool {
        let outer = self.end_stack.len().saturating_sub(1);
        self.end_stack[..outer]
            .iter()
            .any(|ends| ends.iter().any(|end| end == name))
    }

    fn parse_text(&mut self) -> Option<Text> {
        let index = self.current;
        let token = self.advance();
        let content = self.trimmed(index, token.lexeme());
        (!content.is_empty()).then(|| Text {
            content,
            span: token.span(),
        })
    }

    /// Apply `-` whitespace control from the neighbours of the text token at `index`.
    fn trimmed(&self, index: usize, text: &str) -> String {
        let mut text = text;
        if index > 0 && self.tokens[index - 1].kind().trims_after() {
            text = text.trim_start();
        }
        if self
            .tokens
            .get(index + 1)
            .is_some_and(|next| next.kind().trims_before())
        {
            text = text.trim_end();
        }
        text.to_string()
    }

    fn parse_comment(&mut self) -> Node {
        let token = self.advance();
        let inner = token.lexeme().strip_prefix("{#").unwrap_or(token.lexeme());
        let inner = inner.strip_suffix("#}").unwrap_or(inner);
        let inner = match token.kind() {
            TokenKind::Comment {
                trim_before,
                trim_after,
            } => {
                let inner = if trim_before {
                    inner.strip_prefix('-').unwrap_or(inner)
                } else {
                    inner
                };
                if trim_after {
                    inner.strip_suffix('-').unwrap_or(inner)
                } else {
                    inner
                }
            }
            _ => inner,
        };
        Node::Comment(Comment {
            content: inner.trim().to_string(),
            span: token.span(),
        })
    }

    fn parse_output(&mut self) -> Node {
        let start = self.advance().span();
        let expr = self.parse_expression();
        self.expect_tag_end(TokenKind::VariableEnd { trim: false });
        Node::Output(Output {
            expr,
            span: self.span_from(start),
        })
    }

    fn parse_statement(&mut self) -> Option<Node> {
        let start = self.advance().span();
        if !self.at(TokenKind::Name) {
            let found = self.peek().describe();
            self.error(
                ParseError::ExpectedToken {
                    expected: "tag name".to_string(),
                    found,
                },
                self.peek().span(),
            );
            self.expect_block_end();
            return None;
        }

        let name = self.advance().lexeme().to_string();
        let builtin = BUILTIN_TAGS.contains(&name.as_str());

        if let Some(tags) = self.tags {
            if let Some(extension) = tags.get(&name) {
                if !builtin || tags.overrides_builtins() {
                    tracing::trace!(tag = %name, builtin, "dispatching tag to extension");
                    let mut handle = TagParser::new(self, name, start);
                    let node = extension.parse(&mut handle, start);
                    let closed = handle.is_closed();
                    if !closed {
                        self.expect_block_end();
                    }
                    return node;
                }
            }
        }

        match name.as_str() {
            "if" => Some(self.parse_if(start)),
            "for" => Some(self.parse_for(start)),
            "set" => Some(self.parse_set(start)),
            "block" => Some(self.parse_block(start)),
            "extends" => Some(self.parse_extends(start)),
            "include" => Some(self.parse_include(start)),
            "import" => Some(self.parse_import(start)),
            "from" => Some(self.parse_from_import(start)),
            "macro" => Some(self.parse_macro(start)),
            "call" => Some(self.parse_call_block(start)),
            "with" => Some(self.parse_with(start)),
            "filter" => Some(self.parse_filter_block(start)),
            "raw" => Some(self.parse_raw(start)),
            other => {
                let error = if other.starts_with("end") || matches!(other, "elif" | "else") {
                    ParseError::UnexpectedEndTag {
                        tag: other.to_string(),
                    }
                } else {
                    ParseError::UnknownTag {
                        tag: other.to_string(),
                    }
                };
                self.error(error, start.cover(self.previous_span()));
                self.skip_to_tag_end();
                None
            }
        }
    }

    fn parse_if(&mut self, start: Span) -> Node {
        let mut test = self.parse_expression();
        self.expect_block_end();

        let mut branches = Vec::new();
        let mut branch_start = start;
        let mut else_body = None;

        loop {
            let (body, end) = self.parse_body(&["elif", "else", "endif"]);
            branches.push(IfBranch {
                test,
                body,
                span: self.span_from(branch_start),
            });
            match end.as_deref() {
                Some("elif") => {
                    branch_start = self.consume_tag_open();
                    test = self.parse_expression();
                    self.expect_block_end();
                }
                Some("else") => {
                    self.finish_end_tag();
                    else_body = Some(self.parse_closing_body(&["endif"], "if", start));
                    break;
                }
                Some(_) => {
                    self.finish_end_tag();
                    break;
                }
                None => {
                    self.missing_end_tag("if", "endif", start);
                    break;
                }
            }
        }

        Node::If(If {
            branches,
            else_body,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self, start: Span) -> Node {
        let target = self.parse_assign_target("for");
        self.expect_keyword("in");
        let iter = self.parse_or();
        let condition = self.eat_name("if").then(|| self.parse_or());
        self.expect_block_end();

        let (body, end) = self.parse_body(&["else", "endfor"]);
        let else_body = match end.as_deref() {
            Some("else") => {
                self.finish_end_tag();
                Some(self.parse_closing_body(&["endfor"], "for", start))
            }
            Some(_) => {
                self.finish_end_tag();
                None
            }
            None => {
                self.missing_end_tag("for", "endfor", start);
                None
            }
        };

        Node::For(For {
            target,
            iter,
            condition,
            body,
            else_body,
            span: self.span_from(start),
        })
    }

    fn parse_set(&mut self, start: Span) -> Node {
        let target = self.parse_assign_target("set");

        if self.eat(TokenKind::Assign).is_some() {
            let value = self.parse_expression_list();
            self.expect_block_end();
            return Node::Set(Set {
                target,
                value,
                span: self.span_from(start),
            });
        }

        let mut filters = Vec::new();
        while self.eat(TokenKind::Pipe).is_some() {
            filters.push(self.parse_filter_call());
        }
        self.expect_block_end();
        let body = self.parse_closing_body(&["endset"], "set", start);
        Node::SetBlock(SetBlock {
            target,
            filters,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_block(&mut self, start: Span) -> Node {
        let name = self.expect_name("block name").unwrap_or_default();
        // Accepted for compatibility; every block is scoped and none is required.
        while self.eat_name("scoped") || self.eat_name("required") {}
        self.expect_block_end();
        let body = self.parse_closing_body(&["endblock"], "block", start);
        Node::Block(Block {
            name,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_extends(&mut self, start: Span) -> Node {
        let template = self.parse_expression();
        self.expect_block_end();
        Node::Extends(Extends {
            template,
            span: self.span_from(start),
        })
    }

    fn parse_include(&mut self, start: Span) -> Node {
        let template = self.parse_expression();
        let mut ignore_missing = false;
        let mut with_context = false;
        loop {
            if self.at_name("ignore") && self.peek_at(1).is_name("missing") {
                self.advance();
                self.advance();
                ignore_missing = true;
            } else if let Some(context) = self.parse_context_modifier() {
                with_context = context;
            } else {
                break;
            }
        }
        self.expect_block_end();
        Node::Include(Include {
            template,
            with_context,
            ignore_missing,
            span: self.span_from(start),
        })
    }

    fn parse_import(&mut self, start: Span) -> Node {
        let template = self.parse_expression();
        self.expect_keyword("as");
        let alias = self.expect_name("namespace name").unwrap_or_default();
        let with_context = self.parse_context_modifier().unwrap_or(false);
        self.expect_block_end();
        Node::Import(Import {
            template,
            alias,
            with_context,
            span: self.span_from(start),
        })
    }

    fn parse_from_import(&mut self, start: Span) -> Node {
        let template = self.parse_expression();
        self.expect_keyword("import");

        let mut names = Vec::new();
        while self.at(TokenKind::Name) && !self.at_context_modifier() {
            let token = self.advance();
            let alias = if self.eat_name("as") {
                self.expect_name("alias")
            } else {
                None
            };
            names.push(ImportName {
                name: token.lexeme().to_string(),
                alias,
                span: token.span().cover(self.previous_span()),
            });
            if !self.eat_comma() {
                break;
            }
        }
        if names.is_empty() {
            let found = self.peek().describe();
            self.error(
                ParseError::ExpectedToken {
                    expected: "name to import".to_string(),
                    found,
                },
                self.peek().span(),
            );
        }

        let with_context = self.parse_context_modifier().unwrap_or(false);
        self.expect_block_end();
        Node::FromImport(FromImport {
            template,
            names,
            with_context,
            span: self.span_from(start),
        })
    }

    fn parse_macro(&mut self, start: Span) -> Node {
        let name = self.expect_name("macro name").unwrap_or_default();
        let params = if self.at(TokenKind::LParen) {
            self.parse_params()
        } else {
            let found = self.peek().describe();
            self.error(
                ParseError::ExpectedToken {
                    expected: "'('".to_string(),
                    found,
                },
                self.peek().span(),
            );
            Vec::new()
        };
        self.expect_block_end();
        let body = self.parse_closing_body(&["endmacro"], "macro", start);
        Node::Macro(Macro {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_call_block(&mut self, start: Span) -> Node {
        let caller_params = if self.at(TokenKind::LParen) {
            self.parse_params()
        } else {
            Vec::new()
        };
        let call = self.parse_expression();
        self.expect_block_end();
        let body = self.parse_closing_body(&["endcall"], "call", start);
        Node::CallBlock(CallBlock {
            call,
            caller_params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_with(&mut self, start: Span) -> Node {
        let mut bindings = Vec::new();
        while !self.at_tag_end() && !self.at_eof() {
            let before = self.current;
            let target = self.parse_target_atom();
            let target = self.assign_target(target, "with");
            self.expect(TokenKind::Assign);
            let value = self.parse_expression();
            bindings.push(Binding { target, value });
            if !self.eat_comma() || self.current == before {
                break;
            }
        }
        self.expect_block_end();
        let body = self.parse_closing_body(&["endwith"], "with", start);
        Node::With(With {
            bindings,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_filter_block(&mut self, start: Span) -> Node {
        let mut filters = vec![self.parse_filter_call()];
        while self.eat(TokenKind::Pipe).is_some() {
            filters.push(self.parse_filter_call());
        }
        self.expect_block_end();
        let body = self.parse_closing_body(&["endfilter"], "filter", start);
        Node::FilterBlock(FilterBlock {
            filters,
            body,
            span: self.span_from(start),
        })
    }

    /// The lexer hands the whole body of a raw block over as one text token.
    fn parse_raw(&mut self, start: Span) -> Node {
        self.expect_block_end();
        let content = if self.at(TokenKind::Text) {
            let index = self.current;
            let token = self.advance();
            self.trimmed(index, token.lexeme())
        } else {
            String::new()
        };
        let closed = matches!(self.peek().kind(), TokenKind::BlockStart { .. })
            && self.peek_at(1).is_name("endraw");
        if closed {
            self.finish_end_tag();
        } else {
            self.missing_end_tag("raw", "endraw", start);
        }
        Node::Raw(Raw {
            content,
            span: self.span_from(start),
        })
    }

    /// Parse a body that has exactly one closing tag, consuming it when present.
    fn parse_closing_body(&mut self, ends: &[&str], tag: &str, start: Span) -> Vec<Node> {
        let (body, end) = self.parse_body(ends);
        if end.is_some() {
            self.finish_end_tag();
        } else {
            self.missing_end_tag(tag, ends[0], start);
        }
        body
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        self.advance();
        while !self.at(TokenKind::RParen) && !self.at_tag_end() && !self.at_eof() {
            let Some(token) = self.eat(TokenKind::Name) else {
                let found = self.peek().describe();
                self.error(
                    ParseError::ExpectedToken {
                        expected: "parameter name".to_string(),
                        found,
                    },
                    self.peek().span(),
                );
                break;
            };
            let default = self
                .eat(TokenKind::Assign)
                .map(|_| self.parse_expression());
            params.push(Param {
                name: token.lexeme().to_string(),
                default,
                span: token.span().cover(self.previous_span()),
            });
            if !self.eat_comma() {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        params
    }

    fn parse_context_modifier(&mut self) -> Option<bool> {
        if !self.at_context_modifier() {
            return None;
        }
        let with = self.advance().is_name("with");
        self.advance();
        Some(with)
    }

    fn at_context_modifier(&self) -> bool {
        (self.at_name("with") || self.at_name("without")) && self.peek_at(1).is_name("context")
    }

    /// `a`, `a, b` or `(a, b)` in assignment position.
    fn parse_assign_target(&mut self, tag: &str) -> Target {
        let first = self.parse_target_atom();
        let expr = if self.at(TokenKind::Comma) {
            let mut items = vec![first];
            while self.eat_comma() {
                if self.at(TokenKind::Assign) || self.at_name("in") || self.at_tag_end() {
                    break;
                }
                items.push(self.parse_target_atom());
            }
            let span = items[0].span().cover(self.previous_span());
            Expr::Tuple(Tuple { items, span })
        } else {
            first
        };
        self.assign_target(expr, tag)
    }

    /// Convert an expression in assignment position, reporting what cannot be assigned.
    ///
    /// An invalid target becomes an empty tuple, which binds nothing.
    fn assign_target(&mut self, expr: Expr, tag: &str) -> Target {
        let span = expr.span();
        match Target::try_from(expr) {
            Ok(target) => target,
            Err(bad) => {
                self.error(
                    ParseError::InvalidAssignmentTarget {
                        tag: tag.to_string(),
                    },
                    bad,
                );
                Target::Tuple {
                    items: Vec::new(),
                    span,
                }
            }
        }
    }

    /// Consume `{% name` of an intermediate or end tag and return the `{%` span.
    fn consume_tag_open(&mut self) -> Span {
        let start = self.advance().span();
        self.advance();
        start
    }

    /// Consume a whole end tag. `{% endblock name %}` style labels are allowed.
    pub(crate) fn finish_end_tag(&mut self) {
        self.consume_tag_open();
        if self.at(TokenKind::Name) && self.peek_at(1).kind().is_tag_end() {
            self.advance();
        }
        self.expect_block_end();
    }

    pub(crate) fn missing_end_tag(&mut self, tag: &str, expected: &str, start: Span) {
        self.error(
            ParseError::MissingEndTag {
                tag: tag.to_string(),
                expected: expected.to_string(),
            },
            start,
        );
    }

    /// Expect the end of the current tag.
    ///
    /// Anything before it is reported once and skipped; the closer itself
    /// is consumed.
    pub(crate) fn expect_block_end(&mut self) {
        self.expect_tag_end(TokenKind::BlockEnd { trim: false });
    }

    fn expect_tag_end(&mut self, expected: TokenKind) {
        if self.at_tag_end() {
            self.advance();
            return;
        }

        let found = self.peek().describe();
        let span = self.peek().span();
        self.error(
            ParseError::ExpectedToken {
                expected: expected.describe().to_string(),
                found,
            },
            span,
        );
        self.skip_to_tag_end();
    }

    /// Skip the rest of the current tag, closer included, without reporting.
    fn skip_to_tag_end(&mut self) {
        let tokens = &self.tokens;
        let last = tokens.len() - 1;
        self.current = skip_to_sync(self.current, last, |i| {
            let kind = tokens[i].kind();
            kind.is_tag_end()
                || matches!(
                    kind,
                    TokenKind::Text
                        | TokenKind::Comment { .. }
                        | TokenKind::BlockStart { .. }
                        | TokenKind::VariableStart { .. }
                )
        });
        if self.at_tag_end() {
            self.advance();
        }
    }

    fn expect_keyword(&mut self, keyword: &str) {
        if !self.eat_name(keyword) {
            let found = self.peek().describe();
            self.error(
                ParseError::ExpectedToken {
                    expected: format!("'{keyword}'"),
                    found,
                },
                self.peek().span(),
            );
        }
    }

    pub(crate) fn expect_name(&mut self, what: &str) -> Option<String> {
        if let Some(token) = self.eat(TokenKind::Name) {
            return Some(token.lexeme().to_string());
        }
        let found = self.peek().describe();
        self.error(
            ParseError::ExpectedToken {
                expected: what.to_string(),
                found,
            },
            self.peek().span(),
        );
        None
    }

    /// Consume `kind` or report it as expected. Nothing is skipped.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if let Some(token) = self.eat(kind) {
            return Some(token);
        }
        let found = self.peek().describe();
        self.error(
            ParseError::ExpectedToken {
                expected: kind.describe().to_string(),
                found,
            },
            self.peek().span(),
        );
        None
    }

    pub(crate) fn error(&mut self, error: ParseError, span: Span) {
        self.diagnostics.push(error.into_diagnostic(span));
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.current + n).min(last)]
    }

    pub(crate) fn position(&self) -> usize {
        self.current
    }

    /// Consume the current token. The final end-of-input token is never consumed.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek().is(kind)
    }

    pub(crate) fn at_name(&self, name: &str) -> bool {
        self.peek().is_name(name)
    }

    pub(crate) fn at_tag_end(&self) -> bool {
        self.peek().kind().is_tag_end()
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.advance())
    }

    pub(crate) fn eat_name(&mut self, name: &str) -> bool {
        self.at_name(name) && {
            self.advance();
            true
        }
    }

    pub(crate) fn eat_comma(&mut self) -> bool {
        self.eat(TokenKind::Comma).is_some()
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.current.checked_sub(1) {
            Some(index) => self.tokens[index].span(),
            None => self.peek().span(),
        }
    }

    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.cover(self.previous_span())
    }
}
