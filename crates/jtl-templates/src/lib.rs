//! Lexing and parsing of `jtl` templates.
//!
//! The pipeline has two total passes:
//!
//! 1. [`lex`] turns source text into a flat [`Token`] stream. Concatenating
//!    the lexemes reproduces the source.
//! 2. [`parse`] turns tokens into a [`Template`] tree, dispatching unknown
//!    tags to a [`TagRegistry`].
//!
//! Neither pass fails. Problems are returned as [`Diagnostic`]s next to a
//! best-effort result, so a broken tag costs one node rather than the file.
//!
//! ```
//! let (template, diagnostics) = jtl_templates::parse_template("hello.html", "Hi {{ name }}", None);
//! assert!(diagnostics.is_empty());
//! assert_eq!(template.body.len(), 2);
//! ```

pub mod ast;
mod error;
mod expression;
mod extension;
mod lexer;
mod parser;
mod recovery;
mod tokens;
pub mod visitor;

pub use ast::Template;
pub use error::ParseError;
pub use extension::GenericTag;
pub use extension::TagExtension;
pub use extension::TagParser;
pub use extension::TagRegistry;
use jtl_source::Diagnostic;
pub use lexer::Lexer;
pub use parser::Parser;
pub use recovery::skip_to_sync;
pub use tokens::unescape_string;
pub use tokens::Token;
pub use tokens::TokenKind;
pub use visitor::Visitor;

/// Tokenize `source`. The stream always ends with [`TokenKind::Eof`].
#[must_use]
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).tokenize()
}

/// Build a tree from `tokens`, consulting `tags` for tags the parser does not know.
#[must_use]
pub fn parse(tokens: Vec<Token>, tags: Option<&TagRegistry>) -> (Template, Vec<Diagnostic>) {
    Parser::new(tokens, tags).parse()
}

/// Lex and parse in one step.
///
/// Lexer diagnostics come first, then parser diagnostics, each in source order.
#[must_use]
pub fn parse_template(
    name: &str,
    source: &str,
    tags: Option<&TagRegistry>,
) -> (Template, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = lex(source);
    let (mut template, parse_diagnostics) = parse(tokens, tags);
    template.name = Some(name.to_string());
    diagnostics.extend(parse_diagnostics);
    tracing::debug!(
        template = name,
        nodes = template.body.len(),
        diagnostics = diagnostics.len(),
        "parsed template"
    );
    (template, diagnostics)
}
