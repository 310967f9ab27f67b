//! Syntax tree produced by the parser.
//!
//! Statements and expressions are closed sum types; every node carries the
//! [`Span`] it was parsed from. The tree is immutable after parsing: the
//! renderer only reads it.

use jtl_source::Span;
use serde::Serialize;

/// The root of a parsed template.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Template {
    pub name: Option<String>,
    pub body: Vec<Node>,
    pub span: Span,
}

impl Template {
    /// The first top-level `{% extends %}` tag, if any.
    #[must_use]
    pub fn extends(&self) -> Option<&Extends> {
        self.body.iter().find_map(|node| match node {
            Node::Extends(extends) => Some(extends),
            _ => None,
        })
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<template>")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Node {
    Text(Text),
    Raw(Raw),
    Output(Output),
    If(If),
    For(For),
    Set(Set),
    SetBlock(SetBlock),
    Block(Block),
    Extends(Extends),
    Include(Include),
    Import(Import),
    FromImport(FromImport),
    Macro(Macro),
    CallBlock(CallBlock),
    With(With),
    FilterBlock(FilterBlock),
    Comment(Comment),
    CustomTag(CustomTag),
}

impl Node {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Node::Text(n) => n.span,
            Node::Raw(n) => n.span,
            Node::Output(n) => n.span,
            Node::If(n) => n.span,
            Node::For(n) => n.span,
            Node::Set(n) => n.span,
            Node::SetBlock(n) => n.span,
            Node::Block(n) => n.span,
            Node::Extends(n) => n.span,
            Node::Include(n) => n.span,
            Node::Import(n) => n.span,
            Node::FromImport(n) => n.span,
            Node::Macro(n) => n.span,
            Node::CallBlock(n) => n.span,
            Node::With(n) => n.span,
            Node::FilterBlock(n) => n.span,
            Node::Comment(n) => n.span,
            Node::CustomTag(n) => n.span,
        }
    }
}

/// Literal template text, after whitespace control has been applied.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Text {
    pub content: String,
    pub span: Span,
}

/// The verbatim content of a `{% raw %}` block.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Raw {
    pub content: String,
    pub span: Span,
}

/// `{{ expr }}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Output {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct If {
    /// The `if` branch followed by every `elif`, in source order.
    pub branches: Vec<IfBranch>,
    pub else_body: Option<Vec<Node>>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IfBranch {
    pub test: Expr,
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct For {
    pub target: Target,
    pub iter: Expr,
    /// Inline filter: `{% for x in xs if x %}`.
    pub condition: Option<Expr>,
    pub body: Vec<Node>,
    pub else_body: Option<Vec<Node>>,
    pub span: Span,
}

/// `{% set target = value %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Set {
    pub target: Target,
    pub value: Expr,
    pub span: Span,
}

/// `{% set target | filters %}body{% endset %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetBlock {
    pub target: Target,
    pub filters: Vec<FilterCall>,
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Block {
    pub name: String,
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Extends {
    pub template: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Include {
    pub template: Expr,
    pub with_context: bool,
    pub ignore_missing: bool,
    pub span: Span,
}

/// `{% import "forms.html" as forms %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Import {
    pub template: Expr,
    pub alias: String,
    pub with_context: bool,
    pub span: Span,
}

/// `{% from "forms.html" import input as field, label %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FromImport {
    pub template: Expr,
    pub names: Vec<ImportName>,
    pub with_context: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

impl ImportName {
    /// The name the import is bound to in the importing template.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Macro {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

/// `{% call(args) macro(...) %}body{% endcall %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallBlock {
    pub call: Expr,
    pub caller_params: Vec<Param>,
    pub body: Vec<Node>,
    pub span: Span,
}

/// `{% with a = 1, b = 2 %}body{% endwith %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct With {
    pub bindings: Vec<Binding>,
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Binding {
    pub target: Target,
    pub value: Expr,
}

/// `{% filter upper %}body{% endfilter %}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterBlock {
    pub filters: Vec<FilterCall>,
    pub body: Vec<Node>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comment {
    pub content: String,
    pub span: Span,
}

/// A tag parsed by a registered extension.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomTag {
    pub name: String,
    pub args: Vec<Expr>,
    pub body: Option<Vec<Node>>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Expr {
    Literal(Literal),
    Name(Name),
    Group(Group),
    Unary(Unary),
    Binary(Binary),
    Membership(Membership),
    Conditional(Conditional),
    Call(Call),
    Filter(Filter),
    Test(Test),
    Attribute(Attribute),
    Item(Item),
    List(List),
    Tuple(Tuple),
    Dict(Dict),
    Kwarg(Kwarg),
    /// Placeholder where an operand could not be parsed. Already reported.
    Missing(Span),
}

impl Expr {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(e) => e.span,
            Expr::Name(e) => e.span,
            Expr::Group(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::Membership(e) => e.span,
            Expr::Conditional(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::Filter(e) => e.span,
            Expr::Test(e) => e.span,
            Expr::Attribute(e) => e.span,
            Expr::Item(e) => e.span,
            Expr::List(e) => e.span,
            Expr::Tuple(e) => e.span,
            Expr::Dict(e) => e.span,
            Expr::Kwarg(e) => e.span,
            Expr::Missing(span) => *span,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LiteralValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Name {
    pub name: String,
    pub span: Span,
}

/// A parenthesized expression, kept so formatters can reproduce it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Group {
    pub expr: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Concat => "~",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

/// `element in container` / `element not in container`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Membership {
    pub element: Box<Expr>,
    pub container: Box<Expr>,
    pub negated: bool,
    pub span: Span,
}

/// `then if test else otherwise`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conditional {
    pub test: Box<Expr>,
    pub then: Box<Expr>,
    pub otherwise: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Call {
    pub callee: Box<Expr>,
    /// Positional arguments and [`Expr::Kwarg`]s, in source order.
    pub args: Vec<Expr>,
    pub span: Span,
}

/// A filter application: `value | name(args)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Filter {
    pub value: Box<Expr>,
    pub call: FilterCall,
    pub span: Span,
}

/// The `name(args)` part of a filter, shared with `{% filter %}` and `{% set %}` blocks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// `value is [not] name(args)`; the renderer flips the result when `negated`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Test {
    pub value: Box<Expr>,
    pub name: String,
    pub args: Vec<Expr>,
    pub negated: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attribute {
    pub value: Box<Expr>,
    pub attr: String,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Item {
    pub value: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct List {
    pub items: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tuple {
    pub items: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dict {
    pub entries: Vec<(Expr, Expr)>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Kwarg {
    pub name: String,
    pub value: Box<Expr>,
    pub span: Span,
}

/// An assignable expression.
///
/// Only names, tuples, attributes and items can be assigned to; the parser
/// converts expressions with [`TryFrom`] and reports anything else.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Target {
    Name {
        name: String,
        span: Span,
    },
    Tuple {
        items: Vec<Target>,
        span: Span,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
        span: Span,
    },
    Item {
        value: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Target {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Target::Name { span, .. }
            | Target::Tuple { span, .. }
            | Target::Attribute { span, .. }
            | Target::Item { span, .. } => *span,
        }
    }

    /// Every plain name this target binds, in source order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Target::Name { name, .. } => vec![name.as_str()],
            Target::Tuple { items, .. } => items.iter().flat_map(Target::names).collect(),
            Target::Attribute { .. } | Target::Item { .. } => Vec::new(),
        }
    }
}

impl TryFrom<Expr> for Target {
    /// The span of the first sub-expression that cannot be assigned to.
    type Error = Span;

    fn try_from(expr: Expr) -> Result<Self, Self::Error> {
        match expr {
            Expr::Name(Name { name, span }) => Ok(Target::Name { name, span }),
            Expr::Tuple(Tuple { items, span }) => {
                let items = items
                    .into_iter()
                    .map(Target::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Target::Tuple { items, span })
            }
            Expr::Group(Group { expr, .. }) => Target::try_from(*expr),
            Expr::Attribute(Attribute { value, attr, span }) => {
                Ok(Target::Attribute { value, attr, span })
            }
            Expr::Item(Item { value, index, span }) => Ok(Target::Item { value, index, span }),
            other => Err(other.span()),
        }
    }
}

#[cfg(test)]
mod tests {
    use jtl_source::Position;

    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(Name {
            name: n.to_string(),
            span: Span::default(),
        })
    }

    #[test]
    fn test_tuple_of_names_is_a_target() {
        let expr = Expr::Tuple(Tuple {
            items: vec![name("a"), name("b")],
            span: Span::default(),
        });
        let target = Target::try_from(expr).unwrap();
        assert_eq!(target.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_literal_is_not_a_target() {
        let span = Span::point(Position::new(4, 1, 5));
        let expr = Expr::Tuple(Tuple {
            items: vec![
                name("a"),
                Expr::Literal(Literal {
                    value: LiteralValue::Int(1),
                    span,
                }),
            ],
            span: Span::default(),
        });
        assert_eq!(Target::try_from(expr), Err(span));
    }

    #[test]
    fn test_attribute_target_binds_no_names() {
        let expr = Expr::Attribute(Attribute {
            value: Box::new(name("user")),
            attr: "name".to_string(),
            span: Span::default(),
        });
        let target = Target::try_from(expr).unwrap();
        assert!(target.names().is_empty());
    }
}
