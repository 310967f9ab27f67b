//! The expression grammar, as precedence climbing over [`Parser`].
//!
//! From loosest to tightest binding:
//!
//! | level | operators |
//! |---|---|
//! | conditional | `a if b else c` |
//! | or | `or` |
//! | and | `and` |
//! | not | prefix `not` |
//! | comparison | `==` `!=` `<` `<=` `>` `>=` |
//! | membership | `in`, `not in` |
//! | concat | `~` |
//! | additive | `+` `-` |
//! | multiplicative | `*` `/` `//` `%` |
//! | unary | prefix `+` `-` |
//! | power | `**`, right associative |
//! | postfix | `.attr` `[item]` `(call)` `\|filter` `is test` |
//!
//! Every function returns an expression even when the input is broken:
//! a missing operand becomes [`Expr::Missing`] after a diagnostic, and
//! nothing is consumed that could close the surrounding tag.

use jtl_source::Span;

use crate::ast::Attribute;
use crate::ast::Binary;
use crate::ast::BinaryOp;
use crate::ast::Call;
use crate::ast::Conditional;
use crate::ast::Dict;
use crate::ast::Expr;
use crate::ast::Filter;
use crate::ast::FilterCall;
use crate::ast::Group;
use crate::ast::Item;
use crate::ast::Kwarg;
use crate::ast::List;
use crate::ast::Literal;
use crate::ast::LiteralValue;
use crate::ast::Membership;
use crate::ast::Name;
use crate::ast::Test;
use crate::ast::Tuple;
use crate::ast::Unary;
use crate::ast::UnaryOp;
use crate::error::ParseError;
use crate::parser::Parser;
use crate::tokens::unescape_string;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Names that end an expression rather than start a bare argument. Tag
/// keywords that may follow an expression are included.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "as", "import", "ignore", "with", "without",
    "recursive",
];

impl Parser<'_> {
    pub(crate) fn parse_expression(&mut self) -> Expr {
        let expr = self.parse_or();
        if !self.at_name("if") {
            return expr;
        }

        self.advance();
        let test = self.parse_or();
        let otherwise = self
            .eat_name("else")
            .then(|| Box::new(self.parse_expression()));
        let span = expr.span().cover(self.previous_span());
        Expr::Conditional(Conditional {
            test: Box::new(test),
            then: Box::new(expr),
            otherwise,
            span,
        })
    }

    /// An expression, or an unparenthesized tuple when commas follow: `1, 2`.
    pub(crate) fn parse_expression_list(&mut self) -> Expr {
        let first = self.parse_expression();
        if !self.at(TokenKind::Comma) {
            return first;
        }
        let mut items = vec![first];
        while self.eat_comma() {
            if self.at_tag_end() || self.at_eof() {
                break;
            }
            items.push(self.parse_expression());
        }
        let span = items[0].span().cover(self.previous_span());
        Expr::Tuple(Tuple { items, span })
    }

    /// Everything but the conditional. `for` uses this so its inline `if`
    /// is not taken for a conditional expression.
    pub(crate) fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.eat_name("or") {
            let right = self.parse_and();
            left = binary(BinaryOp::Or, left, right);
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_not();
        while self.eat_name("and") {
            let right = self.parse_not();
            left = binary(BinaryOp::And, left, right);
        }
        left
    }

    fn parse_not(&mut self) -> Expr {
        if self.at_name("not") {
            let start = self.advance().span();
            let operand = self.parse_not();
            let span = start.cover(operand.span());
            return Expr::Unary(Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut left = self.parse_membership();
        loop {
            let op = match self.peek().kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_membership();
            left = binary(op, left, right);
        }
        left
    }

    /// `in` and `not in` are matched as fixed token pairs.
    fn parse_membership(&mut self) -> Expr {
        let mut element = self.parse_concat();
        loop {
            let negated = if self.at_name("in") {
                self.advance();
                false
            } else if self.at_name("not") && self.peek_at(1).is_name("in") {
                self.advance();
                self.advance();
                true
            } else {
                break;
            };
            let container = self.parse_concat();
            let span = element.span().cover(container.span());
            element = Expr::Membership(Membership {
                element: Box::new(element),
                container: Box::new(container),
                negated,
                span,
            });
        }
        element
    }

    fn parse_concat(&mut self) -> Expr {
        let mut left = self.parse_additive();
        while self.eat(TokenKind::Tilde).is_some() {
            let right = self.parse_additive();
            left = binary(BinaryOp::Concat, left, right);
        }
        left
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek().kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek().kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.peek().kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.advance().span();
        let operand = self.parse_unary();
        let span = start.cover(operand.span());
        Expr::Unary(Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    /// `**` binds tighter than unary minus on its left but accepts one on its
    /// right, so `-2 ** -1` is `-(2 ** (-1))`.
    fn parse_power(&mut self) -> Expr {
        let base = self.parse_postfix();
        if self.eat(TokenKind::StarStar).is_none() {
            return base;
        }
        let exponent = self.parse_unary();
        binary(BinaryOp::Pow, base, exponent)
    }

    /// A primary followed by any chain of `.`, `[]`, `()`, `|` and `is`.
    pub(crate) fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            expr = match self.peek().kind() {
                TokenKind::Dot => self.parse_attribute(expr),
                TokenKind::LBracket => self.parse_subscript(expr),
                TokenKind::LParen => self.parse_call(expr),
                TokenKind::Pipe => {
                    self.advance();
                    let call = self.parse_filter_call();
                    let span = expr.span().cover(call.span);
                    Expr::Filter(Filter {
                        value: Box::new(expr),
                        call,
                        span,
                    })
                }
                TokenKind::Name if self.at_name("is") => self.parse_test(expr),
                _ => return expr,
            };
        }
    }

    /// The restricted postfix chain allowed in assignment position.
    pub(crate) fn parse_target_atom(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            expr = match self.peek().kind() {
                TokenKind::Dot => self.parse_attribute(expr),
                TokenKind::LBracket => self.parse_subscript(expr),
                _ => return expr,
            };
        }
    }

    /// `.name`, `.0`, or `.0.1` (lexed as one float) after a value.
    fn parse_attribute(&mut self, value: Expr) -> Expr {
        self.advance();
        let token = self.peek().clone();
        match token.kind() {
            TokenKind::Name => {
                self.advance();
                let span = value.span().cover(token.span());
                Expr::Attribute(Attribute {
                    value: Box::new(value),
                    attr: token.lexeme().to_string(),
                    span,
                })
            }
            TokenKind::Integer | TokenKind::Float => {
                self.advance();
                let mut expr = value;
                for part in token.lexeme().split('.') {
                    let index = Expr::Literal(Literal {
                        value: part
                            .parse::<i64>()
                            .map_or_else(|_| LiteralValue::Str(part.to_string()), LiteralValue::Int),
                        span: token.span(),
                    });
                    let span = expr.span().cover(token.span());
                    expr = Expr::Item(Item {
                        value: Box::new(expr),
                        index: Box::new(index),
                        span,
                    });
                }
                expr
            }
            _ => {
                self.error(
                    ParseError::ExpectedToken {
                        expected: "attribute name".to_string(),
                        found: token.describe(),
                    },
                    token.span(),
                );
                value
            }
        }
    }

    fn parse_subscript(&mut self, value: Expr) -> Expr {
        self.advance();
        let index = self.parse_expression();
        self.expect(TokenKind::RBracket);
        let span = value.span().cover(self.previous_span());
        Expr::Item(Item {
            value: Box::new(value),
            index: Box::new(index),
            span,
        })
    }

    fn parse_call(&mut self, callee: Expr) -> Expr {
        let args = self.parse_call_args();
        let span = callee.span().cover(self.previous_span());
        Expr::Call(Call {
            callee: Box::new(callee),
            args,
            span,
        })
    }

    /// `(a, b, key=value)`, with the current token on `(`.
    fn parse_call_args(&mut self) -> Vec<Expr> {
        self.advance();
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at_tag_end() && !self.at_eof() {
            let arg = if self.at(TokenKind::Name) && self.peek_at(1).is(TokenKind::Assign) {
                let name = self.advance();
                self.advance();
                let value = self.parse_expression();
                let span = name.span().cover(value.span());
                Expr::Kwarg(Kwarg {
                    name: name.lexeme().to_string(),
                    value: Box::new(value),
                    span,
                })
            } else {
                self.parse_expression()
            };
            let missing = matches!(arg, Expr::Missing(_));
            args.push(arg);
            if missing || !self.eat_comma() {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        args
    }

    /// `name`, `name(args)` or `name arg, arg` after a `|`, or in a
    /// `{% filter %}` tag.
    pub(crate) fn parse_filter_call(&mut self) -> FilterCall {
        let start = self.peek().span();
        let name = self.parse_dotted_name("filter name");
        let args = if self.at(TokenKind::LParen) {
            self.parse_call_args()
        } else {
            self.parse_bare_args()
        };
        FilterCall {
            name,
            args,
            span: start.cover(self.previous_span()),
        }
    }

    /// `is [not] name`, `is name(args)` or `is name arg`.
    fn parse_test(&mut self, value: Expr) -> Expr {
        self.advance();
        let negated = self.eat_name("not");
        let name = self.parse_dotted_name("test name");
        let args = if self.at(TokenKind::LParen) {
            self.parse_call_args()
        } else if self.starts_bare_argument() {
            vec![self.parse_postfix()]
        } else {
            Vec::new()
        };
        let span = value.span().cover(self.previous_span());
        Expr::Test(Test {
            value: Box::new(value),
            name,
            args,
            negated,
            span,
        })
    }

    fn starts_bare_argument(&self) -> bool {
        self.at(TokenKind::LBracket) || self.starts_bare_filter_argument(0)
    }

    /// A `[` after a filter name is a subscript of the filtered value, so
    /// only literals and names start a bare filter argument.
    fn starts_bare_filter_argument(&self, offset: usize) -> bool {
        let token = self.peek_at(offset);
        match token.kind() {
            TokenKind::Integer | TokenKind::Float | TokenKind::String => true,
            TokenKind::Name => !KEYWORDS.contains(&token.lexeme()),
            _ => false,
        }
    }

    /// Comma-separated filter arguments without parentheses. Each argument
    /// is a primary with attribute, item and call access, so a following
    /// `|` or operator applies to the filtered value.
    ///
    /// A comma followed by `name=` ends the list: it belongs to an enclosing
    /// `with` binding or macro parameter list.
    fn parse_bare_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if !self.starts_bare_filter_argument(0) {
            return args;
        }
        loop {
            let arg = if self.at(TokenKind::Name) && self.peek_at(1).is(TokenKind::Assign) {
                let name = self.advance();
                self.advance();
                let value = self.parse_bare_value();
                let span = name.span().cover(value.span());
                Expr::Kwarg(Kwarg {
                    name: name.lexeme().to_string(),
                    value: Box::new(value),
                    span,
                })
            } else {
                self.parse_bare_value()
            };
            args.push(arg);
            let continues = self.at(TokenKind::Comma)
                && self.starts_bare_filter_argument(1)
                && !self.peek_at(2).is(TokenKind::Assign);
            if !continues {
                return args;
            }
            self.advance();
        }
    }

    fn parse_bare_value(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            expr = match self.peek().kind() {
                TokenKind::Dot => self.parse_attribute(expr),
                TokenKind::LBracket => self.parse_subscript(expr),
                TokenKind::LParen => self.parse_call(expr),
                _ => return expr,
            };
        }
    }

    /// Filter and test names may be namespaced: `text.upper`.
    fn parse_dotted_name(&mut self, what: &str) -> String {
        let Some(mut name) = self.expect_name(what) else {
            return String::new();
        };
        while self.at(TokenKind::Dot) && self.peek_at(1).is(TokenKind::Name) {
            self.advance();
            name.push('.');
            name.push_str(self.advance().lexeme());
        }
        name
    }

    fn parse_primary(&mut self) -> Expr {
        let token = self.peek().clone();
        match token.kind() {
            TokenKind::Name => {
                self.advance();
                let value = match token.lexeme() {
                    "true" | "True" => LiteralValue::Bool(true),
                    "false" | "False" => LiteralValue::Bool(false),
                    "none" | "None" => LiteralValue::None,
                    name => {
                        return Expr::Name(Name {
                            name: name.to_string(),
                            span: token.span(),
                        })
                    }
                };
                literal(value, token.span())
            }
            TokenKind::Integer => self.parse_integer(&token),
            TokenKind::Float => {
                self.advance();
                literal(self.number_value(&token, true), token.span())
            }
            TokenKind::String => self.parse_strings(),
            TokenKind::LParen => self.parse_parenthesized(),
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_dict(),
            _ => {
                self.error(
                    ParseError::ExpectedToken {
                        expected: "expression".to_string(),
                        found: token.describe(),
                    },
                    token.span(),
                );
                Expr::Missing(Span::point(token.span().start()))
            }
        }
    }

    /// An integer, or a float written with a trailing dot (`1.`).
    ///
    /// `1.foo` and `1.0` are left to the postfix chain; only a dot followed by
    /// something that cannot continue it makes the literal a float.
    fn parse_integer(&mut self, token: &Token) -> Expr {
        self.advance();
        let continues = matches!(
            self.peek_at(1).kind(),
            TokenKind::Name | TokenKind::Integer | TokenKind::Float
        );
        if self.at(TokenKind::Dot) && !continues {
            let dot = self.advance();
            let value = self.number_value(token, true);
            return literal(value, token.span().cover(dot.span()));
        }
        literal(self.number_value(token, false), token.span())
    }

    /// The value of a numeric token with `_` separators dropped. Integers
    /// beyond the `i64` range become floats.
    fn number_value(&mut self, token: &Token, float: bool) -> LiteralValue {
        let digits = token.lexeme().replace('_', "");
        if !float {
            if let Ok(int) = digits.parse::<i64>() {
                return LiteralValue::Int(int);
            }
        }
        if let Ok(value) = digits.parse::<f64>() {
            return LiteralValue::Float(value);
        }
        self.error(
            ParseError::ExpectedToken {
                expected: "number".to_string(),
                found: token.describe(),
            },
            token.span(),
        );
        LiteralValue::None
    }

    /// Adjacent string literals are joined: `"a" 'b'` is `"ab"`.
    fn parse_strings(&mut self) -> Expr {
        let first = self.advance();
        let mut value = unescape_string(first.lexeme());
        let mut span = first.span();
        while let Some(next) = self.eat(TokenKind::String) {
            value.push_str(&unescape_string(next.lexeme()));
            span = span.cover(next.span());
        }
        literal(LiteralValue::Str(value), span)
    }

    fn parse_parenthesized(&mut self) -> Expr {
        let start = self.advance().span();
        if self.eat(TokenKind::RParen).is_some() {
            return Expr::Tuple(Tuple {
                items: Vec::new(),
                span: self.span_from(start),
            });
        }

        let first = self.parse_expression();
        if !self.at(TokenKind::Comma) {
            self.expect(TokenKind::RParen);
            return Expr::Group(Group {
                expr: Box::new(first),
                span: self.span_from(start),
            });
        }

        let mut items = vec![first];
        while self.eat_comma() {
            if self.at(TokenKind::RParen) {
                break;
            }
            let item = self.parse_expression();
            let missing = matches!(item, Expr::Missing(_));
            items.push(item);
            if missing {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        Expr::Tuple(Tuple {
            items,
            span: self.span_from(start),
        })
    }

    fn parse_list(&mut self) -> Expr {
        let start = self.advance().span();
        let mut items = Vec::new();
        while !self.at(TokenKind::RBracket) && !self.at_tag_end() && !self.at_eof() {
            let item = self.parse_expression();
            let missing = matches!(item, Expr::Missing(_));
            items.push(item);
            if missing || !self.eat_comma() {
                break;
            }
        }
        self.expect(TokenKind::RBracket);
        Expr::List(List {
            items,
            span: self.span_from(start),
        })
    }

    fn parse_dict(&mut self) -> Expr {
        let start = self.advance().span();
        let mut entries = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_tag_end() && !self.at_eof() {
            let key = self.parse_expression();
            if matches!(key, Expr::Missing(_)) || self.expect(TokenKind::Colon).is_none() {
                break;
            }
            let value = self.parse_expression();
            let missing = matches!(value, Expr::Missing(_));
            entries.push((key, value));
            if missing || !self.eat_comma() {
                break;
            }
        }
        self.expect(TokenKind::RBrace);
        Expr::Dict(Dict {
            entries,
            span: self.span_from(start),
        })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span().cover(right.span());
    Expr::Binary(Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    })
}

fn literal(value: LiteralValue, span: Span) -> Expr {
    Expr::Literal(Literal { value, span })
}


#[cfg(test)]
mod tests {
    use jtl_source::Diagnostic;
    use jtl_source::DiagnosticKind;

    use super::*;
    use crate::ast::Node;
    use crate::lexer::Lexer;

    fn parse_expr(source: &str) -> (Expr, Vec<Diagnostic>) {
        let (tokens, _) = Lexer::new(&format!("{{{{ {source} }}}}")).tokenize();
        let (template, diagnostics) = Parser::new(tokens, None).parse();
        match template.body.into_iter().next() {
            Some(Node::Output(output)) => (output.expr, diagnostics),
            other => panic!("expected output node, got {other:?}"),
        }
    }

    /// Compact prefix notation so precedence is visible at a glance.
    fn sexpr(expr: &Expr) -> String {
        let list = |items: &[Expr]| items.iter().map(sexpr).collect::<Vec<_>>().join(" ");
        match expr {
            Expr::Literal(lit) => match &lit.value {
                LiteralValue::None => "none".to_string(),
                LiteralValue::Bool(b) => b.to_string(),
                LiteralValue::Int(i) => i.to_string(),
                LiteralValue::Float(f) => format!("{f:?}"),
                LiteralValue::Str(s) => format!("{s:?}"),
            },
            Expr::Name(name) => name.name.clone(),
            Expr::Group(group) => sexpr(&group.expr),
            Expr::Unary(unary) => {
                let op = match unary.op {
                    UnaryOp::Not => "not",
                    UnaryOp::Neg => "neg",
                    UnaryOp::Pos => "pos",
                };
                format!("({op} {})", sexpr(&unary.operand))
            }
            Expr::Binary(binary) => format!(
                "({} {} {})",
                binary.op.symbol(),
                sexpr(&binary.left),
                sexpr(&binary.right)
            ),
            Expr::Membership(m) => format!(
                "({} {} {})",
                if m.negated { "not-in" } else { "in" },
                sexpr(&m.element),
                sexpr(&m.container)
            ),
            Expr::Conditional(c) => format!(
                "(if {} {} {})",
                sexpr(&c.test),
                sexpr(&c.then),
                c.otherwise.as_deref().map_or("_".to_string(), sexpr)
            ),
            Expr::Call(call) => format!("(call {} [{}])", sexpr(&call.callee), list(&call.args)),
            Expr::Filter(filter) => format!(
                "(|{} {} [{}])",
                filter.call.name,
                sexpr(&filter.value),
                list(&filter.call.args)
            ),
            Expr::Test(test) => format!(
                "({}{} {} [{}])",
                if test.negated { "is-not " } else { "is " },
                test.name,
                sexpr(&test.value),
                list(&test.args)
            ),
            Expr::Attribute(attr) => format!("(. {} {})", sexpr(&attr.value), attr.attr),
            Expr::Item(item) => format!("([] {} {})", sexpr(&item.value), sexpr(&item.index)),
            Expr::List(l) => format!("[{}]", list(&l.items)),
            Expr::Tuple(t) => format!("(tuple {})", list(&t.items)),
            Expr::Dict(d) => {
                let entries = d
                    .entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", sexpr(k), sexpr(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{entries}}}")
            }
            Expr::Kwarg(kw) => format!("{}={}", kw.name, sexpr(&kw.value)),
            Expr::Missing(_) => "?".to_string(),
        }
    }

    fn shape(source: &str) -> String {
        let (expr, diagnostics) = parse_expr(source);
        assert!(diagnostics.is_empty(), "{source}: {diagnostics:?}");
        sexpr(&expr)
    }

    mod precedence {
        use super::*;

        #[test]
        fn test_arithmetic() {
            insta::assert_snapshot!(shape("1 + 2 * 3 - 4"), @"(- (+ 1 (* 2 3)) 4)");
            insta::assert_snapshot!(shape("(1 + 2) * 3"), @"(* (+ 1 2) 3)");
            insta::assert_snapshot!(shape("7 // 2 % 3 / 1"), @"(/ (% (// 7 2) 3) 1)");
        }

        #[test]
        fn test_power_is_right_associative_and_above_unary() {
            insta::assert_snapshot!(shape("2 ** 3 ** 2"), @"(** 2 (** 3 2))");
            insta::assert_snapshot!(shape("-2 ** 2"), @"(neg (** 2 2))");
            insta::assert_snapshot!(shape("2 ** -1"), @"(** 2 (neg 1))");
        }

        #[test]
        fn test_logic() {
            insta::assert_snapshot!(shape("a or b and c"), @"(or a (and b c))");
            insta::assert_snapshot!(shape("not a == b"), @"(not (== a b))");
            insta::assert_snapshot!(shape("not not a"), @"(not (not a))");
        }

        #[test]
        fn test_membership_sits_between_comparison_and_concat() {
            insta::assert_snapshot!(shape("a ~ b in c"), @"(in (~ a b) c)");
            insta::assert_snapshot!(shape("a not in b == c"), @"(== (not-in a b) c)");
            insta::assert_snapshot!(shape("a ~ b + c"), @"(~ a (+ b c))");
        }

        #[test]
        fn test_conditional_is_loosest() {
            insta::assert_snapshot!(shape("a or b if c else d"), @"(if c (or a b) d)");
            insta::assert_snapshot!(shape("a if b"), @"(if b a _)");
            insta::assert_snapshot!(shape("a if b else c if d else e"), @"(if b a (if d c e))");
        }
    }

    mod postfix {
        use super::*;

        #[test]
        fn test_attribute_item_call_chain() {
            insta::assert_snapshot!(shape("user.name[0](1, key=2)"), @"(call ([] (. user name) 0) [1 key=2])");
        }

        #[test]
        fn test_numeric_attribute_is_item_access() {
            insta::assert_snapshot!(shape("row.0"), @"([] row 0)");
            insta::assert_snapshot!(shape("grid.0.1"), @"([] ([] grid 0) 1)");
        }

        #[test]
        fn test_trailing_dot_float() {
            insta::assert_snapshot!(shape("1."), @"1.0");
            insta::assert_snapshot!(shape("1.5 + 2."), @"(+ 1.5 2.0)");
        }

        #[test]
        fn test_filters() {
            insta::assert_snapshot!(shape("name|upper|default('x')"), @r#"(|default (|upper name []) ["x"])"#);
            insta::assert_snapshot!(shape("-x|abs"), @"(neg (|abs x []))");
        }

        #[test]
        fn test_filters_with_bare_args() {
            insta::assert_snapshot!(shape("x | default 'y'"), @r#"(|default x ["y"])"#);
            insta::assert_snapshot!(shape("x | replace 'a', 'b' | upper"), @r#"(|upper (|replace x ["a" "b"]) [])"#);
            insta::assert_snapshot!(shape("x | indent width=2"), @"(|indent x [width=2])");
            insta::assert_snapshot!(shape("x | round n.digits + 1"), @"(+ (|round x [(. n digits)]) 1)");
        }

        #[test]
        fn test_bare_filter_args_stop_at_keywords() {
            insta::assert_snapshot!(shape("x | default y if c else z"), @"(if c (|default x [y]) z)");
            insta::assert_snapshot!(shape("x | length is odd"), @"(is odd (|length x []) [])");
            insta::assert_snapshot!(shape("x | first[0]"), @"([] (|first x []) 0)");
            insta::assert_snapshot!(shape("[x | f 1, 2]"), @"[(|f x [1 2])]");
        }

        #[test]
        fn test_tests_with_bare_and_parenthesized_args() {
            insta::assert_snapshot!(shape("n is divisibleby 3"), @"(is divisibleby n [3])");
            insta::assert_snapshot!(shape("n is not sameas(none)"), @"(is-not sameas n [none])");
            insta::assert_snapshot!(shape("x is defined and y"), @"(and (is defined x []) y)");
        }
    }

    mod literals {
        use super::*;

        #[test]
        fn test_collections() {
            insta::assert_snapshot!(shape("[1, 'a', [true, none]]"), @r#"[1 "a" [true none]]"#);
            insta::assert_snapshot!(shape("(1,)"), @"(tuple 1)");
            assert_eq!(shape("()"), "(tuple )");
            insta::assert_snapshot!(shape("{'a': 1, 'b': {'c': 2}}"), @r#"{"a": 1, "b": {"c": 2}}"#);
        }

        #[test]
        fn test_adjacent_strings_concatenate() {
            insta::assert_snapshot!(shape(r#""a" 'b\n'"#), @r#""ab\n""#);
        }

        #[test]
        fn test_digit_separators() {
            insta::assert_snapshot!(shape("1_000 + 1"), @"(+ 1000 1)");
            insta::assert_snapshot!(shape("1_000.5"), @"1000.5");
            insta::assert_snapshot!(shape("2_0."), @"20.0");
        }

        #[test]
        fn test_capitalized_constants() {
            insta::assert_snapshot!(shape("True or False or None"), @"(or (or true false) none)");
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn test_missing_operand() {
            let (expr, diagnostics) = parse_expr("1 +");
            assert_eq!(sexpr(&expr), "(+ 1 ?)");
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].kind(), DiagnosticKind::ExpectedToken);
        }

        #[test]
        fn test_unclosed_list() {
            let (expr, diagnostics) = parse_expr("[1, 2");
            assert_eq!(sexpr(&expr), "[1 2]");
            assert_eq!(diagnostics.len(), 1);
            assert!(diagnostics[0].message().contains("']'"));
        }

        #[test]
        fn test_dangling_attribute_dot() {
            let (_, diagnostics) = parse_expr("user.");
            assert_eq!(diagnostics.len(), 1);
            assert!(diagnostics[0].message().contains("attribute name"));
        }
    }
}
