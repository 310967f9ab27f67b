use crate::ast::Expr;
use crate::ast::Node;
use crate::ast::Target;
use crate::ast::Template;

/// Read-only traversal of a template tree.
///
/// Override the `visit_*` methods of interest and call the matching
/// `walk_*` function to keep descending.
pub trait Visitor {
    fn visit_template(&mut self, template: &Template) {
        walk_nodelist(self, &template.body);
    }

    fn visit_node(&mut self, node: &Node) {
        walk_node(self, node);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_target(&mut self, target: &Target) {
        walk_target(self, target);
    }
}

/// Visit every child node and expression of `node`, in source order.
pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    match node {
        Node::Text(_) | Node::Raw(_) | Node::Comment(_) => {}
        Node::Output(output) => visitor.visit_expr(&output.expr),
        Node::If(node) => {
            for branch in &node.branches {
                visitor.visit_expr(&branch.test);
                walk_nodelist(visitor, &branch.body);
            }
            if let Some(body) = &node.else_body {
                walk_nodelist(visitor, body);
            }
        }
        Node::For(node) => {
            visitor.visit_target(&node.target);
            visitor.visit_expr(&node.iter);
            if let Some(condition) = &node.condition {
                visitor.visit_expr(condition);
            }
            walk_nodelist(visitor, &node.body);
            if let Some(body) = &node.else_body {
                walk_nodelist(visitor, body);
            }
        }
        Node::Set(node) => {
            visitor.visit_target(&node.target);
            visitor.visit_expr(&node.value);
        }
        Node::SetBlock(node) => {
            visitor.visit_target(&node.target);
            for filter in &node.filters {
                walk_exprs(visitor, &filter.args);
            }
            walk_nodelist(visitor, &node.body);
        }
        Node::Block(node) => walk_nodelist(visitor, &node.body),
        Node::Extends(node) => visitor.visit_expr(&node.template),
        Node::Include(node) => visitor.visit_expr(&node.template),
        Node::Import(node) => visitor.visit_expr(&node.template),
        Node::FromImport(node) => visitor.visit_expr(&node.template),
        Node::Macro(node) => {
            for param in &node.params {
                if let Some(default) = &param.default {
                    visitor.visit_expr(default);
                }
            }
            walk_nodelist(visitor, &node.body);
        }
        Node::CallBlock(node) => {
            visitor.visit_expr(&node.call);
            walk_nodelist(visitor, &node.body);
        }
        Node::With(node) => {
            for binding in &node.bindings {
                visitor.visit_target(&binding.target);
                visitor.visit_expr(&binding.value);
            }
            walk_nodelist(visitor, &node.body);
        }
        Node::FilterBlock(node) => {
            for filter in &node.filters {
                walk_exprs(visitor, &filter.args);
            }
            walk_nodelist(visitor, &node.body);
        }
        Node::CustomTag(node) => {
            walk_exprs(visitor, &node.args);
            if let Some(body) = &node.body {
                walk_nodelist(visitor, body);
            }
        }
    }
}

pub fn walk_nodelist<V: Visitor + ?Sized>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        visitor.visit_node(node);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Literal(_) | Expr::Name(_) | Expr::Missing(_) => {}
        Expr::Group(e) => visitor.visit_expr(&e.expr),
        Expr::Unary(e) => visitor.visit_expr(&e.operand),
        Expr::Binary(e) => {
            visitor.visit_expr(&e.left);
            visitor.visit_expr(&e.right);
        }
        Expr::Membership(e) => {
            visitor.visit_expr(&e.element);
            visitor.visit_expr(&e.container);
        }
        Expr::Conditional(e) => {
            visitor.visit_expr(&e.then);
            visitor.visit_expr(&e.test);
            if let Some(otherwise) = &e.otherwise {
                visitor.visit_expr(otherwise);
            }
        }
        Expr::Call(e) => {
            visitor.visit_expr(&e.callee);
            walk_exprs(visitor, &e.args);
        }
        Expr::Filter(e) => {
            visitor.visit_expr(&e.value);
            walk_exprs(visitor, &e.call.args);
        }
        Expr::Test(e) => {
            visitor.visit_expr(&e.value);
            walk_exprs(visitor, &e.args);
        }
        Expr::Attribute(e) => visitor.visit_expr(&e.value),
        Expr::Item(e) => {
            visitor.visit_expr(&e.value);
            visitor.visit_expr(&e.index);
        }
        Expr::List(e) => walk_exprs(visitor, &e.items),
        Expr::Tuple(e) => walk_exprs(visitor, &e.items),
        Expr::Dict(e) => {
            for (key, value) in &e.entries {
                visitor.visit_expr(key);
                visitor.visit_expr(value);
            }
        }
        Expr::Kwarg(e) => visitor.visit_expr(&e.value),
    }
}

pub fn walk_target<V: Visitor + ?Sized>(visitor: &mut V, target: &Target) {
    match target {
        Target::Name { .. } => {}
        Target::Tuple { items, .. } => {
            for item in items {
                visitor.visit_target(item);
            }
        }
        Target::Attribute { value, .. } => visitor.visit_expr(value),
        Target::Item { value, index, .. } => {
            visitor.visit_expr(value);
            visitor.visit_expr(index);
        }
    }
}

fn walk_exprs<V: Visitor + ?Sized>(visitor: &mut V, exprs: &[Expr]) {
    for expr in exprs {
        visitor.visit_expr(expr);
    }
}
